//! Seams to the module-execution engine.
//!
//! Executing guest bytecode is out of scope for this toolkit; a standard
//! engine does it. The runtime drives that engine through the two traits
//! here: [`ModuleEngine`] instantiates a module against a resolved
//! [`ImportTable`], and [`GuestInstance`] is the live instance the
//! runtime invokes exports on and reads linear memory through.
//!
//! Import thunks receive the same [`GuestInstance`] view while the engine
//! dispatches an import, so a thunk can allocate guest memory or invoke a
//! guest closure through the function table mid-call.

use std::collections::HashMap;

use husk_error::Result;

use crate::memory::LinearMemory;
use crate::value::Value;

/// A resolved import thunk.
pub type HostFunc = Box<dyn FnMut(&mut dyn GuestInstance, &[Value]) -> Result<Vec<Value>>>;

/// A live, instantiated guest module.
pub trait GuestInstance {
    /// Invoke an export by name.
    fn invoke(&mut self, export: &str, args: &[Value]) -> Result<Vec<Value>>;

    /// Invoke an entry of the module's function table, used for guest
    /// closure adapters.
    fn invoke_table(&mut self, table_index: u32, args: &[Value]) -> Result<Vec<Value>>;

    /// The instance's linear memory.
    fn memory(&self) -> &LinearMemory;

    /// Mutable access to the instance's linear memory.
    fn memory_mut(&mut self) -> &mut LinearMemory;
}

/// A module-execution engine able to instantiate the module this runtime
/// was built for.
pub trait ModuleEngine {
    /// Instantiate against the fully resolved import table.
    fn instantiate(&mut self, imports: ImportTable) -> Result<Box<dyn GuestInstance>>;
}

/// Import thunks grouped by module name, then field name.
#[derive(Default)]
pub struct ImportTable {
    entries: HashMap<String, HashMap<String, HostFunc>>,
}

impl ImportTable {
    /// An empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a thunk for `(module, field)`.
    pub fn register(&mut self, module: &str, field: &str, thunk: HostFunc) {
        self.entries
            .entry(module.to_owned())
            .or_default()
            .insert(field.to_owned(), thunk);
    }

    /// Whether a thunk is registered for `(module, field)`.
    pub fn contains(&self, module: &str, field: &str) -> bool {
        self.entries
            .get(module)
            .is_some_and(|fields| fields.contains_key(field))
    }

    /// Remove and return the thunk for `(module, field)`.
    ///
    /// Engines dispatch an import by taking the thunk out, calling it
    /// with their own instance as context, and putting it back; the
    /// table and the instance are otherwise one mutable structure.
    pub fn take(&mut self, module: &str, field: &str) -> Option<HostFunc> {
        self.entries.get_mut(module)?.remove(field)
    }

    /// Total number of registered thunks.
    pub fn len(&self) -> usize {
        self.entries.values().map(HashMap::len).sum()
    }

    /// Whether the table is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl core::fmt::Debug for ImportTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ImportTable")
            .field("modules", &self.entries.keys().collect::<Vec<_>>())
            .field("thunks", &self.len())
            .finish()
    }
}
