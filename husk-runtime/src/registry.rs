//! Import resolution against the capability registry.
//!
//! The import surface a guest declares is open-ended and module-specific:
//! generated field names carry a per-build hash suffix, and the exact set
//! shifts between guest versions. Rather than hand-writing a fixed
//! interface, declared `(module, field)` pairs are dispatched to
//! capabilities by a normalized key, and any gap fails loudly at build
//! time. A silent no-op stub would mask bugs until deep inside a call.

use std::cell::RefCell;
use std::rc::Rc;

use husk_error::{kinds, Result};
use husk_format::{Import, ImportDesc};
use log::debug;

use crate::capabilities;
use crate::env::HostState;
use crate::instance::{HostFunc, ImportTable};

/// Normalize a generated import field name to its capability key.
///
/// Strips the generated `__wbg_` prefix and the trailing per-build hash
/// suffix, so `__wbg_getItem_17f98dee3b43fa7e` dispatches as `getItem`
/// across guest rebuilds. Closure wrapper names keep their shared prefix
/// (the numeric tail names a table slot, not a build hash); other
/// `__wbindgen_*` intrinsics pass through whole.
pub fn capability_key(field: &str) -> &str {
    if let Some(rest) = field.strip_prefix("__wbindgen_closure_wrapper") {
        if rest.bytes().all(|b| b.is_ascii_digit()) {
            return "__wbindgen_closure_wrapper";
        }
    }

    let stripped = field.strip_prefix("__wbg_").unwrap_or(field);
    if let Some((base, suffix)) = stripped.rsplit_once('_') {
        if !base.is_empty()
            && suffix.len() >= 8
            && suffix.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return base;
        }
    }
    stripped
}

/// The capability set one runtime instance offers its guest.
pub struct CapabilityRegistry {
    state: Rc<RefCell<HostState>>,
}

impl CapabilityRegistry {
    /// A registry whose thunks share `state`.
    pub fn new(state: Rc<RefCell<HostState>>) -> Self {
        Self { state }
    }

    /// Resolve one import field to a thunk, if a capability covers it.
    pub fn resolve(&self, field: &str) -> Option<HostFunc> {
        capabilities::resolve(&self.state, field)
    }

    /// Build the import table for every declared import.
    ///
    /// Every function-kind import must resolve; the first gap aborts
    /// with an error naming the exact `module.field` pair. Non-function
    /// imports (memories, tables, globals) are the engine's to satisfy.
    pub fn build_import_table(&self, imports: &[Import]) -> Result<ImportTable> {
        let mut table = ImportTable::new();

        for import in imports {
            match import.desc {
                ImportDesc::Function { .. } => {
                    let thunk = self.resolve(&import.field).ok_or_else(|| {
                        kinds::missing_import(&import.module, &import.field)
                    })?;
                    debug!(
                        "resolved import {}.{} as capability {}",
                        import.module,
                        import.field,
                        capability_key(&import.field)
                    );
                    table.register(&import.module, &import.field, thunk);
                }
                _ => {
                    debug!(
                        "import {}.{} is not function-kind; left to the engine",
                        import.module, import.field
                    );
                }
            }
        }

        Ok(table)
    }
}
