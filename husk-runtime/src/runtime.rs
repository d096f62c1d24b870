//! The host runtime: building an instance and crossing the boundary.

use std::cell::RefCell;
use std::rc::Rc;

use husk_error::{kinds, Result};
use husk_format::Module;
use log::debug;

use crate::env::{FingerprintConfig, HostState};
use crate::instance::{GuestInstance, ModuleEngine};
use crate::marshal;
use crate::registry::CapabilityRegistry;
use crate::value::Value;

/// Guest export that derives the session key.
pub const EXPORT_DERIVE_KEY: &str = "get_key";
/// Guest export that transforms a payload under a key.
pub const EXPORT_TRANSFORM: &str = "transform";

/// Length of a well-formed derived key, in hex characters.
const KEY_HEX_LEN: usize = 64;

/// Builder for [`HostRuntimeInstance`]s.
pub struct HostRuntime;

impl HostRuntime {
    /// Resolve the module's declared imports, instantiate it through
    /// `engine`, and return the live instance.
    ///
    /// Any function-kind import the capability set does not cover fails
    /// here, before any export is callable; there is no partial-import
    /// fallback.
    pub fn instantiate(
        engine: &mut dyn ModuleEngine,
        module: &Module,
        config: FingerprintConfig,
    ) -> Result<HostRuntimeInstance> {
        let state = Rc::new(RefCell::new(HostState::new(config)));
        let registry = CapabilityRegistry::new(Rc::clone(&state));
        let imports = registry.build_import_table(&module.imports)?;
        debug!(
            "import table resolved: {} thunks for {} declared imports",
            imports.len(),
            module.imports.len()
        );

        let instance = engine.instantiate(imports)?;
        Ok(HostRuntimeInstance {
            state,
            instance,
            in_call: false,
        })
    }
}

/// One live instance: the guest, its heap table, its view cache, and the
/// scratch discipline for boundary-crossing calls.
///
/// Not safe for concurrent callers: the scratch region the return-value
/// convention uses is reused call-to-call, so calls on one instance must
/// be serialized. True parallelism requires one fully independent
/// instance per caller. After a guest panic the instance's internal
/// state is not guaranteed consistent; discard it and build a fresh one
/// rather than retrying.
pub struct HostRuntimeInstance {
    state: Rc<RefCell<HostState>>,
    instance: Box<dyn GuestInstance>,
    in_call: bool,
}

impl std::fmt::Debug for HostRuntimeInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostRuntimeInstance")
            .field("state", &self.state)
            .field("in_call", &self.in_call)
            .finish_non_exhaustive()
    }
}

impl HostRuntimeInstance {
    /// Call the guest's key-derivation export and validate its shape.
    ///
    /// The result is exactly 64 hexadecimal characters; anything else is
    /// an invalid-key-format error, never silently accepted.
    pub fn derive_session_key(&mut self) -> Result<String> {
        self.enter(EXPORT_DERIVE_KEY)?;
        let result = self.derive_session_key_inner();
        self.in_call = false;
        result
    }

    fn derive_session_key_inner(&mut self) -> Result<String> {
        let state = &self.state;
        let key = marshal::with_scratch(self.instance.as_mut(), |guest, retptr| {
            guest.invoke(EXPORT_DERIVE_KEY, &[Value::I32(retptr as i32)])?;
            let record = {
                let mut st = state.borrow_mut();
                marshal::read_ret_record(guest, &mut st.views, retptr)?
            };
            if record.err_flag != 0 {
                let thrown = state.borrow_mut().heap.take(record.err_slot)?;
                return Err(kinds::guest_panic(thrown.describe()));
            }
            let mut st = state.borrow_mut();
            marshal::take_guest_string(guest, &mut st.views, record.ptr, record.len)
        })?;

        if key.len() != KEY_HEX_LEN || !key.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(kinds::invalid_key_format(format!(
                "derived key of {} chars is not {KEY_HEX_LEN} hex characters",
                key.len()
            )));
        }
        Ok(key)
    }

    /// Marshal `payload` and `key` to the guest, call its transform
    /// export, and decode the result.
    pub fn transform(&mut self, payload: &str, key: &str) -> Result<String> {
        self.enter(EXPORT_TRANSFORM)?;
        let result = self.transform_inner(payload, key);
        self.in_call = false;
        result
    }

    fn transform_inner(&mut self, payload: &str, key: &str) -> Result<String> {
        let state = &self.state;
        marshal::with_scratch(self.instance.as_mut(), |guest, retptr| {
            let (payload_ptr, payload_len) = {
                let mut st = state.borrow_mut();
                marshal::pass_string_to_guest(guest, &mut st.views, payload)?
            };
            let (key_ptr, key_len) = {
                let mut st = state.borrow_mut();
                marshal::pass_string_to_guest(guest, &mut st.views, key)?
            };

            guest.invoke(
                EXPORT_TRANSFORM,
                &[
                    Value::I32(retptr as i32),
                    Value::I32(payload_ptr as i32),
                    Value::I32(payload_len as i32),
                    Value::I32(key_ptr as i32),
                    Value::I32(key_len as i32),
                ],
            )?;

            let record = {
                let mut st = state.borrow_mut();
                marshal::read_ret_record(guest, &mut st.views, retptr)?
            };
            if record.err_flag != 0 {
                let thrown = state.borrow_mut().heap.take(record.err_slot)?;
                return Err(kinds::guest_panic(thrown.describe()));
            }
            let mut st = state.borrow_mut();
            marshal::take_guest_string(guest, &mut st.views, record.ptr, record.len)
        })
    }

    /// Occupied heap-table slots, for leak accounting.
    pub fn live_heap_slots(&self) -> usize {
        self.state.borrow().heap.live_count()
    }

    fn enter(&mut self, export: &str) -> Result<()> {
        if self.in_call {
            return Err(kinds::reentrant_call(export));
        }
        self.in_call = true;
        Ok(())
    }
}
