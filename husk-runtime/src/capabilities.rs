//! The capability set: one thunk constructor per host behavior the guest
//! can import.
//!
//! Thunks are grouped by concern: heap bookkeeping, string marshalling,
//! environment property reads, deterministic time/randomness, storage,
//! and the closure/Promise bridge. Every thunk executes synchronously;
//! the Promise-shaped values exist only because the guest's calling
//! convention expects an asynchronous-capable host.
//!
//! Signatures follow the guest's generated glue: string-returning reads
//! take a return-record pointer as their first word; object arguments
//! arrive as heap-table handles.

use std::cell::RefCell;
use std::rc::Rc;

use husk_error::{kinds, Result};

use crate::env::{EnvObject, FingerprintConfig, HostState};
use crate::heap::HostValue;
use crate::instance::{GuestInstance, HostFunc};
use crate::marshal;
use crate::registry::capability_key;
use crate::value::{arg, Value};

/// Resolve an import field name to its thunk, if the capability exists.
pub(crate) fn resolve(state: &Rc<RefCell<HostState>>, field: &str) -> Option<HostFunc> {
    let thunk = match capability_key(field) {
        // Heap bookkeeping
        "__wbindgen_object_drop_ref" => object_drop_ref(state),
        "__wbindgen_object_clone_ref" => object_clone_ref(state),
        "__wbindgen_is_undefined" => type_test(state, |v| matches!(v, HostValue::Undefined)),
        "__wbindgen_is_string" => type_test(state, |v| matches!(v, HostValue::Str(_))),
        "__wbindgen_throw" => throw(state),

        // String marshalling
        "__wbindgen_string_new" => string_new(state),
        "__wbindgen_string_get" => string_get(state),
        "__wbindgen_error_new" => error_new(state),

        // Environment objects
        "self" | "window" => env_object(state, EnvObject::Window),
        "document" => env_object(state, EnvObject::Document),
        "navigator" => env_object(state, EnvObject::Navigator),
        "screen" => env_object(state, EnvObject::Screen),
        "localStorage" => env_object(state, EnvObject::Storage),
        "performance" => env_object(state, EnvObject::Performance),
        "new0" => env_object(state, EnvObject::Date),

        // Environment property reads
        "width" => i32_prop(state, |c| c.screen_width as i32),
        "height" => i32_prop(state, |c| c.screen_height as i32),
        "colorDepth" => i32_prop(state, |c| c.color_depth as i32),
        "platform" => string_prop(state, |c| c.platform.clone()),
        "language" => string_prop(state, |c| c.language.clone()),
        "userAgent" => string_prop(state, |c| c.user_agent.clone()),
        "getTimezoneOffset" => f64_prop(state, |c| f64::from(c.timezone_offset_minutes)),

        // Deterministic time and randomness
        "now" => f64_prop(state, |c| c.timestamp_ms),
        "random" => random(state),

        // Storage
        "getItem" => get_item(state),
        "setItem" => set_item(state),

        // Closure/Promise bridge
        "__wbindgen_closure_wrapper" => closure_wrapper(state, field),
        "__wbindgen_cb_drop" => cb_drop(state),
        "resolve" => resolve_promise(state),
        "then" => then(state),

        _ => return None,
    };
    Some(thunk)
}

/// `(slot)`: release the slot.
fn object_drop_ref(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |_guest, args| {
        let slot = arg(args, 0)?.as_u32()?;
        state.borrow_mut().heap.take(slot)?;
        Ok(vec![])
    })
}

/// `(slot) -> slot`: box a copy of the value.
fn object_clone_ref(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |_guest, args| {
        let slot = arg(args, 0)?.as_u32()?;
        let copy = state.borrow_mut().heap.clone_ref(slot)?;
        Ok(vec![Value::I32(copy as i32)])
    })
}

/// `(slot) -> i32`: 1 when the predicate holds for the slot's value.
fn type_test(
    state: &Rc<RefCell<HostState>>,
    predicate: fn(&HostValue) -> bool,
) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |_guest, args| {
        let slot = arg(args, 0)?.as_u32()?;
        let hit = predicate(state.borrow().heap.get(slot)?);
        Ok(vec![Value::I32(i32::from(hit))])
    })
}

/// `(ptr, len)`: abort the current call with the guest's message.
fn throw(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |guest, args| {
        let ptr = arg(args, 0)?.as_u32()?;
        let len = arg(args, 1)?.as_u32()?;
        let message = {
            let mut st = state.borrow_mut();
            marshal::read_guest_string(guest, &mut st.views, ptr, len)?
        };
        Err(kinds::guest_panic(message))
    })
}

/// `(ptr, len) -> slot`: box a string read from guest memory.
fn string_new(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |guest, args| {
        let ptr = arg(args, 0)?.as_u32()?;
        let len = arg(args, 1)?.as_u32()?;
        let mut st = state.borrow_mut();
        let text = marshal::read_guest_string(guest, &mut st.views, ptr, len)?;
        let slot = st.heap.insert(HostValue::Str(text));
        Ok(vec![Value::I32(slot as i32)])
    })
}

/// `(retptr, slot)`: copy the slot's string into guest memory, or write
/// a null pointer when the slot does not hold a string.
fn string_get(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |guest, args| {
        let retptr = arg(args, 0)?.as_u32()?;
        let slot = arg(args, 1)?.as_u32()?;
        let text = match state.borrow().heap.get(slot)? {
            HostValue::Str(s) => Some(s.clone()),
            _ => None,
        };
        write_string_return(state.borrow_mut(), guest, retptr, text.as_deref())?;
        Ok(vec![])
    })
}

/// `(ptr, len) -> slot`: box an error value described by guest text.
fn error_new(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |guest, args| {
        let ptr = arg(args, 0)?.as_u32()?;
        let len = arg(args, 1)?.as_u32()?;
        let mut st = state.borrow_mut();
        let text = marshal::read_guest_string(guest, &mut st.views, ptr, len)?;
        let slot = st.heap.insert(HostValue::Error(text));
        Ok(vec![Value::I32(slot as i32)])
    })
}

/// `() -> slot` (arguments, if any, are the receiver and are ignored).
fn env_object(state: &Rc<RefCell<HostState>>, object: EnvObject) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |_guest, _args| {
        let slot = state.borrow_mut().heap.insert(HostValue::Env(object));
        Ok(vec![Value::I32(slot as i32)])
    })
}

/// `(receiver_slot) -> i32` read of a fixed config field.
fn i32_prop(state: &Rc<RefCell<HostState>>, read: fn(&FingerprintConfig) -> i32) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |_guest, _args| {
        let value = read(&state.borrow().config);
        Ok(vec![Value::I32(value)])
    })
}

/// `(receiver_slot) -> f64` read of a fixed config field.
fn f64_prop(state: &Rc<RefCell<HostState>>, read: fn(&FingerprintConfig) -> f64) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |_guest, _args| {
        let value = read(&state.borrow().config);
        Ok(vec![Value::F64(value)])
    })
}

/// `(retptr, receiver_slot)` read of a fixed string config field.
fn string_prop(
    state: &Rc<RefCell<HostState>>,
    read: fn(&FingerprintConfig) -> String,
) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |guest, args| {
        let retptr = arg(args, 0)?.as_u32()?;
        let text = read(&state.borrow().config);
        write_string_return(state.borrow_mut(), guest, retptr, Some(&text))?;
        Ok(vec![])
    })
}

/// `() -> f64` from the seeded generator, never platform randomness.
fn random(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |_guest, _args| {
        let value = state.borrow_mut().rng.next_f64();
        Ok(vec![Value::F64(value)])
    })
}

/// `(retptr, storage_slot, key_ptr, key_len)`: look up a storage entry;
/// a null pointer in the record means no entry.
fn get_item(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |guest, args| {
        let retptr = arg(args, 0)?.as_u32()?;
        let storage_slot = arg(args, 1)?.as_u32()?;
        let key_ptr = arg(args, 2)?.as_u32()?;
        let key_len = arg(args, 3)?.as_u32()?;

        expect_storage(&state, storage_slot)?;
        let value = {
            let mut st = state.borrow_mut();
            let key = marshal::read_guest_string(guest, &mut st.views, key_ptr, key_len)?;
            st.storage.get(&key).map(str::to_owned)
        };
        write_string_return(state.borrow_mut(), guest, retptr, value.as_deref())?;
        Ok(vec![])
    })
}

/// `(storage_slot, key_ptr, key_len, value_ptr, value_len)`.
fn set_item(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |guest, args| {
        let storage_slot = arg(args, 0)?.as_u32()?;
        let key_ptr = arg(args, 1)?.as_u32()?;
        let key_len = arg(args, 2)?.as_u32()?;
        let value_ptr = arg(args, 3)?.as_u32()?;
        let value_len = arg(args, 4)?.as_u32()?;

        expect_storage(&state, storage_slot)?;
        let mut st = state.borrow_mut();
        let key = marshal::read_guest_string(guest, &mut st.views, key_ptr, key_len)?;
        let value = marshal::read_guest_string(guest, &mut st.views, value_ptr, value_len)?;
        st.storage.set(&key, &value);
        Ok(vec![])
    })
}

/// `(data_a, data_b, table_index) -> slot`: box a guest closure.
///
/// Generated wrapper names carry the adapter's table index as a numeric
/// suffix; when present it wins over the third argument.
fn closure_wrapper(state: &Rc<RefCell<HostState>>, field: &str) -> HostFunc {
    let state = Rc::clone(state);
    let suffix_index = field
        .strip_prefix("__wbindgen_closure_wrapper")
        .and_then(|rest| rest.parse::<u32>().ok());
    Box::new(move |_guest, args| {
        let data_a = arg(args, 0)?.as_u32()?;
        let data_b = arg(args, 1)?.as_u32()?;
        let table_index = match suffix_index {
            Some(index) => index,
            None => arg(args, 2)?.as_u32()?,
        };
        let slot = state.borrow_mut().heap.insert(HostValue::Closure {
            table_index,
            data_a,
            data_b,
        });
        Ok(vec![Value::I32(slot as i32)])
    })
}

/// `(slot) -> i32`: drop a closure handle; always reports dropped.
fn cb_drop(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |_guest, args| {
        let slot = arg(args, 0)?.as_u32()?;
        state.borrow_mut().heap.take(slot)?;
        Ok(vec![Value::I32(1)])
    })
}

/// `(value_slot) -> promise_slot`: construct an already-resolved
/// promise. The argument slot is not consumed.
fn resolve_promise(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |_guest, args| {
        let value_slot = arg(args, 0)?.as_u32()?;
        let mut st = state.borrow_mut();
        let value = st.heap.get(value_slot)?.clone();
        let slot = st.heap.insert(HostValue::Promise(Box::new(value)));
        Ok(vec![Value::I32(slot as i32)])
    })
}

/// `(promise_slot, closure_slot) -> promise_slot`: every promise here is
/// already resolved, so the continuation runs synchronously through the
/// module's function table before this thunk returns. The adapter
/// receives `(data_a, data_b, value_slot)` and owns `value_slot`.
fn then(state: &Rc<RefCell<HostState>>) -> HostFunc {
    let state = Rc::clone(state);
    Box::new(move |guest, args| {
        let promise_slot = arg(args, 0)?.as_u32()?;
        let closure_slot = arg(args, 1)?.as_u32()?;

        let (value, table_index, data_a, data_b) = {
            let st = state.borrow();
            let value = match st.heap.get(promise_slot)? {
                HostValue::Promise(inner) => (**inner).clone(),
                other => {
                    return Err(kinds::type_mismatch("promise", &other.describe()));
                }
            };
            match st.heap.get(closure_slot)? {
                HostValue::Closure {
                    table_index,
                    data_a,
                    data_b,
                } => (value, *table_index, *data_a, *data_b),
                other => {
                    return Err(kinds::type_mismatch("closure", &other.describe()));
                }
            }
        };

        let value_slot = state.borrow_mut().heap.insert(value);
        guest.invoke_table(
            table_index,
            &[
                Value::I32(data_a as i32),
                Value::I32(data_b as i32),
                Value::I32(value_slot as i32),
            ],
        )?;

        let chained = state
            .borrow_mut()
            .heap
            .insert(HostValue::Promise(Box::new(HostValue::Undefined)));
        Ok(vec![Value::I32(chained as i32)])
    })
}

fn expect_storage(state: &Rc<RefCell<HostState>>, slot: u32) -> Result<()> {
    match state.borrow().heap.get(slot)? {
        HostValue::Env(EnvObject::Storage) => Ok(()),
        other => Err(kinds::type_mismatch("storage object", &other.describe())),
    }
}

/// Write `(ptr, len)` of a freshly passed string into the first two
/// words at `retptr`, or `(0, 0)` for none.
fn write_string_return(
    mut st: std::cell::RefMut<'_, HostState>,
    guest: &mut dyn GuestInstance,
    retptr: u32,
    text: Option<&str>,
) -> Result<()> {
    let (ptr, len) = match text {
        Some(text) => marshal::pass_string_to_guest(guest, &mut st.views, text)?,
        None => (0, 0),
    };
    st.views.write_i32(guest.memory_mut(), retptr, ptr as i32)?;
    st.views.write_i32(guest.memory_mut(), retptr + 4, len as i32)?;
    Ok(())
}
