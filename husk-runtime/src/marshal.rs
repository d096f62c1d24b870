//! String marshalling and the retptr return convention.
//!
//! Strings cross the boundary as `(ptr, len)` pairs in the guest's linear
//! memory, allocated and released by the guest's own exported allocator.
//! Multi-field returns come back through a small fixed-layout record the
//! caller reserves on the guest's shadow stack.

use husk_error::{kinds, Result};
use log::trace;

use crate::instance::GuestInstance;
use crate::memory::MemoryViews;
use crate::value::{single_i32, Value};

/// Guest export: allocate `size` bytes, returning a pointer.
pub const EXPORT_MALLOC: &str = "__wbindgen_malloc";
/// Guest export: reallocate a block, returning the new pointer.
pub const EXPORT_REALLOC: &str = "__wbindgen_realloc";
/// Guest export: release a block.
pub const EXPORT_FREE: &str = "__wbindgen_free";
/// Guest export: bump the shadow stack pointer by a signed delta.
pub const EXPORT_ADD_TO_STACK_POINTER: &str = "__wbindgen_add_to_stack_pointer";

/// Size of the caller-reserved return record, in bytes.
pub const RET_RECORD_SIZE: i32 = 16;

/// The fixed-layout record string-returning exports write into the
/// caller's scratch region: four little-endian i32 words.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetRecord {
    /// Pointer to the returned bytes.
    pub ptr: u32,
    /// Length of the returned bytes.
    pub len: u32,
    /// Heap slot holding the error value, meaningful when `err_flag` is
    /// non-zero.
    pub err_slot: u32,
    /// Non-zero when the guest signalled failure.
    pub err_flag: u32,
}

/// Reserve a return record on the guest's shadow stack, run `f` with its
/// address, and restore the stack pointer afterwards, success or not.
pub fn with_scratch<T>(
    guest: &mut dyn GuestInstance,
    f: impl FnOnce(&mut dyn GuestInstance, u32) -> Result<T>,
) -> Result<T> {
    let results = guest.invoke(EXPORT_ADD_TO_STACK_POINTER, &[Value::I32(-RET_RECORD_SIZE)])?;
    let retptr = single_i32(&results)? as u32;

    let result = f(guest, retptr);

    let restore = guest.invoke(EXPORT_ADD_TO_STACK_POINTER, &[Value::I32(RET_RECORD_SIZE)]);
    match (result, restore) {
        (Ok(value), Ok(_)) => Ok(value),
        (Err(err), _) => Err(err),
        (Ok(_), Err(err)) => Err(err),
    }
}

/// Read the return record at `retptr`.
pub fn read_ret_record(
    guest: &dyn GuestInstance,
    views: &mut MemoryViews,
    retptr: u32,
) -> Result<RetRecord> {
    let memory = guest.memory();
    Ok(RetRecord {
        ptr: views.read_i32(memory, retptr)? as u32,
        len: views.read_i32(memory, retptr + 4)? as u32,
        err_slot: views.read_i32(memory, retptr + 8)? as u32,
        err_flag: views.read_i32(memory, retptr + 12)? as u32,
    })
}

/// Copy a host string into guest memory via the guest's allocator.
///
/// Two phases, matching the calling convention the guest was compiled
/// for: allocate one byte per character and copy an ASCII-only fast
/// path; at the first non-ASCII character, reallocate for the exact
/// UTF-8 remainder and encode the rest generally. Returns `(ptr, len)`.
pub fn pass_string_to_guest(
    guest: &mut dyn GuestInstance,
    views: &mut MemoryViews,
    text: &str,
) -> Result<(u32, u32)> {
    let bytes = text.as_bytes();
    let char_count = text.chars().count() as u32;

    let results = guest.invoke(EXPORT_MALLOC, &[Value::I32(char_count as i32)])?;
    let mut ptr = single_i32(&results)? as u32;

    // ASCII fast path: one byte per character until the first non-ASCII
    let mut offset = 0;
    while offset < bytes.len() && bytes[offset] < 0x80 {
        offset += 1;
    }
    views.write_bytes(guest.memory_mut(), ptr, &bytes[..offset])?;

    let mut len = offset as u32;
    if offset < bytes.len() {
        // Fall back: reallocate for the remainder and copy its UTF-8
        // encoding wholesale
        let remainder = &bytes[offset..];
        let new_len = offset as u32 + remainder.len() as u32;
        let results = guest.invoke(
            EXPORT_REALLOC,
            &[
                Value::I32(ptr as i32),
                Value::I32(char_count as i32),
                Value::I32(new_len as i32),
            ],
        )?;
        ptr = single_i32(&results)? as u32;
        views.write_bytes(guest.memory_mut(), ptr + offset as u32, remainder)?;
        len = new_len;
    }

    trace!("passed {len}-byte string to guest at {ptr}");
    Ok((ptr, len))
}

/// Decode `len` bytes at `ptr` as UTF-8 without releasing the block.
///
/// Decoding is strict: invalid UTF-8 is an encoding error, never a lossy
/// replacement, since replacement would hide a pointer or length bug.
pub fn read_guest_string(
    guest: &dyn GuestInstance,
    views: &mut MemoryViews,
    ptr: u32,
    len: u32,
) -> Result<String> {
    let bytes = views.read_bytes(guest.memory(), ptr, len)?;
    String::from_utf8(bytes).map_err(|_| {
        kinds::invalid_encoding(format!(
            "{len} bytes at {ptr} are not valid UTF-8"
        ))
    })
}

/// Decode `len` bytes at `ptr` as UTF-8, then release the block through
/// the guest's deallocator.
pub fn take_guest_string(
    guest: &mut dyn GuestInstance,
    views: &mut MemoryViews,
    ptr: u32,
    len: u32,
) -> Result<String> {
    let text = read_guest_string(guest, views, ptr, len)?;
    guest.invoke(
        EXPORT_FREE,
        &[Value::I32(ptr as i32), Value::I32(len as i32)],
    )?;
    Ok(text)
}
