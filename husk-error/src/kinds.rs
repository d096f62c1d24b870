//! Helper constructors for the common husk error kinds.

use crate::{codes, Error, ErrorCategory};

/// Structurally invalid module bytes.
pub fn corrupt_module(message: impl Into<String>) -> Error {
    Error::new(ErrorCategory::Parse, codes::CORRUPT_MODULE, message)
}

/// Truncated or over-long LEB128 integer.
pub fn malformed_varint(message: impl Into<String>) -> Error {
    Error::new(ErrorCategory::Parse, codes::MALFORMED_VARINT, message)
}

/// Section payload runs past the end of the buffer.
pub fn section_overrun(kind: &str, offset: usize) -> Error {
    Error::new(
        ErrorCategory::Parse,
        codes::SECTION_OVERRUN,
        format!("{kind} section at offset {offset} runs past end of module"),
    )
}

/// Valid construct this toolkit deliberately does not interpret.
pub fn unsupported_feature(message: impl Into<String>) -> Error {
    Error::new(
        ErrorCategory::Unsupported,
        codes::UNSUPPORTED_FEATURE,
        message,
    )
}

/// The module declares an import no registered capability satisfies.
///
/// Always names the exact `module.field` pair so the gap can be closed.
pub fn missing_import(module: &str, field: &str) -> Error {
    Error::new(
        ErrorCategory::Link,
        codes::MISSING_IMPORT,
        format!("no capability satisfies import {module}.{field}"),
    )
}

/// Engine instantiation failed.
pub fn instantiation_error(message: impl Into<String>) -> Error {
    Error::new(ErrorCategory::Link, codes::INSTANTIATION_ERROR, message)
}

/// A required export is absent from the instance.
pub fn export_not_found(name: &str) -> Error {
    Error::new(
        ErrorCategory::Link,
        codes::EXPORT_NOT_FOUND,
        format!("instance has no export named {name}"),
    )
}

/// The guest signalled failure via the error-flag convention.
pub fn guest_panic(message: impl Into<String>) -> Error {
    Error::new(ErrorCategory::Guest, codes::GUEST_PANIC, message)
}

/// A pointer/length pair did not decode as valid UTF-8.
pub fn invalid_encoding(message: impl Into<String>) -> Error {
    Error::new(ErrorCategory::Encoding, codes::INVALID_ENCODING, message)
}

/// A derived key is not exactly 64 hexadecimal characters.
pub fn invalid_key_format(message: impl Into<String>) -> Error {
    Error::new(
        ErrorCategory::Validation,
        codes::INVALID_KEY_FORMAT,
        message,
    )
}

/// A boundary value had the wrong type or width.
pub fn type_mismatch(expected: &str, got: &str) -> Error {
    Error::new(
        ErrorCategory::Validation,
        codes::TYPE_MISMATCH,
        format!("expected {expected}, got {got}"),
    )
}

/// Linear-memory access out of bounds.
pub fn memory_access(offset: usize, len: usize, size: usize) -> Error {
    Error::new(
        ErrorCategory::Memory,
        codes::MEMORY_ACCESS,
        format!("access of {len} bytes at {offset} exceeds memory size {size}"),
    )
}

/// Heap-table slot misuse (stale or free handle).
pub fn invalid_heap_slot(slot: u32) -> Error {
    Error::new(
        ErrorCategory::Runtime,
        codes::INVALID_HEAP_SLOT,
        format!("heap slot {slot} is not live"),
    )
}

/// Overlapping calls on one instance.
pub fn reentrant_call(export: &str) -> Error {
    Error::new(
        ErrorCategory::Runtime,
        codes::REENTRANT_CALL,
        format!("call to {export} while another call is in flight on this instance"),
    )
}
