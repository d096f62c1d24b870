//! Error codes for husk.

// Parse errors (1000-1099)
/// Structurally invalid module bytes.
pub const CORRUPT_MODULE: u16 = 1000;
/// Truncated or over-long LEB128 integer.
pub const MALFORMED_VARINT: u16 = 1001;
/// Section payload runs past the end of the buffer.
pub const SECTION_OVERRUN: u16 = 1002;
/// Invalid function type tag (expected 0x60).
pub const INVALID_TYPE_TAG: u16 = 1003;
/// Duplicate non-custom section.
pub const DUPLICATE_SECTION: u16 = 1004;

// Unsupported constructs (1100-1199)
/// Valid construct this toolkit deliberately does not interpret.
pub const UNSUPPORTED_FEATURE: u16 = 1100;

// Link errors (1200-1299)
/// The module declares an import the runtime has no thunk for.
pub const MISSING_IMPORT: u16 = 1200;
/// Engine instantiation failed.
pub const INSTANTIATION_ERROR: u16 = 1201;
/// A required export is absent from the instance.
pub const EXPORT_NOT_FOUND: u16 = 1202;

// Guest-signalled errors (1300-1399)
/// The guest signalled failure via the error-flag convention.
pub const GUEST_PANIC: u16 = 1300;

// Encoding errors (1400-1499)
/// A pointer/length pair did not decode as valid UTF-8.
pub const INVALID_ENCODING: u16 = 1400;

// Validation errors (1500-1599)
/// A derived key is not exactly 64 hexadecimal characters.
pub const INVALID_KEY_FORMAT: u16 = 1500;
/// A boundary value had the wrong type or width.
pub const TYPE_MISMATCH: u16 = 1501;

// Memory errors (1600-1699)
/// Linear-memory access out of bounds.
pub const MEMORY_ACCESS: u16 = 1600;

// Runtime errors (1700-1799)
/// Heap-table slot misuse (stale or free handle).
pub const INVALID_HEAP_SLOT: u16 = 1700;
/// Overlapping calls on one instance.
pub const REENTRANT_CALL: u16 = 1701;
