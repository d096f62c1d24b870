//! Module decoder for the husk toolkit.
//!
//! [`decode_module`] walks a module binary section by section and produces
//! the structural [`husk_format::Module`] record: type signatures, the
//! import/export surface, code-body byte ranges, and data segments.
//!
//! The decoder has no hidden state and performs no heuristic guessing:
//! decoding the same bytes twice yields identical structures, including
//! every offset. Errors abort decoding immediately; callers never receive
//! a partially populated module.

#![forbid(unsafe_code)]

mod module;
pub mod sections;

pub use module::decode_module;
