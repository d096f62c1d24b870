//! Binary format primitives for the husk toolkit.
//!
//! This crate owns the two layers everything else builds on: the LEB128
//! variable-length integer codec plus the raw header/section constants
//! ([`binary`]), and the structural records a decoded module is made of
//! ([`module`]).
//!
//! Nothing here interprets instruction bytes; code bodies are carried as
//! opaque byte ranges.

#![forbid(unsafe_code)]

pub mod binary;
pub mod module;

pub use module::{
    DataMode, DataSegment, Export, ExportKind, FuncType, FunctionBody, FunctionRef, Import,
    ImportDesc, Limits, Module, Section, SectionKind, ValueType,
};
