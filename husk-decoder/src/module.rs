//! Top-level module decoding: header validation and the section walk.

use husk_error::{kinds, Result};
use husk_format::binary::{
    read_section_header, read_string, CUSTOM_SECTION_ID, HEADER_SIZE, WASM_MAGIC, WASM_VERSION,
};
use husk_format::{ImportDesc, Module, Section, SectionKind};
use log::{debug, warn};

use crate::sections;

/// Decode a module binary into its structural record.
///
/// Fails with a parse error on the first structural problem; no partial
/// module is ever returned. Decoding is deterministic: identical bytes
/// produce identical structures, including every recorded offset.
pub fn decode_module(bytes: &[u8]) -> Result<Module> {
    if bytes.len() < HEADER_SIZE {
        return Err(kinds::corrupt_module(format!(
            "module of {} bytes is shorter than the 8-byte header",
            bytes.len()
        )));
    }
    if bytes[0..4] != WASM_MAGIC {
        return Err(kinds::corrupt_module("invalid magic bytes"));
    }
    if bytes[4..8] != WASM_VERSION {
        return Err(kinds::corrupt_module(format!(
            "unsupported version {:?}",
            &bytes[4..8]
        )));
    }

    let mut module = Module::default();
    let mut seen = [false; 13];
    let mut pos = HEADER_SIZE;

    while pos < bytes.len() {
        let (id, size, payload_start) = read_section_header(bytes, pos)?;
        let payload_end = payload_start
            .checked_add(size as usize)
            .ok_or_else(|| kinds::corrupt_module("section size overflow"))?;
        if payload_end > bytes.len() {
            let kind = SectionKind::from_id(id);
            return Err(kinds::section_overrun(&format!("{kind:?}"), pos));
        }
        let payload = &bytes[payload_start..payload_end];
        let kind = SectionKind::from_id(id);

        // At most one of each non-custom kind
        if kind != SectionKind::Custom {
            let slot = &mut seen[id as usize];
            if *slot {
                return Err(husk_error::Error::new(
                    husk_error::ErrorCategory::Parse,
                    husk_error::codes::DUPLICATE_SECTION,
                    format!("duplicate {kind:?} section at offset {pos}"),
                ));
            }
            *slot = true;
        }

        debug!("section {kind:?} ({size} bytes at {payload_start})");

        let name = if id == CUSTOM_SECTION_ID {
            match read_string(payload, 0) {
                Ok((name, _)) => Some(name),
                Err(_) => {
                    debug!("custom section at {payload_start} has no decodable name");
                    None
                }
            }
        } else {
            None
        };

        module.sections.push(Section {
            kind,
            byte_offset: payload_start,
            byte_length: size as usize,
            name,
        });

        match kind {
            SectionKind::Type => module.types = sections::parse_type_section(payload)?,
            SectionKind::Import => {
                module.imports = sections::parse_import_section(payload)?;
                module.import_function_count = module
                    .imports
                    .iter()
                    .filter(|i| matches!(i.desc, ImportDesc::Function { .. }))
                    .count() as u32;
            }
            SectionKind::Function => {
                module.functions = sections::parse_function_section(payload)?;
            }
            SectionKind::Memory => module.memories = sections::parse_memory_section(payload)?,
            SectionKind::Export => module.exports = sections::parse_export_section(payload)?,
            SectionKind::Code => {
                module.bodies = sections::parse_code_section(
                    payload,
                    payload_start,
                    module.import_function_count,
                )?;
            }
            SectionKind::Data => module.data = sections::parse_data_section(payload)?,
            // Recorded as spans only
            SectionKind::Custom
            | SectionKind::Table
            | SectionKind::Global
            | SectionKind::Start
            | SectionKind::Element
            | SectionKind::DataCount => {}
        }

        pos = payload_end;
    }

    if !module.bodies.is_empty() && module.bodies.len() != module.functions.len() {
        warn!(
            "code section has {} bodies but function section declares {}",
            module.bodies.len(),
            module.functions.len()
        );
    }

    Ok(module)
}
