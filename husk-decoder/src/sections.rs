//! Per-section decoders.
//!
//! Each function takes a section payload and returns fully decoded entries.
//! Offsets recorded in the results are absolute into the module bytes, so
//! callers pass the payload's absolute start where needed.

use husk_error::{kinds, Result};
use husk_format::binary::{
    read_leb128_i32, read_leb128_u32, read_string, FUNC_TYPE_TAG, OP_END, OP_I32_CONST,
};
use husk_format::{
    DataMode, DataSegment, Export, ExportKind, FuncType, FunctionBody, Import, ImportDesc, Limits,
    ValueType,
};

/// Import kind tags.
const IMPORT_KIND_FUNCTION: u8 = 0x00;
const IMPORT_KIND_TABLE: u8 = 0x01;
const IMPORT_KIND_MEMORY: u8 = 0x02;
const IMPORT_KIND_GLOBAL: u8 = 0x03;

fn read_value_type(bytes: &[u8], pos: usize) -> Result<(ValueType, usize)> {
    let byte = *bytes
        .get(pos)
        .ok_or_else(|| kinds::corrupt_module(format!("expected value type at offset {pos}")))?;
    let vt = ValueType::from_byte(byte).ok_or_else(|| {
        kinds::corrupt_module(format!("invalid value type 0x{byte:02X} at offset {pos}"))
    })?;
    Ok((vt, 1))
}

fn read_limits(bytes: &[u8], pos: usize) -> Result<(Limits, usize)> {
    let flags = *bytes
        .get(pos)
        .ok_or_else(|| kinds::corrupt_module(format!("expected limits at offset {pos}")))?;
    let mut offset = pos + 1;
    let (min, n) = read_leb128_u32(bytes, offset)?;
    offset += n;
    let max = match flags {
        0x00 => None,
        0x01 => {
            let (max, n) = read_leb128_u32(bytes, offset)?;
            offset += n;
            Some(max)
        }
        other => {
            return Err(kinds::corrupt_module(format!(
                "invalid limits flags 0x{other:02X} at offset {pos}"
            )))
        }
    };
    Ok((Limits { min, max }, offset - pos))
}

/// Decode the type section.
pub fn parse_type_section(bytes: &[u8]) -> Result<Vec<FuncType>> {
    let (count, mut offset) = read_leb128_u32(bytes, 0)?;
    let mut types = Vec::with_capacity(count as usize);

    for _ in 0..count {
        // Function type tag (0x60)
        match bytes.get(offset) {
            Some(&FUNC_TYPE_TAG) => offset += 1,
            Some(&other) => {
                return Err(kinds::corrupt_module(format!(
                    "expected function type tag 0x60, found 0x{other:02X}"
                )))
            }
            None => {
                return Err(kinds::corrupt_module(
                    "type section ends before function type tag",
                ))
            }
        }

        let (param_count, n) = read_leb128_u32(bytes, offset)?;
        offset += n;
        let mut params = Vec::with_capacity(param_count as usize);
        for _ in 0..param_count {
            let (vt, n) = read_value_type(bytes, offset)?;
            offset += n;
            params.push(vt);
        }

        let (result_count, n) = read_leb128_u32(bytes, offset)?;
        offset += n;
        let mut results = Vec::with_capacity(result_count as usize);
        for _ in 0..result_count {
            let (vt, n) = read_value_type(bytes, offset)?;
            offset += n;
            results.push(vt);
        }

        types.push(FuncType { params, results });
    }

    Ok(types)
}

/// Decode the import section.
///
/// Function and memory kinds are decoded fully; table and global kinds are
/// recorded structurally.
pub fn parse_import_section(bytes: &[u8]) -> Result<Vec<Import>> {
    let (count, mut offset) = read_leb128_u32(bytes, 0)?;
    let mut imports = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let (module, n) = read_string(bytes, offset)?;
        offset += n;
        let (field, n) = read_string(bytes, offset)?;
        offset += n;

        let kind = *bytes.get(offset).ok_or_else(|| {
            kinds::corrupt_module(format!("expected import kind at offset {offset}"))
        })?;
        offset += 1;

        let desc = match kind {
            IMPORT_KIND_FUNCTION => {
                let (type_index, n) = read_leb128_u32(bytes, offset)?;
                offset += n;
                ImportDesc::Function { type_index }
            }
            IMPORT_KIND_TABLE => {
                let element_type = *bytes.get(offset).ok_or_else(|| {
                    kinds::corrupt_module(format!("expected element type at offset {offset}"))
                })?;
                offset += 1;
                let (limits, n) = read_limits(bytes, offset)?;
                offset += n;
                ImportDesc::Table {
                    element_type,
                    limits,
                }
            }
            IMPORT_KIND_MEMORY => {
                let (limits, n) = read_limits(bytes, offset)?;
                offset += n;
                ImportDesc::Memory { limits }
            }
            IMPORT_KIND_GLOBAL => {
                let (value_type, n) = read_value_type(bytes, offset)?;
                offset += n;
                let mutable = match bytes.get(offset) {
                    Some(0x00) => false,
                    Some(0x01) => true,
                    Some(&other) => {
                        return Err(kinds::corrupt_module(format!(
                            "invalid global mutability 0x{other:02X}"
                        )))
                    }
                    None => {
                        return Err(kinds::corrupt_module(
                            "import section ends before global mutability",
                        ))
                    }
                };
                offset += 1;
                ImportDesc::Global {
                    value_type,
                    mutable,
                }
            }
            other => {
                return Err(kinds::corrupt_module(format!(
                    "invalid import kind 0x{other:02X} for {module}.{field}"
                )))
            }
        };

        imports.push(Import {
            module,
            field,
            desc,
        });
    }

    Ok(imports)
}

/// Decode the function section into type indices.
pub fn parse_function_section(bytes: &[u8]) -> Result<Vec<u32>> {
    let (count, mut offset) = read_leb128_u32(bytes, 0)?;
    let mut indices = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let (index, n) = read_leb128_u32(bytes, offset)?;
        offset += n;
        indices.push(index);
    }

    Ok(indices)
}

/// Decode the memory section.
pub fn parse_memory_section(bytes: &[u8]) -> Result<Vec<Limits>> {
    let (count, mut offset) = read_leb128_u32(bytes, 0)?;
    let mut memories = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let (limits, n) = read_limits(bytes, offset)?;
        offset += n;
        memories.push(limits);
    }

    Ok(memories)
}

/// Decode the export section.
pub fn parse_export_section(bytes: &[u8]) -> Result<Vec<Export>> {
    let (count, mut offset) = read_leb128_u32(bytes, 0)?;
    let mut exports = Vec::with_capacity(count as usize);

    for _ in 0..count {
        let (name, n) = read_string(bytes, offset)?;
        offset += n;

        let kind = match bytes.get(offset) {
            Some(0x00) => ExportKind::Function,
            Some(0x01) => ExportKind::Table,
            Some(0x02) => ExportKind::Memory,
            Some(0x03) => ExportKind::Global,
            Some(&other) => {
                return Err(kinds::corrupt_module(format!(
                    "invalid export kind 0x{other:02X} for {name}"
                )))
            }
            None => {
                return Err(kinds::corrupt_module(
                    "export section ends before export kind",
                ))
            }
        };
        offset += 1;

        let (index, n) = read_leb128_u32(bytes, offset)?;
        offset += n;

        exports.push(Export { name, kind, index });
    }

    Ok(exports)
}

/// Decode the code section.
///
/// `section_offset` is the absolute offset of the section payload within
/// the module bytes; recorded code ranges are absolute. The locals vector
/// is itself variable-length and must be skipped before the instruction
/// bytes begin; the recorded range spans only the raw instruction bytes.
pub fn parse_code_section(
    bytes: &[u8],
    section_offset: usize,
    import_function_count: u32,
) -> Result<Vec<FunctionBody>> {
    let (count, mut offset) = read_leb128_u32(bytes, 0)?;
    let mut bodies = Vec::with_capacity(count as usize);

    for i in 0..count {
        let (body_size, n) = read_leb128_u32(bytes, offset)?;
        offset += n;
        let body_end = offset
            .checked_add(body_size as usize)
            .ok_or_else(|| kinds::corrupt_module("code body size overflow"))?;
        if body_end > bytes.len() {
            return Err(kinds::corrupt_module(format!(
                "code body {i} of {body_size} bytes runs past end of section"
            )));
        }

        let (local_runs, n) = read_leb128_u32(bytes, offset)?;
        let mut pos = offset + n;
        let mut locals = Vec::with_capacity(local_runs as usize);
        for _ in 0..local_runs {
            let (run_count, n) = read_leb128_u32(bytes, pos)?;
            pos += n;
            let (vt, n) = read_value_type(bytes, pos)?;
            pos += n;
            locals.push((run_count, vt));
        }

        if pos > body_end {
            return Err(kinds::corrupt_module(format!(
                "locals vector of code body {i} runs past the declared body size"
            )));
        }

        bodies.push(FunctionBody {
            func_index: import_function_count + i,
            locals,
            code_offset: section_offset + pos,
            code_len: body_end - pos,
        });

        offset = body_end;
    }

    Ok(bodies)
}

/// Decode the data section.
///
/// Only the single-instruction `i32.const n; end` offset expression is
/// evaluated; any other well-formed expression is an unsupported-feature
/// failure rather than a crash.
pub fn parse_data_section(bytes: &[u8]) -> Result<Vec<DataSegment>> {
    let (count, mut offset) = read_leb128_u32(bytes, 0)?;
    let mut segments = Vec::with_capacity(count as usize);

    for i in 0..count {
        let (flags, n) = read_leb128_u32(bytes, offset)?;
        offset += n;

        let (mode, memory_index, init_offset) = match flags {
            0x00 => {
                let (value, n) = read_init_offset(bytes, offset, i)?;
                offset += n;
                (DataMode::Active, 0, Some(value))
            }
            0x01 => (DataMode::Passive, 0, None),
            0x02 => {
                let (memory_index, n) = read_leb128_u32(bytes, offset)?;
                offset += n;
                let (value, n) = read_init_offset(bytes, offset, i)?;
                offset += n;
                (DataMode::Active, memory_index, Some(value))
            }
            other => {
                return Err(kinds::corrupt_module(format!(
                    "invalid data segment flags 0x{other:02X}"
                )))
            }
        };

        let (payload_len, n) = read_leb128_u32(bytes, offset)?;
        offset += n;
        let end = offset
            .checked_add(payload_len as usize)
            .ok_or_else(|| kinds::corrupt_module("data payload size overflow"))?;
        if end > bytes.len() {
            return Err(kinds::corrupt_module(format!(
                "data segment {i} of {payload_len} bytes runs past end of section"
            )));
        }

        segments.push(DataSegment {
            mode,
            memory_index,
            init_offset,
            payload: bytes[offset..end].to_vec(),
        });
        offset = end;
    }

    Ok(segments)
}

/// Evaluate a data segment offset expression of the form
/// `i32.const n; end`.
fn read_init_offset(bytes: &[u8], pos: usize, segment: u32) -> Result<(u32, usize)> {
    match bytes.get(pos) {
        Some(&OP_I32_CONST) => {}
        Some(&other) => {
            return Err(kinds::unsupported_feature(format!(
                "data segment {segment} init expression starts with opcode 0x{other:02X}; \
                 only i32.const is supported"
            )))
        }
        None => {
            return Err(kinds::corrupt_module(
                "data section ends before init expression",
            ))
        }
    }

    let (value, n) = read_leb128_i32(bytes, pos + 1)?;
    let end_pos = pos + 1 + n;
    match bytes.get(end_pos) {
        Some(&OP_END) => {}
        Some(_) => {
            return Err(kinds::unsupported_feature(format!(
                "data segment {segment} init expression is longer than a single i32.const"
            )))
        }
        None => {
            return Err(kinds::corrupt_module(
                "data section ends before init expression terminator",
            ))
        }
    }

    // Offsets are i32 on the wire but addressed unsigned
    Ok((value as u32, 1 + n + 1))
}
