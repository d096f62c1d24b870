//! Structural records for a decoded module.
//!
//! These types carry exactly what the decoder found: section spans, type
//! signatures, the import/export surface, code-body byte ranges, and data
//! segments. Code bodies are never interpreted here.

use crate::binary;

/// Top-level section kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SectionKind {
    /// Custom (named) section, ignored beyond recording its span.
    Custom,
    /// Type section.
    Type,
    /// Import section.
    Import,
    /// Function section.
    Function,
    /// Table section.
    Table,
    /// Memory section.
    Memory,
    /// Global section.
    Global,
    /// Export section.
    Export,
    /// Start section.
    Start,
    /// Element section.
    Element,
    /// Code section.
    Code,
    /// Data section.
    Data,
    /// Data count section.
    DataCount,
}

impl SectionKind {
    /// Map a section id byte to its kind.
    ///
    /// Unknown ids map to `Custom`: the format explicitly allows
    /// forward-compatible sections, which are retained as opaque spans
    /// rather than rejected.
    pub fn from_id(id: u8) -> Self {
        match id {
            binary::TYPE_SECTION_ID => Self::Type,
            binary::IMPORT_SECTION_ID => Self::Import,
            binary::FUNCTION_SECTION_ID => Self::Function,
            binary::TABLE_SECTION_ID => Self::Table,
            binary::MEMORY_SECTION_ID => Self::Memory,
            binary::GLOBAL_SECTION_ID => Self::Global,
            binary::EXPORT_SECTION_ID => Self::Export,
            binary::START_SECTION_ID => Self::Start,
            binary::ELEMENT_SECTION_ID => Self::Element,
            binary::CODE_SECTION_ID => Self::Code,
            binary::DATA_SECTION_ID => Self::Data,
            binary::DATA_COUNT_SECTION_ID => Self::DataCount,
            _ => Self::Custom,
        }
    }
}

/// Span of one top-level section within the module bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section kind.
    pub kind: SectionKind,
    /// Offset of the first payload byte.
    pub byte_offset: usize,
    /// Payload length in bytes.
    pub byte_length: usize,
    /// Name, decoded for custom sections only.
    pub name: Option<String>,
}

/// WebAssembly value types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// 32-bit integer
    I32,
    /// 64-bit integer
    I64,
    /// 32-bit float
    F32,
    /// 64-bit float
    F64,
    /// 128-bit SIMD vector
    V128,
    /// Function reference
    FuncRef,
    /// External reference
    ExternRef,
}

impl ValueType {
    /// Map a value type byte to its type, if known.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            binary::I32_TYPE => Some(Self::I32),
            binary::I64_TYPE => Some(Self::I64),
            binary::F32_TYPE => Some(Self::F32),
            binary::F64_TYPE => Some(Self::F64),
            binary::V128_TYPE => Some(Self::V128),
            binary::FUNCREF_TYPE => Some(Self::FuncRef),
            binary::EXTERNREF_TYPE => Some(Self::ExternRef),
            _ => None,
        }
    }
}

/// A function signature from the type section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FuncType {
    /// Parameter types in declaration order.
    pub params: Vec<ValueType>,
    /// Result types in declaration order.
    pub results: Vec<ValueType>,
}

/// Memory or table size limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Initial size (pages for memories, elements for tables).
    pub min: u32,
    /// Optional maximum size.
    pub max: Option<u32>,
}

/// What an import entry binds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportDesc {
    /// Function import with its type-section index.
    Function {
        /// Index into the type section.
        type_index: u32,
    },
    /// Memory import.
    Memory {
        /// Declared limits.
        limits: Limits,
    },
    /// Table import, recorded structurally.
    Table {
        /// Element type byte as declared.
        element_type: u8,
        /// Declared limits.
        limits: Limits,
    },
    /// Global import, recorded structurally.
    Global {
        /// Value type of the global.
        value_type: ValueType,
        /// Whether the global is mutable.
        mutable: bool,
    },
}

/// One entry of the import section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Module name the import is resolved under.
    pub module: String,
    /// Field name within that module.
    pub field: String,
    /// What the import binds.
    pub desc: ImportDesc,
}

/// Export kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportKind {
    /// Function export.
    Function,
    /// Table export.
    Table,
    /// Memory export.
    Memory,
    /// Global export.
    Global,
}

/// One entry of the export section.
///
/// Function indices are interpreted in the shared index space: imported
/// functions first, in declaration order, then defined functions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Export {
    /// Export name.
    pub name: String,
    /// Export kind.
    pub kind: ExportKind,
    /// Index into the corresponding index space.
    pub index: u32,
}

/// One entry of the code section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionBody {
    /// Index of this function in the shared function index space.
    pub func_index: u32,
    /// Local declarations as `(run_count, type)` pairs.
    pub locals: Vec<(u32, ValueType)>,
    /// Absolute offset of the first instruction byte, after the locals
    /// vector.
    pub code_offset: usize,
    /// Length of the raw instruction bytes.
    pub code_len: usize,
}

/// Data segment placement modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// Placed into a memory at instantiation.
    Active,
    /// No placement until a runtime initializes it.
    Passive,
}

/// One entry of the data section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSegment {
    /// Placement mode.
    pub mode: DataMode,
    /// Target memory index (active segments).
    pub memory_index: u32,
    /// Evaluated `i32.const` placement offset; `None` for passive
    /// segments.
    pub init_offset: Option<u32>,
    /// Raw payload bytes.
    pub payload: Vec<u8>,
}

/// Where a function index resolves in the shared index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionRef {
    /// The i-th function-kind import, in declaration order.
    Imported(u32),
    /// The i-th entry of the function section.
    Defined(u32),
}

/// A fully decoded module.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Module {
    /// Every top-level section span, in order of appearance.
    pub sections: Vec<Section>,
    /// Type section entries.
    pub types: Vec<FuncType>,
    /// Import section entries.
    pub imports: Vec<Import>,
    /// Type indices of defined functions, in function-section order.
    pub functions: Vec<u32>,
    /// Memory section limits.
    pub memories: Vec<Limits>,
    /// Export section entries.
    pub exports: Vec<Export>,
    /// Code section bodies, in order.
    pub bodies: Vec<FunctionBody>,
    /// Data section segments, in order.
    pub data: Vec<DataSegment>,
    /// Number of function-kind imports.
    ///
    /// This is the base offset between the import index space and the
    /// function section: function index `i` refers to import `i` when
    /// `i < import_function_count`, otherwise to defined function
    /// `i - import_function_count`.
    pub import_function_count: u32,
}

impl Module {
    /// Resolve a function index in the shared index space.
    pub fn resolve_function(&self, func_index: u32) -> Option<FunctionRef> {
        if func_index < self.import_function_count {
            Some(FunctionRef::Imported(func_index))
        } else {
            let defined = func_index - self.import_function_count;
            if (defined as usize) < self.functions.len() {
                Some(FunctionRef::Defined(defined))
            } else {
                None
            }
        }
    }

    /// Type-section index of the function at `func_index`, if it exists.
    pub fn func_type_index(&self, func_index: u32) -> Option<u32> {
        match self.resolve_function(func_index)? {
            FunctionRef::Imported(i) => {
                let mut seen = 0u32;
                for import in &self.imports {
                    if let ImportDesc::Function { type_index } = import.desc {
                        if seen == i {
                            return Some(type_index);
                        }
                        seen += 1;
                    }
                }
                None
            }
            FunctionRef::Defined(i) => self.functions.get(i as usize).copied(),
        }
    }

    /// The full function index space, monotonically ordered.
    pub fn function_index_space(&self) -> Vec<FunctionRef> {
        let mut space = Vec::with_capacity(
            self.import_function_count as usize + self.functions.len(),
        );
        for i in 0..self.import_function_count {
            space.push(FunctionRef::Imported(i));
        }
        for i in 0..self.functions.len() as u32 {
            space.push(FunctionRef::Defined(i));
        }
        space
    }

    /// Find an export by name.
    pub fn find_export(&self, name: &str) -> Option<&Export> {
        self.exports.iter().find(|e| e.name == name)
    }
}
