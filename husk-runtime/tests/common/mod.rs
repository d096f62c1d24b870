//! A scripted guest standing in for a real module-execution engine.
//!
//! `FixtureInstance` implements the guest ABI the runtime expects (the
//! exported allocator, the shadow stack pointer, and the return-record
//! convention) entirely in Rust, so marshalling and import dispatch can
//! be exercised without executing any bytecode. Its `get_key` export
//! builds a fingerprint string through the same import thunks a real
//! guest would call, then hashes it with SHA-256.

#![allow(dead_code)]

use husk_error::{kinds, Result};
use husk_format::{Import, ImportDesc, Module};
use husk_runtime::env::Mulberry32;
use husk_runtime::{
    FingerprintConfig, GuestInstance, ImportTable, LinearMemory, ModuleEngine, Value,
};
use sha2::{Digest, Sha256};

pub const IMPORT_MODULE: &str = "wbg";

pub const IMPORT_DROP_REF: &str = "__wbindgen_object_drop_ref";
pub const IMPORT_CLONE_REF: &str = "__wbindgen_object_clone_ref";
pub const IMPORT_STRING_NEW: &str = "__wbindgen_string_new";
pub const IMPORT_STRING_GET: &str = "__wbindgen_string_get";
pub const IMPORT_ERROR_NEW: &str = "__wbindgen_error_new";
pub const IMPORT_IS_UNDEFINED: &str = "__wbindgen_is_undefined";
pub const IMPORT_THROW: &str = "__wbindgen_throw";
pub const IMPORT_CB_DROP: &str = "__wbindgen_cb_drop";
pub const IMPORT_CLOSURE_WRAPPER: &str = "__wbindgen_closure_wrapper588";
pub const IMPORT_SELF: &str = "__wbg_self_05040bd9523805b9";
pub const IMPORT_NAVIGATOR: &str = "__wbg_navigator_56a78cb27f6d8fe4";
pub const IMPORT_SCREEN: &str = "__wbg_screen_3c4b4e2fcb16a2aa";
pub const IMPORT_LOCAL_STORAGE: &str = "__wbg_localStorage_e381d34b0c40a216";
pub const IMPORT_GET_ITEM: &str = "__wbg_getItem_17f98dee3b43fa7e";
pub const IMPORT_SET_ITEM: &str = "__wbg_setItem_9482185c870abba6";
pub const IMPORT_WIDTH: &str = "__wbg_width_aa6563a4ee219ad4";
pub const IMPORT_HEIGHT: &str = "__wbg_height_95ba2b7fcfbcd9fd";
pub const IMPORT_COLOR_DEPTH: &str = "__wbg_colorDepth_8e6cdcaa2f4ba6ff";
pub const IMPORT_USER_AGENT: &str = "__wbg_userAgent_272bdd82b00b6b4e";
pub const IMPORT_PLATFORM: &str = "__wbg_platform_7c87fb9b0f62bdcc";
pub const IMPORT_LANGUAGE: &str = "__wbg_language_da2b4525f70b7fd2";
pub const IMPORT_NEW_DATE: &str = "__wbg_new0_25059fbc3f4cf6f0";
pub const IMPORT_TIMEZONE_OFFSET: &str = "__wbg_getTimezoneOffset_38257ad3a1f58a2d";
pub const IMPORT_NOW: &str = "__wbg_now_8c2d62e8295e7bdf";
pub const IMPORT_RANDOM: &str = "__wbg_random_afd9e945b57274a4";
pub const IMPORT_RESOLVE: &str = "__wbg_resolve_0aad7c1484731c99";
pub const IMPORT_THEN: &str = "__wbg_then_748f75edfb032440";

/// Every import the fixture module declares, in declaration order.
pub const FIXTURE_IMPORTS: &[&str] = &[
    IMPORT_DROP_REF,
    IMPORT_CLONE_REF,
    IMPORT_STRING_NEW,
    IMPORT_STRING_GET,
    IMPORT_ERROR_NEW,
    IMPORT_IS_UNDEFINED,
    IMPORT_THROW,
    IMPORT_CB_DROP,
    IMPORT_CLOSURE_WRAPPER,
    IMPORT_SELF,
    IMPORT_NAVIGATOR,
    IMPORT_SCREEN,
    IMPORT_LOCAL_STORAGE,
    IMPORT_GET_ITEM,
    IMPORT_SET_ITEM,
    IMPORT_WIDTH,
    IMPORT_HEIGHT,
    IMPORT_COLOR_DEPTH,
    IMPORT_USER_AGENT,
    IMPORT_PLATFORM,
    IMPORT_LANGUAGE,
    IMPORT_NEW_DATE,
    IMPORT_TIMEZONE_OFFSET,
    IMPORT_NOW,
    IMPORT_RANDOM,
    IMPORT_RESOLVE,
    IMPORT_THEN,
];

/// A parsed-module stand-in declaring the fixture's import surface.
pub fn fixture_module() -> Module {
    let mut module = Module::default();
    for field in FIXTURE_IMPORTS {
        module.imports.push(Import {
            module: IMPORT_MODULE.to_owned(),
            field: (*field).to_owned(),
            desc: ImportDesc::Function { type_index: 0 },
        });
    }
    module.import_function_count = module.imports.len() as u32;
    module
}

/// The fingerprint string the fixture's `get_key` assembles through its
/// imports, reproduced from the config alone so tests can hash it
/// independently.
pub fn expected_fingerprint(config: &FingerprintConfig) -> String {
    let mut rng = Mulberry32::new(config.random_seed);
    let r1 = rng.next_f64();
    let r2 = rng.next_f64();
    format!(
        "{}|{}x{}x{}|tz{}|{}|{}|{}|{}",
        config.user_agent,
        config.screen_width as i32,
        config.screen_height as i32,
        config.color_depth as i32,
        f64::from(config.timezone_offset_minutes),
        config.session_id,
        config.timestamp_ms,
        r1,
        r2,
    )
}

/// SHA-256 of the fixture fingerprint, as 64 hex characters.
pub fn expected_key(config: &FingerprintConfig) -> String {
    hex::encode(Sha256::digest(expected_fingerprint(config).as_bytes()))
}

/// How the fixture's `get_key` behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStyle {
    /// Hash the environment-derived fingerprint.
    EnvDigest,
    /// Return a string that is not 64 hex characters.
    Malformed,
}

pub struct FixtureEngine {
    key_style: KeyStyle,
}

impl FixtureEngine {
    pub fn new() -> Self {
        Self {
            key_style: KeyStyle::EnvDigest,
        }
    }

    pub fn with_malformed_key() -> Self {
        Self {
            key_style: KeyStyle::Malformed,
        }
    }
}

impl ModuleEngine for FixtureEngine {
    fn instantiate(&mut self, imports: ImportTable) -> Result<Box<dyn GuestInstance>> {
        Ok(Box::new(FixtureInstance::new(imports, self.key_style)))
    }
}

const STACK_TOP: u32 = 0x8000;
const HEAP_BASE: u32 = 0x10000;

pub struct FixtureInstance {
    imports: ImportTable,
    memory: LinearMemory,
    heap_top: u32,
    stack_ptr: u32,
    key_style: KeyStyle,
    /// Log of `invoke_table` calls: `(data_a, data_b, value_slot)`.
    pub closure_invocations: Vec<(u32, u32, u32)>,
}

impl FixtureInstance {
    pub fn new(imports: ImportTable, key_style: KeyStyle) -> Self {
        Self {
            imports,
            memory: LinearMemory::new(1),
            heap_top: HEAP_BASE,
            stack_ptr: STACK_TOP,
            key_style,
            closure_invocations: Vec::new(),
        }
    }

    /// An instance with no imports, for driving thunks directly.
    pub fn standalone() -> Self {
        Self::new(ImportTable::new(), KeyStyle::EnvDigest)
    }

    fn malloc(&mut self, size: u32) -> u32 {
        let ptr = (self.heap_top + 7) & !7;
        let end = ptr as usize + size as usize;
        while end > self.memory.size() {
            self.memory.grow(1);
        }
        self.heap_top = ptr + size;
        ptr
    }

    fn realloc(&mut self, ptr: u32, old_size: u32, new_size: u32) -> Result<u32> {
        let new_ptr = self.malloc(new_size);
        let keep = old_size.min(new_size);
        let bytes = self.memory.slice(ptr, keep)?.to_vec();
        self.memory.write(new_ptr, &bytes)?;
        Ok(new_ptr)
    }

    fn write_string(&mut self, text: &str) -> Result<(u32, u32)> {
        let bytes = text.as_bytes();
        let ptr = self.malloc(bytes.len() as u32);
        self.memory.write(ptr, bytes)?;
        Ok((ptr, bytes.len() as u32))
    }

    fn read_string(&self, ptr: u32, len: u32) -> Result<String> {
        let bytes = self.memory.slice(ptr, len)?.to_vec();
        String::from_utf8(bytes)
            .map_err(|_| kinds::invalid_encoding("fixture read non-UTF-8 bytes"))
    }

    fn read_i32(&self, offset: u32) -> Result<i32> {
        let bytes = self.memory.slice(offset, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn write_i32(&mut self, offset: u32, value: i32) -> Result<()> {
        self.memory.write(offset, &value.to_le_bytes())
    }

    /// Dispatch an import thunk with this instance as its call context.
    fn call_import(&mut self, field: &str, args: &[Value]) -> Result<Vec<Value>> {
        let mut thunk = self
            .imports
            .take(IMPORT_MODULE, field)
            .ok_or_else(|| kinds::missing_import(IMPORT_MODULE, field))?;
        let result = thunk(self, args);
        self.imports.register(IMPORT_MODULE, field, thunk);
        result
    }

    fn import_slot(&mut self, field: &str, args: &[Value]) -> Result<u32> {
        let results = self.call_import(field, args)?;
        results
            .first()
            .ok_or_else(|| kinds::type_mismatch("one result", "none"))?
            .as_u32()
    }

    fn import_i32(&mut self, field: &str, args: &[Value]) -> Result<i32> {
        let results = self.call_import(field, args)?;
        results
            .first()
            .ok_or_else(|| kinds::type_mismatch("one result", "none"))?
            .as_i32()
    }

    fn import_f64(&mut self, field: &str, args: &[Value]) -> Result<f64> {
        let results = self.call_import(field, args)?;
        results
            .first()
            .ok_or_else(|| kinds::type_mismatch("one result", "none"))?
            .as_f64()
    }

    /// Call a string-returning import through a scratch record of our
    /// own, returning the text it placed in our memory.
    fn import_string(&mut self, field: &str, receiver: Option<u32>) -> Result<String> {
        self.stack_ptr -= 16;
        let retptr = self.stack_ptr;
        let result = (|| {
            match receiver {
                Some(slot) => self.call_import(
                    field,
                    &[Value::I32(retptr as i32), Value::I32(slot as i32)],
                )?,
                None => self.call_import(field, &[Value::I32(retptr as i32)])?,
            };
            let ptr = self.read_i32(retptr)? as u32;
            let len = self.read_i32(retptr + 4)? as u32;
            self.read_string(ptr, len)
        })();
        self.stack_ptr += 16;
        result
    }

    fn drop_slot(&mut self, slot: u32) -> Result<()> {
        self.call_import(IMPORT_DROP_REF, &[Value::I32(slot as i32)])?;
        Ok(())
    }

    /// Assemble the fingerprint through imports and hash it.
    fn export_get_key(&mut self, args: &[Value]) -> Result<Vec<Value>> {
        let retptr = husk_runtime::value::arg(args, 0)?.as_u32()?;

        let key = match self.key_style {
            KeyStyle::Malformed => "not-a-hex-key".to_owned(),
            KeyStyle::EnvDigest => {
                let window = self.import_slot(IMPORT_SELF, &[])?;
                let navigator =
                    self.import_slot(IMPORT_NAVIGATOR, &[Value::I32(window as i32)])?;
                let screen = self.import_slot(IMPORT_SCREEN, &[Value::I32(window as i32)])?;
                let storage =
                    self.import_slot(IMPORT_LOCAL_STORAGE, &[Value::I32(window as i32)])?;
                let date = self.import_slot(IMPORT_NEW_DATE, &[])?;

                let user_agent = self.import_string(IMPORT_USER_AGENT, Some(navigator))?;
                let width = self.import_i32(IMPORT_WIDTH, &[Value::I32(screen as i32)])?;
                let height = self.import_i32(IMPORT_HEIGHT, &[Value::I32(screen as i32)])?;
                let depth = self.import_i32(IMPORT_COLOR_DEPTH, &[Value::I32(screen as i32)])?;
                let tz = self.import_f64(
                    IMPORT_TIMEZONE_OFFSET,
                    &[Value::I32(date as i32)],
                )?;

                let (key_ptr, key_len) = self.write_string("session_id")?;
                self.stack_ptr -= 16;
                let item_retptr = self.stack_ptr;
                self.call_import(
                    IMPORT_GET_ITEM,
                    &[
                        Value::I32(item_retptr as i32),
                        Value::I32(storage as i32),
                        Value::I32(key_ptr as i32),
                        Value::I32(key_len as i32),
                    ],
                )?;
                let session_ptr = self.read_i32(item_retptr)? as u32;
                let session_len = self.read_i32(item_retptr + 4)? as u32;
                self.stack_ptr += 16;
                let session = if session_ptr == 0 {
                    String::new()
                } else {
                    self.read_string(session_ptr, session_len)?
                };

                let now = self.import_f64(IMPORT_NOW, &[])?;
                let r1 = self.import_f64(IMPORT_RANDOM, &[])?;
                let r2 = self.import_f64(IMPORT_RANDOM, &[])?;

                for slot in [window, navigator, screen, storage, date] {
                    self.drop_slot(slot)?;
                }

                let fingerprint = format!(
                    "{user_agent}|{width}x{height}x{depth}|tz{tz}|{session}|{now}|{r1}|{r2}"
                );
                hex::encode(Sha256::digest(fingerprint.as_bytes()))
            }
        };

        let (ptr, len) = self.write_string(&key)?;
        self.write_i32(retptr, ptr as i32)?;
        self.write_i32(retptr + 4, len as i32)?;
        self.write_i32(retptr + 8, 0)?;
        self.write_i32(retptr + 12, 0)?;
        Ok(vec![])
    }

    /// Identity transform; a key that is not 64 hex characters is
    /// reported through the error record.
    fn export_transform(&mut self, args: &[Value]) -> Result<Vec<Value>> {
        let retptr = husk_runtime::value::arg(args, 0)?.as_u32()?;
        let payload_ptr = husk_runtime::value::arg(args, 1)?.as_u32()?;
        let payload_len = husk_runtime::value::arg(args, 2)?.as_u32()?;
        let key_ptr = husk_runtime::value::arg(args, 3)?.as_u32()?;
        let key_len = husk_runtime::value::arg(args, 4)?.as_u32()?;

        let key = self.read_string(key_ptr, key_len)?;
        if key.len() != 64 || !key.bytes().all(|b| b.is_ascii_hexdigit()) {
            let (msg_ptr, msg_len) = self.write_string("transform key must be 64 hex chars")?;
            let error_slot = self.import_slot(
                IMPORT_ERROR_NEW,
                &[Value::I32(msg_ptr as i32), Value::I32(msg_len as i32)],
            )?;
            self.write_i32(retptr, 0)?;
            self.write_i32(retptr + 4, 0)?;
            self.write_i32(retptr + 8, error_slot as i32)?;
            self.write_i32(retptr + 12, 1)?;
            return Ok(vec![]);
        }

        let payload = self.memory.slice(payload_ptr, payload_len)?.to_vec();
        let out_ptr = self.malloc(payload.len() as u32);
        self.memory.write(out_ptr, &payload)?;

        self.write_i32(retptr, out_ptr as i32)?;
        self.write_i32(retptr + 4, payload.len() as i32)?;
        self.write_i32(retptr + 8, 0)?;
        self.write_i32(retptr + 12, 0)?;
        Ok(vec![])
    }
}

impl GuestInstance for FixtureInstance {
    fn invoke(&mut self, export: &str, args: &[Value]) -> Result<Vec<Value>> {
        match export {
            "__wbindgen_malloc" => {
                let size = husk_runtime::value::arg(args, 0)?.as_u32()?;
                let ptr = self.malloc(size);
                Ok(vec![Value::I32(ptr as i32)])
            }
            "__wbindgen_realloc" => {
                let ptr = husk_runtime::value::arg(args, 0)?.as_u32()?;
                let old_size = husk_runtime::value::arg(args, 1)?.as_u32()?;
                let new_size = husk_runtime::value::arg(args, 2)?.as_u32()?;
                let new_ptr = self.realloc(ptr, old_size, new_size)?;
                Ok(vec![Value::I32(new_ptr as i32)])
            }
            "__wbindgen_free" => Ok(vec![]),
            "__wbindgen_add_to_stack_pointer" => {
                let delta = husk_runtime::value::arg(args, 0)?.as_i32()?;
                self.stack_ptr = (self.stack_ptr as i32 + delta) as u32;
                Ok(vec![Value::I32(self.stack_ptr as i32)])
            }
            "get_key" => self.export_get_key(args),
            "transform" => self.export_transform(args),
            other => Err(kinds::export_not_found(other)),
        }
    }

    fn invoke_table(&mut self, _table_index: u32, args: &[Value]) -> Result<Vec<Value>> {
        let data_a = husk_runtime::value::arg(args, 0)?.as_u32()?;
        let data_b = husk_runtime::value::arg(args, 1)?.as_u32()?;
        let value_slot = husk_runtime::value::arg(args, 2)?.as_u32()?;
        self.closure_invocations.push((data_a, data_b, value_slot));
        Ok(vec![])
    }

    fn memory(&self) -> &LinearMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut LinearMemory {
        &mut self.memory
    }
}
