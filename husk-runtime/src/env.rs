//! The synthetic environment: fingerprint configuration, environment
//! objects, deterministic randomness, and the storage mock.
//!
//! Everything the guest can observe is derived from one caller-supplied
//! [`FingerprintConfig`]. Two runtimes built from identical configs
//! behave identically; no thunk ever consults platform randomness or the
//! real clock.

use std::collections::BTreeMap;

use crate::heap::HeapTable;
use crate::memory::MemoryViews;

/// Storage key the guest reads its session identifier from.
pub const SESSION_STORAGE_KEY: &str = "session_id";

/// Deterministic description of the synthetic environment.
#[derive(Debug, Clone, PartialEq)]
pub struct FingerprintConfig {
    /// Screen width in pixels.
    pub screen_width: u32,
    /// Screen height in pixels.
    pub screen_height: u32,
    /// Screen color depth in bits.
    pub color_depth: u32,
    /// Navigator platform string.
    pub platform: String,
    /// Navigator language tag.
    pub language: String,
    /// Navigator user-agent string.
    pub user_agent: String,
    /// Timezone offset in minutes, as `getTimezoneOffset` reports it.
    pub timezone_offset_minutes: i32,
    /// Fixed timestamp returned by every clock read, in milliseconds.
    pub timestamp_ms: f64,
    /// Seed for the deterministic pseudo-random source.
    pub random_seed: u32,
    /// Session identifier pre-seeded into the storage mock under
    /// [`SESSION_STORAGE_KEY`].
    pub session_id: String,
}

impl Default for FingerprintConfig {
    fn default() -> Self {
        Self {
            screen_width: 1920,
            screen_height: 1080,
            color_depth: 24,
            platform: "Linux x86_64".to_owned(),
            language: "en-US".to_owned(),
            user_agent: "Mozilla/5.0 (X11; Linux x86_64; rv:109.0) Gecko/20100101 Firefox/115.0"
                .to_owned(),
            timezone_offset_minutes: 0,
            timestamp_ms: 1_700_000_000_000.0,
            random_seed: 0x5EED_1234,
            session_id: "9f8e7d6c-0000-4000-8000-badc0ffee000".to_owned(),
        }
    }
}

/// The environment objects the guest can hold handles to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvObject {
    /// The global/window object.
    Window,
    /// The document object.
    Document,
    /// The navigator object.
    Navigator,
    /// The screen object.
    Screen,
    /// The persistent-storage object.
    Storage,
    /// The performance object.
    Performance,
    /// A date object.
    Date,
}

/// Mulberry32: the small deterministic generator browser-side hosts use
/// when they need a seedable `random()`. Stream stability across
/// versions is a hard requirement here, which rules out library RNGs.
#[derive(Debug, Clone)]
pub struct Mulberry32 {
    state: u32,
}

impl Mulberry32 {
    /// Seed the generator.
    pub fn new(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Next raw 32-bit output.
    pub fn next_u32(&mut self) -> u32 {
        self.state = self.state.wrapping_add(0x6D2B_79F5);
        let mut z = self.state;
        z = (z ^ (z >> 15)).wrapping_mul(z | 1);
        z ^= z.wrapping_add((z ^ (z >> 7)).wrapping_mul(z | 61));
        z ^ (z >> 14)
    }

    /// Next value in `[0, 1)`, like `Math.random`.
    pub fn next_f64(&mut self) -> f64 {
        f64::from(self.next_u32()) / 4_294_967_296.0
    }
}

/// In-memory key/value store standing in for persistent storage.
#[derive(Debug, Clone, Default)]
pub struct StorageMock {
    entries: BTreeMap<String, String>,
}

impl StorageMock {
    /// A store pre-seeded with the session identifier.
    pub fn seeded(config: &FingerprintConfig) -> Self {
        let mut entries = BTreeMap::new();
        entries.insert(SESSION_STORAGE_KEY.to_owned(), config.session_id.clone());
        Self { entries }
    }

    /// Look up `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// Store `value` under `key`.
    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_owned(), value.to_owned());
    }
}

/// Mutable host-side state shared by every import thunk of one instance.
#[derive(Debug)]
pub struct HostState {
    /// The configuration this instance was built from.
    pub config: FingerprintConfig,
    /// The heap table.
    pub heap: HeapTable,
    /// The storage mock.
    pub storage: StorageMock,
    /// The deterministic pseudo-random source.
    pub rng: Mulberry32,
    /// The memory-view cache.
    pub views: MemoryViews,
}

impl HostState {
    /// Build the state for one instance from its config.
    pub fn new(config: FingerprintConfig) -> Self {
        let storage = StorageMock::seeded(&config);
        let rng = Mulberry32::new(config.random_seed);
        Self {
            config,
            heap: HeapTable::new(),
            storage,
            rng,
            views: MemoryViews::new(),
        }
    }
}
