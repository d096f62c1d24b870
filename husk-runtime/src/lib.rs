//! Host runtime for a foreign module outside its native embedder.
//!
//! Given a decoded module's import surface and a deterministic
//! [`FingerprintConfig`], this crate resolves every declared import
//! against a capability registry, instantiates the module through a
//! caller-supplied execution engine, and exposes the two
//! boundary-crossing operations the module was built for:
//! [`HostRuntimeInstance::derive_session_key`] and
//! [`HostRuntimeInstance::transform`].
//!
//! Determinism is a hard requirement: every observable value the guest
//! can read (screen metrics, clock reads, randomness, storage) derives
//! from the config, never from the platform. Two instances built from
//! identical configs behave identically.
//!
//! There is no internal parallelism anywhere. Thunks execute
//! synchronously; the Promise-shaped bridge exists only because the
//! guest's calling convention expects an asynchronous-capable host.

#![forbid(unsafe_code)]

mod capabilities;
pub mod env;
pub mod heap;
pub mod instance;
pub mod marshal;
pub mod memory;
pub mod registry;
mod runtime;
pub mod value;

pub use env::{FingerprintConfig, HostState, SESSION_STORAGE_KEY};
pub use heap::{HeapTable, HostValue};
pub use instance::{GuestInstance, HostFunc, ImportTable, ModuleEngine};
pub use memory::{LinearMemory, MemoryViews, PAGE_SIZE};
pub use registry::{capability_key, CapabilityRegistry};
pub use runtime::{HostRuntime, HostRuntimeInstance, EXPORT_DERIVE_KEY, EXPORT_TRANSFORM};
pub use value::Value;
