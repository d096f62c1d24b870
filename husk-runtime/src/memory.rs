//! Guest linear memory and the host-side view cache.
//!
//! Growth replaces the underlying buffer, so any view the host took out
//! earlier may dangle in spirit: [`MemoryViews`] records the identity
//! (base address and length) of the buffer it last saw and revalidates
//! before every boundary-crossing read or write, rebuilding lazily
//! instead of trusting a cached reference.

use husk_error::{kinds, Result};
use log::debug;

/// Linear memory page size in bytes.
pub const PAGE_SIZE: usize = 65536;

/// The guest's flat, growable, byte-addressable memory.
#[derive(Debug)]
pub struct LinearMemory {
    bytes: Vec<u8>,
}

impl LinearMemory {
    /// Allocate `pages` zeroed pages.
    pub fn new(pages: usize) -> Self {
        Self {
            bytes: vec![0; pages * PAGE_SIZE],
        }
    }

    /// Current size in bytes.
    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Grow by `additional_pages`, replacing the underlying buffer.
    pub fn grow(&mut self, additional_pages: usize) {
        let new_len = self.bytes.len() + additional_pages * PAGE_SIZE;
        let mut replacement = Vec::with_capacity(new_len);
        replacement.extend_from_slice(&self.bytes);
        replacement.resize(new_len, 0);
        self.bytes = replacement;
    }

    /// Identity of the current buffer: base address and length. Changes
    /// whenever growth replaced the buffer.
    pub fn buffer_identity(&self) -> (usize, usize) {
        (self.bytes.as_ptr() as usize, self.bytes.len())
    }

    fn check_range(&self, offset: u32, len: usize) -> Result<usize> {
        let start = offset as usize;
        let end = start
            .checked_add(len)
            .ok_or_else(|| kinds::memory_access(start, len, self.bytes.len()))?;
        if end > self.bytes.len() {
            return Err(kinds::memory_access(start, len, self.bytes.len()));
        }
        Ok(start)
    }

    /// Borrow `len` bytes at `offset`.
    pub fn slice(&self, offset: u32, len: u32) -> Result<&[u8]> {
        let start = self.check_range(offset, len as usize)?;
        Ok(&self.bytes[start..start + len as usize])
    }

    /// Write `data` at `offset`.
    pub fn write(&mut self, offset: u32, data: &[u8]) -> Result<()> {
        let start = self.check_range(offset, data.len())?;
        self.bytes[start..start + data.len()].copy_from_slice(data);
        Ok(())
    }
}

/// Host-side raw and numeric views over a [`LinearMemory`].
///
/// One per runtime instance, shared by every boundary crossing; callers
/// must route reads and writes through it so the identity check runs.
#[derive(Debug, Default)]
pub struct MemoryViews {
    cached_identity: Option<(usize, usize)>,
}

impl MemoryViews {
    /// A cache that has seen no buffer yet.
    pub fn new() -> Self {
        Self::default()
    }

    fn revalidate(&mut self, memory: &LinearMemory) {
        let identity = memory.buffer_identity();
        if self.cached_identity != Some(identity) {
            if self.cached_identity.is_some() {
                debug!(
                    "linear memory buffer replaced (now {} bytes); rebuilding views",
                    identity.1
                );
            }
            self.cached_identity = Some(identity);
        }
    }

    /// Whether the cache currently matches `memory`'s buffer.
    pub fn is_current(&self, memory: &LinearMemory) -> bool {
        self.cached_identity == Some(memory.buffer_identity())
    }

    /// Read `len` bytes at `offset` through the raw byte view.
    pub fn read_bytes(&mut self, memory: &LinearMemory, offset: u32, len: u32) -> Result<Vec<u8>> {
        self.revalidate(memory);
        Ok(memory.slice(offset, len)?.to_vec())
    }

    /// Write `data` at `offset` through the raw byte view.
    pub fn write_bytes(&mut self, memory: &mut LinearMemory, offset: u32, data: &[u8]) -> Result<()> {
        self.revalidate(memory);
        memory.write(offset, data)
    }

    /// Read a little-endian `i32` through the numeric view.
    pub fn read_i32(&mut self, memory: &LinearMemory, offset: u32) -> Result<i32> {
        self.revalidate(memory);
        let bytes = memory.slice(offset, 4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Write a little-endian `i32` through the numeric view.
    pub fn write_i32(&mut self, memory: &mut LinearMemory, offset: u32, value: i32) -> Result<()> {
        self.revalidate(memory);
        memory.write(offset, &value.to_le_bytes())
    }
}
