use super::gpu::{GpuBuffer, GpuDevice};
use anyhow::{anyhow, Result};
use std::ptr::NonNull;

/// Byte a stub buffer's contents are overwritten with on lock
pub const LOCK_FILL_BYTE: u8 = 0xcd;

/// Heap backed stand in for a gpu device, used for headless runs and tests
#[derive(Default)]
pub struct StubDevice {
    /// Buffers created so far
    pub buffers_created: usize,
    /// When set, `create_buffer` fails once this many buffers exist
    pub create_limit: Option<usize>,
}
impl GpuDevice for StubDevice {
    type Buffer = StubBuffer;
    fn create_buffer(&mut self, size_in_bytes: usize) -> Result<StubBuffer> {
        if let Some(limit) = self.create_limit {
            if self.buffers_created >= limit {
                return Err(anyhow!(
                    "stub device is out of buffers ({} created)",
                    self.buffers_created
                ));
            }
        }
        self.buffers_created += 1;
        Ok(StubBuffer {
            data: vec![0u8; size_in_bytes].into_boxed_slice(),
            locked: false,
        })
    }
}
#[derive(Debug)]
pub struct StubBuffer {
    data: Box<[u8]>,
    locked: bool,
}
impl StubBuffer {
    /// Contents of the buffer, readable once the caller is done writing
    pub fn contents(&self) -> &[u8] {
        &self.data
    }
}
impl GpuBuffer for StubBuffer {
    fn lock(&mut self) -> NonNull<u8> {
        assert!(!self.locked, "stub buffer locked twice");
        self.locked = true;
        // locking real buffer memory discards whatever was written before
        for byte in self.data.iter_mut() {
            *byte = LOCK_FILL_BYTE;
        }
        NonNull::new(self.data.as_mut_ptr()).expect("stub buffer has no storage")
    }
    fn unlock(&mut self) {
        assert!(self.locked, "stub buffer unlocked while not locked");
        self.locked = false;
    }
    fn size(&self) -> usize {
        self.data.len()
    }
    fn is_locked(&self) -> bool {
        self.locked
    }
}
