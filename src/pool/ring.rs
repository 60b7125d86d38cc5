use crate::gpu::{GpuBuffer, GpuDevice};
use log::warn;

/// Fixed capacity circular set of reusable backing buffers, all of one
/// size. Buffers are claimed in round robin order and only recognized as
/// returned in reverse claim order
pub struct BufferRing<B> {
    /// A claimed slot holds `None` while its buffer lives in a block
    slots: Vec<Option<B>>,
    cursor: usize,
    in_use: usize,
}
impl<B: GpuBuffer> BufferRing<B> {
    /// Eagerly creates up to `count` buffers of `buffer_size` bytes. A
    /// failed creation is tolerated, the ring just ends up smaller
    pub fn new<D: GpuDevice<Buffer = B>>(
        device: &mut D,
        count: usize,
        buffer_size: usize,
    ) -> Self {
        let mut slots = Vec::with_capacity(count);
        for created in 0..count {
            match device.create_buffer(buffer_size) {
                Ok(buffer) => slots.push(Some(buffer)),
                Err(err) => {
                    warn!(
                        "preallocated {} of {} ring buffers: {:?}",
                        created, count, err
                    );
                    break;
                }
            }
        }
        Self {
            slots,
            cursor: 0,
            in_use: 0,
        }
    }
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }
    /// Slots left to claim in the current cycle
    pub fn slots_remaining(&self) -> usize {
        self.slots.len() - self.in_use
    }
    /// Claims the buffer at the head of the free window. Fails once every
    /// slot is in use
    pub fn claim(&mut self) -> Option<(B, usize)> {
        if self.slots.is_empty() || self.in_use == self.slots.len() {
            return None;
        }
        let slot = (self.cursor + self.in_use) % self.slots.len();
        let buffer = self.slots[slot]
            .take()
            .expect("ring slot empty outside the in-use window");
        self.in_use += 1;
        Some((buffer, slot))
    }
    /// Returns a claimed buffer to its slot. The slot is only marked free
    /// again if it was the most recently claimed one, an out of order
    /// return stays counted as in use until `reset_all`
    pub fn release_last(&mut self, buffer: B, slot: usize) {
        debug_assert!(self.slots[slot].is_none(), "slot released twice");
        if self.in_use > 0 {
            let top = (self.cursor + self.in_use - 1) % self.slots.len();
            if slot == top {
                self.in_use -= 1;
            }
        }
        self.slots[slot] = Some(buffer);
    }
    /// Makes every claimed slot available for the next cycle
    pub fn reset_all(&mut self) {
        if !self.slots.is_empty() {
            self.cursor = (self.cursor + self.in_use) % self.slots.len();
        }
        self.in_use = 0;
    }
    #[cfg(feature = "state_validation")]
    pub fn check_state(&self) {
        assert!(
            self.in_use <= self.slots.len(),
            "ring window of {} exceeds {} slots",
            self.in_use,
            self.slots.len()
        );
        // every slot in the free window must hold a buffer
        for offset in self.in_use..self.slots.len() {
            let slot = (self.cursor + offset) % self.slots.len();
            assert!(
                self.slots[slot].is_some(),
                "claimable ring slot {} has no buffer",
                slot
            );
        }
    }
}
