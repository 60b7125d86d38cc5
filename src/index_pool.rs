use super::{
    gpu::{CreateInfo, GpuDevice},
    pool::BufferPool,
};
use anyhow::Result;
use std::{mem::size_of, ptr::NonNull};

/// One index range carved out of a pool block
pub struct IndexAlloc<'a, B> {
    /// Write pointer positioned at the first index of the range
    pub ptr: NonNull<u32>,
    /// Backing buffer to bind when drawing the range
    pub buffer: &'a B,
    /// Position of the first index of the range within `buffer`
    pub start_index: usize,
}

/// Streaming sub allocator for `u32` mesh indices, the index counterpart
/// of `VertexBufferPool`
pub struct IndexBufferPool<D: GpuDevice> {
    pool: BufferPool<D>,
}
impl<D: GpuDevice> IndexBufferPool<D> {
    pub fn new(device: &mut D, create_info: &CreateInfo) -> Self {
        Self {
            pool: BufferPool::new(device, create_info),
        }
    }
    /// Carves out space for `index_count` indices
    pub fn alloc(
        &mut self,
        device: &mut D,
        index_count: usize,
    ) -> Result<IndexAlloc<'_, D::Buffer>> {
        let index_size = size_of::<u32>();
        let alloc = self
            .pool
            .alloc(device, index_size * index_count, index_size)?;
        Ok(IndexAlloc {
            ptr: alloc.ptr.cast(),
            buffer: alloc.buffer,
            start_index: alloc.offset_in_bytes / index_size,
        })
    }
    /// Allocates room for `indices` and copies them in
    pub fn alloc_with_data(
        &mut self,
        device: &mut D,
        indices: &[u32],
    ) -> Result<IndexAlloc<'_, D::Buffer>> {
        let alloc = self.alloc(device, indices.len())?;
        unsafe {
            std::ptr::copy_nonoverlapping(indices.as_ptr(), alloc.ptr.as_ptr(), indices.len());
        }
        Ok(alloc)
    }
    /// Gives back `bytes` from the tail of the most recent allocations
    pub fn release(&mut self, bytes: usize) {
        self.pool.release(bytes)
    }
    /// Destroys every block and rewinds the ring for the next frame
    pub fn reset(&mut self) {
        self.pool.reset()
    }
    /// Unmaps the pool. Must be called before draws that read the pool's
    /// buffers are submitted
    pub fn unlock(&mut self) {
        self.pool.unlock()
    }
    /// Indices that still fit in the current block
    pub fn current_buffer_remaining_indices(&self) -> usize {
        self.pool.remaining_in_current(size_of::<u32>()) / size_of::<u32>()
    }
    /// Indices that fit in one ring buffer
    pub fn ring_slot_index_capacity(&self) -> usize {
        self.pool.min_block_size() / size_of::<u32>()
    }
    pub fn ring_buffer_count(&self) -> usize {
        self.pool.ring_buffer_count()
    }
    pub fn ring_slots_remaining(&self) -> usize {
        self.pool.ring_slots_remaining()
    }
    pub fn block_count(&self) -> usize {
        self.pool.block_count()
    }
}
