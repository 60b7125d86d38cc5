use super::{
    gpu::{CreateInfo, GpuBuffer, GpuDevice, MIN_BLOCK_SIZE_FLOOR},
    vertex::align_up_pad,
};
use anyhow::{Context as AContext, Result};
use log::trace;
use std::ptr::NonNull;
use thiserror::Error;
mod ring;
use ring::BufferRing;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolError {
    #[error("device could not create a {size_in_bytes:} byte block")]
    BlockCreation { size_in_bytes: usize },
}

/// Where a block's buffer came from and where it goes when the block dies
enum Owner {
    Ring { slot: usize },
    Unique,
}
/// One backing buffer owned by the pool plus its free space counter
struct BufferBlock<B> {
    buffer: B,
    owner: Owner,
    bytes_free: usize,
}
/// Mapping status of the pool. Only the back block may ever be mapped
enum MapState {
    Unmapped,
    Mapped(NonNull<u8>),
}

/// One sub range carved out of a pool block
#[derive(Debug)]
pub struct PoolAlloc<'a, B> {
    /// Write pointer positioned at the start of the range
    pub ptr: NonNull<u8>,
    /// Backing buffer the range lives in, for recording draw state
    pub buffer: &'a B,
    /// Byte offset of the range within `buffer`
    pub offset_in_bytes: usize,
}

/// Byte level streaming sub allocator. Carves caller ranges out of larger
/// backing buffers, bump allocating from the most recent block and drawing
/// fixed size blocks from a preallocated ring when possible
pub struct BufferPool<D: GpuDevice> {
    blocks: Vec<BufferBlock<D::Buffer>>,
    map_state: MapState,
    ring: BufferRing<D::Buffer>,
    min_block_size: usize,
}
impl<D: GpuDevice> BufferPool<D> {
    pub fn new(device: &mut D, create_info: &CreateInfo) -> Self {
        let min_block_size = create_info.min_block_size.max(MIN_BLOCK_SIZE_FLOOR);
        Self {
            blocks: Vec::new(),
            map_state: MapState::Unmapped,
            ring: BufferRing::new(device, create_info.preallocated_buffer_count, min_block_size),
            min_block_size,
        }
    }
    /// Carves `size_in_bytes` bytes out of the current block, padding the
    /// write position up to a multiple of `alignment` first. Creates a new
    /// block when the current one has no room. On failure the pool is left
    /// exactly as it was
    pub fn alloc(
        &mut self,
        device: &mut D,
        size_in_bytes: usize,
        alignment: usize,
    ) -> Result<PoolAlloc<'_, D::Buffer>> {
        if let MapState::Mapped(base) = self.map_state {
            let back = self.blocks.last_mut().expect("mapped pool with no blocks");
            let used_bytes = back.buffer.size() - back.bytes_free;
            let pad = align_up_pad(used_bytes, alignment);
            if size_in_bytes + pad <= back.bytes_free {
                back.bytes_free -= size_in_bytes + pad;
                let offset_in_bytes = used_bytes + pad;
                self.check_state();
                let back = self.blocks.last().expect("mapped pool with no blocks");
                return Ok(PoolAlloc {
                    ptr: offset_ptr(base, offset_in_bytes),
                    buffer: &back.buffer,
                    offset_in_bytes,
                });
            }
        }
        self.create_block(device, size_in_bytes.max(self.min_block_size))?;
        let base = match self.map_state {
            MapState::Mapped(base) => base,
            MapState::Unmapped => unreachable!("create_block leaves the new block mapped"),
        };
        let back = self.blocks.last_mut().expect("block was just created");
        back.bytes_free -= size_in_bytes;
        self.check_state();
        let back = self.blocks.last().expect("block was just created");
        Ok(PoolAlloc {
            ptr: base,
            buffer: &back.buffer,
            offset_in_bytes: 0,
        })
    }
    /// Gives back `bytes` from the tail of the most recent allocations,
    /// destroying whole blocks as they empty. Bytes that only partially
    /// cover an unmapped block are discarded, mapping a buffer discards its
    /// contents so there is nothing left to reclaim in its tail
    pub fn release(&mut self, bytes: usize) {
        if bytes == 0 {
            return;
        }
        let mut bytes = bytes;
        if let MapState::Mapped(_) = self.map_state {
            let back = self.blocks.last_mut().expect("mapped pool with no blocks");
            let used_bytes = back.buffer.size() - back.bytes_free;
            if bytes >= used_bytes {
                self.destroy_block();
                bytes -= used_bytes;
            } else {
                back.bytes_free += bytes;
                self.check_state();
                return;
            }
        }
        while bytes > 0 {
            let block_size = match self.blocks.last() {
                Some(block) => block.buffer.size(),
                None => break,
            };
            if block_size > bytes {
                break;
            }
            self.destroy_block();
            bytes -= block_size;
        }
        self.check_state();
    }
    /// Destroys every block and rewinds the ring for the next cycle
    pub fn reset(&mut self) {
        while !self.blocks.is_empty() {
            self.destroy_block();
        }
        self.ring.reset_all();
        self.check_state();
    }
    /// Unmaps the current block. Must be called before draws recorded
    /// against the pool's buffers are submitted. The next `alloc` remaps by
    /// creating a new block
    pub fn unlock(&mut self) {
        if let MapState::Mapped(_) = self.map_state {
            let back = self.blocks.last_mut().expect("mapped pool with no blocks");
            back.buffer.unlock();
            self.map_state = MapState::Unmapped;
        }
        self.check_state();
    }
    /// Bytes that could still be carved from the current block for a range
    /// aligned to `alignment`
    pub fn remaining_in_current(&self, alignment: usize) -> usize {
        match self.map_state {
            MapState::Mapped(_) => {
                let back = self.blocks.last().expect("mapped pool with no blocks");
                let used_bytes = back.buffer.size() - back.bytes_free;
                back.bytes_free
                    .saturating_sub(align_up_pad(used_bytes, alignment))
            }
            MapState::Unmapped => 0,
        }
    }
    pub fn ring_buffer_count(&self) -> usize {
        self.ring.capacity()
    }
    pub fn ring_slots_remaining(&self) -> usize {
        self.ring.slots_remaining()
    }
    /// Size of every ring buffer and the floor for freshly created blocks
    pub fn min_block_size(&self) -> usize {
        self.min_block_size
    }
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }
    pub fn is_mapped(&self) -> bool {
        matches!(self.map_state, MapState::Mapped(_))
    }
    /// Appends a block of `size_in_bytes` bytes, drawn from the ring when
    /// the size matches a ring slot, and maps it. Unmaps the previous block
    /// first so only one buffer is ever locked
    fn create_block(&mut self, device: &mut D, size_in_bytes: usize) -> Result<()> {
        assert!(size_in_bytes >= self.min_block_size);
        let (buffer, owner) = if size_in_bytes == self.min_block_size {
            match self.ring.claim() {
                Some((buffer, slot)) => (buffer, Owner::Ring { slot }),
                None => (
                    device
                        .create_buffer(size_in_bytes)
                        .context(PoolError::BlockCreation { size_in_bytes })?,
                    Owner::Unique,
                ),
            }
        } else {
            (
                device
                    .create_buffer(size_in_bytes)
                    .context(PoolError::BlockCreation { size_in_bytes })?,
                Owner::Unique,
            )
        };
        if let MapState::Mapped(_) = self.map_state {
            let prev = self.blocks.last_mut().expect("mapped pool with no blocks");
            prev.buffer.unlock();
        }
        let mut block = BufferBlock {
            buffer,
            owner,
            bytes_free: size_in_bytes,
        };
        trace!(
            "created {} byte block from {}",
            size_in_bytes,
            match block.owner {
                Owner::Ring { slot } => format!("ring slot {}", slot),
                Owner::Unique => "device".to_string(),
            }
        );
        self.map_state = MapState::Mapped(block.buffer.lock());
        self.blocks.push(block);
        Ok(())
    }
    /// Destroys the back block, returning ring buffers to the ring and
    /// dropping unique ones
    fn destroy_block(&mut self) {
        let mut block = self.blocks.pop().expect("no block to destroy");
        if block.buffer.is_locked() {
            block.buffer.unlock();
        }
        trace!("destroyed {} byte block", block.buffer.size());
        match block.owner {
            Owner::Ring { slot } => self.ring.release_last(block.buffer, slot),
            Owner::Unique => drop(block.buffer),
        }
        self.map_state = MapState::Unmapped;
    }
    /// Checks the pool invariant set. Only active with the
    /// `state_validation` feature
    fn check_state(&self) {
        #[cfg(feature = "state_validation")]
        {
            for (i, block) in self.blocks.iter().enumerate() {
                assert!(
                    block.bytes_free <= block.buffer.size(),
                    "block {} has {} bytes free out of {}",
                    i,
                    block.bytes_free,
                    block.buffer.size()
                );
                let is_back = i + 1 == self.blocks.len();
                match self.map_state {
                    MapState::Mapped(_) => assert_eq!(
                        block.buffer.is_locked(),
                        is_back,
                        "block {} breaks the single mapped block rule",
                        i
                    ),
                    MapState::Unmapped => assert!(
                        !block.buffer.is_locked(),
                        "block {} is locked while the pool is unmapped",
                        i
                    ),
                }
            }
            if let MapState::Mapped(_) = self.map_state {
                assert!(!self.blocks.is_empty(), "mapped pool with no blocks");
            }
            self.ring.check_state();
        }
    }
}
/// Pointer `offset` bytes past the mapped base pointer
fn offset_ptr(base: NonNull<u8>, offset: usize) -> NonNull<u8> {
    // offsets handed out never leave the mapped block
    unsafe { NonNull::new_unchecked(base.as_ptr().add(offset)) }
}
