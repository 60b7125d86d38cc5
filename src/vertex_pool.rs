use super::{
    gpu::{CreateInfo, GpuDevice},
    pool::BufferPool,
    vertex::VertexLayout,
};
use anyhow::Result;
use std::ptr::NonNull;

/// One vertex range carved out of a pool block
pub struct VertexAlloc<'a, B> {
    /// Write pointer positioned at the first vertex of the range
    pub ptr: NonNull<u8>,
    /// Backing buffer to bind when drawing the range
    pub buffer: &'a B,
    /// Index of the first vertex of the range within `buffer`
    pub start_vertex: usize,
}

/// Streaming sub allocator for vertex data. Packs per draw vertex ranges
/// into larger backing buffers so that building a frame does not create one
/// buffer object per draw call
pub struct VertexBufferPool<D: GpuDevice> {
    pool: BufferPool<D>,
}
impl<D: GpuDevice> VertexBufferPool<D> {
    pub fn new(device: &mut D, create_info: &CreateInfo) -> Self {
        Self {
            pool: BufferPool::new(device, create_info),
        }
    }
    /// Carves out space for `vertex_count` vertices of `layout`. Crossing
    /// from a differently sized layout in the same block pads the write
    /// position up to a whole vertex boundary
    pub fn alloc(
        &mut self,
        device: &mut D,
        layout: &VertexLayout,
        vertex_count: usize,
    ) -> Result<VertexAlloc<'_, D::Buffer>> {
        let stride = layout.stride();
        assert!(stride > 0, "empty vertex layout");
        let alloc = self.pool.alloc(device, stride * vertex_count, stride)?;
        Ok(VertexAlloc {
            ptr: alloc.ptr,
            buffer: alloc.buffer,
            start_vertex: alloc.offset_in_bytes / stride,
        })
    }
    /// Allocates room for `data` and copies it in. `data` must be a whole
    /// number of vertices of `layout`
    pub fn alloc_with_data(
        &mut self,
        device: &mut D,
        layout: &VertexLayout,
        data: &[u8],
    ) -> Result<VertexAlloc<'_, D::Buffer>> {
        let stride = layout.stride();
        assert!(stride > 0, "empty vertex layout");
        assert_eq!(
            data.len() % stride,
            0,
            "vertex data is not a whole number of vertices"
        );
        let alloc = self.alloc(device, layout, data.len() / stride)?;
        unsafe {
            std::ptr::copy_nonoverlapping(data.as_ptr(), alloc.ptr.as_ptr(), data.len());
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
    /// Vertices of `layout` that still fit in the current block
    pub fn current_buffer_remaining_vertices(&self, layout: &VertexLayout) -> usize {
        self.pool.remaining_in_current(layout.stride()) / layout.stride()
    }
    /// Vertices of `layout` that fit in one ring buffer
    pub fn ring_slot_vertex_capacity(&self, layout: &VertexLayout) -> usize {
        self.pool.min_block_size() / layout.stride()
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
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{stub::StubDevice, vertex::VertexComponent};
    use nalgebra::{Vector2, Vector3};
    fn skinned_layout() -> VertexLayout {
        VertexLayout {
            components: vec![
                VertexComponent::Vec3F32,
                VertexComponent::Vec2F32,
                VertexComponent::Vec3F32,
            ],
        }
    }
    fn textured_layout() -> VertexLayout {
        VertexLayout {
            components: vec![VertexComponent::Vec3F32, VertexComponent::Vec2F32],
        }
    }
    fn frame_pool(device: &mut StubDevice) -> VertexBufferPool<StubDevice> {
        VertexBufferPool::new(
            device,
            &CreateInfo {
                min_block_size: 1024,
                preallocated_buffer_count: 2,
            },
        )
    }
    #[test]
    fn build() {
        let mut device = StubDevice::default();
        let pool = frame_pool(&mut device);
        assert_eq!(pool.ring_buffer_count(), 2);
        assert_eq!(pool.ring_slot_vertex_capacity(&skinned_layout()), 32);
        assert_eq!(pool.current_buffer_remaining_vertices(&skinned_layout()), 0);
    }
    #[test]
    fn frame_of_two_blocks() {
        let layout = skinned_layout();
        assert_eq!(layout.stride(), 32);
        let mut device = StubDevice::default();
        let mut pool = frame_pool(&mut device);

        // 320 bytes fit in a fresh ring buffer
        let first = pool.alloc(&mut device, &layout, 10).unwrap();
        assert_eq!(first.start_vertex, 0);
        assert_eq!(pool.block_count(), 1);
        assert_eq!(pool.current_buffer_remaining_vertices(&layout), 22);
        assert_eq!(pool.ring_slots_remaining(), 1);

        // 960 more do not, the second ring buffer takes over
        let second = pool.alloc(&mut device, &layout, 30).unwrap();
        assert_eq!(second.start_vertex, 0);
        assert_eq!(pool.block_count(), 2);
        assert_eq!(pool.ring_slots_remaining(), 0);
        assert_eq!(device.buffers_created, 2);

        // releasing both block footprints empties the pool and the ring
        // buffers are claimable again without a reset
        pool.release(1024 + 960);
        assert_eq!(pool.block_count(), 0);
        assert_eq!(pool.ring_slots_remaining(), 2);
    }
    #[test]
    fn padding_between_layouts() {
        let slim = VertexLayout {
            components: vec![VertexComponent::Vec3F32],
        };
        let wide = VertexLayout {
            components: vec![VertexComponent::Vec3F32, VertexComponent::Vec4U8],
        };
        let mut device = StubDevice::default();
        let mut pool = frame_pool(&mut device);
        let first = pool.alloc(&mut device, &slim, 1).unwrap();
        let base = first.ptr.as_ptr() as usize;
        // 12 bytes written, the stride 16 layout starts on its own boundary
        let second = pool.alloc(&mut device, &wide, 2).unwrap();
        assert_eq!(second.ptr.as_ptr() as usize, base + 16);
        assert_eq!(second.start_vertex, 1);
        assert_eq!(pool.block_count(), 1);
    }
    #[test]
    fn start_vertex_continues_in_block() {
        let layout = textured_layout();
        let mut device = StubDevice::default();
        let mut pool = frame_pool(&mut device);
        let first = pool.alloc(&mut device, &layout, 3).unwrap();
        assert_eq!(first.start_vertex, 0);
        let second = pool.alloc(&mut device, &layout, 3).unwrap();
        assert_eq!(second.start_vertex, 3);
    }
    #[test]
    fn writes_triangle_through_pointer() {
        let layout = textured_layout();
        let positions = [
            Vector3::new(-0.5f32, -0.5, 0.0),
            Vector3::new(0.5, -0.5, 0.0),
            Vector3::new(0.0, 0.5, 0.0),
        ];
        let uvs = [
            Vector2::new(0.0f32, 0.0),
            Vector2::new(1.0, 0.0),
            Vector2::new(0.5, 1.0),
        ];
        let data: Vec<u8> = positions
            .iter()
            .zip(uvs.iter())
            .flat_map(|(position, uv)| {
                position
                    .iter()
                    .chain(uv.iter())
                    .flat_map(|f| f.to_ne_bytes())
                    .collect::<Vec<_>>()
            })
            .collect();
        assert_eq!(data.len(), 3 * layout.stride());
        let mut device = StubDevice::default();
        let mut pool = frame_pool(&mut device);
        let alloc = pool.alloc_with_data(&mut device, &layout, &data).unwrap();
        let written = unsafe { std::slice::from_raw_parts(alloc.ptr.as_ptr(), data.len()) };
        assert_eq!(written, data.as_slice());
    }
    #[test]
    fn unlock_retires_current_block() {
        let layout = textured_layout();
        let mut device = StubDevice::default();
        let mut pool = frame_pool(&mut device);
        pool.alloc(&mut device, &layout, 4).unwrap();
        pool.unlock();
        assert_eq!(pool.current_buffer_remaining_vertices(&layout), 0);
        // allocating again remaps into a fresh block
        let alloc = pool.alloc(&mut device, &layout, 4).unwrap();
        assert_eq!(alloc.start_vertex, 0);
        assert_eq!(pool.block_count(), 2);
    }
}
