use std::mem::size_of;
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VertexComponent {
    Vec1F32,
    Vec2F32,
    Vec3F32,
    Vec4F32,
    Vec4U8,
}
impl VertexComponent {
    /// Gets number of components in vertex
    pub fn num_components(&self) -> usize {
        match self {
            Self::Vec1F32 => 1,
            Self::Vec2F32 => 2,
            Self::Vec3F32 => 3,
            Self::Vec4F32 => 4,
            Self::Vec4U8 => 4,
        }
    }
    /// Gets size in bytes of each component
    pub fn size(&self) -> usize {
        match self {
            Self::Vec1F32 => size_of::<f32>(),
            Self::Vec2F32 => 2 * size_of::<f32>(),
            Self::Vec3F32 => 3 * size_of::<f32>(),
            Self::Vec4F32 => 4 * size_of::<f32>(),
            Self::Vec4U8 => 4 * size_of::<u8>(),
        }
    }
}
/// Layout of vertex in mesh, order represents `location` in the shader
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexLayout {
    pub components: Vec<VertexComponent>,
}
impl VertexLayout {
    /// Byte stride of one vertex
    pub fn stride(&self) -> usize {
        self.components.iter().map(|c| c.size()).sum()
    }
    /// Padding in bytes before a vertex of this layout may be written
    /// `used_bytes` into a buffer that already holds other layouts
    pub fn alignment_padding(&self, used_bytes: usize) -> usize {
        align_up_pad(used_bytes, self.stride())
    }
}
/// Bytes needed to round `offset` up to a multiple of `alignment`
pub fn align_up_pad(offset: usize, alignment: usize) -> usize {
    assert!(alignment > 0, "alignment must be nonzero");
    (alignment - offset % alignment) % alignment
}
