pub use anyhow;
mod gpu;
mod index_pool;
mod pool;
mod stub;
mod vertex;
mod vertex_pool;
pub use gpu::{CreateInfo, GpuBuffer, GpuDevice, MIN_BLOCK_SIZE_FLOOR};
pub use index_pool::{IndexAlloc, IndexBufferPool};
pub use pool::{BufferPool, PoolAlloc, PoolError};
pub use stub::{StubBuffer, StubDevice, LOCK_FILL_BYTE};
pub use vertex::{align_up_pad, VertexComponent, VertexLayout};
pub use vertex_pool::{VertexAlloc, VertexBufferPool};
