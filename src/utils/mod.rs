//! Utility helpers: generational arena, pooled allocator and logging.

pub mod allocator;
pub mod arena;
pub mod logging;

pub use allocator::{Block, PoolAllocator, PoolBox, PoolStats};
pub use arena::{Arena, Handle};
pub use logging::ScopedTimer;
