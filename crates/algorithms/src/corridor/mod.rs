//! Pipeline corridor
//!
//! - Buffer: capsule union around the centerline, with polygon approximations
//! - Mask: rasterization of the buffer onto an index grid
//! - Cache: LRU of built masks keyed by geometry, distance and grid

mod buffer;
mod cache;
mod mask;

pub use buffer::{buffer_segment, BufferParams, CorridorBuffer};
pub use cache::{CorridorMaskCache, MaskKey};
pub use mask::{corridor_mask, CorridorMask};
