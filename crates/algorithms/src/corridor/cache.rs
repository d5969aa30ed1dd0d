//! LRU cache of corridor masks.
//!
//! A mask depends only on the pipeline geometry, the buffer distance and the
//! target grid, so tiles revisited across runs (or several epochs of one
//! tile) reuse the same rasterization.

use super::mask::{corridor_mask, CorridorMask};
use aquaspot_core::raster::GridSignature;
use aquaspot_core::{PipelineGeometry, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::trace;

/// Everything a corridor mask is derived from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MaskKey {
    pub geometry: u64,
    pub buffer_bits: u64,
    pub grid: GridSignature,
}

impl MaskKey {
    pub fn new(pipeline: &PipelineGeometry, buffer_m: f64, grid: &GridSignature) -> Self {
        Self {
            geometry: pipeline.fingerprint(),
            buffer_bits: buffer_m.to_bits(),
            grid: grid.clone(),
        }
    }
}

/// LRU cache of built corridor masks, shared out as `Arc`s.
pub struct CorridorMaskCache {
    inner: LruCache<MaskKey, Arc<CorridorMask>>,
}

impl CorridorMaskCache {
    /// Create a new cache holding at most `capacity` masks
    pub fn new(capacity: usize) -> Self {
        let cap = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: LruCache::new(cap),
        }
    }

    /// Return the cached mask for this combination, building it on a miss.
    ///
    /// Build errors are returned and nothing is cached.
    pub fn get_or_build(
        &mut self,
        pipeline: &PipelineGeometry,
        buffer_m: f64,
        grid: &GridSignature,
    ) -> Result<Arc<CorridorMask>> {
        let key = MaskKey::new(pipeline, buffer_m, grid);
        if let Some(mask) = self.inner.get(&key) {
            trace!(rows = grid.rows, cols = grid.cols, "corridor mask cache hit");
            return Ok(Arc::clone(mask));
        }

        let mask = Arc::new(corridor_mask(pipeline, buffer_m, grid)?);
        self.inner.put(key, Arc::clone(&mask));
        Ok(mask)
    }

    /// Number of masks currently cached.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Drop all cached masks.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl Default for CorridorMaskCache {
    fn default() -> Self {
        Self::new(16)
    }
}
