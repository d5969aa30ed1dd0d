//! End-to-end leak detection over one or more tiles
//!
//! Each tile runs water index, corridor mask, change detection and cluster
//! extraction on its own. Clusters from all tiles are ranked together, so
//! rank 1 is the most severe candidate across the whole request.

use crate::change_detection::{detect_change, ChangeStatistics};
use crate::cluster::{extract_clusters, AnomalyCluster, ClusterParams};
use crate::config::DetectionConfig;
use crate::corridor::{CorridorMask, CorridorMaskCache};
use crate::imagery::{water_index, BandPair};
use crate::maybe_rayon::*;
use crate::rank::{rank_candidates, RankedCandidate};
use aquaspot_core::raster::{GridSignature, Raster};
use aquaspot_core::{PipelineGeometry, Result};
use serde::Serialize;
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{debug, info, info_span};

/// Imagery of one acquisition date
#[derive(Debug, Clone)]
pub enum Epoch {
    /// Raw green / NIR bands; the index is computed on the fly
    Bands(BandPair),
    /// A precomputed water index grid
    Index(Raster<f64>),
}

impl Epoch {
    fn signature(&self) -> GridSignature {
        match self {
            Epoch::Bands(pair) => pair.a().signature(),
            Epoch::Index(index) => index.signature(),
        }
    }

    fn index(&self) -> Result<Cow<'_, Raster<f64>>> {
        match self {
            Epoch::Bands(pair) => water_index(pair).map(Cow::Owned),
            Epoch::Index(index) => Ok(Cow::Borrowed(index)),
        }
    }
}

/// Baseline and current imagery for one tile
#[derive(Debug, Clone)]
pub struct TileInput {
    pub id: String,
    pub baseline: Epoch,
    pub current: Epoch,
}

impl TileInput {
    pub fn new(id: impl Into<String>, baseline: Epoch, current: Epoch) -> Self {
        Self {
            id: id.into(),
            baseline,
            current,
        }
    }

    /// Grid of the baseline epoch; the corridor mask is built on it
    pub fn grid(&self) -> GridSignature {
        self.baseline.signature()
    }
}

/// Per-tile outcome
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TileSummary {
    pub tile: String,
    pub corridor_pixels: usize,
    pub statistics: ChangeStatistics,
    pub clusters: usize,
}

/// Result of analyzing a single tile, before ranking
#[derive(Debug, Clone)]
pub struct TileAnalysis {
    pub summary: TileSummary,
    pub clusters: Vec<AnomalyCluster>,
}

/// Ranked candidates of a whole request
#[derive(Debug, Clone, Serialize)]
pub struct DetectionReport {
    pub candidates: Vec<RankedCandidate>,
    pub tiles: Vec<TileSummary>,
    /// Clusters found before the area filter and `top_k`
    pub total_clusters: usize,
}

/// Runs the detection pipeline with a fixed configuration, reusing corridor
/// masks across calls.
pub struct LeakDetector {
    config: DetectionConfig,
    cache: CorridorMaskCache,
}

impl LeakDetector {
    /// Fails with [`aquaspot_core::Error::InvalidParameter`] when the
    /// configuration is out of range.
    pub fn new(config: DetectionConfig) -> Result<Self> {
        config.validate()?;
        let cache = CorridorMaskCache::new(config.mask_cache_capacity);
        Ok(Self { config, cache })
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.config
    }

    pub fn cache(&self) -> &CorridorMaskCache {
        &self.cache
    }

    fn mask_for(&mut self, tile: &TileInput, pipeline: &PipelineGeometry) -> Result<Arc<CorridorMask>> {
        self.cache
            .get_or_build(pipeline, self.config.pipeline_buffer_m, &tile.grid())
    }

    /// Analyze one tile without ranking.
    pub fn analyze_tile(&mut self, tile: &TileInput, pipeline: &PipelineGeometry) -> Result<TileAnalysis> {
        let mask = self.mask_for(tile, pipeline)?;
        run_tile(tile, &mask, &self.config)
    }

    /// Analyze every tile and rank the union of their clusters.
    ///
    /// Masks are built up front; tiles then run in parallel. Any tile error
    /// fails the whole call.
    pub fn analyze(&mut self, tiles: &[TileInput], pipeline: &PipelineGeometry) -> Result<DetectionReport> {
        let _span = info_span!("analyze", tiles = tiles.len()).entered();

        let masks = tiles
            .iter()
            .map(|tile| self.mask_for(tile, pipeline))
            .collect::<Result<Vec<_>>>()?;

        let config = &self.config;
        let analyses: Vec<TileAnalysis> = (0..tiles.len())
            .into_par_iter()
            .map(|i| run_tile(&tiles[i], &masks[i], config))
            .collect::<Result<Vec<_>>>()?;

        let mut summaries = Vec::with_capacity(analyses.len());
        let mut clusters = Vec::new();
        for analysis in analyses {
            summaries.push(analysis.summary);
            clusters.extend(analysis.clusters);
        }

        let total_clusters = clusters.len();
        let candidates = rank_candidates(clusters, &config.rank_params())?;
        info!(total_clusters, candidates = candidates.len(), "detection finished");

        Ok(DetectionReport {
            candidates,
            tiles: summaries,
            total_clusters,
        })
    }
}

fn run_tile(tile: &TileInput, mask: &CorridorMask, config: &DetectionConfig) -> Result<TileAnalysis> {
    debug!(tile = %tile.id, corridor_pixels = mask.inside_count(), "analyzing tile");

    let baseline = tile.baseline.index()?;
    let current = tile.current.index()?;
    let change = detect_change(&baseline, &current, mask, &config.change_params())?;

    let params = ClusterParams {
        source_tile: tile.id.clone(),
        ..Default::default()
    };
    let clusters = extract_clusters(&change.anomalies, &change.difference, &params)?;

    Ok(TileAnalysis {
        summary: TileSummary {
            tile: tile.id.clone(),
            corridor_pixels: mask.inside_count(),
            statistics: change.statistics,
            clusters: clusters.len(),
        },
        clusters,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquaspot_core::{Error, GeoTransform, CRS};

    fn index(value: f64) -> Raster<f64> {
        Raster::filled(10, 10, value)
            .with_transform(GeoTransform::new(400_000.0, 5_000_100.0, 10.0, -10.0))
            .with_crs(CRS::from_epsg(32632))
    }

    fn pipeline() -> PipelineGeometry {
        // Along row 4's pixel centers
        PipelineGeometry::from_polylines(
            Some(CRS::from_epsg(32632)),
            vec![vec![(400_000.0, 5_000_055.0), (400_100.0, 5_000_055.0)]],
        )
    }

    #[test]
    fn test_rejects_invalid_config() {
        let config = DetectionConfig {
            pipeline_buffer_m: -1.0,
            ..Default::default()
        };
        assert!(matches!(LeakDetector::new(config), Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_analyze_tile_reuses_mask() {
        let mut detector = LeakDetector::new(DetectionConfig::default()).unwrap();
        let mut current = index(0.0);
        current.set(4, 4, 0.8).unwrap();
        let tile = TileInput::new("a", Epoch::Index(index(0.0)), Epoch::Index(current));

        let first = detector.analyze_tile(&tile, &pipeline()).unwrap();
        let second = detector.analyze_tile(&tile, &pipeline()).unwrap();
        assert_eq!(detector.cache().len(), 1);
        assert_eq!(first.summary, second.summary);
        assert_eq!(first.clusters.len(), 1);
        assert_eq!(first.clusters[0].source_tile, "a");
        assert_eq!(first.summary.corridor_pixels, 100);
    }

    #[test]
    fn test_band_epochs_compute_index() {
        let baseline = BandPair::green_nir(index(0.1), index(0.3)).unwrap();
        let current = BandPair::green_nir(index(0.3), index(0.1)).unwrap();
        let tile = TileInput::new("bands", Epoch::Bands(baseline), Epoch::Bands(current));

        let mut detector = LeakDetector::new(DetectionConfig::default()).unwrap();
        let report = detector.analyze(&[tile], &pipeline()).unwrap();
        // Index moves from -0.5 to 0.5 everywhere: one 10 x 10 cluster
        assert_eq!(report.total_clusters, 1);
        assert_eq!(report.candidates[0].cluster.pixel_count, 100);
        assert_eq!(report.tiles[0].statistics.new_water_pixels, 100);
    }

    #[test]
    fn test_empty_request() {
        let mut detector = LeakDetector::new(DetectionConfig::default()).unwrap();
        let report = detector.analyze(&[], &pipeline()).unwrap();
        assert!(report.candidates.is_empty());
        assert!(report.tiles.is_empty());
    }
}
