//! # AquaSpot Algorithms
//!
//! Change detection stages for spotting pipeline leaks in multispectral
//! imagery.
//!
//! - **imagery**: water index (NDWI) and water classification
//! - **corridor**: buffered pipeline corridor masks and their cache
//! - **change_detection**: thresholded two-epoch change inside the corridor
//! - **cluster**: connected anomaly clusters with area and intensity
//! - **rank**: area filter and severity ranking
//! - **pipeline**: multi-tile orchestration over all of the above
//!
//! ```
//! use aquaspot_algorithms::prelude::*;
//!
//! let grid = |v: f64| {
//!     Raster::filled(10, 10, v)
//!         .with_transform(GeoTransform::new(500_000.0, 4_000_100.0, 10.0, -10.0))
//!         .with_crs(CRS::from_epsg(32633))
//! };
//! let mut current = grid(0.0);
//! for row in 3..6 {
//!     for col in 3..6 {
//!         current.set(row, col, 1.0).unwrap();
//!     }
//! }
//! let pipeline = PipelineGeometry::from_polylines(
//!     Some(CRS::from_epsg(32633)),
//!     vec![vec![(500_000.0, 4_000_055.0), (500_100.0, 4_000_055.0)]],
//! );
//!
//! let mut detector = LeakDetector::new(DetectionConfig::default()).unwrap();
//! let tile = TileInput::new("demo", Epoch::Index(grid(0.0)), Epoch::Index(current));
//! let report = detector.analyze(&[tile], &pipeline).unwrap();
//!
//! assert_eq!(report.candidates.len(), 1);
//! assert_eq!(report.candidates[0].cluster.area_m2, 900.0);
//! ```

pub mod change_detection;
pub mod cluster;
pub mod config;
pub mod corridor;
pub mod imagery;
pub mod pipeline;
pub mod rank;

mod maybe_rayon;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::change_detection::{
        detect_change, ChangeDetection, ChangeDetector, ChangeDirection, ChangeParams, ChangeStatistics,
    };
    pub use crate::cluster::{
        extract_clusters, label_components, AnomalyCluster, ClusterExtractor, ClusterParams, GeoBounds, PixelBounds,
    };
    pub use crate::config::DetectionConfig;
    pub use crate::corridor::{corridor_mask, CorridorMask, CorridorMaskCache};
    pub use crate::imagery::{detect_water, ndwi, water_index, BandPair, WaterIndex, WaterSummary};
    pub use crate::pipeline::{DetectionReport, Epoch, LeakDetector, TileAnalysis, TileInput, TileSummary};
    pub use crate::rank::{
        rank_candidates, rank_candidates_with, CandidateRanker, RankParams, RankedCandidate, Scoring, SeverityScore,
    };
    pub use aquaspot_core::prelude::*;
}
