//! Imagery analysis
//!
//! - Water index: NDWI from a validated green/NIR band pair
//! - Water classification: thresholded index

mod water_index;

pub use water_index::{detect_water, ndwi, water_index, BandPair, WaterIndex, WaterSummary};
