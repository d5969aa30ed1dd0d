//! Detection configuration
//!
//! Plain values passed to [`crate::pipeline::LeakDetector`]. Field names
//! match the `NDWI_THRESHOLD`, `MIN_LEAK_AREA_M2` and `PIPELINE_BUFFER_M`
//! settings of the deployment, lower-cased, so a loader can deserialize
//! them directly. Missing fields take their defaults.

use crate::change_detection::{ChangeDirection, ChangeParams};
use crate::rank::{RankParams, Scoring};
use aquaspot_core::{Error, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Minimum index change (inclusive) for an anomaly pixel
    pub ndwi_threshold: f64,
    /// Minimum cluster area kept as a candidate (inclusive)
    pub min_leak_area_m2: f64,
    /// Corridor half-width around the pipeline centerline
    pub pipeline_buffer_m: f64,
    pub top_k: Option<usize>,
    pub direction: ChangeDirection,
    pub scoring: Scoring,
    /// Corridor masks kept between calls
    pub mask_cache_capacity: usize,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            ndwi_threshold: 0.2,
            min_leak_area_m2: 25.0,
            pipeline_buffer_m: 100.0,
            top_k: None,
            direction: ChangeDirection::Both,
            scoring: Scoring::AreaIntensity,
            mask_cache_capacity: 16,
        }
    }
}

impl DetectionConfig {
    /// Check every value is in range before any raster work starts.
    pub fn validate(&self) -> Result<()> {
        if !(self.pipeline_buffer_m.is_finite() && self.pipeline_buffer_m > 0.0) {
            return Err(Error::InvalidParameter {
                name: "pipeline_buffer_m",
                value: self.pipeline_buffer_m.to_string(),
                reason: "must be a positive distance".into(),
            });
        }
        if !(self.min_leak_area_m2.is_finite() && self.min_leak_area_m2 >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "min_leak_area_m2",
                value: self.min_leak_area_m2.to_string(),
                reason: "must be a finite, non-negative area".into(),
            });
        }
        if self.mask_cache_capacity == 0 {
            return Err(Error::InvalidParameter {
                name: "mask_cache_capacity",
                value: "0".into(),
                reason: "must hold at least one mask".into(),
            });
        }
        self.change_params().validate()?;
        self.rank_params().validate()
    }

    pub fn change_params(&self) -> ChangeParams {
        ChangeParams {
            threshold: self.ndwi_threshold,
            direction: self.direction,
        }
    }

    pub fn rank_params(&self) -> RankParams {
        RankParams {
            min_area_m2: self.min_leak_area_m2,
            top_k: self.top_k,
            scoring: self.scoring,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.ndwi_threshold, 0.2);
        assert_eq!(config.min_leak_area_m2, 25.0);
        assert_eq!(config.pipeline_buffer_m, 100.0);
        assert!(config.validate().is_ok());
        assert_eq!(config.rank_params().min_area_m2, 25.0);
        assert_eq!(config.change_params().threshold, 0.2);
    }

    #[test]
    fn test_validation_names_offending_field() {
        let cases = [
            (
                DetectionConfig {
                    ndwi_threshold: -0.1,
                    ..Default::default()
                },
                "threshold",
            ),
            (
                DetectionConfig {
                    min_leak_area_m2: f64::NAN,
                    ..Default::default()
                },
                "min_leak_area_m2",
            ),
            (
                DetectionConfig {
                    pipeline_buffer_m: 0.0,
                    ..Default::default()
                },
                "pipeline_buffer_m",
            ),
            (
                DetectionConfig {
                    top_k: Some(0),
                    ..Default::default()
                },
                "top_k",
            ),
        ];

        for (config, field) in cases {
            match config.validate() {
                Err(Error::InvalidParameter { name, .. }) => assert_eq!(name, field),
                other => panic!("expected InvalidParameter for {field}, got {other:?}"),
            }
        }
    }
}
