//! Two-epoch change detection inside the pipeline corridor
//!
//! `diff = current - baseline` per pixel. A pixel is an anomaly when it is
//! inside the corridor, valid in both epochs, and its change reaches the
//! threshold. Changes outside the corridor are never anomalies, which keeps
//! seasonal flooding and sensor noise elsewhere in the tile out of the
//! candidate list.

use crate::corridor::CorridorMask;
use crate::maybe_rayon::*;
use aquaspot_core::raster::Raster;
use aquaspot_core::{Algorithm, Error, RasterElement, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Which sign of change counts as an anomaly
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeDirection {
    /// `|diff| >= threshold`
    #[default]
    Both,
    /// `diff >= threshold` (new water)
    Increase,
    /// `diff <= -threshold` (lost water)
    Decrease,
}

/// Parameters for corridor change detection
#[derive(Debug, Clone)]
pub struct ChangeParams {
    /// Minimum index change, inclusive (default 0.2)
    pub threshold: f64,
    pub direction: ChangeDirection,
}

impl Default for ChangeParams {
    fn default() -> Self {
        Self {
            threshold: 0.2,
            direction: ChangeDirection::Both,
        }
    }
}

impl ChangeParams {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold.is_finite() && self.threshold >= 0.0) {
            return Err(Error::InvalidParameter {
                name: "threshold",
                value: self.threshold.to_string(),
                reason: "must be a finite, non-negative index difference".into(),
            });
        }
        Ok(())
    }

    fn is_anomaly(&self, diff: f64) -> bool {
        match self.direction {
            ChangeDirection::Both => diff.abs() >= self.threshold,
            ChangeDirection::Increase => diff >= self.threshold,
            ChangeDirection::Decrease => diff <= -self.threshold,
        }
    }
}

/// Change statistics over the valid pixels inside the corridor
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeStatistics {
    /// Corridor pixels valid in both epochs
    pub valid_pixels: usize,
    pub anomaly_pixels: usize,
    /// `diff >= threshold`
    pub new_water_pixels: usize,
    /// `diff <= -threshold`
    pub lost_water_pixels: usize,
    pub max_increase: Option<f64>,
    pub max_decrease: Option<f64>,
    pub mean_change: Option<f64>,
    /// Population standard deviation of the change
    pub std_change: Option<f64>,
}

/// Output of [`detect_change`]
#[derive(Debug, Clone)]
pub struct ChangeDetection {
    /// 0/1 anomaly grid
    pub anomalies: Raster<u8>,
    /// Signed `current - baseline`, NaN where either epoch is no-data
    pub difference: Raster<f64>,
    pub statistics: ChangeStatistics,
}

/// Corridor change detection stage
#[derive(Debug, Clone, Default)]
pub struct ChangeDetector;

impl Algorithm for ChangeDetector {
    type Input = (Raster<f64>, Raster<f64>, CorridorMask);
    type Output = ChangeDetection;
    type Params = ChangeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ChangeDetector"
    }

    fn description(&self) -> &'static str {
        "Thresholded index change between two epochs, restricted to the pipeline corridor"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (baseline, current, mask) = input;
        detect_change(&baseline, &current, &mask, &params)
    }
}

/// Detect corridor anomalies between a baseline and a current index grid.
///
/// Fails with [`Error::GridMismatch`] when the two index grids and the mask
/// are not all on the same grid. Identical epochs or sub-threshold change
/// give an all-zero anomaly grid.
pub fn detect_change(
    baseline: &Raster<f64>,
    current: &Raster<f64>,
    mask: &CorridorMask,
    params: &ChangeParams,
) -> Result<ChangeDetection> {
    params.validate()?;

    let grid = baseline.signature();
    if let Some(reason) = grid.mismatch(&current.signature()) {
        return Err(Error::GridMismatch {
            reason: format!("baseline vs current: {reason}"),
        });
    }
    if let Some(reason) = grid.mismatch(&mask.signature()) {
        return Err(Error::GridMismatch {
            reason: format!("index grids vs corridor mask: {reason}"),
        });
    }

    let (rows, cols) = baseline.shape();
    debug!(rows, cols, threshold = params.threshold, corridor_pixels = mask.inside_count(), "detecting change");

    let nodata_b = baseline.nodata();
    let nodata_c = current.nodata();
    let vb = baseline.view();
    let vc = current.view();
    let vm = mask.raster().view();

    let (diff_data, anomaly_data): (Vec<f64>, Vec<u8>) = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut cells = Vec::with_capacity(cols);
            for col in 0..cols {
                let b = vb[(row, col)];
                let c = vc[(row, col)];

                if b.is_nodata(nodata_b) || c.is_nodata(nodata_c) {
                    cells.push((f64::NAN, 0));
                    continue;
                }

                let d = c - b;
                let anomaly = vm[(row, col)] == 1 && params.is_anomaly(d);
                cells.push((d, u8::from(anomaly)));
            }
            cells
        })
        .unzip();

    let difference = Array2::from_shape_vec((rows, cols), diff_data).map_err(|e| Error::Other(e.to_string()))?;
    let anomalies = Array2::from_shape_vec((rows, cols), anomaly_data).map_err(|e| Error::Other(e.to_string()))?;

    let statistics = corridor_statistics(&difference, &anomalies, mask, params.threshold);
    info!(
        anomaly_pixels = statistics.anomaly_pixels,
        new_water = statistics.new_water_pixels,
        lost_water = statistics.lost_water_pixels,
        "change detection finished"
    );

    let mut difference = baseline.with_data(difference)?;
    difference.set_nodata(Some(f64::NAN));

    Ok(ChangeDetection {
        anomalies: baseline.with_data(anomalies)?,
        difference,
        statistics,
    })
}

fn corridor_statistics(
    difference: &Array2<f64>,
    anomalies: &Array2<u8>,
    mask: &CorridorMask,
    threshold: f64,
) -> ChangeStatistics {
    let mut stats = ChangeStatistics::default();
    let mut sum = 0.0;
    let mut sum_sq = 0.0;

    let inside = mask.raster().data();
    for ((&d, &a), &m) in difference.iter().zip(anomalies.iter()).zip(inside.iter()) {
        if m != 1 || d.is_nan() {
            continue;
        }
        stats.valid_pixels += 1;
        stats.anomaly_pixels += usize::from(a);
        if d >= threshold {
            stats.new_water_pixels += 1;
        }
        if d <= -threshold {
            stats.lost_water_pixels += 1;
        }
        stats.max_increase = Some(stats.max_increase.map_or(d, |v| v.max(d)));
        stats.max_decrease = Some(stats.max_decrease.map_or(d, |v| v.min(d)));
        sum += d;
        sum_sq += d * d;
    }

    if stats.valid_pixels > 0 {
        let n = stats.valid_pixels as f64;
        let mean = sum / n;
        stats.mean_change = Some(mean);
        stats.std_change = Some((sum_sq / n - mean * mean).max(0.0).sqrt());
    }
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use aquaspot_core::{GeoTransform, CRS};

    fn make_index(rows: usize, cols: usize, value: f64) -> Raster<f64> {
        Raster::filled(rows, cols, value)
            .with_transform(GeoTransform::new(300_000.0, 5_000_000.0, 10.0, -10.0))
            .with_crs(CRS::from_epsg(32631))
    }

    fn full_mask(grid: &Raster<f64>) -> CorridorMask {
        CorridorMask::full(&grid.signature())
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let baseline = make_index(1, 3, 0.0);
        let mut current = make_index(1, 3, 0.0);
        current.set(0, 0, 0.25).unwrap();
        current.set(0, 1, 0.2499).unwrap();
        current.set(0, 2, -0.25).unwrap();

        let params = ChangeParams {
            threshold: 0.25,
            ..Default::default()
        };
        let result = detect_change(&baseline, &current, &full_mask(&baseline), &params).unwrap();
        assert_eq!(result.anomalies.data().as_slice().unwrap(), &[1, 0, 1]);
        assert_eq!(result.statistics.new_water_pixels, 1);
        assert_eq!(result.statistics.lost_water_pixels, 1);
    }

    #[test]
    fn test_direction_filters() {
        let baseline = make_index(1, 2, 0.0);
        let mut current = make_index(1, 2, 0.5);
        current.set(0, 1, -0.5).unwrap();
        let mask = full_mask(&baseline);

        let up = ChangeParams {
            direction: ChangeDirection::Increase,
            ..Default::default()
        };
        let down = ChangeParams {
            direction: ChangeDirection::Decrease,
            ..Default::default()
        };
        let up = detect_change(&baseline, &current, &mask, &up).unwrap();
        let down = detect_change(&baseline, &current, &mask, &down).unwrap();
        assert_eq!(up.anomalies.data().as_slice().unwrap(), &[1, 0]);
        assert_eq!(down.anomalies.data().as_slice().unwrap(), &[0, 1]);
    }

    #[test]
    fn test_outside_corridor_and_nodata_never_anomalous() {
        let mut baseline = make_index(2, 2, 0.0);
        let current = make_index(2, 2, 0.9);
        baseline.set(1, 1, f64::NAN).unwrap();

        let mut mask_raster: Raster<u8> = baseline.with_same_meta();
        mask_raster.set(0, 0, 1).unwrap();
        mask_raster.set(1, 1, 1).unwrap();
        let mask = CorridorMask::from_raster(mask_raster);

        let result = detect_change(&baseline, &current, &mask, &ChangeParams::default()).unwrap();
        assert_eq!(result.anomalies.data().as_slice().unwrap(), &[1, 0, 0, 0]);
        assert!(result.difference.get(1, 1).unwrap().is_nan());
        assert_relative_eq!(result.difference.get(0, 1).unwrap(), 0.9);
        assert_eq!(result.statistics.valid_pixels, 1);
    }

    #[test]
    fn test_identical_epochs_have_no_anomalies() {
        let baseline = make_index(10, 10, 0.3);
        let current = baseline.clone();
        let result = detect_change(&baseline, &current, &full_mask(&baseline), &ChangeParams::default()).unwrap();

        assert!(result.anomalies.data().iter().all(|&v| v == 0));
        let stats = &result.statistics;
        assert_eq!(stats.valid_pixels, 100);
        assert_eq!(stats.anomaly_pixels, 0);
        assert_eq!(stats.mean_change, Some(0.0));
        assert_eq!(stats.std_change, Some(0.0));
    }

    #[test]
    fn test_statistics() {
        let baseline = make_index(1, 4, 0.1);
        let mut current = make_index(1, 4, 0.1);
        current.set(0, 0, 0.6).unwrap();
        current.set(0, 1, -0.2).unwrap();
        let result = detect_change(&baseline, &current, &full_mask(&baseline), &ChangeParams::default()).unwrap();

        let stats = result.statistics;
        assert_eq!(stats.anomaly_pixels, 2);
        assert_relative_eq!(stats.max_increase.unwrap(), 0.5, epsilon = 1e-12);
        assert_relative_eq!(stats.max_decrease.unwrap(), -0.3, epsilon = 1e-12);
        assert_relative_eq!(stats.mean_change.unwrap(), 0.05, epsilon = 1e-12);
        // population std of [0.5, -0.3, 0, 0]
        let expected = ((0.45f64.powi(2) + 0.35f64.powi(2) + 2.0 * 0.05f64.powi(2)) / 4.0).sqrt();
        assert_relative_eq!(stats.std_change.unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_grid_mismatch() {
        let baseline = make_index(5, 5, 0.0);
        let current = make_index(5, 4, 0.0);
        let mask = full_mask(&baseline);
        let params = ChangeParams::default();

        assert!(matches!(
            detect_change(&baseline, &current, &mask, &params),
            Err(Error::GridMismatch { .. })
        ));

        let other_crs = make_index(5, 5, 0.0).with_crs(CRS::from_epsg(32632));
        assert!(matches!(
            detect_change(&baseline, &other_crs, &mask, &params),
            Err(Error::GridMismatch { .. })
        ));

        let small_mask = full_mask(&make_index(4, 4, 0.0));
        let err = detect_change(&baseline, &baseline, &small_mask, &params).unwrap_err();
        assert!(err.to_string().contains("corridor mask"));
    }

    #[test]
    fn test_rejects_invalid_threshold() {
        let baseline = make_index(2, 2, 0.0);
        let mask = full_mask(&baseline);
        for threshold in [-0.1, f64::INFINITY, f64::NAN] {
            let params = ChangeParams {
                threshold,
                ..Default::default()
            };
            assert!(matches!(
                ChangeDetector.execute((baseline.clone(), baseline.clone(), mask.clone()), params),
                Err(Error::InvalidParameter { .. })
            ));
        }
    }
}
