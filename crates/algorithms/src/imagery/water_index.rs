//! Normalized difference water index
//!
//! `NDWI = (Green - NIR) / (Green + NIR)` (McFeeters, 1996). Positive values
//! indicate open water; a jump between two epochs inside the corridor is the
//! leak signal the rest of the engine looks for.

use crate::maybe_rayon::*;
use aquaspot_core::raster::Raster;
use aquaspot_core::{Algorithm, Error, RasterElement, Result};
use ndarray::Array2;
use tracing::debug;

/// Two spectral bands of one epoch, checked to share one grid.
///
/// `a` is the positive term of the index (green-like), `b` the negative
/// term (near-infrared-like).
#[derive(Debug, Clone)]
pub struct BandPair {
    a: Raster<f64>,
    b: Raster<f64>,
}

impl BandPair {
    /// Pair two bands, failing with [`Error::BandShapeMismatch`] when their
    /// shape, transform or CRS differ.
    pub fn new(a: Raster<f64>, b: Raster<f64>) -> Result<Self> {
        if let Some(reason) = a.signature().mismatch(&b.signature()) {
            return Err(Error::BandShapeMismatch { reason });
        }
        Ok(Self { a, b })
    }

    /// Green / NIR pair for NDWI
    pub fn green_nir(green: Raster<f64>, nir: Raster<f64>) -> Result<Self> {
        Self::new(green, nir)
    }

    pub fn a(&self) -> &Raster<f64> {
        &self.a
    }

    pub fn b(&self) -> &Raster<f64> {
        &self.b
    }
}

/// Water index stage
#[derive(Debug, Clone, Default)]
pub struct WaterIndex;

impl Algorithm for WaterIndex {
    type Input = BandPair;
    type Output = Raster<f64>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "WaterIndex"
    }

    fn description(&self) -> &'static str {
        "Normalized difference water index (a - b) / (a + b) from a validated band pair"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        water_index(&input)
    }
}

/// Compute `(a - b) / (a + b)` for every pixel of a band pair.
///
/// The output has the bands' grid and NaN as no-data. A pixel is no-data
/// when either band is no-data there or when `a + b == 0`; neither case is
/// an error.
pub fn water_index(bands: &BandPair) -> Result<Raster<f64>> {
    let (a, b) = (&bands.a, &bands.b);
    let (rows, cols) = a.shape();
    debug!(rows, cols, "computing water index");

    let nodata_a = a.nodata();
    let nodata_b = b.nodata();
    let va = a.view();
    let vb = b.view();

    let data: Vec<f64> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![f64::NAN; cols];
            for (col, out) in row_data.iter_mut().enumerate() {
                let x = va[(row, col)];
                let y = vb[(row, col)];

                if x.is_nodata(nodata_a) || y.is_nodata(nodata_b) {
                    continue;
                }

                let sum = x + y;
                if sum == 0.0 {
                    continue;
                }

                *out = (x - y) / sum;
            }
            row_data
        })
        .collect();

    let array = Array2::from_shape_vec((rows, cols), data).map_err(|e| Error::Other(e.to_string()))?;
    let mut output = a.with_data(array)?;
    output.set_nodata(Some(f64::NAN));
    Ok(output)
}

/// NDWI from green and near-infrared bands.
///
/// Same as [`water_index`] on `BandPair::green_nir(green, nir)` but
/// borrowing the bands.
pub fn ndwi(green: &Raster<f64>, nir: &Raster<f64>) -> Result<Raster<f64>> {
    let pair = BandPair::green_nir(green.clone(), nir.clone())?;
    water_index(&pair)
}

/// Summary of a water classification
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WaterSummary {
    /// Pixels classified as water
    pub water_pixels: usize,
    /// Pixels with a valid index value
    pub valid_pixels: usize,
}

impl WaterSummary {
    /// Share of valid pixels classified as water, 0 when nothing is valid
    pub fn water_fraction(&self) -> f64 {
        if self.valid_pixels == 0 {
            0.0
        } else {
            self.water_pixels as f64 / self.valid_pixels as f64
        }
    }
}

/// Classify water pixels: `index > threshold` (strict).
///
/// Returns a 0/1 mask on the index grid; no-data pixels are never water.
pub fn detect_water(index: &Raster<f64>, threshold: f64) -> Result<(Raster<u8>, WaterSummary)> {
    if !threshold.is_finite() {
        return Err(Error::InvalidParameter {
            name: "threshold",
            value: threshold.to_string(),
            reason: "must be finite".into(),
        });
    }

    let nodata = index.nodata();
    let mut valid_pixels = 0;
    let mask = index.data().map(|&v| {
        if v.is_nodata(nodata) {
            return 0u8;
        }
        valid_pixels += 1;
        u8::from(v > threshold)
    });
    let water_pixels = mask.iter().filter(|&&m| m == 1).count();

    let summary = WaterSummary {
        water_pixels,
        valid_pixels,
    };
    debug!(
        water_pixels,
        valid_pixels,
        fraction = summary.water_fraction(),
        "water classification"
    );

    Ok((index.with_data(mask)?, summary))
}
