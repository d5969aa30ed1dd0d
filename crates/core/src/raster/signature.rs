//! Grid identity: shape, transform and CRS

use crate::crs::CRS;
use crate::raster::GeoTransform;
use std::hash::{Hash, Hasher};

/// The part of a raster that must agree for grids to be combined cell by cell.
#[derive(Debug, Clone)]
pub struct GridSignature {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
    pub crs: Option<CRS>,
}

impl GridSignature {
    /// Describe the first disagreement with `other`, or `None` if aligned.
    ///
    /// Transforms are compared exactly: two grids that differ by a fraction
    /// of a pixel are not the same grid.
    pub fn mismatch(&self, other: &GridSignature) -> Option<String> {
        if (self.rows, self.cols) != (other.rows, other.cols) {
            return Some(format!(
                "shape {}x{} vs {}x{}",
                self.rows, self.cols, other.rows, other.cols
            ));
        }
        if self.transform.to_bits() != other.transform.to_bits() {
            return Some(format!(
                "transform {:?} vs {:?}",
                self.transform, other.transform
            ));
        }
        match (&self.crs, &other.crs) {
            (None, None) => None,
            (Some(a), Some(b)) if a.is_equivalent(b) => None,
            (a, b) => Some(format!(
                "CRS {} vs {}",
                a.as_ref().map_or_else(|| "none".to_string(), |c| c.identifier()),
                b.as_ref().map_or_else(|| "none".to_string(), |c| c.identifier()),
            )),
        }
    }
}

// Keys on the full CRS, which is at least as strict as `mismatch`, so two
// equal signatures never disagree on alignment.
impl PartialEq for GridSignature {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows
            && self.cols == other.cols
            && self.transform.to_bits() == other.transform.to_bits()
            && self.crs == other.crs
    }
}

impl Eq for GridSignature {}

impl Hash for GridSignature {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rows.hash(state);
        self.cols.hash(state);
        self.transform.to_bits().hash(state);
        self.crs.hash(state);
    }
}
