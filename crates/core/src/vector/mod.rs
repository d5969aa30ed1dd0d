//! Pipeline centerline geometry

use crate::crs::{CoordinateTransform, CRS};
use crate::error::Result;
use geo_types::{Coord, Geometry, LineString};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// One monitored pipeline segment
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineFeature {
    /// Centerline geometry. Only linear geometries contribute to a corridor.
    pub geometry: Geometry<f64>,
    /// Optional operator-assigned identifier
    pub id: Option<String>,
}

impl PipelineFeature {
    /// Create a feature from any geometry
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            geometry: geometry.into(),
            id: None,
        }
    }

    /// Attach an identifier
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// The polylines making up this feature.
    ///
    /// `LineString` and `MultiLineString` members (including inside a
    /// `GeometryCollection`) are yielded; points and polygons are not.
    pub fn line_strings(&self) -> Vec<&LineString<f64>> {
        let mut out = Vec::new();
        collect_lines(&self.geometry, &mut out);
        out
    }
}

fn collect_lines<'a>(geometry: &'a Geometry<f64>, out: &mut Vec<&'a LineString<f64>>) {
    match geometry {
        Geometry::LineString(ls) => out.push(ls),
        Geometry::MultiLineString(mls) => out.extend(mls.0.iter()),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0.iter() {
                collect_lines(g, out);
            }
        }
        _ => {}
    }
}

/// The monitored corridor centerline: an ordered set of line features in one CRS.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineGeometry {
    features: Vec<PipelineFeature>,
    crs: Option<CRS>,
}

impl PipelineGeometry {
    /// Create an empty geometry in `crs`
    pub fn new(crs: Option<CRS>) -> Self {
        Self {
            features: Vec::new(),
            crs,
        }
    }

    /// Convenience constructor from bare coordinate lists, one per polyline
    pub fn from_polylines(crs: Option<CRS>, polylines: Vec<Vec<(f64, f64)>>) -> Self {
        let features = polylines
            .into_iter()
            .map(|coords| PipelineFeature::new(LineString::from(coords)))
            .collect();
        Self { features, crs }
    }

    pub fn push(&mut self, feature: PipelineFeature) {
        self.features.push(feature);
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn features(&self) -> &[PipelineFeature] {
        &self.features
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// All polylines of all features, in feature order
    pub fn line_strings(&self) -> impl Iterator<Item = &LineString<f64>> {
        self.features.iter().flat_map(|f| f.line_strings())
    }

    /// Polylines expressed in `target`, reprojecting vertex by vertex.
    ///
    /// Fails with [`crate::Error::Reprojection`] when no transform exists
    /// between the geometry's CRS and `target`.
    pub fn line_strings_in(&self, target: Option<&CRS>) -> Result<Vec<LineString<f64>>> {
        let transform = CoordinateTransform::new(self.crs.as_ref(), target)?;
        Ok(self
            .line_strings()
            .map(|ls| {
                if transform.is_identity() {
                    return ls.clone();
                }
                ls.coords()
                    .map(|c| {
                        let (x, y) = transform.apply(c.x, c.y);
                        Coord { x, y }
                    })
                    .collect()
            })
            .collect())
    }

    /// Stable content hash of the linear geometry and its CRS.
    ///
    /// Two geometries with the same vertices (bit for bit) and CRS share a
    /// fingerprint; used to key derived corridor masks.
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.crs.hash(&mut hasher);
        for ls in self.line_strings() {
            ls.0.len().hash(&mut hasher);
            for c in ls.coords() {
                c.x.to_bits().hash(&mut hasher);
                c.y.to_bits().hash(&mut hasher);
            }
        }
        hasher.finish()
    }
}
