//! Rasterization of the buffered pipeline corridor onto an index grid

use super::buffer::CorridorBuffer;
use aquaspot_core::raster::{GridSignature, Raster};
use aquaspot_core::crs::METRES_PER_DEGREE;
use aquaspot_core::{Error, PipelineGeometry, Result};
use tracing::{debug, warn};

/// Boolean grid marking pixels whose center lies inside the pipeline corridor.
///
/// Stored as a 0/1 `Raster<u8>` on the exact grid it was built for.
#[derive(Debug, Clone)]
pub struct CorridorMask {
    mask: Raster<u8>,
    inside: usize,
}

impl CorridorMask {
    /// Wrap an existing 0/1 raster as a corridor mask.
    ///
    /// Any non-zero cell counts as inside.
    pub fn from_raster(mut mask: Raster<u8>) -> Self {
        mask.data_mut().mapv_inplace(|v| u8::from(v != 0));
        mask.set_nodata(None);
        let inside = mask.data().iter().filter(|&&v| v == 1).count();
        Self { mask, inside }
    }

    /// A mask covering every pixel of `grid`
    pub fn full(grid: &GridSignature) -> Self {
        let mut mask = blank(grid);
        mask.data_mut().fill(1);
        Self::from_raster(mask)
    }

    pub fn raster(&self) -> &Raster<u8> {
        &self.mask
    }

    /// Whether pixel `(row, col)` is inside the corridor; out of range is outside
    pub fn contains(&self, row: usize, col: usize) -> bool {
        self.mask.get(row, col).is_ok_and(|v| v == 1)
    }

    /// Number of pixels inside the corridor
    pub fn inside_count(&self) -> usize {
        self.inside
    }

    /// True when no pixel is inside the corridor
    pub fn is_empty(&self) -> bool {
        self.inside == 0
    }

    pub fn signature(&self) -> GridSignature {
        self.mask.signature()
    }
}

fn blank(grid: &GridSignature) -> Raster<u8> {
    let mut raster = Raster::new(grid.rows, grid.cols).with_transform(grid.transform);
    raster.set_crs(grid.crs.clone());
    raster
}

/// Build the corridor mask of `pipeline` buffered by `buffer_m` metres on `grid`.
///
/// The geometry is reprojected to the grid CRS first; a missing transform is
/// an [`Error::Reprojection`]. A pixel is inside when its center lies
/// within `buffer_m` of any pipeline segment. A corridor that misses the grid
/// entirely gives an all-false mask.
///
/// Buffering is planar in the grid CRS. For geographic grids the distance
/// is converted to degrees of latitude, which overstates the corridor width
/// east-west away from the equator.
pub fn corridor_mask(pipeline: &PipelineGeometry, buffer_m: f64, grid: &GridSignature) -> Result<CorridorMask> {
    if !(buffer_m.is_finite() && buffer_m > 0.0) {
        return Err(Error::InvalidParameter {
            name: "buffer_m",
            value: buffer_m.to_string(),
            reason: "must be a positive distance".into(),
        });
    }

    let lines = pipeline.line_strings_in(grid.crs.as_ref())?;

    let distance = match &grid.crs {
        Some(crs) if crs.is_geographic() => {
            warn!(crs = %crs, buffer_m, "buffering in a geographic CRS, corridor width is approximate");
            buffer_m / METRES_PER_DEGREE
        }
        _ => buffer_m,
    };

    let buffer = CorridorBuffer::new(&lines, distance);
    debug!(
        segments = buffer.segment_count(),
        distance,
        rows = grid.rows,
        cols = grid.cols,
        "rasterizing corridor"
    );

    let mut mask = blank(grid);
    rasterize(&buffer, &mut mask);

    let corridor = CorridorMask::from_raster(mask);
    if corridor.is_empty() {
        warn!("pipeline corridor does not intersect the grid");
    }
    Ok(corridor)
}

/// Burn every capsule of `buffer` into `mask`, visiting only the pixel
/// window covering each capsule's envelope.
fn rasterize(buffer: &CorridorBuffer, mask: &mut Raster<u8>) {
    let (rows, cols) = mask.shape();
    if rows == 0 || cols == 0 {
        return;
    }
    let transform = *mask.transform();

    for ((min_x, min_y, max_x, max_y), capsule) in buffer.capsules() {
        let corners = [
            transform.geo_to_pixel(min_x, min_y),
            transform.geo_to_pixel(min_x, max_y),
            transform.geo_to_pixel(max_x, min_y),
            transform.geo_to_pixel(max_x, max_y),
        ];
        let Some((c0, r0, c1, r1)) = pixel_window(&corners, rows, cols) else {
            continue;
        };

        let data = mask.data_mut();
        for row in r0..=r1 {
            for col in c0..=c1 {
                if data[(row, col)] == 1 {
                    continue;
                }
                let (x, y) = transform.pixel_to_geo(col, row);
                if capsule.contains(x, y) {
                    data[(row, col)] = 1;
                }
            }
        }
    }
}

/// Clamp fractional pixel corners to an inclusive index window, or `None`
/// when the window lies entirely outside the grid.
fn pixel_window(corners: &[(f64, f64); 4], rows: usize, cols: usize) -> Option<(usize, usize, usize, usize)> {
    if corners.iter().any(|(c, r)| !c.is_finite() || !r.is_finite()) {
        return None;
    }
    let (min_c, min_r, max_c, max_r) = corners.iter().fold(
        (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        |acc, &(c, r)| (acc.0.min(c), acc.1.min(r), acc.2.max(c), acc.3.max(r)),
    );

    if max_c < 0.0 || max_r < 0.0 || min_c >= cols as f64 || min_r >= rows as f64 {
        return None;
    }

    let c0 = min_c.floor().max(0.0) as usize;
    let r0 = min_r.floor().max(0.0) as usize;
    let c1 = (max_c.floor() as usize).min(cols - 1);
    let r1 = (max_r.floor() as usize).min(rows - 1);
    Some((c0, r0, c1, r1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use aquaspot_core::{GeoTransform, CRS};

    fn utm_grid(rows: usize, cols: usize) -> GridSignature {
        GridSignature {
            rows,
            cols,
            transform: GeoTransform::new(500_000.0, 4_000_000.0 + rows as f64 * 10.0, 10.0, -10.0),
            crs: Some(CRS::from_epsg(32633)),
        }
    }

    fn horizontal_pipeline(y: f64) -> PipelineGeometry {
        PipelineGeometry::from_polylines(
            Some(CRS::from_epsg(32633)),
            vec![vec![(499_000.0, y), (501_000.0, y)]],
        )
    }

    #[test]
    fn test_marks_pixel_centers_within_buffer() {
        let grid = utm_grid(10, 10);
        // Row 5 centers sit at y = 4_000_045; buffer 12 m reaches rows 4..=6
        let mask = corridor_mask(&horizontal_pipeline(4_000_045.0), 12.0, &grid).unwrap();

        for row in 0..10 {
            let expected = (4..=6).contains(&row);
            for col in 0..10 {
                assert_eq!(mask.contains(row, col), expected, "row {row} col {col}");
            }
        }
        assert_eq!(mask.inside_count(), 30);
        assert_eq!(mask.signature(), grid);
    }

    #[test]
    fn test_non_square_pixels() {
        let mut grid = utm_grid(10, 10);
        grid.transform = GeoTransform::new(500_000.0, 4_000_200.0, 10.0, -20.0);
        // Centers at y = 4_000_200 - 20 * (row + 0.5); pipeline at row 4's center
        let mask = corridor_mask(&horizontal_pipeline(4_000_110.0), 15.0, &grid).unwrap();
        assert_eq!(mask.inside_count(), 10);
        assert!((0..10).all(|col| mask.contains(4, col)));
    }

    #[test]
    fn test_outside_extent_is_empty_not_error() {
        let grid = utm_grid(10, 10);
        let mask = corridor_mask(&horizontal_pipeline(3_000_000.0), 100.0, &grid).unwrap();
        assert!(mask.is_empty());
        assert_eq!(mask.raster().shape(), (10, 10));
    }

    #[test]
    fn test_reprojects_wgs84_geometry() {
        // 15°E is the zone 33 central meridian: easting 500_000
        let lat = 36.0;
        let pipeline = PipelineGeometry::from_polylines(Some(CRS::wgs84()), vec![vec![(15.0, lat - 0.1), (15.0, lat + 0.1)]]);
        let north = aquaspot_core::crs::CoordinateTransform::new(Some(&CRS::wgs84()), Some(&CRS::from_epsg(32633)))
            .unwrap()
            .apply(15.0, lat)
            .1;
        let grid = GridSignature {
            rows: 20,
            cols: 20,
            transform: GeoTransform::new(499_900.0, north + 100.0, 10.0, -10.0),
            crs: Some(CRS::from_epsg(32633)),
        };

        let mask = corridor_mask(&pipeline, 15.0, &grid).unwrap();
        // Column 10 has centers at 500_005, column 8 at 499_985
        assert!(mask.contains(10, 9));
        assert!(mask.contains(10, 10));
        assert!(mask.contains(10, 8));
        assert!(!mask.contains(10, 7));
        assert!(!mask.contains(10, 12));
    }

    #[test]
    fn test_unsupported_crs_is_reprojection_error() {
        let pipeline = PipelineGeometry::from_polylines(Some(CRS::from_epsg(27700)), vec![vec![(0.0, 0.0), (1.0, 1.0)]]);
        let err = corridor_mask(&pipeline, 50.0, &utm_grid(5, 5)).unwrap_err();
        assert!(matches!(err, Error::Reprojection { .. }));
    }

    #[test]
    fn test_rejects_non_positive_buffer() {
        let grid = utm_grid(5, 5);
        for bad in [0.0, -5.0, f64::NAN] {
            assert!(matches!(
                corridor_mask(&horizontal_pipeline(4_000_025.0), bad, &grid),
                Err(Error::InvalidParameter { name: "buffer_m", .. })
            ));
        }
    }

    #[test]
    fn test_from_raster_normalizes_values() {
        let raster = Raster::from_vec(vec![0u8, 3, 1, 255], 2, 2).unwrap();
        let mask = CorridorMask::from_raster(raster);
        assert_eq!(mask.inside_count(), 3);
        assert!(!mask.contains(0, 0));
        assert!(mask.contains(0, 1));
        assert!(!mask.contains(9, 9));
        assert_eq!(CorridorMask::full(&utm_grid(3, 4)).inside_count(), 12);
    }
}
