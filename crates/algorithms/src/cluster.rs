//! Connected-component extraction of anomaly clusters
//!
//! Labels are kept in a flat arena (`Vec<u32>`, one slot per pixel, 0 for
//! background) and filled with an explicit stack, so memory stays bounded
//! by the grid size no matter how large a single cluster grows.

use aquaspot_core::crs::METRES_PER_DEGREE;
use aquaspot_core::raster::{Neighborhood, Raster};
use aquaspot_core::{Algorithm, Error, Result};
use ndarray::Array2;
use serde::Serialize;
use tracing::{debug, info, warn};

/// Inclusive pixel-space bounding box
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct PixelBounds {
    pub min_row: usize,
    pub min_col: usize,
    pub max_row: usize,
    pub max_col: usize,
}

/// Geographic bounding box in the grid CRS
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoBounds {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

/// A maximal connected group of anomaly pixels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnomalyCluster {
    /// Label within its tile, 1-based in row-major discovery order
    pub label: u32,
    /// Identifier of the tile the cluster was found in
    pub source_tile: String,
    pub pixel_count: usize,
    /// Ground area in m². Projected grids use CRS units squared; geographic
    /// grids scale degrees² at the centroid latitude.
    pub area_m2: f64,
    /// Geographic centroid `(x, y)` of the member pixel centers
    pub centroid: (f64, f64),
    pub mean_abs_diff: f64,
    pub max_abs_diff: f64,
    pub pixel_bounds: PixelBounds,
    pub geo_bounds: GeoBounds,
}

/// Parameters for cluster extraction
#[derive(Debug, Clone, Default)]
pub struct ClusterParams {
    /// Pixel adjacency (default: 8-connected)
    pub connectivity: Neighborhood,
    /// Tile identifier stamped on every cluster
    pub source_tile: String,
}

/// Cluster extraction stage
#[derive(Debug, Clone, Default)]
pub struct ClusterExtractor;

impl Algorithm for ClusterExtractor {
    type Input = (Raster<u8>, Raster<f64>);
    type Output = Vec<AnomalyCluster>;
    type Params = ClusterParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "ClusterExtractor"
    }

    fn description(&self) -> &'static str {
        "Group anomaly pixels into connected clusters with area, centroid and intensity"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        let (anomalies, difference) = input;
        extract_clusters(&anomalies, &difference, &params)
    }
}

/// Label the connected components of the non-zero cells of `anomalies`.
///
/// Returns the label raster (0 = background, 1..=n in row-major discovery
/// order) on the anomaly grid, together with the number of components.
pub fn label_components(anomalies: &Raster<u8>, connectivity: Neighborhood) -> Result<(Raster<u32>, usize)> {
    let (rows, cols) = anomalies.shape();
    let (labels, count) = label_arena(anomalies, connectivity)?;
    let array = Array2::from_shape_vec((rows, cols), labels).map_err(|e| Error::Other(e.to_string()))?;
    Ok((anomalies.with_data(array)?, count))
}

fn label_arena(anomalies: &Raster<u8>, connectivity: Neighborhood) -> Result<(Vec<u32>, usize)> {
    let (rows, cols) = anomalies.shape();
    let data = anomalies.view();
    let mut labels = vec![0u32; rows * cols];
    let mut stack: Vec<(usize, usize)> = Vec::new();
    let mut current = 0u32;

    for row in 0..rows {
        for col in 0..cols {
            if data[(row, col)] == 0 || labels[row * cols + col] != 0 {
                continue;
            }
            current = current
                .checked_add(1)
                .ok_or_else(|| Error::Other("too many anomaly clusters for u32 labels".into()))?;

            labels[row * cols + col] = current;
            stack.push((row, col));
            while let Some((r, c)) = stack.pop() {
                for (nr, nc) in connectivity.neighbors(r, c, rows, cols) {
                    let idx = nr * cols + nc;
                    if data[(nr, nc)] != 0 && labels[idx] == 0 {
                        labels[idx] = current;
                        stack.push((nr, nc));
                    }
                }
            }
        }
    }

    Ok((labels, current as usize))
}

#[derive(Debug, Clone)]
struct Accumulator {
    count: usize,
    sum_row: f64,
    sum_col: f64,
    sum_abs: f64,
    finite: usize,
    max_abs: f64,
    bounds: PixelBounds,
}

impl Accumulator {
    fn new(row: usize, col: usize) -> Self {
        Self {
            count: 0,
            sum_row: 0.0,
            sum_col: 0.0,
            sum_abs: 0.0,
            finite: 0,
            max_abs: 0.0,
            bounds: PixelBounds {
                min_row: row,
                min_col: col,
                max_row: row,
                max_col: col,
            },
        }
    }

    fn add(&mut self, row: usize, col: usize, diff: f64) {
        self.count += 1;
        self.sum_row += row as f64;
        self.sum_col += col as f64;
        if diff.is_finite() {
            let abs = diff.abs();
            self.sum_abs += abs;
            self.max_abs = self.max_abs.max(abs);
            self.finite += 1;
        }
        let b = &mut self.bounds;
        b.min_row = b.min_row.min(row);
        b.min_col = b.min_col.min(col);
        b.max_row = b.max_row.max(row);
        b.max_col = b.max_col.max(col);
    }
}

/// Ground area of one pixel of a grid
#[derive(Debug, Clone, Copy)]
enum PixelArea {
    Planar(f64),
    /// Degrees² per pixel, converted at each cluster's latitude
    Geographic(f64),
}

impl PixelArea {
    fn of(raster: &Raster<u8>) -> Self {
        let area = raster.transform().pixel_area();
        if raster.crs().is_some_and(|crs| crs.is_geographic()) {
            warn!("clusters on a geographic grid, area is approximated at each centroid latitude");
            PixelArea::Geographic(area)
        } else {
            PixelArea::Planar(area)
        }
    }

    fn square_metres(self, pixels: f64, latitude: f64) -> f64 {
        match self {
            PixelArea::Planar(area) => pixels * area,
            PixelArea::Geographic(area) => {
                pixels * area * METRES_PER_DEGREE * METRES_PER_DEGREE * latitude.to_radians().cos().abs()
            }
        }
    }
}

/// Extract anomaly clusters with their geometry and intensity attributes.
///
/// `difference` must be on the anomaly grid, otherwise
/// [`Error::GridMismatch`]. Intensities are taken from `|difference|` over
/// the cluster's pixels; a non-finite difference under an anomaly pixel
/// counts toward the area but not the intensity. An empty anomaly grid
/// yields no clusters.
///
/// On EPSG:4326 grids the area is converted from degrees² with
/// [`METRES_PER_DEGREE`] and the cosine of the centroid latitude.
pub fn extract_clusters(
    anomalies: &Raster<u8>,
    difference: &Raster<f64>,
    params: &ClusterParams,
) -> Result<Vec<AnomalyCluster>> {
    if let Some(reason) = anomalies.signature().mismatch(&difference.signature()) {
        return Err(Error::GridMismatch {
            reason: format!("anomaly grid vs difference grid: {reason}"),
        });
    }

    let (rows, cols) = anomalies.shape();
    debug!(rows, cols, connectivity = ?params.connectivity, tile = %params.source_tile, "labeling anomaly clusters");

    let (labels, count) = label_arena(anomalies, params.connectivity)?;
    if count == 0 {
        return Ok(Vec::new());
    }

    let diff = difference.view();
    let mut acc: Vec<Option<Accumulator>> = vec![None; count];
    for row in 0..rows {
        for col in 0..cols {
            let label = labels[row * cols + col];
            if label == 0 {
                continue;
            }
            acc[label as usize - 1]
                .get_or_insert_with(|| Accumulator::new(row, col))
                .add(row, col, diff[(row, col)]);
        }
    }

    let transform = anomalies.transform();
    let pixel_area = PixelArea::of(anomalies);

    let clusters: Vec<AnomalyCluster> = acc
        .into_iter()
        .flatten()
        .zip(1u32..)
        .map(|(a, label)| {
            let n = a.count as f64;
            let centroid = transform.apply(a.sum_col / n + 0.5, a.sum_row / n + 0.5);
            let b = a.bounds;
            let (min_x, min_y, max_x, max_y) = transform.window_bounds(b.min_col, b.min_row, b.max_col + 1, b.max_row + 1);
            AnomalyCluster {
                label,
                source_tile: params.source_tile.clone(),
                pixel_count: a.count,
                area_m2: pixel_area.square_metres(n, centroid.1),
                centroid,
                mean_abs_diff: if a.finite == 0 { 0.0 } else { a.sum_abs / a.finite as f64 },
                max_abs_diff: a.max_abs,
                pixel_bounds: b,
                geo_bounds: GeoBounds {
                    min_x,
                    min_y,
                    max_x,
                    max_y,
                },
            }
        })
        .collect();

    info!(clusters = clusters.len(), tile = %params.source_tile, "extracted anomaly clusters");
    Ok(clusters)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use aquaspot_core::{GeoTransform, CRS};

    fn grid<T: aquaspot_core::RasterElement>(rows: usize, cols: usize, value: T) -> Raster<T> {
        Raster::filled(rows, cols, value)
            .with_transform(GeoTransform::new(600_000.0, 4_100_000.0, 10.0, -10.0))
            .with_crs(CRS::from_epsg(32630))
    }

    fn anomalies_from(pattern: &[&str]) -> Raster<u8> {
        let rows = pattern.len();
        let cols = pattern[0].len();
        let mut raster = grid(rows, cols, 0u8);
        for (r, line) in pattern.iter().enumerate() {
            for (c, ch) in line.chars().enumerate() {
                if ch == '#' {
                    raster.set(r, c, 1).unwrap();
                }
            }
        }
        raster
    }

    #[test]
    fn test_diagonal_pixels_join_under_queen_only() {
        let anomalies = anomalies_from(&["#..", ".#.", "..#"]);

        let (labels, queen) = label_components(&anomalies, Neighborhood::Queen3x3).unwrap();
        assert_eq!(queen, 1);
        assert_eq!(labels.get(2, 2).unwrap(), 1);
        assert_eq!(labels.get(0, 1).unwrap(), 0);

        let (_, rook) = label_components(&anomalies, Neighborhood::Rook3x3).unwrap();
        assert_eq!(rook, 3);
    }

    #[test]
    fn test_labels_follow_row_major_discovery() {
        let anomalies = anomalies_from(&["..#", "#..", "#.#"]);
        let (labels, count) = label_components(&anomalies, Neighborhood::Rook3x3).unwrap();
        assert_eq!(count, 3);
        assert_eq!(labels.get(0, 2).unwrap(), 1);
        assert_eq!(labels.get(1, 0).unwrap(), 2);
        assert_eq!(labels.get(2, 0).unwrap(), 2);
        assert_eq!(labels.get(2, 2).unwrap(), 3);
        assert_eq!(labels.signature(), anomalies.signature());
    }

    #[test]
    fn test_square_cluster_attributes() {
        let mut anomalies = grid(10, 10, 0u8);
        let mut difference = grid(10, 10, 0.0);
        for row in 3..6 {
            for col in 3..6 {
                anomalies.set(row, col, 1).unwrap();
                difference.set(row, col, 1.0).unwrap();
            }
        }

        let clusters = ClusterExtractor.execute_default((anomalies, difference)).unwrap();
        assert_eq!(clusters.len(), 1);
        let c = &clusters[0];
        assert_eq!(c.pixel_count, 9);
        assert_relative_eq!(c.area_m2, 900.0);
        assert_relative_eq!(c.mean_abs_diff, 1.0);
        assert_relative_eq!(c.max_abs_diff, 1.0);
        // Center of pixel (4, 4)
        assert_relative_eq!(c.centroid.0, 600_045.0);
        assert_relative_eq!(c.centroid.1, 4_099_955.0);
        assert_eq!(
            c.pixel_bounds,
            PixelBounds {
                min_row: 3,
                min_col: 3,
                max_row: 5,
                max_col: 5
            }
        );
        assert_relative_eq!(c.geo_bounds.min_x, 600_030.0);
        assert_relative_eq!(c.geo_bounds.max_x, 600_060.0);
        assert_relative_eq!(c.geo_bounds.min_y, 4_099_940.0);
        assert_relative_eq!(c.geo_bounds.max_y, 4_099_970.0);
    }

    #[test]
    fn test_area_uses_pixel_geometry() {
        let gt = GeoTransform::new(0.0, 0.0, 5.0, -20.0);
        let anomalies = grid(4, 4, 1u8).with_transform(gt);
        let difference = grid(4, 4, -0.5).with_transform(gt);

        let clusters = extract_clusters(&anomalies, &difference, &ClusterParams::default()).unwrap();
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].area_m2, 16.0 * 5.0 * 20.0);
        assert_relative_eq!(clusters[0].mean_abs_diff, 0.5);
    }

    #[test]
    fn test_geographic_area_in_square_metres() {
        // ~10 m pixels at the equator and at 60°N
        let deg = 10.0 / METRES_PER_DEGREE;
        let block = |origin_lat: f64| {
            let gt = GeoTransform::new(15.0, origin_lat, deg, -deg);
            let mut anomalies = grid(10, 10, 0u8).with_transform(gt).with_crs(CRS::wgs84());
            let mut difference = grid(10, 10, 0.0).with_transform(gt).with_crs(CRS::wgs84());
            for row in 3..6 {
                for col in 3..6 {
                    anomalies.set(row, col, 1).unwrap();
                    difference.set(row, col, 1.0).unwrap();
                }
            }
            extract_clusters(&anomalies, &difference, &ClusterParams::default()).unwrap()
        };

        let equator = block(0.0);
        assert_eq!(equator.len(), 1);
        assert_relative_eq!(equator[0].area_m2, 900.0, max_relative = 1e-6);

        let north = block(60.0);
        assert_relative_eq!(north[0].area_m2, 450.0, max_relative = 1e-3);
    }

    #[test]
    fn test_intensity_per_cluster() {
        let anomalies = anomalies_from(&["##...", ".....", "...##"]);
        let mut difference = grid(3, 5, 0.0);
        difference.set(0, 0, 0.3).unwrap();
        difference.set(0, 1, -0.5).unwrap();
        difference.set(2, 3, 0.9).unwrap();
        difference.set(2, 4, f64::NAN).unwrap();

        let params = ClusterParams {
            source_tile: "T30SVG".into(),
            ..Default::default()
        };
        let clusters = extract_clusters(&anomalies, &difference, &params).unwrap();
        assert_eq!(clusters.len(), 2);

        assert_eq!(clusters[0].label, 1);
        assert_relative_eq!(clusters[0].mean_abs_diff, 0.4, epsilon = 1e-12);
        assert_relative_eq!(clusters[0].max_abs_diff, 0.5);

        assert_eq!(clusters[1].pixel_count, 2);
        assert_relative_eq!(clusters[1].mean_abs_diff, 0.9);
        assert!(clusters.iter().all(|c| c.source_tile == "T30SVG"));
    }

    #[test]
    fn test_empty_grid_yields_no_clusters() {
        let clusters = extract_clusters(&grid(6, 6, 0u8), &grid(6, 6, 0.0), &ClusterParams::default()).unwrap();
        assert!(clusters.is_empty());
    }

    #[test]
    fn test_grid_mismatch() {
        let result = extract_clusters(&grid(6, 6, 0u8), &grid(6, 5, 0.0), &ClusterParams::default());
        assert!(matches!(result, Err(Error::GridMismatch { .. })));
    }
}
