//! Buffer zones around pipeline centerlines
//!
//! The buffer of a polyline at distance `d` is the union of one capsule per
//! segment (the segment swept by a disk of radius `d`). Membership is tested
//! exactly on the capsules; polygon approximations are produced only for
//! drawing the corridor.

use geo::{Coord, LineString, Polygon};
use std::f64::consts::PI;

/// Parameters for polygonal buffer approximations
#[derive(Debug, Clone)]
pub struct BufferParams {
    /// Buffer distance in CRS units
    pub distance: f64,
    /// Number of segments per half circle of each rounded end (default: 8)
    pub segments: usize,
}

impl Default for BufferParams {
    fn default() -> Self {
        Self {
            distance: 1.0,
            segments: 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Segment {
    start: Coord<f64>,
    end: Coord<f64>,
}

impl Segment {
    fn distance_squared(&self, p: Coord<f64>) -> f64 {
        let dx = self.end.x - self.start.x;
        let dy = self.end.y - self.start.y;
        let len2 = dx * dx + dy * dy;

        let t = if len2 == 0.0 {
            0.0
        } else {
            (((p.x - self.start.x) * dx + (p.y - self.start.y) * dy) / len2).clamp(0.0, 1.0)
        };

        let cx = self.start.x + t * dx - p.x;
        let cy = self.start.y + t * dy - p.y;
        cx * cx + cy * cy
    }

    fn bounds(&self, pad: f64) -> (f64, f64, f64, f64) {
        (
            self.start.x.min(self.end.x) - pad,
            self.start.y.min(self.end.y) - pad,
            self.start.x.max(self.end.x) + pad,
            self.start.y.max(self.end.y) + pad,
        )
    }
}

/// Planar buffer around a set of polylines
#[derive(Debug, Clone)]
pub struct CorridorBuffer {
    segments: Vec<Segment>,
    distance: f64,
}

impl CorridorBuffer {
    /// Buffer every segment of `lines` by `distance`.
    ///
    /// A polyline with a single vertex buffers to a disk; empty polylines
    /// contribute nothing.
    pub fn new<'a>(lines: impl IntoIterator<Item = &'a LineString<f64>>, distance: f64) -> Self {
        let mut segments = Vec::new();
        for ls in lines {
            match ls.0.as_slice() {
                [] => {}
                [only] => segments.push(Segment {
                    start: *only,
                    end: *only,
                }),
                coords => segments.extend(coords.windows(2).map(|w| Segment {
                    start: w[0],
                    end: w[1],
                })),
            }
        }
        Self { segments, distance }
    }

    pub fn distance(&self) -> f64 {
        self.distance
    }

    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Whether `(x, y)` lies inside the buffer (boundary included)
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let p = Coord { x, y };
        let d2 = self.distance * self.distance;
        self.segments.iter().any(|s| s.distance_squared(p) <= d2)
    }

    /// Envelope (min_x, min_y, max_x, max_y) of the whole buffer
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.segments
            .iter()
            .map(|s| s.bounds(self.distance))
            .reduce(|a, b| (a.0.min(b.0), a.1.min(b.1), a.2.max(b.2), a.3.max(b.3)))
    }

    /// Envelopes of the individual capsules, with a test for membership in each
    pub(crate) fn capsules(&self) -> impl Iterator<Item = ((f64, f64, f64, f64), Capsule<'_>)> + '_ {
        let d2 = self.distance * self.distance;
        self.segments
            .iter()
            .map(move |s| (s.bounds(self.distance), Capsule { segment: s, d2 }))
    }

    /// Polygon approximation of every capsule, for drawing the corridor
    pub fn to_polygons(&self, segments: usize) -> Vec<Polygon<f64>> {
        let params = BufferParams {
            distance: self.distance,
            segments,
        };
        self.segments
            .iter()
            .map(|s| buffer_segment(s.start, s.end, &params))
            .collect()
    }
}

pub(crate) struct Capsule<'a> {
    segment: &'a Segment,
    d2: f64,
}

impl Capsule<'_> {
    pub(crate) fn contains(&self, x: f64, y: f64) -> bool {
        self.segment.distance_squared(Coord { x, y }) <= self.d2
    }
}

/// Create a capsule polygon around the segment `start`-`end`.
///
/// Degenerate segments produce a circle of `2 * segments` vertices.
pub fn buffer_segment(start: Coord<f64>, end: Coord<f64>, params: &BufferParams) -> Polygon<f64> {
    let n = params.segments.max(2);
    let r = params.distance.abs();
    let heading = (end.y - start.y).atan2(end.x - start.x);

    let mut coords = Vec::with_capacity(2 * (n + 1) + 1);
    // Half circle around `end`, from the right side of travel to the left
    for i in 0..=n {
        let angle = heading - PI / 2.0 + PI * i as f64 / n as f64;
        coords.push((end.x + r * angle.cos(), end.y + r * angle.sin()));
    }
    // Half circle around `start`, back to the right side
    for i in 0..=n {
        let angle = heading + PI / 2.0 + PI * i as f64 / n as f64;
        coords.push((start.x + r * angle.cos(), start.y + r * angle.sin()));
    }
    coords.push(coords[0]);

    Polygon::new(LineString::from(coords), vec![])
}
