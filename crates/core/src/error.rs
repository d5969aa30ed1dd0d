//! Error types for AquaSpot

use thiserror::Error;

/// Main error type for AquaSpot operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// The two spectral bands of one epoch are not on the same grid
    #[error("Band shape mismatch: {reason}")]
    BandShapeMismatch { reason: String },

    /// Index grids and corridor mask are not on the same grid
    #[error("Grid mismatch: {reason}")]
    GridMismatch { reason: String },

    #[error("No coordinate transform from {from} to {to}")]
    Reprojection { from: String, to: String },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

/// Result type alias for AquaSpot operations
pub type Result<T> = std::result::Result<T, Error>;
