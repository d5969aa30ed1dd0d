//! # AquaSpot Core
//!
//! Core types for the AquaSpot pipeline leak detection engine.
//!
//! This crate provides:
//! - `Raster<T>`: Generic georeferenced grid
//! - `GeoTransform`: Affine transformation for georeferencing
//! - `CRS`: Coordinate Reference System handling and reprojection
//! - `PipelineGeometry`: the monitored corridor centerline
//! - Grid alignment checks shared by every component

pub mod crs;
pub mod error;
pub mod raster;
pub mod vector;

pub use crs::CRS;
pub use error::{Error, Result};
pub use raster::{GeoTransform, GridSignature, Raster, RasterElement};
pub use vector::{PipelineFeature, PipelineGeometry};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::raster::{GeoTransform, GridSignature, Raster, RasterElement};
    pub use crate::vector::{PipelineFeature, PipelineGeometry};
    pub use crate::Algorithm;
}

/// Core trait for the stages of the detection engine.
///
/// Stages are pure functions that transform input data according to parameters.
pub trait Algorithm {
    /// Input type for the stage
    type Input;
    /// Output type for the stage
    type Output;
    /// Parameters controlling stage behavior
    type Params: Default;
    /// Error type for stage execution
    type Error: std::error::Error;

    /// Returns the stage name
    fn name(&self) -> &'static str;

    /// Returns a description of what the stage does
    fn description(&self) -> &'static str;

    /// Execute the stage
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
