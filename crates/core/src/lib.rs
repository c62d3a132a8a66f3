//! # SoilFlux Core
//!
//! Core types, traits and I/O for the SoilFlux erosion modelling tools.
//!
//! This crate provides:
//! - `Raster<T>`: georeferenced grid with an explicit no-data sentinel
//! - `Region`: the spatial reference every grid in a computation must share
//! - `Window3x3` and the D8 encoding used by terrain and hydrology stages
//! - The `Algorithm` trait implemented by every pipeline stage
//! - Native GeoTIFF reading and writing

pub mod error;
pub mod io;
pub mod raster;

pub use error::{Error, Result};
pub use raster::{EdgeMode, GeoTransform, Raster, RasterElement, Region};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::error::{Error, Result};
    pub use crate::raster::{d8, EdgeMode, GeoTransform, Raster, RasterElement, Region, Window3x3};
    pub use crate::Algorithm;
}

/// Core trait for all algorithms in SoilFlux.
///
/// Algorithms are pure functions: they read their input grids and return
/// new ones according to parameters.
pub trait Algorithm {
    /// Input type for the algorithm
    type Input;
    /// Output type for the algorithm
    type Output;
    /// Parameters controlling algorithm behavior
    type Params: Default;
    /// Error type for algorithm execution
    type Error: std::error::Error;

    /// Returns the algorithm name
    fn name(&self) -> &'static str;

    /// Returns a description of what the algorithm does
    fn description(&self) -> &'static str;

    /// Execute the algorithm
    fn execute(&self, input: Self::Input, params: Self::Params) -> std::result::Result<Self::Output, Self::Error>;

    /// Execute with default parameters
    fn execute_default(&self, input: Self::Input) -> std::result::Result<Self::Output, Self::Error> {
        self.execute(input, Self::Params::default())
    }
}
