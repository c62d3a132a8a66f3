//! Error types for SoilFlux

use thiserror::Error;

/// Main error type for SoilFlux operations.
///
/// Every variant is fatal for the computation that raised it: the pipeline
/// aborts and nothing is written. No-data cells are not errors.
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    /// Two grids taking part in one computation disagree on their region.
    #[error("Grid mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    /// A model equation received a value outside its valid domain.
    #[error("Domain error: {quantity} = {value} at ({row}, {col})")]
    Domain {
        quantity: &'static str,
        value: f64,
        row: usize,
        col: usize,
    },

    /// The flow-direction graph is not a DAG over descending elevation.
    #[error("Flow graph cycle detected at ({row}, {col})")]
    Cycle { row: usize, col: usize },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid_parameter(
        name: &'static str,
        value: impl ToString,
        reason: impl Into<String>,
    ) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for SoilFlux operations
pub type Result<T> = std::result::Result<T, Error>;
