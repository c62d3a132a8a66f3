//! # SoilFlux Algorithms
//!
//! Raster algorithms behind the SoilFlux erosion models.
//!
//! ## Algorithm Categories
//!
//! - **hydrology**: D8 flow direction, flow accumulation, depression filling
//! - **terrain**: Slope and aspect (Horn 1981)
//! - **erosion**: RUSLE3D soil loss and USPED net erosion/deposition
//!
//! Per-cell stages run row-parallel with rayon when the `parallel` feature
//! is enabled (the default) and sequentially otherwise.

pub mod erosion;
pub mod hydrology;
mod maybe_rayon;
pub mod terrain;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::erosion::{
        ErosionConfig, ErosionFactors, ErosionInputs, ErosionModel, ErosionOutputs,
        ErosionPipeline, ErosionResult, FactorInput, ModelKind, OutputUnits, RFactorSource,
        TopographicParams,
    };
    pub use crate::hydrology::{
        fill_depressions, flow_accumulation, flow_direction, DepressionHandling,
        FlowAccumulationParams, FlowWeighting,
    };
    pub use crate::terrain::{
        aspect, slope, slope_aspect, AspectParams, SlopeAspectParams, SlopeParams, SlopeUnits,
    };
    pub use soilflux_core::prelude::*;
}
