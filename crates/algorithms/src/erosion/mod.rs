//! Soil erosion and deposition models
//!
//! Two models share the same hydrology and terrain stages:
//! - RUSLE3D: soil loss `R·K·LS·C` with a 3D topographic LS factor
//!   (Mitasova et al. 1996)
//! - USPED: sediment transport capacity and its divergence, giving net
//!   erosion and deposition (Mitasova et al. 1996, Mitas & Mitasova 1998)
//!
//! The model is chosen once, when an [`ErosionPipeline`] is built from an
//! [`ErosionConfig`].

mod config;
mod factors;
mod pipeline;
mod rfactor;
mod synthesis;

pub use config::{ErosionConfig, ModelKind};
pub use factors::{
    ls_factor, sediment_flux, ErosionFactors, FactorInput, SedimentFlux, SoilFactors,
};
pub use pipeline::{Erosion, ErosionInputs, ErosionOutputs, ErosionPipeline};
pub use rfactor::{event_r_factor, event_r_factor_raster, RFactorSource};
pub use synthesis::{
    classify, flux_divergence, soil_loss, split_net_change, ChangeClass, ErosionResult,
    OutputUnits,
};

use serde::{Deserialize, Serialize};

use crate::maybe_rayon::*;
use soilflux_core::{Error, Result};

/// Default rainfall erosivity R (MJ·mm·ha⁻¹·h⁻¹·yr⁻¹)
pub const DEFAULT_R_FACTOR: f64 = 310.0;
/// Default soil erodibility K (t·ha·h·ha⁻¹·MJ⁻¹·mm⁻¹)
pub const DEFAULT_K_FACTOR: f64 = 0.25;
/// Default cover management C (dimensionless)
pub const DEFAULT_C_FACTOR: f64 = 0.1;

/// Exponents of the topographic term `A_s^m · sin(slope)^n`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TopographicParams {
    /// Upslope area exponent
    pub m: f64,
    /// Slope exponent
    pub n: f64,
}

impl TopographicParams {
    /// Sheet and rill erosion with prevailing rill flow
    pub const RUSLE3D: Self = Self { m: 0.4, n: 1.3 };
    /// Transport-capacity limited erosion
    pub const USPED: Self = Self { m: 1.6, n: 1.3 };

    /// Both exponents must be finite and positive
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [("m", self.m), ("n", self.n)] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::invalid_parameter(
                    name,
                    value,
                    "exponent must be finite and positive",
                ));
            }
        }
        Ok(())
    }
}

/// Erosion model with its topographic exponents
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ErosionModel {
    Rusle3d(TopographicParams),
    Usped(TopographicParams),
}

impl ErosionModel {
    pub fn rusle3d() -> Self {
        ErosionModel::Rusle3d(TopographicParams::RUSLE3D)
    }

    pub fn usped() -> Self {
        ErosionModel::Usped(TopographicParams::USPED)
    }

    pub fn topographic(&self) -> TopographicParams {
        match *self {
            ErosionModel::Rusle3d(p) | ErosionModel::Usped(p) => p,
        }
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            ErosionModel::Rusle3d(_) => ModelKind::Rusle3d,
            ErosionModel::Usped(_) => ModelKind::Usped,
        }
    }

    /// Whether the model produces deposition and net change layers
    pub fn has_deposition(&self) -> bool {
        matches!(self, ErosionModel::Usped(_))
    }
}

/// Evaluate `f` for every cell, row-parallel, in row-major order.
/// The first error aborts the pass.
pub(crate) fn par_cells<T, F>(rows: usize, cols: usize, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, usize) -> Result<T> + Sync + Send,
{
    let per_row: Vec<Vec<T>> = (0..rows)
        .into_par_iter()
        .map(|row| (0..cols).map(|col| f(row, col)).collect::<Result<Vec<T>>>())
        .collect::<Result<Vec<_>>>()?;
    Ok(per_row.into_iter().flatten().collect())
}

/// Fail with [`Error::Domain`] unless `value` is non-negative
#[inline]
pub(crate) fn non_negative(quantity: &'static str, value: f64, row: usize, col: usize) -> Result<f64> {
    if value < 0.0 {
        return Err(Error::Domain { quantity, value, row, col });
    }
    Ok(value)
}

/// Fail with [`Error::Domain`] unless `value` is finite
#[inline]
pub(crate) fn finite(quantity: &'static str, value: f64, row: usize, col: usize) -> Result<f64> {
    if !value.is_finite() {
        return Err(Error::Domain { quantity, value, row, col });
    }
    Ok(value)
}
