//! Aspect calculation from DEMs
//!
//! Calculates the downslope direction of the gradient using the Horn (1981)
//! method.

use serde::{Deserialize, Serialize};

use super::{aspect_radians, gradient_field, is_flat, to_bearing};
use soilflux_core::raster::{EdgeMode, Raster};
use soilflux_core::{Algorithm, Error, Result};

/// Reference direction and sense of rotation for aspect
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectConvention {
    /// 0 = east, increasing counter-clockwise (north = π/2)
    #[default]
    EastCounterClockwise,
    /// Compass bearing: 0 = north, increasing clockwise (east = π/2)
    NorthClockwise,
}

/// Angle units for aspect output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AspectUnits {
    /// Radians (0-2π)
    #[default]
    Radians,
    /// Degrees (0-360)
    Degrees,
}

/// Parameters for aspect calculation
#[derive(Debug, Clone, Default)]
pub struct AspectParams {
    pub convention: AspectConvention,
    pub units: AspectUnits,
    pub edge: EdgeMode,
}

/// Aspect algorithm
#[derive(Debug, Clone, Default)]
pub struct Aspect;

impl Algorithm for Aspect {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = AspectParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Aspect"
    }

    fn description(&self) -> &'static str {
        "Calculate aspect (direction of steepest descent) from a DEM"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        aspect(&input, params)
    }
}

/// Calculate aspect from a DEM
///
/// With the default convention aspect is measured counter-clockwise from
/// east and points downslope:
/// - 0 = East
/// - π/2 = North
/// - π = West
/// - 3π/2 = South
///
/// Flat cells get 0, which is a valid value and not no-data. Cells whose
/// window cannot be gathered under `params.edge` are NaN.
pub fn aspect(dem: &Raster<f64>, params: AspectParams) -> Result<Raster<f64>> {
    let field = gradient_field(dem, 1.0, params.edge)?;
    let data: Vec<f64> = field
        .into_iter()
        .map(|g| {
            let Some((dx, dy)) = g else {
                return f64::NAN;
            };
            let angle = match params.convention {
                AspectConvention::EastCounterClockwise => aspect_radians(dx, dy),
                AspectConvention::NorthClockwise if is_flat(dx, dy) => 0.0,
                AspectConvention::NorthClockwise => to_bearing(aspect_radians(dx, dy)),
            };
            match params.units {
                AspectUnits::Radians => angle,
                AspectUnits::Degrees => angle.to_degrees(),
            }
        })
        .collect();

    dem.derive(data, Some(f64::NAN))
}
