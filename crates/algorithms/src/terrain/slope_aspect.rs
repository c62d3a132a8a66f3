//! Slope and aspect from one pass over the DEM
//!
//! The erosion models need both in radians on the same cells; computing them
//! together gathers each 3x3 window once.

use tracing::debug;

use super::{aspect_radians, gradient_field, slope_radians};
use soilflux_core::raster::{EdgeMode, Raster};
use soilflux_core::{Algorithm, Error, Result};

/// Parameters for the combined slope/aspect pass
#[derive(Debug, Clone)]
pub struct SlopeAspectParams {
    pub z_factor: f64,
    pub edge: EdgeMode,
}

impl Default for SlopeAspectParams {
    fn default() -> Self {
        Self {
            z_factor: 1.0,
            edge: EdgeMode::default(),
        }
    }
}

/// Slope (radians) and aspect (radians, counter-clockwise from east,
/// downslope) on the DEM lattice
#[derive(Debug, Clone)]
pub struct SlopeAspectOutput {
    pub slope: Raster<f64>,
    pub aspect: Raster<f64>,
}

/// Combined slope/aspect algorithm
#[derive(Debug, Clone, Default)]
pub struct SlopeAspect;

impl Algorithm for SlopeAspect {
    type Input = Raster<f64>;
    type Output = SlopeAspectOutput;
    type Params = SlopeAspectParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope/Aspect"
    }

    fn description(&self) -> &'static str {
        "Slope and downslope aspect in radians from a single Horn window pass"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope_aspect(&input, params)
    }
}

/// Compute slope and aspect in radians.
///
/// Both rasters are NaN exactly where the window could not be gathered, so
/// no-data always lines up between them.
pub fn slope_aspect(dem: &Raster<f64>, params: SlopeAspectParams) -> Result<SlopeAspectOutput> {
    let field = gradient_field(dem, params.z_factor, params.edge)?;

    let (slope, aspect): (Vec<f64>, Vec<f64>) = field
        .into_iter()
        .map(|g| match g {
            Some((dx, dy)) => (slope_radians(dx, dy), aspect_radians(dx, dy)),
            None => (f64::NAN, f64::NAN),
        })
        .unzip();

    let output = SlopeAspectOutput {
        slope: dem.derive(slope, Some(f64::NAN))?,
        aspect: dem.derive(aspect, Some(f64::NAN))?,
    };
    debug!(
        valid = output.slope.valid_count(),
        edge = ?params.edge,
        "slope/aspect computed"
    );
    Ok(output)
}
