//! Event-based rainfall erosivity
//!
//! Derives the R factor of a single storm from its intensity and duration
//! (Brown & Foster 1987 unit energy):
//!
//! ```text
//! e  = 0.29 · (1 − 0.72 · exp(−0.05 · i))     MJ·ha⁻¹·mm⁻¹
//! V  = i · d / 60                             mm
//! EI = e · V · i                              MJ·mm·ha⁻¹·h⁻¹
//! R  = EI / (d / 525600)                      MJ·mm·ha⁻¹·h⁻¹·yr⁻¹
//! ```
//!
//! with `i` the rainfall intensity in mm/h and `d` the duration in minutes.

use super::{par_cells, FactorInput};
use soilflux_core::raster::Raster;
use soilflux_core::{Error, Result};

const MINUTES_PER_YEAR: f64 = 525_600.0;

/// Where the pipeline takes the R factor from
#[derive(Debug, Clone)]
pub enum RFactorSource {
    /// A known erosivity, constant or per cell
    Input(FactorInput),
    /// A single storm event
    Event {
        /// Rainfall intensity (mm/h), constant or per cell
        intensity: FactorInput,
        /// Storm duration (minutes)
        duration: f64,
    },
}

impl Default for RFactorSource {
    fn default() -> Self {
        RFactorSource::Input(FactorInput::Constant(super::DEFAULT_R_FACTOR))
    }
}

impl RFactorSource {
    /// Resolve to an erosivity factor on the DEM lattice
    pub fn resolve(&self, dem: &Raster<f64>) -> Result<FactorInput> {
        match self {
            RFactorSource::Input(input) => {
                input.ensure_same_grid(dem)?;
                Ok(input.clone())
            }
            RFactorSource::Event {
                intensity: FactorInput::Constant(i),
                duration,
            } => event_r_factor(*i, *duration).map(FactorInput::Constant),
            RFactorSource::Event {
                intensity: FactorInput::Raster(i),
                duration,
            } => {
                dem.ensure_same_grid(i)?;
                event_r_factor_raster(i, *duration).map(FactorInput::Raster)
            }
        }
    }
}

fn erosivity(intensity: f64, duration: f64) -> f64 {
    let energy = 0.29 * (1.0 - 0.72 * (-0.05 * intensity).exp());
    let volume = intensity * duration / 60.0;
    let ei = energy * volume * intensity;
    ei / (duration / MINUTES_PER_YEAR)
}

#[inline]
fn valid_intensity(intensity: f64) -> bool {
    intensity.is_finite() && intensity >= 0.0
}

fn check_duration(duration: f64) -> Result<()> {
    if !duration.is_finite() || duration <= 0.0 {
        return Err(Error::invalid_parameter(
            "rain_duration",
            duration,
            "must be a positive number of minutes",
        ));
    }
    Ok(())
}

/// R factor of one storm with uniform intensity (mm/h) lasting `duration`
/// minutes
pub fn event_r_factor(intensity: f64, duration: f64) -> Result<f64> {
    check_duration(duration)?;
    if !valid_intensity(intensity) {
        return Err(Error::invalid_parameter(
            "rain_intensity",
            intensity,
            "must be a non-negative rate in mm/h",
        ));
    }
    Ok(erosivity(intensity, duration))
}

/// Per-cell R factor from a rainfall intensity raster (mm/h)
pub fn event_r_factor_raster(intensity: &Raster<f64>, duration: f64) -> Result<Raster<f64>> {
    check_duration(duration)?;
    let (rows, cols) = intensity.shape();
    let data = par_cells(rows, cols, |row, col| {
        let i = unsafe { intensity.get_unchecked(row, col) };
        if intensity.is_nodata(i) {
            return Ok(f64::NAN);
        }
        if !valid_intensity(i) {
            return Err(Error::Domain {
                quantity: "rain_intensity",
                value: i,
                row,
                col,
            });
        }
        Ok(erosivity(i, duration))
    })?;
    intensity.derive(data, Some(f64::NAN))
}
