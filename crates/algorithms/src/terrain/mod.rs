//! Terrain analysis algorithms
//!
//! First-order surface derivatives from Digital Elevation Models:
//! - Slope: steepest gradient angle (Horn 1981)
//! - Aspect: downslope direction of the gradient
//! - Slope/aspect: both from a single window pass

mod aspect;
mod slope;
mod slope_aspect;

pub use aspect::{aspect, Aspect, AspectConvention, AspectParams, AspectUnits};
pub use slope::{slope, Slope, SlopeParams, SlopeUnits};
pub use slope_aspect::{slope_aspect, SlopeAspect, SlopeAspectOutput, SlopeAspectParams};

use crate::maybe_rayon::*;
use soilflux_core::raster::{EdgeMode, Raster, Window3x3};
use soilflux_core::{Error, Result};
use std::f64::consts::{FRAC_PI_2, TAU};

/// Gradients below this magnitude are treated as flat.
const FLAT_GRADIENT: f64 = 1e-12;

/// Horn gradient `(dz/dx east, dz/dy north)` of every cell in row-major
/// order, `None` where the window could not be gathered.
pub(crate) fn gradient_field(
    dem: &Raster<f64>,
    z_factor: f64,
    edge: EdgeMode,
) -> Result<Vec<Option<(f64, f64)>>> {
    let (rows, cols) = dem.shape();
    let cell_size = dem.square_cell_size()?;
    if !z_factor.is_finite() || z_factor <= 0.0 {
        return Err(Error::invalid_parameter("z_factor", z_factor, "must be positive"));
    }

    let field = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            (0..cols)
                .map(|col| {
                    Window3x3::gather(dem, row, col, edge).map(|w| {
                        let (dx, dy) = w.horn_gradient(cell_size);
                        (dx * z_factor, dy * z_factor)
                    })
                })
                .collect::<Vec<_>>()
        })
        .collect();
    Ok(field)
}

/// Slope angle in radians from a gradient
#[inline]
pub(crate) fn slope_radians(dx: f64, dy: f64) -> f64 {
    (dx * dx + dy * dy).sqrt().atan()
}

#[inline]
pub(crate) fn is_flat(dx: f64, dy: f64) -> bool {
    dx.abs() < FLAT_GRADIENT && dy.abs() < FLAT_GRADIENT
}

/// Downslope direction in `[0, 2π)`, counter-clockwise from east.
/// Flat cells get 0.
#[inline]
pub(crate) fn aspect_radians(dx: f64, dy: f64) -> f64 {
    if is_flat(dx, dy) {
        return 0.0;
    }
    normalize_angle((-dy).atan2(-dx))
}

/// Wrap an angle into `[0, 2π)`
#[inline]
pub(crate) fn normalize_angle(angle: f64) -> f64 {
    let a = angle.rem_euclid(TAU);
    if a >= TAU {
        0.0
    } else {
        a
    }
}

/// Counter-clockwise-from-east angle to a compass bearing (clockwise from north)
#[inline]
pub(crate) fn to_bearing(angle: f64) -> f64 {
    normalize_angle(FRAC_PI_2 - angle)
}
