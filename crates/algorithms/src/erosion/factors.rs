//! Topographic factors of the erosion models
//!
//! RUSLE3D reduces terrain to a dimensionless LS factor. USPED turns it into
//! a sediment transport capacity vector field whose divergence is evaluated
//! later by the synthesis stage.

use tracing::debug;

use super::{finite, non_negative, par_cells, OutputUnits, TopographicParams};
use super::{DEFAULT_C_FACTOR, DEFAULT_K_FACTOR, DEFAULT_R_FACTOR};
use crate::hydrology::FlowWeighting;
use crate::terrain::SlopeAspectOutput;
use soilflux_core::raster::Raster;
use soilflux_core::Result;

/// Standard USLE plot length (m)
const UNIT_PLOT_LENGTH: f64 = 22.13;
/// sin of the standard USLE plot slope (9 %)
const UNIT_PLOT_SLOPE_SIN: f64 = 0.0896;

/// A model factor given as one value for the whole grid or per cell
#[derive(Debug, Clone)]
pub enum FactorInput {
    Constant(f64),
    Raster(Raster<f64>),
}

impl FactorInput {
    /// Value at (row, col); `None` for no-data
    #[inline]
    pub fn at(&self, row: usize, col: usize) -> Option<f64> {
        match self {
            FactorInput::Constant(v) => (!v.is_nan()).then_some(*v),
            FactorInput::Raster(r) => {
                let v = unsafe { r.get_unchecked(row, col) };
                (!r.is_nodata(v)).then_some(v)
            }
        }
    }

    /// Rasters must share the DEM lattice; constants always fit
    pub fn ensure_same_grid(&self, dem: &Raster<f64>) -> Result<()> {
        match self {
            FactorInput::Constant(_) => Ok(()),
            FactorInput::Raster(r) => dem.ensure_same_grid(r),
        }
    }
}

impl From<f64> for FactorInput {
    fn from(value: f64) -> Self {
        FactorInput::Constant(value)
    }
}

impl From<Raster<f64>> for FactorInput {
    fn from(raster: Raster<f64>) -> Self {
        FactorInput::Raster(raster)
    }
}

/// Rainfall erosivity (R), soil erodibility (K) and cover management (C)
#[derive(Debug, Clone)]
pub struct SoilFactors {
    pub r: FactorInput,
    pub k: FactorInput,
    pub c: FactorInput,
}

impl Default for SoilFactors {
    fn default() -> Self {
        Self {
            r: FactorInput::Constant(DEFAULT_R_FACTOR),
            k: FactorInput::Constant(DEFAULT_K_FACTOR),
            c: FactorInput::Constant(DEFAULT_C_FACTOR),
        }
    }
}

impl SoilFactors {
    pub fn ensure_same_grid(&self, dem: &Raster<f64>) -> Result<()> {
        self.r.ensure_same_grid(dem)?;
        self.k.ensure_same_grid(dem)?;
        self.c.ensure_same_grid(dem)
    }

    /// Product R·K·C at (row, col), `None` if any factor is no-data.
    /// A negative factor is a domain error.
    pub(crate) fn product_at(&self, row: usize, col: usize) -> Result<Option<f64>> {
        let (Some(r), Some(k), Some(c)) = (self.r.at(row, col), self.k.at(row, col), self.c.at(row, col))
        else {
            return Ok(None);
        };
        let r = non_negative("r_factor", r, row, col)?;
        let k = non_negative("k_factor", k, row, col)?;
        let c = non_negative("c_factor", c, row, col)?;
        Ok(Some(r * k * c))
    }
}

/// Topographic factors of the selected model
#[derive(Debug, Clone)]
pub enum ErosionFactors {
    /// RUSLE3D length-slope factor (dimensionless)
    LsFactor(Raster<f64>),
    /// USPED transport capacity and its east/north components
    SedimentFlux(SedimentFlux),
}

/// Sediment transport capacity `T` split along the aspect direction
#[derive(Debug, Clone)]
pub struct SedimentFlux {
    pub capacity: Raster<f64>,
    /// `T·cos(aspect)`, east component
    pub qx: Raster<f64>,
    /// `T·sin(aspect)`, north component
    pub qy: Raster<f64>,
}

/// Specific catchment area `A_s` and `sin(slope)` with the domain guards
/// applied. `None` when either input is no-data.
#[inline]
fn topographic_term(
    acc: f64,
    slope: f64,
    cell_size: f64,
    weighting: FlowWeighting,
    row: usize,
    col: usize,
) -> Result<Option<(f64, f64)>> {
    if acc.is_nan() || slope.is_nan() {
        return Ok(None);
    }
    let acc = non_negative("flow_accumulation", acc, row, col)?;
    let slope = non_negative("slope", slope, row, col)?;
    let area = weighting.specific_catchment_area(acc, cell_size);
    Ok(Some((area, slope.sin())))
}

/// RUSLE3D LS factor:
///
/// ```text
/// LS = (A_s / 22.13)^m · (sin(slope) / 0.0896)^n
/// ```
///
/// `A_s` is the upslope contributing area per unit contour width derived
/// from `flow_acc` with `weighting`; `slope` is in radians.
pub fn ls_factor(
    flow_acc: &Raster<f64>,
    slope: &Raster<f64>,
    topo: TopographicParams,
    weighting: FlowWeighting,
) -> Result<Raster<f64>> {
    topo.validate()?;
    flow_acc.ensure_same_grid(slope)?;
    let (rows, cols) = flow_acc.shape();
    let cell_size = flow_acc.square_cell_size()?;

    let data = par_cells(rows, cols, |row, col| {
        let acc = unsafe { flow_acc.get_unchecked(row, col) };
        let s = unsafe { slope.get_unchecked(row, col) };
        let acc = if flow_acc.is_nodata(acc) { f64::NAN } else { acc };
        let s = if slope.is_nodata(s) { f64::NAN } else { s };

        let Some((area, sin_slope)) =
            topographic_term(acc, s, cell_size, weighting, row, col)?
        else {
            return Ok(f64::NAN);
        };
        let ls = (area / UNIT_PLOT_LENGTH).powf(topo.m)
            * (sin_slope / UNIT_PLOT_SLOPE_SIN).powf(topo.n);
        finite("ls_factor", ls, row, col)
    })?;

    debug!(m = topo.m, n = topo.n, "LS factor computed");
    flow_acc.derive(data, Some(f64::NAN))
}

/// USPED sediment transport capacity and flux components:
///
/// ```text
/// T  = R · K · C · A_s^m · sin(slope)^n
/// qx = T · cos(aspect)
/// qy = T · sin(aspect)
/// ```
///
/// `T` is expressed in `units`. No-data in any input gives no-data in all
/// three outputs.
pub fn sediment_flux(
    flow_acc: &Raster<f64>,
    terrain: &SlopeAspectOutput,
    factors: &SoilFactors,
    topo: TopographicParams,
    weighting: FlowWeighting,
    units: OutputUnits,
) -> Result<SedimentFlux> {
    topo.validate()?;
    flow_acc.ensure_same_grid(&terrain.slope)?;
    flow_acc.ensure_same_grid(&terrain.aspect)?;
    factors.ensure_same_grid(flow_acc)?;
    let (rows, cols) = flow_acc.shape();
    let cell_size = flow_acc.square_cell_size()?;
    let scale = units.scale();

    let cells = par_cells(rows, cols, |row, col| {
        let nodata = (f64::NAN, f64::NAN, f64::NAN);
        let acc = unsafe { flow_acc.get_unchecked(row, col) };
        let s = unsafe { terrain.slope.get_unchecked(row, col) };
        let a = unsafe { terrain.aspect.get_unchecked(row, col) };
        if flow_acc.is_nodata(acc) || terrain.aspect.is_nodata(a) {
            return Ok(nodata);
        }
        let s = if terrain.slope.is_nodata(s) { f64::NAN } else { s };

        let Some((area, sin_slope)) =
            topographic_term(acc, s, cell_size, weighting, row, col)?
        else {
            return Ok(nodata);
        };
        let Some(rkc) = factors.product_at(row, col)? else {
            return Ok(nodata);
        };

        let t = rkc * area.powf(topo.m) * sin_slope.powf(topo.n) * scale;
        let t = finite("transport_capacity", t, row, col)?;
        Ok((t, t * a.cos(), t * a.sin()))
    })?;

    let mut capacity = Vec::with_capacity(cells.len());
    let mut qx = Vec::with_capacity(cells.len());
    let mut qy = Vec::with_capacity(cells.len());
    for (t, x, y) in cells {
        capacity.push(t);
        qx.push(x);
        qy.push(y);
    }

    debug!(m = topo.m, n = topo.n, ?units, "sediment flux computed");
    Ok(SedimentFlux {
        capacity: flow_acc.derive(capacity, Some(f64::NAN))?,
        qx: flow_acc.derive(qx, Some(f64::NAN))?,
        qy: flow_acc.derive(qy, Some(f64::NAN))?,
    })
}
