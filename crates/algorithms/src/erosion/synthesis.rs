//! Erosion and deposition from the model factors
//!
//! RUSLE3D yields soil loss only. USPED yields a signed net change: the
//! divergence of the sediment flux, positive where more sediment leaves a
//! cell than enters it (erosion) and negative where it settles
//! (deposition). The surface change is its negative.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{finite, non_negative, par_cells, SedimentFlux, SoilFactors};
use soilflux_core::raster::{EdgeMode, Raster, Window3x3};
use soilflux_core::{Error, Result};

/// Units of soil loss and transport capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputUnits {
    /// t·ha⁻¹·yr⁻¹, the native unit of the R·K product
    TonnesPerHectare,
    /// kg·m⁻²·yr⁻¹
    #[default]
    KilogramsPerSquareMeter,
}

impl OutputUnits {
    /// Multiplier from t·ha⁻¹ to these units
    pub fn scale(self) -> f64 {
        match self {
            OutputUnits::TonnesPerHectare => 1.0,
            // 1000 kg/t over 10000 m²/ha
            OutputUnits::KilogramsPerSquareMeter => 1000.0 / 10000.0,
        }
    }
}

/// Classification of the net change of a cell
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i8)]
pub enum ChangeClass {
    Deposition = -1,
    Stable = 0,
    Erosion = 1,
}

impl ChangeClass {
    /// No-data code of the change class raster
    pub const NODATA: i8 = i8::MIN;

    /// Class of an erosion-positive net change; `|net| <= threshold` is stable
    pub fn from_net(net: f64, stable_threshold: f64) -> Self {
        if net.abs() <= stable_threshold {
            ChangeClass::Stable
        } else if net > 0.0 {
            ChangeClass::Erosion
        } else {
            ChangeClass::Deposition
        }
    }

    pub fn code(self) -> i8 {
        self as i8
    }
}

/// Final layers of an erosion run
#[derive(Debug, Clone)]
pub struct ErosionResult {
    /// Erosion magnitude (≥ 0)
    pub erosion: Raster<f64>,
    /// Deposition magnitude (≥ 0), USPED only
    pub deposition: Option<Raster<f64>>,
    /// Signed net change, positive = erosion, USPED only
    pub net_change: Option<Raster<f64>>,
    /// 1 erosion, 0 stable, -1 deposition
    pub change_class: Raster<i8>,
}

impl ErosionResult {
    /// Result of a soil loss model: no deposition concept
    pub fn from_soil_loss(loss: Raster<f64>, stable_threshold: f64) -> Result<Self> {
        let change_class = classify(&loss, stable_threshold)?;
        Ok(Self {
            erosion: loss,
            deposition: None,
            net_change: None,
            change_class,
        })
    }

    /// Result of a transport model from its erosion-positive net change
    pub fn from_net_change(net: Raster<f64>, stable_threshold: f64) -> Result<Self> {
        let (erosion, deposition) = split_net_change(&net);
        let change_class = classify(&net, stable_threshold)?;
        Ok(Self {
            erosion,
            deposition: Some(deposition),
            net_change: Some(net),
            change_class,
        })
    }
}

/// RUSLE soil loss `A = R·K·LS·C`, scaled to `units`.
///
/// Non-negative for non-negative inputs; a negative factor or LS value is a
/// domain error. No-data in any input gives no-data.
pub fn soil_loss(ls: &Raster<f64>, factors: &SoilFactors, units: OutputUnits) -> Result<Raster<f64>> {
    factors.ensure_same_grid(ls)?;
    let (rows, cols) = ls.shape();
    let scale = units.scale();

    let data = par_cells(rows, cols, |row, col| {
        let v = unsafe { ls.get_unchecked(row, col) };
        if ls.is_nodata(v) {
            return Ok(f64::NAN);
        }
        let v = non_negative("ls_factor", v, row, col)?;
        let Some(rkc) = factors.product_at(row, col)? else {
            return Ok(f64::NAN);
        };
        finite("soil_loss", rkc * v * scale, row, col)
    })?;

    debug!(?units, "soil loss computed");
    ls.derive(data, Some(f64::NAN))
}

/// Divergence of the sediment flux, `∂qx/∂x + ∂qy/∂y` (x east, y north).
///
/// Both derivatives use Horn's weighted differences over the 3x3 window, so
/// the flux is smoothed the same way slope and aspect are. Cells whose
/// window cannot be gathered in either component under `edge` are no-data.
pub fn flux_divergence(flux: &SedimentFlux, edge: EdgeMode) -> Result<Raster<f64>> {
    flux.qx.ensure_same_grid(&flux.qy)?;
    let (rows, cols) = flux.qx.shape();
    let cell_size = flux.qx.square_cell_size()?;

    let data = par_cells(rows, cols, |row, col| {
        let (Some(wx), Some(wy)) = (
            Window3x3::gather(&flux.qx, row, col, edge),
            Window3x3::gather(&flux.qy, row, col, edge),
        ) else {
            return Ok(f64::NAN);
        };
        let (dqx_dx, _) = wx.horn_gradient(cell_size);
        let (_, dqy_dy) = wy.horn_gradient(cell_size);
        finite("net_change", dqx_dx + dqy_dy, row, col)
    })?;

    flux.qx.derive(data, Some(f64::NAN))
}

/// Split an erosion-positive net change into erosion and deposition
/// magnitudes, both non-negative
pub fn split_net_change(net: &Raster<f64>) -> (Raster<f64>, Raster<f64>) {
    let erosion = net.map_cells(|v| v.max(0.0));
    let deposition = net.map_cells(|v| (-v).max(0.0));
    (erosion, deposition)
}

/// Classify a net change raster: 1 erosion, 0 stable, -1 deposition,
/// [`ChangeClass::NODATA`] where `net` is no-data
pub fn classify(net: &Raster<f64>, stable_threshold: f64) -> Result<Raster<i8>> {
    if !stable_threshold.is_finite() || stable_threshold < 0.0 {
        return Err(Error::invalid_parameter(
            "stable_threshold",
            stable_threshold,
            "must be finite and non-negative",
        ));
    }
    let mut classes = net.map_cells(|v| ChangeClass::from_net(v, stable_threshold).code());
    classes.set_nodata(Some(ChangeClass::NODATA));
    Ok(classes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erosion::FactorInput;
    use approx::assert_relative_eq;
    use soilflux_core::GeoTransform;

    fn grid(rows: usize, cols: usize, f: impl Fn(usize, usize) -> f64) -> Raster<f64> {
        let mut r = Raster::new(rows, cols);
        r.set_transform(GeoTransform::new(0.0, rows as f64 * 2.0, 2.0, -2.0));
        r.set_nodata(Some(f64::NAN));
        for row in 0..rows {
            for col in 0..cols {
                r.set(row, col, f(row, col)).unwrap();
            }
        }
        r
    }

    #[test]
    fn soil_loss_units() {
        let ls = grid(1, 2, |_, col| col as f64 + 1.0);
        let factors = SoilFactors {
            r: FactorInput::Constant(100.0),
            k: FactorInput::Constant(0.2),
            c: FactorInput::Constant(0.5),
        };
        let t_ha = soil_loss(&ls, &factors, OutputUnits::TonnesPerHectare).unwrap();
        let kg_m2 = soil_loss(&ls, &factors, OutputUnits::KilogramsPerSquareMeter).unwrap();
        assert_relative_eq!(t_ha.get(0, 1).unwrap(), 20.0);
        assert_relative_eq!(kg_m2.get(0, 1).unwrap(), 2.0);
    }

    #[test]
    fn divergence_of_linear_flux() {
        // qx = 3·x, qy = -2·y with x east and y north: div = 3 - 2 = 1
        let (rows, cols) = (6, 6);
        let qx = grid(rows, cols, |_, col| 3.0 * (col as f64 * 2.0));
        let qy = grid(rows, cols, |row, _| -2.0 * ((rows - 1 - row) as f64 * 2.0));
        let flux = SedimentFlux {
            capacity: qx.like(0.0),
            qx,
            qy,
        };
        let div = flux_divergence(&flux, EdgeMode::Reduced).unwrap();
        for row in 0..rows {
            for col in 0..cols {
                assert_relative_eq!(div.get(row, col).unwrap(), 1.0, epsilon = 1e-9);
            }
        }

        let div = flux_divergence(&flux, EdgeMode::NoData).unwrap();
        assert!(div.get(0, 0).unwrap().is_nan());
        assert_relative_eq!(div.get(2, 2).unwrap(), 1.0, epsilon = 1e-9);
    }

    #[test]
    fn split_and_classify() {
        let net = grid(1, 4, |_, col| [2.0, -3.0, 0.05, f64::NAN][col]);
        let (erosion, deposition) = split_net_change(&net);
        assert_eq!(erosion.get(0, 0).unwrap(), 2.0);
        assert_eq!(erosion.get(0, 1).unwrap(), 0.0);
        assert_eq!(deposition.get(0, 1).unwrap(), 3.0);
        assert_eq!(deposition.get(0, 0).unwrap(), 0.0);
        assert!(erosion.get(0, 3).unwrap().is_nan());
        assert!(deposition.get(0, 3).unwrap().is_nan());

        let classes = classify(&net, 0.1).unwrap();
        assert_eq!(classes.get(0, 0).unwrap(), 1);
        assert_eq!(classes.get(0, 1).unwrap(), -1);
        assert_eq!(classes.get(0, 2).unwrap(), 0);
        assert_eq!(classes.get(0, 3).unwrap(), ChangeClass::NODATA);
        assert_eq!(classes.value(0, 3).unwrap(), None);

        assert!(classify(&net, -1.0).is_err());
    }

    #[test]
    fn soil_loss_result_has_no_deposition() {
        let loss = grid(1, 2, |_, col| col as f64);
        let result = ErosionResult::from_soil_loss(loss, 0.0).unwrap();
        assert!(result.deposition.is_none());
        assert!(result.net_change.is_none());
        assert_eq!(result.change_class.get(0, 0).unwrap(), 0);
        assert_eq!(result.change_class.get(0, 1).unwrap(), 1);
    }
}
