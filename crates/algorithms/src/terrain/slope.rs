//! Slope calculation from DEMs
//!
//! Calculates the steepest gradient angle using the Horn (1981) method,
//! which uses a 3x3 neighborhood to compute partial derivatives.

use serde::{Deserialize, Serialize};

use super::{gradient_field, slope_radians};
use soilflux_core::raster::{EdgeMode, Raster};
use soilflux_core::{Algorithm, Error, Result};

/// Units for slope output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlopeUnits {
    /// Radians (0-π/2)
    #[default]
    Radians,
    /// Degrees (0-90)
    Degrees,
    /// Percent (0-infinity, typically 0-100+)
    Percent,
}

impl SlopeUnits {
    pub fn convert(self, radians: f64) -> f64 {
        match self {
            SlopeUnits::Radians => radians,
            SlopeUnits::Degrees => radians.to_degrees(),
            SlopeUnits::Percent => radians.tan() * 100.0,
        }
    }
}

/// Parameters for slope calculation
#[derive(Debug, Clone)]
pub struct SlopeParams {
    /// Output units
    pub units: SlopeUnits,
    /// Vertical exaggeration applied to elevations (default 1.0)
    pub z_factor: f64,
    /// Treatment of cells whose window leaves the grid or touches no-data
    pub edge: EdgeMode,
}

impl Default for SlopeParams {
    fn default() -> Self {
        Self {
            units: SlopeUnits::Radians,
            z_factor: 1.0,
            edge: EdgeMode::default(),
        }
    }
}

/// Slope algorithm
#[derive(Debug, Clone, Default)]
pub struct Slope;

impl Algorithm for Slope {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = SlopeParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Slope"
    }

    fn description(&self) -> &'static str {
        "Calculate slope (rate of change of elevation) from a DEM using Horn's method"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        slope(&input, params)
    }
}

/// Calculate slope from a DEM
///
/// Uses Horn's (1981) method with a 3x3 neighborhood:
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
///
/// dz/dx = ((c + 2f + i) - (a + 2d + g)) / (8 * cellsize)
/// dz/dy = ((a + 2b + c) - (g + 2h + i)) / (8 * cellsize)
/// slope = atan(sqrt(dz/dx² + dz/dy²))
///
/// Zero slope is a valid value. Cells whose window cannot be gathered under
/// `params.edge` are NaN.
pub fn slope(dem: &Raster<f64>, params: SlopeParams) -> Result<Raster<f64>> {
    let field = gradient_field(dem, params.z_factor, params.edge)?;
    let data: Vec<f64> = field
        .into_iter()
        .map(|g| match g {
            Some((dx, dy)) => params.units.convert(slope_radians(dx, dy)),
            None => f64::NAN,
        })
        .collect();

    dem.derive(data, Some(f64::NAN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use soilflux_core::GeoTransform;

    fn create_test_dem() -> Raster<f64> {
        // Create a simple tilted plane: z = x + y
        let mut dem = Raster::new(10, 10);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));

        for row in 0..10 {
            for col in 0..10 {
                dem.set(row, col, (row + col) as f64).unwrap();
            }
        }
        dem
    }


    #[test]
    fn test_rectangular_cells_rejected() {
        // 10 m wide, 20 m tall cells, 1 m drop per row
        let mut dem = Raster::new(7, 7);
        dem.set_transform(GeoTransform::new(0.0, 140.0, 10.0, -20.0));
        for row in 0..7 {
            for col in 0..7 {
                dem.set(row, col, 50.0 - row as f64).unwrap();
            }
        }
        assert!(matches!(
            slope(&dem, SlopeParams::default()),
            Err(Error::InvalidParameter { name: "cell_size", .. })
        ));
    }

    #[test]
    fn test_slope_flat() {
        let mut dem: Raster<f64> = Raster::filled(10, 10, 100.0);
        dem.set_transform(GeoTransform::new(0.0, 10.0, 1.0, -1.0));

        let result = slope(&dem, SlopeParams::default()).unwrap();
        assert!(result.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_slope_tilted_plane_exact_to_the_edge() {
        let dem = create_test_dem();
        let result = slope(&dem, SlopeParams::default()).unwrap();

        let expected = 2.0_f64.sqrt().atan();
        for (row, col) in [(0, 0), (0, 9), (5, 5), (9, 0), (9, 9), (4, 0)] {
            assert_relative_eq!(result.get(row, col).unwrap(), expected, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_nodata_edges() {
        let dem = create_test_dem();
        let params = SlopeParams {
            edge: EdgeMode::NoData,
            ..Default::default()
        };
        let result = slope(&dem, params).unwrap();
        assert!(result.get(0, 5).unwrap().is_nan());
        assert!(result.get(9, 9).unwrap().is_nan());
        assert!(result.get(5, 5).unwrap().is_finite());
    }

    #[test]
    fn test_slope_units() {
        let dem = create_test_dem();
        let with = |units| {
            slope(&dem, SlopeParams { units, ..Default::default() })
                .unwrap()
                .get(5, 5)
                .unwrap()
        };

        let rad_val = with(SlopeUnits::Radians);
        assert_relative_eq!(with(SlopeUnits::Degrees), rad_val.to_degrees(), epsilon = 1e-9);
        assert_relative_eq!(with(SlopeUnits::Percent), rad_val.tan() * 100.0, epsilon = 1e-9);
    }

    #[test]
    fn test_z_factor_scales_gradient() {
        let dem = create_test_dem();
        let result = slope(
            &dem,
            SlopeParams {
                units: SlopeUnits::Percent,
                z_factor: 2.0,
                ..Default::default()
            },
        )
        .unwrap();
        assert_relative_eq!(result.get(5, 5).unwrap(), 200.0 * 2.0_f64.sqrt(), epsilon = 1e-9);
        assert!(slope(&dem, SlopeParams { z_factor: 0.0, ..Default::default() }).is_err());
    }
}
