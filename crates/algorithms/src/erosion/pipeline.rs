//! End-to-end erosion run
//!
//! ```text
//! DEM ─┬─ [depression pre-pass] ─ flow direction ─ flow accumulation ─┐
//!      └─ slope / aspect ─────────────────────────────────────────────┴─ factors ─ synthesis
//! ```
//!
//! Every stage is a pure function returning new rasters, and any stage
//! error aborts the run without partial outputs.

use tracing::{debug, info};

use super::synthesis::{flux_divergence, soil_loss, ChangeClass, ErosionResult};
use super::{
    ls_factor, sediment_flux, ErosionConfig, ErosionFactors, ErosionModel, FactorInput,
    RFactorSource, SoilFactors,
};
use super::{DEFAULT_C_FACTOR, DEFAULT_K_FACTOR};
use crate::hydrology::{flow_accumulation, flow_direction, FlowAccumulationParams};
use crate::terrain::{slope_aspect, SlopeAspectParams};
use soilflux_core::raster::Raster;
use soilflux_core::{Algorithm, Error, Result};

/// Rasters and factors an erosion run reads
#[derive(Debug, Clone)]
pub struct ErosionInputs {
    pub dem: Raster<f64>,
    pub r: RFactorSource,
    pub k: FactorInput,
    pub c: FactorInput,
}

impl ErosionInputs {
    /// DEM with default constant R, K and C
    pub fn new(dem: Raster<f64>) -> Self {
        Self {
            dem,
            r: RFactorSource::default(),
            k: FactorInput::Constant(DEFAULT_K_FACTOR),
            c: FactorInput::Constant(DEFAULT_C_FACTOR),
        }
    }

    pub fn with_r(mut self, r: RFactorSource) -> Self {
        self.r = r;
        self
    }

    pub fn with_k(mut self, k: impl Into<FactorInput>) -> Self {
        self.k = k.into();
        self
    }

    pub fn with_c(mut self, c: impl Into<FactorInput>) -> Self {
        self.c = c.into();
        self
    }
}

/// Every layer an erosion run produces
#[derive(Debug, Clone)]
pub struct ErosionOutputs {
    pub model: ErosionModel,
    pub flow_direction: Raster<u8>,
    pub flow_accumulation: Raster<f64>,
    /// Radians
    pub slope: Raster<f64>,
    /// Radians, counter-clockwise from east, downslope
    pub aspect: Raster<f64>,
    pub factors: ErosionFactors,
    pub result: ErosionResult,
}

/// A configured erosion model, ready to run on any number of inputs
#[derive(Debug, Clone)]
pub struct ErosionPipeline {
    config: ErosionConfig,
    model: ErosionModel,
}

impl ErosionPipeline {
    /// Validate the configuration and fix the model variant
    pub fn new(config: ErosionConfig) -> Result<Self> {
        config.validate()?;
        let model = config.model();
        debug!(?model, "erosion pipeline configured");
        Ok(Self { config, model })
    }

    pub fn model(&self) -> ErosionModel {
        self.model
    }

    pub fn config(&self) -> &ErosionConfig {
        &self.config
    }

    pub fn run(&self, inputs: &ErosionInputs) -> Result<ErosionOutputs> {
        let dem = &inputs.dem;
        let (rows, cols) = dem.shape();
        if rows == 0 || cols == 0 {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }

        let cell_size = dem.square_cell_size()?;

        let factors = SoilFactors {
            r: inputs.r.resolve(dem)?,
            k: inputs.k.clone(),
            c: inputs.c.clone(),
        };
        factors.ensure_same_grid(dem)?;

        debug!(rows, cols, cell_size, "routing flow");
        let routed = self.config.depressions.condition(dem)?;
        let fdir = flow_direction(&routed)?;
        let acc = flow_accumulation(
            &routed,
            &fdir,
            FlowAccumulationParams {
                weighting: self.config.weighting,
            },
        )?;

        debug!(edge = ?self.config.edge, "computing slope and aspect");
        let terrain = slope_aspect(
            dem,
            SlopeAspectParams {
                z_factor: 1.0,
                edge: self.config.edge,
            },
        )?;

        let (model_factors, result) = match self.model {
            ErosionModel::Rusle3d(topo) => {
                let ls = ls_factor(&acc, &terrain.slope, topo, self.config.weighting)?;
                let loss = soil_loss(&ls, &factors, self.config.units)?;
                let result = ErosionResult::from_soil_loss(loss, self.config.stable_threshold)?;
                (ErosionFactors::LsFactor(ls), result)
            }
            ErosionModel::Usped(topo) => {
                let flux = sediment_flux(
                    &acc,
                    &terrain,
                    &factors,
                    topo,
                    self.config.weighting,
                    self.config.units,
                )?;
                let net = flux_divergence(&flux, self.config.edge)?;
                let result = ErosionResult::from_net_change(net, self.config.stable_threshold)?;
                (ErosionFactors::SedimentFlux(flux), result)
            }
        };

        let (eroding, stable, depositing) = class_counts(&result.change_class);
        info!(
            model = %self.config.model,
            eroding,
            stable,
            depositing,
            units = ?self.config.units,
            "erosion run finished"
        );

        Ok(ErosionOutputs {
            model: self.model,
            flow_direction: fdir,
            flow_accumulation: acc,
            slope: terrain.slope,
            aspect: terrain.aspect,
            factors: model_factors,
            result,
        })
    }
}

fn class_counts(classes: &Raster<i8>) -> (usize, usize, usize) {
    let mut counts = (0, 0, 0);
    classes.for_each_cell(|_, _, v| {
        if v == ChangeClass::Erosion.code() {
            counts.0 += 1;
        } else if v == ChangeClass::Stable.code() {
            counts.1 += 1;
        } else if v == ChangeClass::Deposition.code() {
            counts.2 += 1;
        }
    });
    counts
}

/// Erosion model as a single algorithm
#[derive(Debug, Clone, Default)]
pub struct Erosion;

impl Algorithm for Erosion {
    type Input = ErosionInputs;
    type Output = ErosionOutputs;
    type Params = ErosionConfig;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Erosion (RUSLE3D/USPED)"
    }

    fn description(&self) -> &'static str {
        "Soil loss or net erosion/deposition from a DEM and R, K, C factors"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        ErosionPipeline::new(params)?.run(&input)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::erosion::ModelKind;
    use crate::hydrology::DepressionHandling;
    use soilflux_core::raster::d8;
    use soilflux_core::GeoTransform;

    fn plane(rows: usize, cols: usize) -> Raster<f64> {
        let mut dem = Raster::new(rows, cols);
        dem.set_transform(GeoTransform::new(0.0, rows as f64 * 10.0, 10.0, -10.0));
        for row in 0..rows {
            for col in 0..cols {
                dem.set(row, col, 100.0 - row as f64 * 2.0).unwrap();
            }
        }
        dem
    }


    #[test]
    fn rectangular_cells_fail_before_any_stage() {
        let mut dem = plane(6, 5);
        dem.set_transform(GeoTransform::new(0.0, 60.0, 10.0, -12.5));
        for model in [ModelKind::Rusle3d, ModelKind::Usped] {
            let pipeline = ErosionPipeline::new(ErosionConfig::for_model(model)).unwrap();
            assert!(matches!(
                pipeline.run(&ErosionInputs::new(dem.clone())),
                Err(Error::InvalidParameter { name: "cell_size", .. })
            ));
        }
    }

    #[test]
    fn rusle_run_produces_soil_loss_only() {
        let pipeline = ErosionPipeline::new(ErosionConfig::default()).unwrap();
        let out = pipeline.run(&ErosionInputs::new(plane(6, 5))).unwrap();

        assert_eq!(out.model, ErosionModel::rusle3d());
        assert!(matches!(out.factors, ErosionFactors::LsFactor(_)));
        assert!(out.result.deposition.is_none());
        assert!(out.result.net_change.is_none());
        assert!(out.result.erosion.data().iter().all(|&v| v >= 0.0));
        // loss grows downslope with contributing area
        let top = out.result.erosion.get(0, 2).unwrap();
        let bottom = out.result.erosion.get(5, 2).unwrap();
        assert!(bottom > top, "{bottom} <= {top}");
        assert_eq!(out.flow_direction.get(2, 2).unwrap(), 7);
    }

    #[test]
    fn usped_run_produces_net_change() {
        let pipeline = ErosionPipeline::new(ErosionConfig::for_model(ModelKind::Usped)).unwrap();
        let out = pipeline.run(&ErosionInputs::new(plane(6, 5))).unwrap();
        assert!(matches!(out.factors, ErosionFactors::SedimentFlux(_)));
        let net = out.result.net_change.as_ref().unwrap();
        let dep = out.result.deposition.as_ref().unwrap();
        for row in 0..6 {
            for col in 0..5 {
                let n = net.get(row, col).unwrap();
                let e = out.result.erosion.get(row, col).unwrap();
                let d = dep.get(row, col).unwrap();
                assert!((e - d - n).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn invalid_config_fails_at_construction() {
        let config = ErosionConfig {
            m: Some(f64::INFINITY),
            ..Default::default()
        };
        assert!(matches!(
            ErosionPipeline::new(config),
            Err(Error::InvalidParameter { name: "m", .. })
        ));
    }

    #[test]
    fn mismatched_factor_grid_is_rejected() {
        let inputs = ErosionInputs::new(plane(6, 5)).with_k(Raster::filled(5, 5, 0.2));
        let pipeline = ErosionPipeline::new(ErosionConfig::default()).unwrap();
        assert!(matches!(pipeline.run(&inputs), Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn negative_factor_aborts_run() {
        let inputs = ErosionInputs::new(plane(6, 5)).with_c(-0.5);
        let pipeline = ErosionPipeline::new(ErosionConfig::default()).unwrap();
        assert!(matches!(
            pipeline.run(&inputs),
            Err(Error::Domain { quantity: "c_factor", .. })
        ));
    }

    #[test]
    fn depression_fill_only_changes_routing() {
        let mut dem = plane(7, 5);
        dem.set(3, 2, 80.0).unwrap();

        let plain = ErosionPipeline::new(ErosionConfig::default())
            .unwrap()
            .run(&ErosionInputs::new(dem.clone()))
            .unwrap();
        assert_eq!(plain.flow_direction.get(3, 2).unwrap(), d8::NO_FLOW);

        let config = ErosionConfig {
            depressions: DepressionHandling::Fill { epsilon: 1e-4 },
            ..Default::default()
        };
        let filled = ErosionPipeline::new(config)
            .unwrap()
            .run(&ErosionInputs::new(dem))
            .unwrap();
        assert_ne!(filled.flow_direction.get(3, 2).unwrap(), d8::NO_FLOW);
        assert_eq!(
            plain.slope.get(3, 2).unwrap(),
            filled.slope.get(3, 2).unwrap(),
            "slope comes from the unmodified DEM"
        );
    }

    #[test]
    fn algorithm_trait_entry_point() {
        let out = Erosion.execute_default(ErosionInputs::new(plane(4, 4))).unwrap();
        assert_eq!(out.result.erosion.shape(), (4, 4));
    }
}
