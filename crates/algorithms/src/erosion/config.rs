//! Erosion run configuration
//!
//! Everything that selects how a run behaves, as opposed to the rasters it
//! runs on. Deserializes from TOML or any other serde format; missing keys
//! take their defaults.
//!
//! ```toml
//! model = "usped"
//! m = 1.4
//! weighting = "cell_area"
//! stable_threshold = 0.01
//!
//! [depressions]
//! method = "fill"
//! epsilon = 0.0001
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{ErosionModel, OutputUnits, TopographicParams};
use crate::hydrology::{DepressionHandling, FlowWeighting};
use soilflux_core::raster::EdgeMode;
use soilflux_core::{Error, Result};

/// Erosion model selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    #[default]
    #[serde(alias = "rusle")]
    Rusle3d,
    Usped,
}

impl ModelKind {
    pub fn default_topographic(self) -> TopographicParams {
        match self {
            ModelKind::Rusle3d => TopographicParams::RUSLE3D,
            ModelKind::Usped => TopographicParams::USPED,
        }
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rusle" | "rusle3d" => Ok(ModelKind::Rusle3d),
            "usped" => Ok(ModelKind::Usped),
            other => Err(Error::invalid_parameter(
                "model",
                other,
                "expected one of: rusle, rusle3d, usped",
            )),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelKind::Rusle3d => write!(f, "rusle3d"),
            ModelKind::Usped => write!(f, "usped"),
        }
    }
}

/// Settings of an erosion run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ErosionConfig {
    pub model: ModelKind,
    /// Upslope area exponent; model default when absent
    pub m: Option<f64>,
    /// Slope exponent; model default when absent
    pub n: Option<f64>,
    pub weighting: FlowWeighting,
    pub edge: EdgeMode,
    pub depressions: DepressionHandling,
    pub units: OutputUnits,
    /// Net change magnitudes up to this value are classified stable
    pub stable_threshold: f64,
}

impl Default for ErosionConfig {
    fn default() -> Self {
        Self {
            model: ModelKind::default(),
            m: None,
            n: None,
            weighting: FlowWeighting::default(),
            edge: EdgeMode::default(),
            depressions: DepressionHandling::default(),
            units: OutputUnits::default(),
            stable_threshold: 0.0,
        }
    }
}

impl ErosionConfig {
    /// Configuration for `model` with every other setting at its default
    pub fn for_model(model: ModelKind) -> Self {
        Self {
            model,
            ..Default::default()
        }
    }

    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| Error::invalid_parameter("config", "toml", e.to_string()))
    }

    /// Exponents after applying overrides
    pub fn topographic(&self) -> TopographicParams {
        let defaults = self.model.default_topographic();
        TopographicParams {
            m: self.m.unwrap_or(defaults.m),
            n: self.n.unwrap_or(defaults.n),
        }
    }

    /// The model variant this configuration selects
    pub fn model(&self) -> ErosionModel {
        let topo = self.topographic();
        match self.model {
            ModelKind::Rusle3d => ErosionModel::Rusle3d(topo),
            ModelKind::Usped => ErosionModel::Usped(topo),
        }
    }

    /// Reject settings no run could use
    pub fn validate(&self) -> Result<()> {
        self.topographic().validate()?;
        if !self.stable_threshold.is_finite() || self.stable_threshold < 0.0 {
            return Err(Error::invalid_parameter(
                "stable_threshold",
                self.stable_threshold,
                "must be finite and non-negative",
            ));
        }
        if let DepressionHandling::Fill { epsilon } = self.depressions {
            if !epsilon.is_finite() || epsilon < 0.0 {
                return Err(Error::invalid_parameter(
                    "depressions.epsilon",
                    epsilon,
                    "must be finite and non-negative",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_kind_parsing() {
        assert_eq!("rusle".parse::<ModelKind>().unwrap(), ModelKind::Rusle3d);
        assert_eq!("RUSLE3D".parse::<ModelKind>().unwrap(), ModelKind::Rusle3d);
        assert_eq!(" usped ".parse::<ModelKind>().unwrap(), ModelKind::Usped);
        assert!(matches!(
            "wepp".parse::<ModelKind>(),
            Err(Error::InvalidParameter { name: "model", .. })
        ));
    }

    #[test]
    fn empty_config_is_default() {
        let config = ErosionConfig::from_toml("").unwrap();
        assert_eq!(config, ErosionConfig::default());
        assert_eq!(config.model(), ErosionModel::rusle3d());
    }

    #[test]
    fn full_config() {
        let config = ErosionConfig::from_toml(
            r#"
            model = "usped"
            m = 1.4
            weighting = "cell_area"
            edge = "no_data"
            units = "tonnes_per_hectare"
            stable_threshold = 0.01

            [depressions]
            method = "fill"
            epsilon = 0.0001
            "#,
        )
        .unwrap();

        assert_eq!(config.model, ModelKind::Usped);
        assert_eq!(config.topographic(), TopographicParams { m: 1.4, n: 1.3 });
        assert_eq!(config.weighting, FlowWeighting::CellArea);
        assert_eq!(config.edge, EdgeMode::NoData);
        assert_eq!(config.units, OutputUnits::TonnesPerHectare);
        assert_eq!(config.depressions, DepressionHandling::Fill { epsilon: 0.0001 });
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rusle_alias_in_toml() {
        let config = ErosionConfig::from_toml("model = \"rusle\"").unwrap();
        assert_eq!(config.model, ModelKind::Rusle3d);
    }

    #[test]
    fn invalid_values_rejected() {
        let config = ErosionConfig {
            n: Some(0.0),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidParameter { name: "n", .. })));

        let config = ErosionConfig {
            stable_threshold: -1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        assert!(ErosionConfig::from_toml("model = \"wepp\"").is_err());
        assert!(ErosionConfig::from_toml("unknown_key = 1").is_err());
    }
}
