//! Hydrological analysis algorithms
//!
//! Flow routing over a Digital Elevation Model:
//! - Flow direction: D8 single flow direction with a fixed tie-break
//! - Flow accumulation: upslope cells or area draining through each cell
//! - Depression filling: optional Priority-Flood pre-pass (Barnes 2014)

mod depressions;
pub(crate) mod flow_accumulation;
pub(crate) mod flow_direction;

pub use depressions::{fill_depressions, DepressionHandling, FillDepressions, FillParams};
pub use flow_accumulation::{
    flow_accumulation, FlowAccumulation, FlowAccumulationParams, FlowWeighting,
};
pub use flow_direction::{flow_direction, FlowDirection};
