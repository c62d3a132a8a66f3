//! Flow accumulation over a D8 flow direction grid
//!
//! Cells are finalized in descending elevation order. Every valid cell is
//! kept in one arena sorted by elevation; runs of equal elevation form
//! wavefronts. D8 receivers are strictly lower than their donors, so no two
//! cells of one wavefront feed each other and a wavefront can be evaluated
//! in parallel, each cell pulling the already final totals of its donors.
//! The next wavefront starts only after the whole current one is written.

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::maybe_rayon::*;
use soilflux_core::raster::{d8, Raster};
use soilflux_core::{Algorithm, Error, Result};

/// Wavefronts smaller than this are evaluated on the calling thread.
const PARALLEL_WAVEFRONT_MIN: usize = 4096;

/// What each cell contributes to the cells downstream of it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowWeighting {
    /// One unit per cell: accumulation is a cell count
    #[default]
    CellCount,
    /// Cell area in m²: accumulation is a contributing area
    CellArea,
}

impl FlowWeighting {
    /// Weight of a single cell on a grid with the given cell size
    pub fn cell_weight(self, cell_size: f64) -> f64 {
        match self {
            FlowWeighting::CellCount => 1.0,
            FlowWeighting::CellArea => cell_size * cell_size,
        }
    }

    /// Upslope area per unit contour width (m) for an accumulation value
    pub fn specific_catchment_area(self, accumulation: f64, cell_size: f64) -> f64 {
        match self {
            FlowWeighting::CellCount => accumulation * cell_size,
            FlowWeighting::CellArea => accumulation / cell_size,
        }
    }
}

/// Parameters for flow accumulation
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulationParams {
    pub weighting: FlowWeighting,
}

/// Flow accumulation algorithm
#[derive(Debug, Clone, Default)]
pub struct FlowAccumulation;

impl Algorithm for FlowAccumulation {
    /// (DEM, D8 flow direction)
    type Input = (Raster<f64>, Raster<u8>);
    type Output = Raster<f64>;
    type Params = FlowAccumulationParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Accumulation"
    }

    fn description(&self) -> &'static str {
        "Upslope contributing cells or area draining through each cell"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        flow_accumulation(&input.0, &input.1, params)
    }
}

struct Routing<'a> {
    dirs: &'a [u8],
    valid: &'a [bool],
    rows: usize,
    cols: usize,
    weight: f64,
}

impl Routing<'_> {
    /// Own weight plus the final totals of every donor of cell `idx`.
    fn pull(&self, idx: usize, acc: &[f64], done: &[bool]) -> Result<f64> {
        let (row, col) = (idx / self.cols, idx % self.cols);
        let mut total = self.weight;

        for dir in 1..=8u8 {
            let Some((nr, nc)) = d8::receiver(row, col, dir, self.rows, self.cols) else {
                continue;
            };
            let n = nr * self.cols + nc;
            // the neighbour in direction `dir` drains here if it points back
            if !self.valid[n] || self.dirs[n] != d8::opposite(dir) {
                continue;
            }
            if !done[n] {
                return Err(Error::Cycle { row: nr, col: nc });
            }
            total += acc[n];
        }
        Ok(total)
    }
}

/// Calculate flow accumulation from a DEM and its D8 flow direction.
///
/// Every valid cell starts with its own weight (1, or the cell area with
/// [`FlowWeighting::CellArea`]) and receives the totals of all cells that
/// drain into it, so headwater cells hold exactly their own weight and sinks
/// hold everything routed to them.
///
/// The DEM supplies the processing order. A direction that routes flow to a
/// cell that is not strictly lower breaks that order and fails with
/// [`Error::Cycle`].
///
/// # Returns
/// Raster<f64> with accumulation values, NaN on DEM no-data cells
pub fn flow_accumulation(
    dem: &Raster<f64>,
    flow_dir: &Raster<u8>,
    params: FlowAccumulationParams,
) -> Result<Raster<f64>> {
    dem.ensure_same_grid(flow_dir)?;
    let cell_size = dem.square_cell_size()?;
    let (rows, cols) = dem.shape();

    let elevation: Vec<f64> = dem.data().iter().copied().collect();
    let dirs: Vec<u8> = flow_dir.data().iter().copied().collect();
    let valid: Vec<bool> = elevation.iter().map(|&z| !dem.is_nodata(z)).collect();

    for (idx, (&ok, &dir)) in valid.iter().zip(&dirs).enumerate() {
        if ok && dir != d8::NO_FLOW && !d8::is_flow(dir) {
            return Err(Error::invalid_parameter(
                "flow_direction",
                format!("{} at ({}, {})", dir, idx / cols, idx % cols),
                "valid DEM cells need a D8 code in 0..=8",
            ));
        }
    }

    // Arena of valid cells, highest first; ties keep row-major order.
    let mut order: Vec<usize> = (0..elevation.len()).filter(|&i| valid[i]).collect();
    order.sort_by(|&a, &b| elevation[b].total_cmp(&elevation[a]).then(a.cmp(&b)));

    let routing = Routing {
        dirs: &dirs,
        valid: &valid,
        rows,
        cols,
        weight: params.weighting.cell_weight(cell_size),
    };

    let mut acc = vec![f64::NAN; elevation.len()];
    let mut done = vec![false; elevation.len()];
    let mut wavefronts = 0usize;
    let mut start = 0usize;

    while start < order.len() {
        let level_z = elevation[order[start]];
        let len = order[start..]
            .iter()
            .position(|&i| elevation[i] != level_z)
            .unwrap_or(order.len() - start);
        let level = &order[start..start + len];

        let totals: Vec<f64> = if level.len() >= PARALLEL_WAVEFRONT_MIN {
            trace!(z = level_z, cells = level.len(), "parallel wavefront");
            level
                .par_iter()
                .map(|&i| routing.pull(i, &acc, &done))
                .collect::<Result<Vec<_>>>()?
        } else {
            level
                .iter()
                .map(|&i| routing.pull(i, &acc, &done))
                .collect::<Result<Vec<_>>>()?
        };

        // barrier: the wavefront becomes visible only once fully computed
        for (&i, total) in level.iter().zip(totals) {
            acc[i] = total;
            done[i] = true;
        }

        wavefronts += 1;
        start += len;
    }

    debug!(
        cells = order.len(),
        wavefronts, "flow accumulation finished"
    );

    dem.derive(acc, Some(f64::NAN))
}
