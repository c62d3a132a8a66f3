//! D8 flow direction algorithm
//!
//! Routes each cell to its steepest downslope neighbour using the D8
//! (deterministic eight-node) method.
//!
//! Flow direction encoding:
//! ```text
//!   4  3  2
//!   5  0  1
//!   6  7  8
//! ```
//! 0 = sink/flat (no outflow), 1-8 = direction to steepest neighbour,
//! 255 = no-data.

use crate::maybe_rayon::*;
use soilflux_core::raster::{d8, Raster};
use soilflux_core::{Algorithm, Error, Result};

/// Flow direction algorithm (D8)
#[derive(Debug, Clone, Default)]
pub struct FlowDirection;

impl Algorithm for FlowDirection {
    type Input = Raster<f64>;
    type Output = Raster<u8>;
    type Params = ();
    type Error = Error;

    fn name(&self) -> &'static str {
        "Flow Direction (D8)"
    }

    fn description(&self) -> &'static str {
        "Route every DEM cell to its steepest downslope neighbour"
    }

    fn execute(&self, input: Self::Input, _params: Self::Params) -> Result<Self::Output> {
        flow_direction(&input)
    }
}

/// Calculate D8 flow direction from a DEM.
///
/// The drop to each neighbour is divided by its distance (`cell_size` for
/// cardinals, `cell_size·√2` for diagonals) and the steepest strictly
/// positive drop wins. Neighbours are tried in [`d8::SEARCH_ORDER`] and only
/// a strictly steeper candidate replaces the current best, so equally steep
/// neighbours always resolve the same way: cardinals before diagonals, each
/// clockwise from north.
///
/// Cells without a lower valid neighbour (pits and flats) get
/// [`d8::NO_FLOW`]; depressions are not filled here, they simply end flow
/// paths. No-data DEM cells get [`d8::NODATA`], which is also the output
/// raster's no-data value. No direction ever points outside the grid or
/// into a no-data cell.
pub fn flow_direction(dem: &Raster<f64>) -> Result<Raster<u8>> {
    let (rows, cols) = dem.shape();
    let cell_size = dem.square_cell_size()?;

    let output_data: Vec<u8> = (0..rows)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![d8::NO_FLOW; cols];

            for (col, out) in row_data.iter_mut().enumerate() {
                let center = unsafe { dem.get_unchecked(row, col) };
                if dem.is_nodata(center) {
                    *out = d8::NODATA;
                    continue;
                }

                let mut max_drop = 0.0_f64;
                let mut best_dir = d8::NO_FLOW;

                for &dir in &d8::SEARCH_ORDER {
                    let Some((nr, nc)) = d8::receiver(row, col, dir, rows, cols) else {
                        continue;
                    };
                    let neighbor = unsafe { dem.get_unchecked(nr, nc) };
                    if dem.is_nodata(neighbor) {
                        continue;
                    }

                    let drop = (center - neighbor) / (d8::DISTANCES[dir as usize] * cell_size);
                    if drop > max_drop {
                        max_drop = drop;
                        best_dir = dir;
                    }
                }

                *out = best_dir;
            }

            row_data
        })
        .collect();

    dem.derive(output_data, Some(d8::NODATA))
}
