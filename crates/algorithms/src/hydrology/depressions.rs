//! Optional depression handling before flow routing
//!
//! Flow direction leaves pits in place: a depression is a sink that ends
//! every flow path reaching it. [`DepressionHandling::Fill`] raises
//! depressions with Priority-Flood first so flow continues to the DEM edge.
//!
//! Reference:
//! Barnes, R., Lehman, C., & Mulla, D. (2014). Priority-Flood: An optimal
//! depression-filling and watershed-labeling algorithm for digital elevation
//! models. *Computers & Geosciences*, 62, 117–127.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use soilflux_core::raster::{d8, Raster};
use soilflux_core::{Algorithm, Error, Result};

/// Conditioning applied to the DEM used for flow routing
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DepressionHandling {
    /// Route over the DEM as given; pits become sinks
    #[default]
    None,
    /// Priority-Flood fill with a minimum gradient of `epsilon` per step
    Fill { epsilon: f64 },
}

impl DepressionHandling {
    /// DEM to route flow over. Borrowed unchanged for [`DepressionHandling::None`].
    pub fn condition<'a>(&self, dem: &'a Raster<f64>) -> Result<std::borrow::Cow<'a, Raster<f64>>> {
        match *self {
            DepressionHandling::None => Ok(std::borrow::Cow::Borrowed(dem)),
            DepressionHandling::Fill { epsilon } => {
                fill_depressions(dem, FillParams { epsilon }).map(std::borrow::Cow::Owned)
            }
        }
    }
}

/// A cell in the priority queue, ordered by elevation (min-heap via Reverse).
#[derive(Debug, Clone)]
struct Cell {
    elevation: f64,
    row: usize,
    col: usize,
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        // lower elevation pops first; row-major order breaks ties
        other
            .elevation
            .total_cmp(&self.elevation)
            .then_with(|| (other.row, other.col).cmp(&(self.row, self.col)))
    }
}

/// Parameters for depression filling
#[derive(Debug, Clone)]
pub struct FillParams {
    /// Minimum elevation increment between a filled cell and the cell it
    /// spills into. Zero leaves filled depressions perfectly flat, which
    /// turns them into sinks again.
    pub epsilon: f64,
}

impl Default for FillParams {
    fn default() -> Self {
        Self { epsilon: 1e-5 }
    }
}

/// Depression filling algorithm
#[derive(Debug, Clone, Default)]
pub struct FillDepressions;

impl Algorithm for FillDepressions {
    type Input = Raster<f64>;
    type Output = Raster<f64>;
    type Params = FillParams;
    type Error = Error;

    fn name(&self) -> &'static str {
        "Fill Depressions"
    }

    fn description(&self) -> &'static str {
        "Raise closed depressions to their spill level (Priority-Flood)"
    }

    fn execute(&self, input: Self::Input, params: Self::Params) -> Result<Self::Output> {
        fill_depressions(&input, params)
    }
}

/// Fill depressions using Priority-Flood.
///
/// Border cells and cells next to no-data seed a min-heap; popping the
/// lowest cell raises every unvisited neighbour to at least its elevation
/// plus `epsilon`. Cells adjacent to no-data drain into it, so no-data
/// holes act as outlets like the grid edge.
pub fn fill_depressions(dem: &Raster<f64>, params: FillParams) -> Result<Raster<f64>> {
    if !params.epsilon.is_finite() || params.epsilon < 0.0 {
        return Err(Error::invalid_parameter(
            "epsilon",
            params.epsilon,
            "must be finite and non-negative",
        ));
    }

    let (rows, cols) = dem.shape();
    let mut output = dem.like(f64::NAN);
    output.set_nodata(Some(f64::NAN));
    let mut visited = ndarray::Array2::<bool>::from_elem((rows, cols), false);
    let mut heap = BinaryHeap::new();

    let is_outlet = |row: usize, col: usize| {
        d8::SEARCH_ORDER.iter().any(|&dir| {
            match d8::receiver(row, col, dir, rows, cols) {
                None => true,
                Some((r, c)) => dem.is_nodata(unsafe { dem.get_unchecked(r, c) }),
            }
        })
    };

    for row in 0..rows {
        for col in 0..cols {
            let z = unsafe { dem.get_unchecked(row, col) };
            if dem.is_nodata(z) {
                visited[(row, col)] = true;
                continue;
            }
            if is_outlet(row, col) {
                visited[(row, col)] = true;
                output.set(row, col, z)?;
                heap.push(Cell { elevation: z, row, col });
            }
        }
    }

    while let Some(cell) = heap.pop() {
        for &dir in &d8::SEARCH_ORDER {
            let Some((nr, nc)) = d8::receiver(cell.row, cell.col, dir, rows, cols) else {
                continue;
            };
            if visited[(nr, nc)] {
                continue;
            }
            visited[(nr, nc)] = true;

            let z = unsafe { dem.get_unchecked(nr, nc) };
            let filled = z.max(cell.elevation + params.epsilon);
            output.set(nr, nc, filled)?;
            heap.push(Cell {
                elevation: filled,
                row: nr,
                col: nc,
            });
        }
    }

    Ok(output)
}
