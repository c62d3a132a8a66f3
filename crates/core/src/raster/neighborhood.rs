//! 3x3 neighbourhood access for terrain derivatives and D8 routing

use serde::{Deserialize, Serialize};

use super::Raster;

/// How a 3x3 window treats neighbours that are outside the grid or no-data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeMode {
    /// The centre cell becomes no-data when any neighbour is missing.
    NoData,
    /// Missing neighbours are reconstructed by linear extrapolation through
    /// the centre from the opposite neighbour (`2e - opposite`). A diagonal
    /// whose opposite is missing too is completed from its two adjacent
    /// cardinals; a cardinal with no opposite takes the centre value. A
    /// plane keeps its exact gradient up to the grid edge.
    #[default]
    Reduced,
}

/// Values of a 3x3 window, row-major, north row first.
///
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window3x3 {
    z: [f64; 9],
}

impl Window3x3 {
    /// Build a window directly from nine values (row-major)
    pub fn from_values(z: [f64; 9]) -> Self {
        Self { z }
    }

    /// Gather the window centred on (row, col).
    ///
    /// Returns `None` if the centre is no-data, or if a neighbour is missing
    /// and `edge` is [`EdgeMode::NoData`].
    pub fn gather(raster: &Raster<f64>, row: usize, col: usize, edge: EdgeMode) -> Option<Self> {
        let (rows, cols) = raster.shape();
        let fetch = |dr: isize, dc: isize| -> Option<f64> {
            let r = row as isize + dr;
            let c = col as isize + dc;
            if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
                return None;
            }
            let v = unsafe { raster.get_unchecked(r as usize, c as usize) };
            (!raster.is_nodata(v)).then_some(v)
        };

        let e = fetch(0, 0)?;
        let mut z = [e; 9];
        let idx = |dr: isize, dc: isize| ((dr + 1) * 3 + (dc + 1)) as usize;

        // Cardinals first: diagonals without an opposite fall back on them.
        for &(dr, dc) in &[(-1, 0), (0, 1), (1, 0), (0, -1)] {
            z[idx(dr, dc)] = match (fetch(dr, dc), edge) {
                (Some(v), _) => v,
                (None, EdgeMode::NoData) => return None,
                (None, EdgeMode::Reduced) => fetch(-dr, -dc).map_or(e, |opp| 2.0 * e - opp),
            };
        }
        for &(dr, dc) in &[(-1, -1), (-1, 1), (1, 1), (1, -1)] {
            z[idx(dr, dc)] = match (fetch(dr, dc), edge) {
                (Some(v), _) => v,
                (None, EdgeMode::NoData) => return None,
                (None, EdgeMode::Reduced) => match fetch(-dr, -dc) {
                    Some(opp) => 2.0 * e - opp,
                    None => z[idx(dr, 0)] + z[idx(0, dc)] - e,
                },
            };
        }
        Some(Self { z })
    }

    /// Value at offset (dr, dc), each in -1..=1
    pub fn at(&self, dr: isize, dc: isize) -> f64 {
        self.z[((dr + 1) * 3 + (dc + 1)) as usize]
    }

    pub fn center(&self) -> f64 {
        self.z[4]
    }

    /// Horn (1981) partial derivatives `(d/dx, d/dy)` with x pointing east
    /// and y pointing north.
    pub fn horn_gradient(&self, cell_size: f64) -> (f64, f64) {
        let [a, b, c, d, _, f, g, h, i] = self.z;
        let eight_cs = 8.0 * cell_size;
        let dx = ((c + 2.0 * f + i) - (a + 2.0 * d + g)) / eight_cs;
        let dy = ((a + 2.0 * b + c) - (g + 2.0 * h + i)) / eight_cs;
        (dx, dy)
    }
}

/// D8 flow direction encoding
///
/// ```text
///   4  3  2
///   5  0  1
///   6  7  8
/// ```
pub mod d8 {
    /// Sink or flat: no strictly lower neighbour
    pub const NO_FLOW: u8 = 0;

    /// Code written for DEM no-data cells (also the raster sentinel)
    pub const NODATA: u8 = 255;

    /// (row_offset, col_offset) indexed by direction code; index 0 is unused
    pub const OFFSETS: [(isize, isize); 9] = [
        (0, 0),   // 0: no flow
        (0, 1),   // 1: E
        (-1, 1),  // 2: NE
        (-1, 0),  // 3: N
        (-1, -1), // 4: NW
        (0, -1),  // 5: W
        (1, -1),  // 6: SW
        (1, 0),   // 7: S
        (1, 1),   // 8: SE
    ];

    /// Distance in cells for each direction code
    pub const DISTANCES: [f64; 9] = [
        0.0,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
        1.0,
        std::f64::consts::SQRT_2,
    ];

    /// Steepest-descent search order. Equally steep candidates resolve to
    /// the earliest entry: cardinals before diagonals, each clockwise from
    /// north.
    pub const SEARCH_ORDER: [u8; 8] = [3, 1, 7, 5, 2, 8, 6, 4];

    /// Whether `dir` is a routing direction (1-8)
    pub fn is_flow(dir: u8) -> bool {
        (1..=8).contains(&dir)
    }

    pub fn opposite(dir: u8) -> u8 {
        if is_flow(dir) {
            ((dir - 1 + 4) % 8) + 1
        } else {
            dir
        }
    }

    /// Cell that (row, col) drains into, if `dir` routes inside the grid
    pub fn receiver(row: usize, col: usize, dir: u8, rows: usize, cols: usize) -> Option<(usize, usize)> {
        if !is_flow(dir) {
            return None;
        }
        let (dr, dc) = OFFSETS[dir as usize];
        let r = row as isize + dr;
        let c = col as isize + dc;
        if r < 0 || c < 0 || r >= rows as isize || c >= cols as isize {
            None
        } else {
            Some((r as usize, c as usize))
        }
    }
}
