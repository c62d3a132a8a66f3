//! Region descriptor shared by all grids of one computation

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::raster::GeoTransform;

/// Rows, columns and georeferencing of a raster lattice.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub rows: usize,
    pub cols: usize,
    pub transform: GeoTransform,
}

impl Region {
    pub fn new(rows: usize, cols: usize, transform: GeoTransform) -> Self {
        Self {
            rows,
            cols,
            transform,
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols, self.rows)
    }

    /// Fail with [`Error::ShapeMismatch`] if `other` is not the same lattice.
    pub fn check(&self, other: &Region) -> Result<()> {
        if self.rows == other.rows
            && self.cols == other.cols
            && self.transform.same_lattice(&other.transform)
        {
            Ok(())
        } else {
            Err(Error::ShapeMismatch {
                expected: self.to_string(),
                actual: other.to_string(),
            })
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} cells @ {} m, origin ({}, {})",
            self.rows,
            self.cols,
            self.cell_size(),
            self.transform.origin_x,
            self.transform.origin_y
        )
    }
}
