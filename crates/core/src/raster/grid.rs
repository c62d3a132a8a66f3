//! Main Raster type

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, RasterElement, Region};
use ndarray::{Array2, ArrayView2};

/// A georeferenced 2D raster grid.
///
/// `Raster<T>` stores values of type `T` in row-major order together with
/// the north-up transform and an optional no-data sentinel. Algorithms treat
/// rasters as immutable inputs and return new rasters; the mutating
/// accessors exist for constructing grids.
///
/// # Example
///
/// ```
/// use soilflux_core::Raster;
///
/// let mut raster: Raster<f64> = Raster::new(100, 100);
/// raster.set(10, 20, 42.0).unwrap();
/// assert_eq!(raster.get(10, 20).unwrap(), 42.0);
/// assert_eq!(raster.value(10, 21).unwrap(), Some(0.0));
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Create a new raster filled with zeros
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    /// Create a new raster filled with a specific value
    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Create a raster from row-major data
    pub fn from_vec(data: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        let array = Array2::from_shape_vec((rows, cols), data)
            .map_err(|e| Error::Other(e.to_string()))?;
        Ok(Self::from_array(array))
    }

    /// Create a raster from an ndarray
    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            nodata: None,
        }
    }

    /// Zero-filled raster of another cell type sharing this raster's shape
    /// and transform
    pub fn with_same_meta<U: RasterElement>(&self) -> Raster<U> {
        Raster {
            data: Array2::zeros(self.data.dim()),
            transform: self.transform,
            nodata: None,
        }
    }

    /// Raster with this raster's shape, transform and no-data, filled with a value
    pub fn like(&self, fill_value: T) -> Self {
        Self {
            data: Array2::from_elem(self.data.dim(), fill_value),
            transform: self.transform,
            nodata: self.nodata,
        }
    }

    /// Build an output raster on this raster's lattice from row-major cell data.
    pub fn derive<U: RasterElement>(&self, data: Vec<U>, nodata: Option<U>) -> Result<Raster<U>> {
        let mut output = Raster::from_vec(data, self.rows(), self.cols())?;
        output.transform = self.transform;
        output.nodata = nodata;
        Ok(output)
    }

    // Dimensions

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// Dimensions as (rows, cols)
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Total number of cells
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    // Data access

    /// Raw value at (row, col), no-data sentinel included
    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        self.data
            .get((row, col))
            .copied()
            .ok_or(self.out_of_bounds(row, col))
    }

    /// Value at (row, col), `None` when the cell is no-data
    pub fn value(&self, row: usize, col: usize) -> Result<Option<T>> {
        let v = self.get(row, col)?;
        Ok((!self.is_nodata(v)).then_some(v))
    }

    /// Get value at (row, col) without bounds checking
    ///
    /// # Safety
    /// Caller must ensure row < self.rows() and col < self.cols()
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    /// Set value at (row, col)
    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        if row >= self.rows() || col >= self.cols() {
            return Err(self.out_of_bounds(row, col));
        }
        self.data[(row, col)] = value;
        Ok(())
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rows(),
            cols: self.cols(),
        }
    }

    /// Visit every cell as `(row, col, value)`.
    ///
    /// Callers must not depend on the visiting order.
    pub fn for_each_cell<F>(&self, mut f: F)
    where
        F: FnMut(usize, usize, T),
    {
        for ((row, col), &v) in self.data.indexed_iter() {
            f(row, col, v);
        }
    }

    /// Apply `f` to every valid cell, producing a new raster on the same
    /// lattice. No-data cells map to `U::default_nodata()`.
    pub fn map_cells<U, F>(&self, f: F) -> Raster<U>
    where
        U: RasterElement,
        F: Fn(T) -> U,
    {
        let out_nodata = U::default_nodata();
        let data = self
            .data
            .mapv(|v| if self.is_nodata(v) { out_nodata } else { f(v) });
        Raster {
            data,
            transform: self.transform,
            nodata: Some(out_nodata),
        }
    }

    /// Number of cells holding a valid value
    pub fn valid_count(&self) -> usize {
        self.data.iter().filter(|v| !self.is_nodata(**v)).count()
    }

    pub fn view(&self) -> ArrayView2<'_, T> {
        self.data.view()
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    pub fn into_array(self) -> Array2<T> {
        self.data
    }

    // Metadata

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Cell size in metres (square cells)
    pub fn cell_size(&self) -> f64 {
        self.transform.cell_size()
    }

    /// Cell size of a grid whose cells are positive squares.
    ///
    /// Fails with [`Error::InvalidParameter`] when the x and y resolutions
    /// differ (beyond the lattice tolerance) or are not positive.
    pub fn square_cell_size(&self) -> Result<f64> {
        let width = self.transform.pixel_width.abs();
        let height = self.transform.pixel_height.abs();
        if !width.is_finite() || width <= 0.0 {
            return Err(Error::invalid_parameter("cell_size", width, "must be positive"));
        }
        if (width - height).abs() > 1e-6 * width {
            return Err(Error::invalid_parameter(
                "cell_size",
                format!("{} x {}", width, height),
                "cells must be square",
            ));
        }
        Ok(width)
    }

    /// Geographic bounds (min_x, min_y, max_x, max_y)
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Spatial reference descriptor of this raster
    pub fn region(&self) -> Region {
        Region::new(self.rows(), self.cols(), self.transform)
    }

    /// Fail with [`Error::ShapeMismatch`] unless `other` lies on the same
    /// lattice (rows, cols, cell size and origin).
    pub fn ensure_same_grid<U: RasterElement>(&self, other: &Raster<U>) -> Result<()> {
        self.region().check(&other.region())
    }

    // Value checks

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    pub fn is_nodata_at(&self, row: usize, col: usize) -> Result<bool> {
        let value = self.get(row, col)?;
        Ok(self.is_nodata(value))
    }
}
