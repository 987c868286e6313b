//! The georeferenced grid every stage reads and writes

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::{BlockWindow, GeoTransform, RasterElement};
use ndarray::{s, Array2, ArrayView2, ArrayViewMut2};

/// A single-band layer on a regular lattice.
///
/// Cells are addressed `(row, col)` with row 0 at the top. A cell is valid
/// when it is finite and differs from the nodata sentinel; every algorithm
/// in the workspace skips invalid cells instead of treating them as zero.
///
/// ```ignore
/// use foresight_core::Raster;
///
/// let mut suitability = Raster::filled(4, 4, 0.0_f32);
/// suitability.set_nodata(Some(-9999.0));
/// suitability.set(1, 2, 0.75)?;
/// ```
#[derive(Debug, Clone)]
pub struct Raster<T: RasterElement> {
    data: Array2<T>,
    transform: GeoTransform,
    crs: Option<CRS>,
    nodata: Option<T>,
}

impl<T: RasterElement> Raster<T> {
    /// Zero-filled raster on the default unit transform
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::from_array(Array2::zeros((rows, cols)))
    }

    pub fn filled(rows: usize, cols: usize, value: T) -> Self {
        Self::from_array(Array2::from_elem((rows, cols), value))
    }

    /// Wrap row-major cells; `cells.len()` must equal `rows * cols`
    pub fn from_vec(cells: Vec<T>, rows: usize, cols: usize) -> Result<Self> {
        if cells.len() != rows * cols {
            return Err(Error::InvalidDimensions {
                width: cols,
                height: rows,
            });
        }
        Array2::from_shape_vec((rows, cols), cells)
            .map(Self::from_array)
            .map_err(|e| Error::Other(e.to_string()))
    }

    pub fn from_array(data: Array2<T>) -> Self {
        Self {
            data,
            transform: GeoTransform::default(),
            crs: None,
            nodata: None,
        }
    }

    pub fn rows(&self) -> usize {
        self.data.nrows()
    }

    pub fn cols(&self) -> usize {
        self.data.ncols()
    }

    /// `(rows, cols)`
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn out_of_bounds(&self, row: usize, col: usize) -> Error {
        Error::IndexOutOfBounds {
            row,
            col,
            rows: self.rows(),
            cols: self.cols(),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<T> {
        match self.data.get((row, col)) {
            Some(&v) => Ok(v),
            None => Err(self.out_of_bounds(row, col)),
        }
    }

    /// # Safety
    /// `row < rows()` and `col < cols()` must hold.
    pub unsafe fn get_unchecked(&self, row: usize, col: usize) -> T {
        unsafe { *self.data.uget((row, col)) }
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<()> {
        match self.data.get_mut((row, col)) {
            Some(cell) => {
                *cell = value;
                Ok(())
            }
            None => Err(self.out_of_bounds(row, col)),
        }
    }

    pub fn data(&self) -> &Array2<T> {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut Array2<T> {
        &mut self.data
    }

    /// Read-only view of the cells under `window`
    pub fn window(&self, window: &BlockWindow) -> Result<ArrayView2<'_, T>> {
        let (rows, cols) = self.window_span(window)?;
        Ok(self.data.slice(s![rows, cols]))
    }

    /// Overwrite the cells under `window` with `block`
    pub fn write_window(&mut self, window: &BlockWindow, block: ArrayView2<'_, T>) -> Result<()> {
        let (rows, cols) = self.window_span(window)?;
        if block.dim() != (window.rows, window.cols) {
            return Err(Error::size_mismatch((window.rows, window.cols), block.dim()));
        }
        let mut target: ArrayViewMut2<'_, T> = self.data.slice_mut(s![rows, cols]);
        target.assign(&block);
        Ok(())
    }

    fn window_span(
        &self,
        window: &BlockWindow,
    ) -> Result<(std::ops::Range<usize>, std::ops::Range<usize>)> {
        let row_end = window.row_offset + window.rows;
        let col_end = window.col_offset + window.cols;
        if row_end > self.rows() || col_end > self.cols() {
            return Err(self.out_of_bounds(row_end, col_end));
        }
        Ok((window.row_offset..row_end, window.col_offset..col_end))
    }

    pub fn transform(&self) -> &GeoTransform {
        &self.transform
    }

    pub fn set_transform(&mut self, transform: GeoTransform) {
        self.transform = transform;
    }

    pub fn crs(&self) -> Option<&CRS> {
        self.crs.as_ref()
    }

    pub fn set_crs(&mut self, crs: Option<CRS>) {
        self.crs = crs;
    }

    pub fn nodata(&self) -> Option<T> {
        self.nodata
    }

    pub fn set_nodata(&mut self, nodata: Option<T>) {
        self.nodata = nodata;
    }

    /// Footprint as `(min_x, min_y, max_x, max_y)`
    pub fn bounds(&self) -> (f64, f64, f64, f64) {
        self.transform.bounds(self.cols(), self.rows())
    }

    /// Same shape and lattice as `other`, so cells can be combined 1:1
    pub fn same_grid<U: RasterElement>(&self, other: &Raster<U>) -> bool {
        self.shape() == other.shape() && self.transform.approx_eq(other.transform())
    }

    /// Map coordinates of the centre of cell `(col, row)`
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.transform.pixel_to_geo(col, row)
    }

    /// Fractional `(col, row)` of a map coordinate
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        self.transform.geo_to_pixel(x, y)
    }

    pub fn is_nodata(&self, value: T) -> bool {
        value.is_nodata(self.nodata)
    }

    pub fn valid_mask(&self) -> Array2<bool> {
        self.data.mapv(|v| !self.is_nodata(v))
    }

    /// Valid cells in row-major order
    pub fn valid_values(&self) -> Vec<T> {
        self.data
            .iter()
            .copied()
            .filter(|&v| !self.is_nodata(v))
            .collect()
    }

    /// Extent and mean of the valid cells, as stored in catalog rows
    pub fn statistics(&self) -> RasterStatistics<T> {
        let mut summary = RasterStatistics {
            min: None,
            max: None,
            mean: None,
            valid_count: 0,
            nodata_count: 0,
        };
        let mut total = 0.0_f64;

        for v in self.data.iter().copied() {
            let numeric = match RasterElement::to_f64(v) {
                Some(x) if !self.is_nodata(v) => x,
                _ => {
                    summary.nodata_count += 1;
                    continue;
                }
            };
            summary.valid_count += 1;
            total += numeric;
            summary.min = Some(summary.min.map_or(v, |m| if v < m { v } else { m }));
            summary.max = Some(summary.max.map_or(v, |m| if v > m { v } else { m }));
        }

        if summary.valid_count > 0 {
            summary.mean = Some(total / summary.valid_count as f64);
        }
        summary
    }
}

/// Summary produced by [`Raster::statistics`]
#[derive(Debug, Clone)]
pub struct RasterStatistics<T> {
    pub min: Option<T>,
    pub max: Option<T>,
    pub mean: Option<f64>,
    pub valid_count: usize,
    pub nodata_count: usize,
}
