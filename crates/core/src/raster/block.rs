//! Block windows for streamed raster processing

/// A rectangular window covering a subset of a raster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockWindow {
    /// Row offset in the source raster
    pub row_offset: usize,
    /// Column offset in the source raster
    pub col_offset: usize,
    /// Number of rows in this window
    pub rows: usize,
    /// Number of columns in this window
    pub cols: usize,
}

impl BlockWindow {
    pub fn new(row_offset: usize, col_offset: usize, rows: usize, cols: usize) -> Self {
        Self {
            row_offset,
            col_offset,
            rows,
            cols,
        }
    }

    /// Number of cells in the window
    pub fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Convert window-local coordinates to source raster coordinates
    pub fn to_source_coords(&self, local_row: usize, local_col: usize) -> (usize, usize) {
        (self.row_offset + local_row, self.col_offset + local_col)
    }
}

/// Iterator over non-overlapping windows covering a raster, row-major.
///
/// Edge windows are truncated to the raster extent.
#[derive(Debug, Clone)]
pub struct BlockWindows {
    total_rows: usize,
    total_cols: usize,
    block_size: usize,
    current_row: usize,
    current_col: usize,
}

impl BlockWindows {
    pub fn new(total_rows: usize, total_cols: usize, block_size: usize) -> Self {
        Self {
            total_rows,
            total_cols,
            block_size: block_size.max(1),
            current_row: 0,
            current_col: 0,
        }
    }
}

impl Iterator for BlockWindows {
    type Item = BlockWindow;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current_row >= self.total_rows || self.total_cols == 0 {
            return None;
        }

        let rows = self.block_size.min(self.total_rows - self.current_row);
        let cols = self.block_size.min(self.total_cols - self.current_col);
        let window = BlockWindow::new(self.current_row, self.current_col, rows, cols);

        self.current_col += self.block_size;
        if self.current_col >= self.total_cols {
            self.current_col = 0;
            self.current_row += self.block_size;
        }

        Some(window)
    }
}
