//! Block-parallel evaluation of per-pixel kernels
//!
//! Every stage streams its math through square block windows. Blocks are
//! evaluated on the rayon pool, the cancellation flag is checked before
//! each one, and the finished blocks are stitched into the output array.

use crate::maybe_rayon::*;
use foresight_core::{BlockWindow, BlockWindows, CancelFlag, RasterElement, Result};
use ndarray::{s, Array2};

/// Evaluate `kernel` on every block of a `(rows, cols)` grid and return the
/// per-block results with their windows.
///
/// Fails with `Cancelled` as soon as the flag is raised.
pub(crate) fn evaluate_blocks<B, F>(
    shape: (usize, usize),
    block_size: usize,
    cancel: &CancelFlag,
    kernel: F,
) -> Result<Vec<(BlockWindow, B)>>
where
    B: Send,
    F: Fn(&BlockWindow) -> Result<B> + Sync + Send,
{
    let (rows, cols) = shape;
    let windows: Vec<BlockWindow> = BlockWindows::new(rows, cols, block_size).collect();

    let blocks = windows
        .into_par_iter()
        .map(|window| {
            cancel.check()?;
            let block = kernel(&window)?;
            Ok((window, block))
        })
        .collect::<Result<Vec<_>>>()?;

    cancel.check()?;
    Ok(blocks)
}

/// Copy one block's values into a full-size array
pub(crate) fn stitch<T: RasterElement>(out: &mut Array2<T>, window: &BlockWindow, block: &Array2<T>) {
    out.slice_mut(s![
        window.row_offset..window.row_offset + window.rows,
        window.col_offset..window.col_offset + window.cols
    ])
    .assign(block);
}

/// Evaluate `kernel` on every block of a `(rows, cols)` grid.
///
/// The kernel returns the block's output values with shape
/// `(window.rows, window.cols)`. No partially filled array is returned on
/// cancellation.
pub(crate) fn map_blocks<T, F>(
    shape: (usize, usize),
    block_size: usize,
    cancel: &CancelFlag,
    kernel: F,
) -> Result<Array2<T>>
where
    T: RasterElement,
    F: Fn(&BlockWindow) -> Result<Array2<T>> + Sync + Send,
{
    let blocks = evaluate_blocks(shape, block_size, cancel, kernel)?;
    let mut out = Array2::zeros(shape);
    for (window, block) in &blocks {
        stitch(&mut out, window, block);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_core::Error;

    #[test]
    fn test_blocks_cover_grid() {
        let cancel = CancelFlag::new();
        let out = map_blocks::<f32, _>((5, 7), 2, &cancel, |w| {
            Ok(Array2::from_shape_fn((w.rows, w.cols), |(r, c)| {
                let (sr, sc) = w.to_source_coords(r, c);
                (sr * 7 + sc) as f32
            }))
        })
        .unwrap();

        for ((r, c), &v) in out.indexed_iter() {
            assert_eq!(v, (r * 7 + c) as f32);
        }
    }

    #[test]
    fn test_cancelled_before_start() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let res = map_blocks::<f32, _>((4, 4), 2, &cancel, |w| Ok(Array2::zeros((w.rows, w.cols))));
        assert!(matches!(res, Err(Error::Cancelled)));
    }
}
