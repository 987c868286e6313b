//! Average downsampling
//!
//! Large layers are summarized from a reduced working array instead of
//! every pixel. The raster is shrunk by an integer factor
//! `f = max(1, ⌊√(W·H / target)⌋)`, each output cell holding the mean of the
//! valid source cells in its footprint.

use crate::maybe_rayon::*;
use foresight_core::Raster;

/// Default number of pixels statistics are computed from
pub const DEFAULT_SAMPLE_SIZE: usize = 10_000_000;

/// Integer shrink factor that brings `rows * cols` close to `target` pixels
pub fn downsample_factor(rows: usize, cols: usize, target: usize) -> usize {
    if target == 0 {
        return 1;
    }
    let ratio = (rows as f64 * cols as f64) / target as f64;
    (ratio.sqrt().floor() as usize).max(1)
}

/// Downsample by `factor` with average resampling and return the valid
/// output values in row-major order.
///
/// Nodata and non-finite source cells are excluded from each average;
/// output cells with no valid source cell are dropped.
pub fn downsample_average(raster: &Raster<f32>, factor: usize) -> Vec<f32> {
    let (rows, cols) = raster.shape();
    if rows == 0 || cols == 0 {
        return Vec::new();
    }
    if factor <= 1 {
        return raster.valid_values();
    }

    let out_rows = (rows / factor).max(1);
    let out_cols = (cols / factor).max(1);

    // Output cell i covers source rows [i*rows/out_rows, (i+1)*rows/out_rows)
    let span = |i: usize, total: usize, out: usize| (i * total / out, (i + 1) * total / out);

    (0..out_rows)
        .into_par_iter()
        .flat_map(|orow| {
            let (r0, r1) = span(orow, rows, out_rows);
            let mut row_values = Vec::with_capacity(out_cols);
            for ocol in 0..out_cols {
                let (c0, c1) = span(ocol, cols, out_cols);
                let mut sum = 0.0_f64;
                let mut count = 0_usize;
                for r in r0..r1 {
                    for c in c0..c1 {
                        let v = unsafe { raster.get_unchecked(r, c) };
                        if raster.is_nodata(v) {
                            continue;
                        }
                        sum += v as f64;
                        count += 1;
                    }
                }
                if count > 0 {
                    row_values.push((sum / count as f64) as f32);
                }
            }
            row_values
        })
        .collect()
}
