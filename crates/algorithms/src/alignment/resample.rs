//! Resampling a source raster onto a reference grid

use super::reproject::CoordinateTransform;
use crate::maybe_rayon::*;
use foresight_core::{Raster, ReferenceGrid, Result};
use serde::{Deserialize, Serialize};

/// Resampling kernel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Resampling {
    /// Value of the source cell containing the target centre (categorical layers)
    Nearest,
    /// Distance-weighted mean of the four surrounding source centres
    #[default]
    Bilinear,
    /// Mean of the source cells whose centres fall in the target cell
    Average,
}

/// Resample `src` onto `grid`.
///
/// The output has exactly the grid's shape, transform, CRS and nodata.
/// Target cells whose centre falls outside the source footprint, or whose
/// kernel sees no valid source cell, are nodata.
pub fn resample_to_grid(
    src: &Raster<f32>,
    grid: &ReferenceGrid,
    method: Resampling,
) -> Result<Raster<f32>> {
    let transform = CoordinateTransform::between(src.crs(), &grid.crs)?;
    let (height, width) = grid.shape();
    let nodata = grid.nodata;
    let sampler = Sampler { src, transform };

    let data: Vec<f32> = (0..height)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![nodata; width];
            for (col, cell) in row_data.iter_mut().enumerate() {
                let value = match method {
                    Resampling::Nearest => sampler.nearest(grid, col, row),
                    Resampling::Bilinear => sampler.bilinear(grid, col, row),
                    Resampling::Average => sampler
                        .average(grid, col, row)
                        .or_else(|| sampler.bilinear(grid, col, row)),
                };
                if let Some(v) = value {
                    *cell = v;
                }
            }
            row_data
        })
        .collect();

    let mut out = Raster::from_vec(data, height, width)?;
    grid.stamp(&mut out);
    Ok(out)
}

struct Sampler<'a> {
    src: &'a Raster<f32>,
    transform: CoordinateTransform,
}

impl Sampler<'_> {
    /// Fractional source pixel coordinates of a grid location
    fn source_pixel(&self, grid: &ReferenceGrid, col: f64, row: f64) -> (f64, f64) {
        let (x, y) = grid.transform.fractional_to_geo(col, row);
        let (sx, sy) = self.transform.apply(x, y);
        self.src.geo_to_pixel(sx, sy)
    }

    fn inside(&self, px: f64, py: f64) -> bool {
        let (rows, cols) = self.src.shape();
        px >= 0.0 && py >= 0.0 && px < cols as f64 && py < rows as f64
    }

    fn valid_at(&self, row: usize, col: usize) -> Option<f32> {
        let v = unsafe { self.src.get_unchecked(row, col) };
        if self.src.is_nodata(v) {
            None
        } else {
            Some(v)
        }
    }

    fn nearest(&self, grid: &ReferenceGrid, col: usize, row: usize) -> Option<f32> {
        let (px, py) = self.source_pixel(grid, col as f64 + 0.5, row as f64 + 0.5);
        if !self.inside(px, py) {
            return None;
        }
        self.valid_at(py.floor() as usize, px.floor() as usize)
    }

    fn bilinear(&self, grid: &ReferenceGrid, col: usize, row: usize) -> Option<f32> {
        let (px, py) = self.source_pixel(grid, col as f64 + 0.5, row as f64 + 0.5);
        if !self.inside(px, py) {
            return None;
        }
        let (rows, cols) = self.src.shape();

        // Offsets relative to source cell centres
        let u = px - 0.5;
        let v = py - 0.5;
        let c0 = u.floor();
        let r0 = v.floor();
        let fu = u - c0;
        let fv = v - r0;

        let clamp_idx = |i: f64, n: usize| i.max(0.0).min((n - 1) as f64) as usize;
        let ca = clamp_idx(c0, cols);
        let cb = clamp_idx(c0 + 1.0, cols);
        let ra = clamp_idx(r0, rows);
        let rb = clamp_idx(r0 + 1.0, rows);

        let taps = [
            (ra, ca, (1.0 - fu) * (1.0 - fv)),
            (ra, cb, fu * (1.0 - fv)),
            (rb, ca, (1.0 - fu) * fv),
            (rb, cb, fu * fv),
        ];

        let mut sum = 0.0_f64;
        let mut weight = 0.0_f64;
        for (r, c, w) in taps {
            if w <= 0.0 {
                continue;
            }
            if let Some(value) = self.valid_at(r, c) {
                sum += w * value as f64;
                weight += w;
            }
        }

        if weight > 0.0 {
            Some((sum / weight) as f32)
        } else {
            None
        }
    }

    fn average(&self, grid: &ReferenceGrid, col: usize, row: usize) -> Option<f32> {
        let (rows, cols) = self.src.shape();
        let (c, r) = (col as f64, row as f64);
        let corners = [
            self.source_pixel(grid, c, r),
            self.source_pixel(grid, c + 1.0, r),
            self.source_pixel(grid, c, r + 1.0),
            self.source_pixel(grid, c + 1.0, r + 1.0),
        ];
        let (min_px, max_px) = corners
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(px, _)| (lo.min(px), hi.max(px)));
        let (min_py, max_py) = corners
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, py)| (lo.min(py), hi.max(py)));
        if !(min_px.is_finite() && max_px.is_finite() && min_py.is_finite() && max_py.is_finite()) {
            return None;
        }

        // Source cells whose centre lies in [min, max)
        let c_start = (min_px - 0.5).ceil().max(0.0) as usize;
        let c_end = ((max_px - 0.5).ceil().max(0.0) as usize).min(cols);
        let r_start = (min_py - 0.5).ceil().max(0.0) as usize;
        let r_end = ((max_py - 0.5).ceil().max(0.0) as usize).min(rows);

        let mut sum = 0.0_f64;
        let mut count = 0_usize;
        for r in r_start..r_end {
            for c in c_start..c_end {
                if let Some(v) = self.valid_at(r, c) {
                    sum += v as f64;
                    count += 1;
                }
            }
        }
        if count > 0 {
            Some((sum / count as f64) as f32)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use foresight_core::{GeoTransform, CRS};

    fn source() -> Raster<f32> {
        // 4x4, 1-unit cells, origin (0, 4), value = col
        let data: Vec<f32> = (0..16).map(|i| (i % 4) as f32).collect();
        let mut r = Raster::from_vec(data, 4, 4).unwrap();
        r.set_transform(GeoTransform::new(0.0, 4.0, 1.0, -1.0));
        r.set_crs(Some(CRS::nad83()));
        r.set_nodata(Some(-9999.0));
        r
    }

    fn grid(origin_x: f64, origin_y: f64, res: f64, w: usize, h: usize) -> ReferenceGrid {
        ReferenceGrid::new(
            GeoTransform::new(origin_x, origin_y, res, -res),
            w,
            h,
            -9999.0,
            CRS::nad83(),
        )
    }

    #[test]
    fn test_identity_grid_is_copy() {
        let src = source();
        let g = grid(0.0, 4.0, 1.0, 4, 4);
        for method in [Resampling::Nearest, Resampling::Bilinear, Resampling::Average] {
            let out = resample_to_grid(&src, &g, method).unwrap();
            assert!(g.matches(&out));
            assert_eq!(out.data(), src.data());
        }
    }

    #[test]
    fn test_bilinear_half_cell_shift() {
        let src = source();
        let g = grid(0.5, 4.0, 1.0, 3, 4);
        let out = resample_to_grid(&src, &g, Resampling::Bilinear).unwrap();
        assert_relative_eq!(out.get(1, 0).unwrap(), 0.5);
        assert_relative_eq!(out.get(1, 2).unwrap(), 2.5);
    }

    #[test]
    fn test_outside_footprint_is_nodata() {
        let src = source();
        let g = grid(-2.0, 4.0, 1.0, 8, 4);
        let out = resample_to_grid(&src, &g, Resampling::Bilinear).unwrap();
        assert_eq!(out.get(0, 0).unwrap(), -9999.0);
        assert_eq!(out.get(0, 7).unwrap(), -9999.0);
        assert_relative_eq!(out.get(0, 2).unwrap(), 0.0);
    }

    #[test]
    fn test_bilinear_skips_nodata_neighbours() {
        let mut src = source();
        src.set(1, 1, -9999.0).unwrap();
        let g = grid(0.5, 3.5, 1.0, 1, 1);
        // Centre at (1.0, 3.0) sits between cells (0,0),(0,1),(1,0),(1,1)
        let out = resample_to_grid(&src, &g, Resampling::Bilinear).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 1.0 / 3.0, epsilon = 1e-6);
    }

    #[test]
    fn test_average_downsample() {
        let src = source();
        let g = grid(0.0, 4.0, 2.0, 2, 2);
        let out = resample_to_grid(&src, &g, Resampling::Average).unwrap();
        assert_relative_eq!(out.get(0, 0).unwrap(), 0.5);
        assert_relative_eq!(out.get(1, 1).unwrap(), 2.5);
    }

    #[test]
    fn test_utm_source_onto_geographic_grid() {
        // 10 km UTM zone 13N tile around its central meridian, value = row
        let (e, n) = crate::alignment::reproject::geographic_to_utm(-105.0, 40.0, 13, true);
        let data: Vec<f32> = (0..100).map(|i| (i / 10) as f32).collect();
        let mut src = Raster::from_vec(data, 10, 10).unwrap();
        src.set_transform(GeoTransform::new(e - 5_000.0, n + 5_000.0, 1_000.0, -1_000.0));
        src.set_crs(Some(CRS::from_epsg(32613)));
        src.set_nodata(Some(-9999.0));

        let g = grid(-105.01, 40.01, 0.01, 2, 2);
        let out = resample_to_grid(&src, &g, Resampling::Nearest).unwrap();
        for &v in out.data().iter() {
            assert!(v != -9999.0);
        }
        // North is up in both grids
        assert!(out.get(0, 0).unwrap() < out.get(1, 0).unwrap());
    }
}
