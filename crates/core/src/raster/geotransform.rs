//! Pixel/map coordinate mapping

use serde::{Deserialize, Serialize};

/// Relative tolerance when deciding two lattices coincide
const GRID_EPSILON: f64 = 1e-9;

/// Affine mapping from `(col, row)` to map coordinates.
///
/// ```text
/// x = origin_x + col * pixel_width  + row * row_rotation
/// y = origin_y + col * col_rotation + row * pixel_height
/// ```
///
/// Grids produced by the aligner are always north-up: both rotations are
/// zero and `pixel_height` is negative.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoTransform {
    pub origin_x: f64,
    pub origin_y: f64,
    pub pixel_width: f64,
    pub pixel_height: f64,
    pub row_rotation: f64,
    pub col_rotation: f64,
}

impl GeoTransform {
    /// North-up transform anchored at the upper-left corner
    pub fn new(origin_x: f64, origin_y: f64, pixel_width: f64, pixel_height: f64) -> Self {
        Self {
            origin_x,
            origin_y,
            pixel_width,
            pixel_height,
            row_rotation: 0.0,
            col_rotation: 0.0,
        }
    }

    /// Coefficients in GeoTIFF/GDAL order
    pub fn to_gdal(&self) -> [f64; 6] {
        [
            self.origin_x,
            self.pixel_width,
            self.row_rotation,
            self.origin_y,
            self.col_rotation,
            self.pixel_height,
        ]
    }

    /// Centre of cell `(col, row)`
    pub fn pixel_to_geo(&self, col: usize, row: usize) -> (f64, f64) {
        self.fractional_to_geo(col as f64 + 0.5, row as f64 + 0.5)
    }

    pub fn fractional_to_geo(&self, col: f64, row: f64) -> (f64, f64) {
        (
            self.origin_x + col * self.pixel_width + row * self.row_rotation,
            self.origin_y + col * self.col_rotation + row * self.pixel_height,
        )
    }

    /// Inverse mapping. Yields fractional indices, NaN for a degenerate
    /// transform.
    pub fn geo_to_pixel(&self, x: f64, y: f64) -> (f64, f64) {
        let det = self.pixel_width * self.pixel_height - self.row_rotation * self.col_rotation;
        if det.abs() < 1e-15 {
            return (f64::NAN, f64::NAN);
        }
        let (dx, dy) = (x - self.origin_x, y - self.origin_y);
        (
            (self.pixel_height * dx - self.row_rotation * dy) / det,
            (self.pixel_width * dy - self.col_rotation * dx) / det,
        )
    }

    /// Absolute cell size as `(x, y)`
    pub fn resolution(&self) -> (f64, f64) {
        (self.pixel_width.abs(), self.pixel_height.abs())
    }

    pub fn is_north_up(&self) -> bool {
        self.row_rotation == 0.0 && self.col_rotation == 0.0 && self.pixel_height < 0.0
    }

    /// Whether both transforms put cell edges at the same map positions
    pub fn approx_eq(&self, other: &GeoTransform) -> bool {
        let scale = self.pixel_width.abs().max(self.pixel_height.abs()).max(1.0);
        self.to_gdal()
            .into_iter()
            .zip(other.to_gdal())
            .all(|(a, b)| (a - b).abs() <= GRID_EPSILON * scale.max(a.abs()))
    }

    /// Envelope `(min_x, min_y, max_x, max_y)` of a `width` x `height` grid
    pub fn bounds(&self, width: usize, height: usize) -> (f64, f64, f64, f64) {
        let (w, h) = (width as f64, height as f64);
        [(0.0, 0.0), (w, 0.0), (0.0, h), (w, h)]
            .into_iter()
            .map(|(c, r)| self.fractional_to_geo(c, r))
            .fold(
                (f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
                |(x0, y0, x1, y1), (x, y)| (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
            )
    }
}

impl Default for GeoTransform {
    fn default() -> Self {
        Self::new(0.0, 0.0, 1.0, -1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cell_centre_inverts() {
        // ~100 m cells over the Oregon Cascades
        let gt = GeoTransform::new(-122.5, 44.9, 0.0008983, -0.0008983);
        let (x, y) = gt.pixel_to_geo(12, 3);
        assert!(x > -122.5 && y < 44.9);

        let (col, row) = gt.geo_to_pixel(x, y);
        assert_relative_eq!(col, 12.5, epsilon = 1e-6);
        assert_relative_eq!(row, 3.5, epsilon = 1e-6);
    }

    #[test]
    fn test_degenerate_transform_is_nan() {
        let gt = GeoTransform::new(0.0, 0.0, 0.0, -1.0);
        assert!(gt.geo_to_pixel(1.0, 1.0).0.is_nan());
    }

    #[test]
    fn test_envelope_of_planning_area_grid() {
        let gt = GeoTransform::new(-121.0, 45.0, 0.25, -0.5);
        let (min_x, min_y, max_x, max_y) = gt.bounds(4, 2);
        assert_relative_eq!(min_x, -121.0);
        assert_relative_eq!(max_x, -120.0);
        assert_relative_eq!(min_y, 44.0);
        assert_relative_eq!(max_y, 45.0);
        assert_eq!(gt.resolution(), (0.25, 0.5));
        assert!(gt.is_north_up());
    }

    #[test]
    fn test_half_cell_shift_is_a_different_lattice() {
        let a = GeoTransform::new(-122.0, 44.0, 0.001, -0.001);
        assert!(a.approx_eq(&a));

        let shifted = GeoTransform {
            origin_y: a.origin_y + 0.0005,
            ..a
        };
        assert!(!a.approx_eq(&shifted));
    }
}
