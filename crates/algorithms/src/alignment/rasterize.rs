//! Planning-area polygon to grid mask

use crate::maybe_rayon::*;
use foresight_core::{PlanningArea, ReferenceGrid};
use ndarray::Array2;

/// Boolean mask on `grid` that is `true` where the cell centre lies inside
/// the planning area.
///
/// Rows are filled with an even-odd scanline over every ring, so holes and
/// disjoint polygons are honoured. Rotated grids fall back to a per-cell
/// point-in-polygon test.
pub fn rasterize_mask(area: &PlanningArea, grid: &ReferenceGrid) -> Array2<bool> {
    let (height, width) = grid.shape();
    let gt = grid.transform;

    if !gt.is_north_up() || gt.pixel_width <= 0.0 {
        return Array2::from_shape_fn((height, width), |(r, c)| {
            let (x, y) = gt.pixel_to_geo(c, r);
            area.contains(x, y)
        });
    }

    let edges: Vec<((f64, f64), (f64, f64))> = area
        .rings()
        .flat_map(|ring| ring.lines().map(|l| ((l.start.x, l.start.y), (l.end.x, l.end.y))))
        .collect();

    let data: Vec<bool> = (0..height)
        .into_par_iter()
        .flat_map(|row| {
            let mut row_data = vec![false; width];
            let (_, y) = gt.pixel_to_geo(0, row);

            let mut crossings: Vec<f64> = edges
                .iter()
                .filter(|((_, y1), (_, y2))| (*y1 > y) != (*y2 > y))
                .map(|&((x1, y1), (x2, y2))| x1 + (y - y1) * (x2 - x1) / (y2 - y1))
                .collect();
            crossings.sort_unstable_by(|a, b| a.total_cmp(b));

            // First column whose centre is at or right of x
            let first_col = |x: f64| {
                let c = ((x - gt.origin_x) / gt.pixel_width - 0.5).ceil();
                c.clamp(0.0, width as f64) as usize
            };

            for pair in crossings.chunks_exact(2) {
                let start = first_col(pair[0]);
                let end = first_col(pair[1]);
                for cell in &mut row_data[start..end.max(start)] {
                    *cell = true;
                }
            }
            row_data
        })
        .collect();

    Array2::from_shape_vec((height, width), data).unwrap_or_else(|_| Array2::from_elem((height, width), false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use foresight_core::{GeoTransform, CRS};
    use geo_types::{polygon, MultiPolygon};

    fn grid() -> ReferenceGrid {
        ReferenceGrid::new(GeoTransform::new(0.0, 10.0, 1.0, -1.0), 10, 10, -9999.0, CRS::nad83())
    }

    #[test]
    fn test_rect_covers_centres() {
        let area = PlanningArea::from_rect(2.0, 2.0, 6.0, 8.0, CRS::nad83());
        let mask = rasterize_mask(&area, &grid());
        let count = mask.iter().filter(|&&m| m).count();
        assert_eq!(count, 4 * 6);
        assert!(mask[[2, 2]]);
        assert!(!mask[[2, 1]]);
        assert!(!mask[[1, 2]]);
        assert!(mask[[7, 5]]);
        assert!(!mask[[8, 5]]);
    }

    #[test]
    fn test_hole_excluded() {
        let poly = polygon!(
            exterior: [(x: 0.0, y: 0.0), (x: 10.0, y: 0.0), (x: 10.0, y: 10.0), (x: 0.0, y: 10.0)],
            interiors: [[(x: 4.0, y: 4.0), (x: 6.0, y: 4.0), (x: 6.0, y: 6.0), (x: 4.0, y: 6.0)]],
        );
        let area = PlanningArea::new(MultiPolygon(vec![poly]), CRS::nad83());
        let mask = rasterize_mask(&area, &grid());
        assert_eq!(mask.iter().filter(|&&m| m).count(), 100 - 4);
        assert!(!mask[[4, 4]]);
        assert!(!mask[[5, 5]]);
        assert!(mask[[3, 4]]);
    }

    #[test]
    fn test_triangle_matches_point_in_polygon() {
        let poly = polygon![(x: 0.3, y: 0.2), (x: 9.7, y: 1.1), (x: 4.2, y: 9.6)];
        let area = PlanningArea::from_polygon(poly, CRS::nad83());
        let g = grid();
        let mask = rasterize_mask(&area, &g);
        for ((r, c), &m) in mask.indexed_iter() {
            let (x, y) = g.transform.pixel_to_geo(c, r);
            assert_eq!(m, area.contains(x, y), "cell ({}, {})", r, c);
        }
    }
}
