//! Planning-area geometry

use geo::{BoundingRect, Contains};
use geo_types::{Coord, LineString, MultiPolygon, Point, Polygon};
use serde::{Deserialize, Serialize};

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::raster::ReferenceGrid;

/// The polygonal area a run is planned over.
///
/// Serialized as `{"crs": <epsg>, "polygons": [[[[x, y], ...], <holes>...], ...]}`:
/// one entry per polygon, the first ring is the exterior, later rings are holes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "PlanningAreaDoc", into = "PlanningAreaDoc")]
pub struct PlanningArea {
    geometry: MultiPolygon<f64>,
    crs: CRS,
}

impl PlanningArea {
    pub fn new(geometry: MultiPolygon<f64>, crs: CRS) -> Self {
        Self { geometry, crs }
    }

    /// A planning area made of a single polygon
    pub fn from_polygon(polygon: Polygon<f64>, crs: CRS) -> Self {
        Self::new(MultiPolygon::new(vec![polygon]), crs)
    }

    /// Axis-aligned rectangle, mostly useful for tests and whole-extent runs
    pub fn from_rect(min_x: f64, min_y: f64, max_x: f64, max_y: f64, crs: CRS) -> Self {
        let ring = LineString::from(vec![
            (min_x, min_y),
            (max_x, min_y),
            (max_x, max_y),
            (min_x, max_y),
            (min_x, min_y),
        ]);
        Self::from_polygon(Polygon::new(ring, vec![]), crs)
    }

    pub fn geometry(&self) -> &MultiPolygon<f64> {
        &self.geometry
    }

    pub fn crs(&self) -> &CRS {
        &self.crs
    }

    /// Bounding box (min_x, min_y, max_x, max_y), `None` for empty geometry
    pub fn bounds(&self) -> Option<(f64, f64, f64, f64)> {
        self.geometry
            .bounding_rect()
            .map(|r| (r.min().x, r.min().y, r.max().x, r.max().y))
    }

    /// Whether a point lies strictly inside the area
    pub fn contains(&self, x: f64, y: f64) -> bool {
        self.geometry.contains(&Point::new(x, y))
    }

    /// All rings (exteriors and holes) as closed coordinate sequences
    pub fn rings(&self) -> impl Iterator<Item = &LineString<f64>> {
        self.geometry
            .0
            .iter()
            .flat_map(|p| std::iter::once(p.exterior()).chain(p.interiors().iter()))
    }

    /// Derive the run's reference grid from the area's extent
    pub fn reference_grid(&self, resolution: f64, nodata: f32) -> Result<ReferenceGrid> {
        let bounds = self.bounds().ok_or_else(|| Error::InvalidParameter {
            name: "planning_area",
            value: "<empty>".into(),
            reason: "geometry has no extent".into(),
        })?;
        ReferenceGrid::from_extent(bounds, resolution, nodata, self.crs.clone())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct PlanningAreaDoc {
    crs: u32,
    polygons: Vec<Vec<Vec<[f64; 2]>>>,
}

impl TryFrom<PlanningAreaDoc> for PlanningArea {
    type Error = Error;

    fn try_from(doc: PlanningAreaDoc) -> Result<Self> {
        let mut polygons = Vec::with_capacity(doc.polygons.len());
        for rings in doc.polygons {
            let mut rings = rings.into_iter().map(|ring| {
                LineString::new(ring.into_iter().map(|[x, y]| Coord { x, y }).collect())
            });
            let exterior = rings.next().ok_or_else(|| Error::InvalidParameter {
                name: "polygons",
                value: "[]".into(),
                reason: "polygon without exterior ring".into(),
            })?;
            if exterior.0.len() < 3 {
                return Err(Error::InvalidParameter {
                    name: "polygons",
                    value: format!("{} vertices", exterior.0.len()),
                    reason: "exterior ring needs at least 3 vertices".into(),
                });
            }
            polygons.push(Polygon::new(exterior, rings.collect()));
        }
        Ok(Self::new(MultiPolygon::new(polygons), CRS::from_epsg(doc.crs)))
    }
}

impl From<PlanningArea> for PlanningAreaDoc {
    fn from(area: PlanningArea) -> Self {
        let to_ring = |ls: &LineString<f64>| ls.0.iter().map(|c| [c.x, c.y]).collect::<Vec<_>>();
        Self {
            crs: area.crs.epsg().unwrap_or(crate::crs::REFERENCE_EPSG),
            polygons: area
                .geometry
                .0
                .iter()
                .map(|p| {
                    std::iter::once(to_ring(p.exterior()))
                        .chain(p.interiors().iter().map(to_ring))
                        .collect()
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_bounds_and_contains() {
        let area = PlanningArea::from_rect(-121.0, 44.0, -120.0, 45.0, CRS::nad83());
        assert_eq!(area.bounds(), Some((-121.0, 44.0, -120.0, 45.0)));
        assert!(area.contains(-120.5, 44.5));
        assert!(!area.contains(-119.5, 44.5));
    }

    #[test]
    fn test_json_with_hole() {
        let json = r#"{
            "crs": 4269,
            "polygons": [[
                [[0,0],[10,0],[10,10],[0,10],[0,0]],
                [[4,4],[6,4],[6,6],[4,6],[4,4]]
            ]]
        }"#;
        let area: PlanningArea = serde_json::from_str(json).unwrap();
        assert_eq!(area.crs().epsg(), Some(4269));
        assert!(area.contains(2.0, 2.0));
        assert!(!area.contains(5.0, 5.0));
        assert_eq!(area.rings().count(), 2);

        let back = serde_json::to_string(&area).unwrap();
        let again: PlanningArea = serde_json::from_str(&back).unwrap();
        assert_eq!(again, area);
    }

    #[test]
    fn test_rejects_degenerate_ring() {
        let json = r#"{"crs": 4269, "polygons": [[[[0,0],[1,1]]]]}"#;
        assert!(serde_json::from_str::<PlanningArea>(json).is_err());
    }

    #[test]
    fn test_reference_grid() {
        let area = PlanningArea::from_rect(0.0, 0.0, 2.0, 1.0, CRS::nad83());
        let grid = area.reference_grid(0.5, -9999.0).unwrap();
        assert_eq!(grid.shape(), (2, 4));
    }
}
