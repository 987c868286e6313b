//! Coordinate transforms between a reference grid and a source raster.
//!
//! Geographic CRSs (EPSG:4326, EPSG:4269) are treated as coincident. UTM
//! sources (EPSG 326xx / 327xx) are sampled from a geographic grid with the
//! forward transverse-Mercator series of Snyder (1987, USGS Prof. Paper
//! 1395, pp. 61-64).

use foresight_core::{Error, Result, CRS};

// ── Ellipsoid (GRS80 / WGS84 share a and differ in f below 1e-10) ───────

const A: f64 = 6_378_137.0;
const F: f64 = 1.0 / 298.257_223_563;
const E2: f64 = 2.0 * F - F * F;
const E_PRIME2: f64 = E2 / (1.0 - E2);
const K0: f64 = 0.9996;
const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Maps reference-grid coordinates to source-raster coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CoordinateTransform {
    Identity,
    /// Reference grid in lon/lat degrees, source in UTM metres
    GeographicToUtm { zone: u32, north: bool },
}

impl CoordinateTransform {
    /// Transform for sampling a source in `src` CRS onto a grid in `dst`.
    ///
    /// A source without a CRS is assumed to already be in the grid's CRS.
    pub fn between(src: Option<&CRS>, dst: &CRS) -> Result<Self> {
        let Some(src) = src else {
            return Ok(CoordinateTransform::Identity);
        };
        if src.is_equivalent(dst) {
            return Ok(CoordinateTransform::Identity);
        }
        if dst.is_geographic() {
            if let Some((zone, north)) = src.utm_zone() {
                return Ok(CoordinateTransform::GeographicToUtm { zone, north });
            }
        }
        Err(Error::CrsMismatch(src.identifier(), dst.identifier()))
    }

    #[inline]
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            CoordinateTransform::Identity => (x, y),
            CoordinateTransform::GeographicToUtm { zone, north } => {
                geographic_to_utm(x, y, zone, north)
            }
        }
    }
}

/// Longitude/latitude in degrees to UTM easting/northing in metres
pub fn geographic_to_utm(lon_deg: f64, lat_deg: f64, zone: u32, north: bool) -> (f64, f64) {
    let lat = lat_deg.to_radians();
    let lon = lon_deg.to_radians();
    let lon0 = ((zone as f64 - 1.0) * 6.0 - 177.0).to_radians();

    let (sin_lat, cos_lat) = lat.sin_cos();
    let tan_lat = lat.tan();

    let n = A / (1.0 - E2 * sin_lat * sin_lat).sqrt();
    let t = tan_lat * tan_lat;
    let c = E_PRIME2 * cos_lat * cos_lat;
    let a1 = cos_lat * (lon - lon0);
    let a2 = a1 * a1;
    let a4 = a2 * a2;
    let a6 = a4 * a2;

    // Snyder eq. 8-9
    let easting = K0
        * n
        * (a1
            + (1.0 - t + c) * a2 * a1 / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * E_PRIME2) * a4 * a1 / 120.0)
        + FALSE_EASTING;

    // Snyder eq. 8-10
    let northing = K0
        * (meridional_arc(lat)
            + n * tan_lat
                * (a2 / 2.0
                    + (5.0 - t + 9.0 * c + 4.0 * c * c) * a4 / 24.0
                    + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * E_PRIME2) * a6 / 720.0));

    if north {
        (easting, northing)
    } else {
        (easting, northing + FALSE_NORTHING_SOUTH)
    }
}

/// Snyder eq. 3-21
fn meridional_arc(lat: f64) -> f64 {
    let e4 = E2 * E2;
    let e6 = e4 * E2;

    A * ((1.0 - E2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * lat
        - (3.0 * E2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * lat).sin()
        + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * lat).sin()
        - (35.0 * e6 / 3072.0) * (6.0 * lat).sin())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    // pyproj: Transformer.from_crs(4326, 32721, always_xy=True)
    //   .transform(-58.3816, -34.6037) -> (373317.50, 6170036.17)
    #[test]
    fn test_buenos_aires_utm21s() {
        let (e, n) = geographic_to_utm(-58.3816, -34.6037, 21, false);
        assert_abs_diff_eq!(e, 373_317.50, epsilon = 1.0);
        assert_abs_diff_eq!(n, 6_170_036.17, epsilon = 1.0);
    }

    // Madrid, zone 30N: (440298.94, 4474257.31)
    #[test]
    fn test_madrid_utm30n() {
        let (e, n) = geographic_to_utm(-3.7037, 40.4168, 30, true);
        assert_abs_diff_eq!(e, 440_298.94, epsilon = 1.0);
        assert_abs_diff_eq!(n, 4_474_257.31, epsilon = 1.0);
    }

    #[test]
    fn test_southern_hemisphere_offset() {
        let (e, n) = geographic_to_utm(-57.0, -0.0001, 21, false);
        assert_abs_diff_eq!(e, 500_000.0, epsilon = 0.01);
        assert!(n < FALSE_NORTHING_SOUTH && n > FALSE_NORTHING_SOUTH - 20.0);
    }

    #[test]
    fn test_between() {
        let nad83 = CRS::nad83();
        assert_eq!(
            CoordinateTransform::between(Some(&CRS::wgs84()), &nad83).unwrap(),
            CoordinateTransform::Identity
        );
        assert_eq!(
            CoordinateTransform::between(None, &nad83).unwrap(),
            CoordinateTransform::Identity
        );
        assert_eq!(
            CoordinateTransform::between(Some(&CRS::from_epsg(32611)), &nad83).unwrap(),
            CoordinateTransform::GeographicToUtm { zone: 11, north: true }
        );
        assert!(matches!(
            CoordinateTransform::between(Some(&CRS::from_epsg(3857)), &nad83),
            Err(Error::CrsMismatch(_, _))
        ));
    }
}
