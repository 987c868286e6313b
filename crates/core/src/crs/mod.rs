//! Coordinate reference systems, identified by EPSG code

use serde::{Deserialize, Serialize};
use std::fmt;

/// EPSG code of the CRS every run aligns to (NAD83 geographic)
pub const REFERENCE_EPSG: u32 = 4269;

const WGS84_EPSG: u32 = 4326;

/// A CRS as recorded in GeoTIFF geokeys.
///
/// A CRS with no EPSG code is never equivalent to anything.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CRS {
    epsg: Option<u32>,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self { epsg: Some(code) }
    }

    pub fn wgs84() -> Self {
        Self::from_epsg(WGS84_EPSG)
    }

    /// The reference CRS of the alignment stage
    pub fn nad83() -> Self {
        Self::from_epsg(REFERENCE_EPSG)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Lon/lat in degrees. WGS84 and NAD83 are within a couple of metres of
    /// each other, far below a 100 m cell.
    pub fn is_geographic(&self) -> bool {
        matches!(self.epsg, Some(WGS84_EPSG) | Some(REFERENCE_EPSG))
    }

    /// `(zone, northern)` for WGS84 UTM codes 326xx / 327xx
    pub fn utm_zone(&self) -> Option<(u32, bool)> {
        let code = self.epsg?;
        let (zone, north) = match code / 100 {
            326 => (code % 100, true),
            327 => (code % 100, false),
            _ => return None,
        };
        (1..=60).contains(&zone).then_some((zone, north))
    }

    /// Whether cells in one CRS can be used unchanged in the other
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b || (self.is_geographic() && other.is_geographic()),
            _ => false,
        }
    }

    pub fn identifier(&self) -> String {
        self.epsg
            .map_or_else(|| "EPSG:unknown".to_string(), |code| format!("EPSG:{code}"))
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::nad83()
    }
}
