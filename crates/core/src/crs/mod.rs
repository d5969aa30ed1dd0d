//! Coordinate reference systems of grids and pipeline geometry
//!
//! A CRS is identified by its EPSG code, or failing that by WKT text.
//! Reprojection is only available between EPSG systems listed in
//! [`CoordinateTransform`].

mod reproject;

pub use reproject::CoordinateTransform;

use crate::error::{Error, Result};
use reproject::parse_utm_epsg;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Approximate ground length of one degree of latitude, in metres
pub const METRES_PER_DEGREE: f64 = 111_320.0;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CRS {
    epsg: Option<u32>,
    wkt: Option<String>,
}

impl CRS {
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            wkt: None,
        }
    }

    /// A CRS known only by its WKT definition; never reprojectable
    pub fn from_wkt(wkt: impl Into<String>) -> Self {
        Self {
            epsg: None,
            wkt: Some(wkt.into()),
        }
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// WGS84 / UTM zone `zone` (EPSG:326xx north, 327xx south)
    pub fn utm(zone: u32, north: bool) -> Result<Self> {
        if !(1..=60).contains(&zone) {
            return Err(Error::InvalidParameter {
                name: "zone",
                value: zone.to_string(),
                reason: "UTM zones are numbered 1 to 60".into(),
            });
        }
        Ok(Self::from_epsg(if north { 32600 } else { 32700 } + zone))
    }

    /// The UTM zone containing `(lon, lat)` in degrees.
    ///
    /// Zones follow the regular 6° grid; the Norway and Svalbard
    /// exceptions are not applied.
    pub fn utm_for(lon: f64, lat: f64) -> Result<Self> {
        if !(lon.is_finite() && lat.is_finite() && (-90.0..=90.0).contains(&lat)) {
            return Err(Error::InvalidParameter {
                name: "lon/lat",
                value: format!("({lon}, {lat})"),
                reason: "not a geographic position".into(),
            });
        }
        let wrapped = (lon + 180.0).rem_euclid(360.0);
        let zone = ((wrapped / 6.0).floor() as u32).min(59) + 1;
        Self::utm(zone, lat >= 0.0)
    }

    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    pub fn wkt(&self) -> Option<&str> {
        self.wkt.as_deref()
    }

    /// Whether coordinates are longitude/latitude degrees rather than planar units
    pub fn is_geographic(&self) -> bool {
        self.epsg == Some(4326)
    }

    /// `(zone, north)` when this is a WGS84 / UTM system
    pub fn utm_zone(&self) -> Option<(u32, bool)> {
        self.epsg.and_then(parse_utm_epsg)
    }

    /// Same system: equal EPSG codes, else identical WKT
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            _ => matches!((&self.wkt, &other.wkt), (Some(a), Some(b)) if a == b),
        }
    }

    /// Short label for logs and error messages
    pub fn identifier(&self) -> String {
        match (self.epsg, &self.wkt) {
            (Some(code), _) => format!("EPSG:{code}"),
            (None, Some(wkt)) => format!("WKT:{}", wkt.chars().take(50).collect::<String>()),
            (None, None) => "Unknown".to_string(),
        }
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identifier())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier() {
        let crs = CRS::from_epsg(32633);
        assert_eq!(crs.epsg(), Some(32633));
        assert_eq!(crs.to_string(), "EPSG:32633");
        assert_eq!(CRS::from_wkt("é".repeat(60)).identifier().chars().count(), 4 + 50);
    }

    #[test]
    fn test_geographic() {
        assert!(CRS::wgs84().is_geographic());
        assert!(!CRS::from_epsg(32633).is_geographic());
        assert!(!CRS::web_mercator().is_geographic());
    }

    #[test]
    fn test_utm_constructors() {
        assert_eq!(CRS::utm(33, true).unwrap().epsg(), Some(32633));
        assert_eq!(CRS::utm(19, false).unwrap().utm_zone(), Some((19, false)));
        assert!(CRS::utm(0, true).is_err());
        assert!(CRS::utm(61, false).is_err());
        assert_eq!(CRS::wgs84().utm_zone(), None);

        // Madrid, Buenos Aires, antimeridian
        assert_eq!(CRS::utm_for(-3.7, 40.4).unwrap().epsg(), Some(32630));
        assert_eq!(CRS::utm_for(-58.4, -34.6).unwrap().epsg(), Some(32721));
        assert_eq!(CRS::utm_for(180.0, 10.0).unwrap().epsg(), Some(32601));
        assert!(CRS::utm_for(10.0, 95.0).is_err());
    }

    #[test]
    fn test_equivalence() {
        assert!(CRS::from_epsg(4326).is_equivalent(&CRS::wgs84()));
        assert!(!CRS::from_epsg(32633).is_equivalent(&CRS::from_epsg(32634)));
        let wkt = CRS::from_wkt("LOCAL_CS[\"site\"]");
        assert!(wkt.is_equivalent(&wkt.clone()));
        assert!(!wkt.is_equivalent(&CRS::wgs84()));
    }
}
