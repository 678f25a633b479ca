//! Coordinate types shared by the projection service.

use std::fmt;

use thiserror::Error;

/// Minimum latitude representable in Web Mercator.
pub const MIN_LAT: f64 = -85.05112878;

/// Maximum latitude representable in Web Mercator.
pub const MAX_LAT: f64 = 85.05112878;

/// Highest Web Mercator zoom level the tile math accepts.
pub const MAX_ZOOM: u8 = 22;

/// Base of the ETRS89 / UTM EPSG code range (`25800 + zone`).
pub const ETRS89_UTM_BASE: u32 = 25800;

/// Errors raised by the projection service.
///
/// Projection errors are always fatal for a render.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProjectionError {
    /// Zone inference was attempted on an empty point set.
    #[error("Cannot infer a projection from an empty point set")]
    EmptyPointSet,

    /// EPSG code outside the ETRS89 / UTM range (zones 1-60).
    #[error("Invalid UTM EPSG code {0}: zone must be between 1 and 60")]
    InvalidZone(u32),

    /// The underlying transform library rejected a definition or point.
    #[error("Coordinate transform failed: {0}")]
    Transform(String),

    /// Three source points of an affine fit are collinear.
    #[error("Affine transform is degenerate (collinear reference points)")]
    DegenerateAffine,

    /// Unknown paper size name.
    #[error("Unknown paper size: {0}")]
    UnknownPaper(String),

    /// Scale denominator not in the supported set.
    #[error("Unsupported scale 1:{0} (supported: 1:25000, 1:50000, 1:100000)")]
    UnsupportedScale(u32),
}

/// A WGS84 longitude/latitude pair in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LonLat {
    pub lon: f64,
    pub lat: f64,
}

impl LonLat {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }
}

/// A planar (easting, northing) coordinate in metres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// ETRS89 / UTM EPSG code (`25801..=25860`).
///
/// Constructing one always validates the zone, so every `Epsg` in the
/// program refers to a real UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Epsg(u32);

impl Epsg {
    /// ETRS89 / UTM zone 32N.
    pub const UTM32N: Epsg = Epsg(25832);
    /// ETRS89 / UTM zone 33N.
    pub const UTM33N: Epsg = Epsg(25833);
    /// ETRS89 / UTM zone 35N.
    pub const UTM35N: Epsg = Epsg(25835);

    /// Validates an EPSG code and returns it.
    pub fn new(code: u32) -> Result<Self, ProjectionError> {
        match code.checked_sub(ETRS89_UTM_BASE) {
            Some(zone) if (1..=60).contains(&zone) => Ok(Self(code)),
            _ => Err(ProjectionError::InvalidZone(code)),
        }
    }

    /// EPSG code for a UTM zone number.
    pub fn from_zone(zone: u8) -> Result<Self, ProjectionError> {
        Self::new(ETRS89_UTM_BASE + u32::from(zone))
    }

    #[inline]
    pub fn code(self) -> u32 {
        self.0
    }

    #[inline]
    pub fn zone(self) -> u8 {
        (self.0 - ETRS89_UTM_BASE) as u8
    }

    /// Longitude of the zone's central meridian in degrees.
    #[inline]
    pub fn central_meridian(self) -> f64 {
        f64::from(self.zone()) * 6.0 - 183.0
    }

    /// PROJ definition string for this zone on the GRS80 ellipsoid.
    pub fn proj_definition(self) -> String {
        format!(
            "+proj=utm +zone={} +ellps=GRS80 +units=m +no_defs",
            self.zone()
        )
    }
}

impl fmt::Display for Epsg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.0)
    }
}

/// Web Mercator tile coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    /// Tile row (Y coordinate)
    pub row: u32,
    /// Tile column (X coordinate)
    pub col: u32,
    /// Zoom level
    pub zoom: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsg_accepts_utm_range() {
        assert_eq!(Epsg::new(25801).unwrap().zone(), 1);
        assert_eq!(Epsg::new(25833).unwrap().zone(), 33);
        assert_eq!(Epsg::new(25860).unwrap().zone(), 60);
    }

    #[test]
    fn test_epsg_rejects_out_of_range() {
        assert_eq!(Epsg::new(25800), Err(ProjectionError::InvalidZone(25800)));
        assert_eq!(Epsg::new(25861), Err(ProjectionError::InvalidZone(25861)));
        assert_eq!(Epsg::new(4326), Err(ProjectionError::InvalidZone(4326)));
    }

    #[test]
    fn test_central_meridian() {
        assert_eq!(Epsg::new(25832).unwrap().central_meridian(), 9.0);
        assert_eq!(Epsg::new(25833).unwrap().central_meridian(), 15.0);
        assert_eq!(Epsg::new(25835).unwrap().central_meridian(), 27.0);
    }

    #[test]
    fn test_proj_definition() {
        let epsg = Epsg::from_zone(33).unwrap();
        assert_eq!(
            epsg.proj_definition(),
            "+proj=utm +zone=33 +ellps=GRS80 +units=m +no_defs"
        );
        assert_eq!(epsg.to_string(), "EPSG:25833");
    }
}
