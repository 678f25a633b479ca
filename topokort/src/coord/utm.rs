//! Local UTM projection built on `proj4rs`.
//!
//! A [`Projection`] is chosen once per track and then only read. Pages that
//! need a different zone for tile alignment build their own `Projection`
//! rather than mutating the track's.

use std::fmt;

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use super::types::{Epsg, LonLat, Point, ProjectionError};
use crate::geometry::BBox;

/// Longitude window (degrees) where zones snap to the native tile grids.
const SNAP_MIN_LON: f64 = 4.0;
const SNAP_MAX_LON: f64 = 31.5;

const GEOGRAPHIC_DEFINITION: &str = "+proj=longlat +ellps=GRS80 +no_defs";

/// Returns the UTM zone number covering a longitude.
#[inline]
pub fn utm_zone_from_lon(lon: f64) -> u8 {
    let zone = ((lon + 180.0) / 6.0).floor() + 1.0;
    zone.clamp(1.0, 60.0) as u8
}

/// Picks one of the three zones the native tile source is published in.
#[inline]
pub fn optimal_norway_epsg(lon: f64) -> Epsg {
    if lon < 12.0 {
        Epsg::UTM32N
    } else if lon < 24.0 {
        Epsg::UTM33N
    } else {
        Epsg::UTM35N
    }
}

/// Infers the best local zone for a point set from its mean longitude.
pub fn infer_local_epsg(points: &[LonLat]) -> Result<Epsg, ProjectionError> {
    if points.is_empty() {
        return Err(ProjectionError::EmptyPointSet);
    }
    let mean_lon = points.iter().map(|p| p.lon).sum::<f64>() / points.len() as f64;
    if (SNAP_MIN_LON..=SNAP_MAX_LON).contains(&mean_lon) {
        Ok(optimal_norway_epsg(mean_lon))
    } else {
        Epsg::from_zone(utm_zone_from_lon(mean_lon))
    }
}

/// Angle between grid north and true north at a point, in degrees.
///
/// Positive east of the central meridian in the northern hemisphere.
pub fn grid_convergence(lon: f64, lat: f64, epsg: Epsg) -> f64 {
    let delta = (lon - epsg.central_meridian()).to_radians();
    (delta.tan() * lat.to_radians().sin()).atan().to_degrees()
}

/// Forward/inverse transform pair between WGS84 and one UTM zone.
pub struct Projection {
    epsg: Epsg,
    utm: Proj,
    geographic: Proj,
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Projection")
            .field("epsg", &self.epsg)
            .finish_non_exhaustive()
    }
}

impl Projection {
    /// Builds the projection for a UTM zone.
    pub fn new(epsg: Epsg) -> Result<Self, ProjectionError> {
        let utm = Proj::from_proj_string(&epsg.proj_definition())
            .map_err(|e| ProjectionError::Transform(format!("{epsg}: {e:?}")))?;
        let geographic = Proj::from_proj_string(GEOGRAPHIC_DEFINITION)
            .map_err(|e| ProjectionError::Transform(format!("geographic: {e:?}")))?;
        Ok(Self {
            epsg,
            utm,
            geographic,
        })
    }

    /// Builds the projection for the zone inferred from a point set.
    pub fn for_points(points: &[LonLat]) -> Result<Self, ProjectionError> {
        Self::new(infer_local_epsg(points)?)
    }

    #[inline]
    pub fn epsg(&self) -> Epsg {
        self.epsg
    }

    /// WGS84 to planar metres.
    pub fn forward(&self, p: LonLat) -> Result<Point, ProjectionError> {
        let mut point = (p.lon.to_radians(), p.lat.to_radians(), 0.0);
        transform(&self.geographic, &self.utm, &mut point)
            .map_err(|e| ProjectionError::Transform(format!("{e:?}")))?;
        Ok(Point::new(point.0, point.1))
    }

    /// Planar metres to WGS84.
    pub fn inverse(&self, p: Point) -> Result<LonLat, ProjectionError> {
        let mut point = (p.x, p.y, 0.0);
        transform(&self.utm, &self.geographic, &mut point)
            .map_err(|e| ProjectionError::Transform(format!("{e:?}")))?;
        Ok(LonLat::new(point.0.to_degrees(), point.1.to_degrees()))
    }

    /// Projects every point, failing on the first error.
    pub fn forward_all(&self, points: &[LonLat]) -> Result<Vec<Point>, ProjectionError> {
        points.iter().map(|p| self.forward(*p)).collect()
    }

    /// Moves a planar point from this zone into `target`'s zone.
    pub fn point_to(&self, p: Point, target: &Projection) -> Result<Point, ProjectionError> {
        if self.epsg == target.epsg {
            return Ok(p);
        }
        let mut point = (p.x, p.y, 0.0);
        transform(&self.utm, &target.utm, &mut point)
            .map_err(|e| ProjectionError::Transform(format!("{e:?}")))?;
        Ok(Point::new(point.0, point.1))
    }

    /// Reprojects a bbox into another zone as the axis-aligned hull of its
    /// four transformed corners. Same zone returns the box unchanged.
    pub fn bbox_to(&self, bbox: &BBox, target: &Projection) -> Result<BBox, ProjectionError> {
        if self.epsg == target.epsg {
            return Ok(*bbox);
        }
        let corners = self.corners_to(bbox, target)?;
        BBox::from_points(&corners).ok_or(ProjectionError::EmptyPointSet)
    }

    /// Reprojects the four corners (`tl, tr, bl, br`) keeping their
    /// rotation, for affine fitting.
    pub fn corners_to(&self, bbox: &BBox, target: &Projection) -> Result<[Point; 4], ProjectionError> {
        let [tl, tr, bl, br] = bbox.corners();
        Ok([
            self.point_to(tl, target)?,
            self.point_to(tr, target)?,
            self.point_to(bl, target)?,
            self.point_to(br, target)?,
        ])
    }

    /// Geographic hull of a planar bbox, as a box in degrees
    /// (`minx` = west longitude, `maxy` = north latitude).
    pub fn bbox_to_wgs84(&self, bbox: &BBox) -> Result<BBox, ProjectionError> {
        let corners = self.corners_to_wgs84(bbox)?;
        let points = corners.map(|c| Point::new(c.lon, c.lat));
        BBox::from_points(&points).ok_or(ProjectionError::EmptyPointSet)
    }

    /// Geographic corners (`tl, tr, bl, br`) of a planar bbox.
    pub fn corners_to_wgs84(&self, bbox: &BBox) -> Result<[LonLat; 4], ProjectionError> {
        let [tl, tr, bl, br] = bbox.corners();
        Ok([
            self.inverse(tl)?,
            self.inverse(tr)?,
            self.inverse(bl)?,
            self.inverse(br)?,
        ])
    }
}
