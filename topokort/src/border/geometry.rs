//! Country boundary geometry and GeoJSON loading.

use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::coord::LonLat;
use crate::geometry::BBox;

/// Errors loading boundary geometry.
#[derive(Debug, Error)]
pub enum BorderError {
    #[error("Failed to read border file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid GeoJSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unsupported geometry type '{0}' (expected Polygon or MultiPolygon)")]
    UnsupportedGeometry(String),

    #[error("FeatureCollection has no features")]
    EmptyCollection,
}

/// A closed ring of WGS84 positions.
pub type Ring = Vec<LonLat>;

/// One polygon: outer ring followed by any holes.
pub type Polygon = Vec<Ring>;

/// Boundary of one country as a list of polygons.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CountryBorder {
    polygons: Vec<Polygon>,
}

impl CountryBorder {
    pub fn new(polygons: Vec<Polygon>) -> Self {
        Self { polygons }
    }

    /// Single-polygon border from `(lon, lat)` tuples.
    pub fn from_ring(coords: &[(f64, f64)]) -> Self {
        let ring = coords.iter().map(|&(lon, lat)| LonLat::new(lon, lat)).collect();
        Self::new(vec![vec![ring]])
    }

    /// Parses a Feature, a FeatureCollection (first feature) or a bare
    /// Polygon/MultiPolygon geometry.
    pub fn from_geojson(json: &str) -> Result<Self, BorderError> {
        let doc: GeoJson = serde_json::from_str(json)?;
        let geometry = match doc {
            GeoJson::FeatureCollection { features } => features
                .into_iter()
                .next()
                .ok_or(BorderError::EmptyCollection)?
                .geometry,
            GeoJson::Feature { geometry } => geometry,
            GeoJson::Polygon { coordinates } => RawGeometry::Polygon { coordinates },
            GeoJson::MultiPolygon { coordinates } => RawGeometry::MultiPolygon { coordinates },
            GeoJson::Other => return Err(BorderError::UnsupportedGeometry("unknown".into())),
        };
        geometry.into_border()
    }

    pub fn from_file(path: &Path) -> Result<Self, BorderError> {
        let text = std::fs::read_to_string(path).map_err(|source| BorderError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_geojson(&text)
    }

    pub fn polygons(&self) -> &[Polygon] {
        &self.polygons
    }

    /// Every ring of every polygon, for even-odd clipping.
    pub fn rings(&self) -> impl Iterator<Item = &Ring> {
        self.polygons.iter().flatten()
    }

    pub fn contains(&self, p: LonLat) -> bool {
        self.polygons.iter().any(|poly| point_in_polygon(p, poly))
    }

    /// Approximate bbox/border intersection: a bbox corner inside a
    /// polygon, a polygon vertex inside the bbox, or the bbox centre inside
    /// a polygon. Edge crossings are not tested.
    pub fn intersects_bbox(&self, bbox: &BBox) -> bool {
        let corners = [
            LonLat::new(bbox.minx, bbox.miny),
            LonLat::new(bbox.minx, bbox.maxy),
            LonLat::new(bbox.maxx, bbox.miny),
            LonLat::new(bbox.maxx, bbox.maxy),
        ];
        let center = LonLat::new((bbox.minx + bbox.maxx) / 2.0, (bbox.miny + bbox.maxy) / 2.0);

        self.polygons.iter().any(|poly| {
            corners.iter().any(|c| point_in_polygon(*c, poly))
                || poly
                    .iter()
                    .flatten()
                    .any(|v| (bbox.minx..=bbox.maxx).contains(&v.lon) && (bbox.miny..=bbox.maxy).contains(&v.lat))
                || point_in_polygon(center, poly)
        })
    }
}

/// Even-odd ray casting over all rings of a polygon, so holes count as outside.
pub fn point_in_polygon(p: LonLat, rings: &[Ring]) -> bool {
    let mut inside = false;
    for ring in rings {
        let n = ring.len();
        if n == 0 {
            continue;
        }
        let mut j = n - 1;
        for i in 0..n {
            let (vi, vj) = (ring[i], ring[j]);
            if (vi.lat > p.lat) != (vj.lat > p.lat)
                && p.lon < (vj.lon - vi.lon) * (p.lat - vi.lat) / (vj.lat - vi.lat) + vi.lon
            {
                inside = !inside;
            }
            j = i;
        }
    }
    inside
}

type Position = Vec<f64>;

#[derive(Deserialize)]
#[serde(tag = "type")]
enum GeoJson {
    FeatureCollection { features: Vec<Feature> },
    Feature { geometry: RawGeometry },
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    #[serde(other)]
    Other,
}

#[derive(Deserialize)]
struct Feature {
    geometry: RawGeometry,
}

#[derive(Deserialize)]
#[serde(tag = "type")]
enum RawGeometry {
    Polygon { coordinates: Vec<Vec<Position>> },
    MultiPolygon { coordinates: Vec<Vec<Vec<Position>>> },
    #[serde(other)]
    Other,
}

impl RawGeometry {
    fn into_border(self) -> Result<CountryBorder, BorderError> {
        let polygons = match self {
            RawGeometry::Polygon { coordinates } => vec![convert_polygon(coordinates)],
            RawGeometry::MultiPolygon { coordinates } => {
                coordinates.into_iter().map(convert_polygon).collect()
            }
            RawGeometry::Other => {
                return Err(BorderError::UnsupportedGeometry("non-polygon".into()))
            }
        };
        Ok(CountryBorder::new(polygons))
    }
}

fn convert_polygon(rings: Vec<Vec<Position>>) -> Polygon {
    rings
        .into_iter()
        .map(|ring| {
            ring.into_iter()
                .filter(|pos| pos.len() >= 2)
                .map(|pos| LonLat::new(pos[0], pos[1]))
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(min: f64, max: f64) -> Ring {
        vec![
            LonLat::new(min, min),
            LonLat::new(max, min),
            LonLat::new(max, max),
            LonLat::new(min, max),
            LonLat::new(min, min),
        ]
    }

    #[test]
    fn test_point_in_polygon_with_hole() {
        let poly = vec![square(0.0, 10.0), square(4.0, 6.0)];
        assert!(point_in_polygon(LonLat::new(2.0, 2.0), &poly));
        assert!(!point_in_polygon(LonLat::new(5.0, 5.0), &poly));
        assert!(!point_in_polygon(LonLat::new(11.0, 5.0), &poly));
    }

    #[test]
    fn test_intersects_bbox_heuristics() {
        let border = CountryBorder::new(vec![vec![square(0.0, 10.0)]]);
        // corner inside
        assert!(border.intersects_bbox(&BBox::new(9.0, 9.0, 12.0, 12.0)));
        // polygon vertex inside bbox
        assert!(border.intersects_bbox(&BBox::new(-1.0, -1.0, 1.0, 1.0)));
        // bbox enclosing the polygon
        assert!(border.intersects_bbox(&BBox::new(-5.0, -5.0, 15.0, 15.0)));
        assert!(!border.intersects_bbox(&BBox::new(20.0, 20.0, 21.0, 21.0)));
    }

    #[test]
    fn test_narrow_crossing_is_missed() {
        // Thin bbox crossing the square with no corner, vertex or centre inside.
        let border = CountryBorder::new(vec![vec![square(0.0, 10.0)]]);
        let bbox = BBox::new(-5.0, 4.0, 15.0, 6.0);
        // Centre (5,5) is inside, so this one is found.
        assert!(border.intersects_bbox(&bbox));
        let offset = BBox::new(-30.0, 4.0, 15.0, 6.0);
        assert!(!border.intersects_bbox(&offset));
    }

    #[test]
    fn test_parse_feature_collection() {
        let json = r#"{"type":"FeatureCollection","features":[{"type":"Feature","properties":{"name":"x"},
            "geometry":{"type":"Polygon","coordinates":[[[0,0],[1,0],[1,1],[0,1],[0,0]]]}}]}"#;
        let border = CountryBorder::from_geojson(json).unwrap();
        assert_eq!(border.polygons().len(), 1);
        assert!(border.contains(LonLat::new(0.5, 0.5)));
    }

    #[test]
    fn test_parse_multipolygon_with_altitude() {
        let json = r#"{"type":"MultiPolygon","coordinates":[
            [[[0,0,5],[1,0,5],[1,1,5],[0,1,5],[0,0,5]]],
            [[[2,2],[3,2],[3,3],[2,3],[2,2]]]]}"#;
        let border = CountryBorder::from_geojson(json).unwrap();
        assert_eq!(border.polygons().len(), 2);
        assert_eq!(border.rings().count(), 2);
        assert!(border.contains(LonLat::new(2.5, 2.5)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            CountryBorder::from_geojson(r#"{"type":"FeatureCollection","features":[]}"#),
            Err(BorderError::EmptyCollection)
        ));
        assert!(matches!(
            CountryBorder::from_geojson(r#"{"type":"Point","coordinates":[0,0]}"#),
            Err(BorderError::UnsupportedGeometry(_))
        ));
        assert!(matches!(
            CountryBorder::from_geojson("not json"),
            Err(BorderError::Json(_))
        ));
    }
}
