//! Coordinate conversion module
//!
//! Provides the projection service: WGS84 <-> local UTM transforms, zone
//! selection, three-point affine fitting, grid convergence and the Web
//! Mercator tile math used by XYZ tile sources.

mod affine;
mod types;
mod utm;

pub use affine::Affine;
pub use types::{
    Epsg, LonLat, Point, ProjectionError, TileCoord, ETRS89_UTM_BASE, MAX_LAT, MAX_ZOOM, MIN_LAT,
};
pub use utm::{
    grid_convergence, infer_local_epsg, optimal_norway_epsg, utm_zone_from_lon, Projection,
};

use std::f64::consts::PI;

use crate::geometry::BBox;

/// Web Mercator ground resolution (m/px) of a 256 px tile at zoom 0 on the equator.
pub const MERCATOR_RESOLUTION_Z0: f64 = 156_543.03;

/// Converts geographic coordinates to tile coordinates.
///
/// Latitude is clamped to the Web Mercator range and the result to the
/// valid tile index range, so callers can pass bbox edges directly.
///
/// # Arguments
///
/// * `lat` - Latitude in degrees
/// * `lon` - Longitude in degrees (-180.0 to 180.0)
/// * `zoom` - Zoom level (0 to 22)
#[inline]
pub fn to_tile_coords(lat: f64, lon: f64, zoom: u8) -> TileCoord {
    let zoom = zoom.min(MAX_ZOOM);
    let n = 2.0_f64.powi(zoom as i32);
    let max_index = n - 1.0;

    let col = ((lon + 180.0) / 360.0 * n).floor().clamp(0.0, max_index) as u32;

    // Web Mercator: y = (1 - ln(tan φ + sec φ) / π) / 2 · n
    let lat_rad = lat.clamp(MIN_LAT, MAX_LAT).to_radians();
    let row = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0 * n)
        .floor()
        .clamp(0.0, max_index) as u32;

    TileCoord { row, col, zoom }
}

/// Converts tile coordinates back to geographic coordinates.
///
/// Returns the latitude/longitude of the tile's northwest corner. Row and
/// column may equal `2^zoom` to address the far edge of the last tile.
#[inline]
pub fn tile_to_lat_lon(tile: &TileCoord) -> (f64, f64) {
    let n = 2.0_f64.powi(tile.zoom as i32);

    let lon = tile.col as f64 / n * 360.0 - 180.0;

    let y = tile.row as f64 / n;
    let lat = (PI * (1.0 - 2.0 * y)).sinh().atan().to_degrees();

    (lat, lon)
}

/// Geographic bbox (degrees) covered by one tile.
pub fn tile_bounds(tile: &TileCoord) -> BBox {
    let (north, west) = tile_to_lat_lon(tile);
    let (south, east) = tile_to_lat_lon(&TileCoord {
        row: tile.row + 1,
        col: tile.col + 1,
        zoom: tile.zoom,
    });
    BBox::new(west, south, east, north)
}

/// Unscaled Mercator northing `ln(tan(π/4 + φ/2))` of a latitude in degrees.
#[inline]
pub fn mercator_y(lat: f64) -> f64 {
    (PI / 4.0 + lat * PI / 360.0).tan().ln()
}
