//! Web Mercator XYZ path.

use tiny_skia::Pixmap;
use tracing::{debug, warn};

use super::composite::PageRequest;
use super::fetch::{FetchReport, TileFetcher, TileTask};
use super::mosaic::Mosaic;
use super::TileError;
use crate::coord::{
    mercator_y, tile_to_lat_lon, to_tile_coords, Affine, Point, TileCoord, MERCATOR_RESOLUTION_Z0,
};
use crate::geometry::BBox;
use crate::provider::{xyz_url, HttpClient, Provider};

/// XYZ tiles are always 256 px.
const XYZ_TILE_SIZE: u32 = 256;

/// Zoom level whose equatorial resolution best matches `desired` m/px.
///
/// With `lat_correction` the resolution is scaled by `cos(lat)`; border
/// pages skip it to favour tile detail.
pub fn choose_zoom(desired: f64, lat: f64, lat_correction: bool, max_zoom: u8) -> u8 {
    let factor = if lat_correction { lat.to_radians().cos() } else { 1.0 };
    let zoom = (MERCATOR_RESOLUTION_Z0 * factor / desired).log2().round();
    if zoom.is_nan() {
        return 0;
    }
    zoom.clamp(0.0, max_zoom as f64) as u8
}

/// Tile range and zoom chosen for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MercatorPlan {
    pub zoom: u8,
    pub min_x: u32,
    pub max_x: u32,
    pub min_y: u32,
    pub max_y: u32,
}

impl MercatorPlan {
    /// Plans the tiles covering a geographic bbox, lowering the zoom while
    /// the tile count exceeds `budget`. Zoom 0 is used even when over budget.
    pub fn new(wgs84: &BBox, zoom: u8, budget: usize) -> Self {
        let mut zoom = zoom;
        loop {
            let nw = to_tile_coords(wgs84.maxy, wgs84.minx, zoom);
            let se = to_tile_coords(wgs84.miny, wgs84.maxx, zoom);
            let plan = Self {
                zoom,
                min_x: nw.col,
                max_x: se.col,
                min_y: nw.row,
                max_y: se.row,
            };
            if plan.count() <= budget as u64 {
                return plan;
            }
            if zoom == 0 {
                warn!(tiles = plan.count(), budget, "Cannot reduce zoom further, using zoom 0");
                return plan;
            }
            zoom -= 1;
        }
    }

    pub fn cols(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    pub fn rows(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    pub fn count(&self) -> u64 {
        self.cols() as u64 * self.rows() as u64
    }

    /// Geographic bounds of the whole mosaic in degrees.
    pub fn bounds(&self) -> BBox {
        let (north, west) = tile_to_lat_lon(&TileCoord {
            row: self.min_y,
            col: self.min_x,
            zoom: self.zoom,
        });
        let (south, east) = tile_to_lat_lon(&TileCoord {
            row: self.max_y + 1,
            col: self.max_x + 1,
            zoom: self.zoom,
        });
        BBox::new(west, south, east, north)
    }

    /// Maps a lon/lat (as a point, `x` = lon) to mosaic pixels. Longitude is
    /// linear, latitude goes through the Mercator northing.
    pub fn to_mosaic_px(&self, lon: f64, lat: f64) -> Point {
        let bounds = self.bounds();
        let width = (self.cols() * XYZ_TILE_SIZE) as f64;
        let height = (self.rows() * XYZ_TILE_SIZE) as f64;
        let top = mercator_y(bounds.maxy);
        let bottom = mercator_y(bounds.miny);
        Point::new(
            (lon - bounds.minx) / (bounds.maxx - bounds.minx) * width,
            (top - mercator_y(lat)) / (top - bottom) * height,
        )
    }

    fn tasks(&self, template: &str) -> Vec<TileTask> {
        let mut tasks = Vec::with_capacity(self.count() as usize);
        for y in self.min_y..=self.max_y {
            for x in self.min_x..=self.max_x {
                tasks.push(TileTask {
                    url: xyz_url(template, self.zoom, x, y),
                    x: x - self.min_x,
                    y: y - self.min_y,
                });
            }
        }
        tasks
    }
}

/// Fetches a provider's XYZ tiles and warps them onto the page.
///
/// `border_budget` is set on multi-provider pages: it replaces the page tile
/// budget and disables latitude correction.
pub(crate) async fn fetch_mercator<C: HttpClient + 'static>(
    fetcher: &TileFetcher<'_, C>,
    provider: &Provider,
    page: &PageRequest<'_>,
    max_zoom: u8,
    border_budget: Option<usize>,
) -> Result<(Pixmap, FetchReport), TileError> {
    let wgs84 = page.projection.bbox_to_wgs84(&page.bbox)?;
    let avg_lat = (wgs84.miny + wgs84.maxy) / 2.0;
    let zoom = choose_zoom(page.desired_resolution(), avg_lat, border_budget.is_none(), max_zoom);
    let budget = border_budget.unwrap_or(fetcher.policy().page_tile_budget);
    let plan = MercatorPlan::new(&wgs84, zoom, budget);
    debug!(provider = %provider.id, zoom = plan.zoom, tiles = plan.count(), "Fetching XYZ tiles");

    let mut mosaic = Mosaic::new(plan.cols(), plan.rows(), XYZ_TILE_SIZE, XYZ_TILE_SIZE)?;
    let tasks = plan.tasks(&provider.source.xyz_template());
    let report = fetcher
        .fetch_mosaic(provider.id.as_str(), tasks, &provider.auth, &mut mosaic)
        .await?;

    // Fit the page corners, keeping the UTM-vs-Mercator rotation.
    let [tl, tr, bl, _] = page.projection.corners_to_wgs84(&page.bbox)?;
    let src = [tl, tr, bl].map(|c| plan.to_mosaic_px(c.lon, c.lat));
    let transform = Affine::from_points(src, page.output_corners())?;
    Ok((mosaic.project(page.width, page.height, &transform)?, report))
}
