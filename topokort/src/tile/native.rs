//! Native UTM tile-matrix path.

use tiny_skia::Pixmap;
use tracing::debug;

use super::capabilities::CapabilitiesStore;
use super::composite::PageRequest;
use super::fetch::{FetchReport, TileFetcher, TileTask};
use super::mosaic::Mosaic;
use super::retry::RetryPolicy;
use super::TileError;
use crate::coord::{optimal_norway_epsg, Affine, Point, Projection};
use crate::provider::{Auth, HttpClient, NativeMatrixSource};

/// Fetches tiles from a UTM matrix set and crops or warps them onto the page.
///
/// The matrix zone follows the page centre; a neighbouring zone is used only
/// when the source publishes a set for it. Returns `Ok(None)` when the source
/// has no set for the page zone at all.
pub(crate) async fn fetch_native<C: HttpClient + 'static>(
    fetcher: &TileFetcher<'_, C>,
    capabilities: &CapabilitiesStore,
    source: &NativeMatrixSource,
    auth: &Auth,
    page: &PageRequest<'_>,
) -> Result<Option<(Pixmap, FetchReport)>, TileError> {
    let page_epsg = page.projection.epsg();
    let wgs84 = page.projection.bbox_to_wgs84(&page.bbox)?;
    let optimal = optimal_norway_epsg((wgs84.minx + wgs84.maxx) / 2.0);

    let tile_epsg = if optimal != page_epsg && source.matrix_set_for(optimal).is_some() {
        optimal
    } else {
        page_epsg
    };
    let Some(set_id) = source.matrix_set_for(tile_epsg) else {
        debug!(epsg = %tile_epsg, "No native matrix set for page zone");
        return Ok(None);
    };

    let tile_projection = Projection::new(tile_epsg)?;
    let tile_bbox = page.projection.bbox_to(&page.bbox, &tile_projection)?;

    let retry = RetryPolicy::for_capabilities(fetcher.policy());
    let set = capabilities
        .matrix_set(fetcher.client(), &source.capabilities_url, set_id, &retry)
        .await?;

    let desired = (tile_bbox.width() / page.width as f64).max(tile_bbox.height() / page.height as f64);
    let (matrix, range) = set.choose_matrix(desired, &tile_bbox, fetcher.policy().page_tile_budget);
    debug!(set = set_id, matrix = %matrix.id, tiles = range.count(), "Fetching native matrix tiles");

    let mut tasks = Vec::with_capacity(range.count() as usize);
    for row in range.min_row..=range.max_row {
        for col in range.min_col..=range.max_col {
            tasks.push(TileTask {
                url: source.tile_url(set_id, &matrix.id, row, col),
                x: (col - range.min_col) as u32,
                y: (row - range.min_row) as u32,
            });
        }
    }

    let cols = u32::try_from(range.cols()).unwrap_or(u32::MAX);
    let rows = u32::try_from(range.rows()).unwrap_or(u32::MAX);
    let mut mosaic = Mosaic::new(cols, rows, matrix.tile_width, matrix.tile_height)?;
    let label = format!("{set_id}/{}", matrix.id);
    let report = fetcher.fetch_mosaic(&label, tasks, auth, &mut mosaic).await?;

    let res = matrix.resolution();
    let origin_x = matrix.top_left.0 + range.min_col as f64 * range.span_x;
    let origin_y = matrix.top_left.1 - range.min_row as f64 * range.span_y;
    let to_px = |p: Point| Point::new((p.x - origin_x) / res, (origin_y - p.y) / res);

    let image = if tile_epsg == page_epsg {
        let corner = to_px(Point::new(tile_bbox.minx, tile_bbox.maxy));
        mosaic.crop(
            corner.x,
            corner.y,
            tile_bbox.width() / res,
            tile_bbox.height() / res,
            page.width,
            page.height,
        )?
    } else {
        // Zones are rotated against each other; fit the page corners.
        let [tl, tr, bl, _] = page.projection.corners_to(&page.bbox, &tile_projection)?;
        let transform = Affine::from_points([to_px(tl), to_px(tr), to_px(bl)], page.output_corners())?;
        debug!(from = %page_epsg, to = %tile_epsg, "Warping across zones");
        mosaic.project(page.width, page.height, &transform)?
    };
    Ok(Some((image, report)))
}
