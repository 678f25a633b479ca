//! WMS overlay layers drawn over the basemap.

use std::sync::Arc;

use futures::future::try_join_all;
use image::RgbaImage;
use tiny_skia::{FilterQuality, Pixmap, PixmapPaint, Transform};
use tracing::debug;

use crate::config::{OverlaySettings, Rgb, ROUTE_OVERLAY_OPACITY};
use crate::coord::Epsg;
use crate::geometry::BBox;
use crate::provider::{Auth, GetMapRequest, HttpClient, OverlayKind};
use crate::surface::pixmap_from_rgba;
use crate::tile::{RetryPolicy, TileError, TileFetcher};

/// Vegetation colours of the slope layer that are made transparent.
pub const HEIGHT_MASK_COLORS: [Rgb; 2] = [Rgb(0x92, 0xd0, 0x60), Rgb(0xd9, 0xf0, 0x8b)];

/// Per-channel tolerance when matching [`HEIGHT_MASK_COLORS`].
pub const HEIGHT_MASK_TOLERANCE: u8 = 18;

/// Slope overlay raster size as a fraction of the page, by map scale.
pub fn height_scale_for(scale: u32) -> f64 {
    match scale {
        25_000 => 0.55,
        50_000 => 0.45,
        100_000 => 0.35,
        _ => 0.45,
    }
}

fn matches_mask(r: u8, g: u8, b: u8, colors: &[Rgb]) -> bool {
    colors.iter().any(|c| {
        r.abs_diff(c.0) <= HEIGHT_MASK_TOLERANCE
            && g.abs_diff(c.1) <= HEIGHT_MASK_TOLERANCE
            && b.abs_diff(c.2) <= HEIGHT_MASK_TOLERANCE
    })
}

/// Clears pixels close to any of `colors`. Fully transparent pixels are
/// left alone.
pub fn apply_height_mask(image: &mut RgbaImage, colors: &[Rgb]) {
    if colors.is_empty() {
        return;
    }
    for pixel in image.pixels_mut() {
        let [r, g, b, a] = pixel.0;
        if a != 0 && matches_mask(r, g, b, colors) {
            pixel.0[3] = 0;
        }
    }
}

/// One fetched overlay, ready to draw.
#[derive(Debug)]
pub struct OverlayImage {
    pub kind: OverlayKind,
    pub image: Pixmap,
    pub opacity: f32,
}

/// Drawing groups in page order: slope, weak ice, then routes and grid.
fn draw_rank(kind: OverlayKind) -> u8 {
    match kind {
        OverlayKind::Slope => 0,
        OverlayKind::WeakIce => 1,
        OverlayKind::Ski => 2,
        OverlayKind::Hike => 3,
        OverlayKind::Grid => 4,
    }
}

/// Overlays selected in `settings`, in drawing order.
pub fn selected_overlays(settings: &OverlaySettings) -> Vec<OverlayKind> {
    let mut kinds: Vec<OverlayKind> = settings.layers.iter().copied().collect();
    kinds.sort_by_key(|k| draw_rank(*k));
    kinds
}

/// A page area in one UTM zone, in output pixels.
#[derive(Debug, Clone, Copy)]
pub struct OverlayArea {
    pub bbox: BBox,
    pub epsg: Epsg,
    pub width: u32,
    pub height: u32,
    pub scale: u32,
}

/// Fetches every selected overlay for a page concurrently.
///
/// Any overlay that cannot be fetched fails the page.
pub async fn fetch_overlays<C: HttpClient + 'static>(
    fetcher: &TileFetcher<'_, C>,
    settings: &OverlaySettings,
    area: &OverlayArea,
) -> Result<Vec<OverlayImage>, TileError> {
    let kinds = selected_overlays(settings);
    try_join_all(kinds.into_iter().map(|kind| fetch_overlay(fetcher, settings, area, kind))).await
}

async fn fetch_overlay<C: HttpClient + 'static>(
    fetcher: &TileFetcher<'_, C>,
    settings: &OverlaySettings,
    area: &OverlayArea,
    kind: OverlayKind,
) -> Result<OverlayImage, TileError> {
    let (width, height, opacity) = match kind {
        OverlayKind::Slope => {
            let factor = settings.height_scale_factor.unwrap_or_else(|| height_scale_for(area.scale));
            let scaled = |v: u32| ((f64::from(v) * factor).round() as u32).max(1);
            (scaled(area.width), scaled(area.height), settings.height_opacity)
        }
        OverlayKind::WeakIce => (area.width, area.height, settings.weak_ice_opacity),
        OverlayKind::Ski | OverlayKind::Hike | OverlayKind::Grid => {
            (area.width, area.height, ROUTE_OVERLAY_OPACITY)
        }
    };
    let (base_url, layers) = kind.service();
    let url = GetMapRequest {
        base_url,
        layers,
        width,
        height,
        epsg: area.epsg,
        bbox: area.bbox,
        transparent: true,
    }
    .url();
    debug!(overlay = %kind, width, height, "Fetching overlay");

    let retry = RetryPolicy::for_passes(fetcher.policy());
    let loaded: Arc<RgbaImage> = fetcher.load(&url, &Auth::None, &retry).await?;
    let image = if kind == OverlayKind::Slope {
        let mut masked = (*loaded).clone();
        apply_height_mask(&mut masked, &HEIGHT_MASK_COLORS);
        pixmap_from_rgba(&masked)?
    } else {
        pixmap_from_rgba(&loaded)?
    };
    Ok(OverlayImage { kind, image, opacity })
}

/// Draws an overlay stretched over the whole canvas.
pub fn draw_overlay(canvas: &mut Pixmap, overlay: &OverlayImage) {
    let sx = canvas.width() as f32 / overlay.image.width() as f32;
    let sy = canvas.height() as f32 / overlay.image.height() as f32;
    let paint = PixmapPaint {
        opacity: overlay.opacity.clamp(0.0, 1.0),
        quality: FilterQuality::Bilinear,
        ..PixmapPaint::default()
    };
    canvas.draw_pixmap(0, 0, overlay.image.as_ref(), &paint, Transform::from_scale(sx, sy), None);
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use image::Rgba;
    use tiny_skia::Color;

    use crate::cache::TileCache;
    use crate::config::FetchPolicy;
    use crate::provider::{solid_png, status_error, MockHttpClient};
    use crate::surface::white_surface;

    #[test]
    fn test_height_scale_by_map_scale() {
        assert_eq!(height_scale_for(25_000), 0.55);
        assert_eq!(height_scale_for(50_000), 0.45);
        assert_eq!(height_scale_for(100_000), 0.35);
        assert_eq!(height_scale_for(10_000), 0.45);
    }

    #[test]
    fn test_height_mask_clears_vegetation() {
        let mut image = RgbaImage::new(4, 1);
        image.put_pixel(0, 0, Rgba([0x92, 0xd0, 0x60, 255]));
        // Within tolerance of #d9f08b.
        image.put_pixel(1, 0, Rgba([0xd9 - 18, 0xf0, 0x8b + 10, 200]));
        image.put_pixel(2, 0, Rgba([0xd9 - 19, 0xf0, 0x8b, 255]));
        image.put_pixel(3, 0, Rgba([200, 30, 30, 255]));
        apply_height_mask(&mut image, &HEIGHT_MASK_COLORS);

        assert_eq!(image.get_pixel(0, 0).0[3], 0);
        assert_eq!(image.get_pixel(1, 0).0[3], 0);
        assert_eq!(image.get_pixel(2, 0).0[3], 255);
        assert_eq!(image.get_pixel(3, 0).0[3], 255);
    }

    #[test]
    fn test_overlays_are_ordered_for_drawing() {
        let settings = OverlaySettings {
            layers: BTreeSet::from([OverlayKind::Hike, OverlayKind::Grid, OverlayKind::Slope, OverlayKind::Ski]),
            ..OverlaySettings::default()
        };
        assert_eq!(
            selected_overlays(&settings),
            vec![OverlayKind::Slope, OverlayKind::Ski, OverlayKind::Hike, OverlayKind::Grid]
        );
    }

    #[test]
    fn test_draw_overlay_scales_to_canvas() {
        let mut canvas = white_surface(20, 20).unwrap();
        let mut small = white_surface(10, 10).unwrap();
        small.fill(Color::from_rgba8(0, 0, 255, 255));
        let overlay = OverlayImage {
            kind: OverlayKind::Ski,
            image: small,
            opacity: 1.0,
        };
        draw_overlay(&mut canvas, &overlay);
        let c = canvas.pixel(18, 18).unwrap();
        assert_eq!((c.red(), c.green(), c.blue()), (0, 0, 255));
    }

    fn area() -> OverlayArea {
        OverlayArea {
            bbox: BBox::new(500_000.0, 7_000_000.0, 501_000.0, 7_001_000.0),
            epsg: Epsg::UTM33N,
            width: 100,
            height: 100,
            scale: 25_000,
        }
    }

    #[tokio::test]
    async fn test_slope_overlay_is_requested_smaller() {
        let client = Arc::new(MockHttpClient::always(solid_png(55, 55, [0x92, 0xd0, 0x60, 255])));
        let cache = TileCache::new(10);
        let policy = FetchPolicy::default().without_delays();
        let fetcher = TileFetcher::new(&client, &cache, &policy);
        let settings = OverlaySettings {
            layers: BTreeSet::from([OverlayKind::Slope, OverlayKind::WeakIce]),
            ..OverlaySettings::default()
        };

        let overlays = fetch_overlays(&fetcher, &settings, &area()).await.unwrap();

        assert_eq!(overlays.len(), 2);
        assert_eq!(overlays[0].kind, OverlayKind::Slope);
        assert_eq!(overlays[0].opacity, 0.2);
        // Vegetation green is masked away entirely.
        assert!(overlays[0].image.pixels().iter().all(|p| p.alpha() == 0));
        assert_eq!(overlays[1].opacity, 1.0);

        let calls = client.calls();
        assert!(calls.iter().any(|u| u.contains("helning") && u.contains("width=55&height=55")));
        assert!(calls.iter().any(|u| u.contains("SvekketIs") && u.contains("width=100&height=100")));
    }

    #[tokio::test]
    async fn test_failing_overlay_fails_the_page() {
        let client = Arc::new(MockHttpClient::new(|url| Err(status_error(url, 404))));
        let cache = TileCache::new(10);
        let policy = FetchPolicy::default().without_delays();
        let fetcher = TileFetcher::new(&client, &cache, &policy);
        let settings = OverlaySettings {
            layers: BTreeSet::from([OverlayKind::Hike]),
            ..OverlaySettings::default()
        };
        let err = fetch_overlays(&fetcher, &settings, &area()).await.unwrap_err();
        assert!(matches!(err, TileError::Http(_)));
    }
}
