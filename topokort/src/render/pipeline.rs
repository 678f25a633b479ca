//! Batched page rendering and document assembly.

use std::collections::BTreeSet;
use std::time::{Duration, Instant};

use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use tiny_skia::Pixmap;
use tracing::{debug, info, instrument, warn};

use super::canvas::{
    apply_contrast, apply_greyscale, draw_declination_label, draw_page_label, draw_track, draw_utm_grid,
    GridStyle, TrackPaint, GREYSCALE_CONTRAST, GREYSCALE_HALO_EXTRA, GRID_SPACING_M,
};
use super::declination::DeclinationModel;
use super::document::DocumentBuilder;
use super::encode::{encode_page, EncodedImage};
use super::overlay::{draw_overlay, fetch_overlays, OverlayArea};
use super::RenderError;
use crate::cache::{CacheStats, TileCache};
use crate::config::{RenderConfig, Rgb};
use crate::coord::{grid_convergence, optimal_norway_epsg, Epsg, Point, Projection};
use crate::geometry::BBox;
use crate::layout::{Page, PageSet};
use crate::provider::{HttpClient, ProviderId, ProviderRegistry};
use crate::tile::{Compositor, FetchReport, PageRequest, TileError};
use crate::track::ProjectedTrack;

/// Minimum time between two progress callbacks.
pub const PROGRESS_INTERVAL: Duration = Duration::from_millis(100);

/// Receives render progress. Both methods default to doing nothing.
pub trait RenderProgress: Send + Sync {
    fn status(&self, _message: &str) {}

    fn pages_rendered(&self, _completed: usize, _total: usize) {}
}

/// Ignores all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl RenderProgress for NoProgress {}

/// Rate-limits `pages_rendered` calls; `flush` reports anything held back.
struct ProgressThrottle<'a> {
    sink: &'a dyn RenderProgress,
    total: usize,
    interval: Duration,
    last: Option<Instant>,
    pending: Option<usize>,
}

impl<'a> ProgressThrottle<'a> {
    fn new(sink: &'a dyn RenderProgress, total: usize, interval: Duration) -> Self {
        Self {
            sink,
            total,
            interval,
            last: None,
            pending: None,
        }
    }

    fn update(&mut self, completed: usize) {
        self.pending = Some(completed);
        let now = Instant::now();
        if self.last.is_some_and(|last| now.duration_since(last) < self.interval) {
            return;
        }
        self.last = Some(now);
        self.emit();
    }

    fn flush(&mut self) {
        self.emit();
    }

    fn emit(&mut self) {
        if let Some(completed) = self.pending.take() {
            self.sink
                .status(&format!("Rendering page {completed} / {}...", self.total));
            self.sink.pages_rendered(completed, self.total);
        }
    }
}

/// Clears the tile cache when dropped, so every exit path releases it.
struct CacheRelease<'a>(&'a TileCache);

impl Drop for CacheRelease<'_> {
    fn drop(&mut self) {
        self.0.clear();
    }
}

/// A recoverable problem on one page.
#[derive(Debug, Clone, PartialEq)]
pub struct PageWarning {
    /// 1-based page number
    pub page: usize,
    pub error: TileError,
}

/// Result of a finished render.
#[derive(Debug, Clone)]
pub struct RenderOutcome {
    /// Serialised document
    pub document: Vec<u8>,
    pub pages: usize,
    /// Providers used on any page, in registry order
    pub providers: Vec<ProviderId>,
    pub attribution: String,
    /// Provider quality notes for the chosen scale
    pub scale_warnings: Vec<&'static str>,
    pub warnings: Vec<PageWarning>,
    pub report: FetchReport,
    pub cache: CacheStats,
}

struct RenderedPage {
    index: usize,
    image: EncodedImage,
    size_pt: (f32, f32),
    providers: Vec<ProviderId>,
    report: FetchReport,
    warnings: Vec<TileError>,
}

/// Renders pages of one track into a document.
pub struct Renderer<'a, C> {
    compositor: Compositor<'a, C>,
    registry: &'a ProviderRegistry,
    cache: &'a TileCache,
    config: &'a RenderConfig,
    declination: &'a dyn DeclinationModel,
    date: NaiveDate,
}

impl<'a, C: HttpClient + 'static> Renderer<'a, C> {
    pub fn new(
        compositor: Compositor<'a, C>,
        registry: &'a ProviderRegistry,
        cache: &'a TileCache,
        config: &'a RenderConfig,
        declination: &'a dyn DeclinationModel,
    ) -> Self {
        Self {
            compositor,
            registry,
            cache,
            config,
            declination,
            date: chrono::Utc::now().date_naive(),
        }
    }

    /// Date passed to the declination model.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = date;
        self
    }

    /// Renders every page and serialises `document`.
    ///
    /// Any page error aborts the render. The tile cache is cleared before
    /// serialisation and again on every exit path.
    pub async fn render<D: DocumentBuilder>(
        &self,
        track: &ProjectedTrack,
        pages: &PageSet,
        mut document: D,
        progress: &dyn RenderProgress,
    ) -> Result<RenderOutcome, RenderError> {
        let _release = CacheRelease(self.cache);
        let total = pages.len();
        if total == 0 {
            return Err(RenderError::NoPages);
        }
        let policy = &self.config.fetch;
        let batch_size = policy.batch_size.max(1);
        let workers = policy.page_workers.max(1);
        info!(pages = total, batch_size, workers, "Rendering");

        let mut throttle = ProgressThrottle::new(progress, total, PROGRESS_INTERVAL);
        progress.status(&format!("Rendering page 0 / {total}..."));
        progress.pages_rendered(0, total);

        let mut providers = BTreeSet::new();
        let mut warnings = Vec::new();
        let mut report = FetchReport::default();
        let mut completed = 0;

        for (batch, chunk) in pages.pages().chunks(batch_size).enumerate() {
            let start = batch * batch_size;
            let mut slots: Vec<Option<RenderedPage>> = (0..chunk.len()).map(|_| None).collect();

            let mut rendered = stream::iter(chunk.iter().enumerate())
                .map(|(i, page)| self.render_page(start + i, page, track))
                .buffer_unordered(workers);
            while let Some(result) = rendered.next().await {
                let page = result?;
                completed += 1;
                throttle.update(completed);
                let slot = page.index - start;
                slots[slot] = Some(page);
            }
            drop(rendered);
            throttle.flush();

            progress.status("Assembling document...");
            for page in slots.into_iter().flatten() {
                providers.extend(page.providers.iter().copied());
                report.merge(page.report);
                warnings.extend(page.warnings.into_iter().map(|error| PageWarning {
                    page: page.index + 1,
                    error,
                }));
                document.add_page(page.image, page.size_pt)?;
            }
            debug!(batch, embedded = document.page_count(), "Batch embedded");
            tokio::task::yield_now().await;
        }

        let cache = self.cache.stats();
        self.cache.clear();
        let bytes = document.finish()?;

        let providers: Vec<ProviderId> = providers.into_iter().collect();
        for w in &warnings {
            warn!(page = w.page, error = %w.error, "Page rendered with warnings");
        }
        info!(pages = total, bytes = bytes.len(), %cache, "Render complete");
        Ok(RenderOutcome {
            document: bytes,
            pages: total,
            attribution: self.registry.combined_attribution(&providers),
            scale_warnings: self.registry.scale_warnings(&providers, self.config.layout.scale),
            providers,
            warnings,
            report,
            cache,
        })
    }

    #[instrument(skip_all, fields(page = index + 1))]
    async fn render_page(&self, index: usize, page: &Page, track: &ProjectedTrack) -> Result<RenderedPage, RenderError> {
        let source = &track.projection;
        let wgs84 = source.bbox_to_wgs84(&page.bbox)?;
        let epsg = optimal_norway_epsg((wgs84.minx + wgs84.maxx) / 2.0);
        let local = Projection::new(epsg)?;
        let bbox = if epsg == source.epsg() {
            page.bbox
        } else {
            debug!(from = %source.epsg(), to = %epsg, "Reprojecting page");
            source.bbox_to(&page.bbox, &local)?
        };
        let (width, height) = (page.metrics.w_px, page.metrics.h_px);

        let request = PageRequest {
            bbox,
            projection: &local,
            width,
            height,
        };
        let area = OverlayArea {
            bbox,
            epsg,
            width,
            height,
            scale: self.config.layout.scale,
        };
        let (composite, overlays) = futures::try_join!(
            self.compositor.fetch_page(&request),
            fetch_overlays(self.compositor.fetcher(), &self.config.overlays, &area),
        )?;

        let mut canvas = composite.image;
        let points = track.points_in(&local)?;
        self.draw_page(&mut canvas, index, &bbox, epsg, &local, &points, &track.breaks, &overlays)?;

        let image = encode_page(&canvas, self.config.format, self.config.quality)?;
        debug!(bytes = image.data.len(), "Page encoded");
        Ok(RenderedPage {
            index,
            image,
            size_pt: page.metrics.size_pt(),
            providers: composite.providers,
            report: composite.report,
            warnings: composite.warnings,
        })
    }

    #[allow(clippy::too_many_arguments)]
    fn draw_page(
        &self,
        canvas: &mut Pixmap,
        index: usize,
        bbox: &BBox,
        epsg: Epsg,
        local: &Projection,
        points: &[Point],
        breaks: &[usize],
        overlays: &[super::overlay::OverlayImage],
    ) -> Result<(), RenderError> {
        let config = self.config;
        let greyscale = config.greyscale;

        if !greyscale {
            draw_utm_grid(canvas, bbox, GRID_SPACING_M, &GridStyle::colour());
        }
        for overlay in overlays {
            draw_overlay(canvas, overlay);
        }
        if greyscale {
            apply_greyscale(canvas);
            apply_contrast(canvas, GREYSCALE_CONTRAST);
            draw_utm_grid(canvas, bbox, GRID_SPACING_M, &GridStyle::greyscale());
        }

        if greyscale {
            let halo = TrackPaint {
                color: Rgb(0xff, 0xff, 0xff),
                opacity: 1.0,
                width: config.track.width + GREYSCALE_HALO_EXTRA,
            };
            draw_track(canvas, points, breaks, bbox, &halo);
            let dark = TrackPaint {
                color: Rgb(0x1a, 0x1a, 0x1a),
                opacity: 1.0,
                width: config.track.width,
            };
            draw_track(canvas, points, breaks, bbox, &dark);
        } else {
            let paint = TrackPaint {
                color: config.track.color,
                opacity: config.track.opacity,
                width: config.track.width,
            };
            draw_track(canvas, points, breaks, bbox, &paint);
        }

        draw_page_label(canvas, index + 1, config.layout.scale, epsg, greyscale);
        if config.declination {
            let center = local.inverse(bbox.center())?;
            let declination = self.declination.declination(center, self.date).unwrap_or(f64::NAN);
            let convergence = grid_convergence(center.lon, center.lat, epsg);
            draw_declination_label(canvas, declination, convergence, greyscale);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        calls: Mutex<Vec<(usize, usize)>>,
    }

    impl RenderProgress for Recorder {
        fn pages_rendered(&self, completed: usize, total: usize) {
            self.calls.lock().unwrap().push((completed, total));
        }
    }

    #[test]
    fn test_throttle_holds_back_fast_updates() {
        let recorder = Recorder::default();
        let mut throttle = ProgressThrottle::new(&recorder, 5, Duration::from_secs(3600));
        throttle.update(1);
        throttle.update(2);
        throttle.update(3);
        assert_eq!(*recorder.calls.lock().unwrap(), vec![(1, 5)]);

        throttle.flush();
        assert_eq!(*recorder.calls.lock().unwrap(), vec![(1, 5), (3, 5)]);

        // Nothing pending, nothing reported.
        throttle.flush();
        assert_eq!(recorder.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn test_throttle_without_interval_reports_everything() {
        let recorder = Recorder::default();
        let mut throttle = ProgressThrottle::new(&recorder, 2, Duration::ZERO);
        throttle.update(1);
        throttle.update(2);
        assert_eq!(*recorder.calls.lock().unwrap(), vec![(1, 2), (2, 2)]);
    }

    #[test]
    fn test_cache_release_on_drop() {
        let cache = TileCache::new(4);
        {
            let _release = CacheRelease(&cache);
        }
        assert!(cache.is_empty());
    }
}
