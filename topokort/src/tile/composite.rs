//! Provider resolution and multi-provider compositing.

use futures::future::join_all;
use tiny_skia::{FillRule, Mask, PathBuilder, Pixmap, PixmapPaint, Transform};
use tracing::{debug, instrument, warn};

use super::capabilities::CapabilitiesStore;
use super::fetch::{FetchReport, TileFetcher};
use super::mercator::fetch_mercator;
use super::native::fetch_native;
use super::TileError;
use crate::border::{BorderResolver, CountryBorder};
use crate::coord::{Point, Projection, ProjectionError};
use crate::geometry::BBox;
use crate::provider::{HttpClient, ProviderId, ProviderRegistry, TileSource};
use crate::surface::{white_surface, SurfaceError};

/// A page area to fill with basemap imagery.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest<'a> {
    /// Page bbox in `projection`'s planar coordinates
    pub bbox: BBox,
    pub projection: &'a Projection,
    pub width: u32,
    pub height: u32,
}

impl PageRequest<'_> {
    /// Metres per output pixel along the coarser axis.
    pub fn desired_resolution(&self) -> f64 {
        (self.bbox.width() / self.width as f64).max(self.bbox.height() / self.height as f64)
    }

    /// Output pixel positions of the top-left, top-right and bottom-left
    /// corners.
    pub fn output_corners(&self) -> [Point; 3] {
        [
            Point::new(0.0, 0.0),
            Point::new(self.width as f64, 0.0),
            Point::new(0.0, self.height as f64),
        ]
    }

    /// Page pixel position of a planar point.
    pub fn to_pixel(&self, p: Point) -> Point {
        Point::new(
            (p.x - self.bbox.minx) / self.bbox.width() * self.width as f64,
            (self.bbox.maxy - p.y) / self.bbox.height() * self.height as f64,
        )
    }
}

/// Basemap raster for one page.
#[derive(Debug)]
pub struct Composite {
    /// Opaque raster of the page's pixel size
    pub image: Pixmap,
    /// Providers that covered the page, in resolution order
    pub providers: Vec<ProviderId>,
    pub report: FetchReport,
    /// Recoverable tile failures and provider errors tolerated on border pages
    pub warnings: Vec<TileError>,
}

/// Fetches and blends basemap imagery for pages.
pub struct Compositor<'a, C> {
    fetcher: TileFetcher<'a, C>,
    capabilities: &'a CapabilitiesStore,
    registry: &'a ProviderRegistry,
    borders: &'a BorderResolver,
}

impl<'a, C: HttpClient + 'static> Compositor<'a, C> {
    pub fn new(
        fetcher: TileFetcher<'a, C>,
        capabilities: &'a CapabilitiesStore,
        registry: &'a ProviderRegistry,
        borders: &'a BorderResolver,
    ) -> Self {
        Self {
            fetcher,
            capabilities,
            registry,
            borders,
        }
    }

    pub fn fetcher(&self) -> &TileFetcher<'a, C> {
        &self.fetcher
    }

    /// Providers whose borders touch the page, falling back to the default
    /// provider. Providers missing from the registry are skipped.
    pub fn resolve_providers(&self, page: &PageRequest<'_>) -> Result<Vec<ProviderId>, TileError> {
        let wgs84 = page.projection.bbox_to_wgs84(&page.bbox)?;
        let providers: Vec<ProviderId> = self
            .borders
            .resolve(&wgs84)
            .into_iter()
            .filter(|id| {
                let known = self.registry.get(*id).is_some();
                if !known {
                    warn!(provider = %id, "Provider not registered, skipping");
                }
                known
            })
            .collect();
        if providers.is_empty() {
            return Err(TileError::AllProvidersFailed);
        }
        Ok(providers)
    }

    /// Fetches the basemap for a page.
    ///
    /// A single provider's error is returned as is. On border pages a
    /// provider that fails is skipped with a warning, unless all fail.
    #[instrument(skip_all, fields(w = page.width, h = page.height))]
    pub async fn fetch_page(&self, page: &PageRequest<'_>) -> Result<Composite, TileError> {
        let providers = self.resolve_providers(page)?;
        let multi = providers.len() > 1;
        let min_max_zoom = self.registry.min_max_zoom(&providers);
        debug!(?providers, "Resolved providers");

        let results = join_all(
            providers
                .iter()
                .map(|id| self.fetch_provider(*id, page, multi, min_max_zoom)),
        )
        .await;

        let mut warnings = Vec::new();
        let mut report = FetchReport::default();
        let mut images = Vec::with_capacity(results.len());
        for (id, result) in providers.iter().zip(results) {
            match result {
                Ok((image, provider_report)) => {
                    report.merge(provider_report);
                    warnings.extend(TileError::classify(
                        provider_report.failed,
                        provider_report.total,
                        self.fetcher.policy().fatal_failure_ratio,
                    ));
                    images.push(Some(image));
                }
                Err(e) if multi => {
                    warn!(provider = %id, error = %e, "Provider fetch failed on border page");
                    warnings.push(e);
                    images.push(None);
                }
                Err(e) => return Err(e),
            }
        }
        if images.iter().all(Option::is_none) {
            return Err(TileError::AllProvidersFailed);
        }

        let clips: Vec<Option<Mask>> = if multi {
            providers
                .iter()
                .map(|id| self.borders.polygon(*id).and_then(|border| clip_mask(border, page)))
                .collect()
        } else {
            Vec::new()
        };
        let image = blend(&images, &clips, page.width, page.height)?;
        Ok(Composite {
            image,
            providers,
            report,
            warnings,
        })
    }

    async fn fetch_provider(
        &self,
        id: ProviderId,
        page: &PageRequest<'_>,
        multi: bool,
        min_max_zoom: u8,
    ) -> Result<(Pixmap, FetchReport), TileError> {
        let provider = self.registry.get(id).ok_or(TileError::AllProvidersFailed)?;
        let policy = self.fetcher.policy();
        if multi {
            // Border pages share one projection across providers.
            return fetch_mercator(
                &self.fetcher,
                provider,
                page,
                self.registry.max_zoom(id),
                Some(policy.border_tile_budget),
            )
            .await;
        }
        if let TileSource::NativeMatrix(source) = &provider.source {
            if let Some(fetched) =
                fetch_native(&self.fetcher, self.capabilities, source, &provider.auth, page).await?
            {
                return Ok(fetched);
            }
        }
        fetch_mercator(&self.fetcher, provider, page, min_max_zoom, None).await
    }
}

/// Even-odd clip of all of a border's rings, projected into page pixels.
/// `None` when the border is unusable, which draws the provider unclipped.
fn clip_mask(border: &CountryBorder, page: &PageRequest<'_>) -> Option<Mask> {
    let path = match border_path(border, page) {
        Ok(path) => path?,
        Err(e) => {
            warn!(error = %e, "Clipping failed, drawing without clip");
            return None;
        }
    };
    let mut mask = Mask::new(page.width, page.height)?;
    mask.fill_path(&path, FillRule::EvenOdd, true, Transform::identity());
    Some(mask)
}

fn border_path(border: &CountryBorder, page: &PageRequest<'_>) -> Result<Option<tiny_skia::Path>, ProjectionError> {
    let mut pb = PathBuilder::new();
    for ring in border.rings() {
        for (i, lonlat) in ring.iter().enumerate() {
            let px = page.to_pixel(page.projection.forward(*lonlat)?);
            if i == 0 {
                pb.move_to(px.x as f32, px.y as f32);
            } else {
                pb.line_to(px.x as f32, px.y as f32);
            }
        }
        pb.close();
    }
    Ok(pb.finish())
}

/// Draws provider images onto a white page.
///
/// One image is drawn as is. Several are drawn as: the first available
/// image unclipped as background, then every image clipped to its mask
/// (unclipped when it has none).
fn blend(images: &[Option<Pixmap>], clips: &[Option<Mask>], width: u32, height: u32) -> Result<Pixmap, SurfaceError> {
    let mut out = white_surface(width, height)?;
    let paint = PixmapPaint::default();
    let identity = Transform::identity();

    if let [Some(only)] = images {
        out.draw_pixmap(0, 0, only.as_ref(), &paint, identity, None);
        return Ok(out);
    }

    if let Some(background) = images.iter().flatten().next() {
        out.draw_pixmap(0, 0, background.as_ref(), &paint, identity, None);
    }
    for (i, image) in images.iter().enumerate() {
        let Some(image) = image else { continue };
        let clip = clips.get(i).and_then(Option::as_ref);
        out.draw_pixmap(0, 0, image.as_ref(), &paint, identity, clip);
    }
    Ok(out)
}
