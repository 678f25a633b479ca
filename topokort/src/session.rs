//! Render session
//!
//! A [`RenderSession`] owns everything that lives for one map export: the
//! HTTP client, provider registry, border resolver, tile cache and
//! capabilities store. Caches are never shared between sessions.
//!
//! # Example
//!
//! ```ignore
//! use topokort::provider::{Credentials, ProviderRegistry, ReqwestClient};
//! use topokort::session::RenderSession;
//!
//! let session = RenderSession::new(
//!     ReqwestClient::new()?,
//!     ProviderRegistry::nordic(&Credentials::from_env()),
//!     BorderResolver::new(),
//!     RenderConfig::default(),
//! );
//! let track = Track::from_files(&["tur.gpx"])?;
//! let outcome = session.render(&track, &NoProgress).await?;
//! std::fs::write("tur.pdf", &outcome.document)?;
//! ```

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use crate::border::BorderResolver;
use crate::cache::TileCache;
use crate::config::RenderConfig;
use crate::layout::{compute_layout, Layout, PageSet};
use crate::provider::{HttpClient, ProviderRegistry};
use crate::render::{
    DeclinationModel, DocumentBuilder, PdfDocumentBuilder, RenderError, RenderOutcome, RenderProgress, Renderer,
    UnknownDeclination,
};
use crate::tile::{CapabilitiesStore, Compositor, TileFetcher};
use crate::track::{ProjectedTrack, Track};

/// State for exporting one track.
pub struct RenderSession<C> {
    client: Arc<C>,
    registry: ProviderRegistry,
    borders: BorderResolver,
    cache: TileCache,
    capabilities: CapabilitiesStore,
    config: RenderConfig,
    declination: Box<dyn DeclinationModel>,
    date: Option<NaiveDate>,
}

impl<C: HttpClient + 'static> RenderSession<C> {
    pub fn new(client: C, registry: ProviderRegistry, borders: BorderResolver, config: RenderConfig) -> Self {
        Self {
            client: Arc::new(client),
            registry,
            borders,
            cache: TileCache::new(config.fetch.cache_capacity),
            capabilities: CapabilitiesStore::new(),
            config,
            declination: Box::new(UnknownDeclination),
            date: None,
        }
    }

    /// Model used for the magnetic declination label.
    pub fn with_declination_model(mut self, model: impl DeclinationModel + 'static) -> Self {
        self.declination = Box::new(model);
        self
    }

    /// Fixes the date passed to the declination model; defaults to today.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.date = Some(date);
        self
    }

    pub fn config(&self) -> &RenderConfig {
        &self.config
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &TileCache {
        &self.cache
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    /// Projects `track` and computes its page layout.
    pub fn layout(&self, track: &Track) -> Result<(ProjectedTrack, Layout), RenderError> {
        let projected = ProjectedTrack::new(track)?;
        let layout = compute_layout(&projected.points, &self.config.layout)?;
        info!(
            zone = projected.projection.epsg().zone(),
            pages = layout.pages.len(),
            mode = %layout.mode,
            "{}",
            layout.status
        );
        Ok((projected, layout))
    }

    /// Lays out and renders `track` into a PDF.
    pub async fn render(&self, track: &Track, progress: &dyn RenderProgress) -> Result<RenderOutcome, RenderError> {
        let (projected, layout) = self.layout(track)?;
        self.render_pages(&projected, &layout.pages, PdfDocumentBuilder::new(), progress)
            .await
    }

    /// Renders an existing page set into `document`.
    pub async fn render_pages<D: DocumentBuilder>(
        &self,
        track: &ProjectedTrack,
        pages: &PageSet,
        document: D,
        progress: &dyn RenderProgress,
    ) -> Result<RenderOutcome, RenderError> {
        let fetcher = TileFetcher::new(&self.client, &self.cache, &self.config.fetch);
        let compositor = Compositor::new(fetcher, &self.capabilities, &self.registry, &self.borders);
        let mut renderer = Renderer::new(
            compositor,
            &self.registry,
            &self.cache,
            &self.config,
            self.declination.as_ref(),
        );
        if let Some(date) = self.date {
            renderer = renderer.with_date(date);
        }
        renderer.render(track, pages, document, progress).await
    }
}
