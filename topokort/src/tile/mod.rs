//! Tile acquisition and compositing engine
//!
//! Turns a page bbox into a basemap raster of the page's exact pixel size.
//! Each provider is fetched along one of two paths, chosen once from its
//! [`TileSource`](crate::provider::TileSource):
//!
//! - **Native matrix** - UTM-aligned WMTS matrices, cropped (same zone) or
//!   affine-warped (neighbouring zone)
//! - **Web Mercator** - XYZ tiles, affine-warped from the page's four
//!   geographic corners
//!
//! Border pages fetch every provider on the Mercator path and blend them
//! with even-odd clipping to each country polygon in page coordinates.
//! All tile loads go through the session [`TileCache`](crate::cache::TileCache)
//! and the two-pass [`TileFetcher`].

mod capabilities;
mod composite;
mod fetch;
mod mercator;
mod mosaic;
mod native;
mod retry;

pub use capabilities::{
    CapabilitiesError, CapabilitiesStore, TileMatrix, TileMatrixSet, TileRange, DEFAULT_TILE_SIZE,
    OGC_PIXEL_SIZE_M,
};
pub use composite::{Composite, Compositor, PageRequest};
pub use fetch::{FetchReport, TileFetcher, TileTask, FAILED_TILE_COLOR};
pub use mercator::{choose_zoom, MercatorPlan};
pub use mosaic::Mosaic;
pub use retry::{with_retry, RetryPolicy, Retryable};

use thiserror::Error;

use crate::cache::TileLoadError;
use crate::coord::ProjectionError;
use crate::provider::HttpError;
use crate::surface::SurfaceError;

/// Tile acquisition failure.
///
/// `Recoverable` is never returned as an `Err` from a fetch: it is the
/// warning attached to a page whose failure ratio stayed under the fatal
/// threshold.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum TileError {
    #[error("{failed}/{total} tiles failed and were filled with a placeholder colour")]
    Recoverable { failed: usize, total: usize },

    #[error("{failed}/{total} tiles failed, too many to produce a usable page")]
    Fatal { failed: usize, total: usize },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Failed to decode image {url}: {message}")]
    Decode { url: String, message: String },

    #[error("All provider tile fetches failed")]
    AllProvidersFailed,

    #[error(transparent)]
    Capabilities(#[from] CapabilitiesError),

    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

impl TileError {
    /// Whether the page can still be used.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, TileError::Recoverable { .. })
    }

    /// Classifies a page's final tile failures against `threshold`.
    ///
    /// No failures gives `None`. An empty page counts as fully failed.
    pub fn classify(failed: usize, total: usize, threshold: f64) -> Option<TileError> {
        if failed == 0 {
            return None;
        }
        let ratio = if total == 0 { 1.0 } else { failed as f64 / total as f64 };
        Some(if ratio > threshold {
            TileError::Fatal { failed, total }
        } else {
            TileError::Recoverable { failed, total }
        })
    }
}

impl From<TileLoadError> for TileError {
    fn from(err: TileLoadError) -> Self {
        match err {
            TileLoadError::Http(e) => TileError::Http(e),
            TileLoadError::Decode { url, message } => TileError::Decode { url, message },
        }
    }
}
