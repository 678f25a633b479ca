//! Page rendering pipeline
//!
//! Turns a projected track and its page set into a finished document:
//!
//! - **Basemap** - composited provider imagery for each page ([`crate::tile`])
//! - **Overlays** - WMS slope, weak ice, route and grid layers ([`overlay`])
//! - **Canvas** - UTM grid, greyscale filter, track and labels ([`canvas`])
//! - **Output** - page encoding and document assembly ([`encode`], [`document`])
//!
//! Pages are rendered in batches with a bounded number of pages in flight
//! and embedded strictly in page order.

pub mod canvas;
pub mod declination;
pub mod document;
pub mod encode;
pub mod label;
pub mod overlay;
mod pipeline;

pub use declination::{DeclinationModel, FixedDeclination, UnknownDeclination};
pub use document::{DocumentBuilder, DocumentError, PdfDocumentBuilder};
pub use encode::{encode_page, EncodedImage};
pub use pipeline::{NoProgress, PageWarning, RenderOutcome, RenderProgress, Renderer, PROGRESS_INTERVAL};

use thiserror::Error;

use crate::border::BorderError;
use crate::config::ConfigFileError;
use crate::coord::ProjectionError;
use crate::surface::SurfaceError;
use crate::tile::{CapabilitiesError, TileError};
use crate::track::GpxError;

/// Any failure that aborts a render.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Projection(#[from] ProjectionError),

    #[error(transparent)]
    Tile(#[from] TileError),

    #[error(transparent)]
    Capabilities(#[from] CapabilitiesError),

    #[error(transparent)]
    Surface(#[from] SurfaceError),

    #[error(transparent)]
    Gpx(#[from] GpxError),

    #[error(transparent)]
    Config(#[from] ConfigFileError),

    #[error(transparent)]
    Border(#[from] BorderError),

    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error("Failed to encode page image: {0}")]
    Encode(#[from] image::ImageError),

    #[error("Layout produced no pages")]
    NoPages,
}

impl RenderError {
    /// The surface error behind this failure, directly or through a tile
    /// fetch, if any.
    pub fn surface(&self) -> Option<&SurfaceError> {
        match self {
            RenderError::Surface(e) | RenderError::Tile(TileError::Surface(e)) => Some(e),
            _ => None,
        }
    }
}
