//! Topokort - printable topographic maps from GPX tracks
//!
//! Projects a track into its local UTM zone, covers it with fixed-scale
//! pages, fetches and blends national map imagery for each page and writes
//! the result as a multi-page PDF.
//!
//! The main entry point is [`session::RenderSession`]; the engines behind it
//! are usable on their own:
//!
//! - [`coord`] - UTM/WGS84 projection and zone selection
//! - [`layout`] - adaptive, greedy and grid page placement
//! - [`provider`] and [`border`] - map providers and country borders
//! - [`tile`] - tile acquisition, compositing and resilient fetch
//! - [`render`] - page drawing and document assembly

pub mod border;
pub mod cache;
pub mod config;
pub mod coord;
pub mod geometry;
pub mod layout;
pub mod logging;
pub mod provider;
pub mod render;
pub mod session;
pub mod surface;
pub mod tile;
pub mod track;

pub use render::{RenderError, RenderOutcome};
pub use session::RenderSession;
pub use track::Track;
