//! Configuration
//!
//! [`RenderConfig`] carries every render option and the [`FetchPolicy`]
//! tuning constants. [`ConfigFile`] persists both to
//! `~/.topokort/config.ini`; a missing file yields the defaults.

mod file;
mod parser;
mod settings;

pub use file::{config_directory, config_file_path, ConfigFile, ConfigFileError};
pub use settings::{
    FetchPolicy, LoggingSettings, OutputFormat, OverlaySettings, RenderConfig, Rgb, TrackStyle,
    DEFAULT_HEIGHT_OPACITY, DEFAULT_JPEG_QUALITY, DEFAULT_TRACK_COLOR, DEFAULT_TRACK_OPACITY,
    DEFAULT_TRACK_WIDTH, DEFAULT_WEAK_ICE_OPACITY, ROUTE_OVERLAY_OPACITY,
};
