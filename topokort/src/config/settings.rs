//! Render settings with their defaults.

use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::geometry::clamp_quality;
use crate::layout::{LayoutMode, LayoutOptions, OrientationChoice, Paper};
use crate::provider::OverlayKind;

/// Default track colour.
pub const DEFAULT_TRACK_COLOR: Rgb = Rgb(0xff, 0x00, 0x00);

/// Default track stroke width in pixels.
pub const DEFAULT_TRACK_WIDTH: f32 = 4.0;

/// Default track opacity.
pub const DEFAULT_TRACK_OPACITY: f32 = 0.8;

/// Default opacity of the slope overlay.
pub const DEFAULT_HEIGHT_OPACITY: f32 = 0.2;

/// Default opacity of the weak-ice overlay.
pub const DEFAULT_WEAK_ICE_OPACITY: f32 = 1.0;

/// Opacity of route and grid overlays.
pub const ROUTE_OVERLAY_OPACITY: f32 = 1.0;

/// Default JPEG quality in `[0.1, 1]`.
pub const DEFAULT_JPEG_QUALITY: f64 = 0.9;

/// An opaque sRGB colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl FromStr for Rgb {
    type Err = String;

    /// Parses `#rrggbb` or `#rgb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let hex = s.trim().trim_start_matches('#');
        let expanded: String = match hex.len() {
            3 => hex.chars().flat_map(|c| [c, c]).collect(),
            6 => hex.to_string(),
            _ => return Err(format!("invalid colour '{s}', expected #rrggbb")),
        };
        let channel = |i: usize| {
            u8::from_str_radix(&expanded[i..i + 2], 16)
                .map_err(|_| format!("invalid colour '{s}', expected #rrggbb"))
        };
        Ok(Rgb(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.0, self.1, self.2)
    }
}

/// Encoding of the page rasters embedded in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    Png,
    #[default]
    Jpeg,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Png => "png",
            OutputFormat::Jpeg => "jpeg",
        })
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "png" | "image/png" => Ok(OutputFormat::Png),
            "jpeg" | "jpg" | "image/jpeg" => Ok(OutputFormat::Jpeg),
            other => Err(format!("unknown image format '{other}' (expected png or jpeg)")),
        }
    }
}

/// How the track polyline is stroked.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackStyle {
    pub color: Rgb,
    pub width: f32,
    pub opacity: f32,
}

impl Default for TrackStyle {
    fn default() -> Self {
        Self {
            color: DEFAULT_TRACK_COLOR,
            width: DEFAULT_TRACK_WIDTH,
            opacity: DEFAULT_TRACK_OPACITY,
        }
    }
}

/// Selected overlay layers and their opacities.
#[derive(Debug, Clone, PartialEq)]
pub struct OverlaySettings {
    pub layers: BTreeSet<OverlayKind>,
    pub height_opacity: f32,
    pub weak_ice_opacity: f32,
    /// Slope overlay raster size as a fraction of the page; `None` picks
    /// a factor from the map scale
    pub height_scale_factor: Option<f64>,
}

impl Default for OverlaySettings {
    fn default() -> Self {
        Self {
            layers: BTreeSet::new(),
            height_opacity: DEFAULT_HEIGHT_OPACITY,
            weak_ice_opacity: DEFAULT_WEAK_ICE_OPACITY,
            height_scale_factor: None,
        }
    }
}

impl OverlaySettings {
    pub fn contains(&self, kind: OverlayKind) -> bool {
        self.layers.contains(&kind)
    }
}

/// Tuning for tile fetching, caching and page batching.
///
/// The failure ratio and backoff constants are empirical; they are kept
/// configurable rather than treated as correctness thresholds.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchPolicy {
    /// Concurrent tile fetches in the first pass
    pub concurrency: usize,
    /// Concurrent tile fetches when retrying first-pass failures
    pub retry_concurrency: usize,
    /// Retries per tile within each pass
    pub retries_per_pass: u32,
    /// Retries inside a single cached tile request
    pub request_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Lower bound applied to server `Retry-After` delays
    pub min_retry_after: Duration,
    /// Page fails when more than this fraction of its tiles failed
    pub fatal_failure_ratio: f64,
    /// Tile budget for a single-provider page
    pub page_tile_budget: usize,
    /// Tile budget per provider on a border page
    pub border_tile_budget: usize,
    pub cache_capacity: usize,
    /// Pages rendered before embedding into the document
    pub batch_size: usize,
    /// Pages rendered concurrently within a batch
    pub page_workers: usize,
    /// Retries for the WMTS capabilities document
    pub capabilities_retries: u32,
    /// Delay unit for capabilities retries (`unit × (attempt + 1)`)
    pub capabilities_retry_delay: Duration,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            concurrency: 8,
            retry_concurrency: 3,
            retries_per_pass: 1,
            request_retries: 2,
            base_delay: Duration::from_millis(350),
            max_delay: Duration::from_millis(5000),
            min_retry_after: Duration::from_millis(50),
            fatal_failure_ratio: 0.2,
            page_tile_budget: 120,
            border_tile_budget: 500,
            cache_capacity: crate::cache::DEFAULT_CACHE_CAPACITY,
            batch_size: 12,
            page_workers: 4,
            capabilities_retries: 2,
            capabilities_retry_delay: Duration::from_millis(1000),
        }
    }
}

impl FetchPolicy {
    /// Policy without backoff sleeps, for tests and offline runs.
    pub fn without_delays(mut self) -> Self {
        self.base_delay = Duration::ZERO;
        self.max_delay = Duration::ZERO;
        self.min_retry_after = Duration::ZERO;
        self.capabilities_retry_delay = Duration::ZERO;
        self
    }
}

/// Everything a render needs besides the track and the network.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderConfig {
    pub layout: LayoutOptions,
    pub track: TrackStyle,
    pub overlays: OverlaySettings,
    pub format: OutputFormat,
    /// JPEG quality, clamped to `[0.1, 1]` when encoding
    pub quality: f64,
    pub greyscale: bool,
    /// Draw the magnetic declination label
    pub declination: bool,
    pub fetch: FetchPolicy,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            layout: LayoutOptions::default(),
            track: TrackStyle::default(),
            overlays: OverlaySettings::default(),
            format: OutputFormat::default(),
            quality: DEFAULT_JPEG_QUALITY,
            greyscale: false,
            declination: true,
            fetch: FetchPolicy::default(),
        }
    }
}

impl RenderConfig {
    pub fn with_scale(mut self, scale: u32) -> Self {
        self.layout.scale = scale;
        self
    }

    pub fn with_paper(mut self, paper: Paper) -> Self {
        self.layout.paper = paper;
        self
    }

    pub fn with_dpi(mut self, dpi: u32) -> Self {
        self.layout.dpi = dpi;
        self
    }

    pub fn with_orientation(mut self, orientation: OrientationChoice) -> Self {
        self.layout.orientation = orientation;
        self
    }

    pub fn with_layout_mode(mut self, mode: Option<LayoutMode>) -> Self {
        self.layout.mode = mode;
        self
    }

    pub fn with_overlap(mut self, overlap: f64) -> Self {
        self.layout.overlap = overlap;
        self
    }

    pub fn with_margin(mut self, margin: f64) -> Self {
        self.layout.margin = margin;
        self
    }

    pub fn with_track(mut self, track: TrackStyle) -> Self {
        self.track = track;
        self
    }

    pub fn with_overlay(mut self, kind: OverlayKind) -> Self {
        self.overlays.layers.insert(kind);
        self
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_quality(mut self, quality: f64) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_greyscale(mut self, greyscale: bool) -> Self {
        self.greyscale = greyscale;
        self
    }

    pub fn with_declination(mut self, declination: bool) -> Self {
        self.declination = declination;
        self
    }

    pub fn with_fetch_policy(mut self, fetch: FetchPolicy) -> Self {
        self.fetch = fetch;
        self
    }

    /// Quality actually passed to the JPEG encoder.
    pub fn effective_quality(&self) -> f64 {
        clamp_quality(self.quality)
    }
}

/// Log file location.
#[derive(Debug, Clone, PartialEq)]
pub struct LoggingSettings {
    pub directory: PathBuf,
    pub file: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            directory: super::file::config_directory().join("logs"),
            file: "topokort.log".to_string(),
        }
    }
}
