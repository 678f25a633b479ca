//! Render command - export a GPX track as a multi-page PDF.

use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use topokort::config::{OutputFormat, RenderConfig, Rgb, TrackStyle};
use topokort::provider::{Credentials, OverlayKind, ProviderRegistry, ReqwestClient};
use topokort::render::{FixedDeclination, PdfDocumentBuilder, RenderProgress};
use topokort::{RenderOutcome, RenderSession};
use tracing::{info, warn};

use super::common::{load_borders, BorderSource, LayoutArgs};
use crate::error::CliError;
use crate::runner::CliRunner;

/// Arguments for the render command.
#[derive(Debug, Args)]
pub struct RenderArgs {
    #[command(flatten)]
    pub layout: LayoutArgs,

    /// Output PDF path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Page image encoding (png, jpeg)
    #[arg(long)]
    pub format: Option<OutputFormat>,

    /// JPEG quality between 0.1 and 1
    #[arg(long)]
    pub quality: Option<f64>,

    /// Convert the basemap to greyscale
    #[arg(long)]
    pub greyscale: bool,

    /// Omit the magnetic declination label
    #[arg(long)]
    pub no_declination: bool,

    /// Magnetic declination east of true north, in degrees
    #[arg(long, allow_hyphen_values = true)]
    pub declination: Option<f64>,

    /// Overlay to draw (slope, weak-ice, ski, hike, grid); repeatable
    #[arg(long = "overlay")]
    pub overlays: Vec<OverlayKind>,

    /// Country border GeoJSON as PROVIDER=FILE (no, se, fi); repeatable
    #[arg(long = "borders")]
    pub borders: Vec<BorderSource>,

    /// Track colour as #rrggbb
    #[arg(long)]
    pub track_color: Option<String>,

    /// Track line width in pixels
    #[arg(long)]
    pub track_width: Option<f32>,

    /// Track opacity between 0 and 1
    #[arg(long)]
    pub track_opacity: Option<f32>,
}

impl RenderArgs {
    fn apply(&self, config: RenderConfig) -> Result<RenderConfig, CliError> {
        let mut config = self.layout.apply(config);
        if let Some(format) = self.format {
            config = config.with_format(format);
        }
        if let Some(quality) = self.quality {
            config = config.with_quality(quality);
        }
        if self.greyscale {
            config = config.with_greyscale(true);
        }
        if self.no_declination {
            config = config.with_declination(false);
        }
        for kind in &self.overlays {
            config = config.with_overlay(*kind);
        }
        let track = self.track_style(config.track)?;
        Ok(config.with_track(track))
    }

    fn track_style(&self, base: TrackStyle) -> Result<TrackStyle, CliError> {
        let color = match &self.track_color {
            Some(raw) => raw.parse::<Rgb>().map_err(CliError::Config)?,
            None => base.color,
        };
        let width = self.track_width.unwrap_or(base.width);
        if !(width.is_finite() && width > 0.0) {
            return Err(CliError::Config(format!("Track width must be positive, got {width}")));
        }
        let opacity = self.track_opacity.unwrap_or(base.opacity);
        if !(0.0..=1.0).contains(&opacity) {
            return Err(CliError::Config(format!(
                "Track opacity must be between 0 and 1, got {opacity}"
            )));
        }
        Ok(TrackStyle { color, width, opacity })
    }
}

/// Drives an indicatif bar from render progress callbacks.
struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    fn new() -> Self {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.enable_steady_tick(Duration::from_millis(120));
        Self { bar }
    }
}

impl RenderProgress for BarProgress {
    fn status(&self, message: &str) {
        self.bar.set_message(message.to_string());
    }

    fn pages_rendered(&self, completed: usize, total: usize) {
        self.bar.set_length(total as u64);
        self.bar.set_position(completed as u64);
    }
}

/// Run the render command.
pub async fn run(args: RenderArgs) -> Result<(), CliError> {
    let runner = CliRunner::new()?;
    runner.log_startup("render");

    let config = args.apply(runner.config().render.clone())?;
    let track = args.layout.read_track()?;
    let borders = load_borders(&args.borders)?;
    let registry = ProviderRegistry::nordic(&Credentials::from_env());
    let client = ReqwestClient::new()?;

    let mut session = RenderSession::new(client, registry, borders, config);
    if let Some(degrees) = args.declination {
        session = session.with_declination_model(FixedDeclination(degrees));
    }

    let (projected, layout) = session.layout(&track)?;
    println!("{}", layout.status);

    let progress = BarProgress::new();
    let result = session
        .render_pages(&projected, &layout.pages, PdfDocumentBuilder::new(), &progress)
        .await;
    match &result {
        Ok(_) => progress.bar.finish_with_message("done"),
        Err(_) => progress.bar.abandon_with_message("failed"),
    }
    let outcome = result?;

    write_document(&args.output, &outcome.document)?;
    print_summary(&args.output, &outcome);
    Ok(())
}

fn write_document(path: &Path, document: &[u8]) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| CliError::Output {
            path: path.to_path_buf(),
            source,
        })?;
    }
    std::fs::write(path, document).map_err(|source| CliError::Output {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), bytes = document.len(), "Wrote document");
    Ok(())
}

fn print_summary(path: &Path, outcome: &RenderOutcome) {
    println!();
    println!("Wrote {} ({} pages)", path.display(), outcome.pages);
    println!("Map data: {}", outcome.attribution);
    for note in &outcome.scale_warnings {
        println!("Note: {note}");
    }
    if outcome.report.failed > 0 {
        println!(
            "Tiles: {} fetched, {} recovered on retry, {} replaced with placeholders",
            outcome.report.total, outcome.report.recovered, outcome.report.failed
        );
    }
    for w in &outcome.warnings {
        warn!(page = w.page, error = %w.error, "Page warning");
        println!("Warning: page {}: {}", w.page, w.error);
    }
}
