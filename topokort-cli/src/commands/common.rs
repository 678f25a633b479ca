//! Arguments and helpers shared across CLI commands.

use std::path::PathBuf;
use std::str::FromStr;

use clap::Args;
use topokort::border::{BorderResolver, CountryBorder};
use topokort::config::RenderConfig;
use topokort::layout::{LayoutMode, OrientationChoice, Paper};
use topokort::provider::ProviderId;
use topokort::track::Track;
use tracing::info;

use crate::error::CliError;

/// Input tracks and page layout options.
#[derive(Debug, Args)]
pub struct LayoutArgs {
    /// GPX files; each becomes a separate sub-track, in order
    #[arg(required = true)]
    pub gpx: Vec<PathBuf>,

    /// Map scale denominator (25000, 50000 or 100000)
    #[arg(long)]
    pub scale: Option<u32>,

    /// Paper size (A5, A4, A3)
    #[arg(long)]
    pub paper: Option<Paper>,

    /// Page orientation (auto, portrait, landscape)
    #[arg(long)]
    pub orientation: Option<OrientationChoice>,

    /// Layout strategy (adaptive, greedy, grid)
    #[arg(long)]
    pub layout: Option<LayoutMode>,

    /// Fraction of a page shared with its neighbour
    #[arg(long)]
    pub overlap: Option<f64>,

    /// Fraction of a page kept clear around the track
    #[arg(long)]
    pub margin: Option<f64>,

    /// Print resolution in dots per inch
    #[arg(long)]
    pub dpi: Option<u32>,
}

impl LayoutArgs {
    /// Applies the options given on the command line over `config`.
    pub fn apply(&self, mut config: RenderConfig) -> RenderConfig {
        if let Some(scale) = self.scale {
            config = config.with_scale(scale);
        }
        if let Some(paper) = self.paper {
            config = config.with_paper(paper);
        }
        if let Some(orientation) = self.orientation {
            config = config.with_orientation(orientation);
        }
        if let Some(mode) = self.layout {
            config = config.with_layout_mode(Some(mode));
        }
        if let Some(overlap) = self.overlap {
            config = config.with_overlap(overlap);
        }
        if let Some(margin) = self.margin {
            config = config.with_margin(margin);
        }
        if let Some(dpi) = self.dpi {
            config = config.with_dpi(dpi);
        }
        config
    }

    pub fn read_track(&self) -> Result<Track, CliError> {
        let track = Track::from_files(&self.gpx)?;
        info!(
            files = self.gpx.len(),
            points = track.len(),
            segments = track.segment_count(),
            "Loaded track"
        );
        Ok(track)
    }
}

/// A `--borders ID=FILE` argument.
#[derive(Debug, Clone, PartialEq)]
pub struct BorderSource {
    pub provider: ProviderId,
    pub path: PathBuf,
}

impl FromStr for BorderSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (id, path) = s
            .split_once('=')
            .ok_or_else(|| format!("expected PROVIDER=FILE, got '{s}'"))?;
        if path.trim().is_empty() {
            return Err(format!("missing border file for provider '{id}'"));
        }
        Ok(Self {
            provider: id.parse()?,
            path: PathBuf::from(path.trim()),
        })
    }
}

/// Builds the border resolver from GeoJSON files.
pub fn load_borders(sources: &[BorderSource]) -> Result<BorderResolver, CliError> {
    sources.iter().try_fold(BorderResolver::new(), |resolver, source| {
        let border = CountryBorder::from_file(&source.path)?;
        info!(provider = %source.provider, path = %source.path.display(), "Loaded country border");
        Ok(resolver.with_border(source.provider, border))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_border_source_parsing() {
        let source: BorderSource = "se=borders/sweden.geojson".parse().unwrap();
        assert_eq!(source.provider, ProviderId::Se);
        assert_eq!(source.path, PathBuf::from("borders/sweden.geojson"));

        assert!("sweden.geojson".parse::<BorderSource>().is_err());
        assert!("dk=denmark.geojson".parse::<BorderSource>().is_err());
        assert!("no=".parse::<BorderSource>().is_err());
    }

    #[test]
    fn test_cli_options_override_config() {
        let args = LayoutArgs {
            gpx: vec![PathBuf::from("a.gpx")],
            scale: Some(25_000),
            paper: Some(Paper::A3),
            orientation: None,
            layout: Some(LayoutMode::Grid),
            overlap: None,
            margin: Some(0.2),
            dpi: None,
        };
        let config = args.apply(RenderConfig::default());
        assert_eq!(config.layout.scale, 25_000);
        assert_eq!(config.layout.paper, Paper::A3);
        assert_eq!(config.layout.mode, Some(LayoutMode::Grid));
        assert_eq!(config.layout.margin, 0.2);
        assert_eq!(config.layout.orientation, OrientationChoice::Auto);
        assert_eq!(config.layout.dpi, 300);
    }
}
