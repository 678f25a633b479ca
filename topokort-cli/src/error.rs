//! CLI error type.

use std::io;
use std::path::PathBuf;

use thiserror::Error;
use topokort::border::BorderError;
use topokort::config::ConfigFileError;
use topokort::provider::HttpError;
use topokort::track::GpxError;
use topokort::RenderError;

/// Errors surfaced to the user. Every variant ends the process with a
/// non-zero exit code.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("{0}")]
    Config(String),

    #[error(transparent)]
    ConfigFile(#[from] ConfigFileError),

    #[error(transparent)]
    Gpx(#[from] GpxError),

    #[error(transparent)]
    Border(#[from] BorderError),

    #[error("Failed to create HTTP client: {0}")]
    Http(#[from] HttpError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("Failed to initialize logging: {0}")]
    Logging(#[source] io::Error),

    #[error("Failed to write {path}: {source}")]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
