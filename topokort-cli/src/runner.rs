//! Shared command setup: configuration and logging.

use topokort::config::ConfigFile;
use topokort::logging::{init_logging, LoggingGuard};
use tracing::info;

use crate::error::CliError;

/// Loads the configuration file and starts logging for a command.
pub struct CliRunner {
    config: ConfigFile,
    _logging: LoggingGuard,
}

impl CliRunner {
    pub fn new() -> Result<Self, CliError> {
        let config = ConfigFile::load()?;
        let logging = init_logging(&config.logging.directory, &config.logging.file).map_err(CliError::Logging)?;
        Ok(Self {
            config,
            _logging: logging,
        })
    }

    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    pub fn log_startup(&self, command: &str) {
        info!(
            command,
            version = env!("CARGO_PKG_VERSION"),
            log = %self.config.logging.directory.join(&self.config.logging.file).display(),
            "topokort starting"
        );
    }
}
