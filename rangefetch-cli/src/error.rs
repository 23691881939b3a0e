//! CLI error types.

use std::fmt;
use std::io;

use rangefetch::config::ConfigError;
use rangefetch::{DownloadError, StoreError};

/// Errors reported by CLI commands.
#[derive(Debug)]
pub enum CliError {
    /// Invalid or unreadable configuration.
    Config(String),

    /// Failed to load the configuration file.
    ConfigFile(ConfigError),

    /// Failed to create the Tokio runtime.
    RuntimeCreation(String),

    /// The object store failed.
    Store(StoreError),

    /// A download was rejected or failed.
    Download(DownloadError),

    /// A background download ended in the failed state.
    DownloadFailed { id: u64, error: String },

    /// Writing command output failed.
    Output(io::Error),
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::ConfigFile(e) => write!(f, "Configuration error: {}", e),
            CliError::RuntimeCreation(msg) => {
                write!(f, "Failed to create Tokio runtime: {}", msg)
            }
            CliError::Store(e) => write!(f, "Store error: {}", e),
            CliError::Download(e) => write!(f, "Download error: {}", e),
            CliError::DownloadFailed { id, error } => {
                write!(f, "Download {} failed: {}", id, error)
            }
            CliError::Output(e) => write!(f, "Failed to write output: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ConfigFile(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Download(e) => Some(e),
            CliError::Output(e) => Some(e),
            CliError::Config(_) | CliError::RuntimeCreation(_) | CliError::DownloadFailed { .. } => {
                None
            }
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(e: ConfigError) -> Self {
        CliError::ConfigFile(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}

impl From<DownloadError> for CliError {
    fn from(e: DownloadError) -> Self {
        CliError::Download(e)
    }
}

impl From<io::Error> for CliError {
    fn from(e: io::Error) -> Self {
        CliError::Output(e)
    }
}
