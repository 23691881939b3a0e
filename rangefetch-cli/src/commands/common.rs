//! Common types and utilities shared across CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use rangefetch::{ConfigFile, DirectoryStore};
use tokio::runtime::Runtime;

use crate::error::CliError;

/// Store selection shared by every command.
#[derive(Debug, Clone, Args)]
pub struct StoreArgs {
    /// Root directory of the object store (defaults to [store] directory)
    #[arg(long, value_name = "DIR")]
    pub store: Option<PathBuf>,
}

impl StoreArgs {
    /// Open the store, preferring the CLI flag over the config file.
    pub fn open(&self, config: &ConfigFile) -> Arc<DirectoryStore> {
        let root = self
            .store
            .clone()
            .unwrap_or_else(|| config.store.directory.clone());
        Arc::new(DirectoryStore::new(root))
    }
}

/// Create the multi-threaded runtime commands run on.
pub fn create_runtime() -> Result<Runtime, CliError> {
    Runtime::new().map_err(|e| CliError::RuntimeCreation(e.to_string()))
}

/// Format a byte count for humans.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];

    let mut value = bytes as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    if unit == 0 {
        format!("{} {}", bytes, UNITS[0])
    } else {
        format!("{:.1} {}", value, UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0 B");
        assert_eq!(format_size(1023), "1023 B");
        assert_eq!(format_size(1536), "1.5 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_store_flag_overrides_config() {
        let config = ConfigFile::default();
        let args = StoreArgs {
            store: Some(PathBuf::from("/srv/store")),
        };
        assert_eq!(args.open(&config).root(), PathBuf::from("/srv/store"));

        let args = StoreArgs { store: None };
        assert_eq!(args.open(&config).root(), config.store.directory);
    }
}
