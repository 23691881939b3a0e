//! Configuration.
//!
//! [`DownloadConfig`] tunes the download core and is built in code.
//! [`ConfigFile`] loads the same settings, plus store and logging settings
//! for the CLI, from an INI file:
//!
//! ```ini
//! [download]
//! chunk_lookahead = 4
//! stream_buffer_chunks = 8
//! file_buffer_size = 65536
//!
//! [store]
//! directory = /var/lib/rangefetch
//! chunk_size = 1048576
//!
//! [logging]
//! level = info
//! directory = /var/log/rangefetch
//! ```
//!
//! Missing keys fall back to defaults. A value that does not parse is an
//! error naming the section and key.

use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use ini::{Ini, Properties};
use thiserror::Error;

/// Default concurrent chunk fetches per download.
pub const DEFAULT_CHUNK_LOOKAHEAD: usize = 4;

/// Default stream sink capacity, in slices.
pub const DEFAULT_STREAM_BUFFER_CHUNKS: usize = 8;

/// Default file sink write buffer.
pub const DEFAULT_FILE_BUFFER_SIZE: usize = 64 * 1024;

/// Default chunk size for imported objects.
pub const DEFAULT_CHUNK_SIZE: u64 = 1024 * 1024;

/// Configuration for the download core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadConfig {
    /// Concurrent chunk fetches issued ahead of the sink.
    ///
    /// Never less than 1.
    pub chunk_lookahead: usize,

    /// Slices buffered between a stream sink and its response body.
    pub stream_buffer_chunks: usize,

    /// Write buffer of file sinks, in bytes.
    pub file_buffer_size: usize,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            chunk_lookahead: DEFAULT_CHUNK_LOOKAHEAD,
            stream_buffer_chunks: DEFAULT_STREAM_BUFFER_CHUNKS,
            file_buffer_size: DEFAULT_FILE_BUFFER_SIZE,
        }
    }
}

impl DownloadConfig {
    /// Set the chunk look-ahead (clamped to at least 1).
    pub fn with_chunk_lookahead(mut self, lookahead: usize) -> Self {
        self.chunk_lookahead = lookahead.max(1);
        self
    }

    /// Set the stream sink capacity (clamped to at least 1).
    pub fn with_stream_buffer_chunks(mut self, chunks: usize) -> Self {
        self.stream_buffer_chunks = chunks.max(1);
        self
    }

    /// Set the file sink write buffer.
    pub fn with_file_buffer_size(mut self, bytes: usize) -> Self {
        self.file_buffer_size = bytes;
        self
    }
}

/// Where the CLI keeps its objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    /// Root of the directory store.
    pub directory: PathBuf,
    /// Chunk size used when importing files.
    pub chunk_size: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            directory: config_dir()
                .map(|dir| dir.join("store"))
                .unwrap_or_else(|| PathBuf::from("rangefetch-store")),
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Default filter directive, overridden by `RUST_LOG`.
    pub level: String,
    /// Directory for a daily rolling log file. Console only when unset.
    pub directory: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

/// Errors loading a configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse configuration: {0}")]
    Parse(#[from] ini::ParseError),

    #[error("invalid value {value:?} for [{section}] {key}: {reason}")]
    InvalidValue {
        section: String,
        key: String,
        value: String,
        reason: String,
    },
}

/// Settings loaded from the INI configuration file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigFile {
    pub download: DownloadConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl ConfigFile {
    /// Default location, `~/.rangefetch/config.ini`.
    pub fn default_path() -> Option<PathBuf> {
        config_dir().map(|dir| dir.join("config.ini"))
    }

    /// Load from the default location, or defaults if there is none.
    pub fn load_default() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`. A missing file yields defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse INI text.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(contents)?;
        let mut config = Self::default();

        if let Some(section) = ini.section(Some("download")) {
            let download = &mut config.download;
            if let Some(v) = parse_key::<usize>(section, "download", "chunk_lookahead")? {
                download.chunk_lookahead = at_least_one("download", "chunk_lookahead", v)?;
            }
            if let Some(v) = parse_key::<usize>(section, "download", "stream_buffer_chunks")? {
                download.stream_buffer_chunks =
                    at_least_one("download", "stream_buffer_chunks", v)?;
            }
            if let Some(v) = parse_key(section, "download", "file_buffer_size")? {
                download.file_buffer_size = v;
            }
        }

        if let Some(section) = ini.section(Some("store")) {
            if let Some(dir) = non_empty(section, "directory") {
                config.store.directory = expand_home(dir);
            }
            if let Some(v) = parse_key::<u64>(section, "store", "chunk_size")? {
                config.store.chunk_size = at_least_one("store", "chunk_size", v)?;
            }
        }

        if let Some(section) = ini.section(Some("logging")) {
            if let Some(level) = non_empty(section, "level") {
                config.logging.level = level.to_string();
            }
            config.logging.directory = non_empty(section, "directory").map(expand_home);
        }

        Ok(config)
    }
}

/// `~/.rangefetch`.
fn config_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".rangefetch"))
}

fn non_empty<'a>(section: &'a Properties, key: &str) -> Option<&'a str> {
    section.get(key).map(str::trim).filter(|v| !v.is_empty())
}

fn parse_key<T>(section: &Properties, name: &str, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = non_empty(section, key) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::InvalidValue {
            section: name.to_string(),
            key: key.to_string(),
            value: raw.to_string(),
            reason: e.to_string(),
        })
}

fn at_least_one<T>(section: &str, key: &str, value: T) -> Result<T, ConfigError>
where
    T: PartialOrd + From<u8> + ToString,
{
    if value < T::from(1) {
        return Err(ConfigError::InvalidValue {
            section: section.to_string(),
            key: key.to_string(),
            value: value.to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
    Ok(value)
}

fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}
