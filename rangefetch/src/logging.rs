//! Tracing subscriber setup.
//!
//! Console output goes to stderr so a streamed download can own stdout.
//! When a log directory is configured, a second layer writes to a daily
//! rolling file through a non-blocking writer. `RUST_LOG` overrides the
//! configured level.

use std::io;

use time::format_description::well_known::Rfc3339;
use time::UtcOffset;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

use crate::config::LoggingConfig;

/// File name prefix of rolling log files.
pub const LOG_FILE_PREFIX: &str = "rangefetch.log";

/// Keeps the background log writer alive. Hold it until exit; dropping it
/// flushes buffered lines.
#[derive(Debug)]
pub struct LoggingGuard {
    _file: Option<WorkerGuard>,
}

/// Install the global subscriber.
///
/// # Arguments
///
/// * `config` - Level and optional log directory
/// * `verbose` - Force `debug` for this crate regardless of `config.level`
pub fn init_logging(config: &LoggingConfig, verbose: bool) -> io::Result<LoggingGuard> {
    let directive = if verbose {
        format!("{},rangefetch=debug", config.level)
    } else {
        config.level.clone()
    };
    let filter = || {
        EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&directive))
            .unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // The local offset cannot be determined once threads are running on
    // some platforms; fall back to UTC.
    let timer = OffsetTime::local_rfc_3339()
        .unwrap_or_else(|_| OffsetTime::new(UtcOffset::UTC, Rfc3339));

    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_timer(timer.clone())
        .with_filter(filter());

    let (file_layer, guard) = match &config.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_timer(timer)
                .with_filter(filter());
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file_layer)
        .try_init()
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;

    Ok(LoggingGuard { _file: guard })
}
