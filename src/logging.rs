//! Tracing subscriber setup.
//!
//! Events go to stderr (plain or JSON) so command output on stdout stays
//! clean. With a log directory configured, a daily rolling file receives the
//! same events without ANSI colours. `RUST_LOG` overrides the configured level.

use std::path::Path;

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const LOG_FILE_PREFIX: &str = "stockboard.log";

/// Build the filter directive for `level`, deferring to a non-empty `RUST_LOG`.
pub fn filter_directive(level: &str, rust_log: Option<String>) -> String {
    rust_log
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| format!("stockboard={},tower_http=info", level))
}

/// Install the global subscriber. Keep the returned guard alive for the
/// lifetime of the program so buffered file output is flushed.
pub fn init(level: &str, json: bool, log_dir: Option<&Path>) -> Result<Option<WorkerGuard>> {
    let directive = filter_directive(level, std::env::var("RUST_LOG").ok());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("Invalid log filter '{}'", directive))?;

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_writer(writer).with_ansi(false)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    let installed = if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()
    } else {
        registry
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
    };
    installed.context("Failed to install tracing subscriber")?;
    Ok(guard)
}
