//! Tracing subscriber setup for the replica server.
//!
//! `RUST_LOG` wins over the configured level when set. Output is either
//! human-readable or one JSON object per line.

use crate::config::LoggingSettings;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Output format of the installed subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Plain,
    Json,
}

impl LogFormat {
    /// Resolves the format from the file settings and the `--json-logs` flag.
    pub fn resolve(config: &LoggingSettings, json_override: bool) -> Self {
        if json_override || config.json_format {
            LogFormat::Json
        } else {
            LogFormat::Plain
        }
    }
}

/// Builds the level filter, preferring `RUST_LOG`.
fn level_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Installs the global subscriber.
///
/// Fails if a subscriber is already installed for this process.
pub fn setup_logging(
    config: &LoggingSettings,
    json_override: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let format = LogFormat::resolve(config, json_override);

    let json_layer = (format == LogFormat::Json).then(|| {
        fmt::layer()
            .json()
            .with_file(false)
            .with_line_number(false)
            .with_thread_ids(true)
            .with_thread_names(true)
    });
    let plain_layer = (format == LogFormat::Plain).then(|| {
        fmt::layer()
            .with_ansi(true)
            .with_target(false)
            .with_thread_ids(true)
            .with_thread_names(true)
    });

    tracing_subscriber::registry()
        .with(level_filter(&config.level))
        .with(json_layer)
        .with(plain_layer)
        .try_init()?;

    info!("🔧 Logging at '{}' ({:?})", config.level, format);
    Ok(())
}

/// Logs the startup banner.
pub fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");
    info!("🛰️ Replica server v{}", version);
    info!("   zone interest, owner views, server-side avatar motion");
}
