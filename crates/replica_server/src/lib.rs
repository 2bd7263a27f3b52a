//! # Replica Server - Main Entry Point
//!
//! Process entry point for the interest-scoped replication server. This
//! crate handles CLI parsing, configuration loading, logging setup and the
//! application lifecycle around [`game_server::GameServer`].
//!
//! ## Quick Start
//!
//! ```bash
//! # Run with default configuration
//! replica_server
//!
//! # Specify custom configuration
//! replica_server --config production.toml
//!
//! # Override specific settings
//! replica_server --bind 0.0.0.0:8080 --log-level debug
//!
//! # JSON logging for production
//! replica_server --json-logs
//! ```
//!
//! ## Configuration
//!
//! The server loads configuration from a TOML file (default: `config.toml`).
//! If the file doesn't exist, a default configuration will be created.
//!
//! ## Signal Handling
//!
//! The server handles graceful shutdown on:
//! - SIGINT (Ctrl+C)
//! - SIGTERM (Unix systems)
//!
//! A second signal during shutdown exits immediately.

use tracing::error;

pub mod app;
pub mod cli;
pub mod config;
pub mod logging;
pub mod signals;

use app::Application;
use cli::CliArgs;
use config::AppConfig;

/// Runs the replica server.
///
/// # Exit Codes
///
/// * **0**: Successful execution and shutdown
/// * **1**: Error during startup, configuration, or runtime
pub async fn init() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Load configuration to get logging settings
    let config = app::apply_overrides(
        AppConfig::load_from_file(&args.config_path)
            .await
            .unwrap_or_default(),
        &args,
    );

    if let Err(e) = logging::setup_logging(&config.logging, args.json_logs) {
        eprintln!("❌ Failed to setup logging: {e}");
        std::process::exit(1);
    }

    match Application::new(args).await {
        Ok(app) => {
            if let Err(e) = app.run().await {
                error!("❌ Application error: {:?}", e);
                std::process::exit(1);
            }
        }
        Err(e) => {
            error!("❌ Failed to start application: {e:?}");
            std::process::exit(1);
        }
    }

    Ok(())
}

// Re-export main types for potential library usage
pub use config::{LoggingSettings, ServerSettings};

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn args(config_path: PathBuf) -> CliArgs {
        CliArgs {
            config_path,
            bind_address: None,
            log_level: None,
            json_logs: false,
        }
    }

    #[test]
    fn test_default_config_converts() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());

        let server_config = config
            .to_server_config()
            .expect("Default config should convert to ServerConfig");
        assert_eq!(server_config.max_connections, 1000);
        assert_eq!(server_config.connection_timeout, 60);
    }

    #[test]
    fn test_cli_overrides_apply() {
        let mut cli = args(PathBuf::from("test.toml"));
        cli.bind_address = Some("127.0.0.1:9000".to_string());
        cli.log_level = Some("debug".to_string());
        cli.json_logs = true;

        let config = app::apply_overrides(AppConfig::default(), &cli);
        assert_eq!(config.server.bind_address, "127.0.0.1:9000");
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
    }

    #[tokio::test]
    async fn test_application_creation() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        assert!(Application::new(args(path.clone())).await.is_ok());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_invalid_override_is_rejected() {
        let dir = TempDir::new().unwrap();
        let mut cli = args(dir.path().join("config.toml"));
        cli.log_level = Some("chatty".to_string());

        assert!(Application::new(cli).await.is_err());
    }
}
