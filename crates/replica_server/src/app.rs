//! Main application logic and lifecycle management.
//!
//! This module contains the `Application` struct that orchestrates server
//! startup, statistics reporting, and shutdown.

use crate::{
    cli::CliArgs,
    config::AppConfig,
    logging::display_banner,
    signals::{setup_signal_handlers, setup_signal_handlers_silent},
};
use game_server::GameServer;
use replication_core::ReplicationService;
use std::sync::Arc;
use tokio::time::Duration;
use tracing::{error, info, warn};

/// Main application struct.
///
/// Manages the lifecycle of the replica server: configuration, server
/// initialization, periodic statistics and graceful shutdown.
pub struct Application {
    /// Loaded application configuration
    config: AppConfig,
    /// Game server instance
    server: Arc<GameServer>,
}

impl Application {
    /// Creates a new application instance.
    ///
    /// # Process
    ///
    /// 1. Load configuration from file (creating default if missing)
    /// 2. Apply command-line argument overrides
    /// 3. Validate merged configuration
    /// 4. Display startup banner
    /// 5. Initialize the game server
    pub async fn new(args: CliArgs) -> Result<Self, Box<dyn std::error::Error>> {
        info!("🔧 Loading configuration from: {}", args.config_path.display());
        let config = AppConfig::load_from_file(&args.config_path).await?;
        info!("✅ Configuration loaded successfully from {}", args.config_path.display());

        let config = apply_overrides(config, &args);
        if let Err(e) = config.validate() {
            return Err(format!("Configuration validation failed: {e}").into());
        }
        info!("✅ Configuration validated");

        display_banner();

        let server_config = config.to_server_config()?;
        let server = Arc::new(GameServer::new(server_config)?);

        Ok(Self { config, server })
    }

    /// Runs the server until a shutdown signal arrives.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the application ran and shut down successfully, or an
    /// error if the server failed to start.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        info!("🌟 Starting replica server");
        self.log_configuration_summary();

        let service = self.server.get_replication_service();
        log_statistics("📊 Initial replication state", &service).await;

        let listener = self.server.bind().await?;
        let server_handle = {
            let server = self.server.clone();
            tokio::spawn(async move {
                match server.serve(listener).await {
                    Ok(()) => info!("✅ Server completed successfully"),
                    Err(e) => error!("❌ Server error: {:?}", e),
                }
            })
        };

        let monitoring_handle = {
            let service = service.clone();
            let period = Duration::from_secs(self.config.server.stats_interval_secs);
            tokio::spawn(async move {
                let mut interval = tokio::time::interval(period);
                interval.tick().await;
                let mut last_ticks = 0u64;

                loop {
                    interval.tick().await;
                    let stats = service.stats().await;
                    info!(
                        "📊 Replication - {} objects | {} channels | {} interests | {} owners | {} ticks this period",
                        stats.objects,
                        stats.channels,
                        stats.interests,
                        stats.ownership_bindings,
                        stats.ticks.saturating_sub(last_ticks)
                    );
                    last_ticks = stats.ticks;
                }
            })
        };

        info!("✅ Replica server is now running!");
        info!("🎮 Ready to accept connections on {}", self.config.server.bind_address);
        info!("🛑 Press Ctrl+C to gracefully shutdown");

        setup_signal_handlers().await?;

        // A second signal skips the graceful path
        tokio::spawn(async move {
            if let Err(e) = setup_signal_handlers_silent().await {
                error!("Failed to set up forced shutdown signal handler: {e}");
                return;
            }
            warn!("Shutdown signal received again, exiting immediately");
            std::process::exit(1);
        });

        monitoring_handle.abort();
        self.server.shutdown().await?;

        info!("⏳ Waiting for server task to complete...");
        match tokio::time::timeout(Duration::from_secs(8), server_handle).await {
            Ok(_) => info!("✅ Server task completed gracefully"),
            Err(_) => warn!("⏰ Server task did not complete within timeout"),
        }

        log_statistics("📊 Final replication state", &service).await;
        info!("✅ Replica server shutdown complete");
        Ok(())
    }

    /// Logs the configuration summary at startup.
    fn log_configuration_summary(&self) {
        let replication = &self.config.replication;
        info!("📋 Configuration Summary:");
        info!("  🌐 Bind address: {}", self.config.server.bind_address);
        info!("  👥 Max connections: {}", self.config.server.max_connections);
        info!("  ⏱️ Tick interval: {}ms", self.config.server.tick_interval_ms);
        info!("  🔑 Session root: {}", replication.session_root_id);
        info!(
            "  🆔 Object ids: {}..={}",
            replication.min_object_id, replication.max_object_id
        );
        info!("  🚨 Intent policy: {:?}", replication.intent_policy);
    }
}

/// Applies command-line overrides on top of the file configuration.
pub fn apply_overrides(mut config: AppConfig, args: &CliArgs) -> AppConfig {
    if let Some(bind_address) = &args.bind_address {
        config.server.bind_address = bind_address.clone();
    }
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }
    config
}

async fn log_statistics(title: &str, service: &ReplicationService) {
    let stats = service.stats().await;
    info!("{}:", title);
    info!("  - Objects: {}", stats.objects);
    info!("  - Channels: {}", stats.channels);
    info!("  - Interest registrations: {}", stats.interests);
    info!("  - Ownership bindings: {}", stats.ownership_bindings);
    info!("  - Scheduled motion tasks: {}", stats.scheduled_tasks);
    info!("  - Ticks: {}", stats.ticks);
}
