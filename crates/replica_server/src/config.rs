//! Configuration management for the replica server.
//!
//! This module handles loading, validation, and conversion of server
//! configuration from TOML files and command-line arguments.

use game_server::{SecurityConfig, ServerConfig};
use replication_core::ReplicationConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Default tick interval for serde deserialization
fn default_tick_interval() -> u64 {
    50 // 20 ticks per second
}

/// Default for connection_timeout
fn default_connection_timeout() -> u64 {
    60
}

/// Default for max_connections
fn default_max_connections() -> usize {
    1000
}

/// Default for stats_interval_secs
fn default_stats_interval() -> u64 {
    60
}

/// Application configuration loaded from TOML file.
///
/// ```toml
/// [server]
/// bind_address = "127.0.0.1:8080"
/// tick_interval_ms = 50
///
/// [logging]
/// level = "info"
/// json_format = false
///
/// [replication]
/// session_root_id = 1234
///
/// [replication.intent_policy]
/// mode = "eject"
/// threshold = 3
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration settings
    pub server: ServerSettings,
    /// Logging configuration settings
    pub logging: LoggingSettings,
    /// Frame limits and connection caps
    #[serde(default)]
    pub security: SecurityConfig,
    /// Replication settings handed to the core
    #[serde(default)]
    pub replication: ReplicationConfig,
}

/// Server-specific configuration settings.
///
/// Controls network binding, connection limits, timeouts, and the tick rate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Network address to bind the server to (e.g., "127.0.0.1:8080")
    pub bind_address: String,
    /// Maximum number of concurrent client connections
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
    /// WebSocket handshake timeout in seconds
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout: u64,
    /// Motion tick interval in milliseconds (0 to disable)
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Seconds between replication statistics reports
    #[serde(default = "default_stats_interval")]
    pub stats_interval_secs: u64,
}

/// Logging system configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingSettings {
    /// Log level filter (trace, debug, info, warn, error)
    pub level: String,
    /// Whether to output logs in JSON format
    #[serde(default)]
    pub json_format: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings {
                bind_address: "127.0.0.1:8080".to_string(),
                max_connections: default_max_connections(),
                connection_timeout: default_connection_timeout(),
                tick_interval_ms: default_tick_interval(),
                stats_interval_secs: default_stats_interval(),
            },
            logging: LoggingSettings {
                level: "info".to_string(),
                json_format: false,
            },
            security: SecurityConfig::default(),
            replication: ReplicationConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from a TOML file.
    ///
    /// If the file doesn't exist, creates a default configuration file at
    /// the specified path and returns the default configuration.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Returns
    ///
    /// The loaded or default configuration, or an error if loading/creation failed.
    pub async fn load_from_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        if path.exists() {
            let content = tokio::fs::read_to_string(path).await?;
            let config: AppConfig = toml::from_str(&content)?;
            Ok(config)
        } else {
            let default_config = AppConfig::default();
            let toml_content = toml::to_string_pretty(&default_config)?;
            tokio::fs::write(path, toml_content).await?;
            info!("Created default configuration file: {}", path.display());
            Ok(default_config)
        }
    }

    /// Converts the application configuration to a game server configuration.
    pub fn to_server_config(&self) -> Result<ServerConfig, Box<dyn std::error::Error>> {
        Ok(ServerConfig {
            bind_address: self.server.bind_address.parse()?,
            max_connections: self.server.max_connections,
            connection_timeout: self.server.connection_timeout,
            tick_interval_ms: self.server.tick_interval_ms,
            security: self.security.clone(),
            replication: self.replication.clone(),
        })
    }

    /// Validates the configuration for consistency and correctness.
    ///
    /// # Returns
    ///
    /// `Ok(())` if the configuration is valid, or an error string describing the issue.
    pub fn validate(&self) -> Result<(), String> {
        if self.server.bind_address.parse::<std::net::SocketAddr>().is_err() {
            return Err(format!(
                "Invalid bind address: {}",
                &self.server.bind_address
            ));
        }

        if self.server.max_connections == 0 {
            return Err("max_connections must be greater than 0".to_string());
        }

        if self.server.stats_interval_secs == 0 {
            return Err("stats_interval_secs must be greater than 0".to_string());
        }

        if self.security.max_message_size == 0 {
            return Err("security.max_message_size must be greater than 0".to_string());
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(format!(
                "Invalid log level: {}. Must be one of: {valid_levels:?}",
                &self.logging.level
            ));
        }

        self.replication
            .validate()
            .map_err(|e| format!("Invalid replication settings: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replication_core::{IntentViolationPolicy, ObjectId, ZoneId};
    use tempfile::{NamedTempFile, TempDir};
    use tokio::fs;

    #[test]
    fn test_app_config_default() {
        let config = AppConfig::default();

        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert_eq!(config.server.max_connections, 1000);
        assert_eq!(config.server.connection_timeout, 60);
        assert_eq!(config.server.tick_interval_ms, 50);
        assert_eq!(config.logging.level, "info");
        assert!(!config.logging.json_format);
        assert_eq!(config.replication.session_root_id, ObjectId(1234));
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_load_from_nonexistent_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        let config = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(config.server.bind_address, "127.0.0.1:8080");
        assert!(path.exists());

        // The written defaults load back unchanged
        let reloaded = AppConfig::load_from_file(&path).await.unwrap();
        assert_eq!(reloaded.server.tick_interval_ms, config.server.tick_interval_ms);
        assert_eq!(reloaded.replication.accounts, config.replication.accounts);
        assert_eq!(reloaded.replication.intent_policy, IntentViolationPolicy::Ignore);
    }

    #[tokio::test]
    async fn test_load_from_existing_file() {
        let toml_content = r#"
[server]
bind_address = "0.0.0.0:3000"
max_connections = 2000
tick_interval_ms = 33

[logging]
level = "debug"
json_format = true

[security]
max_message_size = 4096
max_json_depth = 4
max_string_length = 64
max_collection_size = 8
banned_ips = ["10.1.2.3"]
max_connections_per_ip = 2

[replication]
avatar_zone = 7

[replication.intent_policy]
mode = "eject"
threshold = 3

[[replication.accounts]]
username = "alice"
password = "secret"
"#;

        let temp_file = NamedTempFile::new().unwrap();
        fs::write(temp_file.path(), toml_content).await.unwrap();

        let config = AppConfig::load_from_file(temp_file.path()).await.unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:3000");
        assert_eq!(config.server.max_connections, 2000);
        assert_eq!(config.server.connection_timeout, 60);
        assert_eq!(config.server.tick_interval_ms, 33);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.json_format);
        assert_eq!(config.security.max_connections_per_ip, 2);
        assert_eq!(config.security.banned_ips.len(), 1);
        assert_eq!(config.replication.avatar_zone, ZoneId(7));
        assert_eq!(config.replication.session_root_id, ObjectId(1234));
        assert_eq!(
            config.replication.intent_policy,
            IntentViolationPolicy::Eject { threshold: 3 }
        );
        assert_eq!(config.replication.accounts.len(), 1);
        assert_eq!(config.replication.accounts[0].username, "alice");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_to_server_config_conversion() {
        let mut app_config = AppConfig::default();
        app_config.server.bind_address = "192.168.1.100:8080".to_string();
        app_config.server.max_connections = 3000;
        app_config.server.tick_interval_ms = 25;
        app_config.replication.avatar_zone = ZoneId(3);

        let server_config = app_config.to_server_config().unwrap();

        assert_eq!(server_config.bind_address.to_string(), "192.168.1.100:8080");
        assert_eq!(server_config.max_connections, 3000);
        assert_eq!(server_config.tick_interval_ms, 25);
        assert_eq!(server_config.replication.avatar_zone, ZoneId(3));
    }

    #[test]
    fn test_config_validation() {
        let mut config = AppConfig::default();

        config.server.bind_address = "invalid".to_string();
        assert!(config.validate().is_err());

        config.server.bind_address = "127.0.0.1:8080".to_string();
        config.logging.level = "loud".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "warn".to_string();
        config.replication.intent_policy = IntentViolationPolicy::Eject { threshold: 0 };
        assert!(config.validate().is_err());

        config.replication.intent_policy = IntentViolationPolicy::Ignore;
        assert!(config.validate().is_ok());
    }
}
