//! Utility functions and helper methods for the game server.
//!
//! This module provides convenient factory functions and utilities
//! for creating server instances with different configurations.

use crate::{config::ServerConfig, error::ServerError, server::GameServer};

/// Creates a new game server with default configuration.
///
/// This is a convenience function for quickly setting up a server
/// with sensible defaults for development and testing.
///
/// # Example
///
/// ```rust
/// use game_server::create_server;
///
/// let server = create_server().expect("default config is valid");
/// ```
pub fn create_server() -> Result<GameServer, ServerError> {
    GameServer::new(ServerConfig::default())
}

/// Creates a new game server with custom configuration.
///
/// # Arguments
///
/// * `config` - A `ServerConfig` instance with desired settings
///
/// # Returns
///
/// A new `GameServer`, or an error if the replication settings are invalid.
///
/// # Example
///
/// ```rust
/// use game_server::{create_server_with_config, ServerConfig};
///
/// let config = ServerConfig {
///     bind_address: "0.0.0.0:9000".parse().unwrap(),
///     max_connections: 5000,
///     ..Default::default()
/// };
///
/// let server = create_server_with_config(config).expect("config is valid");
/// ```
pub fn create_server_with_config(config: ServerConfig) -> Result<GameServer, ServerError> {
    GameServer::new(config)
}
