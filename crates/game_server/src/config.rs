//! Server configuration types and defaults.
//!
//! This module contains the server configuration structure and default values
//! used to initialize the replication transport.

use replication_core::ReplicationConfig;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};

/// Configuration structure for the game server.
///
/// Contains the network settings, connection limits, the tick rate of the
/// avatar motion loop and the replication settings handed to the core.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Maximum number of concurrent connections allowed
    pub max_connections: usize,

    /// WebSocket handshake timeout in seconds
    pub connection_timeout: u64,

    /// Motion tick interval in milliseconds (0 to disable)
    pub tick_interval_ms: u64,

    /// Security configuration settings
    pub security: SecurityConfig,

    /// Replication settings passed to the core
    pub replication: ReplicationConfig,
}

/// Security configuration for frame validation and connection limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Maximum frame size in bytes
    pub max_message_size: usize,

    /// Maximum allowed nesting depth for JSON frames
    pub max_json_depth: usize,

    /// Maximum allowed string length in JSON
    pub max_string_length: usize,

    /// Maximum allowed array/object size
    pub max_collection_size: usize,

    /// Banned IP addresses
    pub banned_ips: Vec<IpAddr>,

    /// Maximum concurrent connections per IP (0 disables the check)
    pub max_connections_per_ip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            max_connections: 1000,
            connection_timeout: 60,
            tick_interval_ms: 50, // 20 ticks per second by default
            security: SecurityConfig::default(),
            replication: ReplicationConfig::default(),
        }
    }
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 * 1024, // 64KB
            max_json_depth: 10,
            max_string_length: 1024,
            max_collection_size: 100,
            banned_ips: Vec::new(),
            max_connections_per_ip: 10,
        }
    }
}
