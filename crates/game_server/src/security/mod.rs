//! Security module for frame validation and connection limits.

use crate::config::SecurityConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tokio::sync::RwLock;

pub mod input_validation;

/// Central security manager for the game server
#[derive(Debug)]
pub struct SecurityManager {
    config: SecurityConfig,
    connection_tracker: Arc<RwLock<HashMap<IpAddr, u32>>>,
}

impl SecurityManager {
    /// Creates a new security manager with the given configuration
    pub fn new(config: SecurityConfig) -> Self {
        Self {
            config,
            connection_tracker: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validates an incoming connection attempt and counts it against its IP
    pub async fn validate_connection(&self, ip: IpAddr) -> Result<(), SecurityError> {
        if self.config.banned_ips.contains(&ip) {
            return Err(SecurityError::BannedIp(ip));
        }

        let mut tracker = self.connection_tracker.write().await;
        let count = tracker.entry(ip).or_insert(0);
        if self.config.max_connections_per_ip > 0 && *count >= self.config.max_connections_per_ip {
            return Err(SecurityError::TooManyConnections(ip));
        }
        *count += 1;

        Ok(())
    }

    /// Validates an incoming frame before it is decoded
    pub fn validate_message(&self, message: &[u8]) -> Result<(), SecurityError> {
        input_validation::validate_json_message(message, &self.config)
    }

    /// Registers a connection disconnect
    pub async fn on_disconnect(&self, ip: IpAddr) {
        let mut tracker = self.connection_tracker.write().await;
        if let Some(count) = tracker.get_mut(&ip) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                tracker.remove(&ip);
            }
        }
    }

    /// Gets current security statistics
    pub async fn get_stats(&self) -> SecurityStats {
        SecurityStats {
            tracked_ips: self.connection_tracker.read().await.len(),
            banned_ips: self.config.banned_ips.len(),
        }
    }
}

/// Security-related statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityStats {
    pub tracked_ips: usize,
    pub banned_ips: usize,
}

/// Security-related errors
#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("IP address {0} is banned")]
    BannedIp(IpAddr),

    #[error("Too many connections from IP {0}")]
    TooManyConnections(IpAddr),

    #[error("Message too large: {0} bytes")]
    MessageTooLarge(usize),

    #[error("Invalid message format: {0}")]
    InvalidMessageFormat(String),

    #[error("Malicious content detected")]
    MaliciousContent,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip() -> IpAddr {
        "10.0.0.1".parse().unwrap()
    }

    #[tokio::test]
    async fn test_per_ip_connection_cap() {
        let manager = SecurityManager::new(SecurityConfig {
            max_connections_per_ip: 2,
            ..SecurityConfig::default()
        });

        assert!(manager.validate_connection(ip()).await.is_ok());
        assert!(manager.validate_connection(ip()).await.is_ok());
        assert!(matches!(
            manager.validate_connection(ip()).await,
            Err(SecurityError::TooManyConnections(_))
        ));

        manager.on_disconnect(ip()).await;
        assert!(manager.validate_connection(ip()).await.is_ok());
        assert_eq!(manager.get_stats().await.tracked_ips, 1);
    }

    #[tokio::test]
    async fn test_banned_ip_is_refused() {
        let manager = SecurityManager::new(SecurityConfig {
            banned_ips: vec![ip()],
            ..SecurityConfig::default()
        });
        assert!(matches!(
            manager.validate_connection(ip()).await,
            Err(SecurityError::BannedIp(_))
        ));
        assert_eq!(manager.get_stats().await.tracked_ips, 0);
    }
}
