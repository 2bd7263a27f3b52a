//! Connection manager for tracking and managing client connections.
//!
//! This module provides the central registry of live connections and the
//! outbound queue of each one.

use super::{client::ClientConnection, ConnectionId, Outbound};
use dashmap::DashMap;
use replication_core::ChannelId;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::SystemTime;
use tokio::sync::mpsc;
use tracing::{info, trace};

/// Central manager for all client connections.
///
/// The `ConnectionManager` tracks active connections, assigns unique IDs and
/// hands out per-connection FIFO queues. Lookups and sends never await, so
/// the replication core can deliver to it while holding its world lock.
///
/// # Architecture
///
/// * Uses `DashMap` for concurrent connection storage
/// * Implements atomic connection ID generation
/// * One unbounded mpsc queue per connection, drained by its writer task
#[derive(Debug)]
pub struct ConnectionManager {
    /// Map of connection ID to client connection information
    connections: DashMap<ConnectionId, ClientConnection>,

    /// Atomic counter for generating unique connection IDs
    next_id: AtomicUsize,
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ConnectionManager {
    /// Creates a new connection manager.
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicUsize::new(1),
        }
    }

    /// Adds a new connection and returns its unique ID.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - The network address of the connecting client
    ///
    /// # Returns
    ///
    /// The assigned `ConnectionId` and the receiver the writer task drains.
    pub fn add_connection(
        &self,
        remote_addr: SocketAddr,
    ) -> (ConnectionId, mpsc::UnboundedReceiver<Outbound>) {
        let connection_id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (connection, receiver) = ClientConnection::new(remote_addr);
        self.connections.insert(connection_id, connection);
        info!("🔗 Connection {} from {}", connection_id, remote_addr);
        (connection_id, receiver)
    }

    /// Removes a connection, dropping its outbound queue.
    pub fn remove_connection(&self, connection_id: ConnectionId) -> Option<ClientConnection> {
        let removed = self.connections.remove(&connection_id).map(|(_, conn)| conn);
        if let Some(connection) = &removed {
            info!(
                "❌ Connection {} from {} disconnected",
                connection_id, connection.remote_addr
            );
        }
        removed
    }

    /// Records the replication channel opened for a connection.
    pub fn set_channel(&self, connection_id: ConnectionId, channel: ChannelId) {
        if let Some(mut connection) = self.connections.get_mut(&connection_id) {
            connection.channel = Some(channel);
        }
    }

    /// Gets the replication channel of a connection.
    pub fn get_channel(&self, connection_id: ConnectionId) -> Option<ChannelId> {
        self.connections
            .get(&connection_id)
            .and_then(|connection| connection.channel)
    }

    /// Queues an item for a specific connection.
    ///
    /// # Returns
    ///
    /// `false` if the connection is unknown or its writer has stopped.
    pub fn send_to_connection(&self, connection_id: ConnectionId, item: Outbound) -> bool {
        match self.connections.get(&connection_id) {
            Some(connection) => connection.enqueue(item),
            None => {
                trace!("📭 Dropping outbound item for closed connection {}", connection_id);
                false
            }
        }
    }

    /// Queues a close after everything already pending for a connection.
    pub fn close_connection(&self, connection_id: ConnectionId, code: u16, reason: &str) -> bool {
        self.send_to_connection(
            connection_id,
            Outbound::Close {
                code,
                reason: reason.to_string(),
            },
        )
    }

    /// Gets connection information: remote address, connect time and channel.
    pub fn get_connection_info(
        &self,
        connection_id: ConnectionId,
    ) -> Option<(SocketAddr, SystemTime, Option<ChannelId>)> {
        self.connections.get(&connection_id).map(|connection| {
            (
                connection.remote_addr,
                connection.connected_at,
                connection.channel,
            )
        })
    }

    /// Number of live connections.
    pub fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// IDs of all live connections.
    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<_> = self.connections.iter().map(|entry| *entry.key()).collect();
        ids.sort_unstable();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use replication_core::ClientMessage;

    fn addr() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[test]
    fn test_ids_are_unique_and_queues_are_fifo() {
        let manager = ConnectionManager::new();
        let (a, mut rx_a) = manager.add_connection(addr());
        let (b, _rx_b) = manager.add_connection(addr());
        assert_ne!(a, b);
        assert_eq!(manager.connection_count(), 2);

        let first = Outbound::Message(ClientMessage::ObjectDeleted {
            object_id: replication_core::ObjectId(1),
        });
        assert!(manager.send_to_connection(a, first.clone()));
        assert!(manager.close_connection(a, 152, "Invalid input"));

        assert_eq!(rx_a.try_recv().unwrap(), first);
        assert_eq!(
            rx_a.try_recv().unwrap(),
            Outbound::Close {
                code: 152,
                reason: "Invalid input".to_string()
            }
        );
    }

    #[test]
    fn test_removed_connection_drops_sends() {
        let manager = ConnectionManager::new();
        let (id, rx) = manager.add_connection(addr());
        manager.set_channel(id, ChannelId(7));
        assert_eq!(manager.get_channel(id), Some(ChannelId(7)));

        assert!(manager.remove_connection(id).is_some());
        drop(rx);
        assert!(!manager.close_connection(id, 1000, "bye"));
        assert!(manager.get_connection_info(id).is_none());
        assert!(manager.connection_ids().is_empty());
    }
}
