//! Client connection representation.
//!
//! This module defines the structure of individual client connections and
//! the items queued for delivery to them.

use replication_core::{ChannelId, ClientMessage};
use std::net::SocketAddr;
use std::time::SystemTime;
use tokio::sync::mpsc;

/// An item on a connection's outbound queue.
#[derive(Debug, Clone, PartialEq)]
pub enum Outbound {
    /// A replication message, sent as a JSON text frame
    Message(ClientMessage),

    /// Close the socket once everything before it has been written
    Close { code: u16, reason: String },
}

/// Represents an individual client connection to the server.
///
/// # Fields
///
/// * `remote_addr` - The network address of the connected client
/// * `connected_at` - Timestamp when the connection was established
/// * `channel` - Replication channel bound to this connection, once opened
/// * `outbound` - FIFO queue drained by the connection's writer task
#[derive(Debug)]
pub struct ClientConnection {
    /// The remote network address of the client
    pub remote_addr: SocketAddr,

    /// When this connection was established
    pub connected_at: SystemTime,

    /// The replication channel of this connection (None until opened)
    pub channel: Option<ChannelId>,

    outbound: mpsc::UnboundedSender<Outbound>,
}

impl ClientConnection {
    /// Creates a new client connection with the specified remote address.
    ///
    /// # Arguments
    ///
    /// * `remote_addr` - The network address of the connecting client
    ///
    /// # Returns
    ///
    /// The connection and the receiving end of its outbound queue.
    pub fn new(remote_addr: SocketAddr) -> (Self, mpsc::UnboundedReceiver<Outbound>) {
        let (outbound, receiver) = mpsc::unbounded_channel();
        let connection = Self {
            remote_addr,
            connected_at: SystemTime::now(),
            channel: None,
            outbound,
        };
        (connection, receiver)
    }

    /// Queues an item without blocking.
    ///
    /// # Returns
    ///
    /// `false` if the writer task has already gone away.
    pub fn enqueue(&self, item: Outbound) -> bool {
        self.outbound.send(item).is_ok()
    }
}
