//! Response sender implementation for the replication core.
//!
//! This module provides the [`MessageSink`] the replication service delivers
//! through, backed by the connection manager's outbound queues.

use super::{manager::ConnectionManager, Outbound};
use replication_core::{ClientMessage, EjectReason, MessageSink, Recipient};
use std::sync::Arc;
use tracing::debug;

/// Implementation of `MessageSink` for the game server.
///
/// This struct bridges the replication core and the connection manager.
/// Every call only pushes onto an unbounded queue, so it is safe to invoke
/// while the core holds its world lock.
#[derive(Clone, Debug)]
pub struct GameServerResponseSender {
    /// Reference to the connection manager for looking up and messaging connections
    connection_manager: Arc<ConnectionManager>,
}

impl GameServerResponseSender {
    /// Creates a new response sender with the given connection manager.
    pub fn new(connection_manager: Arc<ConnectionManager>) -> Self {
        Self { connection_manager }
    }
}

impl MessageSink for GameServerResponseSender {
    fn deliver(&self, to: Recipient, message: ClientMessage) {
        let kind = message.kind();
        if !self
            .connection_manager
            .send_to_connection(to.client, Outbound::Message(message))
        {
            debug!("🔧 Could not queue {} for {} (connection {})", kind, to.channel, to.client);
        }
    }

    fn close(&self, to: Recipient, reason: EjectReason, message: &str) {
        debug!(
            "🔧 Closing connection {} of {} with code {}",
            to.client,
            to.channel,
            reason.code()
        );
        self.connection_manager
            .close_connection(to.client, reason.code(), message);
    }
}
