//! Transport boundary.
//!
//! The core never owns sockets. Everything it wants a client to see goes
//! through a [`MessageSink`], which the game server implements on top of its
//! per-connection outbound queues.

use crate::messages::ClientMessage;
use crate::types::{ChannelId, ClientRef, EjectReason};

/// Addressing information for one delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Recipient {
    pub channel: ChannelId,
    pub client: ClientRef,
}

/// Delivers messages to connected clients.
///
/// Both methods are called while the world lock is held and must not block.
/// Deliveries to one recipient must reach the client in call order.
pub trait MessageSink: Send + Sync {
    /// Queues a message for a client.
    fn deliver(&self, to: Recipient, message: ClientMessage);

    /// Closes the client's connection after everything already queued.
    fn close(&self, to: Recipient, reason: EjectReason, message: &str);
}

/// Sink that discards everything. Useful for headless simulations.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl MessageSink for NullSink {
    fn deliver(&self, _to: Recipient, _message: ClientMessage) {}

    fn close(&self, _to: Recipient, _reason: EjectReason, _message: &str) {}
}
