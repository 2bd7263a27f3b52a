//! Connection management for client connections.
//!
//! This module handles the lifecycle of client connections, including
//! connection tracking, channel assignment, and outbound queuing.

pub mod client;
pub mod manager;
pub mod response;

pub use client::{ClientConnection, Outbound};
pub use manager::ConnectionManager;
pub use response::GameServerResponseSender;

/// Type alias for connection identifiers.
///
/// Connection IDs double as the client reference the replication core
/// uses to address a connection.
pub type ConnectionId = replication_core::ClientRef;
