//! Frame handling and routing for client-server communication.
//!
//! This module decodes inbound JSON text frames into field updates, routes
//! them into the replication service and encodes outbound messages.

pub mod router;
pub mod types;

pub use router::route_client_message;
pub use types::{decode_frame, encode_message};
