//! # Game Server - WebSocket Replication Transport
//!
//! Carries the interest-scoped replication core over WebSockets. The server
//! accepts connections, opens a replication channel per connection, routes
//! inbound field updates into the [`ReplicationService`](replication_core::ReplicationService)
//! and writes everything the service delivers back out as JSON text frames.
//!
//! ## Design Philosophy
//!
//! The game server contains **no replication rules** - it only provides transport:
//!
//! * **WebSocket connection management** - Handshakes, per-connection queues, cleanup
//! * **Frame validation** - Size, depth and content limits before decoding
//! * **Ejection** - An `eject` frame followed by a close frame carrying the code
//! * **Motion tick** - Periodic avatar integration driven by the server clock
//!
//! Object lifetimes, visibility, ownership and login all live in `replication_core`.
//!
//! ## Architecture Overview
//!
//! ### Core Components
//!
//! * **Replication Service** - Authoritative world state behind one async lock
//! * **Connection Manager** - Connection registry and FIFO outbound queues
//! * **Response Sender** - The service's `MessageSink`, pushing onto those queues
//! * **Security Manager** - Ban list, per-IP caps and frame checks
//!
//! ### Message Flow
//!
//! 1. Client sends `{"object_id", "field", "args"}` as a text frame
//! 2. Server validates the frame and decodes the field update
//! 3. The replication service authorizes, applies and fans the update out
//! 4. Deliveries land on each recipient's outbound queue in order
//! 5. Each connection's writer task sends them as text frames
//!
//! ### Logging In
//!
//! ```json
//! { "object_id": 1234, "field": "login", "args": ["guest", "guest"] }
//! ```
//!
//! A successful login is answered with `state_changed` followed by an
//! `object_created` for the new avatar with role `owner_view`.
//!
//! ## Configuration
//!
//! The server can be configured through the [`ServerConfig`] struct:
//!
//! * **Network settings** - Bind address, connection limits, handshake timeout
//! * **Tick rate** - Motion tick interval in milliseconds
//! * **Security** - Frame limits, banned IPs, per-IP connection cap
//! * **Replication** - Everything handed to the replication core
//!
//! ## Error Handling
//!
//! The server uses structured error types ([`ServerError`]) to categorize failures:
//!
//! * **Network errors** - Connection, binding, and protocol issues
//! * **Internal errors** - Replication failures
//!
//! Misbehaving clients are never an error for the server: they are ejected.

// Re-export core types and functions for easy access
pub use config::{SecurityConfig, ServerConfig};
pub use error::ServerError;
pub use server::GameServer;
pub use utils::{create_server, create_server_with_config};

// Public module declarations
pub mod config;
pub mod connection;
pub mod error;
pub mod security;
pub mod server;
pub mod utils;

// Internal modules (not part of public API)
mod messaging;
mod tests;
