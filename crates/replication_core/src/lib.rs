//! # Replication Core
//!
//! Interest-scoped distributed object replication for authoritative game
//! servers. Objects are created on the server, made visible to clients
//! through `(parent, zone)` interest, and kept in sync through field updates
//! routed by channel and owner identity.
//!
//! ## Core Features
//!
//! - **Object Registry**: authoritative records, unique ids, cascading destruction
//! - **Channel/Owner Directory**: session state, ownership bindings, ejection
//! - **Interest Manager**: zone subscriptions with owner-view precedence
//! - **Update Router**: role checked client updates and ordered fan-out
//! - **Session Controller**: pluggable authentication and avatar provisioning
//! - **Avatar Motion**: per-tick heading/speed integration with clamped bounds
//!
//! ## Architecture Overview
//!
//! All server-side state lives in one world guarded by a single async lock
//! inside [`ReplicationService`]. The service never touches sockets: every
//! client-bound message goes through a [`MessageSink`] supplied by the
//! transport. The client half is [`ClientRepository`], which applies the
//! same messages to local views.
//!
//! ## Quick Start Example
//!
//! ```rust,no_run
//! use replication_core::*;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let service = ReplicationService::with_static_credentials(
//!         ReplicationConfig::default(),
//!         Arc::new(NullSink),
//!     )?;
//!
//!     let channel = service.open_channel(1).await;
//!     let outcome = service.login(channel, "guest", "guest").await?;
//!     if let Some(avatar) = outcome.avatar() {
//!         service.set_intent(avatar, 1.0, 0.5).await?;
//!     }
//!
//!     let report = service.tick(1.0 / 60.0).await?;
//!     println!("broadcast {} positions", report.broadcasts);
//!     Ok(())
//! }
//! ```

pub mod avatar;
pub mod client;
pub mod config;
pub mod directory;
pub mod error;
pub mod fields;
pub mod interest;
pub mod messages;
pub mod registry;
pub mod scheduler;
pub mod service;
pub mod session;
pub mod sink;
pub mod types;

mod router;
mod world;


pub use avatar::{AvatarMotion, Intent, MotionConfig, Transform};
pub use client::{ClientRepository, PresentationSink, ViewObject};
pub use config::{IntentViolationPolicy, ReplicationConfig};
pub use error::{ReplicationError, ReplicationResult};
pub use fields::{FieldDef, FieldFlags};
pub use interest::InterestRegistration;
pub use messages::{ClientMessage, FieldUpdateRequest};
pub use registry::{ObjectRegistry, ReplicatedObject};
pub use service::{ReplicationService, ReplicationStats, TickReport};
pub use session::{Account, Authenticator, LoginOutcome, StaticCredentials};
pub use sink::{MessageSink, NullSink, Recipient};
pub use types::*;
