//! # Core Type Definitions
//!
//! Identity and state types shared by every replication component.
//!
//! ## Key Types
//!
//! - [`ObjectId`] - Identity of a replicated object, `0` is the world root
//! - [`ChannelId`] - Identity of a client session
//! - [`ZoneId`] - Logical partition under a parent object
//! - [`TypeTag`] - Class of a replicated object
//! - [`ViewRole`] - Which side of the replication an object instance plays
//! - [`SessionState`] / [`EjectReason`] - Session lifecycle and disconnect codes

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport-level handle of a client connection.
///
/// The game server uses its connection ids here; the core never interprets it.
pub type ClientRef = usize;

/// Unique identifier of a replicated object.
///
/// Ids are drawn from a monotonically increasing pool and never reused.
/// `ObjectId::ROOT` (0) is the implicit world root every top level object is parented to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObjectId(pub u64);

impl ObjectId {
    /// The well-known world root. It is never stored in the registry.
    pub const ROOT: ObjectId = ObjectId(0);

    /// Returns true for the world root.
    pub fn is_root(self) -> bool {
        self == Self::ROOT
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier of a client session, stable for the connection's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ch:{}", self.0)
    }
}

/// Zone number under a parent object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ZoneId(pub u32);

impl ZoneId {
    pub const MIN: ZoneId = ZoneId(0);
    pub const MAX: ZoneId = ZoneId(u32::MAX);
}

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Class of a replicated object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeTag {
    /// Global login endpoint. Never replicated as a view.
    SessionRoot,
    /// Parent of the world's zones; avatars live under it.
    ZoneRoot,
    /// A player's avatar.
    Avatar,
}

impl TypeTag {
    pub fn name(self) -> &'static str {
        match self {
            TypeTag::SessionRoot => "SessionRoot",
            TypeTag::ZoneRoot => "ZoneRoot",
            TypeTag::Avatar => "Avatar",
        }
    }

    /// Global classes are addressed by well-known id and never sent as views.
    pub fn is_global(self) -> bool {
        matches!(self, TypeTag::SessionRoot)
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Role an object instance plays.
///
/// Field handlers are dispatched on the role, never on class hierarchy:
/// the authoritative copy validates and applies, owner-views may send
/// owner-only fields, client-views are read-mostly, globals are reachable
/// without interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewRole {
    Authoritative,
    OwnerView,
    ClientView,
    Global,
}

/// Lifecycle of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    #[default]
    Unauthenticated,
    Established,
    Ejected,
}

/// Reason a client was forcibly disconnected.
///
/// Each reason maps to the numeric code delivered to the client before the
/// connection is closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EjectReason {
    /// The update frame could not be interpreted.
    MalformedUpdate,
    /// An unauthenticated channel touched a non-global object.
    AnonymousViolation,
    /// The field does not exist or the channel may not send it.
    ForbiddenField,
    /// The addressed object does not exist or is not visible.
    MissingObject,
    /// Login was rejected.
    BadCredentials,
    /// Repeated out-of-range motion intents.
    CheatDetected,
    /// One of the channel's session objects was destroyed.
    SessionObjectDeleted,
}

impl EjectReason {
    pub fn code(self) -> u16 {
        match self {
            EjectReason::MalformedUpdate => 109,
            EjectReason::AnonymousViolation => 113,
            EjectReason::ForbiddenField => 117,
            EjectReason::MissingObject => 118,
            EjectReason::BadCredentials => 122,
            EjectReason::CheatDetected => 152,
            EjectReason::SessionObjectDeleted => 153,
        }
    }

    pub fn default_message(self) -> &'static str {
        match self {
            EjectReason::MalformedUpdate => "Malformed update",
            EjectReason::AnonymousViolation => "Not authenticated",
            EjectReason::ForbiddenField => "Forbidden field",
            EjectReason::MissingObject => "Unknown object",
            EjectReason::BadCredentials => "Bad credentials",
            EjectReason::CheatDetected => "Invalid input",
            EjectReason::SessionObjectDeleted => "Session object deleted",
        }
    }
}

impl fmt::Display for EjectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.default_message(), self.code())
    }
}

/// A 3D vector in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    pub fn zero() -> Self {
        Self::default()
    }
}
