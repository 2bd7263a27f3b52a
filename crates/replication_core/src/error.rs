//! Error types for replication operations.
//!
//! Client-caused failures (`InvalidIntent`, `ForbiddenField`, `MalformedArgs`)
//! are handled locally by dropping the input or ejecting the
//! offending client. The rest signal sequencing bugs and abort the operation
//! before shared state is touched.

use crate::types::{ChannelId, ClientRef, ObjectId, SessionState, TypeTag, ViewRole};

/// Result type for replication operations.
pub type ReplicationResult<T> = Result<T, ReplicationError>;

/// Enumeration of replication errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReplicationError {
    /// Operation on an unknown object
    #[error("object {0} not found")]
    ObjectNotFound(ObjectId),

    /// Operation on an unknown channel
    #[error("channel {0} not found")]
    ChannelNotFound(ChannelId),

    /// No channel is bound to the transport handle
    #[error("no channel bound to client {0}")]
    ClientNotFound(ClientRef),

    /// The object already has a different owner; the existing binding is kept
    #[error("object {object} is already owned by {owner}")]
    AlreadyOwned { object: ObjectId, owner: ChannelId },

    /// An object with this id already exists
    #[error("object {0} already exists")]
    DuplicateObject(ObjectId),

    /// The requested parent is neither the world root nor a live object
    #[error("parent {parent} of new {type_tag} does not exist")]
    InvalidParent { parent: ObjectId, type_tag: TypeTag },

    /// The object id pool has no ids left
    #[error("object id pool exhausted")]
    IdPoolExhausted,

    /// Motion intent outside [-1, 1] or not finite
    #[error("invalid intent (heading {heading}, speed {speed})")]
    InvalidIntent { heading: f64, speed: f64 },

    /// The class has no such field
    #[error("field '{field}' is not defined on {type_tag}")]
    UnknownField { type_tag: TypeTag, field: String },

    /// A view with this role may not send or receive the field
    #[error("a {role:?} may not use '{field}' on object {object}")]
    ForbiddenField {
        role: ViewRole,
        object: ObjectId,
        field: String,
    },

    /// Field arguments have the wrong arity or types
    #[error("malformed arguments for '{field}': {reason}")]
    MalformedArgs { field: String, reason: String },

    /// The session is not in the state the operation requires
    #[error("{channel} is {actual:?}, expected {expected:?}")]
    InvalidSessionState {
        channel: ChannelId,
        actual: SessionState,
        expected: SessionState,
    },

    /// A login is already being processed for the channel
    #[error("login already in progress on {0}")]
    LoginInProgress(ChannelId),

    /// Configuration rejected at startup
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The credential check collaborator failed
    #[error("authenticator failure: {0}")]
    Authenticator(String),
}

impl ReplicationError {
    /// Returns true for the NotFound family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ReplicationError::ObjectNotFound(_)
                | ReplicationError::ChannelNotFound(_)
                | ReplicationError::ClientNotFound(_)
        )
    }
}
