//! Messages exchanged between the replication core and clients.
//!
//! Inbound frames address a field on an object; outbound frames are tagged
//! by `"type"` so clients can dispatch without knowing the object's class.

use crate::types::{EjectReason, ObjectId, SessionState, TypeTag, ViewRole, ZoneId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A field update sent by a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdateRequest {
    pub object_id: ObjectId,
    pub field: String,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl FieldUpdateRequest {
    pub fn new(object_id: ObjectId, field: impl Into<String>, args: Vec<Value>) -> Self {
        Self {
            object_id,
            field: field.into(),
            args,
        }
    }
}

/// A message delivered to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// A view became visible. Carries the stored required and ram fields.
    ObjectCreated {
        object_id: ObjectId,
        type_tag: TypeTag,
        parent_id: ObjectId,
        zone_id: ZoneId,
        role: ViewRole,
        fields: BTreeMap<String, Vec<Value>>,
    },
    /// An existing view switched between owner-view and client-view.
    ObjectRoleChanged { object_id: ObjectId, role: ViewRole },
    /// A view is no longer visible.
    ObjectDeleted { object_id: ObjectId },
    /// An authoritative field update.
    FieldUpdate {
        object_id: ObjectId,
        field: String,
        args: Vec<Value>,
    },
    /// The session moved to a new state.
    StateChanged { state: SessionState },
    /// The connection is about to be closed.
    Eject { code: u16, message: String },
}

impl ClientMessage {
    pub fn eject(reason: EjectReason, message: impl Into<String>) -> Self {
        ClientMessage::Eject {
            code: reason.code(),
            message: message.into(),
        }
    }

    /// Object the message refers to, if any.
    pub fn object_id(&self) -> Option<ObjectId> {
        match self {
            ClientMessage::ObjectCreated { object_id, .. }
            | ClientMessage::ObjectRoleChanged { object_id, .. }
            | ClientMessage::ObjectDeleted { object_id }
            | ClientMessage::FieldUpdate { object_id, .. } => Some(*object_id),
            ClientMessage::StateChanged { .. } | ClientMessage::Eject { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::ObjectCreated { .. } => "object_created",
            ClientMessage::ObjectRoleChanged { .. } => "object_role_changed",
            ClientMessage::ObjectDeleted { .. } => "object_deleted",
            ClientMessage::FieldUpdate { .. } => "field_update",
            ClientMessage::StateChanged { .. } => "state_changed",
            ClientMessage::Eject { .. } => "eject",
        }
    }
}
