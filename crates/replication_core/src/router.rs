//! # Update Router
//!
//! Moves field updates between the authoritative objects and their views.
//!
//! Client-originated updates are checked against the sender's view role and
//! the field table before anything is applied. Authoritative updates fan out
//! to the owner-view and to every client-view, filtered by the field's
//! receive keywords. Per-object ordering follows from routing everything
//! through the world lock into FIFO sinks.

use crate::avatar::Transform;
use crate::config::IntentViolationPolicy;
use crate::error::{ReplicationError, ReplicationResult};
use crate::fields::{self, FieldDef, FieldFlags};
use crate::messages::{ClientMessage, FieldUpdateRequest};
use crate::sink::MessageSink;
use crate::types::{ChannelId, EjectReason, ObjectId, SessionState, TypeTag, ViewRole};
use crate::world::World;
use serde_json::Value;
use tracing::{debug, warn};

/// A client update that passed the sender checks.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Authorized {
    pub(crate) type_tag: TypeTag,
    pub(crate) def: &'static FieldDef,
}

/// Why a client update was refused. Always ends in ejection.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Rejection {
    pub(crate) reason: EjectReason,
    pub(crate) detail: String,
}

impl Rejection {
    fn new(reason: EjectReason, detail: impl Into<String>) -> Self {
        Self {
            reason,
            detail: detail.into(),
        }
    }
}

impl World {
    /// Delivers an update to every viewer that receives the field.
    ///
    /// # Returns
    ///
    /// The number of deliveries.
    pub(crate) fn fan_out(
        &self,
        object: ObjectId,
        def: &FieldDef,
        args: &[Value],
        origin: Option<ChannelId>,
        sink: &dyn MessageSink,
    ) -> usize {
        let mut delivered = 0;
        for (channel, role) in self.interest.viewers_of(object) {
            if Some(channel) == origin || !def.received_by(role) {
                continue;
            }
            self.send(
                channel,
                ClientMessage::FieldUpdate {
                    object_id: object,
                    field: def.name.to_string(),
                    args: args.to_vec(),
                },
                sink,
            );
            delivered += 1;
        }
        delivered
    }

    /// Applies an authoritative update and fans it out.
    pub(crate) fn route_update(
        &mut self,
        object: ObjectId,
        field: &str,
        args: &[Value],
        origin: Option<ChannelId>,
        sink: &dyn MessageSink,
    ) -> ReplicationResult<usize> {
        let type_tag = self.registry.get(object)?.type_tag;
        let def = fields::field_def(type_tag, field)?;
        def.validate_args(args)?;

        self.registry.store_field(object, field, args)?;
        if def.name == fields::SET_XYZH {
            let record = self.registry.get_mut(object)?;
            if let (Some(motion), Some(transform)) =
                (record.motion_mut(), Transform::from_xyzh_args(args))
            {
                motion.set_transform(transform);
            }
        }

        let delivered = self.fan_out(object, def, args, origin, sink);
        debug!("📤 {}.{} on {} -> {} views", type_tag, field, object, delivered);
        Ok(delivered)
    }

    /// Checks whether `channel` may send this update.
    pub(crate) fn authorize(
        &self,
        channel: ChannelId,
        request: &FieldUpdateRequest,
    ) -> ReplicationResult<Result<Authorized, Rejection>> {
        let state = self.directory.state(channel)?;
        let object = self.registry.get(request.object_id).ok();

        // Anonymous channels may only address globals.
        if state == SessionState::Unauthenticated
            && !object.is_some_and(|object| object.type_tag.is_global())
        {
            return Ok(Err(Rejection::new(
                EjectReason::AnonymousViolation,
                format!("anonymous update to {}", request.object_id),
            )));
        }

        let Some(object) = object else {
            return Ok(Err(Rejection::new(
                EjectReason::MissingObject,
                format!("object {} does not exist", request.object_id),
            )));
        };
        let type_tag = object.type_tag;

        let role = if type_tag.is_global() {
            ViewRole::Global
        } else {
            match self.interest.view_role(channel, request.object_id) {
                Some(role) => role,
                None => {
                    return Ok(Err(Rejection::new(
                        EjectReason::MissingObject,
                        format!("object {} is not visible", request.object_id),
                    )))
                }
            }
        };

        let Ok(def) = fields::field_def(type_tag, &request.field) else {
            return Ok(Err(Rejection::new(
                EjectReason::ForbiddenField,
                format!("{} has no field '{}'", type_tag, request.field),
            )));
        };
        if !def.sendable_by(role) {
            return Ok(Err(Rejection::new(
                EjectReason::ForbiddenField,
                format!("'{}' cannot be sent by a {:?}", def.name, role),
            )));
        }
        if let Err(err) = def.validate_args(&request.args) {
            return Ok(Err(Rejection::new(EjectReason::MalformedUpdate, err.to_string())));
        }

        Ok(Ok(Authorized { type_tag, def }))
    }

    /// Applies a client-sent field that has no dedicated handler.
    ///
    /// Broadcast fields are re-sent to every other viewer; the sender already
    /// applied the value locally.
    pub(crate) fn relay_client_field(
        &mut self,
        channel: ChannelId,
        request: &FieldUpdateRequest,
        def: &'static FieldDef,
        sink: &dyn MessageSink,
    ) -> ReplicationResult<usize> {
        if def.flags.contains(FieldFlags::BROADCAST) || def.flags.contains(FieldFlags::OWNRECV) {
            self.route_update(request.object_id, def.name, &request.args, Some(channel), sink)
        } else {
            self.registry
                .store_field(request.object_id, def.name, &request.args)?;
            Ok(0)
        }
    }

    /// Applies a client motion intent, enforcing the violation policy.
    ///
    /// # Returns
    ///
    /// Whether the intent was applied.
    pub(crate) fn apply_client_intent(
        &mut self,
        channel: ChannelId,
        avatar: ObjectId,
        heading: f64,
        speed: f64,
        policy: IntentViolationPolicy,
        sink: &dyn MessageSink,
    ) -> ReplicationResult<bool> {
        let record = self.registry.get_mut(avatar)?;
        let Some(motion) = record.motion_mut() else {
            return Ok(false);
        };
        match motion.set_intent(heading, speed) {
            Ok(()) => Ok(true),
            Err(ReplicationError::InvalidIntent { .. }) => {
                let violations = self.directory.record_intent_violation(channel)?;
                warn!(
                    "🚨 {} sent invalid intent ({}, {}) for avatar {} [{} violations]",
                    channel, heading, speed, avatar, violations
                );
                if let IntentViolationPolicy::Eject { threshold } = policy {
                    if violations >= threshold {
                        let message = EjectReason::CheatDetected.default_message();
                        self.directory
                            .eject(channel, EjectReason::CheatDetected, message, sink)?;
                    }
                }
                Ok(false)
            }
            Err(other) => Err(other),
        }
    }
}
