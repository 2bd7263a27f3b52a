//! # Client View Repository
//!
//! The client-side half of replication. A [`ClientRepository`] applies
//! server messages to its local views, forwards lifecycle notifications to a
//! [`PresentationSink`], and prepares outgoing updates after checking that
//! the local view role may send the field.

use crate::error::{ReplicationError, ReplicationResult};
use crate::fields;
use crate::messages::{ClientMessage, FieldUpdateRequest};
use crate::types::{ObjectId, SessionState, TypeTag, ViewRole, ZoneId};
use serde_json::Value;
use std::collections::BTreeMap;

/// A client-side view of a replicated object.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewObject {
    pub id: ObjectId,
    pub type_tag: TypeTag,
    pub parent_id: ObjectId,
    pub zone_id: ZoneId,
    pub role: ViewRole,
    pub fields: BTreeMap<String, Vec<Value>>,
}

/// Receives view lifecycle notifications, e.g. a renderer.
pub trait PresentationSink {
    fn generate(&mut self, view: &ViewObject);

    fn update(&mut self, view: &ViewObject, field: &str, args: &[Value]);

    fn delete(&mut self, object: ObjectId);

    fn role_changed(&mut self, _view: &ViewObject) {}

    fn state_changed(&mut self, _state: SessionState) {}

    fn ejected(&mut self, code: u16, message: &str);
}

/// Client-side replica of everything the server made visible.
#[derive(Debug)]
pub struct ClientRepository<P: PresentationSink> {
    session_root: ObjectId,
    views: BTreeMap<ObjectId, ViewObject>,
    state: SessionState,
    eject: Option<(u16, String)>,
    presentation: P,
}

impl<P: PresentationSink> ClientRepository<P> {
    /// Creates a repository that addresses logins to `session_root`.
    pub fn new(session_root: ObjectId, presentation: P) -> Self {
        Self {
            session_root,
            views: BTreeMap::new(),
            state: SessionState::Unauthenticated,
            eject: None,
            presentation,
        }
    }

    /// Applies one server message.
    pub fn apply(&mut self, message: ClientMessage) -> ReplicationResult<()> {
        match message {
            ClientMessage::ObjectCreated {
                object_id,
                type_tag,
                parent_id,
                zone_id,
                role,
                fields,
            } => {
                let view = ViewObject {
                    id: object_id,
                    type_tag,
                    parent_id,
                    zone_id,
                    role,
                    fields,
                };
                self.presentation.generate(&view);
                self.views.insert(object_id, view);
            }
            ClientMessage::ObjectRoleChanged { object_id, role } => {
                let view = self
                    .views
                    .get_mut(&object_id)
                    .ok_or(ReplicationError::ObjectNotFound(object_id))?;
                view.role = role;
                self.presentation.role_changed(view);
            }
            ClientMessage::ObjectDeleted { object_id } => {
                self.views
                    .remove(&object_id)
                    .ok_or(ReplicationError::ObjectNotFound(object_id))?;
                self.presentation.delete(object_id);
            }
            ClientMessage::FieldUpdate {
                object_id,
                field,
                args,
            } => {
                let view = self
                    .views
                    .get_mut(&object_id)
                    .ok_or(ReplicationError::ObjectNotFound(object_id))?;
                let def = fields::field_def(view.type_tag, &field)?;
                if !def.received_by(view.role) {
                    return Err(ReplicationError::ForbiddenField {
                        role: view.role,
                        object: object_id,
                        field,
                    });
                }
                if def.flags.is_stored() {
                    view.fields.insert(field.clone(), args.clone());
                }
                self.presentation.update(view, &field, &args);
            }
            ClientMessage::StateChanged { state } => {
                self.state = state;
                self.presentation.state_changed(state);
            }
            ClientMessage::Eject { code, message } => {
                self.state = SessionState::Ejected;
                self.presentation.ejected(code, &message);
                self.eject = Some((code, message));
            }
        }
        Ok(())
    }

    /// Builds an outgoing update after checking the local role may send it.
    pub fn prepare_update(
        &self,
        object: ObjectId,
        field: &str,
        args: Vec<Value>,
    ) -> ReplicationResult<FieldUpdateRequest> {
        let (type_tag, role) = if object == self.session_root {
            (TypeTag::SessionRoot, ViewRole::Global)
        } else {
            let view = self
                .views
                .get(&object)
                .ok_or(ReplicationError::ObjectNotFound(object))?;
            (view.type_tag, view.role)
        };

        let def = fields::field_def(type_tag, field)?;
        if !def.sendable_by(role) {
            return Err(ReplicationError::ForbiddenField {
                role,
                object,
                field: field.to_string(),
            });
        }
        def.validate_args(&args)?;
        Ok(FieldUpdateRequest::new(object, field, args))
    }

    /// `SessionRoot.login(username, password)`.
    pub fn login(&self, username: &str, password: &str) -> ReplicationResult<FieldUpdateRequest> {
        self.prepare_update(
            self.session_root,
            fields::LOGIN,
            vec![Value::from(username), Value::from(password)],
        )
    }

    /// `indicateIntent` on the owned avatar.
    pub fn indicate_intent(&self, heading: f64, speed: f64) -> ReplicationResult<FieldUpdateRequest> {
        let avatar = self.owned_avatar().ok_or(ReplicationError::ObjectNotFound(ObjectId::ROOT))?;
        self.prepare_update(
            avatar,
            fields::INDICATE_INTENT,
            vec![Value::from(heading), Value::from(speed)],
        )
    }

    pub fn owned_avatar(&self) -> Option<ObjectId> {
        self.views
            .values()
            .find(|view| view.role == ViewRole::OwnerView && view.type_tag == TypeTag::Avatar)
            .map(|view| view.id)
    }

    pub fn view(&self, object: ObjectId) -> Option<&ViewObject> {
        self.views.get(&object)
    }

    pub fn visible(&self) -> BTreeMap<ObjectId, ViewRole> {
        self.views.iter().map(|(id, view)| (*id, view.role)).collect()
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Code and message of the ejection, if the server ejected us.
    pub fn eject_reason(&self) -> Option<(u16, &str)> {
        self.eject.as_ref().map(|(code, msg)| (*code, msg.as_str()))
    }

    pub fn presentation(&self) -> &P {
        &self.presentation
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Default)]
    struct Log(Vec<String>);

    impl PresentationSink for Log {
        fn generate(&mut self, view: &ViewObject) {
            self.0.push(format!("generate {} {:?}", view.id, view.role));
        }

        fn update(&mut self, view: &ViewObject, field: &str, _args: &[Value]) {
            self.0.push(format!("update {} {}", view.id, field));
        }

        fn delete(&mut self, object: ObjectId) {
            self.0.push(format!("delete {}", object));
        }

        fn ejected(&mut self, code: u16, _message: &str) {
            self.0.push(format!("eject {}", code));
        }
    }

    fn created(id: u64, role: ViewRole) -> ClientMessage {
        let mut fields = BTreeMap::new();
        fields.insert(fields::SET_XYZH.to_string(), vec![json!(0.0); 4]);
        ClientMessage::ObjectCreated {
            object_id: ObjectId(id),
            type_tag: TypeTag::Avatar,
            parent_id: ObjectId(5),
            zone_id: ZoneId(0),
            role,
            fields,
        }
    }

    #[test]
    fn test_login_goes_to_session_root() {
        let repo = ClientRepository::new(ObjectId(1234), Log::default());
        let req = repo.login("guest", "guest").unwrap();
        assert_eq!(req.object_id, ObjectId(1234));
        assert_eq!(req.field, fields::LOGIN);
        assert_eq!(req.args, vec![json!("guest"), json!("guest")]);
    }

    #[test]
    fn test_intent_requires_owner_view() {
        let mut repo = ClientRepository::new(ObjectId(1234), Log::default());
        assert!(repo.indicate_intent(1.0, 0.0).is_err());

        repo.apply(created(10, ViewRole::ClientView)).unwrap();
        let err = repo
            .prepare_update(ObjectId(10), fields::INDICATE_INTENT, vec![json!(1.0), json!(0.0)])
            .unwrap_err();
        assert!(matches!(err, ReplicationError::ForbiddenField { .. }));

        repo.apply(created(11, ViewRole::OwnerView)).unwrap();
        assert_eq!(repo.owned_avatar(), Some(ObjectId(11)));
        let req = repo.indicate_intent(1.0, 0.0).unwrap();
        assert_eq!(req.object_id, ObjectId(11));
    }

    #[test]
    fn test_client_cannot_send_position() {
        let mut repo = ClientRepository::new(ObjectId(1234), Log::default());
        repo.apply(created(11, ViewRole::OwnerView)).unwrap();
        let err = repo
            .prepare_update(ObjectId(11), fields::SET_XYZH, vec![json!(0.0); 4])
            .unwrap_err();
        assert!(matches!(err, ReplicationError::ForbiddenField { .. }));
    }

    #[test]
    fn test_apply_updates_and_deletes() {
        let mut repo = ClientRepository::new(ObjectId(1234), Log::default());
        repo.apply(created(10, ViewRole::ClientView)).unwrap();
        repo.apply(ClientMessage::FieldUpdate {
            object_id: ObjectId(10),
            field: fields::SET_XYZH.to_string(),
            args: vec![json!(1.0), json!(2.0), json!(0.0), json!(90.0)],
        })
        .unwrap();
        assert_eq!(repo.view(ObjectId(10)).unwrap().fields[fields::SET_XYZH][3], json!(90.0));

        let err = repo
            .apply(ClientMessage::FieldUpdate {
                object_id: ObjectId(10),
                field: fields::INDICATE_INTENT.to_string(),
                args: vec![json!(0.0), json!(0.0)],
            })
            .unwrap_err();
        assert!(matches!(err, ReplicationError::ForbiddenField { .. }));

        repo.apply(ClientMessage::ObjectDeleted { object_id: ObjectId(10) }).unwrap();
        assert!(repo.visible().is_empty());
        assert_eq!(
            repo.presentation().0,
            vec!["generate 10 ClientView", "update 10 setXYZH", "delete 10"]
        );
    }

    #[test]
    fn test_role_change_and_eject() {
        let mut repo = ClientRepository::new(ObjectId(1234), Log::default());
        repo.apply(created(10, ViewRole::ClientView)).unwrap();
        repo.apply(ClientMessage::ObjectRoleChanged {
            object_id: ObjectId(10),
            role: ViewRole::OwnerView,
        })
        .unwrap();
        assert_eq!(repo.owned_avatar(), Some(ObjectId(10)));

        repo.apply(ClientMessage::StateChanged {
            state: SessionState::Established,
        })
        .unwrap();
        assert_eq!(repo.state(), SessionState::Established);

        repo.apply(ClientMessage::eject(crate::types::EjectReason::CheatDetected, "Invalid input"))
            .unwrap();
        assert_eq!(repo.state(), SessionState::Ejected);
        assert_eq!(repo.eject_reason(), Some((152, "Invalid input")));
    }
}
