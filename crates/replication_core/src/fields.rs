//! # Field Class Table
//!
//! Every replicated class declares a fixed list of fields. The keywords on a
//! field decide who may send it and who receives it, and the router, the
//! registry and the client repository all consult this table instead of
//! hardcoding per-field behaviour.

use crate::error::{ReplicationError, ReplicationResult};
use crate::types::{TypeTag, ViewRole};
use serde_json::Value;
use std::ops::BitOr;

/// `SessionRoot.login(username, password)`
pub const LOGIN: &str = "login";
/// `Avatar.setXYZH(x, y, z, h)`
pub const SET_XYZH: &str = "setXYZH";
/// `Avatar.indicateIntent(heading, speed)`
pub const INDICATE_INTENT: &str = "indicateIntent";

/// Keyword set of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FieldFlags(u8);

impl FieldFlags {
    pub const NONE: FieldFlags = FieldFlags(0);
    /// Initialised at creation and shipped with creation notices.
    pub const REQUIRED: FieldFlags = FieldFlags(1);
    /// Latest value is kept on the authoritative record.
    pub const RAM: FieldFlags = FieldFlags(1 << 1);
    /// Delivered to every channel holding a view.
    pub const BROADCAST: FieldFlags = FieldFlags(1 << 2);
    /// Any channel that can see the object may send it.
    pub const CLSEND: FieldFlags = FieldFlags(1 << 3);
    /// Only the owning channel may send it.
    pub const OWNSEND: FieldFlags = FieldFlags(1 << 4);
    /// Delivered to the owner-view only.
    pub const OWNRECV: FieldFlags = FieldFlags(1 << 5);
    /// Handled by the authoritative side.
    pub const AIRECV: FieldFlags = FieldFlags(1 << 6);

    pub const fn union(self, other: FieldFlags) -> FieldFlags {
        FieldFlags(self.0 | other.0)
    }

    pub const fn contains(self, other: FieldFlags) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the authoritative record stores the latest value.
    pub const fn is_stored(self) -> bool {
        self.contains(Self::RAM) || self.contains(Self::REQUIRED)
    }
}

impl BitOr for FieldFlags {
    type Output = FieldFlags;

    fn bitor(self, rhs: FieldFlags) -> FieldFlags {
        self.union(rhs)
    }
}

/// Kind of a single field argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Number,
    Text,
}

/// Static definition of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub args: &'static [ArgKind],
    pub flags: FieldFlags,
}

impl FieldDef {
    pub fn arity(&self) -> usize {
        self.args.len()
    }

    /// Checks arity and argument kinds. Numbers must be finite.
    pub fn validate_args(&self, args: &[Value]) -> ReplicationResult<()> {
        if args.len() != self.args.len() {
            return Err(ReplicationError::MalformedArgs {
                field: self.name.to_string(),
                reason: format!("expected {} arguments, got {}", self.args.len(), args.len()),
            });
        }
        for (index, (kind, value)) in self.args.iter().zip(args).enumerate() {
            let ok = match kind {
                ArgKind::Number => value.as_f64().map(f64::is_finite).unwrap_or(false),
                ArgKind::Text => value.is_string(),
            };
            if !ok {
                return Err(ReplicationError::MalformedArgs {
                    field: self.name.to_string(),
                    reason: format!("argument {index} is not a valid {kind:?}"),
                });
            }
        }
        Ok(())
    }

    /// Whether a view with `role` may send this field.
    pub fn sendable_by(&self, role: ViewRole) -> bool {
        match role {
            ViewRole::Authoritative => true,
            ViewRole::OwnerView => {
                self.flags.contains(FieldFlags::CLSEND) || self.flags.contains(FieldFlags::OWNSEND)
            }
            ViewRole::ClientView | ViewRole::Global => self.flags.contains(FieldFlags::CLSEND),
        }
    }

    /// Whether a view with `role` receives this field.
    pub fn received_by(&self, role: ViewRole) -> bool {
        match role {
            ViewRole::Authoritative => self.flags.contains(FieldFlags::AIRECV),
            ViewRole::OwnerView => {
                self.flags.contains(FieldFlags::BROADCAST)
                    || self.flags.contains(FieldFlags::OWNRECV)
            }
            ViewRole::ClientView => self.flags.contains(FieldFlags::BROADCAST),
            ViewRole::Global => false,
        }
    }
}

const SESSION_ROOT_FIELDS: &[FieldDef] = &[FieldDef {
    name: LOGIN,
    args: &[ArgKind::Text, ArgKind::Text],
    flags: FieldFlags::CLSEND.union(FieldFlags::AIRECV),
}];

const ZONE_ROOT_FIELDS: &[FieldDef] = &[];

const AVATAR_FIELDS: &[FieldDef] = &[
    FieldDef {
        name: SET_XYZH,
        args: &[ArgKind::Number, ArgKind::Number, ArgKind::Number, ArgKind::Number],
        flags: FieldFlags::REQUIRED
            .union(FieldFlags::BROADCAST)
            .union(FieldFlags::RAM),
    },
    FieldDef {
        name: INDICATE_INTENT,
        args: &[ArgKind::Number, ArgKind::Number],
        flags: FieldFlags::OWNSEND.union(FieldFlags::AIRECV),
    },
];

/// All fields of a class, in declaration order.
pub fn class_fields(type_tag: TypeTag) -> &'static [FieldDef] {
    match type_tag {
        TypeTag::SessionRoot => SESSION_ROOT_FIELDS,
        TypeTag::ZoneRoot => ZONE_ROOT_FIELDS,
        TypeTag::Avatar => AVATAR_FIELDS,
    }
}

/// Looks up a field on a class.
pub fn field_def(type_tag: TypeTag, field: &str) -> ReplicationResult<&'static FieldDef> {
    class_fields(type_tag)
        .iter()
        .find(|def| def.name == field)
        .ok_or_else(|| ReplicationError::UnknownField {
            type_tag,
            field: field.to_string(),
        })
}

/// Default values for the required fields of a fresh object.
pub fn required_defaults(type_tag: TypeTag) -> Vec<(&'static str, Vec<Value>)> {
    class_fields(type_tag)
        .iter()
        .filter(|def| def.flags.contains(FieldFlags::REQUIRED))
        .map(|def| {
            let args = def
                .args
                .iter()
                .map(|kind| match kind {
                    ArgKind::Number => Value::from(0.0),
                    ArgKind::Text => Value::from(""),
                })
                .collect();
            (def.name, args)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_avatar_field_lookup() {
        let def = field_def(TypeTag::Avatar, SET_XYZH).unwrap();
        assert_eq!(def.arity(), 4);
        assert!(def.flags.contains(FieldFlags::BROADCAST));
        assert!(def.flags.is_stored());

        let err = field_def(TypeTag::ZoneRoot, SET_XYZH).unwrap_err();
        assert!(matches!(err, ReplicationError::UnknownField { .. }));
    }

    #[test]
    fn test_role_send_rules() {
        let intent = field_def(TypeTag::Avatar, INDICATE_INTENT).unwrap();
        assert!(intent.sendable_by(ViewRole::OwnerView));
        assert!(!intent.sendable_by(ViewRole::ClientView));

        let login = field_def(TypeTag::SessionRoot, LOGIN).unwrap();
        assert!(login.sendable_by(ViewRole::Global));
        assert!(login.received_by(ViewRole::Authoritative));
    }

    #[test]
    fn test_role_receive_rules() {
        let xyzh = field_def(TypeTag::Avatar, SET_XYZH).unwrap();
        assert!(xyzh.received_by(ViewRole::ClientView));
        assert!(xyzh.received_by(ViewRole::OwnerView));

        let intent = field_def(TypeTag::Avatar, INDICATE_INTENT).unwrap();
        assert!(!intent.received_by(ViewRole::ClientView));
        assert!(!intent.received_by(ViewRole::OwnerView));
    }

    #[test]
    fn test_argument_validation() {
        let intent = field_def(TypeTag::Avatar, INDICATE_INTENT).unwrap();
        assert!(intent.validate_args(&[json!(0.5), json!(-1.0)]).is_ok());
        assert!(intent.validate_args(&[json!(0.5)]).is_err());
        assert!(intent.validate_args(&[json!("fast"), json!(0.0)]).is_err());

        let login = field_def(TypeTag::SessionRoot, LOGIN).unwrap();
        assert!(login.validate_args(&[json!("guest"), json!("guest")]).is_ok());
        assert!(login.validate_args(&[json!("guest"), json!(3)]).is_err());
    }

    #[test]
    fn test_required_defaults() {
        let defaults = required_defaults(TypeTag::Avatar);
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].0, SET_XYZH);
        assert_eq!(defaults[0].1.len(), 4);
        assert!(required_defaults(TypeTag::ZoneRoot).is_empty());
    }
}
