//! Replication tuning, embedded in the server configuration file.

use crate::avatar::MotionConfig;
use crate::session::Account;
use crate::types::{ObjectId, ZoneId};
use serde::{Deserialize, Serialize};

/// What to do with out-of-range motion intents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum IntentViolationPolicy {
    /// Drop the intent and log it.
    #[default]
    Ignore,
    /// Eject the channel once it accumulates `threshold` violations.
    Eject { threshold: u32 },
}

/// Configuration of the replication core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplicationConfig {
    /// Well-known id of the global login object.
    pub session_root_id: ObjectId,
    /// Zone under the world root that holds the zone root.
    pub zone_root_zone: ZoneId,
    /// Zone under the zone root where avatars are created.
    pub avatar_zone: ZoneId,
    /// First id of the object id pool.
    pub min_object_id: u64,
    /// Last id of the object id pool.
    pub max_object_id: u64,
    pub motion: MotionConfig,
    pub intent_policy: IntentViolationPolicy,
    /// Accounts accepted by the bundled placeholder authenticator.
    pub accounts: Vec<Account>,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            session_root_id: ObjectId(1234),
            zone_root_zone: ZoneId(1),
            avatar_zone: ZoneId(0),
            min_object_id: 100_000_000,
            max_object_id: 399_999_999,
            motion: MotionConfig::default(),
            intent_policy: IntentViolationPolicy::Ignore,
            accounts: vec![Account::new("guest", "guest")],
        }
    }
}

impl ReplicationConfig {
    /// Validates the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.session_root_id.is_root() {
            return Err("Session root id cannot be 0".to_string());
        }
        if self.min_object_id == 0 {
            return Err("Object id pool cannot start at 0".to_string());
        }
        if self.min_object_id > self.max_object_id {
            return Err("Object id pool is empty (min_object_id > max_object_id)".to_string());
        }
        if let IntentViolationPolicy::Eject { threshold: 0 } = self.intent_policy {
            return Err("Intent eject threshold must be at least 1".to_string());
        }
        self.motion.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ReplicationConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.accounts, vec![Account::new("guest", "guest")]);
    }

    #[test]
    fn test_invalid_configs() {
        let mut config = ReplicationConfig {
            min_object_id: 10,
            max_object_id: 5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = ReplicationConfig {
            intent_policy: IntentViolationPolicy::Eject { threshold: 0 },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config = ReplicationConfig {
            session_root_id: ObjectId::ROOT,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_policy_serde() {
        let policy: IntentViolationPolicy =
            serde_json::from_str(r#"{"mode": "eject", "threshold": 3}"#).unwrap();
        assert_eq!(policy, IntentViolationPolicy::Eject { threshold: 3 });
        let json = serde_json::to_value(IntentViolationPolicy::Ignore).unwrap();
        assert_eq!(json["mode"], "ignore");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ReplicationConfig = serde_json::from_str(r#"{"avatar_zone": 3}"#).unwrap();
        assert_eq!(config.avatar_zone, ZoneId(3));
        assert_eq!(config.session_root_id, ObjectId(1234));
    }
}
