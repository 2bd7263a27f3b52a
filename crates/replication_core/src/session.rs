//! Session Controller collaborators.
//!
//! The credential check is pluggable through [`Authenticator`]. The bundled
//! [`StaticCredentials`] compares against a fixed account list and is only a
//! placeholder for development setups.

use crate::error::ReplicationResult;
use crate::types::ObjectId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Checks a username/password pair.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Returns `Ok(true)` to accept, `Ok(false)` to reject. An `Err` is a
    /// failure of the collaborator itself and also rejects the login.
    async fn authenticate(&self, username: &str, password: &str) -> ReplicationResult<bool>;
}

/// A configured account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub username: String,
    pub password: String,
}

impl Account {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

/// Exact-match authenticator over a fixed account list.
#[derive(Debug, Clone, Default)]
pub struct StaticCredentials {
    accounts: HashMap<String, String>,
}

impl StaticCredentials {
    pub fn new(accounts: &[Account]) -> Self {
        Self {
            accounts: accounts
                .iter()
                .map(|a| (a.username.clone(), a.password.clone()))
                .collect(),
        }
    }
}

#[async_trait]
impl Authenticator for StaticCredentials {
    async fn authenticate(&self, username: &str, password: &str) -> ReplicationResult<bool> {
        Ok(self
            .accounts
            .get(username)
            .is_some_and(|expected| expected == password))
    }
}

/// Result of a login attempt that reached a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginOutcome {
    /// The session is established and owns `avatar`.
    Established { avatar: ObjectId },
    /// Credentials were rejected and the channel was ejected.
    Rejected,
}

impl LoginOutcome {
    pub fn avatar(&self) -> Option<ObjectId> {
        match self {
            LoginOutcome::Established { avatar } => Some(*avatar),
            LoginOutcome::Rejected => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_credentials() {
        let auth = StaticCredentials::new(&[Account::new("guest", "guest")]);
        assert!(auth.authenticate("guest", "guest").await.unwrap());
        assert!(!auth.authenticate("guest", "wrong").await.unwrap());
        assert!(!auth.authenticate("alice", "guest").await.unwrap());
    }

    #[test]
    fn test_outcome_avatar() {
        assert_eq!(LoginOutcome::Established { avatar: ObjectId(3) }.avatar(), Some(ObjectId(3)));
        assert_eq!(LoginOutcome::Rejected.avatar(), None);
    }
}
