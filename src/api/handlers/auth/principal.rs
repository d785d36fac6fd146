//! Request-scoped caller identity.
//!
//! Flow Overview: the authentication filter re-resolves the token subject
//! against the store and, if the record is active, places a [`Principal`] in
//! the request extensions. Handlers read it from there; nothing about the
//! caller outlives the request.

use crate::store::{Role, UserRecord};
use std::collections::BTreeSet;

/// Authenticated caller derived from an active store record.
///
/// Carries no credential material.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    pub user_id: i64,
    pub username: String,
    pub roles: BTreeSet<Role>,
}

impl Principal {
    /// Build a principal from a stored identity, or `None` if any account flag
    /// is false.
    #[must_use]
    pub fn from_record(record: &UserRecord) -> Option<Self> {
        if !record.is_active() {
            return None;
        }
        Some(Self {
            user_id: record.id,
            username: record.username.clone(),
            roles: record.roles.clone(),
        })
    }

    #[must_use]
    pub fn has_any_role(&self, allowed: &[Role]) -> bool {
        allowed.iter().any(|role| self.roles.contains(role))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(enabled: bool) -> UserRecord {
        UserRecord {
            id: 7,
            username: "teacher".to_string(),
            password_hash: "$argon2id$hash".to_string(),
            roles: BTreeSet::from([Role::Teacher]),
            enabled,
            account_non_expired: true,
            account_non_locked: true,
            credentials_non_expired: true,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn active_record_becomes_principal() {
        let principal = Principal::from_record(&record(true));
        assert_eq!(
            principal,
            Some(Principal {
                user_id: 7,
                username: "teacher".to_string(),
                roles: BTreeSet::from([Role::Teacher]),
            })
        );
    }

    #[test]
    fn inactive_record_yields_none() {
        assert!(Principal::from_record(&record(false)).is_none());
    }

    #[test]
    fn role_intersection() {
        let principal = Principal::from_record(&record(true));
        assert!(principal
            .as_ref()
            .is_some_and(|p| p.has_any_role(&[Role::Admin, Role::Teacher])));
        assert!(principal
            .as_ref()
            .is_some_and(|p| !p.has_any_role(&[Role::Admin])));
        assert!(principal.is_some_and(|p| !p.has_any_role(&[])));
    }
}
