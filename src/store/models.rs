//! Persisted records and the closed role set.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};
use thiserror::Error;
use utoipa::ToSchema;

/// Roles known to the system. Serialized as the `ROLE_*` labels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema)]
pub enum Role {
    #[serde(rename = "ROLE_ADMIN")]
    Admin,
    #[serde(rename = "ROLE_TEACHER")]
    Teacher,
}

impl Role {
    pub const ALL: [Self; 2] = [Self::Admin, Self::Teacher];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Admin => "ROLE_ADMIN",
            Self::Teacher => "ROLE_TEACHER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("Invalid role: {0}. Valid roles are: ROLE_ADMIN, ROLE_TEACHER")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|role| role.as_str() == value)
            .ok_or_else(|| UnknownRole(value.to_string()))
    }
}

/// Stored identity. The credential hash stays inside this type; request
/// handling works with the derived `Principal` instead.
#[derive(Clone)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
    pub enabled: bool,
    pub account_non_expired: bool,
    pub account_non_locked: bool,
    pub credentials_non_expired: bool,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    /// All four account flags must hold for the identity to authenticate.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        self.enabled
            && self.account_non_expired
            && self.account_non_locked
            && self.credentials_non_expired
    }
}

impl fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserRecord")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"***")
            .field("roles", &self.roles)
            .field("enabled", &self.enabled)
            .field("account_non_expired", &self.account_non_expired)
            .field("account_non_locked", &self.account_non_locked)
            .field("credentials_non_expired", &self.credentials_non_expired)
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// Input for creating an identity. The password is already hashed.
#[derive(Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub roles: BTreeSet<Role>,
}

impl fmt::Debug for NewUser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewUser")
            .field("username", &self.username)
            .field("password_hash", &"***")
            .field("roles", &self.roles)
            .finish()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Student {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub grade: f64,
    pub attendance: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct NewStudent {
    pub name: String,
    pub email: String,
    pub grade: f64,
    pub attendance: i32,
}

/// Partial update; `None` leaves the stored value untouched.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub email: Option<String>,
    pub grade: Option<f64>,
    pub attendance: Option<i32>,
}
