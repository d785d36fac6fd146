//! Persistence for identities and student records.
//!
//! Handlers depend on the [`Store`] trait object only. Two backends exist:
//! [`postgres::PostgresStore`] for deployments and [`memory::MemoryStore`]
//! for local runs without a DSN and for tests.

pub mod memory;
pub mod models;
pub mod postgres;
pub mod seed;

use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use models::{NewStudent, NewUser, Role, Student, StudentPatch, UserRecord};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Shared handle passed to handlers through an `Extension`.
pub type SharedStore = Arc<dyn Store>;

#[must_use]
pub fn not_found_message(resource: &str, field: &str, value: impl std::fmt::Display) -> String {
    format!("{resource} not found with {field}: '{value}'")
}

#[must_use]
pub fn conflict_message(resource: &str, field: &str, value: impl std::fmt::Display) -> String {
    format!("{resource} already exists with {field}: '{value}'")
}

pub(crate) fn not_found(resource: &str, field: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::NotFound(not_found_message(resource, field, value))
}

pub(crate) fn conflict(resource: &str, field: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Conflict(conflict_message(resource, field, value))
}

/// Identity lookups and lifecycle.
///
/// Username matching is exact and case-sensitive in every backend.
#[async_trait]
pub trait PrincipalStore: Send + Sync {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>>;
    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>>;
    async fn exists_by_username(&self, username: &str) -> StoreResult<bool>;
    async fn list_users(&self) -> StoreResult<Vec<UserRecord>>;
    /// Fails with `Conflict` when the username is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<UserRecord>;
    async fn delete_user(&self, id: i64) -> StoreResult<()>;
    async fn set_enabled(&self, id: i64, enabled: bool) -> StoreResult<UserRecord>;
}

#[async_trait]
pub trait StudentStore: Send + Sync {
    async fn list_students(&self) -> StoreResult<Vec<Student>>;
    async fn find_student(&self, id: i64) -> StoreResult<Option<Student>>;
    async fn count_students(&self) -> StoreResult<u64>;
    async fn exists_by_email(&self, email: &str) -> StoreResult<bool>;
    /// Fails with `Conflict` when the email is already used.
    async fn create_student(&self, student: NewStudent) -> StoreResult<Student>;
    async fn update_student(&self, id: i64, patch: StudentPatch) -> StoreResult<Student>;
    async fn delete_student(&self, id: i64) -> StoreResult<()>;
    /// Case-insensitive substring match on the name.
    async fn search_students(&self, name: &str) -> StoreResult<Vec<Student>>;
    async fn students_below_attendance(&self, threshold: i32) -> StoreResult<Vec<Student>>;
}

#[async_trait]
pub trait Store: PrincipalStore + StudentStore {
    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
