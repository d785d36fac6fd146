//! In-memory store.
//!
//! State lives in ordered maps behind a `tokio::sync::RwLock` and is lost on
//! restart. Used when no DSN is configured and by the test suites. Ids are
//! assigned from per-table counters starting at 1, like a `BIGSERIAL`.

use super::{
    Store, StoreResult, conflict, not_found,
    models::{NewStudent, NewUser, Student, StudentPatch, UserRecord},
    PrincipalStore, StudentStore,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct State {
    users: BTreeMap<i64, UserRecord>,
    students: BTreeMap<i64, Student>,
    next_user_id: i64,
    next_student_id: i64,
}

impl State {
    fn allocate_user_id(&mut self) -> i64 {
        self.next_user_id += 1;
        self.next_user_id
    }

    fn allocate_student_id(&mut self) -> i64 {
        self.next_student_id += 1;
        self.next_student_id
    }

    fn email_taken(&self, email: &str, except: Option<i64>) -> bool {
        self.students
            .values()
            .any(|student| student.email == email && Some(student.id) != except)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Account mutators with no HTTP counterpart.
#[cfg(test)]
impl MemoryStore {
    /// Overwrite the three non-`enabled` account flags of an identity.
    pub async fn set_account_flags(
        &self,
        id: i64,
        account_non_expired: bool,
        account_non_locked: bool,
        credentials_non_expired: bool,
    ) -> StoreResult<UserRecord> {
        let mut state = self.state.write().await;
        let record = state
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found("User", "id", id))?;
        record.account_non_expired = account_non_expired;
        record.account_non_locked = account_non_locked;
        record.credentials_non_expired = credentials_non_expired;
        Ok(record.clone())
    }

    /// Replace the role set of an existing identity.
    pub async fn set_roles(
        &self,
        id: i64,
        roles: std::collections::BTreeSet<super::Role>,
    ) -> StoreResult<UserRecord> {
        let mut state = self.state.write().await;
        let record = state
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found("User", "id", id))?;
        record.roles = roles;
        Ok(record.clone())
    }
}

#[async_trait]
impl PrincipalStore for MemoryStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .values()
            .find(|user| user.username == username)
            .cloned())
    }

    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        Ok(self.state.read().await.users.get(&id).cloned())
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        let state = self.state.read().await;
        Ok(state.users.values().any(|user| user.username == username))
    }

    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        Ok(self.state.read().await.users.values().cloned().collect())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut state = self.state.write().await;
        if state.users.values().any(|u| u.username == user.username) {
            return Err(conflict("User", "username", &user.username));
        }
        let id = state.allocate_user_id();
        let record = UserRecord {
            id,
            username: user.username,
            password_hash: user.password_hash,
            roles: user.roles,
            enabled: true,
            account_non_expired: true,
            account_non_locked: true,
            credentials_non_expired: true,
            created_at: Utc::now(),
        };
        state.users.insert(id, record.clone());
        Ok(record)
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("User", "id", id))
    }

    async fn set_enabled(&self, id: i64, enabled: bool) -> StoreResult<UserRecord> {
        let mut state = self.state.write().await;
        let record = state
            .users
            .get_mut(&id)
            .ok_or_else(|| not_found("User", "id", id))?;
        record.enabled = enabled;
        Ok(record.clone())
    }
}

#[async_trait]
impl StudentStore for MemoryStore {
    async fn list_students(&self) -> StoreResult<Vec<Student>> {
        Ok(self.state.read().await.students.values().cloned().collect())
    }

    async fn find_student(&self, id: i64) -> StoreResult<Option<Student>> {
        Ok(self.state.read().await.students.get(&id).cloned())
    }

    async fn count_students(&self) -> StoreResult<u64> {
        let count = self.state.read().await.students.len();
        Ok(u64::try_from(count).unwrap_or(u64::MAX))
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        Ok(self.state.read().await.email_taken(email, None))
    }

    async fn create_student(&self, student: NewStudent) -> StoreResult<Student> {
        let mut state = self.state.write().await;
        if state.email_taken(&student.email, None) {
            return Err(conflict("Student", "email", &student.email));
        }
        let id = state.allocate_student_id();
        let record = Student {
            id,
            name: student.name,
            email: student.email,
            grade: student.grade,
            attendance: student.attendance,
            created_at: Utc::now(),
            updated_at: None,
        };
        state.students.insert(id, record.clone());
        Ok(record)
    }

    async fn update_student(&self, id: i64, patch: StudentPatch) -> StoreResult<Student> {
        let mut state = self.state.write().await;
        if !state.students.contains_key(&id) {
            return Err(not_found("Student", "id", id));
        }
        if let Some(email) = &patch.email {
            if state.email_taken(email, Some(id)) {
                return Err(conflict("Student", "email", email));
            }
        }
        let student = state
            .students
            .get_mut(&id)
            .ok_or_else(|| not_found("Student", "id", id))?;
        if let Some(name) = patch.name {
            student.name = name;
        }
        if let Some(email) = patch.email {
            student.email = email;
        }
        if let Some(grade) = patch.grade {
            student.grade = grade;
        }
        if let Some(attendance) = patch.attendance {
            student.attendance = attendance;
        }
        student.updated_at = Some(Utc::now());
        Ok(student.clone())
    }

    async fn delete_student(&self, id: i64) -> StoreResult<()> {
        let mut state = self.state.write().await;
        state
            .students
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| not_found("Student", "id", id))
    }

    async fn search_students(&self, name: &str) -> StoreResult<Vec<Student>> {
        let needle = name.to_lowercase();
        let state = self.state.read().await;
        Ok(state
            .students
            .values()
            .filter(|student| student.name.to_lowercase().contains(&needle))
            .cloned()
            .collect())
    }

    async fn students_below_attendance(&self, threshold: i32) -> StoreResult<Vec<Student>> {
        let state = self.state.read().await;
        Ok(state
            .students
            .values()
            .filter(|student| student.attendance < threshold)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
