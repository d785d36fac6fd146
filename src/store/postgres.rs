//! PostgreSQL store.
//!
//! Queries are built at runtime so the crate compiles without a live
//! database. The schema in `sql/schema.sql` is applied on connect and is
//! idempotent.

use super::{
    PrincipalStore, Store, StoreError, StoreResult, StudentStore, conflict, not_found,
    models::{NewStudent, NewUser, Role, Student, StudentPatch, UserRecord},
};
use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{
    Connection, PgPool, Row,
    postgres::{PgPoolOptions, PgRow},
};
use std::{collections::BTreeSet, time::Duration};
use tracing::{Instrument, info_span, warn};

const SCHEMA: &str = include_str!("../../sql/schema.sql");

const SELECT_USER: &str = r"
    SELECT u.id, u.username, u.password_hash, u.enabled, u.account_non_expired,
           u.account_non_locked, u.credentials_non_expired, u.created_at,
           COALESCE(array_agg(r.role) FILTER (WHERE r.role IS NOT NULL), '{}')::text[] AS roles
    FROM users u
    LEFT JOIN user_roles r ON r.user_id = u.id
";

const SELECT_STUDENT: &str =
    "SELECT id, name, email, grade, attendance, created_at, updated_at FROM students";

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect and apply the schema.
    ///
    /// # Errors
    /// Returns an error if the pool cannot connect or the schema fails to apply.
    pub async fn connect(dsn: &str) -> anyhow::Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .acquire_timeout(Duration::from_secs(5))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        let store = Self { pool };
        store.ensure_schema().await?;
        Ok(store)
    }

    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn ensure_schema(&self) -> anyhow::Result<()> {
        sqlx::raw_sql(SCHEMA)
            .execute(&self.pool)
            .await
            .context("Failed to apply database schema")?;
        Ok(())
    }
}

fn user_from_row(row: &PgRow) -> StoreResult<UserRecord> {
    let labels: Vec<String> = row.try_get("roles").map_err(unexpected)?;
    let mut roles = BTreeSet::new();
    for label in labels {
        match label.parse::<Role>() {
            Ok(role) => {
                roles.insert(role);
            }
            Err(err) => warn!("Ignoring stored role: {err}"),
        }
    }

    Ok(UserRecord {
        id: row.try_get("id").map_err(unexpected)?,
        username: row.try_get("username").map_err(unexpected)?,
        password_hash: row.try_get("password_hash").map_err(unexpected)?,
        roles,
        enabled: row.try_get("enabled").map_err(unexpected)?,
        account_non_expired: row.try_get("account_non_expired").map_err(unexpected)?,
        account_non_locked: row.try_get("account_non_locked").map_err(unexpected)?,
        credentials_non_expired: row.try_get("credentials_non_expired").map_err(unexpected)?,
        created_at: row.try_get("created_at").map_err(unexpected)?,
    })
}

fn student_from_row(row: &PgRow) -> StoreResult<Student> {
    Ok(Student {
        id: row.try_get("id").map_err(unexpected)?,
        name: row.try_get("name").map_err(unexpected)?,
        email: row.try_get("email").map_err(unexpected)?,
        grade: row.try_get("grade").map_err(unexpected)?,
        attendance: row.try_get("attendance").map_err(unexpected)?,
        created_at: row.try_get("created_at").map_err(unexpected)?,
        updated_at: row
            .try_get::<Option<DateTime<Utc>>, _>("updated_at")
            .map_err(unexpected)?,
    })
}

fn unexpected(err: sqlx::Error) -> StoreError {
    StoreError::Unexpected(anyhow!(err))
}

fn students_from_rows(rows: &[PgRow]) -> StoreResult<Vec<Student>> {
    rows.iter().map(student_from_row).collect()
}

#[async_trait]
impl PrincipalStore for PostgresStore {
    async fn find_by_username(&self, username: &str) -> StoreResult<Option<UserRecord>> {
        let query = format!("{SELECT_USER} WHERE u.username = $1 GROUP BY u.id");
        let row = sqlx::query(&query)
            .bind(username)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load user by username")?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn find_user_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        let query = format!("{SELECT_USER} WHERE u.id = $1 GROUP BY u.id");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load user by id")?;
        row.as_ref().map(user_from_row).transpose()
    }

    async fn exists_by_username(&self, username: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE username = $1)")
                .bind(username)
                .fetch_one(&self.pool)
                .await
                .context("Failed to check username")?;
        Ok(exists)
    }

    async fn list_users(&self) -> StoreResult<Vec<UserRecord>> {
        let query = format!("{SELECT_USER} GROUP BY u.id ORDER BY u.id");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list users")?;
        rows.iter().map(user_from_row).collect()
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<UserRecord> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin transaction")?;

        let inserted = sqlx::query(
            r"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id
            ",
        )
        .bind(&user.username)
        .bind(&user.password_hash)
        .fetch_one(&mut *tx)
        .await;

        let id: i64 = match inserted {
            Ok(row) => row.try_get("id").map_err(unexpected)?,
            Err(err) if is_unique_violation(&err) => {
                return Err(conflict("User", "username", &user.username));
            }
            Err(err) => {
                return Err(StoreError::Unexpected(
                    anyhow!(err).context("Failed to insert user"),
                ));
            }
        };

        for role in &user.roles {
            sqlx::query("INSERT INTO user_roles (user_id, role) VALUES ($1, $2)")
                .bind(id)
                .bind(role.as_str())
                .execute(&mut *tx)
                .await
                .context("Failed to insert user role")?;
        }

        tx.commit().await.context("Failed to commit user")?;

        self.find_user_by_id(id)
            .await?
            .ok_or_else(|| not_found("User", "id", id))
    }

    async fn delete_user(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete user")?;
        if result.rows_affected() == 0 {
            return Err(not_found("User", "id", id));
        }
        Ok(())
    }

    async fn set_enabled(&self, id: i64, enabled: bool) -> StoreResult<UserRecord> {
        let result = sqlx::query("UPDATE users SET enabled = $1 WHERE id = $2")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to update user status")?;
        if result.rows_affected() == 0 {
            return Err(not_found("User", "id", id));
        }
        self.find_user_by_id(id)
            .await?
            .ok_or_else(|| not_found("User", "id", id))
    }
}

#[async_trait]
impl StudentStore for PostgresStore {
    async fn list_students(&self) -> StoreResult<Vec<Student>> {
        let query = format!("{SELECT_STUDENT} ORDER BY id");
        let rows = sqlx::query(&query)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list students")?;
        students_from_rows(&rows)
    }

    async fn find_student(&self, id: i64) -> StoreResult<Option<Student>> {
        let query = format!("{SELECT_STUDENT} WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to load student")?;
        row.as_ref().map(student_from_row).transpose()
    }

    async fn count_students(&self) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM students")
            .fetch_one(&self.pool)
            .await
            .context("Failed to count students")?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn exists_by_email(&self, email: &str) -> StoreResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM students WHERE email = $1)")
                .bind(email)
                .fetch_one(&self.pool)
                .await
                .context("Failed to check student email")?;
        Ok(exists)
    }

    async fn create_student(&self, student: NewStudent) -> StoreResult<Student> {
        let result = sqlx::query(
            r"
            INSERT INTO students (name, email, grade, attendance)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, email, grade, attendance, created_at, updated_at
            ",
        )
        .bind(&student.name)
        .bind(&student.email)
        .bind(student.grade)
        .bind(student.attendance)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(row) => student_from_row(&row),
            Err(err) if is_unique_violation(&err) => {
                Err(conflict("Student", "email", &student.email))
            }
            Err(err) => Err(StoreError::Unexpected(
                anyhow!(err).context("Failed to insert student"),
            )),
        }
    }

    async fn update_student(&self, id: i64, patch: StudentPatch) -> StoreResult<Student> {
        let email = patch.email.clone();
        let result = sqlx::query(
            r"
            UPDATE students
            SET name = COALESCE($2, name),
                email = COALESCE($3, email),
                grade = COALESCE($4, grade),
                attendance = COALESCE($5, attendance),
                updated_at = NOW()
            WHERE id = $1
            RETURNING id, name, email, grade, attendance, created_at, updated_at
            ",
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.email)
        .bind(patch.grade)
        .bind(patch.attendance)
        .fetch_optional(&self.pool)
        .await;

        match result {
            Ok(Some(row)) => student_from_row(&row),
            Ok(None) => Err(not_found("Student", "id", id)),
            Err(err) if is_unique_violation(&err) => Err(conflict(
                "Student",
                "email",
                email.unwrap_or_default(),
            )),
            Err(err) => Err(StoreError::Unexpected(
                anyhow!(err).context("Failed to update student"),
            )),
        }
    }

    async fn delete_student(&self, id: i64) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM students WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to delete student")?;
        if result.rows_affected() == 0 {
            return Err(not_found("Student", "id", id));
        }
        Ok(())
    }

    async fn search_students(&self, name: &str) -> StoreResult<Vec<Student>> {
        let query = format!("{SELECT_STUDENT} WHERE name ILIKE '%' || $1 || '%' ORDER BY id");
        let escaped = name
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");
        let rows = sqlx::query(&query)
            .bind(escaped)
            .fetch_all(&self.pool)
            .await
            .context("Failed to search students")?;
        students_from_rows(&rows)
    }

    async fn students_below_attendance(&self, threshold: i32) -> StoreResult<Vec<Student>> {
        let query = format!("{SELECT_STUDENT} WHERE attendance < $1 ORDER BY id");
        let rows = sqlx::query(&query)
            .bind(threshold)
            .fetch_all(&self.pool)
            .await
            .context("Failed to list students by attendance")?;
        students_from_rows(&rows)
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn health_check(&self) -> StoreResult<()> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self
            .pool
            .acquire()
            .instrument(acquire_span)
            .await
            .context("Failed to acquire database connection")?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping()
            .instrument(ping_span)
            .await
            .context("Failed to ping database")?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
