//! Bootstrap data for fresh deployments.
//!
//! Creates the default `admin` and `teacher` accounts when they are missing
//! and a handful of sample students when the student table is empty. Safe to
//! run on every start.

use anyhow::Result;
use std::collections::BTreeSet;
use tracing::{info, warn};

use super::{NewStudent, NewUser, Role, Store};
use crate::api::handlers::auth::password::hash_password_blocking;

struct DefaultAccount {
    username: &'static str,
    password: &'static str,
    role: Role,
}

const DEFAULT_ACCOUNTS: &[DefaultAccount] = &[
    DefaultAccount {
        username: "admin",
        password: "admin123",
        role: Role::Admin,
    },
    DefaultAccount {
        username: "teacher",
        password: "teacher123",
        role: Role::Teacher,
    },
];

const SAMPLE_STUDENTS: &[(&str, &str, f64, i32)] = &[
    ("John Doe", "john.doe@example.com", 85.5, 92),
    ("Jane Smith", "jane.smith@example.com", 92.0, 98),
    ("Bob Johnson", "bob.johnson@example.com", 78.5, 65),
    ("Alice Williams", "alice.williams@example.com", 95.0, 100),
    ("Charlie Brown", "charlie.brown@example.com", 70.0, 72),
];

/// What a [`seed`] run inserted.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub users_created: Vec<String>,
    pub students_created: usize,
}

/// Insert default accounts and sample students where absent.
///
/// # Errors
/// Returns an error if the store fails or a password cannot be hashed.
pub async fn seed(store: &dyn Store) -> Result<SeedReport> {
    let mut report = SeedReport::default();

    for account in DEFAULT_ACCOUNTS {
        if store.exists_by_username(account.username).await? {
            continue;
        }
        let password_hash = hash_password_blocking(account.password.to_string()).await?;
        store
            .create_user(NewUser {
                username: account.username.to_string(),
                password_hash,
                roles: BTreeSet::from([account.role]),
            })
            .await?;
        warn!(
            username = account.username,
            role = %account.role,
            "Default account created with a well-known password; change it before exposing this instance"
        );
        report.users_created.push(account.username.to_string());
    }

    if store.count_students().await? == 0 {
        for (name, email, grade, attendance) in SAMPLE_STUDENTS {
            store
                .create_student(NewStudent {
                    name: (*name).to_string(),
                    email: (*email).to_string(),
                    grade: *grade,
                    attendance: *attendance,
                })
                .await?;
            report.students_created += 1;
        }
        info!(count = report.students_created, "Sample students created");
    }

    Ok(report)
}
