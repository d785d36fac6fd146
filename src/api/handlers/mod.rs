//! API handlers and shared helpers.
//!
//! Handlers receive the store and the caller's [`auth::Principal`] through
//! request extensions and return [`ApiError`] on failure.

pub mod auth;
pub mod health;
pub mod input;
pub mod students;
pub mod users;

use crate::api::error::ApiError;

/// Parse a numeric path id, answering 400 for anything else.
///
/// # Errors
/// Returns `ApiError::BadRequest` when `raw` is not a base-10 `i64`.
pub fn parse_id(raw: &str) -> Result<i64, ApiError> {
    raw.trim()
        .parse::<i64>()
        .map_err(|_| ApiError::BadRequest(format!("Invalid id: '{raw}'")))
}
