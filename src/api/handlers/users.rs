//! User administration endpoints (admin only).
//!
//! Flow Overview:
//! 1) The policy layer has already restricted `/api/users` to admins.
//! 2) Role labels in create requests are parsed against the closed role set.
//! 3) Passwords are hashed before they reach the store; responses never carry
//!    the hash.

use axum::{
    Json,
    extract::{Extension, Path},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::info;
use utoipa::ToSchema;
use validator::Validate;

use super::{
    auth::{Principal, password::hash_password_blocking},
    input::{non_blank, trimmed},
    parse_id,
};
use crate::{
    api::error::{ApiError, ErrorEnvelope, ValidatedJson},
    store::{NewUser, Role, SharedStore, UserRecord, conflict_message, not_found_message},
};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: i64,
    pub username: String,
    pub roles: BTreeSet<Role>,
    pub enabled: bool,
}

impl From<UserRecord> for UserResponse {
    fn from(record: UserRecord) -> Self {
        Self {
            id: record.id,
            username: record.username,
            roles: record.roles,
            enabled: record.enabled,
        }
    }
}

#[derive(Deserialize, Validate, ToSchema)]
pub struct UserCreateRequest {
    #[serde(default, deserialize_with = "trimmed")]
    #[validate(
        required(message = "Username is required"),
        length(min = 3, max = 50, message = "Username must be between 3 and 50 characters")
    )]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    #[validate(required(message = "Password is required"))]
    pub password: Option<String>,
    /// Role labels such as `ROLE_TEACHER`.
    #[serde(default)]
    #[validate(length(min = 1, message = "At least one role is required"))]
    pub roles: Vec<String>,
}

impl std::fmt::Debug for UserCreateRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserCreateRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .field("roles", &self.roles)
            .finish()
    }
}

#[utoipa::path(
    get,
    path = "/api/users",
    responses(
        (status = 200, description = "All users.", body = [UserResponse]),
        (status = 401, description = "Missing or invalid bearer token.", body = ErrorEnvelope),
        (status = 403, description = "Forbidden.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn list_users(
    Extension(store): Extension<SharedStore>,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = store.list_users().await?;
    Ok(Json(users.into_iter().map(UserResponse::from).collect()))
}

#[utoipa::path(
    get,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "User detail.", body = UserResponse),
        (status = 400, description = "Invalid user id.", body = ErrorEnvelope),
        (status = 404, description = "User not found.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn get_user(
    Path(id): Path<String>,
    Extension(store): Extension<SharedStore>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_id(&id)?;
    store
        .find_user_by_id(id)
        .await?
        .map(|record| Json(UserResponse::from(record)))
        .ok_or_else(|| ApiError::NotFound(not_found_message("User", "id", id)))
}

#[utoipa::path(
    post,
    path = "/api/users",
    request_body = UserCreateRequest,
    responses(
        (status = 201, description = "User created.", body = UserResponse),
        (status = 400, description = "Validation failed or unknown role.", body = ErrorEnvelope),
        (status = 409, description = "Username already taken.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn create_user(
    Extension(principal): Extension<Principal>,
    Extension(store): Extension<SharedStore>,
    ValidatedJson(request): ValidatedJson<UserCreateRequest>,
) -> Result<(StatusCode, Json<UserResponse>), ApiError> {
    let username = request.username.unwrap_or_default();
    if store.exists_by_username(&username).await? {
        return Err(ApiError::Conflict(conflict_message("User", "username", &username)));
    }

    let roles = request
        .roles
        .iter()
        .map(|label| label.trim().parse::<Role>())
        .collect::<Result<BTreeSet<_>, _>>()
        .map_err(|err| ApiError::BadRequest(err.to_string()))?;

    let password_hash = hash_password_blocking(request.password.unwrap_or_default()).await?;
    let record = store
        .create_user(NewUser {
            username,
            password_hash,
            roles,
        })
        .await?;

    info!(
        user_id = record.id,
        username = %record.username,
        roles = ?record.roles,
        by = %principal.username,
        "User created"
    );
    Ok((StatusCode::CREATED, Json(record.into())))
}

#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 204, description = "User deleted."),
        (status = 404, description = "User not found.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn delete_user(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(store): Extension<SharedStore>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    store.delete_user(id).await?;
    info!(user_id = id, by = %principal.username, "User deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[utoipa::path(
    patch,
    path = "/api/users/{id}/toggle-status",
    params(("id" = i64, Path, description = "User id")),
    responses(
        (status = 200, description = "Enabled flag flipped.", body = UserResponse),
        (status = 404, description = "User not found.", body = ErrorEnvelope),
    ),
    security(("bearer_auth" = [])),
    tag = "users"
)]
pub async fn toggle_status(
    Path(id): Path<String>,
    Extension(principal): Extension<Principal>,
    Extension(store): Extension<SharedStore>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_id(&id)?;
    let current = store
        .find_user_by_id(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(not_found_message("User", "id", id)))?;

    let record = store.set_enabled(id, !current.enabled).await?;
    info!(
        username = %record.username,
        enabled = record.enabled,
        by = %principal.username,
        "User status changed"
    );
    Ok(Json(record.into()))
}
