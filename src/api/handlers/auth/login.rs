//! Session issuance.
//!
//! Flow Overview: validate the body, look the username up, verify the
//! password, then mint a token. Unknown users, wrong passwords and inactive
//! accounts all produce the same 401. When the username does not resolve the
//! password is still verified against a dummy hash so the response time does
//! not reveal which case occurred.

use axum::{Json, extract::Extension};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};
use utoipa::ToSchema;
use validator::Validate;

use super::{password::verify_password_blocking, state::AuthState};
use crate::{
    api::{
        error::{ApiError, INVALID_CREDENTIALS, ValidatedJson},
        handlers::input::non_blank,
    },
    store::{Role, SharedStore},
};

#[derive(Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[serde(default, deserialize_with = "non_blank")]
    #[validate(required(message = "Username is required"))]
    pub username: Option<String>,
    #[serde(default, deserialize_with = "non_blank")]
    #[validate(required(message = "Password is required"))]
    pub password: Option<String>,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    pub token_type: String,
    /// Token lifetime in milliseconds.
    pub expires_in: u64,
    pub username: String,
    pub roles: Vec<Role>,
}

#[utoipa::path(
    post,
    path = "/api/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Credentials accepted; bearer token issued.", body = LoginResponse),
        (status = 400, description = "Missing username or password.", body = crate::api::error::ErrorEnvelope),
        (status = 401, description = "Invalid username or password.", body = crate::api::error::ErrorEnvelope),
    ),
    tag = "auth"
)]
pub async fn login(
    Extension(auth): Extension<Arc<AuthState>>,
    Extension(store): Extension<SharedStore>,
    ValidatedJson(request): ValidatedJson<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let username = request.username.unwrap_or_default();
    let password = request.password.unwrap_or_default();

    let Some(record) = store.find_by_username(&username).await? else {
        let _ = verify_password_blocking(auth.dummy_hash().to_string(), password).await;
        debug!("Login rejected: unknown username");
        return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS));
    };

    let verified = verify_password_blocking(record.password_hash.clone(), password).await;
    if !verified {
        debug!(username = %record.username, "Login rejected: wrong password");
        return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS));
    }
    if !record.is_active() {
        debug!(username = %record.username, "Login rejected: account inactive");
        return Err(ApiError::Unauthenticated(INVALID_CREDENTIALS));
    }

    let roles: Vec<Role> = record.roles.iter().copied().collect();
    let issued = auth
        .tokens()
        .issue(&record.username, &roles, Utc::now())
        .map_err(|err| ApiError::Unexpected(err.into()))?;

    info!(username = %record.username, "Session issued");

    Ok(Json(LoginResponse {
        access_token: issued.token,
        token_type: "Bearer".to_string(),
        expires_in: issued.expires_in_ms,
        username: record.username,
        roles,
    }))
}
