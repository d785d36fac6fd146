//! Request authentication.
//!
//! Flow Overview: read the bearer token, verify it, then look the subject up
//! in the store again. Roles and account state come from that lookup and not
//! from the token claims, so disabling an account takes effect on the next
//! request. Any failure leaves the request without an identity; the policy
//! layer decides whether that matters.

use axum::{
    extract::{Extension, Request},
    http::{HeaderMap, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, error, warn};

use super::{TokenError, principal::Principal, state::AuthState};
use crate::store::SharedStore;

const PUBLIC_AUTH_PREFIX: &str = "/api/auth";

/// Token carried in an `Authorization: Bearer <token>` header.
///
/// The scheme is matched case-insensitively. Empty tokens and other schemes
/// yield `None`.
#[must_use]
pub fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() { None } else { Some(token) }
}

fn bypasses_authentication(path: &str) -> bool {
    path.strip_prefix(PUBLIC_AUTH_PREFIX)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
}

/// Resolve the caller for one request, or `None` if there is no usable
/// identity.
pub async fn resolve_principal(
    auth: &AuthState,
    store: &SharedStore,
    headers: &HeaderMap,
    now: DateTime<Utc>,
) -> Option<Principal> {
    let token = extract_bearer_token(headers)?;

    let verified = match auth.tokens().verify(token, now) {
        Ok(verified) => verified,
        Err(TokenError::Expired) => {
            debug!("Rejected expired session token");
            return None;
        }
        Err(err) => {
            warn!("Rejected session token: {err}");
            return None;
        }
    };

    let record = match store.find_by_username(&verified.username).await {
        Ok(Some(record)) => record,
        Ok(None) => {
            warn!(username = %verified.username, "Token subject no longer exists");
            return None;
        }
        Err(err) => {
            error!("Failed to resolve token subject: {err}");
            return None;
        }
    };

    let principal = Principal::from_record(&record);
    if principal.is_none() {
        debug!(username = %record.username, "Token subject is inactive");
    }
    principal
}

/// Middleware establishing the request's [`Principal`].
pub async fn authenticate(
    Extension(auth): Extension<Arc<AuthState>>,
    Extension(store): Extension<SharedStore>,
    mut request: Request,
    next: Next,
) -> Response {
    // Identity is only ever produced here.
    request.extensions_mut().remove::<Principal>();

    if bypasses_authentication(request.uri().path()) {
        return next.run(request).await;
    }

    if let Some(principal) = resolve_principal(&auth, &store, request.headers(), Utc::now()).await
    {
        request.extensions_mut().insert(principal);
    }

    next.run(request).await
}
