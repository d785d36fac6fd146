//! API error type and the JSON error envelope.
//!
//! Every failure a handler or middleware returns goes through [`ApiError`].
//! Internal errors log details server-side and return a generic message.
//! The request path is not known where errors are built, so the envelope
//! travels in the response extensions and [`attach_request_path`] fills it in
//! on the way out.

use crate::store::StoreError;
use axum::{
    Json,
    body::Body,
    extract::{FromRequest, Request, rejection::JsonRejection},
    http::{Method, StatusCode, Uri, header::CONTENT_LENGTH},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use serde::{Serialize, de::DeserializeOwned};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::error;
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

pub const INVALID_CREDENTIALS: &str = "Invalid username or password";
pub const AUTHENTICATION_REQUIRED: &str = "Full authentication is required to access this resource";
pub const ACCESS_DENIED: &str = "Access denied. You don't have permission to access this resource.";
pub const UNEXPECTED: &str = "An unexpected error occurred. Please try again later.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Unauthenticated(&'static str),
    #[error("Access denied. You don't have permission to access this resource.")]
    Forbidden,
    #[error("Request method '{0}' is not supported")]
    MethodNotAllowed(Method),
    #[error("{0}")]
    BadRequest(String),
    #[error("Input validation failed")]
    Validation(BTreeMap<String, String>),
    #[error(transparent)]
    Unexpected(#[from] anyhow::Error),
}

/// JSON body of every error response.
#[derive(Clone, Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ErrorEnvelope {
    pub status: u16,
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_errors: Option<BTreeMap<String, String>>,
}

impl ApiError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::MethodNotAllowed(_) => StatusCode::METHOD_NOT_ALLOWED,
            Self::BadRequest(_) | Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unexpected(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn envelope(self) -> ErrorEnvelope {
        let status = self.status();
        let (error, message, field_errors) = match self {
            Self::Validation(fields) => (
                "Validation Failed".to_string(),
                "Input validation failed".to_string(),
                Some(fields),
            ),
            Self::Unexpected(err) => {
                error!("Unexpected error: {err:#}");
                (reason(status), UNEXPECTED.to_string(), None)
            }
            other => (reason(status), other.to_string(), None),
        };

        ErrorEnvelope {
            status: status.as_u16(),
            error,
            message,
            path: None,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            field_errors,
        }
    }
}

fn reason(status: StatusCode) -> String {
    status.canonical_reason().unwrap_or("Error").to_string()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let envelope = self.envelope();
        let mut response = (status, Json(envelope.clone())).into_response();
        response.extensions_mut().insert(envelope);
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(message) => Self::NotFound(message),
            StoreError::Conflict(message) => Self::Conflict(message),
            StoreError::Unexpected(err) => Self::Unexpected(err),
        }
    }
}

impl From<ValidationErrors> for ApiError {
    fn from(errors: ValidationErrors) -> Self {
        let fields = errors
            .field_errors()
            .into_iter()
            .filter_map(|(field, errs)| {
                errs.first().map(|err| {
                    let message = err
                        .message
                        .as_ref()
                        .map_or_else(|| err.code.to_string(), ToString::to_string);
                    (field.to_string(), message)
                })
            })
            .collect();
        Self::Validation(fields)
    }
}

/// Response middleware that stamps the request path into error envelopes.
pub async fn attach_request_path(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let Some(mut envelope) = response.extensions_mut().remove::<ErrorEnvelope>() else {
        return response;
    };
    envelope.path = Some(path);

    match serde_json::to_vec(&envelope) {
        Ok(bytes) => {
            response.headers_mut().remove(CONTENT_LENGTH);
            *response.body_mut() = Body::from(bytes);
        }
        Err(err) => error!("Failed to serialize error envelope: {err}"),
    }
    response
}

/// Router fallback for paths no route matches.
pub async fn no_route(method: Method, uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No endpoint {method} {}", uri.path()))
}

/// Router fallback for known paths hit with an unrouted method.
pub async fn method_not_allowed(method: Method) -> ApiError {
    ApiError::MethodNotAllowed(method)
}

/// JSON body extractor that runs `validator` rules before the handler sees
/// the payload.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Validate,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection: JsonRejection| ApiError::BadRequest(rejection.body_text()))?;
        value.validate()?;
        Ok(Self(value))
    }
}
