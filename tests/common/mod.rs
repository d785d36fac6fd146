#![allow(dead_code)]

use anyhow::{Context, Result};
use axum::{
    Router,
    body::Body,
    http::{HeaderMap, Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use roster::{
    api::{self, handlers::auth::{AuthConfig, AuthState}},
    store::{SharedStore, memory::MemoryStore, seed::seed},
};
use secrecy::SecretSlice;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

pub const FRONTEND_ORIGIN: &str = "http://localhost:3000";

pub struct TestApp {
    pub router: Router,
    pub store: Arc<MemoryStore>,
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Application over a seeded in-memory store.
pub async fn spawn() -> Result<TestApp> {
    let store = Arc::new(MemoryStore::new());
    seed(store.as_ref()).await?;

    let config = AuthConfig::new(SecretSlice::from(vec![11u8; 32]));
    let auth = Arc::new(AuthState::new(&config)?);
    let shared: SharedStore = store.clone();
    let router = api::app(shared, auth, FRONTEND_ORIGIN)?;

    Ok(TestApp { router, store })
}

impl TestApp {
    pub async fn send(
        &self,
        method: Method,
        path: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> Result<Reply> {
        let mut builder = Request::builder().method(method).uri(path);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(serde_json::to_vec(&body)?))?,
            None => builder.body(Body::empty())?,
        };
        self.dispatch(request).await
    }

    pub async fn dispatch(&self, request: Request<Body>) -> Result<Reply> {
        let response = self.router.clone().oneshot(request).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.into_body().collect().await?.to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok(Reply {
            status,
            headers,
            body,
        })
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let reply = self
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(serde_json::json!({ "username": username, "password": password })),
            )
            .await?;
        anyhow::ensure!(reply.status == StatusCode::OK, "login failed: {}", reply.body);
        reply
            .body
            .get("accessToken")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .context("login response without accessToken")
    }

    pub async fn admin_token(&self) -> Result<String> {
        self.login("admin", "admin123").await
    }

    pub async fn teacher_token(&self) -> Result<String> {
        self.login("teacher", "teacher123").await
    }
}

/// Field of a JSON body rendered as a string, for terse assertions.
pub fn text<'a>(body: &'a Value, field: &str) -> Option<&'a str> {
    body.get(field).and_then(Value::as_str)
}
