mod common;

use anyhow::Result;
use axum::{
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use common::{spawn, text};
use serde_json::{Value, json};

const AUTH_REQUIRED: &str = "Full authentication is required to access this resource";

#[tokio::test]
async fn admin_login_returns_bearer_token() -> Result<()> {
    let app = spawn().await?;

    let reply = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "admin", "password": "admin123" })),
        )
        .await?;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(text(&reply.body, "tokenType"), Some("Bearer"));
    assert_eq!(text(&reply.body, "username"), Some("admin"));
    assert_eq!(reply.body.get("roles"), Some(&json!(["ROLE_ADMIN"])));
    assert_eq!(reply.body.get("expiresIn"), Some(&json!(86_400_000)));
    assert!(text(&reply.body, "accessToken").is_some_and(|t| t.split('.').count() == 3));
    Ok(())
}

#[tokio::test]
async fn unknown_user_and_wrong_password_look_the_same() -> Result<()> {
    let app = spawn().await?;

    let mut bodies = Vec::new();
    for (username, password) in [("ghost", "admin123"), ("admin", "nope"), ("ADMIN", "admin123")] {
        let reply = app
            .send(
                Method::POST,
                "/api/auth/login",
                None,
                Some(json!({ "username": username, "password": password })),
            )
            .await?;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
        let mut body = reply.body;
        if let Some(map) = body.as_object_mut() {
            map.remove("timestamp");
        }
        bodies.push(body);
    }

    assert_eq!(text(&bodies[0], "message"), Some("Invalid username or password"));
    assert_eq!(text(&bodies[0], "path"), Some("/api/auth/login"));
    assert!(bodies.iter().all(|body| *body == bodies[0]));
    Ok(())
}

#[tokio::test]
async fn login_requires_both_fields() -> Result<()> {
    let app = spawn().await?;

    let reply = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "admin", "password": "   " })),
        )
        .await?;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(text(&reply.body, "error"), Some("Validation Failed"));
    let fields = reply.body.get("fieldErrors");
    assert_eq!(
        fields.and_then(|f| f.get("password")).and_then(Value::as_str),
        Some("Password is required")
    );
    assert!(fields.and_then(|f| f.get("username")).is_none());
    Ok(())
}

#[tokio::test]
async fn malformed_login_body_is_bad_request() -> Result<()> {
    let app = spawn().await?;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))?;
    let reply = app.dispatch(request).await?;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body.get("status"), Some(&json!(400)));
    Ok(())
}

#[tokio::test]
async fn login_ignores_stale_authorization_header() -> Result<()> {
    let app = spawn().await?;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/auth/login")
        .header(header::AUTHORIZATION, "Bearer not.a.token")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"username":"teacher","password":"teacher123"}"#))?;
    let reply = app.dispatch(request).await?;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body.get("roles"), Some(&json!(["ROLE_TEACHER"])));
    Ok(())
}

#[tokio::test]
async fn public_routes_need_no_token() -> Result<()> {
    let app = spawn().await?;

    let health = app.send(Method::GET, "/health", None, None).await?;
    assert_eq!(health.status, StatusCode::OK);
    assert_eq!(text(&health.body, "store"), Some("memory"));
    assert_eq!(text(&health.body, "database"), Some("ok"));
    assert!(health.headers.contains_key("x-app"));

    let docs = app.send(Method::GET, "/api-docs/openapi.json", None, None).await?;
    assert_eq!(docs.status, StatusCode::OK);
    assert!(docs.body.pointer("/paths/~1api~1students").is_some());
    assert!(docs
        .body
        .pointer("/components/securitySchemes/bearer_auth")
        .is_some());
    Ok(())
}

#[tokio::test]
async fn protected_routes_without_identity_are_unauthorized() -> Result<()> {
    let app = spawn().await?;

    let reply = app.send(Method::GET, "/api/students", None, None).await?;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(text(&reply.body, "message"), Some(AUTH_REQUIRED));
    assert_eq!(text(&reply.body, "path"), Some("/api/students"));
    assert_eq!(text(&reply.body, "error"), Some("Unauthorized"));

    for value in ["Basic YWRtaW46YWRtaW4xMjM=", "Bearer ", "Bearer garbage", "admin123"] {
        let request = Request::builder()
            .uri("/api/students")
            .header(header::AUTHORIZATION, value)
            .body(Body::empty())?;
        let reply = app.dispatch(request).await?;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "header {value:?}");
    }
    Ok(())
}

#[tokio::test]
async fn unmatched_paths_still_require_authentication() -> Result<()> {
    let app = spawn().await?;

    let anonymous = app.send(Method::GET, "/api/unknown", None, None).await?;
    assert_eq!(anonymous.status, StatusCode::UNAUTHORIZED);

    let token = app.teacher_token().await?;
    let known = app.send(Method::GET, "/api/unknown", Some(&token), None).await?;
    assert_eq!(known.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn unrouted_requests_get_the_error_envelope() -> Result<()> {
    let app = spawn().await?;
    let admin = app.admin_token().await?;

    let missing = app
        .send(Method::GET, "/api/nothing-here", Some(&admin), None)
        .await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body.get("status"), Some(&json!(404)));
    assert_eq!(text(&missing.body, "error"), Some("Not Found"));
    assert_eq!(
        text(&missing.body, "message"),
        Some("No endpoint GET /api/nothing-here")
    );
    assert_eq!(text(&missing.body, "path"), Some("/api/nothing-here"));
    assert!(text(&missing.body, "timestamp").is_some());

    let wrong_method = app
        .send(Method::PATCH, "/api/students/1", Some(&admin), None)
        .await?;
    assert_eq!(wrong_method.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(wrong_method.body.get("status"), Some(&json!(405)));
    assert_eq!(text(&wrong_method.body, "error"), Some("Method Not Allowed"));
    assert_eq!(
        text(&wrong_method.body, "message"),
        Some("Request method 'PATCH' is not supported")
    );
    assert_eq!(text(&wrong_method.body, "path"), Some("/api/students/1"));
    assert!(text(&wrong_method.body, "timestamp").is_some());
    Ok(())
}

#[tokio::test]
async fn disabled_account_loses_access_immediately() -> Result<()> {
    let app = spawn().await?;
    let admin = app.admin_token().await?;
    let teacher = app.teacher_token().await?;

    let before = app.send(Method::GET, "/api/students", Some(&teacher), None).await?;
    assert_eq!(before.status, StatusCode::OK);

    let toggled = app
        .send(Method::PATCH, "/api/users/2/toggle-status", Some(&admin), None)
        .await?;
    assert_eq!(toggled.status, StatusCode::OK);
    assert_eq!(toggled.body.get("enabled"), Some(&json!(false)));

    let after = app.send(Method::GET, "/api/students", Some(&teacher), None).await?;
    assert_eq!(after.status, StatusCode::UNAUTHORIZED);

    let relogin = app
        .send(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({ "username": "teacher", "password": "teacher123" })),
        )
        .await?;
    assert_eq!(relogin.status, StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn request_id_is_generated_or_propagated() -> Result<()> {
    let app = spawn().await?;

    let generated = app.send(Method::GET, "/health", None, None).await?;
    assert!(generated
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .is_some_and(|id| id.len() == 26));

    let request = Request::builder()
        .uri("/health")
        .header("x-request-id", "trace-me")
        .body(Body::empty())?;
    let echoed = app.dispatch(request).await?;
    assert_eq!(
        echoed.headers.get("x-request-id").and_then(|v| v.to_str().ok()),
        Some("trace-me")
    );
    Ok(())
}

#[tokio::test]
async fn cors_preflight_allows_frontend_origin() -> Result<()> {
    let app = spawn().await?;

    let request = Request::builder()
        .method(Method::OPTIONS)
        .uri("/api/students")
        .header(header::ORIGIN, common::FRONTEND_ORIGIN)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
        .body(Body::empty())?;
    let reply = app.dispatch(request).await?;

    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply
            .headers
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|v| v.to_str().ok()),
        Some(common::FRONTEND_ORIGIN)
    );
    assert_eq!(
        reply
            .headers
            .get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS)
            .and_then(|v| v.to_str().ok()),
        Some("true")
    );
    Ok(())
}
