mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use common::{spawn, text};
use serde_json::json;

#[tokio::test]
async fn teacher_is_forbidden_from_user_admin() -> Result<()> {
    let app = spawn().await?;
    let teacher = app.teacher_token().await?;

    for (method, path) in [
        (Method::GET, "/api/users"),
        (Method::GET, "/api/users/1"),
        (Method::DELETE, "/api/users/1"),
        (Method::PATCH, "/api/users/1/toggle-status"),
    ] {
        let reply = app.send(method, path, Some(&teacher), None).await?;
        assert_eq!(reply.status, StatusCode::FORBIDDEN, "{path}");
    }
    Ok(())
}

#[tokio::test]
async fn admin_lists_users_without_credentials() -> Result<()> {
    let app = spawn().await?;
    let admin = app.admin_token().await?;

    let reply = app.send(Method::GET, "/api/users", Some(&admin), None).await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(
        reply.body,
        json!([
            { "id": 1, "username": "admin", "roles": ["ROLE_ADMIN"], "enabled": true },
            { "id": 2, "username": "teacher", "roles": ["ROLE_TEACHER"], "enabled": true },
        ])
    );
    Ok(())
}

#[tokio::test]
async fn created_user_can_log_in() -> Result<()> {
    let app = spawn().await?;
    let admin = app.admin_token().await?;

    let created = app
        .send(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({
                "username": "mentor",
                "password": "mentor-pass",
                "roles": ["ROLE_TEACHER", "ROLE_ADMIN"]
            })),
        )
        .await?;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(text(&created.body, "username"), Some("mentor"));
    assert_eq!(
        created.body.get("roles"),
        Some(&json!(["ROLE_ADMIN", "ROLE_TEACHER"]))
    );
    assert!(created.body.get("password").is_none());

    let token = app.login("mentor", "mentor-pass").await?;
    let users = app.send(Method::GET, "/api/users", Some(&token), None).await?;
    assert_eq!(users.status, StatusCode::OK);
    Ok(())
}

#[tokio::test]
async fn create_user_rejects_bad_input() -> Result<()> {
    let app = spawn().await?;
    let admin = app.admin_token().await?;

    let unknown_role = app
        .send(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({ "username": "mentor", "password": "pw", "roles": ["ROLE_JANITOR"] })),
        )
        .await?;
    assert_eq!(unknown_role.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        text(&unknown_role.body, "message"),
        Some("Invalid role: ROLE_JANITOR. Valid roles are: ROLE_ADMIN, ROLE_TEACHER")
    );

    let duplicate = app
        .send(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({ "username": "teacher", "password": "pw", "roles": ["ROLE_TEACHER"] })),
        )
        .await?;
    assert_eq!(duplicate.status, StatusCode::CONFLICT);
    assert_eq!(
        text(&duplicate.body, "message"),
        Some("User already exists with username: 'teacher'")
    );

    let invalid = app
        .send(
            Method::POST,
            "/api/users",
            Some(&admin),
            Some(json!({ "username": "ab", "roles": [] })),
        )
        .await?;
    assert_eq!(invalid.status, StatusCode::BAD_REQUEST);
    let errors = invalid.body.get("fieldErrors");
    assert!(errors.and_then(|e| e.get("username")).is_some());
    assert!(errors.and_then(|e| e.get("password")).is_some());
    assert!(errors.and_then(|e| e.get("roles")).is_some());
    Ok(())
}

#[tokio::test]
async fn toggle_status_flips_and_restores_access() -> Result<()> {
    let app = spawn().await?;
    let admin = app.admin_token().await?;

    let disabled = app
        .send(Method::PATCH, "/api/users/2/toggle-status", Some(&admin), None)
        .await?;
    assert_eq!(disabled.body.get("enabled"), Some(&json!(false)));
    assert!(app.login("teacher", "teacher123").await.is_err());

    let enabled = app
        .send(Method::PATCH, "/api/users/2/toggle-status", Some(&admin), None)
        .await?;
    assert_eq!(enabled.body.get("enabled"), Some(&json!(true)));
    assert!(app.login("teacher", "teacher123").await.is_ok());

    let missing = app
        .send(Method::PATCH, "/api/users/42/toggle-status", Some(&admin), None)
        .await?;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn deleted_user_disappears_and_loses_access() -> Result<()> {
    let app = spawn().await?;
    let admin = app.admin_token().await?;
    let teacher = app.teacher_token().await?;

    let deleted = app.send(Method::DELETE, "/api/users/2", Some(&admin), None).await?;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);

    let gone = app.send(Method::GET, "/api/users/2", Some(&admin), None).await?;
    assert_eq!(gone.status, StatusCode::NOT_FOUND);
    assert_eq!(text(&gone.body, "message"), Some("User not found with id: '2'"));

    let stale = app.send(Method::GET, "/api/students", Some(&teacher), None).await?;
    assert_eq!(stale.status, StatusCode::UNAUTHORIZED);
    Ok(())
}
