//! Role and user-map management endpoint tests.

mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use google_auth_service::services::AuthorizationMode;
use serde_json::json;

#[tokio::test]
async fn admin_routes_require_api_key() {
    let app = TestApp::spawn(AuthorizationMode::Role).await;

    let (status, _) = app.request(Method::GET, "/roles", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app
        .request(Method::GET, "/roles", None, Some("wrong-key"))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.admin(Method::GET, "/roles", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn role_lifecycle() {
    let app = TestApp::spawn(AuthorizationMode::Role).await;

    let (status, body) = app
        .admin(
            Method::POST,
            "/role/DevOps",
            Some(json!({
                "bound_domain": "a.com",
                "bound_groups": "g1@a.com,g2@a.com",
                "policies": "Ops,dev",
                "ttl": "30m",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["name"], "devops");
    assert_eq!(body["warnings"], json!([]));

    let (status, body) = app.admin(Method::GET, "/role/devops", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["policies"], json!(["dev", "ops"]));
    assert_eq!(body["bound_domain"], "a.com");
    assert_eq!(body["bound_groups"], json!(["g1@a.com", "g2@a.com"]));
    assert_eq!(body["ttl"], 1800);
    assert_eq!(body["max_ttl"], 0);

    let (status, _) = app
        .admin(Method::PUT, "/role/devops", Some(json!({ "max_ttl": 3600 })))
        .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = app.admin(Method::GET, "/role", None).await;
    assert_eq!(body["keys"], json!(["devops"]));

    let (status, _) = app.admin(Method::DELETE, "/role/devops", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.admin(Method::GET, "/role/devops", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_roles_are_rejected() {
    let app = TestApp::spawn(AuthorizationMode::Role).await;

    let (status, body) = app
        .admin(Method::POST, "/role/dev", Some(json!({ "policies": "dev" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "bound domain cannot be empty");

    let (status, body) = app
        .admin(
            Method::POST,
            "/role/dev",
            Some(json!({ "bound_domain": "a.com", "ttl": 600, "max_ttl": 60 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ttl should be shorter than max_ttl");

    let (status, body) = app
        .admin(
            Method::POST,
            "/role/dev",
            Some(json!({ "bound_domain": "a.com", "max_ttl": -1 })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "max_ttl cannot be negative");

    let (_, body) = app.admin(Method::GET, "/roles", None).await;
    assert_eq!(body["keys"], json!([]));
}

#[tokio::test]
async fn long_ttls_produce_warnings() {
    let app = TestApp::spawn(AuthorizationMode::Role).await;

    let (status, body) = app
        .admin(
            Method::POST,
            "/role/dev",
            Some(json!({ "bound_domain": "a.com", "ttl": "2h", "max_ttl": "3h" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["warnings"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn user_map_lifecycle() {
    let app = TestApp::spawn(AuthorizationMode::LegacyUsers).await;

    let (status, body) = app
        .admin(Method::POST, "/users/jane", Some(json!({ "policies": ["b", "a"] })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["policies"], json!(["a", "b"]));

    let (_, body) = app.admin(Method::GET, "/users", None).await;
    assert_eq!(body["keys"], json!(["jane"]));

    let (status, _) = app.admin(Method::DELETE, "/users/jane", None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.admin(Method::GET, "/users/jane", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
