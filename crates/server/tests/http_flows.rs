//! End-to-end flows through the router, backed by the in-memory stores and
//! the test outbox. No database or SMTP relay required.

#![allow(clippy::unwrap_used)]

use std::sync::Arc;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use chrono::Duration;
use tokio::sync::mpsc;
use tower::ServiceExt;

use plaza_core::Email;
use plaza_server::routes;
use plaza_server::services::outbox::{Outbox, OutboundEmail};
use plaza_server::services::{CredentialService, FeedService};
use plaza_server::state::AppState;
use plaza_server::store::AccountStore;
use plaza_server::store::memory::{InMemoryAccountStore, InMemoryPostStore};

fn test_app() -> (
    Router,
    InMemoryAccountStore,
    mpsc::Receiver<OutboundEmail>,
) {
    let accounts = InMemoryAccountStore::new();
    let posts = InMemoryPostStore::new();
    let (outbox, mail) = Outbox::test();

    let credentials = Arc::new(CredentialService::new(
        Arc::new(accounts.clone()),
        outbox,
        Duration::minutes(15),
    ));
    let feed = Arc::new(FeedService::new(
        Arc::new(posts),
        Arc::new(accounts.clone()),
    ));
    let state = AppState::new(credentials, feed, None);

    (routes::router(state), accounts, mail)
}

async fn post_json(
    app: &Router,
    uri: &str,
    body: serde_json::Value,
) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

fn register_body(email: &str) -> serde_json::Value {
    serde_json::json!({
        "email": email,
        "password": "a sufficiently long password",
        "full_name": "Amina Bello",
        "shop_number": "B12",
        "phone_number": "08030000000",
        "business_name": "Bello Phones",
    })
}

async fn pending_code(accounts: &InMemoryAccountStore, email: &str) -> String {
    accounts
        .find_by_email(&Email::parse(email).unwrap())
        .await
        .unwrap()
        .unwrap()
        .pending_otp
        .unwrap()
        .code
}

#[tokio::test]
async fn register_verify_login_round_trip() {
    let (app, accounts, _mail) = test_app();

    let (status, body) = post_json(&app, "/register", register_body("a@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // Login is refused until the email is verified, even with the right
    // password.
    let (status, body) = post_json(
        &app,
        "/login",
        serde_json::json!({"email": "a@example.com", "password": "a sufficiently long password"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("verify"));

    // A wrong code is refused.
    let code = pending_code(&accounts, "a@example.com").await;
    let wrong = if code == "123456" { "654321" } else { "123456" };
    let (_, body) = post_json(
        &app,
        "/verify-otp",
        serde_json::json!({"email": "a@example.com", "otp": wrong}),
    )
    .await;
    assert_eq!(body["success"], false);

    // The mailed code flips the account to verified.
    let (status, body) = post_json(
        &app,
        "/verify-otp",
        serde_json::json!({"email": "a@example.com", "otp": code}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    // Re-submitting the consumed code fails.
    let (_, body) = post_json(
        &app,
        "/verify-otp",
        serde_json::json!({"email": "a@example.com", "otp": code}),
    )
    .await;
    assert_eq!(body["success"], false);

    let (status, body) = post_json(
        &app,
        "/login",
        serde_json::json!({"email": "a@example.com", "password": "a sufficiently long password"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn duplicate_registration_is_reported_in_the_envelope() {
    let (app, _accounts, _mail) = test_app();

    let (_, body) = post_json(&app, "/register", register_body("a@example.com")).await;
    assert_eq!(body["success"], true);

    let (status, body) = post_json(&app, "/register", register_body("a@example.com")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("already registered"));
}

#[tokio::test]
async fn recovery_mails_a_password_that_logs_in() {
    let (app, accounts, mut mail) = test_app();

    post_json(&app, "/register", register_body("a@example.com")).await;
    let code = pending_code(&accounts, "a@example.com").await;
    post_json(
        &app,
        "/verify-otp",
        serde_json::json!({"email": "a@example.com", "otp": code}),
    )
    .await;
    let _registration_mail = mail.try_recv().unwrap();

    let (status, body) = post_json(
        &app,
        "/forgot-password",
        serde_json::json!({"email": "a@example.com"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let recovery = mail.try_recv().unwrap();
    let new_password = recovery
        .text
        .split("password is: ")
        .nth(1)
        .and_then(|rest| rest.split_whitespace().next())
        .unwrap();

    let (_, body) = post_json(
        &app,
        "/login",
        serde_json::json!({"email": "a@example.com", "password": new_password}),
    )
    .await;
    assert_eq!(body["success"], true);

    // The password from before the recovery no longer works.
    let (_, body) = post_json(
        &app,
        "/login",
        serde_json::json!({"email": "a@example.com", "password": "a sufficiently long password"}),
    )
    .await;
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_email_gets_a_uniform_failure() {
    let (app, _accounts, _mail) = test_app();

    for (uri, body) in [
        (
            "/login",
            serde_json::json!({"email": "missing@example.com", "password": "whatever password"}),
        ),
        (
            "/verify-otp",
            serde_json::json!({"email": "missing@example.com", "otp": "123456"}),
        ),
        (
            "/forgot-password",
            serde_json::json!({"email": "missing@example.com"}),
        ),
    ] {
        let (status, body) = post_json(&app, uri, body).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], false);
        assert!(body["message"].as_str().unwrap().contains("not registered"));
    }
}

#[tokio::test]
async fn posts_and_profiles_round_trip() {
    let (app, accounts, _mail) = test_app();

    post_json(&app, "/register", register_body("a@example.com")).await;
    let account = accounts
        .find_by_email(&Email::parse("a@example.com").unwrap())
        .await
        .unwrap()
        .unwrap();

    let (status, body) = post_json(
        &app,
        "/posts",
        serde_json::json!({"account_id": account.id, "content": "new stock in"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["id"].is_string());

    let (status, profile) = get_json(&app, &format!("/profile/{}", account.id)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(profile["email"], "a@example.com");
    assert_eq!(profile["business_name"], "Bello Phones");
    // The profile view never exposes credential material.
    assert!(profile.get("credential_hash").is_none());
    assert!(profile.get("pending_otp").is_none());
}

#[tokio::test]
async fn unknown_profile_is_404() {
    let (app, _accounts, _mail) = test_app();

    let (status, body) = get_json(
        &app,
        &format!("/profile/{}", uuid::Uuid::new_v4()),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn posting_as_a_missing_account_is_404() {
    let (app, _accounts, _mail) = test_app();

    let (status, _) = post_json(
        &app,
        "/posts",
        serde_json::json!({"account_id": uuid::Uuid::new_v4(), "content": "orphan"}),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn health_endpoints_answer_without_a_database() {
    let (app, _accounts, _mail) = test_app();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
