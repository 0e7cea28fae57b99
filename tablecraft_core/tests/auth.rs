mod common;

use axum::Json;
use axum::Router;
use axum::http::{HeaderMap, StatusCode, header};
use axum::routing::{get, post};
use serde_json::{Value, json};
use tablecraft_core::api::Api;

async fn login(Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["password"] != "hunter2" {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "detail": "Incorrect email or password" })),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "accessToken": "issued",
            "token_type": "bearer",
            "user": { "id": "u1", "email": body["email"] }
        })),
    )
}

async fn logout() -> StatusCode {
    StatusCode::SERVICE_UNAVAILABLE
}

async fn me(headers: HeaderMap) -> (StatusCode, Json<Value>) {
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some("Bearer issued") => (
            StatusCode::OK,
            Json(json!({ "id": "u1", "email": "ada@example.com", "full_name": "Ada" })),
        ),
        _ => (StatusCode::FORBIDDEN, Json(json!({ "detail": "Forbidden" }))),
    }
}

async fn start() -> String {
    let router = Router::new()
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(me));
    common::serve(router).await
}

#[tokio::test]
async fn login_stores_the_token_for_later_calls() {
    let base = start().await;
    let api = Api::new(common::client(&base, None));

    let tokens = api.auth.login("ada@example.com", "hunter2").await.unwrap();
    assert_eq!(tokens.access_token, "issued");
    assert_eq!(tokens.user.unwrap().email, "ada@example.com");

    let user = api.auth.me().await.unwrap();
    assert_eq!(user.full_name.as_deref(), Some("Ada"));
}

#[tokio::test]
async fn bad_credentials_leave_no_token() {
    let base = start().await;
    let client = common::client(&base, None);
    let api = Api::new(client.clone());

    let err = api.auth.login("ada@example.com", "wrong").await.unwrap_err();

    assert_eq!(err.status(), Some(400));
    assert!(!client.tokens().is_authenticated());
}

#[tokio::test]
async fn logout_clears_token_even_when_server_fails() {
    let base = start().await;
    let client = common::client(&base, Some("issued"));
    let api = Api::new(client.clone());

    let err = api.auth.logout().await.unwrap_err();

    assert_eq!(err.status(), Some(503));
    assert!(!client.tokens().is_authenticated());
}
