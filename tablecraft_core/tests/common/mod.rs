#![allow(dead_code)]

use axum::Router;
use std::sync::Arc;
use tablecraft_core::api::Api;
use tablecraft_core::config::{ApiConfig, AuthConfig};
use tablecraft_core::http::HttpClient;
use tablecraft_core::storage::MemoryStorage;
use tablecraft_core::token::TokenStore;

/// Serve `router` on an ephemeral local port and return its base URL
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

/// Client with all three services pointed at one mock server
pub fn client(base_url: &str, token: Option<&str>) -> HttpClient {
    let api = ApiConfig {
        auth_url: base_url.to_string(),
        core_url: base_url.to_string(),
        generation_url: base_url.to_string(),
        timeout_secs: 5,
    };
    let tokens = TokenStore::load(Arc::new(MemoryStorage::new())).unwrap();
    if let Some(token) = token {
        tokens.set(token).unwrap();
    }
    HttpClient::new(&api, AuthConfig::default(), tokens).unwrap()
}

pub fn api(base_url: &str) -> Api {
    Api::new(client(base_url, Some("valid")))
}
