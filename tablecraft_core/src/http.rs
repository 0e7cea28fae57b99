//! Request issuance against the auth, core and generation services.
//!
//! Every request carries the current bearer token (unless the caller set its
//! own `Authorization` header) and shares one cookie jar, so the refresh-token
//! cookie travels alongside bearer auth. A response whose error payload marks
//! an expired token triggers exactly one refresh and one retry.

use crate::config::{ApiConfig, AuthConfig};
use crate::error::{Result, TablecraftError};
use crate::token::TokenStore;
use bon::Builder;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
pub use reqwest::Method;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, info, trace, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Auth,
    Core,
    Generation,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(Value),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, Builder)]
pub struct ApiRequest {
    pub method: Method,
    pub service: Service,
    #[builder(into)]
    pub path: String,
    #[builder(default)]
    pub query: Vec<(String, String)>,
    pub body: Option<Body>,
    #[builder(default)]
    pub headers: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn get(service: Service, path: impl Into<String>) -> Self {
        Self::builder()
            .method(Method::GET)
            .service(service)
            .path(path)
            .build()
    }

    pub fn delete(service: Service, path: impl Into<String>) -> Self {
        Self::builder()
            .method(Method::DELETE)
            .service(service)
            .path(path)
            .build()
    }

    pub fn post(service: Service, path: impl Into<String>, body: Value) -> Self {
        Self::builder()
            .method(Method::POST)
            .service(service)
            .path(path)
            .body(Body::Json(body))
            .build()
    }

    pub fn patch(service: Service, path: impl Into<String>, body: Value) -> Self {
        Self::builder()
            .method(Method::PATCH)
            .service(service)
            .path(path)
            .body(Body::Json(body))
            .build()
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    fn has_header(&self, name: &HeaderName) -> bool {
        self.headers
            .iter()
            .any(|(k, _)| k.eq_ignore_ascii_case(name.as_str()))
    }
}

#[derive(Debug, Clone)]
struct ServiceEndpoints {
    auth: String,
    core: String,
    generation: String,
}

impl ServiceEndpoints {
    fn base(&self, service: Service) -> &str {
        match service {
            Service::Auth => &self.auth,
            Service::Core => &self.core,
            Service::Generation => &self.generation,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    #[serde(alias = "accessToken")]
    access_token: Option<String>,
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    inner: reqwest::Client,
    endpoints: ServiceEndpoints,
    auth: AuthConfig,
    tokens: TokenStore,
}

impl HttpClient {
    pub fn new(api: &ApiConfig, auth: AuthConfig, tokens: TokenStore) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(api.timeout())
            .build()?;

        let trim = |url: &str| url.trim_end_matches('/').to_string();
        Ok(Self {
            inner,
            endpoints: ServiceEndpoints {
                auth: trim(&api.auth_url),
                core: trim(&api.core_url),
                generation: trim(&api.generation_url),
            },
            auth,
            tokens,
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub fn url(&self, service: Service, path: &str) -> String {
        let base = self.endpoints.base(service);
        if path.starts_with('/') {
            format!("{base}{path}")
        } else {
            format!("{base}/{path}")
        }
    }

    /// Issue a request and decode the JSON body.
    ///
    /// Non-JSON responses decode to an empty object.
    pub async fn request_json(&self, request: &ApiRequest) -> Result<Value> {
        let response = self.execute(request).await?;

        let is_json = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.contains("application/json") || ct.contains("+json"));

        if !is_json {
            trace!(path = %request.path, "Non-JSON response, returning empty object");
            return Ok(Value::Object(Map::new()));
        }

        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(Value::Object(Map::new()));
        }
        Ok(serde_json::from_str(&text)?)
    }

    pub async fn request<T: DeserializeOwned>(&self, request: &ApiRequest) -> Result<T> {
        let value = self.request_json(request).await?;
        Ok(serde_json::from_value(value)?)
    }

    /// Issue a request and return the raw body bytes, skipping JSON decoding
    pub async fn fetch_bytes(&self, request: &ApiRequest) -> Result<Vec<u8>> {
        let response = self.execute(request).await?;
        let bytes = response.bytes().await?;
        debug!(path = %request.path, size = bytes.len(), "Fetched binary payload");
        Ok(bytes.to_vec())
    }

    /// Send a request, refreshing the token and retrying once on auth failure
    async fn execute(&self, request: &ApiRequest) -> Result<reqwest::Response> {
        let response = self.send(request, false).await?;
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let body = response.text().await?;

        if !self.is_auth_failure(&body) {
            debug!(path = %request.path, status, "Request failed");
            return Err(TablecraftError::Http { status, body });
        }

        if self.is_refresh_request(request) {
            warn!("Refresh endpoint rejected the session");
            return Err(TablecraftError::Unauthorized { status, body });
        }

        info!(path = %request.path, "Access token rejected, attempting refresh");
        if !self.refresh().await {
            return Err(TablecraftError::Unauthorized { status, body });
        }

        let retried = self.send(request, true).await?;
        if retried.status().is_success() {
            return Ok(retried);
        }

        let status = retried.status().as_u16();
        let body = retried.text().await?;
        if self.is_auth_failure(&body) {
            warn!(path = %request.path, "Request still unauthorized after refresh");
            Err(TablecraftError::Unauthorized { status, body })
        } else {
            Err(TablecraftError::Http { status, body })
        }
    }

    async fn send(&self, request: &ApiRequest, retry: bool) -> Result<reqwest::Response> {
        let url = self.url(request.service, &request.path);
        trace!(method = %request.method, url = %url, retry, "Sending request");

        let mut headers = HeaderMap::new();
        for (name, value) in &request.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| TablecraftError::config(format!("invalid header name: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| TablecraftError::config(format!("invalid header value: {e}")))?;
            headers.insert(name, value);
        }

        if !request.has_header(&AUTHORIZATION) {
            if let Some(token) = self.tokens.get() {
                let value = HeaderValue::from_str(&format!("Bearer {token}"))
                    .map_err(|e| TablecraftError::config(format!("invalid token: {e}")))?;
                headers.insert(AUTHORIZATION, value);
            }
        }

        let mut builder = self
            .inner
            .request(request.method.clone(), &url)
            .query(&request.query);

        match &request.body {
            Some(Body::Json(value)) => {
                if !request.has_header(&CONTENT_TYPE) {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
                }
                builder = builder.body(serde_json::to_vec(value)?);
            }
            Some(Body::Bytes(bytes)) => {
                builder = builder.body(bytes.clone());
            }
            None => {}
        }

        let response = builder.headers(headers).send().await.map_err(|e| {
            warn!(url = %url, error = %e, "Transport failure");
            e
        })?;
        trace!(url = %url, status = response.status().as_u16(), "Response received");
        Ok(response)
    }

    /// Ask the auth service for a fresh access token. True if one was stored.
    async fn refresh(&self) -> bool {
        let request = ApiRequest::builder()
            .method(Method::POST)
            .service(Service::Auth)
            .path(self.auth.refresh_path.clone())
            .build();

        let response = match self.send(&request, false).await {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!(status = r.status().as_u16(), "Token refresh rejected");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Token refresh failed");
                return false;
            }
        };

        let token = match response.json::<RefreshResponse>().await {
            Ok(RefreshResponse {
                access_token: Some(token),
            }) if !token.is_empty() => token,
            Ok(_) => {
                warn!("Refresh response carried no access token");
                return false;
            }
            Err(e) => {
                warn!(error = %e, "Refresh response was not valid JSON");
                return false;
            }
        };

        match self.tokens.set(token) {
            Ok(()) => {
                info!("Access token refreshed");
                true
            }
            Err(e) => {
                warn!(error = %e, "Could not persist refreshed token");
                false
            }
        }
    }

    fn is_refresh_request(&self, request: &ApiRequest) -> bool {
        request.service == Service::Auth
            && request.path.trim_end_matches('/') == self.auth.refresh_path.trim_end_matches('/')
    }

    fn is_auth_failure(&self, body: &str) -> bool {
        let Ok(payload) = serde_json::from_str::<Value>(body) else {
            return false;
        };
        self.payload_is_auth_failure(&payload)
            || payload
                .get("detail")
                .is_some_and(|detail| detail.is_object() && self.payload_is_auth_failure(detail))
    }

    fn payload_is_auth_failure(&self, payload: &Value) -> bool {
        let matches = |keys: &[&str], expected: &str| {
            keys.iter()
                .filter_map(|k| payload.get(*k).and_then(Value::as_str))
                .any(|v| v == expected)
        };
        matches(&["detail", "message"], &self.auth.failure_message)
            || matches(&["code", "error_code"], &self.auth.failure_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::sync::Arc;

    fn client() -> HttpClient {
        let api = ApiConfig {
            auth_url: "http://auth.local/".to_string(),
            core_url: "http://core.local".to_string(),
            generation_url: "http://gen.local/api".to_string(),
            timeout_secs: 5,
        };
        let tokens = TokenStore::load(Arc::new(MemoryStorage::new())).unwrap();
        HttpClient::new(&api, AuthConfig::default(), tokens).unwrap()
    }

    #[test]
    fn urls_join_base_and_path() {
        let client = client();
        assert_eq!(client.url(Service::Auth, "/auth/me"), "http://auth.local/auth/me");
        assert_eq!(
            client.url(Service::Generation, "datasets"),
            "http://gen.local/api/datasets"
        );
    }

    #[test]
    fn auth_failure_detection() {
        let client = client();
        assert!(client.is_auth_failure(&json!({"detail": "Could not validate credentials"}).to_string()));
        assert!(client.is_auth_failure(&json!({"code": "token_expired"}).to_string()));
        assert!(client.is_auth_failure(
            &json!({"detail": {"error_code": "token_expired", "message": "expired"}}).to_string()
        ));
        assert!(!client.is_auth_failure(&json!({"detail": "Not found"}).to_string()));
        assert!(!client.is_auth_failure("<html>bad gateway</html>"));
    }

    #[test]
    fn refresh_path_is_recognized() {
        let client = client();
        let refresh = ApiRequest::builder()
            .method(Method::POST)
            .service(Service::Auth)
            .path("/auth/refresh/")
            .build();
        assert!(client.is_refresh_request(&refresh));
        let other = ApiRequest::post(Service::Core, "/auth/refresh", json!({}));
        assert!(!client.is_refresh_request(&other));
    }
}
