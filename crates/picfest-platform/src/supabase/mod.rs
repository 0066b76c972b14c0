//! Hosted binding. Auth, tables and storage over the project's REST
//! endpoints, the change feed over its realtime websocket.
//!
//! Requests are made with the service key: callers are expected to have
//! checked roles and ownership before reaching this layer.

pub mod auth;
pub mod realtime;
pub mod storage;
pub mod store;

use std::sync::Arc;

use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::warn;

use crate::{Platform, PlatformError, PlatformResult};

pub use auth::SupabaseAuth;
pub use realtime::RealtimeFeed;
pub use storage::SupabaseStorage;
pub use store::SupabaseStore;

/// Error bodies differ per service: auth uses `msg`/`error_description`,
/// tables use `code`/`message`, storage uses `error`/`message`.
#[derive(Debug, Default, Deserialize)]
struct ErrorEnvelope {
    code: Option<serde_json::Value>,
    message: Option<String>,
    msg: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
    error_code: Option<String>,
}

impl ErrorEnvelope {
    fn text(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
    }

    fn is_unique_violation(&self) -> bool {
        matches!(&self.code, Some(serde_json::Value::String(code)) if code == "23505")
            || matches!(self.error_code.as_deref(), Some("user_already_exists" | "email_exists"))
    }

    fn is_bad_credentials(&self) -> bool {
        matches!(self.error.as_deref(), Some("invalid_grant"))
            || matches!(self.error_code.as_deref(), Some("invalid_credentials"))
    }
}

pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    key: String,
}

impl SupabaseClient {
    pub fn new(base_url: &str, key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            key,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Request authorized with the service key.
    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.request_as(method, path, &self.key)
    }

    /// Request on behalf of a signed-in user.
    pub(crate) fn request_as(&self, method: Method, path: &str, token: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.key)
            .header(AUTHORIZATION, format!("Bearer {}", token))
    }

    /// `/rest/v1/{table}` asking for the written rows back.
    pub(crate) fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.request(method, &format!("/rest/v1/{}", table))
            .header(CONTENT_TYPE, "application/json")
            .header("Prefer", "return=representation")
    }

    /// Turn a non-2xx response into a `PlatformError`, keeping the
    /// platform's own message.
    pub(crate) async fn ensure_success(resp: Response, context: &str) -> PlatformResult<Response> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }

        let body = resp.text().await.unwrap_or_default();
        let envelope: ErrorEnvelope = serde_json::from_str(&body).unwrap_or_default();
        let message = envelope
            .text()
            .unwrap_or_else(|| format!("{} failed with status {}", context, status));

        warn!(status = %status, context = %context, response_body = %body, "platform request failed");

        Err(match status {
            StatusCode::NOT_FOUND => PlatformError::NotFound,
            StatusCode::UNAUTHORIZED => PlatformError::Unauthorized,
            StatusCode::FORBIDDEN => PlatformError::Forbidden,
            StatusCode::CONFLICT => PlatformError::Conflict(message),
            _ if envelope.is_unique_violation() => PlatformError::Conflict(message),
            _ if envelope.is_bad_credentials() => PlatformError::Unauthorized,
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                PlatformError::Invalid(message)
            }
            _ => PlatformError::Backend(message),
        })
    }

    pub(crate) async fn json<T: DeserializeOwned>(
        builder: RequestBuilder,
        context: &str,
    ) -> PlatformResult<T> {
        let resp = Self::ensure_success(builder.send().await?, context).await?;
        Ok(resp.json().await?)
    }

    /// Rows a table call returned, expecting exactly one.
    pub(crate) async fn single<T: DeserializeOwned>(
        builder: RequestBuilder,
        context: &str,
    ) -> PlatformResult<T> {
        Self::json::<Vec<T>>(builder, context)
            .await?
            .into_iter()
            .next()
            .ok_or(PlatformError::NotFound)
    }
}

/// Wire the hosted pieces together.
pub fn platform(base_url: &str, service_key: String) -> Platform {
    let client = Arc::new(SupabaseClient::new(base_url, service_key));
    Platform {
        auth: Arc::new(SupabaseAuth::new(client.clone())),
        store: Arc::new(SupabaseStore::new(client.clone())),
        storage: Arc::new(SupabaseStorage::new(client.clone(), crate::paths::MEDIA_BUCKET)),
        feed: Arc::new(RealtimeFeed::new(client)),
    }
}
