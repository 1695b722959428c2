//! Authenticated HTTP client for the backend
//!
//! Every request carries the project's `apikey` header and a bearer token:
//! the session's access token when signed in, the anonymous key otherwise.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use microaudit_remote::client::RestClient;
//! use reqwest::Method;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let client = RestClient::new("https://project.example.co", "anon-key");
//! let response = client.request(Method::GET, "/rest/v1/notes").send().await?;
//! let response = RestClient::check(response).await?;
//! # Ok(())
//! # }
//! ```

use std::sync::RwLock;
use std::time::Duration;

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use crate::RemoteError;

/// Retry-after reported when a 429 response has no usable header
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(30);

/// HTTP client bound to one backend project
///
/// Shared between the store and identity adapters; the identity adapter
/// installs and clears the session token.
pub struct RestClient {
    client: Client,
    base_url: String,
    anon_key: String,
    access_token: RwLock<Option<String>>,
}

impl RestClient {
    /// Creates a client for `base_url` using the project's anonymous key
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        let base_url: String = base_url.into();
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            access_token: RwLock::new(None),
        }
    }

    /// Base URL, without trailing slash
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Installs (or clears) the session access token
    pub fn set_access_token(&self, token: Option<String>) {
        match self.access_token.write() {
            Ok(mut guard) => {
                *guard = token;
                debug!("Updated RestClient access token");
            }
            Err(_) => warn!("Access token lock poisoned, token not updated"),
        }
    }

    /// Current session access token, if any
    pub fn access_token(&self) -> Option<String> {
        self.access_token.read().ok().and_then(|t| t.clone())
    }

    /// Returns true if a session token is installed
    pub fn has_session(&self) -> bool {
        self.access_token().is_some()
    }

    /// Creates an authenticated request builder for `path`
    ///
    /// `path` is relative to the base URL, e.g. `/rest/v1/notes`.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let bearer = self.access_token().unwrap_or_else(|| self.anon_key.clone());
        self.client
            .request(method, &url)
            .header("apikey", &self.anon_key)
            .bearer_auth(bearer)
    }

    /// Maps non-success responses to a [`RemoteError`]
    ///
    /// # Errors
    /// Returns the error matching the status code, with the message the
    /// backend put in the body when there is one
    pub async fn check(response: Response) -> Result<Response, RemoteError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get("Retry-After")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_RETRY_AFTER);
        let body = response.text().await.unwrap_or_default();
        let message = error_message(&body).unwrap_or_else(|| status.to_string());

        warn!(status = status.as_u16(), message = %message, "Backend returned error status");

        Err(match status {
            StatusCode::UNAUTHORIZED => RemoteError::Unauthorized(message),
            StatusCode::FORBIDDEN => RemoteError::Forbidden(message),
            StatusCode::NOT_FOUND => RemoteError::NotFound(message),
            StatusCode::CONFLICT => RemoteError::Conflict(message),
            StatusCode::TOO_MANY_REQUESTS => RemoteError::TooManyRequests { retry_after },
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                RemoteError::BadRequest(message)
            }
            s if s.is_server_error() => RemoteError::ServerError(message),
            s => RemoteError::InvalidResponse(format!("HTTP {}: {message}", s.as_u16())),
        })
    }
}

/// Extracts the human-readable message from an error body
///
/// The data API uses `message`; the auth API uses `msg`,
/// `error_description` or `error`.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    ["message", "msg", "error_description", "error"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}
