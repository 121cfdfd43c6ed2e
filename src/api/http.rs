//! HTTP transport for the OpenRouter provisioning API
//!
//! One call is one authenticated request/response exchange. There are no
//! retries: a failed attempt is returned to the caller as-is.

use super::error::{ApiError, Result, TransportCause};
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::time::Duration;
use tokio::sync::watch;

/// Production endpoint
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Applied to the whole exchange, connect through body read
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum length of response body to log (to avoid logging sensitive data)
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Sanitize response body for logging
/// Truncates long responses and drops non-printable characters
fn sanitize_for_log(body: &str) -> String {
    let truncated = if body.chars().count() > MAX_LOG_BODY_LENGTH {
        let head: String = body.chars().take(MAX_LOG_BODY_LENGTH).collect();
        format!("{}... [truncated, {} bytes total]", head, body.len())
    } else {
        body.to_string()
    };

    truncated.replace(|c: char| !c.is_ascii_graphic() && c != ' ', "")
}

/// Error envelope returned by the API on status >= 400
///
/// `error` is usually a string but some gateways send `{"code", "message"}`.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<Value>,
}

/// Pick the human-readable message out of an error response body
///
/// Prefers `message`, then `error` (string or nested `message`), and falls
/// back to the raw body when the envelope is unparsable or empty.
pub(crate) fn extract_error_message(body: &str) -> String {
    let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
        return body.to_string();
    };

    let nested = match &envelope.error {
        Some(Value::String(s)) => Some(s.clone()),
        Some(Value::Object(map)) => map
            .get("message")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string()),
        _ => None,
    };

    envelope
        .message
        .filter(|m| !m.is_empty())
        .or(nested.filter(|m| !m.is_empty()))
        .unwrap_or_else(|| body.to_string())
}

/// Settings the client is built from. Immutable once the client exists.
#[derive(Clone)]
pub struct ClientConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl ClientConfig {
    /// Config for the production endpoint with the default timeout
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Override the endpoint. Empty overrides are ignored.
    pub fn with_base_url(mut self, base_url: Option<&str>) -> Self {
        if let Some(url) = base_url.filter(|u| !u.trim().is_empty()) {
            self.base_url = url.trim().to_string();
        }
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl fmt::Debug for ClientConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientConfig")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Sender half of a cancellation pair
#[derive(Debug)]
pub struct CancelHandle(watch::Sender<bool>);

impl CancelHandle {
    /// Abort every in-flight exchange bound to the paired signal
    pub fn cancel(&self) {
        let _ = self.0.send(true);
    }
}

/// Receiver half of a cancellation pair, bound to a client with
/// [`ApiClient::with_cancel`]
#[derive(Debug, Clone)]
pub struct CancelSignal(watch::Receiver<bool>);

impl CancelSignal {
    pub fn is_cancelled(&self) -> bool {
        *self.0.borrow()
    }

    /// Resolves once cancelled. Never resolves if the handle is dropped first.
    async fn cancelled(&mut self) {
        if self.0.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

/// Create a linked cancel handle and signal
pub fn cancel_pair() -> (CancelHandle, CancelSignal) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle(tx), CancelSignal(rx))
}

/// Authenticated JSON client
///
/// Cloning is cheap and shares the connection pool.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: String,
    cancel: Option<CancelSignal>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

impl ApiClient {
    /// Create a new client
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.api_key.trim().is_empty() {
            return Err(ApiError::InvalidConfig("API key must not be empty".to_string()));
        }

        url::Url::parse(&config.base_url).map_err(|e| {
            ApiError::InvalidConfig(format!("invalid base URL '{}': {}", config.base_url, e))
        })?;

        let client = Client::builder()
            .user_agent(concat!("orkeys/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()
            .map_err(|e| ApiError::InvalidConfig(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key,
            cancel: None,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// A handle on the same connection pool whose exchanges abort when
    /// `signal` fires
    pub fn with_cancel(&self, signal: CancelSignal) -> Self {
        Self {
            cancel: Some(signal),
            ..self.clone()
        }
    }

    /// Make a GET request and decode the JSON response
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        self.request(Method::GET, path, None::<&()>).await
    }

    /// Make a POST request with a JSON body and decode the JSON response
    pub async fn post<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Make a PATCH request with a JSON body and decode the JSON response
    pub async fn patch<B, T>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.request(Method::PATCH, path, Some(body)).await
    }

    /// Make a DELETE request, ignoring any response body
    pub async fn delete(&self, path: &str) -> Result<()> {
        self.exchange(Method::DELETE, path, None::<&()>).await?;
        Ok(())
    }

    /// Send a request and decode the response into `T`
    ///
    /// A successful response with an empty body is `Ok(None)`; only a
    /// non-empty body is decoded.
    pub async fn request<B, T>(&self, method: Method, path: &str, body: Option<&B>) -> Result<Option<T>>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let text = self.exchange(method.clone(), path, body).await?;
        if text.is_empty() {
            tracing::debug!("{} {}: empty response body", method, path);
            return Ok(None);
        }

        serde_json::from_str(&text).map(Some).map_err(|source| ApiError::Decoding {
            method,
            path: path.to_string(),
            source,
        })
    }

    /// Run one exchange and return the raw body of a successful response
    async fn exchange<B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<String>
    where
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);

        let mut request = self
            .client
            .request(method.clone(), &url)
            .bearer_auth(&self.api_key)
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(body) = body {
            let bytes = serde_json::to_vec(body).map_err(|source| ApiError::Encoding {
                method: method.clone(),
                path: path.to_string(),
                source,
            })?;
            request = request.body(bytes);
        }

        let send = async {
            let response = request.send().await?;
            let status = response.status();
            let text = response.text().await?;
            Ok::<_, reqwest::Error>((status, text))
        };

        let outcome = match self.cancel.clone() {
            Some(mut signal) => {
                tokio::select! {
                    biased;
                    _ = signal.cancelled() => Err(TransportCause::Cancelled),
                    res = send => res.map_err(TransportCause::from),
                }
            }
            None => send.await.map_err(TransportCause::from),
        };

        let (status, text) = outcome.map_err(|source| {
            tracing::debug!("{} {} failed: {}", method, url, source);
            ApiError::Transport {
                method: method.clone(),
                path: path.to_string(),
                source,
            }
        })?;

        if status.as_u16() >= 400 {
            // Security: Only log sanitized/truncated error body to avoid leaking sensitive data
            tracing::error!("API error: {} - {}", status, sanitize_for_log(&text));
            return Err(ApiError::Remote {
                method,
                path: path.to_string(),
                status: status.as_u16(),
                message: extract_error_message(&text),
            });
        }

        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_error_message_prefers_message() {
        let body = r#"{"message": "Key not found", "error": "not_found"}"#;
        assert_eq!(extract_error_message(body), "Key not found");
    }

    #[test]
    fn test_extract_error_message_falls_back_to_error_field() {
        assert_eq!(extract_error_message(r#"{"error": "forbidden"}"#), "forbidden");
        assert_eq!(
            extract_error_message(r#"{"error": {"code": 401, "message": "No auth credentials found"}}"#),
            "No auth credentials found"
        );
    }

    #[test]
    fn test_extract_error_message_uses_raw_body() {
        assert_eq!(extract_error_message("<html>Bad Gateway</html>"), "<html>Bad Gateway</html>");
        assert_eq!(extract_error_message(r#"{"message": ""}"#), r#"{"message": ""}"#);
        assert_eq!(extract_error_message(""), "");
    }

    #[test]
    fn test_sanitize_for_log_truncates() {
        let long = "x".repeat(500);
        let sanitized = sanitize_for_log(&long);
        assert!(sanitized.starts_with(&"x".repeat(MAX_LOG_BODY_LENGTH)));
        assert!(sanitized.ends_with("[truncated, 500 bytes total]"));

        assert_eq!(sanitize_for_log("line\none"), "lineone");
    }

    #[test]
    fn test_new_rejects_empty_key() {
        let err = ApiClient::new(ClientConfig::new("  ")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidConfig(_)));
    }

    #[test]
    fn test_new_rejects_bad_base_url() {
        let config = ClientConfig::new("sk-test").with_base_url(Some("not a url"));
        let err = ApiClient::new(config).unwrap_err();
        assert!(err.to_string().contains("invalid base URL"));
    }

    #[test]
    fn test_base_url_override_and_trailing_slash() {
        let config = ClientConfig::new("sk-test").with_base_url(Some("http://localhost:8080/api/v1/"));
        let client = ApiClient::new(config).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8080/api/v1");

        let config = ClientConfig::new("sk-test").with_base_url(Some(""));
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = ClientConfig::new("sk-secret-value");
        assert!(!format!("{:?}", config).contains("sk-secret-value"));

        let client = ApiClient::new(config).unwrap();
        assert!(!format!("{:?}", client).contains("sk-secret-value"));
    }

    #[tokio::test]
    async fn test_unserializable_body_is_encoding_error() {
        let config = ClientConfig::new("sk-test").with_base_url(Some("http://127.0.0.1:1"));
        let client = ApiClient::new(config).unwrap();
        let body = std::collections::BTreeMap::from([((1u8, 2u8), 3u8)]);

        let err = client.post::<_, Value>("/keys", &body).await.unwrap_err();
        assert!(matches!(err, ApiError::Encoding { ref path, .. } if path == "/keys"));
    }

    #[test]
    fn test_cancel_pair() {
        let (handle, signal) = cancel_pair();
        assert!(!signal.is_cancelled());
        handle.cancel();
        assert!(signal.is_cancelled());
    }
}
