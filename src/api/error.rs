//! API error taxonomy
//!
//! Every failure of a single request/response exchange is classified into one
//! of the variants below. Each variant carries the HTTP method and the request
//! path (which includes the key hash for per-key operations) so callers can
//! render an actionable message without extra bookkeeping.

use reqwest::Method;
use thiserror::Error;

/// Errors produced by the transport client and forwarded unchanged by the
/// repository layer
#[derive(Debug, Error)]
pub enum ApiError {
    /// Client construction was given unusable settings
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),

    /// The request body could not be serialized
    #[error("{method} {path}: failed to encode request body: {source}")]
    Encoding {
        method: Method,
        path: String,
        source: serde_json::Error,
    },

    /// Connection, TLS, timeout, cancellation, or body read failure
    #[error("{method} {path}: request failed: {source}")]
    Transport {
        method: Method,
        path: String,
        source: TransportCause,
    },

    /// The response body was not the JSON shape we asked for
    #[error("{method} {path}: failed to decode response: {source}")]
    Decoding {
        method: Method,
        path: String,
        source: serde_json::Error,
    },

    /// A successful response had no body where a key record is required
    #[error("{method} {path}: response carried no key record")]
    MissingRecord { method: Method, path: String },

    /// The server answered with a status >= 400
    #[error("{method} {path}: API error (status {status}): {message}")]
    Remote {
        method: Method,
        path: String,
        status: u16,
        message: String,
    },
}

/// Underlying cause of a [`ApiError::Transport`]
#[derive(Debug, Error)]
pub enum TransportCause {
    #[error(transparent)]
    Http(#[from] reqwest::Error),

    #[error("request cancelled by caller")]
    Cancelled,
}

impl ApiError {
    /// HTTP status of a remote rejection, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Remote { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// True for a remote 404
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }

    /// True when the caller cancelled the exchange
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            ApiError::Transport {
                source: TransportCause::Cancelled,
                ..
            }
        )
    }

    /// Short remediation hint for well-known statuses
    pub fn hint(&self) -> Option<&'static str> {
        match self.status()? {
            401 => Some("check the OPENROUTER_API_KEY credential"),
            403 => Some("the credential must be a provisioning key"),
            404 => Some("the key does not exist or was deleted"),
            429 => Some("rate limit exceeded, try again later"),
            s if s >= 500 => Some("OpenRouter is temporarily unavailable"),
            _ => None,
        }
    }

    /// True when the exchange hit the client timeout
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            ApiError::Transport {
                source: TransportCause::Http(e),
                ..
            } if e.is_timeout()
        )
    }
}

/// Result type for API operations
pub type Result<T> = std::result::Result<T, ApiError>;
