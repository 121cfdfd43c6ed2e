//! Wire types for the `/key` and `/keys` endpoints

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An API key record as returned by get, list, and update
///
/// The secret is deliberately not a field here: it only ever appears on
/// [`CreatedKey`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiKey {
    /// Server-assigned hash, immutable
    #[serde(rename = "hash")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub is_provisioner: bool,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Spend ceiling in USD, `None` means uncapped
    #[serde(default)]
    pub limit: Option<f64>,
    #[serde(default)]
    pub limit_minutes: Option<u32>,
    #[serde(default)]
    pub usage: f64,
    #[serde(default)]
    pub disabled: bool,
}

/// `{"data": ...}` wrapper used by every success response
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: T,
}

/// Body of `POST /keys`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CreateKeyRequest {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_minutes: Option<u32>,
}

impl CreateKeyRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limit: None,
            limit_minutes: None,
        }
    }

    pub fn limit(mut self, limit: Option<f64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn limit_minutes(mut self, minutes: Option<u32>) -> Self {
        self.limit_minutes = minutes;
        self
    }
}

/// Response of `POST /keys`: the record plus its one-time secret
#[derive(Clone, Deserialize)]
pub struct CreatedKey {
    #[serde(rename = "data")]
    pub record: ApiKey,
    pub key: String,
}

impl fmt::Debug for CreatedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreatedKey")
            .field("record", &self.record)
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Body of `PATCH /keys/{hash}`
///
/// Only `Some` fields are serialized; a `None` field is left untouched on the
/// server. Clearing the spend limit is expressed as `limit: Some(0.0)`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KeyPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
    #[serde(rename = "byok", skip_serializing_if = "Option::is_none")]
    pub byok_config: Option<ByokConfig>,
}

impl KeyPatch {
    /// True when the patch would change nothing
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.limit.is_none()
            && self.disabled.is_none()
            && self.byok_config.is_none()
    }

    /// Names of the fields this patch sets, in wire order
    pub fn fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.name.is_some() {
            fields.push("name");
        }
        if self.limit.is_some() {
            fields.push("limit");
        }
        if self.disabled.is_some() {
            fields.push("disabled");
        }
        if self.byok_config.is_some() {
            fields.push("byok");
        }
        fields
    }
}

/// Bring-your-own-key provider settings attached to a key
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ByokConfig {
    pub provider: String,
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl fmt::Debug for ByokConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ByokConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Query parameters for `GET /keys`
///
/// Zero and `false` mean "not sent", letting the server apply its defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub include_disabled: bool,
    pub offset: u32,
    pub limit: u32,
}

impl ListFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include_disabled(mut self, include: bool) -> Self {
        self.include_disabled = include;
        self
    }

    pub fn offset(mut self, offset: u32) -> Self {
        self.offset = offset;
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Query pairs that will actually be sent
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.include_disabled {
            pairs.push(("include_disabled", "true".to_string()));
        }
        if self.offset > 0 {
            pairs.push(("offset", self.offset.to_string()));
        }
        if self.limit > 0 {
            pairs.push(("limit", self.limit.to_string()));
        }
        pairs
    }

    /// Encoded query string without the leading `?`, `None` when empty
    pub fn to_query_string(&self) -> Option<String> {
        let pairs = self.query_pairs();
        if pairs.is_empty() {
            return None;
        }

        let mut serializer = url::form_urlencoded::Serializer::new(String::new());
        for (name, value) in &pairs {
            serializer.append_pair(name, value);
        }
        Some(serializer.finish())
    }
}
