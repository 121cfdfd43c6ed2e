//! Desired and observed key state, and the diff between them

use crate::api::{ApiKey, CreatedKey, KeyPatch};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// What the declaration asks for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DesiredKey {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit_minutes: Option<u32>,
    #[serde(default)]
    pub disabled: bool,
}

impl DesiredKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limit: None,
            limit_minutes: None,
            disabled: false,
        }
    }

    pub fn with_limit(mut self, limit: Option<f64>) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_limit_minutes(mut self, minutes: Option<u32>) -> Self {
        self.limit_minutes = minutes;
        self
    }

    pub fn with_disabled(mut self, disabled: bool) -> Self {
        self.disabled = disabled;
        self
    }
}

/// Last known state of a managed key
///
/// `key` holds the secret captured at creation; it is `None` for imported
/// keys since the API never returns it again.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
pub struct ObservedKey {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub name: String,
    #[serde(default)]
    pub limit: Option<f64>,
    #[serde(default)]
    pub limit_minutes: Option<u32>,
    #[serde(default)]
    pub disabled: bool,
    #[serde(default)]
    pub usage: f64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl fmt::Debug for ObservedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObservedKey")
            .field("id", &self.id)
            .field("key", &self.key.as_ref().map(|_| "<redacted>"))
            .field("name", &self.name)
            .field("limit", &self.limit)
            .field("limit_minutes", &self.limit_minutes)
            .field("disabled", &self.disabled)
            .field("usage", &self.usage)
            .field("created_at", &self.created_at)
            .finish()
    }
}

impl ObservedKey {
    /// State right after a create, including the one-time secret
    pub fn from_created(created: CreatedKey) -> Self {
        let mut observed = Self::from_record(&created.record);
        observed.key = Some(created.key);
        observed
    }

    /// State of a key we did not create ourselves
    pub fn from_record(record: &ApiKey) -> Self {
        Self {
            id: record.id.clone(),
            key: None,
            name: record.name.clone(),
            limit: record.limit,
            limit_minutes: record.limit_minutes,
            disabled: record.disabled,
            usage: record.usage,
            created_at: record.created_at,
        }
    }

    /// Refresh from a fresh read. Identity and secret are kept.
    pub fn refreshed(&self, record: &ApiKey) -> Self {
        Self {
            id: self.id.clone(),
            key: self.key.clone(),
            name: record.name.clone(),
            limit: record.limit,
            limit_minutes: record.limit_minutes,
            disabled: record.disabled,
            usage: record.usage,
            created_at: record.created_at.or(self.created_at),
        }
    }

    /// State after a successful update
    ///
    /// Declared fields come from `desired`. The server's answer only
    /// contributes what it computes itself, so a cleared limit stays `None`
    /// even when the server reports it as zero. Without an answer, the
    /// server-computed fields keep their last known values.
    pub fn updated(&self, desired: &DesiredKey, record: Option<&ApiKey>) -> Self {
        Self {
            id: self.id.clone(),
            key: self.key.clone(),
            name: desired.name.clone(),
            limit: desired.limit,
            limit_minutes: record.map_or(self.limit_minutes, |r| r.limit_minutes),
            disabled: desired.disabled,
            usage: record.map_or(self.usage, |r| r.usage),
            created_at: self.created_at,
        }
    }
}

/// Patch carrying exactly the fields that differ
///
/// A limit that was set and is now declared absent is sent as zero: leaving
/// it out would keep the old cap.
pub fn diff(observed: &ObservedKey, desired: &DesiredKey) -> KeyPatch {
    let mut patch = KeyPatch::default();

    if observed.name != desired.name {
        patch.name = Some(desired.name.clone());
    }

    if observed.limit != desired.limit {
        patch.limit = Some(desired.limit.unwrap_or(0.0));
    }

    if observed.disabled != desired.disabled {
        patch.disabled = Some(desired.disabled);
    }

    patch
}

/// Action needed to move one address from observed to desired
#[derive(Debug, Clone, PartialEq)]
pub enum KeyPlan {
    NoOp,
    Create,
    Update(KeyPatch),
    Delete,
}

impl KeyPlan {
    pub fn is_noop(&self) -> bool {
        matches!(self, KeyPlan::NoOp)
    }
}

impl fmt::Display for KeyPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPlan::NoOp => write!(f, "no changes"),
            KeyPlan::Create => write!(f, "create"),
            KeyPlan::Update(patch) => write!(f, "update ({})", patch.fields().join(", ")),
            KeyPlan::Delete => write!(f, "delete"),
        }
    }
}

/// Decide what to do for one address
///
/// Existing keys are only ever patched. `limit_minutes` is accepted at
/// creation only, so a declared value that differs from the server's is
/// never acted on; see [`limit_minutes_drift`].
pub fn plan(observed: Option<&ObservedKey>, desired: Option<&DesiredKey>) -> KeyPlan {
    match (observed, desired) {
        (None, None) => KeyPlan::NoOp,
        (None, Some(_)) => KeyPlan::Create,
        (Some(_), None) => KeyPlan::Delete,
        (Some(observed), Some(desired)) => {
            let patch = diff(observed, desired);
            if patch.is_empty() {
                KeyPlan::NoOp
            } else {
                KeyPlan::Update(patch)
            }
        }
    }
}

/// Declared `limit_minutes` that the server does not have and that apply
/// cannot change, as `(declared, remote)`
pub fn limit_minutes_drift(observed: &ObservedKey, desired: &DesiredKey) -> Option<(u32, Option<u32>)> {
    match desired.limit_minutes {
        Some(declared) if observed.limit_minutes != Some(declared) => Some((declared, observed.limit_minutes)),
        _ => None,
    }
}
