//! Per-key reconciler
//!
//! Turns a (observed, desired) pair into exactly one repository call and
//! folds the answer back into observed state. A 404 on read is the only error
//! that is absorbed: it means the key is gone and is reported as drift.

use super::state::{diff, DesiredKey, ObservedKey};
use crate::api::{ApiClient, ApiKey, CreateKeyRequest, KeyRepository, ListFilter, Result};
use std::sync::Arc;

/// Result of reading a key we believe exists
#[derive(Debug, Clone, PartialEq)]
pub enum Observation {
    Present(ObservedKey),
    /// The key no longer exists remotely; local knowledge should be dropped
    Drifted { id: String },
}

/// Operations the reconciler knows how to execute
#[derive(Debug, Clone)]
pub enum KeyOperation {
    Create(DesiredKey),
    Read(ObservedKey),
    Update {
        observed: ObservedKey,
        desired: DesiredKey,
    },
    Delete(ObservedKey),
    Import(String),
    List(ListFilter),
}

impl KeyOperation {
    pub fn name(&self) -> &'static str {
        match self {
            KeyOperation::Create(_) => "create",
            KeyOperation::Read(_) => "read",
            KeyOperation::Update { .. } => "update",
            KeyOperation::Delete(_) => "delete",
            KeyOperation::Import(_) => "import",
            KeyOperation::List(_) => "list",
        }
    }
}

/// What an operation left behind
#[derive(Debug, Clone, PartialEq)]
pub enum KeyOutcome {
    Present(ObservedKey),
    Drifted { id: String },
    Absent,
    Listed(Vec<ApiKey>),
}

/// Reconciler for API key resources
#[derive(Debug, Clone)]
pub struct Reconciler {
    keys: KeyRepository,
    tolerate_missing_on_delete: bool,
}

impl Reconciler {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self::from_repository(KeyRepository::new(client))
    }

    pub fn from_repository(keys: KeyRepository) -> Self {
        Self {
            keys,
            tolerate_missing_on_delete: false,
        }
    }

    /// Treat a 404 on delete as "already absent" instead of an error
    pub fn tolerate_missing_on_delete(mut self, tolerate: bool) -> Self {
        self.tolerate_missing_on_delete = tolerate;
        self
    }

    pub fn repository(&self) -> &KeyRepository {
        &self.keys
    }

    /// Execute one operation
    pub async fn execute(&self, operation: KeyOperation) -> Result<KeyOutcome> {
        tracing::debug!("reconciler: {}", operation.name());

        match operation {
            KeyOperation::Create(desired) => self.create(&desired).await.map(KeyOutcome::Present),
            KeyOperation::Read(observed) => match self.read(&observed).await? {
                Observation::Present(next) => Ok(KeyOutcome::Present(next)),
                Observation::Drifted { id } => Ok(KeyOutcome::Drifted { id }),
            },
            KeyOperation::Update { observed, desired } => self
                .update(&observed, &desired)
                .await
                .map(KeyOutcome::Present),
            KeyOperation::Delete(observed) => {
                self.delete(&observed).await?;
                Ok(KeyOutcome::Absent)
            }
            KeyOperation::Import(id) => self.import(&id).await.map(KeyOutcome::Present),
            KeyOperation::List(filter) => self.keys.list(&filter).await.map(KeyOutcome::Listed),
        }
    }

    /// Absent -> Present
    pub async fn create(&self, desired: &DesiredKey) -> Result<ObservedKey> {
        let request = CreateKeyRequest::new(desired.name.clone())
            .limit(desired.limit)
            .limit_minutes(desired.limit_minutes);

        let created = self.keys.create(&request).await?;
        tracing::info!("Created API key {} ({})", created.record.id, created.record.name);

        Ok(ObservedKey::from_created(created))
    }

    /// Present -> Present, or Present -> Drifted on 404
    pub async fn read(&self, observed: &ObservedKey) -> Result<Observation> {
        match self.keys.get(&observed.id).await {
            Ok(record) => Ok(Observation::Present(observed.refreshed(&record))),
            Err(e) if e.is_not_found() => {
                tracing::warn!("API key {} no longer exists remotely", observed.id);
                Ok(Observation::Drifted {
                    id: observed.id.clone(),
                })
            }
            Err(e) => Err(e),
        }
    }

    /// Send only what changed. An empty diff makes no request.
    pub async fn update(&self, observed: &ObservedKey, desired: &DesiredKey) -> Result<ObservedKey> {
        let patch = diff(observed, desired);
        if patch.is_empty() {
            tracing::debug!("API key {} already up to date", observed.id);
            return Ok(observed.clone());
        }

        tracing::info!("Updating API key {}: {}", observed.id, patch.fields().join(", "));
        let record = self.keys.update(&observed.id, &patch).await?;
        if record.is_none() {
            tracing::debug!("API key {} updated without a record in the response", observed.id);
        }

        Ok(observed.updated(desired, record.as_ref()))
    }

    /// Present -> Absent
    pub async fn delete(&self, observed: &ObservedKey) -> Result<()> {
        match self.keys.delete(&observed.id).await {
            Ok(()) => {
                tracing::info!("Deleted API key {}", observed.id);
                Ok(())
            }
            Err(e) if e.is_not_found() && self.tolerate_missing_on_delete => {
                tracing::warn!("API key {} was already deleted", observed.id);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Adopt an existing key by hash. The secret cannot be recovered.
    pub async fn import(&self, id: &str) -> Result<ObservedKey> {
        let record = self.keys.get(id).await?;
        tracing::info!("Imported API key {} ({})", record.id, record.name);
        Ok(ObservedKey::from_record(&record))
    }
}
