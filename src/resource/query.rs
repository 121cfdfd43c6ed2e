//! Collection Query
//!
//! Read-only lookups over the key collection: one page of keys, one key by
//! hash, or the key behind the configured credential. Pages are returned
//! as the server sent them; walking several pages is up to the caller.

use crate::api::{ApiClient, ApiKey, KeyRepository, ListFilter, Result};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct KeyQuery {
    keys: KeyRepository,
}

impl KeyQuery {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self {
            keys: KeyRepository::new(client),
        }
    }

    pub fn from_repository(keys: KeyRepository) -> Self {
        Self { keys }
    }

    /// Fetch one page of keys
    pub async fn page(&self, filter: &ListFilter) -> Result<Vec<ApiKey>> {
        tracing::debug!(
            "list keys: include_disabled={}, offset={}, limit={}",
            filter.include_disabled,
            filter.offset,
            filter.limit
        );

        let items = self.keys.list(filter).await?;
        tracing::debug!("list keys: {} returned", items.len());
        Ok(items)
    }

    /// Look up one key. Unlike a reconciler read, a 404 here is an error.
    pub async fn describe(&self, id: &str) -> Result<ApiKey> {
        self.keys.get(id).await
    }

    /// The key authenticating this client
    pub async fn current(&self) -> Result<ApiKey> {
        self.keys.get_current().await
    }
}
