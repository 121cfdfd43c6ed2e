//! API key repository
//!
//! Typed CRUD over the `/keys` collection. Envelope shapes stay in here;
//! transport errors are forwarded unchanged.

use super::error::{ApiError, Result};
use super::http::ApiClient;
use super::models::{ApiKey, CreateKeyRequest, CreatedKey, Envelope, KeyPatch, ListFilter};
use reqwest::Method;
use std::sync::Arc;

/// Path of a single key, with the hash percent-encoded
fn key_path(id: &str) -> String {
    format!("/keys/{}", urlencoding::encode(id))
}

/// Unwrap a response that must carry a record
fn required<T>(body: Option<T>, method: Method, path: &str) -> Result<T> {
    body.ok_or_else(|| ApiError::MissingRecord {
        method,
        path: path.to_string(),
    })
}

/// Repository over the key collection of the authenticated account
#[derive(Debug, Clone)]
pub struct KeyRepository {
    client: Arc<ApiClient>,
}

impl KeyRepository {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// The key whose credential is making this call
    pub async fn get_current(&self) -> Result<ApiKey> {
        let body: Option<Envelope<ApiKey>> = self.client.get("/key").await?;
        required(body, Method::GET, "/key").map(|e| e.data)
    }

    /// Fetch one key by hash. A missing key is a remote 404.
    pub async fn get(&self, id: &str) -> Result<ApiKey> {
        let path = key_path(id);
        let body: Option<Envelope<ApiKey>> = self.client.get(&path).await?;
        required(body, Method::GET, &path).map(|e| e.data)
    }

    /// Fetch one page of keys. An empty body is an empty page.
    pub async fn list(&self, filter: &ListFilter) -> Result<Vec<ApiKey>> {
        let path = match filter.to_query_string() {
            Some(query) => format!("/keys?{}", query),
            None => "/keys".to_string(),
        };

        let body: Option<Envelope<Vec<ApiKey>>> = self.client.get(&path).await?;
        Ok(body.map(|e| e.data).unwrap_or_default())
    }

    /// Create a key. Not idempotent: each call mints a new key and secret.
    pub async fn create(&self, request: &CreateKeyRequest) -> Result<CreatedKey> {
        let body = self.client.post("/keys", request).await?;
        required(body, Method::POST, "/keys")
    }

    /// Apply a partial update
    ///
    /// Returns the updated record, or `None` when the server accepted the
    /// patch without echoing one back.
    pub async fn update(&self, id: &str, patch: &KeyPatch) -> Result<Option<ApiKey>> {
        let body: Option<Envelope<ApiKey>> = self.client.patch(&key_path(id), patch).await?;
        Ok(body.map(|e| e.data))
    }

    /// Delete a key. Deleting an unknown hash is whatever the server says,
    /// usually a 404.
    pub async fn delete(&self, id: &str) -> Result<()> {
        self.client.delete(&key_path(id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_path_encodes_hash() {
        assert_eq!(key_path("abc123"), "/keys/abc123");
        assert_eq!(key_path("a/b c"), "/keys/a%2Fb%20c");
    }
}
