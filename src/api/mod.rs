//! OpenRouter API interaction module
//!
//! # Module Structure
//!
//! - [`error`] - Error taxonomy for a single request/response exchange
//! - [`http`] - Authenticated JSON transport with timeout and cancellation
//! - [`models`] - Wire types for API key records, create/update bodies, list filters
//! - [`keys`] - Typed repository over the `/keys` collection
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use orkeys::api::{ApiClient, ClientConfig, KeyRepository};
//!
//! async fn example() -> orkeys::api::Result<()> {
//!     let client = ApiClient::new(ClientConfig::new("sk-or-v1-..."))?;
//!     let keys = KeyRepository::new(Arc::new(client));
//!     let me = keys.get_current().await?;
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod http;
pub mod keys;
pub mod models;

pub use error::{ApiError, Result, TransportCause};
pub use http::{cancel_pair, ApiClient, CancelHandle, CancelSignal, ClientConfig};
pub use keys::KeyRepository;
pub use models::{ApiKey, ByokConfig, CreateKeyRequest, CreatedKey, KeyPatch, ListFilter};
