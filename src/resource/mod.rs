//! Resource abstraction layer
//!
//! Declarative management of API keys on top of the [`crate::api`] repository.
//!
//! # Architecture
//!
//! - [`state`] - Desired/observed key state, the field diff, and per-address plans
//! - [`reconciler`] - Executes create/read/update/delete/import against the API
//! - [`query`] - Read-only page, describe, and current-key lookups
//!
//! # Example
//!
//! ```ignore
//! use orkeys::resource::{DesiredKey, Observation, Reconciler};
//!
//! async fn sync(reconciler: &Reconciler) -> orkeys::api::Result<()> {
//!     let desired = DesiredKey::new("ci").with_limit(Some(5.0));
//!     let observed = reconciler.create(&desired).await?;
//!     if let Observation::Drifted { id } = reconciler.read(&observed).await? {
//!         tracing::warn!("{} disappeared", id);
//!     }
//!     Ok(())
//! }
//! ```

pub mod query;
pub mod reconciler;
pub mod state;

pub use query::KeyQuery;
pub use reconciler::{KeyOperation, KeyOutcome, Observation, Reconciler};
pub use state::{diff, limit_minutes_drift, plan, DesiredKey, KeyPlan, ObservedKey};
