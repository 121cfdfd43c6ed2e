//! Plan/apply driver
//!
//! Walks every address in the declaration and the state file, refreshes what
//! state knows about, and turns the result into one reconciler call per
//! address. Addresses are processed one at a time in sorted order.

use crate::manifest::{Declaration, StateFile};
use crate::resource::{limit_minutes_drift, plan, KeyPlan, Observation, ObservedKey, Reconciler};
use anyhow::{anyhow, Context, Result};
use std::collections::BTreeSet;

/// Planned action for one address
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedChange {
    pub address: String,
    pub plan: KeyPlan,
    /// Declared difference apply will not act on
    pub note: Option<String>,
}

/// What an apply did
#[derive(Debug, Default)]
pub struct ApplyReport {
    /// Newly minted keys; these carry the one-time secret
    pub created: Vec<(String, ObservedKey)>,
    pub updated: Vec<String>,
    pub deleted: Vec<String>,
}

impl ApplyReport {
    pub fn is_empty(&self) -> bool {
        self.created.is_empty() && self.updated.is_empty() && self.deleted.is_empty()
    }
}

/// Drives refresh, plan, and apply for a whole declaration through one reconciler
pub struct App {
    reconciler: Reconciler,
}

impl App {
    pub fn new(reconciler: Reconciler) -> Self {
        Self { reconciler }
    }

    /// Re-read every key in state
    ///
    /// Keys that no longer exist are dropped from state and their addresses
    /// returned; the next plan will recreate them.
    pub async fn refresh(&self, state: &mut StateFile) -> Result<Vec<String>> {
        let mut drifted = Vec::new();
        let addresses: Vec<String> = state.keys.keys().cloned().collect();

        for address in addresses {
            let Some(observed) = state.keys.get(&address) else {
                continue;
            };

            let observation = self
                .reconciler
                .read(observed)
                .await
                .with_context(|| format!("Unable to read API key '{}'", address))?;

            match observation {
                Observation::Present(next) => {
                    state.keys.insert(address, next);
                }
                Observation::Drifted { id } => {
                    tracing::warn!("{}: key {} was deleted outside orkeys", address, id);
                    state.keys.remove(&address);
                    drifted.push(address);
                }
            }
        }

        Ok(drifted)
    }

    /// Compute the change for every address, including no-ops
    pub fn plan(declaration: &Declaration, state: &StateFile) -> Vec<PlannedChange> {
        let addresses: BTreeSet<&String> = declaration.keys.keys().chain(state.keys.keys()).collect();

        addresses
            .into_iter()
            .map(|address| {
                let observed = state.keys.get(address);
                let desired = declaration.keys.get(address);

                let note = match (observed, desired) {
                    (Some(o), Some(d)) => limit_minutes_drift(o, d).map(|(declared, remote)| {
                        let remote = remote.map_or_else(|| "none".to_string(), |m| m.to_string());
                        tracing::warn!("{}: limit_minutes {} declared, key has {}", address, declared, remote);
                        format!("limit_minutes is {} remotely, declared {} is ignored", remote, declared)
                    }),
                    _ => None,
                };

                PlannedChange {
                    address: address.clone(),
                    plan: plan(observed, desired),
                    note,
                }
            })
            .collect()
    }

    /// Execute planned changes, updating `state` after each one
    ///
    /// On error, `state` reflects every change that completed before it, so
    /// the caller should persist it either way.
    pub async fn apply(
        &self,
        declaration: &Declaration,
        state: &mut StateFile,
        changes: &[PlannedChange],
    ) -> Result<ApplyReport> {
        let mut report = ApplyReport::default();

        for change in changes {
            let address = &change.address;
            match &change.plan {
                KeyPlan::NoOp => {}
                KeyPlan::Create => {
                    let created = self.create(declaration, address).await?;
                    state.keys.insert(address.clone(), created.clone());
                    report.created.push((address.clone(), created));
                }
                KeyPlan::Update(_) => {
                    let (observed, desired) = match (state.keys.get(address), declaration.keys.get(address)) {
                        (Some(o), Some(d)) => (o, d),
                        _ => return Err(anyhow!("{}: plan is stale, run plan again", address)),
                    };
                    let next = self
                        .reconciler
                        .update(observed, desired)
                        .await
                        .with_context(|| format!("Unable to update API key '{}'", address))?;
                    state.keys.insert(address.clone(), next);
                    report.updated.push(address.clone());
                }
                KeyPlan::Delete => {
                    self.delete(state, address).await?;
                    report.deleted.push(address.clone());
                }
            }
        }

        Ok(report)
    }

    async fn create(&self, declaration: &Declaration, address: &str) -> Result<ObservedKey> {
        let desired = declaration
            .keys
            .get(address)
            .ok_or_else(|| anyhow!("{}: not declared", address))?;

        self.reconciler
            .create(desired)
            .await
            .with_context(|| format!("Unable to create API key '{}'", address))
    }

    async fn delete(&self, state: &mut StateFile, address: &str) -> Result<()> {
        let observed = state
            .keys
            .get(address)
            .ok_or_else(|| anyhow!("{}: not in state", address))?;

        self.reconciler
            .delete(observed)
            .await
            .with_context(|| format!("Unable to delete API key '{}'", address))?;

        state.keys.remove(address);
        Ok(())
    }

    /// Adopt an existing key into state under `address`
    pub async fn import(&self, state: &mut StateFile, address: &str, id: &str) -> Result<ObservedKey> {
        if state.keys.contains_key(address) {
            return Err(anyhow!("{}: already managed, remove it from state first", address));
        }

        let observed = self
            .reconciler
            .import(id)
            .await
            .with_context(|| format!("Unable to import API key '{}'", id))?;

        state.keys.insert(address.to_string(), observed.clone());
        Ok(observed)
    }
}
