//! Declarative management of OpenRouter API keys
//!
//! - [`api`] - Authenticated transport and the typed key repository
//! - [`resource`] - Diffing, planning, and the per-key reconciler
//! - [`manifest`] - YAML declarations and the JSON state file
//! - [`app`] - Plan/apply driver over a whole declaration
//! - [`config`] - Persistent settings and client configuration resolution

pub mod api;
pub mod app;
pub mod config;
pub mod manifest;
pub mod resource;
