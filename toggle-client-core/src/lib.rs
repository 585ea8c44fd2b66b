//! Client-side feature toggle evaluation engine.
//!
//! Polls a definition source in the background, caches the current toggle
//! set lock-free, evaluates named features against a runtime [`Context`] and
//! aggregates usage counts for periodic reporting.

pub mod client;
pub mod config;
pub mod feature;
pub mod metrics;
pub mod model;
pub mod refresh;
pub mod source;
pub mod strategy;

pub use client::ToggleClient;
pub use config::{ClientConfig, SourceSpec};
pub use model::Context;
