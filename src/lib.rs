//! PortFlow maritime-tracking backend.
//!
//! Core of the system is the notification engine: it watches ship and
//! weather state, derives user-facing notifications under deduplication
//! and severity rules, and exposes the read-side operations. Around it sit
//! the provider adapters, the weather/position sync sweeps, messaging,
//! and the point-scoring side effect with its ledger relay.

pub mod config;
pub mod database;
pub mod engine;
pub mod errors;
pub mod messages;
pub mod models;
pub mod providers;
pub mod relay;
pub mod rules;
pub mod scoring;
pub mod sync;
