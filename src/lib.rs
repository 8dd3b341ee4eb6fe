//! Completion ledger and provider normalization core for an LLM gateway.
//!
//! Every upstream call the gateway makes is recorded exactly once through
//! [`services::CompletionRecorder`], attributed to the API key that made it,
//! with an optional diagnostic log entry tied to the recorded completion.

pub mod config;
pub mod db;
pub mod models;
pub mod observability;
pub mod providers;
pub mod services;
