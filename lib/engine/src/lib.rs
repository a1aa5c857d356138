//! Gateway to the automation engine.
//!
//! This is the only flowbridge crate that talks to the engine over the
//! network. Every operation is a single request: there is no retry or
//! backoff here, and fallback sequencing belongs to the callers.
//!
//! The [`AutomationEngine`] trait is the seam the orchestration layer
//! depends on; [`HttpEngine`] implements it over the engine's REST API.

mod client;
mod config;
mod error;
mod http;

pub use client::{
    AutomationEngine, ExecutionResult, LiveMonitoring, WebhookBases, WebhookResponse,
};
pub use config::EngineConfig;
pub use error::GatewayError;
pub use http::HttpEngine;
