//! flowbridge HTTP server.
//!
//! This crate exposes workflow execution, chat, and execution read paths
//! of an automation engine over HTTP.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;

pub use config::{ChatSettings, ServerConfig};
pub use error::ApiError;
pub use routes::router;
pub use state::AppState;
