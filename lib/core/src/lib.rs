//! Core types shared across the flowbridge crates.
//!
//! This crate provides the identifier types for automation-engine entities
//! and the rootcause-based `Result` alias used by every layer.

pub mod error;
pub mod id;

pub use error::Result;
pub use id::{ExecutionId, NodeId, ParseIdError, SessionId, WorkflowId};
