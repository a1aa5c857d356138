//! Workflow execution orchestration for flowbridge.
//!
//! This crate coordinates the engine gateway with trigger analysis:
//!
//! - **Orchestrator**: Resolves the trigger for an execute request,
//!   invokes it, and falls back from webhook to manual on failure
//! - **Chat**: Sends a message to a chat trigger and waits for a textual
//!   reply by polling the engine's execution log under a deadline
//! - **Reply extraction**: Pluggable strategy for finding reply text in
//!   arbitrary node output

pub mod chat;
pub mod error;
pub mod orchestrator;
pub mod reply;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{CallerIdentity, ChatConfig, ChatMessage, ChatRelay, ChatReply, Correlation, ReplySource};
pub use error::ExecuteError;
pub use orchestrator::{ExecuteOutcome, ExecuteRequest, ExecutionMode, ExecutionOrchestrator};
pub use reply::{FieldReplyExtractor, ReplyExtractor};
