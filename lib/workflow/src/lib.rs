//! Workflow model and trigger analysis for flowbridge.
//!
//! This crate is pure: it never touches the network. It provides:
//!
//! - **Definition**: The automation engine's workflow and node shapes
//! - **Triggers**: Classification of nodes into a closed trigger taxonomy
//! - **Analysis**: Per-workflow trigger summaries
//! - **Resolution**: Picking the one trigger an invocation should use
//! - **Execution**: Execution records and their per-node output data

pub mod analysis;
pub mod definition;
pub mod execution;
pub mod resolve;
pub mod trigger;

pub use analysis::{AnalyzedWorkflow, analyze, analyze_with};
pub use definition::{Node, Workflow};
pub use execution::{ExecutionRecord, ExecutionStatus, NodeOutput};
pub use resolve::{CHAT_TEXT_FIELDS, ResolvedTrigger, TriggerRequest, chat_text, resolve};
pub use trigger::{
    DEFAULT_PROMPT_FIELD, TriggerAccess, TriggerClassifier, TriggerInfo, TriggerKind, TriggerRule,
    TypeMatcher,
};
