//! Error types for execution orchestration.
//!
//! Errors are designed for layered context using rootcause: gateway
//! reports are wrapped with an `ExecuteError` via `.context()` so the
//! upstream cause stays attached while callers match on the taxonomy.

use flowbridge_core::WorkflowId;
use std::fmt;

/// Failures of an execute or chat request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecuteError {
    /// The workflow does not exist in the engine.
    NotFound { workflow_id: WorkflowId },
    /// The request cannot be served by this workflow's triggers.
    BadRequest { reason: String },
    /// A trigger invocation was rejected upstream.
    ExecutionFailed { message: String },
    /// No chat reply arrived before the deadline.
    Timeout {
        workflow_id: WorkflowId,
        waited_ms: u64,
    },
    /// The caller went away before a reply arrived.
    Cancelled,
    /// The engine failed outside a trigger invocation.
    Upstream { message: String },
}

impl fmt::Display for ExecuteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { workflow_id } => write!(f, "workflow {workflow_id} not found"),
            Self::BadRequest { reason } => f.write_str(reason),
            Self::ExecutionFailed { message } => write!(f, "execution failed: {message}"),
            Self::Timeout {
                workflow_id,
                waited_ms,
            } => write!(
                f,
                "no reply from workflow {workflow_id} within {waited_ms}ms; \
                 the workflow probably lacks a \"Respond to Webhook\" node or a chat \
                 node that responds, so nothing is sent back synchronously"
            ),
            Self::Cancelled => write!(f, "request cancelled before a reply arrived"),
            Self::Upstream { message } => write!(f, "automation engine error: {message}"),
        }
    }
}

impl std::error::Error for ExecuteError {}

impl ExecuteError {
    /// Shorthand for [`ExecuteError::BadRequest`].
    #[must_use]
    pub fn bad_request(reason: impl Into<String>) -> Self {
        Self::BadRequest {
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_names_missing_respond_node() {
        let err = ExecuteError::Timeout {
            workflow_id: WorkflowId::new("wf1"),
            waited_ms: 1000,
        };
        let message = err.to_string();
        assert!(message.contains("Respond to Webhook"));
        assert!(message.contains("1000ms"));
    }

    #[test]
    fn execution_failed_keeps_upstream_text() {
        let err = ExecuteError::ExecutionFailed {
            message: "HTTP 500: boom".to_string(),
        };
        assert!(err.to_string().contains("boom"));
    }

    #[test]
    fn bad_request_is_verbatim() {
        let err = ExecuteError::bad_request("workflow has no webhook trigger");
        assert_eq!(err.to_string(), "workflow has no webhook trigger");
    }
}
