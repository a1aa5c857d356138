//! Gateway error types.

use flowbridge_core::WorkflowId;
use std::fmt;

/// Errors from automation engine calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    /// The engine has no such resource.
    NotFound {
        /// What was looked up (e.g. "workflow 12").
        resource: String,
    },
    /// The request never produced a response.
    RequestFailed {
        /// Target URL.
        url: String,
        /// Transport error details.
        reason: String,
    },
    /// The engine answered with a non-success status.
    UpstreamStatus {
        /// Target URL.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },
    /// The response body could not be decoded.
    InvalidResponse {
        /// Target URL.
        url: String,
        /// Decoding error details.
        reason: String,
    },
    /// The workflow has no webhook trigger to call.
    MissingWebhook {
        /// The workflow that was invoked.
        workflow_id: WorkflowId,
    },
    /// The gateway configuration is unusable.
    InvalidConfig {
        /// Error details.
        reason: String,
    },
}

impl fmt::Display for GatewayError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound { resource } => write!(f, "{resource} not found"),
            Self::RequestFailed { url, reason } => {
                write!(f, "request to '{url}' failed: {reason}")
            }
            Self::UpstreamStatus { url, status, body } => {
                if body.is_empty() {
                    write!(f, "HTTP {status} from '{url}'")
                } else {
                    write!(f, "HTTP {status} from '{url}': {body}")
                }
            }
            Self::InvalidResponse { url, reason } => {
                write!(f, "invalid response from '{url}': {reason}")
            }
            Self::MissingWebhook { workflow_id } => {
                write!(f, "workflow {workflow_id} has no webhook trigger with an address to call")
            }
            Self::InvalidConfig { reason } => {
                write!(f, "invalid engine configuration: {reason}")
            }
        }
    }
}

impl std::error::Error for GatewayError {}

impl GatewayError {
    /// Returns true for responses that say the target does not exist.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::NotFound { .. } | Self::UpstreamStatus { status: 404, .. }
        )
    }
}
