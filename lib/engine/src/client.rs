//! The automation engine abstraction and its result types.

use crate::error::GatewayError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use flowbridge_core::{ExecutionId, NodeId, WorkflowId};
use flowbridge_workflow::{ExecutionRecord, ExecutionStatus, TriggerKind, Workflow, analyze};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};

/// Live and test webhook roots.
///
/// Active workflows receive calls on the live root; inactive ones only
/// listen on the test root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookBases {
    /// Root for active workflows.
    pub live: String,
    /// Root for inactive workflows.
    pub test: String,
}

impl WebhookBases {
    /// Creates webhook roots, trimming trailing slashes.
    #[must_use]
    pub fn new(live: impl Into<String>, test: impl Into<String>) -> Self {
        Self {
            live: live.into().trim_end_matches('/').to_string(),
            test: test.into().trim_end_matches('/').to_string(),
        }
    }

    /// Returns `(primary, secondary)` roots for a workflow's active state.
    #[must_use]
    pub fn ordered_for(&self, active: bool) -> [&str; 2] {
        if active {
            [self.live.as_str(), self.test.as_str()]
        } else {
            [self.test.as_str(), self.live.as_str()]
        }
    }

    /// Joins a root and a webhook path.
    #[must_use]
    pub fn url(base: &str, path: &str) -> String {
        format!(
            "{}/{}",
            base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

/// Raw outcome of a webhook POST, whatever the status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body, verbatim.
    pub body: String,
}

impl WebhookResponse {
    /// Creates a response.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Returns true for 2xx statuses.
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Returns true for 404.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Parses the body as JSON, wrapping non-JSON text as `{ "raw": ... }`.
    #[must_use]
    pub fn json(&self) -> JsonValue {
        if self.body.trim().is_empty() {
            return JsonValue::Null;
        }
        serde_json::from_str(&self.body).unwrap_or_else(|_| json!({ "raw": self.body }))
    }
}

/// Successful outcome of a trigger invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    /// The trigger class that ran.
    pub trigger: TriggerKind,
    /// Execution started by the call, when the engine reports it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    /// Upstream response body.
    pub data: JsonValue,
}

/// Best-effort snapshot of a workflow's most recent run, for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveMonitoring {
    /// The monitored workflow.
    pub workflow_id: WorkflowId,
    /// False when the engine could not be asked.
    pub available: bool,
    /// Whether the latest run is still in progress.
    pub running: bool,
    /// The latest run.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    /// The latest run's status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ExecutionStatus>,
    /// When the latest run started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
}

impl LiveMonitoring {
    /// Snapshot for when the engine could not be reached.
    #[must_use]
    pub fn unavailable(workflow_id: WorkflowId) -> Self {
        Self {
            workflow_id,
            available: false,
            running: false,
            execution_id: None,
            status: None,
            started_at: None,
        }
    }

    /// Snapshot from the most recent execution, if any.
    #[must_use]
    pub fn from_latest(workflow_id: WorkflowId, latest: Option<&ExecutionRecord>) -> Self {
        Self {
            workflow_id,
            available: true,
            running: latest.is_some_and(ExecutionRecord::is_running),
            execution_id: latest.map(|e| e.id.clone()),
            status: latest.map(|e| e.status),
            started_at: latest.and_then(|e| e.started_at),
        }
    }
}

/// Operations against the automation engine.
///
/// Each call is independent and never retried by the implementation.
#[async_trait]
pub trait AutomationEngine: Send + Sync {
    /// Fetches a workflow definition.
    async fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow, Report<GatewayError>>;

    /// Lists a workflow's executions, most recent first.
    async fn get_executions(
        &self,
        workflow_id: &WorkflowId,
        limit: u32,
    ) -> Result<Vec<ExecutionRecord>, Report<GatewayError>>;

    /// Fetches one execution including its run data.
    async fn get_execution(&self, id: &ExecutionId)
    -> Result<ExecutionRecord, Report<GatewayError>>;

    /// Starts a workflow through the engine's manual-run path.
    async fn run_manual(
        &self,
        workflow_id: &WorkflowId,
        payload: &JsonValue,
    ) -> Result<ExecutionResult, Report<GatewayError>>;

    /// POSTs a JSON payload to a webhook URL and returns the raw response.
    ///
    /// Only transport failures are errors; status interpretation is left to
    /// the caller.
    async fn post_webhook(
        &self,
        url: &str,
        payload: &JsonValue,
    ) -> Result<WebhookResponse, Report<GatewayError>>;

    /// The live and test webhook roots.
    fn webhook_bases(&self) -> &WebhookBases;

    /// Invokes a workflow's webhook trigger.
    ///
    /// The webhook is the trigger on `trigger_node_id` when given, otherwise
    /// the first webhook trigger. Active workflows are called on the live
    /// root, inactive ones on the test root.
    async fn run_webhook(
        &self,
        workflow: &Workflow,
        payload: &JsonValue,
        trigger_node_id: Option<&NodeId>,
    ) -> Result<ExecutionResult, Report<GatewayError>> {
        let analyzed = analyze(workflow);
        let path = analyzed
            .find(TriggerKind::Webhook, trigger_node_id)
            .and_then(|t| t.webhook_path())
            .ok_or_else(|| GatewayError::MissingWebhook {
                workflow_id: workflow.id.clone(),
            })?;

        let [base, _] = self.webhook_bases().ordered_for(workflow.active);
        let url = WebhookBases::url(base, path);

        tracing::debug!(workflow_id = %workflow.id, url = %url, "invoking webhook trigger");

        let response = self.post_webhook(&url, payload).await?;
        if !response.is_success() {
            tracing::warn!(
                workflow_id = %workflow.id,
                url = %url,
                status = response.status,
                "webhook trigger returned error"
            );
            return Err(GatewayError::UpstreamStatus {
                url,
                status: response.status,
                body: response.body,
            }
            .into());
        }

        let data = response.json();
        Ok(ExecutionResult {
            trigger: TriggerKind::Webhook,
            execution_id: execution_id_in(&data),
            data,
        })
    }

    /// Reports the latest run of a workflow. Never fails.
    async fn get_live_monitoring(&self, workflow_id: &WorkflowId) -> LiveMonitoring {
        match self.get_executions(workflow_id, 1).await {
            Ok(executions) => LiveMonitoring::from_latest(workflow_id.clone(), executions.first()),
            Err(report) => {
                tracing::debug!(
                    workflow_id = %workflow_id,
                    error = %report,
                    "live monitoring unavailable"
                );
                LiveMonitoring::unavailable(workflow_id.clone())
            }
        }
    }
}

/// Finds an execution ID in an engine response body.
pub(crate) fn execution_id_in(data: &JsonValue) -> Option<ExecutionId> {
    let candidates = [
        data.get("executionId"),
        data.get("data").and_then(|d| d.get("executionId")),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(|v| serde_json::from_value::<ExecutionId>(v.clone()).ok())
}
