//! Execute-request orchestration.
//!
//! An execute request names a mode (`manual`, `webhook` or `test`) and a
//! payload. Manual and webhook modes invoke exactly that trigger. Test
//! mode, the default, lets the trigger resolver pick: a chat message goes
//! through the [`ChatRelay`], a webhook call falls back to a manual run if
//! it fails, and a manual run is made directly.

use crate::chat::{CallerIdentity, ChatMessage, ChatRelay, ChatReply};
use crate::error::ExecuteError;
use flowbridge_core::{ExecutionId, NodeId, Result, SessionId, WorkflowId};
use flowbridge_engine::{AutomationEngine, ExecutionResult, GatewayError};
use flowbridge_workflow::{
    AnalyzedWorkflow, TriggerInfo, TriggerKind, TriggerRequest, Workflow, analyze, chat_text,
    resolve,
};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

/// How an execute request wants the workflow started.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Manual-run path only.
    Manual,
    /// Webhook trigger only.
    Webhook,
    /// Let the trigger resolver decide.
    #[default]
    Test,
}

/// An execute request as received from a caller.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteRequest {
    #[serde(default, rename = "type")]
    pub mode: ExecutionMode,
    #[serde(default)]
    pub payload: Option<JsonValue>,
    /// Forces a trigger class in test mode.
    #[serde(default)]
    pub trigger_type: Option<TriggerKind>,
    /// Prefers a specific trigger node.
    #[serde(default)]
    pub trigger_node_id: Option<NodeId>,
    /// Continues a chat conversation.
    #[serde(default)]
    pub session_id: Option<SessionId>,
    /// Forwarded to chat triggers.
    #[serde(default)]
    pub user: Option<CallerIdentity>,
}

impl ExecuteRequest {
    #[must_use]
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_payload(mut self, payload: JsonValue) -> Self {
        self.payload = Some(payload);
        self
    }

    #[must_use]
    pub fn with_trigger_type(mut self, kind: TriggerKind) -> Self {
        self.trigger_type = Some(kind);
        self
    }

    #[must_use]
    pub fn with_trigger_node(mut self, node_id: impl Into<NodeId>) -> Self {
        self.trigger_node_id = Some(node_id.into());
        self
    }
}

/// Successful outcome of an execute or chat request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecuteOutcome {
    pub success: bool,
    /// The trigger class that actually ran.
    pub trigger: TriggerKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub execution_id: Option<ExecutionId>,
    #[serde(default)]
    pub data: JsonValue,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<SessionId>,
    /// Set when a webhook call failed and a manual run took over.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub fallback: bool,
}

impl From<ExecutionResult> for ExecuteOutcome {
    fn from(result: ExecutionResult) -> Self {
        Self {
            success: true,
            trigger: result.trigger,
            execution_id: result.execution_id,
            data: result.data,
            reply: None,
            session_id: None,
            fallback: false,
        }
    }
}

impl From<ChatReply> for ExecuteOutcome {
    fn from(reply: ChatReply) -> Self {
        Self {
            success: true,
            trigger: reply.trigger,
            execution_id: reply.execution_id,
            data: reply.data,
            reply: Some(reply.reply),
            session_id: Some(reply.session_id),
            fallback: false,
        }
    }
}

/// Runs workflows through whichever trigger fits the request.
#[derive(Clone)]
pub struct ExecutionOrchestrator {
    engine: Arc<dyn AutomationEngine>,
    chat: ChatRelay,
}

impl std::fmt::Debug for ExecutionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionOrchestrator")
            .field("chat", &self.chat)
            .finish_non_exhaustive()
    }
}

impl ExecutionOrchestrator {
    #[must_use]
    pub fn new(engine: Arc<dyn AutomationEngine>, chat: ChatRelay) -> Self {
        Self { engine, chat }
    }

    /// The engine this orchestrator drives.
    #[must_use]
    pub fn engine(&self) -> &Arc<dyn AutomationEngine> {
        &self.engine
    }

    /// Fetches and analyzes a workflow.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the engine does not know the workflow, or
    /// `Upstream` if the engine could not be asked.
    pub async fn introspect(
        &self,
        workflow_id: &WorkflowId,
    ) -> Result<(Workflow, AnalyzedWorkflow), ExecuteError> {
        let workflow = self
            .engine
            .get_workflow(workflow_id)
            .await
            .map_err(|report| lookup_failed(workflow_id, report))?;
        let analyzed = analyze(&workflow);
        Ok((workflow, analyzed))
    }

    /// Runs a workflow as the request asks.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the workflow does not exist
    /// - `BadRequest` if the workflow has no trigger for the request
    /// - `ExecutionFailed` if the chosen trigger (and any fallback) failed
    /// - `Timeout` or `Cancelled` from the chat relay
    #[instrument(skip(self, request, cancel), fields(mode = ?request.mode))]
    pub async fn execute(
        &self,
        workflow_id: &WorkflowId,
        request: ExecuteRequest,
        cancel: Option<CancellationToken>,
    ) -> Result<ExecuteOutcome, ExecuteError> {
        let (workflow, analyzed) = self.introspect(workflow_id).await?;
        let payload = request.payload.clone().unwrap_or_else(|| json!({}));
        let node_id = request.trigger_node_id.as_ref();

        match request.mode {
            ExecutionMode::Webhook => {
                require(&analyzed, TriggerKind::Webhook)?;
                self.webhook(&workflow, &payload, node_id).await
            }
            ExecutionMode::Manual => {
                require(&analyzed, TriggerKind::Manual)?;
                self.manual(&workflow, &payload).await
            }
            ExecutionMode::Test => {
                let mut trigger_request = TriggerRequest::new(&payload);
                if let Some(kind) = request.trigger_type {
                    trigger_request = trigger_request.with_type(kind);
                }
                if let Some(node_id) = node_id {
                    trigger_request = trigger_request.with_node_id(node_id);
                }
                let resolved = resolve(&analyzed, &trigger_request);
                info!(workflow_id = %workflow.id, trigger = %resolved.kind, "trigger resolved");

                match (resolved.kind, resolved.node) {
                    (TriggerKind::Chat, Some(trigger)) => {
                        let text = chat_text(&payload).ok_or_else(|| {
                            ExecuteError::bad_request(
                                "chat payload needs a non-empty message, text or chatInput",
                            )
                        })?;
                        let mut message = ChatMessage::new(text);
                        message.session_id = request.session_id;
                        message.user = request.user.clone();
                        self.chat
                            .send(&workflow, &trigger, message, cancel)
                            .await
                            .map(ExecuteOutcome::from)
                    }
                    (TriggerKind::Webhook, Some(trigger)) => {
                        self.webhook_with_fallback(&workflow, &analyzed, &payload, &trigger)
                            .await
                    }
                    (TriggerKind::Manual, Some(_)) => self.manual(&workflow, &payload).await,
                    (kind, _) => Err(ExecuteError::bad_request(format!(
                        "workflow {} has no usable {kind} trigger",
                        workflow.id
                    ))
                    .into()),
                }
            }
        }
    }

    /// Sends a chat message to a workflow's chat trigger, or to its webhook
    /// trigger when it has no chat trigger.
    ///
    /// # Errors
    ///
    /// As [`ExecutionOrchestrator::execute`]; `BadRequest` if the workflow
    /// has neither trigger.
    #[instrument(skip(self, message, cancel))]
    pub async fn chat(
        &self,
        workflow_id: &WorkflowId,
        message: ChatMessage,
        cancel: Option<CancellationToken>,
    ) -> Result<ExecuteOutcome, ExecuteError> {
        if message.text.trim().is_empty() {
            return Err(ExecuteError::bad_request("message must not be empty").into());
        }
        let (workflow, analyzed) = self.introspect(workflow_id).await?;
        let trigger = analyzed
            .first_of(TriggerKind::Chat)
            .or_else(|| analyzed.first_of(TriggerKind::Webhook))
            .ok_or_else(|| {
                ExecuteError::bad_request(format!(
                    "workflow {workflow_id} has no chat or webhook trigger"
                ))
            })?;

        self.chat
            .send(&workflow, trigger, message, cancel)
            .await
            .map(ExecuteOutcome::from)
    }

    async fn webhook(
        &self,
        workflow: &Workflow,
        payload: &JsonValue,
        node_id: Option<&NodeId>,
    ) -> Result<ExecuteOutcome, ExecuteError> {
        self.engine
            .run_webhook(workflow, payload, node_id)
            .await
            .map(ExecuteOutcome::from)
            .map_err(execution_failed)
    }

    async fn manual(
        &self,
        workflow: &Workflow,
        payload: &JsonValue,
    ) -> Result<ExecuteOutcome, ExecuteError> {
        self.engine
            .run_manual(&workflow.id, payload)
            .await
            .map(ExecuteOutcome::from)
            .map_err(execution_failed)
    }

    async fn webhook_with_fallback(
        &self,
        workflow: &Workflow,
        analyzed: &AnalyzedWorkflow,
        payload: &JsonValue,
        trigger: &TriggerInfo,
    ) -> Result<ExecuteOutcome, ExecuteError> {
        let webhook_error = match self
            .engine
            .run_webhook(workflow, payload, Some(&trigger.node_id))
            .await
        {
            Ok(result) => return Ok(result.into()),
            Err(report) => report,
        };

        if !analyzed.has_manual {
            return Err(execution_failed(webhook_error));
        }

        warn!(
            workflow_id = %workflow.id,
            error = %webhook_error,
            "webhook trigger failed, falling back to manual run"
        );

        match self.engine.run_manual(&workflow.id, payload).await {
            Ok(result) => Ok(ExecuteOutcome {
                fallback: true,
                ..result.into()
            }),
            Err(manual_error) => {
                let message = format!(
                    "webhook trigger failed ({}); manual fallback failed ({})",
                    webhook_error.current_context(),
                    manual_error.current_context()
                );
                Err(manual_error.context(ExecuteError::ExecutionFailed { message }))
            }
        }
    }
}

fn require(analyzed: &AnalyzedWorkflow, kind: TriggerKind) -> Result<(), ExecuteError> {
    if analyzed.has(kind) {
        Ok(())
    } else {
        Err(ExecuteError::bad_request(format!(
            "workflow {} has no {kind} trigger",
            analyzed.workflow_id
        ))
        .into())
    }
}

fn lookup_failed(workflow_id: &WorkflowId, report: Report<GatewayError>) -> Report<ExecuteError> {
    let context = if report.current_context().is_not_found() {
        ExecuteError::NotFound {
            workflow_id: workflow_id.clone(),
        }
    } else {
        ExecuteError::Upstream {
            message: report.current_context().to_string(),
        }
    };
    report.context(context)
}

fn execution_failed(report: Report<GatewayError>) -> Report<ExecuteError> {
    let message = report.current_context().to_string();
    let context = match report.current_context() {
        // Nothing was invoked: the trigger has no address to call.
        GatewayError::MissingWebhook { .. } => ExecuteError::BadRequest { reason: message },
        _ => ExecuteError::ExecutionFailed { message },
    };
    report.context(context)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{ChatConfig, Correlation};
    use crate::testing::{FakeEngine, LIVE, TEST};
    use flowbridge_workflow::{ExecutionRecord, ExecutionStatus, Node};
    use serde_json::Map;
    use std::time::Duration;

    const WEBHOOK: &str = "n8n-nodes-base.webhook";
    const MANUAL: &str = "n8n-nodes-base.manualTrigger";
    const CHAT: &str = "@n8n/n8n-nodes-langchain.chatTrigger";

    fn orchestrator(engine: Arc<FakeEngine>) -> ExecutionOrchestrator {
        let config = ChatConfig {
            poll_deadline: Duration::from_millis(500),
            poll_interval: Duration::from_millis(50),
            correlation: Correlation::Recency,
        };
        let engine: Arc<dyn AutomationEngine> = engine;
        ExecutionOrchestrator::new(engine.clone(), ChatRelay::new(engine, config))
    }

    fn webhook_and_manual(active: bool) -> Workflow {
        Workflow::new("wf1", "Orders")
            .with_active(active)
            .with_node(Node::new("w", "Webhook", WEBHOOK).with_webhook_id("orders"))
            .with_node(Node::new("m", "Manual", MANUAL))
    }

    #[tokio::test]
    async fn webhook_failure_falls_back_to_manual() {
        let engine = Arc::new(
            FakeEngine::new()
                .with_workflow(webhook_and_manual(true))
                .with_webhook(&format!("{LIVE}/orders"), 500, "internal error")
                .with_manual(Ok(json!({ "executionId": "77" }))),
        );
        let orchestrator = orchestrator(engine.clone());

        let outcome = orchestrator
            .execute(
                &WorkflowId::new("wf1"),
                ExecuteRequest::new(ExecutionMode::Test).with_payload(json!({ "orderId": 9 })),
                None,
            )
            .await
            .expect("outcome");

        assert!(outcome.success);
        assert!(outcome.fallback);
        assert_eq!(outcome.trigger, TriggerKind::Manual);
        assert_eq!(engine.posted_urls(), vec![format!("{LIVE}/orders")]);
        assert_eq!(engine.manual_calls(), 1);
    }

    #[tokio::test]
    async fn double_failure_reports_both_errors() {
        let engine = Arc::new(
            FakeEngine::new()
                .with_workflow(webhook_and_manual(false))
                .with_webhook(&format!("{TEST}/orders"), 500, "webhook boom")
                .with_manual(Err("method not allowed")),
        );
        let orchestrator = orchestrator(engine);

        let err = orchestrator
            .execute(&WorkflowId::new("wf1"), ExecuteRequest::default(), None)
            .await
            .unwrap_err();

        match err.current_context() {
            ExecuteError::ExecutionFailed { message } => {
                assert!(message.contains("webhook boom"), "{message}");
                assert!(message.contains("method not allowed"), "{message}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn webhook_failure_without_manual_is_execution_failure() {
        let workflow = Workflow::new("wf1", "Hook only")
            .with_active(true)
            .with_node(Node::new("w", "Webhook", WEBHOOK).with_webhook_id("orders"));
        let engine = Arc::new(
            FakeEngine::new()
                .with_workflow(workflow)
                .with_webhook(&format!("{LIVE}/orders"), 502, "bad gateway"),
        );
        let orchestrator = orchestrator(engine.clone());

        let err = orchestrator
            .execute(&WorkflowId::new("wf1"), ExecuteRequest::default(), None)
            .await
            .unwrap_err();

        assert!(matches!(err.current_context(), ExecuteError::ExecutionFailed { .. }));
        assert_eq!(engine.manual_calls(), 0);
    }

    #[tokio::test]
    async fn webhook_without_address_is_bad_request() {
        let workflow = Workflow::new("wf4", "Unaddressed")
            .with_active(true)
            .with_node(Node::new("w", "Webhook", WEBHOOK));
        let engine = Arc::new(FakeEngine::new().with_workflow(workflow));
        let orchestrator = orchestrator(engine.clone());

        let err = orchestrator
            .execute(
                &WorkflowId::new("wf4"),
                ExecuteRequest::new(ExecutionMode::Webhook),
                None,
            )
            .await
            .unwrap_err();

        match err.current_context() {
            ExecuteError::BadRequest { reason } => assert!(reason.contains("wf4")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(engine.posted_urls().is_empty());
    }

    #[tokio::test]
    async fn chat_message_routes_through_relay() {
        let workflow = Workflow::new("wf2", "Bot")
            .with_active(false)
            .with_node(Node::new("c", "Chat Trigger", CHAT).with_webhook_id("abc"));
        let mut run_data = Map::new();
        run_data.insert(
            "Chat Trigger".to_string(),
            json!([{ "json": { "chatInput": "Hallo" } }]),
        );
        run_data.insert(
            "Respond".to_string(),
            json!([{ "json": { "response": "Guten Tag" } }]),
        );
        let engine = Arc::new(
            FakeEngine::new()
                .with_workflow(workflow)
                .with_webhook(&format!("{TEST}/abc/chat"), 200, "{}")
                .with_execution(
                    ExecutionRecord::new("e1", ExecutionStatus::Success).with_run_data(run_data),
                ),
        );
        let orchestrator = orchestrator(engine);

        let outcome = orchestrator
            .execute(
                &WorkflowId::new("wf2"),
                ExecuteRequest::default().with_payload(json!({ "message": "Hallo" })),
                None,
            )
            .await
            .expect("outcome");

        assert_eq!(outcome.trigger, TriggerKind::Chat);
        assert_eq!(outcome.reply.as_deref(), Some("Guten Tag"));
        assert!(outcome.session_id.is_some());
    }

    #[tokio::test]
    async fn explicit_chat_without_chat_trigger_is_bad_request() {
        let engine = Arc::new(FakeEngine::new().with_workflow(webhook_and_manual(true)));
        let orchestrator = orchestrator(engine.clone());

        let err = orchestrator
            .execute(
                &WorkflowId::new("wf1"),
                ExecuteRequest::default()
                    .with_trigger_type(TriggerKind::Chat)
                    .with_payload(json!({ "message": "hi" })),
                None,
            )
            .await
            .unwrap_err();

        assert!(matches!(err.current_context(), ExecuteError::BadRequest { .. }));
        assert!(engine.posted_urls().is_empty());
    }

    #[tokio::test]
    async fn webhook_mode_requires_webhook_trigger() {
        let workflow = Workflow::new("wf3", "Manual only").with_node(Node::new("m", "Manual", MANUAL));
        let engine = Arc::new(FakeEngine::new().with_workflow(workflow));
        let orchestrator = orchestrator(engine);

        let err = orchestrator
            .execute(&WorkflowId::new("wf3"), ExecuteRequest::new(ExecutionMode::Webhook), None)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), ExecuteError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn manual_mode_runs_manual_only() {
        let engine = Arc::new(
            FakeEngine::new()
                .with_workflow(webhook_and_manual(true))
                .with_manual(Ok(json!({ "data": { "executionId": 5 } }))),
        );
        let orchestrator = orchestrator(engine.clone());

        let outcome = orchestrator
            .execute(&WorkflowId::new("wf1"), ExecuteRequest::new(ExecutionMode::Manual), None)
            .await
            .expect("outcome");

        assert_eq!(outcome.trigger, TriggerKind::Manual);
        assert!(!outcome.fallback);
        assert!(engine.posted_urls().is_empty());
    }

    #[tokio::test]
    async fn webhook_mode_uses_selected_node() {
        let workflow = Workflow::new("wf4", "Two hooks")
            .with_active(true)
            .with_node(Node::new("w1", "First", WEBHOOK).with_webhook_id("first"))
            .with_node(Node::new("w2", "Second", WEBHOOK).with_webhook_id("second"));
        let engine = Arc::new(
            FakeEngine::new()
                .with_workflow(workflow)
                .with_webhook(&format!("{LIVE}/second"), 200, r#"{"ok":true}"#),
        );
        let orchestrator = orchestrator(engine.clone());

        let outcome = orchestrator
            .execute(
                &WorkflowId::new("wf4"),
                ExecuteRequest::new(ExecutionMode::Webhook).with_trigger_node("w2"),
                None,
            )
            .await
            .expect("outcome");

        assert_eq!(outcome.data, json!({ "ok": true }));
        assert_eq!(engine.posted_urls(), vec![format!("{LIVE}/second")]);
    }

    #[tokio::test]
    async fn unknown_workflow_is_not_found() {
        let orchestrator = orchestrator(Arc::new(FakeEngine::new()));

        let err = orchestrator
            .execute(&WorkflowId::new("missing"), ExecuteRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), ExecuteError::NotFound { .. }));
    }

    #[tokio::test]
    async fn no_trigger_is_bad_request() {
        let workflow = Workflow::new("wf5", "Scheduled")
            .with_node(Node::new("s", "Every hour", "n8n-nodes-base.scheduleTrigger"));
        let orchestrator = orchestrator(Arc::new(FakeEngine::new().with_workflow(workflow)));

        let err = orchestrator
            .execute(&WorkflowId::new("wf5"), ExecuteRequest::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err.current_context(), ExecuteError::BadRequest { .. }));
    }

    #[tokio::test]
    async fn chat_endpoint_falls_back_to_webhook_trigger() {
        let workflow = Workflow::new("wf6", "Hook bot")
            .with_active(true)
            .with_node(Node::new("w", "Webhook", WEBHOOK).with_webhook_id("bot"));
        let engine = Arc::new(
            FakeEngine::new()
                .with_workflow(workflow)
                .with_webhook(&format!("{LIVE}/bot"), 200, r#"{"text":"pong"}"#),
        );
        let orchestrator = orchestrator(engine);

        let outcome = orchestrator
            .chat(&WorkflowId::new("wf6"), ChatMessage::new("ping"), None)
            .await
            .expect("outcome");

        assert_eq!(outcome.trigger, TriggerKind::Webhook);
        assert_eq!(outcome.reply.as_deref(), Some("pong"));
    }

    #[test]
    fn request_deserializes_wire_shape() {
        let request: ExecuteRequest = serde_json::from_value(json!({
            "type": "webhook",
            "payload": { "a": 1 },
            "triggerType": "chat",
            "triggerNodeId": "n1"
        }))
        .expect("request");
        assert_eq!(request.mode, ExecutionMode::Webhook);
        assert_eq!(request.trigger_type, Some(TriggerKind::Chat));
        assert_eq!(request.trigger_node_id, Some(NodeId::new("n1")));

        let empty: ExecuteRequest = serde_json::from_value(json!({})).expect("request");
        assert_eq!(empty.mode, ExecutionMode::Test);
    }

    #[test]
    fn outcome_omits_absent_fields() {
        let outcome = ExecuteOutcome::from(ExecutionResult {
            trigger: TriggerKind::Webhook,
            execution_id: None,
            data: json!({ "ok": true }),
        });
        let value = serde_json::to_value(&outcome).expect("json");
        assert_eq!(
            value,
            json!({ "success": true, "trigger": "webhook", "data": { "ok": true } })
        );
    }
}
