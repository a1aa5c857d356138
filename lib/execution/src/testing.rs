//! In-memory automation engine for orchestration tests.

use async_trait::async_trait;
use flowbridge_core::{ExecutionId, WorkflowId};
use flowbridge_engine::{AutomationEngine, ExecutionResult, GatewayError, WebhookBases, WebhookResponse};
use flowbridge_workflow::{ExecutionRecord, TriggerKind, Workflow};
use rootcause::prelude::Report;
use serde_json::{Value as JsonValue, json};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

pub(crate) const LIVE: &str = "http://engine/webhook";
pub(crate) const TEST: &str = "http://engine/webhook-test";

/// Engine fake with scripted webhook responses and execution snapshots.
///
/// Unknown webhook URLs answer 404. The execution log holds earlier runs
/// (newest first) plus a queue of snapshots of the run started by the
/// first webhook post. That run is listed only once something was posted;
/// each detail fetch advances it until the last snapshot, which then stays.
pub(crate) struct FakeEngine {
    bases: WebhookBases,
    workflows: Mutex<HashMap<String, Workflow>>,
    webhooks: Mutex<HashMap<String, WebhookResponse>>,
    manual: Mutex<Option<Result<JsonValue, String>>>,
    history: Mutex<Vec<ExecutionRecord>>,
    snapshots: Mutex<VecDeque<ExecutionRecord>>,
    posted: Mutex<Vec<(String, JsonValue)>>,
    manual_calls: Mutex<u32>,
    stall_details: bool,
}

impl FakeEngine {
    pub(crate) fn new() -> Self {
        Self {
            bases: WebhookBases::new(LIVE, TEST),
            workflows: Mutex::new(HashMap::new()),
            webhooks: Mutex::new(HashMap::new()),
            manual: Mutex::new(None),
            history: Mutex::new(Vec::new()),
            snapshots: Mutex::new(VecDeque::new()),
            posted: Mutex::new(Vec::new()),
            manual_calls: Mutex::new(0),
            stall_details: false,
        }
    }

    pub(crate) fn with_workflow(self, workflow: Workflow) -> Self {
        self.workflows
            .lock()
            .unwrap()
            .insert(workflow.id.as_str().to_string(), workflow);
        self
    }

    pub(crate) fn with_webhook(self, url: &str, status: u16, body: &str) -> Self {
        self.webhooks
            .lock()
            .unwrap()
            .insert(url.to_string(), WebhookResponse::new(status, body));
        self
    }

    pub(crate) fn with_manual(self, outcome: Result<JsonValue, &str>) -> Self {
        *self.manual.lock().unwrap() = Some(outcome.map_err(str::to_string));
        self
    }

    pub(crate) fn with_execution(self, record: ExecutionRecord) -> Self {
        self.snapshots.lock().unwrap().push_back(record);
        self
    }

    /// Adds a run that finished before this test's message was sent.
    pub(crate) fn with_previous_execution(self, record: ExecutionRecord) -> Self {
        self.history.lock().unwrap().insert(0, record);
        self
    }

    /// Makes every execution detail fetch hang forever.
    pub(crate) fn with_stalled_details(mut self) -> Self {
        self.stall_details = true;
        self
    }

    pub(crate) fn posted_urls(&self) -> Vec<String> {
        self.posted
            .lock()
            .unwrap()
            .iter()
            .map(|(url, _)| url.clone())
            .collect()
    }

    pub(crate) fn last_payload(&self) -> Option<JsonValue> {
        self.posted.lock().unwrap().last().map(|(_, p)| p.clone())
    }

    pub(crate) fn manual_calls(&self) -> u32 {
        *self.manual_calls.lock().unwrap()
    }
}

#[async_trait]
impl AutomationEngine for FakeEngine {
    async fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow, Report<GatewayError>> {
        self.workflows
            .lock()
            .unwrap()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| {
                GatewayError::NotFound {
                    resource: format!("workflow {id}"),
                }
                .into()
            })
    }

    async fn get_executions(
        &self,
        _workflow_id: &WorkflowId,
        limit: u32,
    ) -> Result<Vec<ExecutionRecord>, Report<GatewayError>> {
        let started = !self.posted.lock().unwrap().is_empty();
        let current = if started {
            self.snapshots.lock().unwrap().front().cloned()
        } else {
            None
        };
        let history = self.history.lock().unwrap();
        Ok(current
            .into_iter()
            .chain(history.iter().cloned())
            .take(limit as usize)
            .collect())
    }

    async fn get_execution(
        &self,
        id: &ExecutionId,
    ) -> Result<ExecutionRecord, Report<GatewayError>> {
        if self.stall_details {
            std::future::pending::<()>().await;
        }
        if let Some(previous) = self.history.lock().unwrap().iter().find(|e| &e.id == id) {
            return Ok(previous.clone());
        }
        let mut snapshots = self.snapshots.lock().unwrap();
        let current = snapshots.front().filter(|e| &e.id == id).cloned().ok_or_else(|| {
            Report::<GatewayError>::from(GatewayError::NotFound {
                resource: format!("execution {id}"),
            })
        })?;
        if snapshots.len() > 1 {
            snapshots.pop_front();
        }
        Ok(current)
    }

    async fn run_manual(
        &self,
        workflow_id: &WorkflowId,
        _payload: &JsonValue,
    ) -> Result<ExecutionResult, Report<GatewayError>> {
        *self.manual_calls.lock().unwrap() += 1;
        match self.manual.lock().unwrap().clone() {
            Some(Ok(data)) => Ok(ExecutionResult {
                trigger: TriggerKind::Manual,
                execution_id: None,
                data,
            }),
            Some(Err(body)) => Err(GatewayError::UpstreamStatus {
                url: format!("/workflows/{workflow_id}/run"),
                status: 405,
                body,
            }
            .into()),
            None => Ok(ExecutionResult {
                trigger: TriggerKind::Manual,
                execution_id: None,
                data: json!({}),
            }),
        }
    }

    async fn post_webhook(
        &self,
        url: &str,
        payload: &JsonValue,
    ) -> Result<WebhookResponse, Report<GatewayError>> {
        self.posted
            .lock()
            .unwrap()
            .push((url.to_string(), payload.clone()));
        Ok(self
            .webhooks
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .unwrap_or_else(|| WebhookResponse::new(404, r#"{"message":"webhook not registered"}"#)))
    }

    fn webhook_bases(&self) -> &WebhookBases {
        &self.bases
    }
}
