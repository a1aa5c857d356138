//! Chat relay: deliver a message to a chat trigger and wait for the reply.
//!
//! Delivery walks up to four URLs. The primary webhook root (live for
//! active workflows, test otherwise) is tried as `<root>/<webhookId>` and
//! then `<root>/<webhookId>/chat`; on repeated 404 the other root is tried
//! the same way. Any other failure stops the walk.
//!
//! If the webhook response already carries text it is the reply. Otherwise
//! the relay polls the engine's execution log until reply text shows up in
//! a node output, the execution ends without text, or the deadline passes.
//! Every poll is bounded by the time left, so a slow engine call cannot
//! push the relay past its deadline. Executions already listed before the
//! message went out are never taken as its reply.

use crate::error::ExecuteError;
use crate::reply::{FieldReplyExtractor, ReplyExtractor, immediate_reply, reply_in_execution};
use chrono::{DateTime, Utc};
use flowbridge_core::{ExecutionId, Result, SessionId};
use flowbridge_engine::{AutomationEngine, WebhookBases, WebhookResponse};
use flowbridge_workflow::{ExecutionRecord, TriggerInfo, TriggerKind, Workflow};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Executions considered when correlating by session.
const SESSION_WINDOW: u32 = 5;

/// Tolerated clock difference between this service and the engine when
/// discarding executions that started before the message was sent.
const CLOCK_SKEW_SECS: i64 = 5;

/// How a polled execution is matched to the message that was sent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Correlation {
    /// The workflow's most recent execution is assumed to be ours.
    #[default]
    Recency,
    /// Only an execution whose data carries our session ID counts.
    Session,
}

/// Timing and correlation settings for chat replies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChatConfig {
    /// Total time to wait for a polled reply.
    pub poll_deadline: Duration,
    /// Pause between polls.
    pub poll_interval: Duration,
    /// Execution matching strategy.
    pub correlation: Correlation,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            poll_deadline: Duration::from_millis(8500),
            poll_interval: Duration::from_millis(700),
            correlation: Correlation::Recency,
        }
    }
}

/// Who is chatting, forwarded to the workflow as `user`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallerIdentity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A message to relay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    /// The text to send.
    pub text: String,
    /// Conversation to continue; a new session is started when absent.
    pub session_id: Option<SessionId>,
    /// The sender.
    pub user: Option<CallerIdentity>,
    /// Overrides [`ChatConfig::poll_deadline`] for this message.
    pub deadline: Option<Duration>,
}

impl ChatMessage {
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            session_id: None,
            user: None,
            deadline: None,
        }
    }

    #[must_use]
    pub fn with_session(mut self, session_id: SessionId) -> Self {
        self.session_id = Some(session_id);
        self
    }

    #[must_use]
    pub fn with_user(mut self, user: CallerIdentity) -> Self {
        self.user = Some(user);
        self
    }

    #[must_use]
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }
}

/// Where a reply was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplySource {
    /// In the webhook response body.
    Immediate,
    /// In a polled execution.
    Polled,
}

/// A chat reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatReply {
    pub reply: String,
    pub session_id: SessionId,
    /// The trigger the message went to.
    pub trigger: TriggerKind,
    /// The execution the reply came from, when polled.
    pub execution_id: Option<ExecutionId>,
    pub source: ReplySource,
    /// The webhook response body.
    pub data: JsonValue,
}

enum Poll {
    Reply(String, ExecutionId),
    Finished(ExecutionId),
    Pending,
}

/// Relays chat messages to a workflow and collects replies.
#[derive(Clone)]
pub struct ChatRelay {
    engine: Arc<dyn AutomationEngine>,
    config: ChatConfig,
    extractor: Arc<dyn ReplyExtractor>,
}

impl std::fmt::Debug for ChatRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatRelay")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ChatRelay {
    /// Creates a relay using the default field extractor.
    #[must_use]
    pub fn new(engine: Arc<dyn AutomationEngine>, config: ChatConfig) -> Self {
        Self {
            engine,
            config,
            extractor: Arc::new(FieldReplyExtractor::default()),
        }
    }

    /// Replaces the reply extraction strategy.
    #[must_use]
    pub fn with_extractor(mut self, extractor: Arc<dyn ReplyExtractor>) -> Self {
        self.extractor = extractor;
        self
    }

    #[must_use]
    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    /// Sends `message` to `trigger` and waits for the reply.
    ///
    /// When `cancel` fires, the relay stops at its next await point and
    /// returns [`ExecuteError::Cancelled`].
    ///
    /// # Errors
    ///
    /// - `BadRequest` if the trigger has no webhook address
    /// - `ExecutionFailed` if every delivery URL fails
    /// - `Timeout` if no reply shows up before the deadline
    /// - `Upstream` if the execution log cannot be read
    pub async fn send(
        &self,
        workflow: &Workflow,
        trigger: &TriggerInfo,
        message: ChatMessage,
        cancel: Option<CancellationToken>,
    ) -> Result<ChatReply, ExecuteError> {
        match cancel {
            Some(token) => tokio::select! {
                biased;
                () = token.cancelled() => {
                    info!(workflow_id = %workflow.id, "chat relay cancelled");
                    Err(ExecuteError::Cancelled.into())
                }
                result = self.relay(workflow, trigger, message) => result,
            },
            None => self.relay(workflow, trigger, message).await,
        }
    }

    #[instrument(skip_all, fields(workflow_id = %workflow.id, trigger = %trigger.node_name))]
    async fn relay(
        &self,
        workflow: &Workflow,
        trigger: &TriggerInfo,
        message: ChatMessage,
    ) -> Result<ChatReply, ExecuteError> {
        let path = trigger.webhook_path().ok_or_else(|| {
            ExecuteError::bad_request(format!(
                "trigger '{}' has no webhook address",
                trigger.node_name
            ))
        })?;

        let session_id = message.session_id.unwrap_or_default();
        let budget = message.deadline.unwrap_or(self.config.poll_deadline);
        let payload = chat_payload(trigger, &message, session_id);
        let sent_at = Utc::now();
        let baseline = self.latest_execution(workflow).await;

        let response = self.deliver(workflow, path, &payload).await?;
        let data = response.json();

        if let Some(reply) = immediate_reply(self.extractor.as_ref(), &data) {
            debug!("reply found in webhook response");
            return Ok(ChatReply {
                reply,
                session_id,
                trigger: trigger.kind,
                execution_id: None,
                source: ReplySource::Immediate,
                data,
            });
        }

        let (reply, execution_id) = self
            .await_reply(workflow, trigger, session_id, sent_at, baseline, budget)
            .await?;
        Ok(ChatReply {
            reply,
            session_id,
            trigger: trigger.kind,
            execution_id: Some(execution_id),
            source: ReplySource::Polled,
            data,
        })
    }

    /// The newest execution listed before the message goes out. Neither it
    /// nor anything older can carry our reply.
    async fn latest_execution(&self, workflow: &Workflow) -> Option<ExecutionId> {
        match self.engine.get_executions(&workflow.id, 1).await {
            Ok(recent) => recent.into_iter().next().map(|e| e.id),
            Err(report) => {
                warn!(error = %report.current_context(), "could not read execution log before sending");
                None
            }
        }
    }

    async fn deliver(
        &self,
        workflow: &Workflow,
        path: &str,
        payload: &JsonValue,
    ) -> Result<WebhookResponse, ExecuteError> {
        let chat_path = format!("{}/chat", path.trim_end_matches('/'));
        let mut last_not_found = None;

        for base in self.engine.webhook_bases().ordered_for(workflow.active) {
            for candidate in [path, chat_path.as_str()] {
                let url = WebhookBases::url(base, candidate);
                let response = self
                    .engine
                    .post_webhook(&url, payload)
                    .await
                    .map_err(|report| {
                        let message = report.current_context().to_string();
                        report.context(ExecuteError::ExecutionFailed { message })
                    })?;

                if response.is_success() {
                    debug!(url = %url, "chat message delivered");
                    return Ok(response);
                }
                if !response.is_not_found() {
                    warn!(url = %url, status = response.status, "chat webhook rejected message");
                    return Err(ExecuteError::ExecutionFailed {
                        message: format!("HTTP {} from {url}: {}", response.status, response.body),
                    }
                    .into());
                }
                debug!(url = %url, "chat webhook not found, trying next address");
                last_not_found = Some((url, response));
            }
        }

        let message = match last_not_found {
            Some((url, response)) => format!(
                "chat webhook not registered (last tried {url}): {}",
                response.body
            ),
            None => "chat webhook not registered".to_string(),
        };
        Err(ExecuteError::ExecutionFailed { message }.into())
    }

    async fn await_reply(
        &self,
        workflow: &Workflow,
        trigger: &TriggerInfo,
        session_id: SessionId,
        sent_at: DateTime<Utc>,
        baseline: Option<ExecutionId>,
        budget: Duration,
    ) -> Result<(String, ExecutionId), ExecuteError> {
        let started = Instant::now();
        let deadline = started + budget;
        let session = session_id.to_string();

        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            let poll = self.poll_once(workflow, trigger, &session, sent_at, baseline.as_ref());
            match tokio::time::timeout(remaining, poll).await {
                Err(_) => break,
                Ok(result) => match result? {
                    Poll::Reply(reply, execution_id) => {
                        debug!(execution_id = %execution_id, "reply found in execution");
                        return Ok((reply, execution_id));
                    }
                    Poll::Finished(execution_id) => {
                        debug!(execution_id = %execution_id, "execution ended without reply text");
                        break;
                    }
                    Poll::Pending => {}
                },
            }

            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            tokio::time::sleep(self.config.poll_interval.min(remaining)).await;
        }

        let waited_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        warn!(workflow_id = %workflow.id, waited_ms, "no chat reply before deadline");
        Err(ExecuteError::Timeout {
            workflow_id: workflow.id.clone(),
            waited_ms: u64::try_from(budget.as_millis()).unwrap_or(waited_ms),
        }
        .into())
    }

    async fn poll_once(
        &self,
        workflow: &Workflow,
        trigger: &TriggerInfo,
        session: &str,
        sent_at: DateTime<Utc>,
        baseline: Option<&ExecutionId>,
    ) -> Result<Poll, ExecuteError> {
        let window = match self.config.correlation {
            Correlation::Recency => 1,
            Correlation::Session => SESSION_WINDOW,
        };
        let recent = self
            .engine
            .get_executions(&workflow.id, window)
            .await
            .map_err(upstream)?;

        // Listed newest first, so everything from the baseline on is older.
        let fresh = recent
            .iter()
            .take_while(|e| Some(&e.id) != baseline)
            .filter(|e| !predates(e, sent_at));
        for summary in fresh {
            let execution = match self.engine.get_execution(&summary.id).await {
                Ok(execution) => execution,
                Err(report) if report.current_context().is_not_found() => continue,
                Err(report) => return Err(upstream(report)),
            };

            if self.config.correlation == Correlation::Session && !execution.echoes(session) {
                continue;
            }

            if let Some(reply) =
                reply_in_execution(self.extractor.as_ref(), &execution, &trigger.node_name)
            {
                return Ok(Poll::Reply(reply, execution.id));
            }
            if execution.is_terminal() {
                return Ok(Poll::Finished(execution.id));
            }
            return Ok(Poll::Pending);
        }

        Ok(Poll::Pending)
    }
}

/// Builds the outbound chat payload.
///
/// The text goes under the trigger's prompt field and under every alias a
/// chat workflow commonly reads.
pub(crate) fn chat_payload(
    trigger: &TriggerInfo,
    message: &ChatMessage,
    session_id: SessionId,
) -> JsonValue {
    let text = JsonValue::String(message.text.clone());
    let mut payload = Map::new();
    for alias in ["chatInput", "message", "text", "input"] {
        payload.insert(alias.to_string(), text.clone());
    }
    payload.insert(trigger.prompt_field_or_default().to_string(), text);
    payload.insert(
        "sessionId".to_string(),
        JsonValue::String(session_id.to_string()),
    );
    payload.insert(
        "action".to_string(),
        JsonValue::String("sendMessage".to_string()),
    );
    if let Some(user) = &message.user
        && let Ok(user) = serde_json::to_value(user)
    {
        payload.insert("user".to_string(), user);
    }
    payload.insert(
        "timestamp".to_string(),
        JsonValue::String(Utc::now().to_rfc3339()),
    );
    JsonValue::Object(payload)
}

fn predates(execution: &ExecutionRecord, sent_at: DateTime<Utc>) -> bool {
    execution
        .started_at
        .is_some_and(|started| started < sent_at - chrono::Duration::seconds(CLOCK_SKEW_SECS))
}

fn upstream(report: Report<flowbridge_engine::GatewayError>) -> Report<ExecuteError> {
    let message = report.current_context().to_string();
    report.context(ExecuteError::Upstream { message })
}
