//! HTTP routes.

use crate::error::ApiError;
use crate::state::AppState;
use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
};
use flowbridge_core::{ExecutionId, SessionId, WorkflowId};
use flowbridge_engine::LiveMonitoring;
use flowbridge_execution::{
    CallerIdentity, ChatMessage, ExecuteError, ExecuteOutcome, ExecuteRequest,
    ExecutionOrchestrator,
};
use flowbridge_workflow::{AnalyzedWorkflow, ExecutionRecord, TriggerKind};
use rootcause::prelude::Report;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Value as JsonValue, json};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

const DEFAULT_EXECUTIONS_LIMIT: u32 = 20;
const MAX_EXECUTIONS_LIMIT: u32 = 100;

/// Builds the application router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/workflows/{id}/triggers", get(triggers))
        .route("/workflows/{id}/execute", post(execute))
        .route("/workflows/{id}/chat", post(chat))
        .route("/workflows/{id}/executions", get(executions))
        .route("/workflows/{id}/monitoring", get(monitoring))
        .route("/executions/{id}", get(execution))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<JsonValue> {
    Json(json!({ "status": "ok" }))
}

async fn triggers(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<AnalyzedWorkflow>, ApiError> {
    let (_, analyzed) = state.orchestrator.introspect(&WorkflowId::new(id)).await?;
    Ok(Json(analyzed))
}

/// Runs a workflow. An empty body is the same as `{}`.
async fn execute(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ExecuteOutcome>, ApiError> {
    let request = if body.iter().all(u8::is_ascii_whitespace) {
        ExecuteRequest::default()
    } else {
        parse_body(&body)?
    };

    let workflow_id = WorkflowId::new(id);
    let outcome = run_cancellable(&state, move |orchestrator, cancel| async move {
        orchestrator
            .execute(&workflow_id, request, Some(cancel))
            .await
    })
    .await?;
    Ok(Json(outcome))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChatBody {
    message: String,
    #[serde(default)]
    session_id: Option<SessionId>,
    #[serde(default)]
    user: Option<CallerIdentity>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatResponse {
    success: bool,
    reply: Option<String>,
    session_id: Option<SessionId>,
    trigger: TriggerKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    execution_id: Option<ExecutionId>,
}

async fn chat(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<Json<ChatResponse>, ApiError> {
    let body: ChatBody = parse_body(&body)?;
    let mut message = ChatMessage::new(body.message);
    message.session_id = body.session_id;
    message.user = body.user;

    let workflow_id = WorkflowId::new(id);
    let outcome = run_cancellable(&state, move |orchestrator, cancel| async move {
        orchestrator.chat(&workflow_id, message, Some(cancel)).await
    })
    .await?;

    Ok(Json(ChatResponse {
        success: outcome.success,
        reply: outcome.reply,
        session_id: outcome.session_id,
        trigger: outcome.trigger,
        execution_id: outcome.execution_id,
    }))
}

#[derive(Debug, Deserialize)]
struct ExecutionsQuery {
    limit: Option<u32>,
}

async fn executions(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Query(query): Query<ExecutionsQuery>,
) -> Result<Json<JsonValue>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_EXECUTIONS_LIMIT)
        .clamp(1, MAX_EXECUTIONS_LIMIT);
    let records = state
        .engine()
        .get_executions(&WorkflowId::new(id), limit)
        .await?;
    Ok(Json(json!({ "data": records })))
}

async fn execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ExecutionRecord>, ApiError> {
    let record = state.engine().get_execution(&ExecutionId::new(id)).await?;
    Ok(Json(record))
}

async fn monitoring(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Json<LiveMonitoring> {
    Json(state.engine().get_live_monitoring(&WorkflowId::new(id)).await)
}

/// Decodes a JSON request body. Rejections use the API error envelope.
fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("invalid request body: {e}")))
}

/// Runs an orchestration that may poll for a chat reply.
///
/// With `cancel_on_disconnect` the work runs inside the request and the
/// token is cancelled when the request is dropped. Otherwise it runs on a
/// detached task that finishes on its own deadline even if the caller
/// leaves. Either way, server shutdown cancels it.
async fn run_cancellable<F, Fut>(state: &AppState, work: F) -> Result<ExecuteOutcome, ApiError>
where
    F: FnOnce(ExecutionOrchestrator, CancellationToken) -> Fut,
    Fut: Future<Output = Result<ExecuteOutcome, Report<ExecuteError>>> + Send + 'static,
{
    let token = state.shutdown.child_token();
    let orchestrator = state.orchestrator.clone();

    if state.cancel_on_disconnect {
        let _guard = token.clone().drop_guard();
        return work(orchestrator, token).await.map_err(ApiError::from);
    }

    match tokio::spawn(work(orchestrator, token)).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            tracing::error!(error = %e, "execution task failed");
            Err(ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "execution task failed",
            ))
        }
    }
}
