//! REST implementation of [`AutomationEngine`].

use crate::client::{
    AutomationEngine, ExecutionResult, WebhookBases, WebhookResponse, execution_id_in,
};
use crate::config::EngineConfig;
use crate::error::GatewayError;
use async_trait::async_trait;
use flowbridge_core::{ExecutionId, WorkflowId};
use flowbridge_workflow::{ExecutionRecord, TriggerKind, Workflow};
use reqwest::{Client, RequestBuilder, Response};
use rootcause::prelude::Report;
use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use std::time::Duration;
use tracing::{debug, instrument, warn};

/// Header carrying the engine API key.
const API_KEY_HEADER: &str = "X-N8N-API-KEY";

/// Client for the automation engine's REST API and webhooks.
#[derive(Clone)]
pub struct HttpEngine {
    http: Client,
    api_base: String,
    api_key: Option<String>,
    bases: WebhookBases,
    config: EngineConfig,
}

impl std::fmt::Debug for HttpEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEngine")
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .field("bases", &self.bases)
            .finish()
    }
}

impl HttpEngine {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the base URL is invalid or the HTTP client cannot
    /// be built.
    pub fn new(config: EngineConfig) -> Result<Self, Report<GatewayError>> {
        let bases = config.webhook_bases()?;

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GatewayError::InvalidConfig {
                reason: e.to_string(),
            })?;

        Ok(Self {
            http,
            api_base: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().filter(|k| !k.is_empty()),
            bases,
            config,
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{}", self.api_base, path.trim_start_matches('/'))
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => request.header(API_KEY_HEADER, key),
            None => request,
        }
    }

    async fn send(
        &self,
        url: &str,
        request: RequestBuilder,
    ) -> Result<Response, Report<GatewayError>> {
        request.send().await.map_err(|e| {
            warn!(error = %e, url = %url, "automation engine request failed");
            GatewayError::RequestFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    async fn decode<T: DeserializeOwned>(
        url: &str,
        response: Response,
    ) -> Result<T, Report<GatewayError>> {
        response.json::<T>().await.map_err(|e| {
            GatewayError::InvalidResponse {
                url: url.to_string(),
                reason: e.to_string(),
            }
            .into()
        })
    }

    /// Returns an error for non-success responses, carrying the body.
    async fn require_success(
        url: &str,
        response: Response,
        resource: impl FnOnce() -> String,
    ) -> Result<Response, Report<GatewayError>> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = error_body(url, response.text().await);
        warn!(url = %url, status = %status, body = %body, "automation engine returned error");

        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound {
                resource: resource(),
            }
            .into());
        }
        Err(GatewayError::UpstreamStatus {
            url: url.to_string(),
            status: status.as_u16(),
            body,
        }
        .into())
    }
}

#[async_trait]
impl AutomationEngine for HttpEngine {
    #[instrument(skip(self), fields(workflow_id = %id))]
    async fn get_workflow(&self, id: &WorkflowId) -> Result<Workflow, Report<GatewayError>> {
        let url = self.api_url(&format!("workflows/{id}"));
        debug!(url = %url, "fetching workflow");

        let response = self.send(&url, self.authorized(self.http.get(&url))).await?;
        let status = response.status();
        if !status.is_success() {
            let body = error_body(&url, response.text().await);
            warn!(url = %url, status = %status, body = %body, "workflow fetch failed");
            return Err(GatewayError::NotFound {
                resource: format!("workflow {id}"),
            }
            .into());
        }

        Self::decode(&url, response).await
    }

    #[instrument(skip(self), fields(workflow_id = %workflow_id))]
    async fn get_executions(
        &self,
        workflow_id: &WorkflowId,
        limit: u32,
    ) -> Result<Vec<ExecutionRecord>, Report<GatewayError>> {
        let url = self.api_url("executions");
        let limit = limit.to_string();
        let request = self
            .http
            .get(&url)
            .query(&[("workflowId", workflow_id.as_str()), ("limit", limit.as_str())]);

        let response = self.send(&url, self.authorized(request)).await?;
        let response =
            Self::require_success(&url, response, || format!("executions of workflow {workflow_id}"))
                .await?;

        let body: JsonValue = Self::decode(&url, response).await?;
        let items = match body {
            JsonValue::Array(_) => body,
            JsonValue::Object(mut map) => map.remove("data").unwrap_or(JsonValue::Array(Vec::new())),
            _ => JsonValue::Array(Vec::new()),
        };

        let executions: Vec<ExecutionRecord> =
            serde_json::from_value(items).map_err(|e| GatewayError::InvalidResponse {
                url: url.clone(),
                reason: e.to_string(),
            })?;
        debug!(count = executions.len(), "fetched executions");
        Ok(executions)
    }

    #[instrument(skip(self), fields(execution_id = %id))]
    async fn get_execution(
        &self,
        id: &ExecutionId,
    ) -> Result<ExecutionRecord, Report<GatewayError>> {
        let url = self.api_url(&format!("executions/{id}"));
        let request = self.http.get(&url).query(&[("includeData", "true")]);

        let response = self.send(&url, self.authorized(request)).await?;
        let response = Self::require_success(&url, response, || format!("execution {id}")).await?;
        Self::decode(&url, response).await
    }

    #[instrument(skip(self, payload), fields(workflow_id = %workflow_id))]
    async fn run_manual(
        &self,
        workflow_id: &WorkflowId,
        payload: &JsonValue,
    ) -> Result<ExecutionResult, Report<GatewayError>> {
        let url = self.api_url(&self.config.manual_run_path_for(workflow_id.as_str()));
        debug!(url = %url, "starting manual run");

        let request = self.authorized(self.http.post(&url).json(payload));
        let response = self.send(&url, request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = error_body(&url, response.text().await);
            warn!(url = %url, status = %status, body = %body, "manual run failed");
            return Err(GatewayError::UpstreamStatus {
                url,
                status: status.as_u16(),
                body,
            }
            .into());
        }

        let body = response.text().await.map_err(|e| GatewayError::InvalidResponse {
            url: url.clone(),
            reason: e.to_string(),
        })?;
        let data = WebhookResponse::new(status.as_u16(), body).json();
        Ok(ExecutionResult {
            trigger: TriggerKind::Manual,
            execution_id: execution_id_in(&data),
            data,
        })
    }

    async fn post_webhook(
        &self,
        url: &str,
        payload: &JsonValue,
    ) -> Result<WebhookResponse, Report<GatewayError>> {
        let response = self.send(url, self.http.post(url).json(payload)).await?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(|e| GatewayError::InvalidResponse {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        debug!(url = %url, status, "webhook responded");
        Ok(WebhookResponse { status, body })
    }

    fn webhook_bases(&self) -> &WebhookBases {
        &self.bases
    }
}

/// The body of an error response, or a note saying why it is missing.
fn error_body(url: &str, read: reqwest::Result<String>) -> String {
    read.unwrap_or_else(|e| {
        warn!(url = %url, error = %e, "could not read error response body");
        format!("<unreadable response body: {e}>")
    })
}
