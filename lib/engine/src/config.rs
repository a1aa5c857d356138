//! Automation engine connection settings.

use crate::client::WebhookBases;
use crate::error::GatewayError;
use reqwest::Url;
use serde::Deserialize;

/// Connection settings for the automation engine.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// REST API root, e.g. `http://localhost:5678/api/v1`.
    pub base_url: String,

    /// API key sent as `X-N8N-API-KEY`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Webhook root for active workflows. Defaults to `<origin>/webhook`.
    #[serde(default)]
    pub live_webhook_base: Option<String>,

    /// Webhook root for inactive workflows. Defaults to `<origin>/webhook-test`.
    #[serde(default)]
    pub test_webhook_base: Option<String>,

    /// Manual-run endpoint relative to `base_url`; `{id}` is replaced by
    /// the workflow ID.
    #[serde(default = "default_manual_run_path")]
    pub manual_run_path: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_manual_run_path() -> String {
    "/workflows/{id}/run".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl EngineConfig {
    /// Creates a config with defaults for everything but the API root.
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            live_webhook_base: None,
            test_webhook_base: None,
            manual_run_path: default_manual_run_path(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }

    /// Resolves the live and test webhook roots.
    ///
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute URL.
    pub fn webhook_bases(&self) -> Result<WebhookBases, GatewayError> {
        let origin = Url::parse(&self.base_url)
            .map_err(|e| GatewayError::InvalidConfig {
                reason: format!("base_url '{}': {e}", self.base_url),
            })?
            .origin()
            .ascii_serialization();

        let live = self
            .live_webhook_base
            .clone()
            .unwrap_or_else(|| format!("{origin}/webhook"));
        let test = self
            .test_webhook_base
            .clone()
            .unwrap_or_else(|| format!("{origin}/webhook-test"));

        Ok(WebhookBases::new(live, test))
    }

    /// Returns the manual-run path for a workflow.
    #[must_use]
    pub fn manual_run_path_for(&self, workflow_id: &str) -> String {
        self.manual_run_path.replace("{id}", workflow_id)
    }
}
