//! Centralized server configuration.
//!
//! This module provides strongly-typed configuration for the server,
//! loaded via the `config` crate from environment variables. Nested keys
//! use `__`, so `ENGINE__BASE_URL` sets `engine.base_url`.
//!
//! See [`EngineConfig`] for the automation engine connection settings.

use flowbridge_engine::EngineConfig;
use flowbridge_execution::{ChatConfig, Correlation};
use serde::Deserialize;
use std::time::Duration;

/// Server configuration composed from library configs.
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    /// Address the HTTP listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Automation engine connection.
    pub engine: EngineConfig,

    /// Chat reply settings.
    #[serde(default)]
    pub chat: ChatSettings,
}

/// Chat reply settings as configured.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatSettings {
    /// Total time to wait for a polled reply, in milliseconds.
    #[serde(default = "default_poll_deadline_ms")]
    pub poll_deadline_ms: u64,

    /// Pause between polls, in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// How polled executions are matched to a sent message.
    #[serde(default)]
    pub correlation: Correlation,

    /// Stop polling when the caller disconnects. When false, polling runs
    /// to its deadline on a detached task.
    #[serde(default)]
    pub cancel_on_disconnect: bool,
}

fn default_bind_addr() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_poll_deadline_ms() -> u64 {
    8500
}

fn default_poll_interval_ms() -> u64 {
    700
}

impl Default for ChatSettings {
    fn default() -> Self {
        Self {
            poll_deadline_ms: default_poll_deadline_ms(),
            poll_interval_ms: default_poll_interval_ms(),
            correlation: Correlation::default(),
            cancel_on_disconnect: false,
        }
    }
}

impl ChatSettings {
    /// Converts to the relay's timing settings.
    #[must_use]
    pub fn chat_config(&self) -> ChatConfig {
        ChatConfig {
            poll_deadline: Duration::from_millis(self.poll_deadline_ms),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            correlation: self.correlation,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if required configuration is missing or invalid.
    pub fn from_env() -> Result<Self, config::ConfigError> {
        Self::load(
            config::Config::builder().add_source(
                config::Environment::default()
                    .separator("__")
                    .try_parsing(true),
            ),
        )
    }

    fn load(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, config::ConfigError> {
        builder.build()?.try_deserialize()
    }
}
