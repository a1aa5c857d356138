//! Shared request-handling state.

use crate::config::ChatSettings;
use flowbridge_engine::AutomationEngine;
use flowbridge_execution::{ChatRelay, ExecutionOrchestrator};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// State shared by all handlers.
#[derive(Debug)]
pub struct AppState {
    pub orchestrator: ExecutionOrchestrator,
    /// Whether a dropped request cancels its chat polling.
    pub cancel_on_disconnect: bool,
    /// Cancelled on server shutdown; request tokens are children of it.
    pub shutdown: CancellationToken,
}

impl AppState {
    #[must_use]
    pub fn new(engine: Arc<dyn AutomationEngine>, chat: &ChatSettings) -> Self {
        let relay = ChatRelay::new(engine.clone(), chat.chat_config());
        Self {
            orchestrator: ExecutionOrchestrator::new(engine, relay),
            cancel_on_disconnect: chat.cancel_on_disconnect,
            shutdown: CancellationToken::new(),
        }
    }

    #[must_use]
    pub fn engine(&self) -> &Arc<dyn AutomationEngine> {
        self.orchestrator.engine()
    }
}
