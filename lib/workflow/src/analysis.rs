//! Workflow introspection.
//!
//! Produces an [`AnalyzedWorkflow`] summary from a workflow definition.
//! Analysis is total: it never fails, and unrecognized nodes are simply not
//! listed as triggers.

use crate::definition::Workflow;
use crate::trigger::{TriggerClassifier, TriggerInfo, TriggerKind};
use flowbridge_core::{NodeId, WorkflowId};
use serde::{Deserialize, Serialize};

/// Trigger summary of a single workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzedWorkflow {
    /// The analyzed workflow.
    pub workflow_id: WorkflowId,
    /// The workflow's name.
    pub name: String,
    /// Whether the workflow is active in the engine.
    pub active: bool,
    /// Trigger nodes in definition order.
    pub triggers: Vec<TriggerInfo>,
    /// At least one chat trigger.
    pub has_chat: bool,
    /// At least one webhook trigger.
    pub has_webhook: bool,
    /// At least one Telegram trigger.
    pub has_telegram: bool,
    /// At least one manual trigger.
    pub has_manual: bool,
}

impl AnalyzedWorkflow {
    /// Returns true if the workflow has a trigger of the given kind.
    ///
    /// `Unknown` never counts as available.
    #[must_use]
    pub fn has(&self, kind: TriggerKind) -> bool {
        kind != TriggerKind::Unknown && self.triggers.iter().any(|t| t.kind == kind)
    }

    /// Returns the first trigger of the given kind.
    #[must_use]
    pub fn first_of(&self, kind: TriggerKind) -> Option<&TriggerInfo> {
        self.triggers.iter().find(|t| t.kind == kind)
    }

    /// Returns the trigger of the given kind on the given node, falling back
    /// to the first trigger of that kind.
    #[must_use]
    pub fn find(&self, kind: TriggerKind, node_id: Option<&NodeId>) -> Option<&TriggerInfo> {
        node_id
            .and_then(|id| {
                self.triggers
                    .iter()
                    .find(|t| t.kind == kind && &t.node_id == id)
            })
            .or_else(|| self.first_of(kind))
    }
}

/// Analyzes a workflow with the default classifier.
#[must_use]
pub fn analyze(workflow: &Workflow) -> AnalyzedWorkflow {
    analyze_with(workflow, &TriggerClassifier::default())
}

/// Analyzes a workflow with a custom classifier.
#[must_use]
pub fn analyze_with(workflow: &Workflow, classifier: &TriggerClassifier) -> AnalyzedWorkflow {
    let triggers: Vec<TriggerInfo> = workflow
        .nodes
        .iter()
        .filter_map(|node| classifier.classify(node))
        .collect();

    let has = |kind: TriggerKind| triggers.iter().any(|t| t.kind == kind);

    let analyzed = AnalyzedWorkflow {
        workflow_id: workflow.id.clone(),
        name: workflow.name.clone(),
        active: workflow.active,
        has_chat: has(TriggerKind::Chat),
        has_webhook: has(TriggerKind::Webhook),
        has_telegram: has(TriggerKind::Telegram),
        has_manual: has(TriggerKind::Manual),
        triggers,
    };

    tracing::debug!(
        workflow_id = %analyzed.workflow_id,
        trigger_count = analyzed.triggers.len(),
        has_chat = analyzed.has_chat,
        has_webhook = analyzed.has_webhook,
        has_manual = analyzed.has_manual,
        "analyzed workflow triggers"
    );

    analyzed
}
