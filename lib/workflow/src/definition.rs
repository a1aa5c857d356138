//! Workflow definition types.
//!
//! These mirror what the automation engine returns from its workflow
//! endpoint. Workflows are owned by the engine and fetched fresh for every
//! invocation; nothing here is persisted locally.

use flowbridge_core::{NodeId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A workflow as defined in the automation engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    /// Engine-assigned workflow identifier.
    pub id: WorkflowId,
    /// Human-readable name.
    pub name: String,
    /// Whether the workflow is active (production webhooks registered).
    #[serde(default)]
    pub active: bool,
    /// Nodes in definition order.
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Workflow {
    /// Creates an inactive workflow with no nodes.
    #[must_use]
    pub fn new(id: impl Into<WorkflowId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            active: false,
            nodes: Vec::new(),
        }
    }

    /// Sets the active flag.
    #[must_use]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = active;
        self
    }

    /// Appends a node.
    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    /// Looks up a node by ID.
    #[must_use]
    pub fn node(&self, id: &NodeId) -> Option<&Node> {
        self.nodes.iter().find(|n| &n.id == id)
    }
}

/// A single node in a workflow graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Node identifier, unique within the workflow.
    pub id: NodeId,
    /// Display name. Execution run data is keyed by this.
    pub name: String,
    /// Dotted engine type identifier (e.g. `n8n-nodes-base.webhook`).
    #[serde(rename = "type")]
    pub node_type: String,
    /// Webhook identifier for nodes that receive HTTP calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    /// Untyped node parameters.
    #[serde(default)]
    pub parameters: Map<String, JsonValue>,
    /// Disabled nodes never run.
    #[serde(default)]
    pub disabled: bool,
}

impl Node {
    /// Creates a node with no parameters.
    #[must_use]
    pub fn new(
        id: impl Into<NodeId>,
        name: impl Into<String>,
        node_type: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: node_type.into(),
            webhook_id: None,
            parameters: Map::new(),
            disabled: false,
        }
    }

    /// Sets the webhook ID.
    #[must_use]
    pub fn with_webhook_id(mut self, webhook_id: impl Into<String>) -> Self {
        self.webhook_id = Some(webhook_id.into());
        self
    }

    /// Adds a parameter.
    #[must_use]
    pub fn with_parameter(mut self, key: impl Into<String>, value: JsonValue) -> Self {
        self.parameters.insert(key.into(), value);
        self
    }

    /// Marks the node as disabled.
    #[must_use]
    pub fn disabled(mut self) -> Self {
        self.disabled = true;
        self
    }

    /// Returns a string parameter if present and non-empty.
    #[must_use]
    pub fn string_parameter(&self, key: &str) -> Option<&str> {
        self.parameters
            .get(key)
            .and_then(JsonValue::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Returns a boolean parameter if present.
    #[must_use]
    pub fn bool_parameter(&self, key: &str) -> Option<bool> {
        self.parameters.get(key).and_then(JsonValue::as_bool)
    }
}
