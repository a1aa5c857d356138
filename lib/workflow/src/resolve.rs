//! Trigger resolution.
//!
//! Picks the single trigger an invocation should use. Explicit caller
//! intent wins, then the payload's content, then whatever the workflow
//! structurally exposes. Resolution is total: it always yields a kind even
//! when no node of that kind exists, and never downgrades an explicit or
//! inferred kind to one the workflow happens to have. Callers check
//! availability before dispatching.

use crate::analysis::AnalyzedWorkflow;
use crate::trigger::{TriggerInfo, TriggerKind};
use flowbridge_core::NodeId;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Payload keys that mark a conversational invocation, in lookup order.
pub const CHAT_TEXT_FIELDS: [&str; 3] = ["message", "text", "chatInput"];

/// Caller-side inputs to trigger resolution.
#[derive(Debug, Clone, Copy)]
pub struct TriggerRequest<'a> {
    /// Trigger kind the caller asked for.
    pub explicit_type: Option<TriggerKind>,
    /// Trigger node the caller asked for.
    pub explicit_node_id: Option<&'a NodeId>,
    /// The invocation payload.
    pub payload: &'a JsonValue,
}

impl<'a> TriggerRequest<'a> {
    /// Creates a request with no explicit trigger.
    #[must_use]
    pub fn new(payload: &'a JsonValue) -> Self {
        Self {
            explicit_type: None,
            explicit_node_id: None,
            payload,
        }
    }

    /// Sets the explicit trigger kind.
    #[must_use]
    pub fn with_type(mut self, kind: TriggerKind) -> Self {
        self.explicit_type = Some(kind);
        self
    }

    /// Sets the explicit trigger node.
    #[must_use]
    pub fn with_node_id(mut self, node_id: &'a NodeId) -> Self {
        self.explicit_node_id = Some(node_id);
        self
    }
}

/// The resolver's decision for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTrigger {
    /// Chosen kind.
    pub kind: TriggerKind,
    /// Concrete node satisfying the kind, if the workflow has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<TriggerInfo>,
}

/// Returns the first non-empty conversational text in the payload.
#[must_use]
pub fn chat_text(payload: &JsonValue) -> Option<&str> {
    CHAT_TEXT_FIELDS.iter().find_map(|key| {
        payload
            .get(key)
            .and_then(JsonValue::as_str)
            .filter(|s| !s.trim().is_empty())
    })
}

/// Resolves which trigger an invocation should use.
#[must_use]
pub fn resolve(analyzed: &AnalyzedWorkflow, request: &TriggerRequest<'_>) -> ResolvedTrigger {
    let pick = |kind: TriggerKind| ResolvedTrigger {
        kind,
        node: analyzed.find(kind, request.explicit_node_id).cloned(),
    };

    let resolved = if let Some(kind) = request.explicit_type {
        pick(kind)
    } else if chat_text(request.payload).is_some() {
        pick(TriggerKind::Chat)
    } else if analyzed.has_webhook {
        pick(TriggerKind::Webhook)
    } else if analyzed.has_manual {
        pick(TriggerKind::Manual)
    } else {
        ResolvedTrigger {
            kind: TriggerKind::Unknown,
            node: None,
        }
    };

    tracing::debug!(
        workflow_id = %analyzed.workflow_id,
        explicit = ?request.explicit_type,
        kind = %resolved.kind,
        node_id = ?resolved.node.as_ref().map(|n| n.node_id.as_str()),
        "resolved trigger"
    );

    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::analyze;
    use crate::definition::{Node, Workflow};
    use serde_json::json;

    fn chat_node() -> Node {
        Node::new("c", "Chat", "@n8n/n8n-nodes-langchain.chatTrigger").with_webhook_id("chat-1")
    }

    fn webhook_node() -> Node {
        Node::new("w", "Webhook", "n8n-nodes-base.webhook").with_webhook_id("hook-1")
    }

    fn manual_node() -> Node {
        Node::new("m", "Manual", "n8n-nodes-base.manualTrigger")
    }

    #[test]
    fn explicit_chat_without_chat_trigger_is_not_downgraded() {
        let workflow = Workflow::new("wf", "No chat")
            .with_node(webhook_node())
            .with_node(manual_node());
        let analyzed = analyze(&workflow);
        let payload = json!({});

        let resolved = resolve(
            &analyzed,
            &TriggerRequest::new(&payload).with_type(TriggerKind::Chat),
        );
        assert_eq!(resolved.kind, TriggerKind::Chat);
        assert!(resolved.node.is_none());
    }

    #[test]
    fn explicit_node_id_is_preferred() {
        let second = Node::new("w2", "Second", "n8n-nodes-base.webhook").with_webhook_id("hook-2");
        let workflow = Workflow::new("wf", "Two hooks")
            .with_node(webhook_node())
            .with_node(second);
        let analyzed = analyze(&workflow);
        let payload = json!({});
        let node_id = NodeId::new("w2");

        let resolved = resolve(
            &analyzed,
            &TriggerRequest::new(&payload)
                .with_type(TriggerKind::Webhook)
                .with_node_id(&node_id),
        );
        assert_eq!(resolved.kind, TriggerKind::Webhook);
        assert_eq!(
            resolved.node.and_then(|n| n.webhook_id),
            Some("hook-2".to_string())
        );
    }

    #[test]
    fn message_payload_resolves_to_chat() {
        let workflow = Workflow::new("wf", "Everything")
            .with_node(webhook_node())
            .with_node(manual_node())
            .with_node(chat_node());
        let analyzed = analyze(&workflow);
        let payload = json!({ "message": "hello" });

        let resolved = resolve(&analyzed, &TriggerRequest::new(&payload));
        assert_eq!(resolved.kind, TriggerKind::Chat);
        assert_eq!(
            resolved.node.map(|n| n.node_id),
            Some(NodeId::new("c"))
        );
    }

    #[test]
    fn chat_input_and_text_also_infer_chat() {
        let analyzed = analyze(&Workflow::new("wf", "Chat").with_node(chat_node()));
        for payload in [json!({ "text": "hi" }), json!({ "chatInput": "hi" })] {
            let resolved = resolve(&analyzed, &TriggerRequest::new(&payload));
            assert_eq!(resolved.kind, TriggerKind::Chat);
        }
    }

    #[test]
    fn blank_or_non_string_text_is_ignored() {
        let analyzed = analyze(
            &Workflow::new("wf", "Hook")
                .with_node(webhook_node())
                .with_node(chat_node()),
        );
        for payload in [json!({ "message": "   " }), json!({ "text": 42 })] {
            let resolved = resolve(&analyzed, &TriggerRequest::new(&payload));
            assert_eq!(resolved.kind, TriggerKind::Webhook);
        }
    }

    #[test]
    fn empty_payload_prefers_webhook_over_manual() {
        let workflow = Workflow::new("wf", "Both")
            .with_node(manual_node())
            .with_node(webhook_node());
        let analyzed = analyze(&workflow);
        let payload = json!({});

        let resolved = resolve(&analyzed, &TriggerRequest::new(&payload));
        assert_eq!(resolved.kind, TriggerKind::Webhook);
    }

    #[test]
    fn manual_when_no_webhook() {
        let analyzed = analyze(&Workflow::new("wf", "Manual").with_node(manual_node()));
        let payload = json!({ "orderId": 12 });

        let resolved = resolve(&analyzed, &TriggerRequest::new(&payload));
        assert_eq!(resolved.kind, TriggerKind::Manual);
        assert!(resolved.node.is_some());
    }

    #[test]
    fn unknown_when_nothing_callable() {
        let workflow = Workflow::new("wf", "Scheduled").with_node(Node::new(
            "s",
            "Every hour",
            "n8n-nodes-base.scheduleTrigger",
        ));
        let analyzed = analyze(&workflow);
        let payload = json!({});

        let resolved = resolve(&analyzed, &TriggerRequest::new(&payload));
        assert_eq!(resolved.kind, TriggerKind::Unknown);
        assert!(resolved.node.is_none());
    }

    #[test]
    fn chat_text_lookup_order() {
        let payload = json!({ "chatInput": "third", "text": "second", "message": "first" });
        assert_eq!(chat_text(&payload), Some("first"));
        assert_eq!(chat_text(&json!(["message"])), None);
    }
}
