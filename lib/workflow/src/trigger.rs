//! Trigger classification.
//!
//! Triggers are nodes in the workflow graph that serve as entry points.
//! The engine identifies node kinds only by an open-ended dotted type
//! string, so classification is an ordered list of independent rules:
//! the first rule whose matcher accepts a node's type decides its kind.
//! Nodes that no rule accepts are not triggers.

use crate::definition::Node;
use flowbridge_core::NodeId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// JSON key a chat trigger reads the user's message from when the node
/// does not configure one.
pub const DEFAULT_PROMPT_FIELD: &str = "chatInput";

/// Node parameters that may name the chat prompt field, in priority order.
const PROMPT_FIELD_PARAMETERS: [&str; 3] = ["promptField", "prompt", "promptVariable"];

const CHAT_TRIGGER_TYPE: &str = "@n8n/n8n-nodes-langchain.chatTrigger";
const WEBHOOK_TYPE: &str = "n8n-nodes-base.webhook";
const MANUAL_TRIGGER_TYPE: &str = "n8n-nodes-base.manualTrigger";
const SCHEDULE_TRIGGER_TYPES: [&str; 2] = ["n8n-nodes-base.scheduleTrigger", "n8n-nodes-base.cron"];

/// The kind of a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerKind {
    /// Conversational entry point answering over HTTP.
    Chat,
    /// Generic HTTP webhook.
    Webhook,
    /// Telegram bot session.
    Telegram,
    /// Slack app event.
    Slack,
    /// Discord bot event.
    Discord,
    /// WhatsApp business event.
    Whatsapp,
    /// Incoming email.
    Email,
    /// User-initiated run from the engine.
    Manual,
    /// Time-based schedule.
    Cron,
    /// Anything else.
    Unknown,
}

impl TriggerKind {
    /// Returns the wire name of this kind.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Webhook => "webhook",
            Self::Telegram => "telegram",
            Self::Slack => "slack",
            Self::Discord => "discord",
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
            Self::Manual => "manual",
            Self::Cron => "cron",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggerKind {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "chat" => Self::Chat,
            "webhook" => Self::Webhook,
            "telegram" => Self::Telegram,
            "slack" => Self::Slack,
            "discord" => Self::Discord,
            "whatsapp" => Self::Whatsapp,
            "email" => Self::Email,
            "manual" => Self::Manual,
            "cron" => Self::Cron,
            _ => Self::Unknown,
        })
    }
}

/// A node recognized as a workflow entry point.
///
/// Built fresh on every analysis and never patched afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerInfo {
    /// The trigger node.
    pub node_id: NodeId,
    /// The trigger node's display name.
    pub node_name: String,
    /// Classified kind.
    pub kind: TriggerKind,
    /// Webhook path segment, when the node receives HTTP calls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_id: Option<String>,
    /// Whether anyone may call the trigger's URL directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_public: Option<bool>,
    /// Whether the trigger is driven by a third-party client session
    /// rather than a directly callable URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requires_external_client: Option<bool>,
    /// JSON key the outbound chat message must be sent under.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt_field: Option<String>,
}

impl TriggerInfo {
    /// Returns the path segment used to address this trigger's webhook.
    #[must_use]
    pub fn webhook_path(&self) -> Option<&str> {
        self.webhook_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Returns the prompt field, falling back to [`DEFAULT_PROMPT_FIELD`].
    #[must_use]
    pub fn prompt_field_or_default(&self) -> &str {
        self.prompt_field.as_deref().unwrap_or(DEFAULT_PROMPT_FIELD)
    }
}

/// How a rule recognizes an engine node type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeMatcher {
    /// The type equals one of these strings exactly.
    Exact(Vec<String>),
    /// The lowercased type contains one of these lowercase fragments.
    Contains(Vec<String>),
}

impl TypeMatcher {
    /// Exact match against the given types.
    #[must_use]
    pub fn exact<I, S>(types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Exact(types.into_iter().map(Into::into).collect())
    }

    /// Case-insensitive substring match against the given fragments.
    #[must_use]
    pub fn contains<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Contains(
            fragments
                .into_iter()
                .map(|f| f.into().to_ascii_lowercase())
                .collect(),
        )
    }

    /// Returns true if the node type matches.
    #[must_use]
    pub fn matches(&self, node_type: &str) -> bool {
        match self {
            Self::Exact(types) => types.iter().any(|t| t == node_type),
            Self::Contains(fragments) => {
                let lowered = node_type.to_ascii_lowercase();
                fragments.iter().any(|f| lowered.contains(f.as_str()))
            }
        }
    }
}

/// How a trigger of a given rule can be reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAccess {
    /// Chat endpoint; public when the node's `public` parameter is set.
    Chat,
    /// Directly callable public URL.
    PublicUrl,
    /// Driven by a third-party bot or mailbox session.
    ExternalClient,
    /// Only startable from inside the engine.
    Internal,
}

/// One classification rule: a matcher and the kind it assigns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerRule {
    /// Kind assigned on match.
    pub kind: TriggerKind,
    /// Node type matcher.
    pub matcher: TypeMatcher,
    /// Reachability of matched triggers.
    pub access: TriggerAccess,
}

impl TriggerRule {
    /// Creates a rule.
    #[must_use]
    pub fn new(kind: TriggerKind, matcher: TypeMatcher, access: TriggerAccess) -> Self {
        Self {
            kind,
            matcher,
            access,
        }
    }

    fn build(&self, node: &Node) -> TriggerInfo {
        let (is_public, requires_external_client) = match self.access {
            TriggerAccess::Chat => (Some(node.bool_parameter("public").unwrap_or(false)), Some(false)),
            TriggerAccess::PublicUrl => (Some(true), Some(false)),
            TriggerAccess::ExternalClient => (Some(false), Some(true)),
            TriggerAccess::Internal => (None, None),
        };

        let prompt_field = (self.kind == TriggerKind::Chat).then(|| {
            PROMPT_FIELD_PARAMETERS
                .iter()
                .find_map(|key| node.string_parameter(key))
                .unwrap_or(DEFAULT_PROMPT_FIELD)
                .to_string()
        });

        let webhook_id = node
            .webhook_id
            .clone()
            .filter(|id| !id.is_empty())
            .or_else(|| node.string_parameter("path").map(str::to_string));

        TriggerInfo {
            node_id: node.id.clone(),
            node_name: node.name.clone(),
            kind: self.kind,
            webhook_id,
            is_public,
            requires_external_client,
            prompt_field,
        }
    }
}

/// Ordered rule set mapping node types to trigger kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TriggerClassifier {
    rules: Vec<TriggerRule>,
}

impl TriggerClassifier {
    /// Creates a classifier with no rules.
    #[must_use]
    pub fn empty() -> Self {
        Self { rules: Vec::new() }
    }

    /// Appends a rule. Earlier rules take priority.
    #[must_use]
    pub fn with_rule(mut self, rule: TriggerRule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Returns the rules in priority order.
    #[must_use]
    pub fn rules(&self) -> &[TriggerRule] {
        &self.rules
    }

    /// Classifies a node, returning `None` if it is not a trigger.
    #[must_use]
    pub fn classify(&self, node: &Node) -> Option<TriggerInfo> {
        if node.disabled {
            return None;
        }
        self.rules
            .iter()
            .find(|rule| rule.matcher.matches(&node.node_type))
            .map(|rule| rule.build(node))
    }
}

impl Default for TriggerClassifier {
    fn default() -> Self {
        use TriggerAccess::{Chat, ExternalClient, Internal, PublicUrl};

        Self::empty()
            .with_rule(TriggerRule::new(
                TriggerKind::Chat,
                TypeMatcher::exact([CHAT_TRIGGER_TYPE]),
                Chat,
            ))
            .with_rule(TriggerRule::new(
                TriggerKind::Webhook,
                TypeMatcher::exact([WEBHOOK_TYPE]),
                PublicUrl,
            ))
            .with_rule(TriggerRule::new(
                TriggerKind::Telegram,
                TypeMatcher::contains(["telegramtrigger"]),
                ExternalClient,
            ))
            .with_rule(TriggerRule::new(
                TriggerKind::Slack,
                TypeMatcher::contains(["slacktrigger"]),
                ExternalClient,
            ))
            .with_rule(TriggerRule::new(
                TriggerKind::Discord,
                TypeMatcher::contains(["discordtrigger"]),
                ExternalClient,
            ))
            .with_rule(TriggerRule::new(
                TriggerKind::Whatsapp,
                TypeMatcher::contains(["whatsapptrigger"]),
                ExternalClient,
            ))
            .with_rule(TriggerRule::new(
                TriggerKind::Email,
                TypeMatcher::contains([
                    "emailreadimap",
                    "emailtrigger",
                    "gmailtrigger",
                    "microsoftoutlooktrigger",
                ]),
                ExternalClient,
            ))
            .with_rule(TriggerRule::new(
                TriggerKind::Manual,
                TypeMatcher::exact([MANUAL_TRIGGER_TYPE]),
                Internal,
            ))
            .with_rule(TriggerRule::new(
                TriggerKind::Cron,
                TypeMatcher::exact(SCHEDULE_TRIGGER_TYPES),
                Internal,
            ))
    }
}
