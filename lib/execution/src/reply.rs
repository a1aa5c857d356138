//! Reply text extraction.
//!
//! Workflows put their answer wherever their author chose, so finding the
//! reply in node output is a heuristic. The heuristic is a strategy object
//! so the polling logic does not care how text is found.

use flowbridge_workflow::ExecutionRecord;
use serde_json::Value as JsonValue;

/// Default candidate fields, in priority order.
pub const DEFAULT_REPLY_FIELDS: [&str; 4] = ["response", "text", "message", "output"];

/// Bodies the engine sends when it acknowledges a webhook without waiting
/// for the workflow. They are not replies.
const ENGINE_ACKNOWLEDGEMENTS: [&str; 1] = ["Workflow was started"];

/// Finds reply text in a JSON value.
pub trait ReplyExtractor: Send + Sync {
    /// Returns the reply text carried by `value`, if any.
    fn extract(&self, value: &JsonValue) -> Option<String>;
}

/// Looks for the first non-empty string under a fixed list of keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldReplyExtractor {
    fields: Vec<String>,
}

impl FieldReplyExtractor {
    /// Creates an extractor over custom fields.
    #[must_use]
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl Default for FieldReplyExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_REPLY_FIELDS)
    }
}

impl ReplyExtractor for FieldReplyExtractor {
    fn extract(&self, value: &JsonValue) -> Option<String> {
        match value {
            JsonValue::Object(map) => self.fields.iter().find_map(|field| {
                map.get(field)
                    .and_then(JsonValue::as_str)
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
            }),
            JsonValue::Array(items) => items.iter().find_map(|item| self.extract(item)),
            _ => None,
        }
    }
}

/// Extracts a reply from a webhook response body, ignoring engine
/// acknowledgements.
pub(crate) fn immediate_reply(extractor: &dyn ReplyExtractor, body: &JsonValue) -> Option<String> {
    extractor
        .extract(body)
        .filter(|text| !ENGINE_ACKNOWLEDGEMENTS.contains(&text.as_str()))
}

/// Scans an execution's node outputs in order, skipping the trigger node
/// whose output echoes the inbound message.
pub(crate) fn reply_in_execution(
    extractor: &dyn ReplyExtractor,
    execution: &ExecutionRecord,
    trigger_node_name: &str,
) -> Option<String> {
    execution
        .outputs()
        .into_iter()
        .filter(|output| output.node_name != trigger_node_name)
        .find_map(|output| extractor.extract(output.json))
}
