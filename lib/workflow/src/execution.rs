//! Execution records.
//!
//! An execution is the automation engine's log of one workflow run. We only
//! ever read them: they are listed most-recent-first for history display and
//! polled for chat replies.
//!
//! Per-node output lives under `data.resultData.runData`, keyed by node
//! name. Each node maps to a list of task runs; a task run either carries a
//! `json` object directly or nests items as `data.main[output][item].json`.

use chrono::{DateTime, Utc};
use flowbridge_core::{ExecutionId, WorkflowId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// Status of an execution as reported by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Created, not yet started.
    New,
    /// Currently executing.
    Running,
    /// Paused on a wait node.
    Waiting,
    /// Finished successfully.
    Success,
    /// Finished with an error.
    Error,
    /// Stopped by a user.
    Canceled,
    /// The worker died mid-run.
    Crashed,
    /// Any status this version does not know.
    #[default]
    #[serde(other)]
    Unknown,
}

impl ExecutionStatus {
    /// Returns true if this is a terminal state.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Success | Self::Error | Self::Canceled | Self::Crashed
        )
    }
}

/// One run of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRecord {
    /// Engine-assigned execution ID.
    pub id: ExecutionId,
    /// The workflow that ran.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow_id: Option<WorkflowId>,
    /// Reported status.
    #[serde(default)]
    pub status: ExecutionStatus,
    /// Legacy completion flag.
    #[serde(default)]
    pub finished: bool,
    /// How the run was started (`webhook`, `manual`, `trigger`, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    /// When the run started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// When the run stopped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stopped_at: Option<DateTime<Utc>>,
    /// Run data, present only on detail fetches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<ExecutionData>,
}

/// Detail payload of an execution.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionData {
    /// Result section.
    #[serde(default)]
    pub result_data: ResultData,
}

/// Result section of an execution's detail payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultData {
    /// Task runs keyed by node name, in execution order.
    #[serde(default)]
    pub run_data: Map<String, JsonValue>,
}

/// A single `json` output item produced by a node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeOutput<'a> {
    /// Name of the producing node.
    pub node_name: &'a str,
    /// The item's `json` object.
    pub json: &'a JsonValue,
}

impl ExecutionRecord {
    /// Creates a record with no run data.
    #[must_use]
    pub fn new(id: impl Into<ExecutionId>, status: ExecutionStatus) -> Self {
        Self {
            id: id.into(),
            workflow_id: None,
            status,
            finished: status.is_terminal(),
            mode: None,
            started_at: None,
            stopped_at: None,
            data: None,
        }
    }

    /// Attaches run data, replacing any existing data.
    #[must_use]
    pub fn with_run_data(mut self, run_data: Map<String, JsonValue>) -> Self {
        self.data = Some(ExecutionData {
            result_data: ResultData { run_data },
        });
        self
    }

    /// Returns true once the run can no longer produce output.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        match self.status {
            ExecutionStatus::Unknown => self.finished || self.stopped_at.is_some(),
            status => status.is_terminal(),
        }
    }

    /// Returns true while the run is still in progress.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns the run data, if this record was fetched with details.
    #[must_use]
    pub fn run_data(&self) -> Option<&Map<String, JsonValue>> {
        self.data.as_ref().map(|d| &d.result_data.run_data)
    }

    /// Flattens all node output items in execution order.
    #[must_use]
    pub fn outputs(&self) -> Vec<NodeOutput<'_>> {
        let mut outputs = Vec::new();
        let Some(run_data) = self.run_data() else {
            return outputs;
        };

        for (node_name, runs) in run_data {
            let Some(runs) = runs.as_array() else {
                continue;
            };
            for run in runs {
                collect_items(node_name, run, &mut outputs);
            }
        }
        outputs
    }

    /// Returns true if any string anywhere in the run data equals `needle`.
    #[must_use]
    pub fn echoes(&self, needle: &str) -> bool {
        self.run_data()
            .is_some_and(|run_data| run_data.values().any(|v| contains_string(v, needle)))
    }
}

fn collect_items<'a>(node_name: &'a str, run: &'a JsonValue, out: &mut Vec<NodeOutput<'a>>) {
    if let Some(json) = run.get("json") {
        out.push(NodeOutput { node_name, json });
        return;
    }

    let Some(main) = run
        .get("data")
        .and_then(|d| d.get("main"))
        .and_then(JsonValue::as_array)
    else {
        return;
    };

    for branch in main.iter().filter_map(JsonValue::as_array) {
        for item in branch {
            if let Some(json) = item.get("json") {
                out.push(NodeOutput { node_name, json });
            }
        }
    }
}

fn contains_string(value: &JsonValue, needle: &str) -> bool {
    match value {
        JsonValue::String(s) => s == needle,
        JsonValue::Array(items) => items.iter().any(|v| contains_string(v, needle)),
        JsonValue::Object(map) => map.values().any(|v| contains_string(v, needle)),
        _ => false,
    }
}
