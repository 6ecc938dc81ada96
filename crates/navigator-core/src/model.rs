//! Workflow definition and task data model (spec.md §3).
//!
//! Nodes are a tagged-variant representation: a `type` discriminator with
//! variant-specific fields, matching the "Polymorphic nodes" design note —
//! `task` and `gate` share a shape (`WorkItem`) since they differ only in
//! semantics, not structure.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// A named directed graph, immutable once loaded.
///
/// This is the pure, file-parsed shape. Provenance (`source`,
/// `source_root`) is tracked separately by the [`crate::store::WorkflowStore`]
/// because it is assigned at load time, not carried in the definition file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    pub nodes: HashMap<String, NodeKind>,
    pub edges: Vec<Edge>,
}

impl WorkflowDefinition {
    pub fn node(&self, id: &str) -> Option<&NodeKind> {
        self.nodes.get(id)
    }

    /// The single `start` node's id, if exactly one exists.
    ///
    /// Validity (uniqueness) is enforced by the validator at load time; this
    /// is a lookup, not a check.
    pub fn start_node_id(&self) -> Option<&str> {
        self.nodes
            .iter()
            .find(|(_, node)| matches!(node, NodeKind::Start))
            .map(|(id, _)| id.as_str())
    }
}

/// Where a loaded workflow definition came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowSource {
    Catalog,
    Project,
    External,
}

/// A vertex in the workflow graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeKind {
    /// Entry point. Exactly one per workflow.
    Start,
    /// A work unit.
    Task(WorkItem),
    /// A checkpoint; same shape as `Task`.
    Gate(WorkItem),
    /// Fan-out to parallel branches.
    Fork(ForkSpec),
    /// Fan-in collecting a fork's branches.
    Join(JoinSpec),
    /// Terminal node.
    End(EndSpec),
    /// Connector to another workflow. Recognized but peripheral: the
    /// transition engine treats it as an ordinary non-terminal node.
    Subflow(SubflowSpec),
}

impl NodeKind {
    pub fn is_end(&self) -> bool {
        matches!(self, NodeKind::End(_))
    }

    pub fn is_start(&self) -> bool {
        matches!(self, NodeKind::Start)
    }

    /// Display name, where the variant carries one.
    pub fn name(&self) -> Option<&str> {
        match self {
            NodeKind::Task(w) | NodeKind::Gate(w) => Some(w.name.as_str()),
            _ => None,
        }
    }

    pub fn max_retries(&self) -> u32 {
        match self {
            NodeKind::Task(w) | NodeKind::Gate(w) => w.max_retries,
            _ => 0,
        }
    }

    /// The type discriminator as it appears on the wire (`"task"`, `"fork"`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            NodeKind::Start => "start",
            NodeKind::Task(_) => "task",
            NodeKind::Gate(_) => "gate",
            NodeKind::Fork(_) => "fork",
            NodeKind::Join(_) => "join",
            NodeKind::End(_) => "end",
            NodeKind::Subflow(_) => "subflow",
        }
    }
}

/// Shared shape for `task` and `gate` nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkItem {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub instructions: Option<String>,
    #[serde(default)]
    pub agent: Option<String>,
    #[serde(default)]
    pub stage: Option<Stage>,
    #[serde(default)]
    pub max_retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Planning,
    Development,
    Verification,
    Delivery,
    Investigation,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkSpec {
    pub join: String,
    #[serde(default)]
    pub max_concurrency: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JoinSpec {
    pub fork: String,
    #[serde(default)]
    pub strategy: JoinStrategy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum JoinStrategy {
    AllPass,
    AnyPass,
}

impl Default for JoinStrategy {
    fn default() -> Self {
        JoinStrategy::AllPass
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndSpec {
    pub result: EndResult,
    #[serde(default)]
    pub escalation: Option<Escalation>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndResult {
    Success,
    Failure,
    Blocked,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    Hitl,
    Alert,
    Ticket,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubflowSpec {
    pub workflow_id: String,
}

/// A directed transition between two nodes, optionally conditioned on an
/// outcome label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub from: String,
    pub to: String,
    #[serde(default)]
    pub on: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
}

impl Edge {
    pub fn is_unconditional(&self) -> bool {
        self.on.is_none()
    }
}

// ---------------------------------------------------------------------------
// Task state (spec.md §3 "Task")
// ---------------------------------------------------------------------------

/// Outcome a node result, or the caller's vote at a join.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepResult {
    Passed,
    Failed,
}

impl StepResult {
    pub fn as_str(&self) -> &'static str {
        match self {
            StepResult::Passed => "passed",
            StepResult::Failed => "failed",
        }
    }
}

/// Status of a task's overall lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

/// Persistent record of a single workflow execution, as stored in a task
/// file. Fields outside `metadata` that the core doesn't understand are
/// preserved via `extra` so a round-trip write never drops caller data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskFileContents {
    pub id: String,
    pub subject: String,
    #[serde(rename = "activeForm")]
    pub active_form: String,
    pub status: TaskStatus,
    pub metadata: TaskMetadata,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The `metadata` object inside a task file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskMetadata {
    pub workflow_type: String,
    pub current_step: String,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default)]
    pub user_description: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Optional metadata partial accepted by the metadata reader when the task
/// file may not yet have workflow fields (used to give a precise
/// "no workflow metadata" error rather than a generic parse failure).
#[derive(Debug, Clone, Deserialize)]
pub struct PartialTaskMetadata {
    #[serde(default, rename = "workflowType")]
    pub workflow_type: Option<String>,
    #[serde(default, rename = "currentStep")]
    pub current_step: Option<String>,
    #[serde(default, rename = "retryCount")]
    pub retry_count: u32,
    #[serde(default, rename = "userDescription")]
    pub user_description: Option<String>,
}

pub(crate) fn source_root_join(source_root: Option<&PathBuf>, raw: &str) -> String {
    if let Some(rest) = raw.strip_prefix("./") {
        if let Some(root) = source_root {
            return root.join(rest).display().to_string();
        }
    }
    raw.to_string()
}
