use thiserror::Error;

use crate::validator::ValidationError;

/// Top-level error type for the navigator-core library.
///
/// Most of these never escape [`crate::navigator::Navigator`] — the
/// navigation operations catch them at the boundary and fold them into the
/// response's `error` field instead, per the propagation policy in
/// `SPEC_FULL.md` §7. They remain a real `std::error::Error` type so that
/// the store, validator, and task-file layers can use `?` internally, and so
/// callers outside the navigation boundary (catalog loading) get a normal
/// `Result`.
#[derive(Debug, Error)]
pub enum NavigatorError {
    /// `Get(id)` found no workflow with that id.
    #[error("workflow not found: {workflow_type}")]
    WorkflowNotFound { workflow_type: String },

    /// The referenced node id is not present in the workflow.
    #[error("step '{step}' not found in workflow '{workflow_type}'")]
    StepNotFound {
        workflow_type: String,
        step: String,
    },

    /// `Next` was called at a node with no outgoing edges.
    #[error("no outgoing edges from step '{step}'")]
    NoOutgoingEdges { step: String },

    /// `Next` was called with a result that matches no edge.
    #[error("no edge matches result '{result}' from step '{step}'")]
    NoMatchingEdge { step: String, result: String },

    /// The task file could not be read from disk.
    #[error("task file unreadable at '{path}': {source}")]
    TaskFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The task file exists but is not valid JSON, or doesn't match the
    /// expected task shape.
    #[error("task file invalid at '{path}': {source}")]
    TaskFileInvalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// A workflow definition file (catalog or external) could not be read
    /// from disk. Distinct from `TaskFileUnreadable`: this is a §6.3
    /// definition-file concern, not a §6.4 task-file one.
    #[error("workflow definition unreadable at '{path}': {source}")]
    WorkflowDefinitionUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A workflow definition file exists but is not valid JSON, or doesn't
    /// match the expected definition shape.
    #[error("workflow definition invalid at '{path}': {source}")]
    WorkflowDefinitionInvalid {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    /// The task file parsed but lacks `metadata.workflowType` or
    /// `metadata.currentStep`.
    #[error("task '{path}' has no workflow metadata")]
    MissingWorkflowMetadata { path: String },

    /// A required input was not supplied (e.g. `Next` without `result`).
    #[error("missing required input: {field}")]
    MissingInput { field: String },

    /// Rejected during `Load`.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Wraps `std::io::Error` for catalog-directory and generic I/O paths.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl NavigatorError {
    /// Stable machine-readable tag matching the §7 error taxonomy, used to
    /// populate a response's `error.kind` without string-matching the
    /// display message.
    pub fn kind(&self) -> &'static str {
        match self {
            NavigatorError::WorkflowNotFound { .. } => "workflow_not_found",
            NavigatorError::StepNotFound { .. } => "step_not_found",
            NavigatorError::NoOutgoingEdges { .. } => "no_outgoing_edges",
            NavigatorError::NoMatchingEdge { .. } => "no_matching_edge",
            NavigatorError::TaskFileUnreadable { .. } => "task_file_unreadable",
            NavigatorError::TaskFileInvalid { .. } => "task_file_unreadable",
            NavigatorError::WorkflowDefinitionUnreadable { .. } => {
                "workflow_definition_unreadable"
            }
            NavigatorError::WorkflowDefinitionInvalid { .. } => "workflow_definition_unreadable",
            NavigatorError::MissingWorkflowMetadata { .. } => "missing_workflow_metadata",
            NavigatorError::MissingInput { .. } => "missing_input",
            NavigatorError::Validation(_) => "validation_failure",
            NavigatorError::Io(_) => "task_file_unreadable",
        }
    }
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, NavigatorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = NavigatorError::WorkflowNotFound {
            workflow_type: "bug-fix".into(),
        };
        assert_eq!(err.to_string(), "workflow not found: bug-fix");
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "not found");
        let nav_err: NavigatorError = io_err.into();
        assert!(matches!(nav_err, NavigatorError::Io(_)));
        assert_eq!(nav_err.kind(), "task_file_unreadable");
    }

    #[test]
    fn kind_is_stable_per_variant() {
        let err = NavigatorError::NoMatchingEdge {
            step: "verify_fix".into(),
            result: "retried".into(),
        };
        assert_eq!(err.kind(), "no_matching_edge");
    }

    #[test]
    fn workflow_definition_errors_are_distinct_from_task_file_errors() {
        let unreadable = NavigatorError::WorkflowDefinitionUnreadable {
            path: "catalog/bug-fix.json".into(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(unreadable.kind(), "workflow_definition_unreadable");
        assert!(unreadable.to_string().contains("workflow definition unreadable"));

        let invalid = NavigatorError::WorkflowDefinitionInvalid {
            path: "catalog/bug-fix.json".into(),
            source: serde_json::from_str::<serde_json::Value>("{ not json").unwrap_err(),
        };
        assert_eq!(invalid.kind(), "workflow_definition_unreadable");
        assert!(invalid.to_string().contains("workflow definition invalid"));
    }
}
