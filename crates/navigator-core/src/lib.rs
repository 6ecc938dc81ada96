pub mod config;
pub mod engine;
pub mod error;
pub mod loader;
pub mod model;
pub mod navigator;
pub mod store;
pub mod task_file;
pub mod validator;

pub use error::{NavigatorError, Result};
pub use model::{
    Edge, EndResult, EndSpec, Escalation, ForkSpec, JoinSpec, JoinStrategy, NodeKind, Stage,
    StepResult, SubflowSpec, TaskFileContents, TaskMetadata, TaskStatus, WorkItem,
    WorkflowDefinition, WorkflowSource,
};
pub use navigator::{
    CurrentInput, NavigationResponse, Navigator, NextInput, StartInput, Terminal,
};
pub use store::{StoreFilter, WorkflowStore, WorkflowSummary};

use tracing::info;

/// Initialise a default tracing subscriber for the library consumer.
///
/// Call this once at program start. Uses `RUST_LOG` env var for filtering,
/// defaulting to `info` level.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    fmt().with_env_filter(filter).init();

    info!("navigator tracing initialised");
}
