//! Task file I/O: the only place in this crate that touches task state on
//! disk (spec.md §4.4, §6.4, §9 "Task file as state store").
//!
//! Writes are composed fully in memory and applied atomically — write to a
//! sibling `<name>.tmp` path, then rename over the original — so a crash
//! mid-write never leaves a torn file. This specific shape is grounded on
//! the workflow-state-store pattern in the retrieval pack (`persist()`
//! writing `<file>.tmp` then `fs::rename`), not on the teacher's manifest
//! writer, which only does a plain `fs::write`.

use std::path::{Path, PathBuf};

use serde_json::Value;

use crate::error::{NavigatorError, Result};
use crate::model::{PartialTaskMetadata, TaskFileContents};

/// Expand a leading `~/` to the process user's home directory (spec.md §6.4).
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

/// Read and fully parse a task file.
pub async fn read(path: &Path) -> Result<TaskFileContents> {
    let data = read_raw(path).await?;
    serde_json::from_str(&data).map_err(|source| NavigatorError::TaskFileInvalid {
        path: path.display().to_string(),
        source,
    })
}

/// Read just enough of a task file to check for workflow metadata, without
/// requiring the full `TaskFileContents` shape to validate (so a file
/// missing `workflowType`/`currentStep` gets the precise §7 error instead of
/// a generic parse failure).
pub async fn read_metadata(path: &Path) -> Result<PartialTaskMetadata> {
    let data = read_raw(path).await?;
    let value: Value = serde_json::from_str(&data).map_err(|source| {
        NavigatorError::TaskFileInvalid {
            path: path.display().to_string(),
            source,
        }
    })?;

    let metadata = value.get("metadata").cloned().unwrap_or(Value::Null);
    let partial: PartialTaskMetadata =
        serde_json::from_value(metadata).map_err(|source| NavigatorError::TaskFileInvalid {
            path: path.display().to_string(),
            source,
        })?;

    if partial.workflow_type.is_none() || partial.current_step.is_none() {
        return Err(NavigatorError::MissingWorkflowMetadata {
            path: path.display().to_string(),
        });
    }

    Ok(partial)
}

async fn read_raw(path: &Path) -> Result<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|source| NavigatorError::TaskFileUnreadable {
            path: path.display().to_string(),
            source,
        })
}

/// Atomically write the full task file contents.
pub async fn write(path: &Path, contents: &TaskFileContents) -> Result<()> {
    let json = serde_json::to_string_pretty(contents).map_err(|source| {
        NavigatorError::TaskFileInvalid {
            path: path.display().to_string(),
            source,
        }
    })?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(NavigatorError::Io)?;
        }
    }

    let tmp_path = tmp_sibling(path);
    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(NavigatorError::Io)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(NavigatorError::Io)?;

    Ok(())
}

fn tmp_sibling(path: &Path) -> PathBuf {
    let tmp_name = format!(
        "{}.tmp",
        path.file_name().and_then(|n| n.to_str()).unwrap_or("task")
    );
    path.with_file_name(tmp_name)
}
