//! Catalog loading: `LoadWorkflows(path, sourceRoot?, workflowIds?)`
//! (spec.md §6.2).
//!
//! Walks a directory of `*.json` workflow definition files and admits each
//! into the [`crate::store::WorkflowStore`]. A missing directory is not an
//! error — it yields zero workflows, the same posture as
//! `config::load_config` treating a missing file as "use defaults". Bad
//! entries are skipped and reported rather than aborting the whole scan,
//! mirroring `artifact::retention::cleanup`'s per-entry error handling.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{NavigatorError, Result};
use crate::model::{WorkflowDefinition, WorkflowSource};
use crate::store::WorkflowStore;

/// One file in the catalog directory that failed to load, with the reason.
#[derive(Debug, Clone)]
pub struct LoadFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Outcome of a catalog scan: how many workflows were admitted, and which
/// files (if any) were skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub failures: Vec<LoadFailure>,
}

/// `LoadWorkflows`: scan `path` for `*.json` workflow definitions and admit
/// each into `store` under [`WorkflowSource::Catalog`].
///
/// `source_root` overrides the directory each definition's `./`-relative
/// references resolve against; when absent, each file's own containing
/// directory is used (so a flat catalog directory works without any
/// override). `workflow_ids`, when given, restricts admission to only the
/// named ids — every other file in `path` is skipped without being parsed.
///
/// Files are sorted by name so catalog ordering is deterministic across runs.
pub async fn load_workflows(
    store: &WorkflowStore,
    path: &Path,
    source_root: Option<&Path>,
    workflow_ids: Option<&[String]>,
) -> Result<LoadReport> {
    if !path.exists() {
        debug!(path = %path.display(), "catalog directory not found, nothing to load");
        return Ok(LoadReport::default());
    }

    let mut entries = tokio::fs::read_dir(path).await.map_err(NavigatorError::Io)?;
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(NavigatorError::Io)? {
        let entry_path = entry.path();
        if entry_path.extension().and_then(|e| e.to_str()) == Some("json") {
            paths.push(entry_path);
        }
    }
    paths.sort();

    let wanted: Option<HashSet<&str>> =
        workflow_ids.map(|ids| ids.iter().map(String::as_str).collect());

    let mut report = LoadReport::default();
    for file_path in paths {
        match load_one(store, &file_path, source_root, wanted.as_ref()).await {
            Ok(Some(id)) => report.loaded.push(id),
            Ok(None) => {} // filtered out by workflow_ids, not a failure
            Err(e) => {
                warn!(path = %file_path.display(), error = %e, "skipping unloadable catalog entry");
                report.failures.push(LoadFailure {
                    path: file_path,
                    error: e.to_string(),
                });
            }
        }
    }

    info!(
        loaded = report.loaded.len(),
        failed = report.failures.len(),
        dir = %path.display(),
        "catalog scan complete"
    );

    Ok(report)
}

/// Load a single external workflow definition file at an arbitrary path,
/// admitting it under [`WorkflowSource::External`] with its containing
/// directory recorded as the source root for `./`-relative references.
pub async fn load_external(store: &WorkflowStore, path: &Path) -> Result<String> {
    let definition = read_definition(path).await?;
    let id = definition.id.clone();
    let source_root = path.parent().map(Path::to_path_buf);
    store.load(definition, WorkflowSource::External, source_root)?;
    Ok(id)
}

async fn load_one(
    store: &WorkflowStore,
    path: &Path,
    source_root_override: Option<&Path>,
    wanted: Option<&HashSet<&str>>,
) -> Result<Option<String>> {
    let definition = read_definition(path).await?;

    if let Some(wanted) = wanted {
        if !wanted.contains(definition.id.as_str()) {
            return Ok(None);
        }
    }

    let id = definition.id.clone();
    let source_root = source_root_override
        .map(Path::to_path_buf)
        .or_else(|| path.parent().map(Path::to_path_buf));
    store.load(definition, WorkflowSource::Catalog, source_root)?;
    Ok(Some(id))
}

async fn read_definition(path: &Path) -> Result<WorkflowDefinition> {
    let data = tokio::fs::read_to_string(path).await.map_err(|source| {
        NavigatorError::WorkflowDefinitionUnreadable {
            path: path.display().to_string(),
            source,
        }
    })?;
    serde_json::from_str(&data).map_err(|source| NavigatorError::WorkflowDefinitionInvalid {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn linear_workflow_json(id: &str) -> String {
        format!(
            r#"{{
                "id": "{id}",
                "nodes": {{
                    "start": {{"type": "start"}},
                    "end": {{"type": "end", "result": "success"}}
                }},
                "edges": [
                    {{"from": "start", "to": "end"}}
                ]
            }}"#
        )
    }

    #[tokio::test]
    async fn missing_directory_yields_empty_report() {
        let store = WorkflowStore::new();
        let report = load_workflows(
            &store,
            Path::new("/tmp/no-such-navigator-catalog"),
            None,
            None,
        )
        .await
        .unwrap();
        assert!(report.loaded.is_empty());
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn loads_every_json_file_in_directory() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("bug-fix.json"), linear_workflow_json("bug-fix"))
            .await
            .unwrap();
        tokio::fs::write(
            tmp.path().join("context-gather.json"),
            linear_workflow_json("context-gather"),
        )
        .await
        .unwrap();
        tokio::fs::write(tmp.path().join("readme.md"), "not a workflow")
            .await
            .unwrap();

        let store = WorkflowStore::new();
        let report = load_workflows(&store, tmp.path(), None, None).await.unwrap();

        assert_eq!(report.loaded.len(), 2);
        assert!(report.failures.is_empty());
        assert!(store.get("bug-fix").is_ok());
        assert!(store.get("context-gather").is_ok());
    }

    #[tokio::test]
    async fn invalid_entry_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("broken.json"), "{ not json")
            .await
            .unwrap();
        tokio::fs::write(tmp.path().join("bug-fix.json"), linear_workflow_json("bug-fix"))
            .await
            .unwrap();

        let store = WorkflowStore::new();
        let report = load_workflows(&store, tmp.path(), None, None).await.unwrap();

        assert_eq!(report.loaded, vec!["bug-fix".to_string()]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].path.ends_with("broken.json"));
    }

    #[tokio::test]
    async fn workflow_ids_filter_restricts_admission() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("bug-fix.json"), linear_workflow_json("bug-fix"))
            .await
            .unwrap();
        tokio::fs::write(
            tmp.path().join("context-gather.json"),
            linear_workflow_json("context-gather"),
        )
        .await
        .unwrap();

        let store = WorkflowStore::new();
        let ids = vec!["bug-fix".to_string()];
        let report = load_workflows(&store, tmp.path(), None, Some(&ids))
            .await
            .unwrap();

        assert_eq!(report.loaded, vec!["bug-fix".to_string()]);
        assert!(store.get("bug-fix").is_ok());
        assert!(store.get("context-gather").is_err());
    }

    #[tokio::test]
    async fn source_root_override_applies_to_every_entry() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("bug-fix.json"), linear_workflow_json("bug-fix"))
            .await
            .unwrap();

        let store = WorkflowStore::new();
        let override_root = PathBuf::from("/workflows/shared");
        load_workflows(&store, tmp.path(), Some(&override_root), None)
            .await
            .unwrap();

        assert_eq!(store.get_source_root("bug-fix"), Some(override_root));
    }

    #[tokio::test]
    async fn external_load_records_source_root() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bug-fix.json");
        tokio::fs::write(&path, linear_workflow_json("bug-fix"))
            .await
            .unwrap();

        let store = WorkflowStore::new();
        let id = load_external(&store, &path).await.unwrap();
        assert_eq!(id, "bug-fix");
        assert_eq!(store.get_source_root("bug-fix"), Some(tmp.path().to_path_buf()));
        assert!(store.has_external());
    }
}
