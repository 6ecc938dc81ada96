//! Workflow store: holds loaded definitions indexed by id (spec.md §4.1).
//!
//! Read-mostly and process-wide, in the same spirit as the teacher's
//! adapter registry — a small `RwLock`-guarded map, cheap concurrent reads,
//! infrequent serialized writes on `Load`/`Clear`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::RwLock;

use serde::{Deserialize, Serialize};

use crate::error::{NavigatorError, Result};
use crate::model::{WorkflowDefinition, WorkflowSource};
use crate::validator::validate;

struct StoreEntry {
    definition: WorkflowDefinition,
    source: WorkflowSource,
    source_root: Option<PathBuf>,
}

/// Small projection of a stored workflow for `List`, matching the
/// "small projection type, not the full internal struct" discipline the
/// teacher uses for `ProbeReport`/`DoctorReport`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub step_count: usize,
    pub source: WorkflowSource,
}

/// Filter applied by `List`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreFilter {
    All,
    Project,
    Catalog,
    External,
}

impl StoreFilter {
    fn matches(self, source: WorkflowSource) -> bool {
        match self {
            StoreFilter::All => true,
            StoreFilter::Project => source == WorkflowSource::Project,
            StoreFilter::Catalog => source == WorkflowSource::Catalog,
            StoreFilter::External => source == WorkflowSource::External,
        }
    }
}

/// Holds every loaded workflow definition, shared read-only with the
/// transition engine and navigator.
pub struct WorkflowStore {
    entries: RwLock<HashMap<String, StoreEntry>>,
}

impl Default for WorkflowStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Admit a definition after validation succeeds. Replaces any existing
    /// entry with the same id. On validation failure the store is left
    /// unchanged.
    pub fn load(
        &self,
        definition: WorkflowDefinition,
        source: WorkflowSource,
        source_root: Option<PathBuf>,
    ) -> Result<()> {
        validate(&definition)?;

        let id = definition.id.clone();
        let mut entries = self.entries.write().expect("workflow store lock poisoned");
        entries.insert(
            id,
            StoreEntry {
                definition,
                source,
                source_root,
            },
        );
        Ok(())
    }

    /// Fetch a workflow definition by id.
    pub fn get(&self, id: &str) -> Result<WorkflowDefinition> {
        let entries = self.entries.read().expect("workflow store lock poisoned");
        entries
            .get(id)
            .map(|e| e.definition.clone())
            .ok_or_else(|| NavigatorError::WorkflowNotFound {
                workflow_type: id.to_string(),
            })
    }

    /// Full provenance lookup: definition, source, and source root together,
    /// so the navigator need only take one lock per call.
    pub fn get_with_provenance(
        &self,
        id: &str,
    ) -> Result<(WorkflowDefinition, WorkflowSource, Option<PathBuf>)> {
        let entries = self.entries.read().expect("workflow store lock poisoned");
        entries
            .get(id)
            .map(|e| (e.definition.clone(), e.source, e.source_root.clone()))
            .ok_or_else(|| NavigatorError::WorkflowNotFound {
                workflow_type: id.to_string(),
            })
    }

    pub fn list(&self, filter: StoreFilter) -> Vec<WorkflowSummary> {
        let entries = self.entries.read().expect("workflow store lock poisoned");
        let mut summaries: Vec<WorkflowSummary> = entries
            .values()
            .filter(|e| filter.matches(e.source))
            .map(|e| WorkflowSummary {
                id: e.definition.id.clone(),
                name: e
                    .definition
                    .name
                    .clone()
                    .unwrap_or_else(|| e.definition.id.clone()),
                description: e.definition.description.clone().unwrap_or_default(),
                step_count: e.definition.nodes.len(),
                source: e.source,
            })
            .collect();
        summaries.sort_by(|a, b| a.id.cmp(&b.id));
        summaries
    }

    pub fn has_project(&self) -> bool {
        let entries = self.entries.read().expect("workflow store lock poisoned");
        entries.values().any(|e| e.source == WorkflowSource::Project)
    }

    pub fn has_external(&self) -> bool {
        let entries = self.entries.read().expect("workflow store lock poisoned");
        entries.values().any(|e| e.source == WorkflowSource::External)
    }

    pub fn get_source_root(&self, id: &str) -> Option<PathBuf> {
        let entries = self.entries.read().expect("workflow store lock poisoned");
        entries.get(id).and_then(|e| e.source_root.clone())
    }

    pub fn clear(&self) {
        let mut entries = self.entries.write().expect("workflow store lock poisoned");
        entries.clear();
    }
}
