use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::store::StoreFilter;

/// Top-level configuration for the navigator core (spec.md is silent on
/// configuration; see SPEC_FULL.md §10.3 for why this layer exists anyway).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct NavigatorConfig {
    /// Directory scanned on startup for catalog workflow definitions
    /// (spec.md §6.2 `LoadWorkflows`). A missing directory yields zero
    /// workflows rather than an error — see `loader::load_catalog`.
    pub catalog_dir: PathBuf,

    /// Default filter applied by `List` when the caller doesn't specify one.
    pub default_list_filter: ListFilter,

    /// Emoji appended to a task's regenerated subject line, keyed by
    /// `workflowType` (spec.md §4.4 write-through protocol).
    pub workflow_emoji: HashMap<String, String>,
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            catalog_dir: PathBuf::from(".navigator/workflows"),
            default_list_filter: ListFilter::All,
            workflow_emoji: HashMap::new(),
        }
    }
}

/// Mirrors [`StoreFilter`] for TOML representation; kept distinct so the
/// store module stays free of serde.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListFilter {
    All,
    Project,
    Catalog,
    External,
}

impl From<ListFilter> for StoreFilter {
    fn from(f: ListFilter) -> Self {
        match f {
            ListFilter::All => StoreFilter::All,
            ListFilter::Project => StoreFilter::Project,
            ListFilter::Catalog => StoreFilter::Catalog,
            ListFilter::External => StoreFilter::External,
        }
    }
}
