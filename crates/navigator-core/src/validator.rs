//! Structural validation of workflow definitions (spec.md §4.2).
//!
//! Enforced before a definition is admitted to the [`crate::store::WorkflowStore`].
//! A definition that fails here is rejected wholesale — the store is left
//! unchanged.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::model::{NodeKind, WorkflowDefinition};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("workflow '{id}' has no nodes")]
    EmptyNodes { id: String },

    #[error("workflow '{id}' has no start node")]
    MissingStart { id: String },

    #[error("workflow '{id}' has {count} start nodes, expected exactly one")]
    MultipleStarts { id: String, count: usize },

    #[error("workflow '{id}' edge references unknown node '{node}'")]
    UnresolvedEdgeEndpoint { id: String, node: String },

    #[error("workflow '{id}' fork '{fork}' pairs with '{join}', which is not a join node")]
    ForkJoinTargetNotJoin {
        id: String,
        fork: String,
        join: String,
    },

    #[error(
        "workflow '{id}' fork '{fork}' pairs with join '{join}', but that join pairs back with '{other_fork}' instead"
    )]
    ForkJoinNotReciprocal {
        id: String,
        fork: String,
        join: String,
        other_fork: String,
    },

    #[error("workflow '{id}' fork '{fork}' has no outgoing edges")]
    ForkHasNoBranches { id: String, fork: String },

    #[error("workflow '{id}' fork '{fork}' has a branch targeting its paired join directly")]
    BranchTargetsJoinDirectly { id: String, fork: String },

    #[error("workflow '{id}' fork '{fork}' has a branch targeting another fork '{other_fork}'")]
    BranchTargetsAnotherFork {
        id: String,
        fork: String,
        other_fork: String,
    },

    #[error("workflow '{id}' fork '{fork}' has maxConcurrency of 0, must be positive")]
    InvalidMaxConcurrency { id: String, fork: String },

    #[error("workflow '{id}' join '{join}' references unknown fork '{fork}'")]
    JoinForkUnresolved { id: String, join: String, fork: String },
}

/// Validate a candidate definition against every invariant in spec.md §3.
pub fn validate(workflow: &WorkflowDefinition) -> Result<(), ValidationError> {
    let id = workflow.id.clone();

    if workflow.nodes.is_empty() {
        return Err(ValidationError::EmptyNodes { id });
    }

    check_unique_start(workflow, &id)?;
    check_edge_endpoints(workflow, &id)?;
    check_fork_join_pairing(workflow, &id)?;
    check_fork_branches(workflow, &id)?;

    Ok(())
}

fn check_unique_start(workflow: &WorkflowDefinition, id: &str) -> Result<(), ValidationError> {
    let starts: Vec<&str> = workflow
        .nodes
        .iter()
        .filter(|(_, n)| n.is_start())
        .map(|(k, _)| k.as_str())
        .collect();

    match starts.len() {
        0 => Err(ValidationError::MissingStart { id: id.to_string() }),
        1 => Ok(()),
        count => Err(ValidationError::MultipleStarts {
            id: id.to_string(),
            count,
        }),
    }
}

fn check_edge_endpoints(workflow: &WorkflowDefinition, id: &str) -> Result<(), ValidationError> {
    for edge in &workflow.edges {
        if !workflow.nodes.contains_key(&edge.from) {
            return Err(ValidationError::UnresolvedEdgeEndpoint {
                id: id.to_string(),
                node: edge.from.clone(),
            });
        }
        if !workflow.nodes.contains_key(&edge.to) {
            return Err(ValidationError::UnresolvedEdgeEndpoint {
                id: id.to_string(),
                node: edge.to.clone(),
            });
        }
    }
    Ok(())
}

fn check_fork_join_pairing(workflow: &WorkflowDefinition, id: &str) -> Result<(), ValidationError> {
    for (node_id, node) in &workflow.nodes {
        match node {
            NodeKind::Fork(spec) => {
                if let Some(max) = spec.max_concurrency {
                    if max == 0 {
                        return Err(ValidationError::InvalidMaxConcurrency {
                            id: id.to_string(),
                            fork: node_id.clone(),
                        });
                    }
                }

                match workflow.nodes.get(&spec.join) {
                    Some(NodeKind::Join(join_spec)) => {
                        if join_spec.fork != *node_id {
                            return Err(ValidationError::ForkJoinNotReciprocal {
                                id: id.to_string(),
                                fork: node_id.clone(),
                                join: spec.join.clone(),
                                other_fork: join_spec.fork.clone(),
                            });
                        }
                    }
                    Some(_) | None => {
                        return Err(ValidationError::ForkJoinTargetNotJoin {
                            id: id.to_string(),
                            fork: node_id.clone(),
                            join: spec.join.clone(),
                        });
                    }
                }
            }
            NodeKind::Join(spec) => {
                if !workflow.nodes.contains_key(&spec.fork) {
                    return Err(ValidationError::JoinForkUnresolved {
                        id: id.to_string(),
                        join: node_id.clone(),
                        fork: spec.fork.clone(),
                    });
                }
            }
            _ => {}
        }
    }
    Ok(())
}

/// Rule 3: a fork must have at least one outgoing edge; none of those edges
/// may target the paired join directly, and none may target another fork.
///
/// Per the §9/§13 open-question resolution, "directly" means the fork's own
/// outgoing edge — an internal branch node routing to the join afterwards is
/// fine (the `context-gather` pattern where one branch is
/// `repo_info -> repo_analyze -> join` while siblings reach the join in one
/// hop from a non-fork node).
fn check_fork_branches(workflow: &WorkflowDefinition, id: &str) -> Result<(), ValidationError> {
    let forks: HashSet<&str> = workflow
        .nodes
        .iter()
        .filter(|(_, n)| matches!(n, NodeKind::Fork(_)))
        .map(|(k, _)| k.as_str())
        .collect();

    let branches_by_fork: HashMap<&str, Vec<&crate::model::Edge>> = {
        let mut map: HashMap<&str, Vec<&crate::model::Edge>> = HashMap::new();
        for edge in &workflow.edges {
            if forks.contains(edge.from.as_str()) {
                map.entry(edge.from.as_str()).or_default().push(edge);
            }
        }
        map
    };

    for node_id in &forks {
        let NodeKind::Fork(spec) = &workflow.nodes[*node_id] else {
            unreachable!("filtered to fork nodes above");
        };

        let branches = branches_by_fork.get(node_id).cloned().unwrap_or_default();
        if branches.is_empty() {
            return Err(ValidationError::ForkHasNoBranches {
                id: id.to_string(),
                fork: node_id.to_string(),
            });
        }

        for edge in branches {
            if edge.to == spec.join {
                return Err(ValidationError::BranchTargetsJoinDirectly {
                    id: id.to_string(),
                    fork: node_id.to_string(),
                });
            }
            if forks.contains(edge.to.as_str()) {
                return Err(ValidationError::BranchTargetsAnotherFork {
                    id: id.to_string(),
                    fork: node_id.to_string(),
                    other_fork: edge.to.clone(),
                });
            }
        }
    }

    Ok(())
}
