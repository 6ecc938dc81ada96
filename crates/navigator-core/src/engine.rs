//! Transition engine: pure edge-selection logic (spec.md §4.3).
//!
//! No I/O, no state. Given `(workflow, current_step, result, retry_count)`
//! this computes the next step and the bookkeeping the navigator must apply.
//! Edge declaration order is the tie-break policy throughout — workflow
//! authors control priority by where they place an edge in the `edges`
//! sequence.

use crate::model::{Edge, NodeKind, StepResult, WorkflowDefinition};

/// The outcome of evaluating a transition at a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Took an edge with no `on` clause.
    Unconditional { next: String },
    /// Took an edge whose `on` matched the result; retries reset to 0.
    Conditional { next: String },
    /// Took a failed edge looping back to a non-end node; retries bounded.
    Retry { next: String, new_retry_count: u32 },
    /// Took a failed edge to an `end` node after retries were exhausted.
    Escalate { next: String },
}

impl Transition {
    pub fn next_step(&self) -> &str {
        match self {
            Transition::Unconditional { next }
            | Transition::Conditional { next }
            | Transition::Retry { next, .. }
            | Transition::Escalate { next } => next,
        }
    }

    /// The retry count the navigator should persist after this transition.
    pub fn resulting_retry_count(&self) -> u32 {
        match self {
            Transition::Retry { new_retry_count, .. } => *new_retry_count,
            _ => 0,
        }
    }
}

/// Why a transition could not be computed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("no outgoing edges from step '{step}'")]
    NoOutgoingEdges { step: String },
    #[error("no edge matches result '{result}' from step '{step}'")]
    NoMatchingEdge { step: String, result: String },
}

/// Return the edges whose `from` matches `step_id`, in declaration order.
pub fn outgoing_edges<'a>(workflow: &'a WorkflowDefinition, step_id: &str) -> Vec<&'a Edge> {
    workflow
        .edges
        .iter()
        .filter(|e| e.from == step_id)
        .collect()
}

/// Evaluate the transition out of `current_step` given the reported
/// `result` and the task's current `retry_count`.
///
/// Mirrors spec.md §4.3's algorithm exactly:
/// 1. No outgoing edges -> `no_outgoing_edges`.
/// 2. Partition into unconditional / matching-on-result.
/// 3. An absent result takes the first unconditional edge.
/// 4. Among matching edges, split retry (target non-end) vs escalate
///    (target end).
/// 5. `failed` with both retry and escalate edges present: retry while
///    `retry_count < max_retries`, else escalate.
/// 6. Otherwise take the first matching edge.
/// 7. Otherwise take the first unconditional edge.
/// 8. Otherwise `no_matching_edge`.
pub fn evaluate_transition(
    workflow: &WorkflowDefinition,
    current_step: &str,
    result: Option<StepResult>,
    retry_count: u32,
) -> Result<Transition, TransitionError> {
    let edges = outgoing_edges(workflow, current_step);
    if edges.is_empty() {
        return Err(TransitionError::NoOutgoingEdges {
            step: current_step.to_string(),
        });
    }

    let result_str = result.map(|r| r.as_str());

    let unconditional: Vec<&Edge> = edges.iter().filter(|e| e.is_unconditional()).copied().collect();
    let matching: Vec<&Edge> = match result_str {
        Some(r) => edges
            .iter()
            .filter(|e| e.on.as_deref() == Some(r))
            .copied()
            .collect(),
        None => Vec::new(),
    };

    if result_str.is_none() {
        if let Some(edge) = unconditional.first() {
            return Ok(Transition::Unconditional {
                next: edge.to.clone(),
            });
        }
        return Err(TransitionError::NoMatchingEdge {
            step: current_step.to_string(),
            result: "<none>".to_string(),
        });
    }

    let (retry_edges, escalate_edges): (Vec<&Edge>, Vec<&Edge>) = matching
        .iter()
        .copied()
        .partition(|e| !is_end(workflow, &e.to));

    if result_str == Some("failed") && !retry_edges.is_empty() && !escalate_edges.is_empty() {
        let max_retries = workflow
            .node(current_step)
            .map(|n| n.max_retries())
            .unwrap_or(0);

        if retry_count < max_retries {
            let edge = retry_edges[0];
            return Ok(Transition::Retry {
                next: edge.to.clone(),
                new_retry_count: retry_count + 1,
            });
        }

        let edge = escalate_edges[0];
        return Ok(Transition::Escalate {
            next: edge.to.clone(),
        });
    }

    if let Some(edge) = matching.first() {
        return Ok(Transition::Conditional {
            next: edge.to.clone(),
        });
    }

    if let Some(edge) = unconditional.first() {
        return Ok(Transition::Unconditional {
            next: edge.to.clone(),
        });
    }

    Err(TransitionError::NoMatchingEdge {
        step: current_step.to_string(),
        result: result_str.unwrap_or("<none>").to_string(),
    })
}

fn is_end(workflow: &WorkflowDefinition, node_id: &str) -> bool {
    matches!(workflow.node(node_id), Some(NodeKind::End(_)))
}
