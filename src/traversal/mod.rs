//! Traversal engine.
//!
//! A [`TraversalSession`] walks one validated [`DiagnosisTree`] for one
//! technician. It owns its history; the tree itself is shared read-only.
//! Having no session is simply having no `TraversalSession` value.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::depth::estimate_max_depth;
use crate::error::{EngineError, EngineResult};
use crate::tree::{DiagnosisTree, Node, TreeDocument};
use crate::validation::validate;


/// A technician's answer to a question node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Answer {
    Yes,
    No,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Yes => write!(f, "yes"),
            Answer::No => write!(f, "no"),
        }
    }
}

impl FromStr for Answer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "yes" | "y" | "true" | "예" | "네" => Ok(Answer::Yes),
            "no" | "n" | "false" | "아니오" | "아니요" => Ok(Answer::No),
            _ => Err(format!("Unknown answer: {} (expected yes or no)", s)),
        }
    }
}

impl From<bool> for Answer {
    fn from(value: bool) -> Self {
        if value {
            Answer::Yes
        } else {
            Answer::No
        }
    }
}

/// Position of a session for "step N of M" display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    /// 1-based position of the current node in the history.
    pub current_step: usize,
    /// Questions answered so far.
    pub answered_count: usize,
    /// Longest start-to-result path of the tree.
    pub max_depth: usize,
    /// Current node is a result.
    pub finished: bool,
}

/// One walk through a diagnosis tree.
#[derive(Debug, Clone)]
pub struct TraversalSession {
    tree: Arc<DiagnosisTree>,
    history: Vec<String>,
    max_depth: usize,
}

impl TraversalSession {
    /// Open a session at the tree's start node.
    ///
    /// The tree is re-validated here even when it came out of the catalog, so
    /// a session never starts on a tree with dangling edges or cycles.
    ///
    /// # Errors
    /// [`EngineError::InvalidTree`] when the validator reports any error.
    pub fn start(tree: Arc<DiagnosisTree>) -> EngineResult<Self> {
        let report = validate(&TreeDocument::from(tree.as_ref()));
        if !report.is_valid() {
            warn!(
                tree_id = %tree.tree_id(),
                errors = report.errors.len(),
                "Refusing to start traversal on invalid tree"
            );
            return Err(EngineError::InvalidTree {
                tree_id: tree.tree_id().to_string(),
                errors: report.errors,
            });
        }

        let max_depth = estimate_max_depth(&tree);
        let history = vec![tree.start_node_id().to_string()];
        debug!(tree_id = %tree.tree_id(), max_depth, "Traversal session started");

        Ok(Self {
            tree,
            history,
            max_depth,
        })
    }

    pub fn tree(&self) -> &DiagnosisTree {
        &self.tree
    }

    /// Node ids visited so far, start node first.
    pub fn history(&self) -> &[String] {
        &self.history
    }

    /// The node the technician is looking at.
    ///
    /// Every id in the history resolves: the start node was validated and
    /// [`TraversalSession::answer`]/[`TraversalSession::advance`] only push
    /// targets that exist.
    pub fn current_node(&self) -> &Node {
        self.history
            .last()
            .and_then(|id| self.tree.node(id))
            .or_else(|| self.tree.start_node())
            .unwrap_or_else(|| &self.tree.nodes()[0])
    }

    /// Answer the current question and move to the chosen branch.
    ///
    /// # Errors
    /// - [`EngineError::NotAQuestion`] when the current node is not a question.
    /// - [`EngineError::DanglingEdge`] when the branch target does not exist;
    ///   the history is left as it was.
    pub fn answer(&mut self, answer: Answer) -> EngineResult<&Node> {
        let (from, target) = match self.current_node() {
            Node::Question {
                id,
                yes_next_id,
                no_next_id,
                ..
            } => {
                let target = match answer {
                    Answer::Yes => yes_next_id,
                    Answer::No => no_next_id,
                };
                (id.clone(), target.clone())
            }
            other => {
                return Err(EngineError::NotAQuestion {
                    node_id: other.id().to_string(),
                })
            }
        };

        debug!(from = %from, answer = %answer, to = %target, "Answered question");
        self.move_to(from, target)
    }

    /// Follow the current step's `nextId`.
    ///
    /// # Errors
    /// - [`EngineError::NotAStep`] when the current node is not a step.
    /// - [`EngineError::DanglingEdge`] when the target does not exist.
    pub fn advance(&mut self) -> EngineResult<&Node> {
        let (from, target) = match self.current_node() {
            Node::Step { id, next_id, .. } => (id.clone(), next_id.clone()),
            other => {
                return Err(EngineError::NotAStep {
                    node_id: other.id().to_string(),
                })
            }
        };

        debug!(from = %from, to = %target, "Advanced step");
        self.move_to(from, target)
    }

    /// Step back one node. Returns `false` at the start node.
    pub fn back(&mut self) -> bool {
        if self.history.len() <= 1 {
            return false;
        }
        self.history.pop();
        true
    }

    /// Return to the start node, dropping the whole walk.
    pub fn restart(&mut self) {
        self.history.clear();
        self.history.push(self.tree.start_node_id().to_string());
    }

    pub fn is_finished(&self) -> bool {
        self.current_node().is_result()
    }

    /// Questions answered on the way to the current node.
    pub fn answered_count(&self) -> usize {
        let visited = self.history.len().saturating_sub(1);
        self.history[..visited]
            .iter()
            .filter_map(|id| self.tree.node(id))
            .filter(|node| matches!(node, Node::Question { .. }))
            .count()
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    pub fn progress(&self) -> Progress {
        Progress {
            current_step: self.history.len(),
            answered_count: self.answered_count(),
            max_depth: self.max_depth,
            finished: self.is_finished(),
        }
    }

    fn move_to(&mut self, from: String, target: String) -> EngineResult<&Node> {
        if self.tree.node(&target).is_none() {
            return Err(EngineError::DanglingEdge { from, to: target });
        }
        self.history.push(target);
        Ok(self.current_node())
    }
}
