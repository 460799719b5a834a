//! Diagnosis tree schema.
//!
//! Two layers live here:
//! - [`TreeDocument`] / [`RawNode`]: the lenient upload format, as authored.
//! - [`DiagnosisTree`] / [`Node`]: the resolved, typed model the traversal
//!   engine and depth estimator work on.
//!
//! Nodes are stored in an arena and reference each other by id only; every
//! edge is resolved through [`DiagnosisTree::node`].

mod document;
mod locale;

#[cfg(test)]
pub(crate) mod fixtures;

pub use document::*;
pub use locale::*;

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

/// Discriminant of a [`Node`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    /// Yes/no decision point.
    Question,
    /// Informational node with a single successor.
    Step,
    /// Terminal node carrying repair actions.
    Result,
}

impl std::fmt::Display for NodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeKind::Question => write!(f, "question"),
            NodeKind::Step => write!(f, "step"),
            NodeKind::Result => write!(f, "result"),
        }
    }
}

impl std::str::FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "question" => Ok(NodeKind::Question),
            "step" => Ok(NodeKind::Step),
            "result" => Ok(NodeKind::Result),
            _ => Err(format!("Unknown node type: {}", s)),
        }
    }
}

/// A related document or screen offered alongside a result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultLink {
    /// Link caption.
    #[serde(default)]
    pub label: String,
    /// External URL or in-app route.
    #[serde(rename = "urlOrRoute", alias = "url", default)]
    pub url_or_route: String,
    /// What the link points at (manual, wiring, case, ...).
    #[serde(rename = "type", default)]
    pub link_type: String,
}

/// A resolved tree node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Node {
    /// Yes/no decision point.
    Question {
        id: String,
        text: String,
        #[serde(rename = "yesNextId")]
        yes_next_id: String,
        #[serde(rename = "noNextId")]
        no_next_id: String,
    },
    /// Informational node with one successor.
    Step {
        id: String,
        text: String,
        #[serde(rename = "nextId")]
        next_id: String,
    },
    /// Terminal node; `actions` is never empty.
    Result {
        id: String,
        text: String,
        actions: Vec<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        links: Vec<ResultLink>,
    },
}

impl Node {
    /// Node id.
    pub fn id(&self) -> &str {
        match self {
            Node::Question { id, .. } | Node::Step { id, .. } | Node::Result { id, .. } => id.as_str(),
        }
    }

    /// Resolved display text.
    pub fn text(&self) -> &str {
        match self {
            Node::Question { text, .. } | Node::Step { text, .. } | Node::Result { text, .. } => {
                text.as_str()
            }
        }
    }

    /// The variant as a [`NodeKind`].
    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Question { .. } => NodeKind::Question,
            Node::Step { .. } => NodeKind::Step,
            Node::Result { .. } => NodeKind::Result,
        }
    }

    /// Outgoing edge targets: yes then no for a question, next for a step,
    /// nothing for a result.
    pub fn successors(&self) -> Vec<&str> {
        match self {
            Node::Question {
                yes_next_id,
                no_next_id,
                ..
            } => vec![yes_next_id.as_str(), no_next_id.as_str()],
            Node::Step { next_id, .. } => vec![next_id.as_str()],
            Node::Result { .. } => Vec::new(),
        }
    }

    /// Repair actions when this is a result node.
    pub fn actions(&self) -> Option<&[String]> {
        match self {
            Node::Result { actions, .. } => Some(actions.as_slice()),
            Node::Question { .. } | Node::Step { .. } => None,
        }
    }

    pub fn is_result(&self) -> bool {
        matches!(self, Node::Result { .. })
    }
}

/// A resolved diagnosis tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisTree {
    tree_id: String,
    title: String,
    category: String,
    supported_models: BTreeSet<String>,
    start_node_id: String,
    nodes: Vec<Node>,
    #[serde(skip)]
    index: HashMap<String, usize>,
}

impl DiagnosisTree {
    /// Build a tree and its id index. When ids repeat, the first node wins
    /// lookups; the validator reports the duplicate.
    pub fn new<M>(
        tree_id: impl Into<String>,
        title: impl Into<String>,
        category: impl Into<String>,
        supported_models: impl IntoIterator<Item = M>,
        start_node_id: impl Into<String>,
        nodes: Vec<Node>,
    ) -> Self
    where
        M: Into<String>,
    {
        let mut index = HashMap::with_capacity(nodes.len());
        for (position, node) in nodes.iter().enumerate() {
            index.entry(node.id().to_string()).or_insert(position);
        }

        Self {
            tree_id: tree_id.into(),
            title: title.into(),
            category: category.into(),
            supported_models: supported_models.into_iter().map(Into::into).collect(),
            start_node_id: start_node_id.into(),
            nodes,
            index,
        }
    }

    pub fn tree_id(&self) -> &str {
        &self.tree_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn category(&self) -> &str {
        &self.category
    }

    pub fn supported_models(&self) -> &BTreeSet<String> {
        &self.supported_models
    }

    pub fn start_node_id(&self) -> &str {
        &self.start_node_id
    }

    /// Nodes in authoring order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Look a node up by id.
    pub fn node(&self, id: &str) -> Option<&Node> {
        self.index.get(id).and_then(|&position| self.nodes.get(position))
    }

    /// The start node, if `start_node_id` resolves.
    pub fn start_node(&self) -> Option<&Node> {
        self.node(&self.start_node_id)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn result_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_result()).count()
    }

    /// True when `model` is listed in `supported_models`.
    pub fn supports_model(&self, model: &str) -> bool {
        self.supported_models.contains(model)
    }
}

#[cfg(test)]
#[path = "tree_tests.rs"]
mod tree_tests;
