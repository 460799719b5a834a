//! Wire format for uploaded trees.
//!
//! Documents are parsed leniently: absent fields fall back to empty values so
//! the validator can report them, instead of the whole upload failing to parse.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{DiagnosisTree, Locale, Node, NodeKind, ResultLink};
use crate::error::{EngineError, EngineResult};
use crate::validation::validate;

/// A diagnosis tree as authored and uploaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TreeDocument {
    /// Stable identifier shared by every version of the tree.
    pub tree_id: String,
    /// Title shown in the tree selector.
    pub title: String,
    /// Symptom category (e.g. "electrical").
    pub category: String,
    /// Vehicle models this tree applies to.
    pub supported_models: Vec<String>,
    /// Id of the node a walk begins at.
    pub start_node_id: String,
    /// Nodes in authoring order.
    pub nodes: Vec<RawNode>,
}

/// A node as authored, with every variant's fields optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "text_ko", skip_serializing_if = "Option::is_none")]
    pub text_ko: Option<String>,
    #[serde(rename = "text_en", skip_serializing_if = "Option::is_none")]
    pub text_en: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yes_next_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_next_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actions: Option<Vec<String>>,
    #[serde(rename = "actions_ko", skip_serializing_if = "Option::is_none")]
    pub actions_ko: Option<Vec<String>>,
    #[serde(rename = "actions_en", skip_serializing_if = "Option::is_none")]
    pub actions_en: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<ResultLink>>,
}

/// One outgoing reference of a raw node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawEdge<'a> {
    /// Field the reference was read from (`yesNextId`, `noNextId`, `nextId`).
    pub field: &'static str,
    /// Referenced node id.
    pub target: &'a str,
}

impl RawNode {
    /// Parsed node type, `None` when the type string is unknown.
    pub fn kind(&self) -> Option<NodeKind> {
        self.node_type.parse().ok()
    }

    /// Display text for `locale`: the locale's own field, then `text`, then
    /// the other locale.
    pub fn resolved_text(&self, locale: Locale) -> Option<&str> {
        [
            self.text_for(locale),
            self.text.as_ref(),
            self.text_for(locale.other()),
        ]
        .into_iter()
        .flatten()
        .map(|s| s.trim())
        .find(|s| !s.is_empty())
    }

    /// Action list for `locale`, using the same fallback order as
    /// [`RawNode::resolved_text`]. Blank entries are dropped.
    pub fn resolved_actions(&self, locale: Locale) -> Vec<String> {
        [
            self.actions_for(locale),
            self.actions.as_ref(),
            self.actions_for(locale.other()),
        ]
        .into_iter()
        .flatten()
        .map(|list| non_blank(list))
        .find(|list| !list.is_empty())
        .unwrap_or_default()
    }

    /// True when any text field carries something displayable.
    pub fn has_text(&self) -> bool {
        self.resolved_text(Locale::default()).is_some()
    }

    /// True when any action list carries at least one action.
    pub fn has_actions(&self) -> bool {
        !self.resolved_actions(Locale::default()).is_empty()
    }

    /// Outgoing references that are present, according to the node's type.
    ///
    /// Fields that do not belong to the type (a `nextId` on a question, say)
    /// are not edges.
    pub fn edges(&self) -> Vec<RawEdge<'_>> {
        match self.kind() {
            Some(NodeKind::Question) => [
                present_edge("yesNextId", &self.yes_next_id),
                present_edge("noNextId", &self.no_next_id),
            ]
            .into_iter()
            .flatten()
            .collect(),
            Some(NodeKind::Step) => present_edge("nextId", &self.next_id)
                .into_iter()
                .collect(),
            Some(NodeKind::Result) | None => Vec::new(),
        }
    }

    /// Build the typed node for `locale`. `None` when a field the variant
    /// needs is missing.
    pub fn to_node(&self, locale: Locale) -> Option<Node> {
        let id = self.id.trim();
        if id.is_empty() {
            return None;
        }
        let id = id.to_string();
        let text = self.resolved_text(locale)?.to_string();
        let edge = |value: &Option<String>| -> Option<String> {
            value
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
        };

        match self.kind()? {
            NodeKind::Question => Some(Node::Question {
                id,
                text,
                yes_next_id: edge(&self.yes_next_id)?,
                no_next_id: edge(&self.no_next_id)?,
            }),
            NodeKind::Step => Some(Node::Step {
                id,
                text,
                next_id: edge(&self.next_id)?,
            }),
            NodeKind::Result => {
                let actions = self.resolved_actions(locale);
                if actions.is_empty() {
                    return None;
                }
                Some(Node::Result {
                    id,
                    text,
                    actions,
                    links: self.links.clone().unwrap_or_default(),
                })
            }
        }
    }

    fn text_for(&self, locale: Locale) -> Option<&String> {
        match locale {
            Locale::Ko => self.text_ko.as_ref(),
            Locale::En => self.text_en.as_ref(),
        }
    }

    fn actions_for(&self, locale: Locale) -> Option<&Vec<String>> {
        match locale {
            Locale::Ko => self.actions_ko.as_ref(),
            Locale::En => self.actions_en.as_ref(),
        }
    }
}

fn present_edge<'a>(field: &'static str, value: &'a Option<String>) -> Option<RawEdge<'a>> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|target| !target.is_empty())
        .map(|target| RawEdge { field, target })
}

fn non_blank(list: &[String]) -> Vec<String> {
    list.iter()
        .map(|a| a.trim())
        .filter(|a| !a.is_empty())
        .map(str::to_string)
        .collect()
}

impl From<&Node> for RawNode {
    fn from(node: &Node) -> Self {
        let mut raw = RawNode {
            id: node.id().to_string(),
            node_type: node.kind().to_string(),
            text: Some(node.text().to_string()),
            ..RawNode::default()
        };
        match node {
            Node::Question {
                yes_next_id,
                no_next_id,
                ..
            } => {
                raw.yes_next_id = Some(yes_next_id.clone());
                raw.no_next_id = Some(no_next_id.clone());
            }
            Node::Step { next_id, .. } => {
                raw.next_id = Some(next_id.clone());
            }
            Node::Result { actions, links, .. } => {
                raw.actions = Some(actions.clone());
                if !links.is_empty() {
                    raw.links = Some(links.clone());
                }
            }
        }
        raw
    }
}

impl TreeDocument {
    /// Validate the document and resolve it into a typed tree for `locale`.
    ///
    /// # Errors
    /// [`EngineError::InvalidTree`] when the validator reports any error.
    pub fn resolve(&self, locale: Locale) -> EngineResult<DiagnosisTree> {
        let report = validate(self);
        if !report.is_valid() {
            return Err(EngineError::InvalidTree {
                tree_id: self.tree_id.clone(),
                errors: report.errors,
            });
        }

        let mut nodes = Vec::with_capacity(self.nodes.len());
        for raw in &self.nodes {
            match raw.to_node(locale) {
                Some(node) => nodes.push(node),
                None => {
                    return Err(EngineError::InvalidTree {
                        tree_id: self.tree_id.clone(),
                        errors: vec![format!("node '{}' could not be resolved", raw.id)],
                    })
                }
            }
        }

        debug!(
            tree_id = %self.tree_id,
            locale = %locale,
            nodes = nodes.len(),
            "Resolved diagnosis tree"
        );

        Ok(DiagnosisTree::new(
            self.tree_id.trim(),
            self.title.trim(),
            self.category.trim(),
            self.supported_models.iter().map(|m| m.trim()),
            self.start_node_id.trim(),
            nodes,
        ))
    }
}

impl From<&DiagnosisTree> for TreeDocument {
    fn from(tree: &DiagnosisTree) -> Self {
        TreeDocument {
            tree_id: tree.tree_id().to_string(),
            title: tree.title().to_string(),
            category: tree.category().to_string(),
            supported_models: tree.supported_models().iter().cloned().collect(),
            start_node_id: tree.start_node_id().to_string(),
            nodes: tree.nodes().iter().map(RawNode::from).collect(),
        }
    }
}

/// Body of a batch upload: one document or an array of them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum UploadPayload {
    /// Several trees uploaded together.
    Many(Vec<TreeDocument>),
    /// A single tree.
    One(Box<TreeDocument>),
}

impl UploadPayload {
    /// Parse an upload body from JSON text.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Flatten into the list of documents, preserving order.
    pub fn into_documents(self) -> Vec<TreeDocument> {
        match self {
            UploadPayload::Many(documents) => documents,
            UploadPayload::One(document) => vec![*document],
        }
    }
}

impl From<TreeDocument> for UploadPayload {
    fn from(document: TreeDocument) -> Self {
        UploadPayload::One(Box::new(document))
    }
}

impl From<Vec<TreeDocument>> for UploadPayload {
    fn from(documents: Vec<TreeDocument>) -> Self {
        UploadPayload::Many(documents)
    }
}
