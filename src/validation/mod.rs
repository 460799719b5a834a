//! Diagnosis tree validator.
//!
//! [`validate`] is a pure function over a [`TreeDocument`]. It collects every
//! finding instead of stopping at the first one:
//!
//! 1. required tree fields
//! 2. node shape (type, text, per-type edge fields, result actions)
//! 3. duplicate node ids
//! 4. at least one result node
//! 5. referential integrity of `startNodeId` and every edge
//! 6. cycles reachable from the start node (three-color DFS)
//! 7. nodes unreachable from the start node (warnings only)
//!
//! Errors block persistence and activation of the tree; warnings never do.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::tree::{NodeKind, RawEdge, RawNode, TreeDocument};


/// Findings for one tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Blocking findings.
    pub errors: Vec<String>,
    /// Informational findings.
    pub warnings: Vec<String>,
}

impl ValidationReport {
    /// True when there are no errors, regardless of warnings.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Append `other`'s findings after this report's own.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

/// Validate one tree document.
pub fn validate(document: &TreeDocument) -> ValidationReport {
    let mut report = ValidationReport::default();

    check_required_fields(document, &mut report);
    check_node_shapes(document, &mut report);
    let index = index_nodes(document, &mut report);
    check_result_count(document, &mut report);

    if document.nodes.is_empty() {
        return report;
    }

    let start_resolves = check_references(document, &index, &mut report);
    if start_resolves {
        let visited = check_cycles(document.start_node_id.trim(), &index, &mut report);
        check_reachability(document, &index, &visited, &mut report);
    }

    report
}

fn check_required_fields(document: &TreeDocument, report: &mut ValidationReport) {
    let required = [
        ("treeId", &document.tree_id),
        ("title", &document.title),
        ("category", &document.category),
        ("startNodeId", &document.start_node_id),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            report.error(format!("{} is required", field));
        }
    }
    if document.nodes.is_empty() {
        report.error("nodes must not be empty");
    }
}

fn check_node_shapes(document: &TreeDocument, report: &mut ValidationReport) {
    for (position, node) in document.nodes.iter().enumerate() {
        let label = node_label(node, position);

        if node.id.trim().is_empty() {
            report.error(format!("node at index {} is missing an id", position));
        }

        let kind = if node.node_type.trim().is_empty() {
            report.error(format!("node {} is missing a type", label));
            None
        } else {
            match node.kind() {
                Some(kind) => Some(kind),
                None => {
                    report.error(format!(
                        "node {} has unknown type '{}' (expected question, step or result)",
                        label, node.node_type
                    ));
                    None
                }
            }
        };

        if !node.has_text() {
            report.error(format!(
                "node {} has no text (text, text_ko or text_en)",
                label
            ));
        }

        match kind {
            Some(NodeKind::Question) => {
                if is_blank(&node.yes_next_id) {
                    report.error(format!("question node {} is missing yesNextId", label));
                }
                if is_blank(&node.no_next_id) {
                    report.error(format!("question node {} is missing noNextId", label));
                }
            }
            Some(NodeKind::Step) => {
                if is_blank(&node.next_id) {
                    report.error(format!("step node {} is missing nextId", label));
                }
            }
            Some(NodeKind::Result) => {
                if !node.has_actions() {
                    report.error(format!(
                        "result node {} has no actions (actions, actions_ko or actions_en)",
                        label
                    ));
                }
            }
            None => {}
        }
    }
}

/// Map ids to their first node, reporting each repeated id once.
fn index_nodes<'a>(
    document: &'a TreeDocument,
    report: &mut ValidationReport,
) -> HashMap<&'a str, &'a RawNode> {
    let mut index = HashMap::with_capacity(document.nodes.len());
    let mut reported = HashSet::new();

    for node in &document.nodes {
        let id = node.id.trim();
        if id.is_empty() {
            continue;
        }
        if index.contains_key(id) {
            if reported.insert(id) {
                report.error(format!("duplicate node id '{}'", id));
            }
        } else {
            index.insert(id, node);
        }
    }

    index
}

fn check_result_count(document: &TreeDocument, report: &mut ValidationReport) {
    let results = document
        .nodes
        .iter()
        .filter(|n| n.kind() == Some(NodeKind::Result))
        .count();
    if results == 0 {
        report.error("tree has no result node");
    }
}

/// Returns whether `startNodeId` resolves.
fn check_references(
    document: &TreeDocument,
    index: &HashMap<&str, &RawNode>,
    report: &mut ValidationReport,
) -> bool {
    let start = document.start_node_id.trim();
    let start_resolves = index.contains_key(start);
    if !start.is_empty() && !start_resolves {
        report.error(format!("startNodeId '{}' does not match any node", start));
    }

    for (position, node) in document.nodes.iter().enumerate() {
        for RawEdge { field, target } in node.edges() {
            if !index.contains_key(target) {
                report.error(format!(
                    "node {} {} references missing node '{}'",
                    node_label(node, position),
                    field,
                    target
                ));
            }
        }
    }

    start_resolves
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

struct Frame<'a> {
    id: &'a str,
    edges: Vec<RawEdge<'a>>,
    next: usize,
}

/// Three-color DFS from `start`; returns every visited id.
///
/// Iterative so that a long chain cannot exhaust the call stack. A node
/// absent from `colors` is white.
fn check_cycles<'a>(
    start: &'a str,
    index: &HashMap<&'a str, &'a RawNode>,
    report: &mut ValidationReport,
) -> HashSet<&'a str> {
    let mut colors: HashMap<&str, Color> = HashMap::with_capacity(index.len());
    let mut stack: Vec<Frame<'a>> = Vec::new();

    let Some(&start_node) = index.get(start) else {
        return HashSet::new();
    };
    colors.insert(start, Color::Gray);
    stack.push(Frame {
        id: start,
        edges: start_node.edges(),
        next: 0,
    });

    while let Some(frame) = stack.last_mut() {
        if frame.next >= frame.edges.len() {
            colors.insert(frame.id, Color::Black);
            stack.pop();
            continue;
        }

        let target = frame.edges[frame.next].target;
        frame.next += 1;

        let Some(&target_node) = index.get(target) else {
            // Dangling; already reported by the reference check.
            continue;
        };

        match colors.get(target) {
            None => {
                colors.insert(target, Color::Gray);
                stack.push(Frame {
                    id: target,
                    edges: target_node.edges(),
                    next: 0,
                });
            }
            Some(Color::Gray) => {
                let entry = stack.iter().position(|f| f.id == target).unwrap_or(0);
                let mut path: Vec<&str> = stack[entry..].iter().map(|f| f.id).collect();
                path.push(target);
                report.error(format!("cycle detected: {}", path.join(" -> ")));
            }
            Some(Color::Black) => {}
        }
    }

    colors.into_keys().collect()
}

fn check_reachability(
    document: &TreeDocument,
    index: &HashMap<&str, &RawNode>,
    visited: &HashSet<&str>,
    report: &mut ValidationReport,
) {
    let start = document.start_node_id.trim();
    let mut warned = HashSet::new();

    for node in &document.nodes {
        let id = node.id.trim();
        if id.is_empty() || !index.contains_key(id) {
            continue;
        }
        if !visited.contains(id) && warned.insert(id) {
            report.warning(format!(
                "node '{}' is unreachable from start node '{}'",
                id, start
            ));
        }
    }
}

fn node_label(node: &RawNode, position: usize) -> String {
    let id = node.id.trim();
    if id.is_empty() {
        format!("#{}", position)
    } else {
        format!("'{}'", id)
    }
}

fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().map_or(true, |s| s.trim().is_empty())
}
