//! Builders shared by unit tests across modules.

use super::{RawNode, TreeDocument};

pub(crate) fn question(id: &str, yes: &str, no: &str) -> RawNode {
    RawNode {
        id: id.to_string(),
        node_type: "question".to_string(),
        text: Some(format!("{}?", id)),
        yes_next_id: Some(yes.to_string()),
        no_next_id: Some(no.to_string()),
        ..RawNode::default()
    }
}

pub(crate) fn step(id: &str, next: &str) -> RawNode {
    RawNode {
        id: id.to_string(),
        node_type: "step".to_string(),
        text: Some(format!("do {}", id)),
        next_id: Some(next.to_string()),
        ..RawNode::default()
    }
}

pub(crate) fn result(id: &str, actions: &[&str]) -> RawNode {
    RawNode {
        id: id.to_string(),
        node_type: "result".to_string(),
        text: Some(format!("result {}", id)),
        actions: Some(actions.iter().map(|a| a.to_string()).collect()),
        ..RawNode::default()
    }
}

pub(crate) fn document(tree_id: &str, start: &str, nodes: Vec<RawNode>) -> TreeDocument {
    TreeDocument {
        tree_id: tree_id.to_string(),
        title: format!("{} title", tree_id),
        category: "electrical".to_string(),
        supported_models: vec!["GV80".to_string(), "G90".to_string()],
        start_node_id: start.to_string(),
        nodes,
    }
}

/// q1 -yes-> step1 -> r2, q1 -no-> r1.
pub(crate) fn scenario() -> TreeDocument {
    document(
        "no-start",
        "q1",
        vec![
            question("q1", "step1", "r1"),
            step("step1", "r2"),
            result("r1", &["check battery"]),
            result("r2", &["replace fuse"]),
        ],
    )
}
