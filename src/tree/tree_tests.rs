//! Unit tests for the tree schema, wire document and locale resolution.

use super::fixtures::{document, question, result, scenario, step};
use super::*;
use crate::error::EngineError;
use pretty_assertions::assert_eq;
use serde_json::json;

// ============================================================================
// NodeKind tests
// ============================================================================

#[test]
fn test_node_kind_from_str() {
    assert_eq!("question".parse::<NodeKind>().unwrap(), NodeKind::Question);
    assert_eq!("Step".parse::<NodeKind>().unwrap(), NodeKind::Step);
    assert_eq!(" RESULT ".parse::<NodeKind>().unwrap(), NodeKind::Result);
    assert!("decision".parse::<NodeKind>().is_err());
}

#[test]
fn test_node_kind_display() {
    assert_eq!(NodeKind::Question.to_string(), "question");
    assert_eq!(NodeKind::Step.to_string(), "step");
    assert_eq!(NodeKind::Result.to_string(), "result");
}

// ============================================================================
// Node tests
// ============================================================================

#[test]
fn test_node_successors_follow_variant() {
    let q = Node::Question {
        id: "q".into(),
        text: "?".into(),
        yes_next_id: "a".into(),
        no_next_id: "b".into(),
    };
    let s = Node::Step {
        id: "s".into(),
        text: "go".into(),
        next_id: "c".into(),
    };
    let r = Node::Result {
        id: "r".into(),
        text: "done".into(),
        actions: vec!["fix".into()],
        links: vec![],
    };

    assert_eq!(q.successors(), vec!["a", "b"]);
    assert_eq!(s.successors(), vec!["c"]);
    assert!(r.successors().is_empty());
    assert_eq!(r.actions(), Some(&["fix".to_string()][..]));
    assert!(q.actions().is_none());
    assert!(r.is_result());
}

#[test]
fn test_node_serializes_with_type_tag() {
    let node = Node::Question {
        id: "q1".into(),
        text: "Lamp on?".into(),
        yes_next_id: "a".into(),
        no_next_id: "b".into(),
    };
    let value = serde_json::to_value(&node).unwrap();
    assert_eq!(
        value,
        json!({"type": "question", "id": "q1", "text": "Lamp on?", "yesNextId": "a", "noNextId": "b"})
    );
}

// ============================================================================
// RawNode / TreeDocument parsing
// ============================================================================

#[test]
fn test_document_parses_camel_case_and_locale_fields() {
    let doc: TreeDocument = serde_json::from_value(json!({
        "treeId": "ev-charge",
        "title": "Charging fault",
        "category": "ev",
        "supportedModels": ["GV60"],
        "startNodeId": "q1",
        "nodes": [
            {"id": "q1", "type": "question", "text_ko": "충전등이 켜집니까?", "text_en": "Is the charge lamp on?",
             "yesNextId": "r1", "noNextId": "r1"},
            {"id": "r1", "type": "result", "text": "Inspect", "actions_en": ["Inspect OBC"],
             "links": [{"label": "Manual", "url": "/manuals/obc", "type": "manual"}]}
        ]
    }))
    .unwrap();

    assert_eq!(doc.tree_id, "ev-charge");
    assert_eq!(doc.supported_models, vec!["GV60".to_string()]);
    assert_eq!(doc.nodes[0].text_ko.as_deref(), Some("충전등이 켜집니까?"));
    assert_eq!(doc.nodes[0].yes_next_id.as_deref(), Some("r1"));
    let links = doc.nodes[1].links.as_ref().unwrap();
    assert_eq!(links[0].url_or_route, "/manuals/obc");
    assert_eq!(links[0].link_type, "manual");
}

#[test]
fn test_document_missing_fields_default_to_empty() {
    let doc: TreeDocument = serde_json::from_value(json!({"nodes": [{"id": "x"}]})).unwrap();
    assert!(doc.tree_id.is_empty());
    assert!(doc.start_node_id.is_empty());
    assert!(doc.nodes[0].node_type.is_empty());
    assert!(doc.nodes[0].kind().is_none());
}

#[test]
fn test_resolved_text_prefers_locale_then_neutral_then_other() {
    let mut node = question("q1", "a", "b");
    node.text = Some("neutral".into());
    node.text_ko = Some("한국어".into());
    node.text_en = None;

    assert_eq!(node.resolved_text(Locale::Ko), Some("한국어"));
    assert_eq!(node.resolved_text(Locale::En), Some("neutral"));

    node.text = None;
    assert_eq!(node.resolved_text(Locale::En), Some("한국어"));

    node.text_ko = Some("   ".into());
    assert_eq!(node.resolved_text(Locale::En), None);
    assert!(!node.has_text());
}

#[test]
fn test_resolved_actions_skips_blank_lists() {
    let mut node = result("r1", &[]);
    node.actions = Some(vec!["  ".into()]);
    node.actions_en = Some(vec!["Replace fuse".into()]);

    assert_eq!(node.resolved_actions(Locale::Ko), vec!["Replace fuse".to_string()]);
    assert!(node.has_actions());

    node.actions_en = None;
    assert!(!node.has_actions());
}

#[test]
fn test_raw_edges_depend_on_type() {
    let mut q = question("q1", "a", " ");
    q.next_id = Some("ignored".into());
    let edges = q.edges();
    assert_eq!(edges.len(), 1);
    assert_eq!(edges[0].field, "yesNextId");
    assert_eq!(edges[0].target, "a");

    let s = step("s1", "b");
    assert_eq!(s.edges()[0].field, "nextId");

    let r = result("r1", &["x"]);
    assert!(r.edges().is_empty());
}

#[test]
fn test_upload_payload_accepts_single_and_array() {
    let one = UploadPayload::from_json(r#"{"treeId": "a"}"#).unwrap();
    assert_eq!(one.into_documents().len(), 1);

    let many = UploadPayload::from_json(r#"[{"treeId": "a"}, {"treeId": "b"}]"#).unwrap();
    let docs = many.into_documents();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[1].tree_id, "b");
}

// ============================================================================
// Resolution into DiagnosisTree
// ============================================================================

#[test]
fn test_resolve_builds_typed_tree() {
    let tree = scenario().resolve(Locale::Ko).unwrap();

    assert_eq!(tree.tree_id(), "no-start");
    assert_eq!(tree.start_node_id(), "q1");
    assert_eq!(tree.node_count(), 4);
    assert_eq!(tree.result_count(), 2);
    assert!(tree.supports_model("GV80"));
    assert!(!tree.supports_model("Sonata"));
    assert_eq!(tree.start_node().map(Node::kind), Some(NodeKind::Question));
    assert_eq!(
        tree.node("r2").and_then(Node::actions),
        Some(&["replace fuse".to_string()][..])
    );
}

#[test]
fn test_resolve_uses_requested_locale() {
    let mut doc = scenario();
    doc.nodes[0].text = None;
    doc.nodes[0].text_ko = Some("시동이 걸립니까?".into());
    doc.nodes[0].text_en = Some("Does it crank?".into());

    let ko = doc.resolve(Locale::Ko).unwrap();
    let en = doc.resolve(Locale::En).unwrap();
    assert_eq!(ko.node("q1").unwrap().text(), "시동이 걸립니까?");
    assert_eq!(en.node("q1").unwrap().text(), "Does it crank?");
}

#[test]
fn test_resolve_rejects_invalid_document() {
    let doc = document("broken", "q1", vec![question("q1", "nowhere", "r1")]);
    let err = doc.resolve(Locale::Ko).unwrap_err();
    match err {
        EngineError::InvalidTree { tree_id, errors } => {
            assert_eq!(tree_id, "broken");
            assert!(!errors.is_empty());
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn test_tree_lowers_back_to_equivalent_document() {
    let tree = scenario().resolve(Locale::Ko).unwrap();
    let lowered = TreeDocument::from(&tree);

    assert_eq!(lowered.tree_id, "no-start");
    assert_eq!(lowered.nodes.len(), 4);
    assert_eq!(lowered.nodes[0].yes_next_id.as_deref(), Some("step1"));
    assert_eq!(lowered.resolve(Locale::Ko).unwrap(), tree);
}

#[test]
fn test_duplicate_ids_first_node_wins_lookup() {
    let tree = DiagnosisTree::new(
        "dup",
        "Dup",
        "misc",
        ["GV80"],
        "r",
        vec![
            Node::Result {
                id: "r".into(),
                text: "first".into(),
                actions: vec!["a".into()],
                links: vec![],
            },
            Node::Result {
                id: "r".into(),
                text: "second".into(),
                actions: vec!["b".into()],
                links: vec![],
            },
        ],
    );
    assert_eq!(tree.node("r").unwrap().text(), "first");
}
