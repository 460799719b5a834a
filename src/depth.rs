//! Longest-path estimate used for "step N of M" progress display.

use std::collections::{HashMap, HashSet};

use crate::tree::DiagnosisTree;

struct Frame<'a> {
    id: &'a str,
    successors: Vec<&'a str>,
    next: usize,
    deepest: usize,
}

/// Number of nodes on the longest path from the start node to a result.
///
/// Memoized DFS: a result counts 1, a step `1 + depth(next)`, a question
/// `1 + max(depth(yes), depth(no))`. The walk never trusts its input:
/// a node already on the stack counts 1 and is not memoized, a missing
/// target counts 0, and a missing start node gives 1. The traversal is
/// iterative, so chain length is bounded by memory, not the call stack.
pub fn estimate_max_depth(tree: &DiagnosisTree) -> usize {
    let Some(start) = tree.start_node() else {
        return 1;
    };

    let mut memo: HashMap<&str, usize> = HashMap::new();
    let mut on_stack: HashSet<&str> = HashSet::new();
    let mut stack = vec![Frame {
        id: start.id(),
        successors: start.successors(),
        next: 0,
        deepest: 0,
    }];
    on_stack.insert(start.id());
    let mut max_depth = 1;

    while let Some(frame) = stack.last_mut() {
        if frame.next < frame.successors.len() {
            let child = frame.successors[frame.next];
            frame.next += 1;

            let known = if let Some(&depth) = memo.get(child) {
                Some(depth)
            } else if on_stack.contains(child) {
                Some(1)
            } else if tree.node(child).is_none() {
                Some(0)
            } else {
                None
            };

            match (known, tree.node(child)) {
                (Some(depth), _) => frame.deepest = frame.deepest.max(depth),
                (None, Some(node)) => {
                    on_stack.insert(node.id());
                    stack.push(Frame {
                        id: node.id(),
                        successors: node.successors(),
                        next: 0,
                        deepest: 0,
                    });
                }
                (None, None) => {}
            }
            continue;
        }

        let depth = 1 + frame.deepest;
        let id = frame.id;
        stack.pop();
        on_stack.remove(id);
        memo.insert(id, depth);

        match stack.last_mut() {
            Some(parent) => parent.deepest = parent.deepest.max(depth),
            None => max_depth = depth,
        }
    }

    max_depth.max(1)
}
