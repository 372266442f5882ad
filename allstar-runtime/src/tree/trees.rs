//! Tree queries

use super::{Node, NodeId, ParseTree};

/// `root` and every node below it, in pre-order.
pub fn descendants(tree: &ParseTree, root: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut stack = vec![root];
    while let Some(id) = stack.pop() {
        out.push(id);
        stack.extend(tree.children(id).iter().rev().copied());
    }
    out
}

pub fn find_all_rule_nodes(tree: &ParseTree, root: NodeId, rule_index: usize) -> Vec<NodeId> {
    descendants(tree, root)
        .into_iter()
        .filter(|&id| tree.rule(id).is_some_and(|rule| rule.rule_index == rule_index))
        .collect()
}

/// Terminals (not error nodes) of the given token type.
pub fn find_all_token_nodes(tree: &ParseTree, root: NodeId, token_type: i32) -> Vec<NodeId> {
    descendants(tree, root)
        .into_iter()
        .filter(|&id| matches!(tree.node(id), Node::Terminal { token, .. } if token.token_type == token_type))
        .collect()
}

/// Parents of `id` up to the root, nearest first.
pub fn ancestors(tree: &ParseTree, id: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut current = tree.parent(id);
    while let Some(parent) = current {
        out.push(parent);
        current = tree.parent(parent);
    }
    out
}

pub fn is_ancestor_of(tree: &ParseTree, ancestor: NodeId, id: NodeId) -> bool {
    ancestors(tree, id).contains(&ancestor)
}

/// The deepest rule node under `root` whose token range covers `start..=stop`.
pub fn root_of_subtree_enclosing_region(tree: &ParseTree, root: NodeId, start: usize, stop: usize) -> Option<NodeId> {
    let (node_start, node_stop) = tree.source_interval(root)?;
    if tree.rule(root).is_none() || start < node_start || stop > node_stop {
        return None;
    }
    for &child in tree.children(root) {
        if let Some(found) = root_of_subtree_enclosing_region(tree, child, start, stop) {
            return Some(found);
        }
    }
    Some(root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    fn token(token_type: i32, text: &str, index: usize) -> Token {
        let mut token = Token::new(token_type, text);
        token.token_index = Some(index);
        token
    }

    #[test]
    fn test_queries() {
        let mut tree = ParseTree::new();
        let root = tree.add_rule(0, None, None);
        let inner = tree.add_rule(1, Some(root), Some(4));
        tree.add_child(root, inner);
        let x = tree.add_terminal(inner, token(5, "x", 0));
        tree.add_terminal(root, token(6, "y", 1));
        for (id, start, stop) in [(root, 0, 1), (inner, 0, 0)] {
            let rule = tree.rule_mut(id).unwrap();
            rule.start = Some(token(5, "x", start));
            rule.stop = Some(token(5, "x", stop));
        }

        assert_eq!(find_all_rule_nodes(&tree, root, 1), vec![inner]);
        assert_eq!(find_all_token_nodes(&tree, root, 6).len(), 1);
        assert_eq!(ancestors(&tree, x), vec![inner, root]);
        assert!(is_ancestor_of(&tree, root, x));
        assert_eq!(root_of_subtree_enclosing_region(&tree, root, 0, 0), Some(inner));
        assert_eq!(root_of_subtree_enclosing_region(&tree, root, 0, 1), Some(root));
    }
}
