//! Fluent assertions over parse trees
//!
//!     Every assertion returns the builder, so checks chain; `child` moves the builder down.
//!     Failure messages carry the path walked so far (`s > [0] e > [2]`).

use crate::interpreter::ParserInterpreter;
use crate::recognizer::GrammarInfo;
use crate::tree::{Node, NodeId, ParseTree};

// ============================================================================
// Entry Points
// ============================================================================

/// Assertions on the tree an interpreter built, starting at `node`.
pub fn assert_tree(interpreter: &ParserInterpreter, node: NodeId) -> NodeAssertion<'_> {
    assert_node(interpreter.tree(), interpreter.grammar().info(), node)
}

pub fn assert_node<'a>(tree: &'a ParseTree, info: &'a GrammarInfo, node: NodeId) -> NodeAssertion<'a> {
    NodeAssertion {
        tree,
        info,
        node,
        context: describe(tree, info, node),
    }
}

fn describe(tree: &ParseTree, info: &GrammarInfo, node: NodeId) -> String {
    match tree.get(node) {
        Some(Node::Rule(rule)) => info.rule_name(rule.rule_index),
        Some(Node::Terminal { token, .. }) => format!("'{}'", token.text()),
        Some(Node::Error { token, .. }) => format!("error '{}'", token.text()),
        None => format!("{} (missing)", node),
    }
}

// ============================================================================
// Node Assertions
// ============================================================================

pub struct NodeAssertion<'a> {
    tree: &'a ParseTree,
    info: &'a GrammarInfo,
    node: NodeId,
    context: String,
}

impl<'a> NodeAssertion<'a> {
    pub fn id(&self) -> NodeId {
        self.node
    }

    /// Assert this node is an invocation of rule `name`.
    pub fn rule(self, name: &str) -> Self {
        match self.tree.rule(self.node) {
            Some(rule) => {
                let actual = self.info.rule_name(rule.rule_index);
                assert_eq!(actual, name, "{}: expected rule {}, found rule {}", self.context, name, actual);
            }
            None => panic!("{}: expected rule {}, found a token node", self.context, name),
        }
        self
    }

    /// Assert this node is a regular (non-error) terminal with the given text.
    pub fn terminal(self, text: &str) -> Self {
        match self.tree.get(self.node) {
            Some(Node::Terminal { token, .. }) => {
                assert_eq!(token.text(), text, "{}: terminal text mismatch", self.context)
            }
            _ => panic!("{}: expected terminal '{}'", self.context, text),
        }
        self
    }

    /// Assert this node was consumed or conjured by error recovery.
    pub fn error_node(self, text: &str) -> Self {
        match self.tree.get(self.node) {
            Some(Node::Error { token, .. }) => {
                assert_eq!(token.text(), text, "{}: error node text mismatch", self.context)
            }
            _ => panic!("{}: expected error node '{}'", self.context, text),
        }
        self
    }

    pub fn child_count(self, expected: usize) -> Self {
        let actual = self.tree.children(self.node).len();
        assert_eq!(actual, expected, "{}: expected {} children, found {}", self.context, expected, actual);
        self
    }

    /// Assert the outer alternative recorded for this rule node.
    pub fn alt(self, expected: usize) -> Self {
        let actual = self.tree.rule(self.node).map(|r| r.alt_number);
        assert_eq!(actual, Some(expected), "{}: alternative mismatch", self.context);
        self
    }

    /// Assert the concatenated token text under this node.
    pub fn text(self, expected: &str) -> Self {
        assert_eq!(self.tree.text(self.node), expected, "{}: text mismatch", self.context);
        self
    }

    /// Assert the LISP rendering of this subtree.
    pub fn renders(self, expected: &str) -> Self {
        assert_eq!(
            self.tree.to_string_tree(self.node, self.info),
            expected,
            "{}: rendering mismatch",
            self.context
        );
        self
    }

    /// Assert the rule ended early with a recognition error.
    pub fn has_exception(self) -> Self {
        let failed = self.tree.rule(self.node).is_some_and(|r| r.exception.is_some());
        assert!(failed, "{}: expected the rule to record an error", self.context);
        self
    }

    /// Descend to child `index`.
    pub fn child(&self, index: usize) -> NodeAssertion<'a> {
        let Some(child) = self.tree.child(self.node, index) else {
            panic!(
                "{}: no child {} (has {})",
                self.context,
                index,
                self.tree.children(self.node).len()
            );
        };
        NodeAssertion {
            tree: self.tree,
            info: self.info,
            node: child,
            context: format!("{} > [{}] {}", self.context, index, describe(self.tree, self.info, child)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::parse_expression;

    #[test]
    fn test_walks_expression_tree() {
        let (interpreter, root) = parse_expression("1 + x");
        let sum = assert_tree(&interpreter, root).rule("s").child_count(2).child(0);
        sum.child(0).rule("e").alt(2).text("1");
        sum.child(1).terminal("+");
        sum.child(2).rule("e").alt(3).child(0).terminal("x");
        assert_tree(&interpreter, root).child(1).terminal("<EOF>");
    }

    #[test]
    #[should_panic(expected = "expected rule e")]
    fn test_wrong_rule_panics() {
        let (interpreter, root) = parse_expression("1");
        assert_tree(&interpreter, root).rule("e");
    }
}
