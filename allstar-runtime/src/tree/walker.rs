//! Tree traversal
//!
//!     Two ways to walk a finished tree:
//!
//!         - [ParseTreeListener] + [ParseTreeWalker]: depth-first, with enter/exit events for
//!           rule nodes. The walker keeps its own stack, so deep trees cannot overflow.
//!         - [ParseTreeVisitor]: the caller drives the recursion and each visit returns a
//!           value, aggregated over children by default.
//!
//!     Parse listeners registered on a parser receive the same events while the tree is
//!     being built.

use super::{Node, NodeId, ParseTree};

pub trait ParseTreeListener {
    fn visit_terminal(&mut self, _tree: &ParseTree, _node: NodeId) {}
    fn visit_error_node(&mut self, _tree: &ParseTree, _node: NodeId) {}

    fn enter_every_rule(&mut self, _tree: &ParseTree, _ctx: NodeId) {}
    fn exit_every_rule(&mut self, _tree: &ParseTree, _ctx: NodeId) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ParseTreeWalker;

enum Step {
    Enter(NodeId),
    Exit(NodeId),
}

impl ParseTreeWalker {
    pub fn walk(listener: &mut dyn ParseTreeListener, tree: &ParseTree, root: NodeId) {
        let mut stack = vec![Step::Enter(root)];
        while let Some(step) = stack.pop() {
            match step {
                Step::Enter(id) => match tree.node(id) {
                    Node::Terminal { .. } => listener.visit_terminal(tree, id),
                    Node::Error { .. } => listener.visit_error_node(tree, id),
                    Node::Rule(rule) => {
                        listener.enter_every_rule(tree, id);
                        stack.push(Step::Exit(id));
                        stack.extend(rule.children.iter().rev().map(|&child| Step::Enter(child)));
                    }
                },
                Step::Exit(id) => listener.exit_every_rule(tree, id),
            }
        }
    }
}

/// A visitor computing a `T` per node.
pub trait ParseTreeVisitor<T: Default> {
    fn visit(&mut self, tree: &ParseTree, node: NodeId) -> T {
        match tree.node(node) {
            Node::Rule(_) => self.visit_rule(tree, node),
            Node::Terminal { .. } => self.visit_terminal(tree, node),
            Node::Error { .. } => self.visit_error_node(tree, node),
        }
    }

    fn visit_rule(&mut self, tree: &ParseTree, node: NodeId) -> T {
        self.visit_children(tree, node)
    }

    fn visit_children(&mut self, tree: &ParseTree, node: NodeId) -> T {
        let mut result = T::default();
        for &child in tree.children(node) {
            if !self.should_visit_next_child(tree, node, &result) {
                break;
            }
            let child_result = self.visit(tree, child);
            result = self.aggregate_result(result, child_result);
        }
        result
    }

    fn visit_terminal(&mut self, _tree: &ParseTree, _node: NodeId) -> T {
        T::default()
    }

    fn visit_error_node(&mut self, _tree: &ParseTree, _node: NodeId) -> T {
        T::default()
    }

    /// Combines the result so far with the next child's. Keeps the child's by default.
    fn aggregate_result(&mut self, _aggregate: T, next: T) -> T {
        next
    }

    fn should_visit_next_child(&mut self, _tree: &ParseTree, _node: NodeId, _current: &T) -> bool {
        true
    }
}
