//! Parse trees
//!
//!     The interpreter builds one tree per parse, stored as an arena: nodes live in a `Vec`
//!     and refer to each other by [NodeId]. Parent links make the tree walkable in both
//!     directions without reference cycles, and ids stay valid while the parser rewires
//!     nodes (left-recursion contexts are re-parented as operators are found).
//!
//!     Three kinds of node:
//!
//!         - rule nodes, one per rule invocation, spanning `start..=stop` tokens;
//!         - terminals, one per matched token;
//!         - error nodes, tokens consumed or conjured during error recovery.
//!
//!     The rule node of the current invocation doubles as the parser's rule context: its
//!     chain of invoking states is the call stack prediction uses.

pub mod trees;
pub mod walker;

use crate::error::RecognitionError;
use crate::recognizer::GrammarInfo;
use crate::token::{escape_whitespace, Token};
use serde::Serialize;
use std::fmt;

pub use walker::{ParseTreeListener, ParseTreeVisitor, ParseTreeWalker};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
pub struct RuleNode {
    pub rule_index: usize,
    /// ATN state that invoked this rule; `None` for the start rule.
    pub invoking_state: Option<usize>,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub start: Option<Token>,
    pub stop: Option<Token>,
    /// The error that ended this rule early, if any.
    pub exception: Option<RecognitionError>,
    /// Outer alternative taken, recorded by the interpreter.
    pub alt_number: usize,
}

#[derive(Debug, Clone)]
pub enum Node {
    Rule(RuleNode),
    Terminal { token: Token, parent: Option<NodeId> },
    Error { token: Token, parent: Option<NodeId> },
}

impl Node {
    pub fn parent(&self) -> Option<NodeId> {
        match self {
            Node::Rule(rule) => rule.parent,
            Node::Terminal { parent, .. } | Node::Error { parent, .. } => *parent,
        }
    }

    pub fn children(&self) -> &[NodeId] {
        match self {
            Node::Rule(rule) => &rule.children,
            _ => &[],
        }
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            Node::Terminal { token, .. } | Node::Error { token, .. } => Some(token),
            Node::Rule(_) => None,
        }
    }

    pub fn as_rule(&self) -> Option<&RuleNode> {
        match self {
            Node::Rule(rule) => Some(rule),
            _ => None,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Node::Error { .. })
    }
}

#[derive(Debug, Clone, Default)]
pub struct ParseTree {
    nodes: Vec<Node>,
}

impl ParseTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn get(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn rule(&self, id: NodeId) -> Option<&RuleNode> {
        self.get(id).and_then(Node::as_rule)
    }

    pub fn rule_mut(&mut self, id: NodeId) -> Option<&mut RuleNode> {
        match self.nodes.get_mut(id.0) {
            Some(Node::Rule(rule)) => Some(rule),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.get(id).and_then(Node::parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.get(id).map(Node::children).unwrap_or(&[])
    }

    pub fn child(&self, id: NodeId, i: usize) -> Option<NodeId> {
        self.children(id).get(i).copied()
    }

    /// A detached rule node; attach it with [ParseTree::add_child].
    pub fn add_rule(&mut self, rule_index: usize, parent: Option<NodeId>, invoking_state: Option<usize>) -> NodeId {
        self.push(Node::Rule(RuleNode {
            rule_index,
            invoking_state,
            parent,
            children: Vec::new(),
            start: None,
            stop: None,
            exception: None,
            alt_number: 0,
        }))
    }

    /// Appends a terminal for `token` under `parent`.
    pub fn add_terminal(&mut self, parent: NodeId, token: Token) -> NodeId {
        let id = self.push(Node::Terminal {
            token,
            parent: Some(parent),
        });
        self.add_child(parent, id);
        id
    }

    pub fn add_error_node(&mut self, parent: NodeId, token: Token) -> NodeId {
        let id = self.push(Node::Error {
            token,
            parent: Some(parent),
        });
        self.add_child(parent, id);
        id
    }

    /// A token node that knows its parent but is not among its children. Parsers that do not
    /// build trees still hand these to parse listeners.
    pub fn add_detached_token(&mut self, parent: NodeId, token: Token, error: bool) -> NodeId {
        let parent = Some(parent);
        if error {
            self.push(Node::Error { token, parent })
        } else {
            self.push(Node::Terminal { token, parent })
        }
    }

    pub fn add_child(&mut self, parent: NodeId, child: NodeId) {
        if let Some(rule) = self.rule_mut(parent) {
            rule.children.push(child);
        }
    }

    pub fn set_parent(&mut self, id: NodeId, new_parent: Option<NodeId>) {
        match self.nodes.get_mut(id.0) {
            Some(Node::Rule(rule)) => rule.parent = new_parent,
            Some(Node::Terminal { parent, .. }) | Some(Node::Error { parent, .. }) => *parent = new_parent,
            None => {}
        }
    }

    pub fn remove_last_child(&mut self, parent: NodeId) -> Option<NodeId> {
        self.rule_mut(parent).and_then(|rule| rule.children.pop())
    }

    fn push(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Invoking states from `ctx` up to the root, innermost first.
    pub fn invoking_states(&self, ctx: Option<NodeId>) -> Vec<usize> {
        let mut states = Vec::new();
        let mut current = ctx;
        while let Some(id) = current {
            let Some(rule) = self.rule(id) else {
                break;
            };
            match rule.invoking_state {
                Some(state) => states.push(state),
                None => break,
            }
            current = rule.parent;
        }
        states
    }

    /// Number of rule nodes from `id` to the root, inclusive.
    pub fn depth(&self, id: NodeId) -> usize {
        let mut depth = 0;
        let mut current = Some(id);
        while let Some(node) = current {
            depth += 1;
            current = self.parent(node);
        }
        depth
    }

    /// Concatenated token text under `id`, error nodes included.
    pub fn text(&self, id: NodeId) -> String {
        match self.node(id) {
            Node::Terminal { token, .. } | Node::Error { token, .. } => token.text().to_string(),
            Node::Rule(rule) => rule.children.iter().map(|&child| self.text(child)).collect(),
        }
    }

    /// LISP-style rendering: `(rule child child)` with terminals as their text.
    pub fn to_string_tree(&self, id: NodeId, info: &GrammarInfo) -> String {
        match self.node(id) {
            Node::Terminal { token, .. } | Node::Error { token, .. } => escape_whitespace(token.text()),
            Node::Rule(rule) => {
                let name = escape_whitespace(&info.rule_name(rule.rule_index));
                if rule.children.is_empty() {
                    return name;
                }
                let mut out = format!("({}", name);
                for &child in &rule.children {
                    out.push(' ');
                    out.push_str(&self.to_string_tree(child, info));
                }
                out.push(')');
                out
            }
        }
    }

    /// Source range covered by the rule at `id`, as token indexes.
    pub fn source_interval(&self, id: NodeId) -> Option<(usize, usize)> {
        match self.node(id) {
            Node::Terminal { token, .. } | Node::Error { token, .. } => token.token_index.map(|i| (i, i)),
            Node::Rule(rule) => {
                let start = rule.start.as_ref()?.token_index?;
                let stop = rule.stop.as_ref()?.token_index?;
                Some((start, stop))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> GrammarInfo {
        GrammarInfo {
            rule_names: vec!["s".to_string(), "e".to_string()],
            ..Default::default()
        }
    }

    #[test]
    fn test_string_tree() {
        let mut tree = ParseTree::new();
        let root = tree.add_rule(0, None, None);
        let inner = tree.add_rule(1, Some(root), Some(3));
        tree.add_child(root, inner);
        tree.add_terminal(inner, Token::new(1, "x"));
        tree.add_terminal(root, Token::new(2, "\t"));
        assert_eq!(tree.to_string_tree(root, &info()), "(s (e x) \\t)");
        assert_eq!(tree.text(root), "x\t");
        assert_eq!(tree.depth(inner), 2);
    }

    #[test]
    fn test_invoking_states_stop_at_root() {
        let mut tree = ParseTree::new();
        let root = tree.add_rule(0, None, None);
        let a = tree.add_rule(1, Some(root), Some(3));
        let b = tree.add_rule(1, Some(a), Some(7));
        assert_eq!(tree.invoking_states(Some(b)), vec![7, 3]);
        assert!(tree.invoking_states(None).is_empty());
    }

    #[test]
    fn test_reparenting() {
        let mut tree = ParseTree::new();
        let root = tree.add_rule(0, None, None);
        let old = tree.add_rule(1, Some(root), Some(3));
        tree.add_child(root, old);
        assert_eq!(tree.remove_last_child(root), Some(old));
        let new = tree.add_rule(1, Some(root), Some(3));
        tree.add_child(root, new);
        tree.set_parent(old, Some(new));
        tree.add_child(new, old);
        assert_eq!(tree.children(root), &[new]);
        assert_eq!(tree.parent(old), Some(new));
    }
}
