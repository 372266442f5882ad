//! Parser state
//!
//!     [Parser] is everything the interpreter mutates while it walks the ATN: the token
//!     stream, the parse tree under construction, the current rule context and ATN state,
//!     the precedence stack of left-recursive invocations, and the bookkeeping of the error
//!     strategy. The interpreter decides where to go; the parser knows how to enter and
//!     leave rules, match tokens and report errors.
//!
//! Rule contexts
//!
//!     A rule context is a rule node of the [ParseTree]. Entering a rule makes a node the
//!     current context; leaving it restores the parent. Left-recursive rules are the one
//!     place where contexts move: each time an operator suffix is found, the context built
//!     so far becomes the first child of a fresh context for the same rule
//!     ([Parser::push_new_recursion_context]), and the finished chain is attached to the
//!     caller when the rule ends ([Parser::unroll_recursion_contexts]).
//!
//!     Parse listeners see one enter and one exit per context, also for the contexts that
//!     left recursion re-parents.

use crate::error::{Failure, ParseError, RecognitionError};
use crate::error_listener::{ErrorListener, ErrorListeners, SyntaxError};
use crate::error_strategy::{strategy_for, ErrorStrategy};
use crate::interval_set::IntervalSet;
use crate::options::ParserOptions;
use crate::recognizer::{AcceptAll, Grammar, SemanticHooks};
use crate::semantic_context::PredicateEvaluator;
use crate::simulator::PredictionHost;
use crate::stream::TokenStream;
use crate::token::{Token, EOF, EPSILON};
use crate::tree::{NodeId, ParseTree, ParseTreeListener};
use std::collections::HashSet;
use std::sync::Arc;

/// Marks "no state", such as the parser's state before the first rule is entered.
pub const INVALID_STATE_NUMBER: usize = usize::MAX;

/// Bookkeeping of the error strategy, kept on the parser so that strategies are stateless.
#[derive(Debug, Clone, Default)]
pub struct RecoveryState {
    /// Set after an error is reported, cleared by the next successful match.
    pub error_recovery_mode: bool,
    pub last_error_index: Option<usize>,
    pub last_error_states: HashSet<usize>,
    /// Where `sync` last saw a rule end reachable, for the expected set of a later mismatch.
    pub next_tokens_ctx: Option<NodeId>,
    pub next_tokens_state: Option<usize>,
}

pub struct Parser {
    grammar: Grammar,
    input: Box<dyn TokenStream>,
    tree: ParseTree,
    ctx: Option<NodeId>,
    state: usize,
    precedence_stack: Vec<i32>,
    depth: usize,
    matched_eof: bool,
    syntax_errors: usize,
    options: ParserOptions,
    recovery: RecoveryState,
    strategy: Arc<dyn ErrorStrategy>,
    listeners: ErrorListeners,
    parse_listeners: Vec<Box<dyn ParseTreeListener>>,
    hooks: Box<dyn SemanticHooks>,
}

impl Parser {
    pub fn new(grammar: Grammar, input: Box<dyn TokenStream>) -> Self {
        let options = ParserOptions::default();
        Parser {
            grammar,
            input,
            tree: ParseTree::new(),
            ctx: None,
            state: INVALID_STATE_NUMBER,
            precedence_stack: vec![0],
            depth: 0,
            matched_eof: false,
            syntax_errors: 0,
            strategy: strategy_for(options.error_strategy),
            options,
            recovery: RecoveryState::default(),
            listeners: ErrorListeners::default(),
            parse_listeners: Vec::new(),
            hooks: Box::new(AcceptAll),
        }
    }

    /// Rewinds the input and drops the tree, ready for another parse of the same tokens.
    pub fn reset(&mut self) {
        self.input.seek(0);
        self.tree = ParseTree::new();
        self.ctx = None;
        self.state = INVALID_STATE_NUMBER;
        self.precedence_stack = vec![0];
        self.depth = 0;
        self.matched_eof = false;
        self.syntax_errors = 0;
        let strategy = Arc::clone(&self.strategy);
        strategy.reset(self);
        self.recovery = RecoveryState::default();
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Replaces the options; the error strategy follows `options.error_strategy`.
    pub fn set_options(&mut self, options: ParserOptions) {
        self.strategy = strategy_for(options.error_strategy);
        self.options = options;
    }

    pub fn set_error_strategy(&mut self, strategy: Arc<dyn ErrorStrategy>) {
        self.strategy = strategy;
    }

    pub fn error_strategy(&self) -> Arc<dyn ErrorStrategy> {
        Arc::clone(&self.strategy)
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn SemanticHooks>) {
        self.hooks = hooks;
    }

    pub fn add_error_listener(&mut self, listener: Box<dyn ErrorListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_error_listeners(&mut self) {
        self.listeners.remove_all();
    }

    pub fn error_listeners(&mut self) -> &mut ErrorListeners {
        &mut self.listeners
    }

    pub fn add_parse_listener(&mut self, listener: Box<dyn ParseTreeListener>) {
        self.parse_listeners.push(listener);
    }

    pub fn remove_parse_listeners(&mut self) {
        self.parse_listeners.clear();
    }

    pub fn tree(&self) -> &ParseTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut ParseTree {
        &mut self.tree
    }

    pub fn into_tree(self) -> ParseTree {
        self.tree
    }

    pub fn input_mut(&mut self) -> &mut dyn TokenStream {
        self.input.as_mut()
    }

    /// The current rule context.
    pub fn context(&self) -> Option<NodeId> {
        self.ctx
    }

    pub fn set_context(&mut self, ctx: Option<NodeId>) {
        self.ctx = ctx;
    }

    pub fn state(&self) -> usize {
        self.state
    }

    pub fn set_state(&mut self, state: usize) {
        self.state = state;
    }

    pub fn recovery(&self) -> &RecoveryState {
        &self.recovery
    }

    pub fn recovery_mut(&mut self) -> &mut RecoveryState {
        &mut self.recovery
    }

    pub fn number_of_syntax_errors(&self) -> usize {
        self.syntax_errors
    }

    /// Precedence of the innermost left-recursive invocation, -1 outside of any rule.
    pub fn precedence(&self) -> i32 {
        self.precedence_stack.last().copied().unwrap_or(-1)
    }

    pub fn la(&mut self, i: isize) -> i32 {
        self.input.la(i)
    }

    /// The token at the current position. Past the end of a stream without an EOF token,
    /// a synthetic EOF stands in.
    pub fn current_token(&mut self) -> Token {
        match self.input.lt(1) {
            Some(token) => token.clone(),
            None => Token::eof(None, 0, 0, 0),
        }
    }

    pub fn previous_token(&mut self) -> Option<Token> {
        self.input.lt(-1).cloned()
    }

    /// A fresh, detached rule context.
    pub fn new_context(&mut self, parent: Option<NodeId>, invoking_state: Option<usize>, rule_index: usize) -> NodeId {
        let ctx = self.tree.add_rule(rule_index, parent, invoking_state);
        if let Some(rule) = self.tree.rule_mut(ctx) {
            rule.alt_number = 1;
        }
        ctx
    }

    /// Consumes the current token and adds it to the current context: as a terminal
    /// normally, as an error node while the strategy is recovering.
    pub fn consume(&mut self) -> Token {
        let token = self.current_token();
        if token.token_type != EOF {
            self.input.consume();
        }
        if self.options.trace {
            log::trace!("consume {} rule {}", token, self.current_rule_name());
        }
        if !self.options.build_parse_trees && self.parse_listeners.is_empty() {
            return token;
        }
        let Some(ctx) = self.ctx else {
            return token;
        };
        let strategy = Arc::clone(&self.strategy);
        let error = strategy.in_error_recovery_mode(self);
        let node = match (self.options.build_parse_trees, error) {
            (true, true) => self.tree.add_error_node(ctx, token.clone()),
            (true, false) => self.tree.add_terminal(ctx, token.clone()),
            (false, error) => self.tree.add_detached_token(ctx, token.clone(), error),
        };
        for listener in self.parse_listeners.iter_mut() {
            if error {
                listener.visit_error_node(&self.tree, node);
            } else {
                listener.visit_terminal(&self.tree, node);
            }
        }
        token
    }

    /// Matches the current token against `token_type`, recovering inline on a mismatch.
    /// Tokens conjured by recovery are added to the tree as error nodes.
    pub fn match_token(&mut self, token_type: i32) -> Result<Token, Failure> {
        let matched = self.match_where(|t| t == token_type)?;
        if token_type == EOF && matched.token_type == EOF {
            self.matched_eof = true;
        }
        Ok(matched)
    }

    /// Matches any token but EOF.
    pub fn match_wildcard(&mut self) -> Result<Token, Failure> {
        self.match_where(|t| t > 0)
    }

    /// Matches the current token if `accept` says it belongs to the expected set.
    pub fn match_where(&mut self, accept: impl Fn(i32) -> bool) -> Result<Token, Failure> {
        let strategy = Arc::clone(&self.strategy);
        if accept(self.la(1)) {
            strategy.report_match(self);
            return Ok(self.consume());
        }
        let token = strategy.recover_inline(self)?;
        if self.options.build_parse_trees && token.token_index.is_none() {
            if let Some(ctx) = self.ctx {
                self.tree.add_error_node(ctx, token.clone());
            }
        }
        Ok(token)
    }

    fn enter_depth(&mut self, rule_index: usize) -> Result<(), ParseError> {
        if self.depth >= self.options.max_rule_depth {
            log::warn!("rule depth limit {} reached entering rule {}", self.options.max_rule_depth, rule_index);
            return Err(ParseError::DepthLimitExceeded {
                depth: self.depth + 1,
                rule_index,
            });
        }
        self.depth += 1;
        Ok(())
    }

    fn set_start(&mut self, ctx: NodeId) {
        let start = self.input.lt(1).cloned();
        if let Some(rule) = self.tree.rule_mut(ctx) {
            rule.start = start;
        }
    }

    fn set_stop(&mut self, ctx: NodeId, stop: Option<Token>) {
        if let Some(rule) = self.tree.rule_mut(ctx) {
            rule.stop = stop;
        }
    }

    pub fn enter_rule(&mut self, ctx: NodeId, state: usize, rule_index: usize) -> Result<(), ParseError> {
        self.enter_depth(rule_index)?;
        self.state = state;
        self.ctx = Some(ctx);
        self.set_start(ctx);
        if self.options.build_parse_trees {
            if let Some(parent) = self.tree.parent(ctx) {
                self.tree.add_child(parent, ctx);
            }
        }
        self.trigger_enter(ctx);
        Ok(())
    }

    pub fn exit_rule(&mut self) {
        let Some(ctx) = self.ctx else {
            return;
        };
        let stop = if self.matched_eof {
            self.input.lt(1).cloned()
        } else {
            self.input.lt(-1).cloned()
        };
        self.set_stop(ctx, stop);
        self.trigger_exit(ctx);
        self.finish_context(ctx);
        self.depth = self.depth.saturating_sub(1);
        let (invoking_state, parent) = match self.tree.rule(ctx) {
            Some(rule) => (rule.invoking_state, rule.parent),
            None => (None, None),
        };
        self.state = invoking_state.unwrap_or(INVALID_STATE_NUMBER);
        self.ctx = parent;
    }

    /// Records the outer alternative taken by `ctx` and makes it current.
    pub fn enter_outer_alt(&mut self, ctx: NodeId, alt: usize) {
        if let Some(rule) = self.tree.rule_mut(ctx) {
            rule.alt_number = alt;
        }
        if self.options.build_parse_trees && self.ctx != Some(ctx) {
            if let Some(parent) = self.tree.parent(ctx) {
                self.tree.remove_last_child(parent);
                self.tree.add_child(parent, ctx);
            }
        }
        self.ctx = Some(ctx);
    }

    /// Enters a left-recursive rule. The context is attached to its parent only when the
    /// rule ends, since further operators may wrap it first.
    pub fn enter_recursion_rule(&mut self, ctx: NodeId, state: usize, rule_index: usize, precedence: i32) -> Result<(), ParseError> {
        self.enter_depth(rule_index)?;
        self.state = state;
        self.precedence_stack.push(precedence);
        self.ctx = Some(ctx);
        self.set_start(ctx);
        self.trigger_enter(ctx);
        Ok(())
    }

    /// Makes the current context the first child of `ctx`, which becomes current. Called
    /// when the operator loop of a left-recursive rule takes another iteration.
    pub fn push_new_recursion_context(&mut self, ctx: NodeId, state: usize, _rule_index: usize) {
        let Some(previous) = self.ctx else {
            return;
        };
        let stop = self.input.lt(-1).cloned();
        self.set_stop(previous, stop);
        self.trigger_exit(previous);
        let start = self.tree.rule(previous).and_then(|rule| rule.start.clone());
        if let Some(rule) = self.tree.rule_mut(previous) {
            rule.parent = Some(ctx);
            rule.invoking_state = Some(state);
        }
        self.ctx = Some(ctx);
        if let Some(rule) = self.tree.rule_mut(ctx) {
            rule.start = start;
        }
        if self.options.build_parse_trees {
            self.tree.add_child(ctx, previous);
        }
        self.trigger_enter(ctx);
    }

    /// Ends a left-recursive rule: the outermost context built becomes a child of
    /// `parent`, which becomes current again.
    pub fn unroll_recursion_contexts(&mut self, parent: Option<NodeId>) {
        self.precedence_stack.pop();
        self.depth = self.depth.saturating_sub(1);
        let Some(ret) = self.ctx else {
            self.ctx = parent;
            return;
        };
        let stop = self.input.lt(-1).cloned();
        self.set_stop(ret, stop);
        let mut current = Some(ret);
        while let Some(id) = current {
            if current == parent {
                break;
            }
            self.trigger_exit(id);
            self.finish_context(id);
            current = self.tree.parent(id);
        }
        self.ctx = parent;
        self.tree.set_parent(ret, parent);
        if self.options.build_parse_trees {
            if let Some(parent) = parent {
                self.tree.add_child(parent, ret);
            }
        }
    }

    fn finish_context(&mut self, ctx: NodeId) {
        if self.options.trim_parse_trees {
            if let Some(rule) = self.tree.rule_mut(ctx) {
                rule.children.shrink_to_fit();
            }
        }
    }

    fn trigger_enter(&mut self, ctx: NodeId) {
        if self.options.trace {
            let rule = self.tree.rule(ctx).map(|r| r.rule_index).unwrap_or_default();
            let lt1 = self.current_token();
            log::trace!("enter   {}, LT(1)={}", self.grammar.info().rule_name(rule), lt1.text());
        }
        for listener in self.parse_listeners.iter_mut() {
            listener.enter_every_rule(&self.tree, ctx);
        }
    }

    fn trigger_exit(&mut self, ctx: NodeId) {
        for listener in self.parse_listeners.iter_mut().rev() {
            listener.exit_every_rule(&self.tree, ctx);
        }
        if self.options.trace {
            let rule = self.tree.rule(ctx).map(|r| r.rule_index).unwrap_or_default();
            let lt1 = self.current_token();
            log::trace!("exit    {}, LT(1)={}", self.grammar.info().rule_name(rule), lt1.text());
        }
    }

    fn current_rule_name(&self) -> String {
        match self.ctx.and_then(|ctx| self.tree.rule(ctx)) {
            Some(rule) => self.grammar.info().rule_name(rule.rule_index),
            None => "<none>".to_string(),
        }
    }

    /// Tokens acceptable at the current state, following the rule context outwards.
    pub fn expected_tokens(&self) -> IntervalSet {
        self.grammar
            .atn()
            .expected_tokens(self.state, self.tree.invoking_states(self.ctx))
    }

    /// Tokens acceptable at the current state without leaving the current rule.
    pub fn expected_tokens_within_current_rule(&self) -> IntervalSet {
        let mut tokens = self.grammar.atn().next_tokens(self.state).clone();
        tokens.remove(EPSILON);
        tokens
    }

    pub fn is_expected_token(&self, symbol: i32) -> bool {
        self.expected_tokens().contains(symbol)
    }

    /// Rule names from the current context to the root, innermost first.
    pub fn rule_invocation_stack(&self) -> Vec<String> {
        let mut stack = Vec::new();
        let mut current = self.ctx;
        while let Some(id) = current {
            let Some(rule) = self.tree.rule(id) else { break };
            stack.push(self.grammar.info().rule_name(rule.rule_index));
            current = rule.parent;
        }
        stack
    }

    /// Counts the error and hands it to every error listener.
    pub fn notify_error_listeners(&mut self, offending_token: Option<Token>, message: String, error: Option<RecognitionError>) {
        self.syntax_errors += 1;
        let (line, column) = offending_token
            .as_ref()
            .map(|token| (token.line, token.column))
            .unwrap_or((0, 0));
        let report = SyntaxError {
            source_name: self.input.source_name(),
            offending_token,
            line,
            column,
            message,
            error,
        };
        self.listeners.syntax_error(&report);
    }

    pub fn sempred(&mut self, ctx: Option<NodeId>, rule_index: usize, pred_index: usize) -> bool {
        self.hooks.sempred(&self.tree, ctx, rule_index, pred_index)
    }

    pub fn precpred(&self, _ctx: Option<NodeId>, precedence: i32) -> bool {
        precedence >= self.precedence()
    }

    pub fn action(&mut self, ctx: Option<NodeId>, rule_index: usize, action_index: usize) {
        self.hooks.action(&self.tree, ctx, rule_index, action_index);
    }
}

impl PredicateEvaluator for Parser {
    fn sempred(&mut self, ctx: Option<NodeId>, rule_index: usize, pred_index: usize) -> bool {
        Parser::sempred(self, ctx, rule_index, pred_index)
    }

    fn precpred(&mut self, ctx: Option<NodeId>, precedence: i32) -> bool {
        Parser::precpred(self, ctx, precedence)
    }
}

impl PredictionHost for Parser {
    fn input(&mut self) -> &mut dyn TokenStream {
        self.input.as_mut()
    }

    fn precedence(&self) -> i32 {
        Parser::precedence(self)
    }

    fn current_state(&self) -> usize {
        self.state
    }

    fn invoking_states(&self, ctx: Option<NodeId>) -> Vec<usize> {
        self.tree.invoking_states(ctx)
    }

    fn rule_name(&self, rule_index: usize) -> String {
        self.grammar.info().rule_name(rule_index)
    }

    fn listeners(&mut self) -> &mut ErrorListeners {
        &mut self.listeners
    }
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("state", &self.state)
            .field("ctx", &self.ctx)
            .field("depth", &self.depth)
            .field("syntax_errors", &self.syntax_errors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::{CommonTokenStream, ListTokenSource};
    use crate::testing::grammars::{self, expr};

    fn parser(tokens: Vec<Token>) -> Parser {
        let source = ListTokenSource::new(tokens);
        Parser::new(grammars::expression(), Box::new(CommonTokenStream::new(source)))
    }

    #[test]
    fn test_depth_limit() {
        let mut parser = parser(Vec::new());
        parser.set_options(ParserOptions {
            max_rule_depth: 2,
            ..Default::default()
        });
        let a = parser.new_context(None, None, expr::RULE_S);
        parser.enter_rule(a, 0, expr::RULE_S).unwrap();
        let b = parser.new_context(Some(a), Some(1), expr::RULE_S);
        parser.enter_rule(b, 0, expr::RULE_S).unwrap();
        let c = parser.new_context(Some(b), Some(1), expr::RULE_S);
        let err = parser.enter_rule(c, 0, expr::RULE_S).unwrap_err();
        assert!(matches!(err, ParseError::DepthLimitExceeded { depth: 3, .. }));
    }

    #[test]
    fn test_recursion_context_rewiring() {
        let mut parser = parser(vec![Token::new(expr::INT, "1")]);
        let root = parser.new_context(None, None, expr::RULE_S);
        parser.enter_rule(root, 0, expr::RULE_S).unwrap();
        let first = parser.new_context(Some(root), Some(1), expr::RULE_E);
        parser.enter_recursion_rule(first, 2, expr::RULE_E, 0).unwrap();
        parser.match_token(expr::INT).unwrap();
        let second = parser.new_context(Some(root), Some(1), expr::RULE_E);
        parser.push_new_recursion_context(second, 2, expr::RULE_E);
        assert_eq!(parser.tree().parent(first), Some(second));
        assert_eq!(parser.tree().children(second), &[first]);
        parser.unroll_recursion_contexts(Some(root));
        assert_eq!(parser.context(), Some(root));
        assert_eq!(parser.tree().children(root), &[second]);
        assert_eq!(parser.precedence(), 0);
    }

    #[test]
    fn test_precpred_compares_with_innermost_precedence() {
        let mut parser = parser(Vec::new());
        let ctx = parser.new_context(None, None, expr::RULE_E);
        parser.enter_recursion_rule(ctx, 0, expr::RULE_E, 3).unwrap();
        assert!(parser.precpred(None, 3));
        assert!(!parser.precpred(None, 2));
    }
}
