//! The parser interpreter
//!
//!     Parses by walking the ATN of a grammar, state by state, the way generated parser code
//!     would:
//!
//!         - at a decision state with more than one way out, the error strategy syncs and the
//!           prediction simulator picks the alternative;
//!         - token transitions match the current token (recovering inline on a mismatch);
//!         - rule transitions push a new rule context, rule stop states pop it and continue at
//!           the follow state of the call;
//!         - predicates and actions go to the host's [SemanticHooks].
//!
//!     A syntax error unwinds to the rule it happened in: the rule is marked as failed, the
//!     error strategy reports it and resynchronizes, and parsing resumes from the rule's stop
//!     state as if the rule had ended normally.
//!
//! Left recursion
//!
//!     Left-recursive rules arrive rewritten as a primary part followed by a precedence loop
//!     (see [AtnFactory::left_recursive_body](crate::atn::factory::AtnFactory::left_recursive_body)).
//!     Each time the loop takes an operator, the context built so far is wrapped in a new
//!     context of the same rule, so `1+2*3` becomes `(e (e 1) + (e (e 2) * (e 3)))`. A stack of
//!     (parent context, invoking state) pairs remembers where each left-recursive invocation
//!     must be attached when it ends.

use crate::atn::{Atn, AtnState, Transition};
use crate::error::{AtnError, Failure, ParseError, RecognitionError, RecognitionErrorKind};
use crate::error_listener::ErrorListener;
use crate::options::ParserOptions;
use crate::parser::{Parser, INVALID_STATE_NUMBER};
use crate::recognizer::{Grammar, SemanticHooks};
use crate::simulator::{DecisionInfo, ParserAtnSimulator};
use crate::stream::TokenStream;
use crate::token::{Token, INVALID_TYPE, MIN_USER_TOKEN_TYPE};
use crate::tree::{NodeId, ParseTree, ParseTreeListener};
use std::sync::Arc;

/// Forces one prediction: at `decision`, when the input is at `token_index`, take `alt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DecisionOverride {
    decision: usize,
    token_index: usize,
    alt: usize,
    reached: bool,
}

pub struct ParserInterpreter {
    atn: Arc<Atn>,
    parser: Parser,
    simulator: ParserAtnSimulator,
    /// One entry per active left-recursive invocation: the context to attach it to and the
    /// state that invoked it.
    parent_context_stack: Vec<(Option<NodeId>, Option<usize>)>,
    root: Option<NodeId>,
    decision_override: Option<DecisionOverride>,
}

impl ParserInterpreter {
    pub fn new(grammar: Grammar, input: Box<dyn TokenStream>) -> Self {
        let atn = grammar.shared_atn();
        let options = ParserOptions::default();
        let simulator = ParserAtnSimulator::new(Arc::clone(&atn), Arc::clone(grammar.dfa_cache()), options.prediction_mode);
        ParserInterpreter {
            atn,
            parser: Parser::new(grammar, input),
            simulator,
            parent_context_stack: Vec::new(),
            root: None,
            decision_override: None,
        }
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.set_options(options);
        self
    }

    pub fn set_options(&mut self, options: ParserOptions) {
        self.simulator.mode = options.prediction_mode;
        self.parser.set_options(options);
    }

    pub fn options(&self) -> &ParserOptions {
        self.parser.options()
    }

    pub fn parser(&self) -> &Parser {
        &self.parser
    }

    pub fn parser_mut(&mut self) -> &mut Parser {
        &mut self.parser
    }

    pub fn tree(&self) -> &ParseTree {
        self.parser.tree()
    }

    /// The root of the last parse.
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    pub fn grammar(&self) -> &Grammar {
        self.parser.grammar()
    }

    pub fn number_of_syntax_errors(&self) -> usize {
        self.parser.number_of_syntax_errors()
    }

    pub fn add_error_listener(&mut self, listener: Box<dyn ErrorListener>) {
        self.parser.add_error_listener(listener);
    }

    pub fn remove_error_listeners(&mut self) {
        self.parser.remove_error_listeners();
    }

    pub fn add_parse_listener(&mut self, listener: Box<dyn ParseTreeListener>) {
        self.parser.add_parse_listener(listener);
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn SemanticHooks>) {
        self.parser.set_hooks(hooks);
    }

    /// Makes `decision` predict `alt` the first time it is reached with the input at
    /// `token_index`. Used to explore the other interpretations of ambiguous input.
    pub fn add_decision_override(&mut self, decision: usize, token_index: usize, alt: usize) {
        self.decision_override = Some(DecisionOverride {
            decision,
            token_index,
            alt,
            reached: false,
        });
    }

    /// Prediction statistics, indexed by decision.
    pub fn decision_info(&self) -> &[DecisionInfo] {
        self.simulator.decision_info()
    }

    /// LISP-style rendering of the subtree at `node`.
    pub fn to_string_tree(&self, node: NodeId) -> String {
        self.tree().to_string_tree(node, self.grammar().info())
    }

    /// Rewinds the input and clears the tree and the decision override.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.parent_context_stack.clear();
        self.root = None;
        if let Some(decision_override) = &mut self.decision_override {
            decision_override.reached = false;
        }
    }

    /// Parses the input starting with `start_rule` and returns the root context.
    ///
    /// Syntax errors are reported to the error listeners and repaired; the result is then
    /// still a tree. An error comes back only when the parse cannot go on: the bail
    /// strategy met an error, the rule depth limit was hit, or the ATN is malformed.
    pub fn parse(&mut self, start_rule: usize) -> Result<NodeId, ParseError> {
        let atn = Arc::clone(&self.atn);
        let start_state = atn
            .rule_start_state(start_rule)
            .ok_or(AtnError::InvalidRule(start_rule))?;
        let left_recursive = atn.is_left_recursive_rule(start_rule);
        let root = self.parser.new_context(None, None, start_rule);
        self.root = Some(root);
        if left_recursive {
            self.enter_recursion_rule(root, start_state, start_rule, 0)?;
        } else {
            self.parser.enter_rule(root, start_state, start_rule)?;
        }

        loop {
            let number = self.parser.state();
            let state = atn.get_state(number).ok_or(AtnError::InvalidState(number))?;
            if state.is_rule_stop() {
                if self.at_outermost_context() {
                    if left_recursive {
                        let result = self.parser.context().unwrap_or(root);
                        let (parent, _) = self.parent_context_stack.pop().unwrap_or((None, None));
                        self.parser.unroll_recursion_contexts(parent);
                        self.root = Some(result);
                        return Ok(result);
                    }
                    self.parser.exit_rule();
                    return Ok(root);
                }
                self.visit_rule_stop_state(state)?;
                continue;
            }

            match self.visit_state(state) {
                Ok(()) => {}
                Err(Failure::Syntax(error)) => {
                    let stop = atn
                        .rule_stop_state(state.rule_index)
                        .ok_or(AtnError::InvalidRule(state.rule_index))?;
                    self.parser.set_state(stop);
                    if let Some(ctx) = self.parser.context() {
                        if let Some(rule) = self.parser.tree_mut().rule_mut(ctx) {
                            rule.exception = Some(error.clone());
                        }
                    }
                    let strategy = self.parser.error_strategy();
                    strategy.report_error(&mut self.parser, &error);
                    self.recover(&error)?;
                }
                Err(Failure::Fatal(error)) => return Err(error),
            }
        }
    }

    /// Parses with the rule named `rule_name` as the start rule.
    pub fn parse_rule(&mut self, rule_name: &str) -> Result<NodeId, ParseError> {
        let rule = self
            .grammar()
            .rule_index(rule_name)
            .ok_or_else(|| AtnError::UnknownRuleName(rule_name.to_string()))?;
        self.parse(rule)
    }

    fn at_outermost_context(&self) -> bool {
        self.parser
            .context()
            .and_then(|ctx| self.parser.tree().rule(ctx))
            .map_or(true, |rule| rule.invoking_state.is_none())
    }

    fn enter_recursion_rule(&mut self, ctx: NodeId, state: usize, rule_index: usize, precedence: i32) -> Result<(), ParseError> {
        let invoking = self.parser.tree().rule(ctx).and_then(|rule| rule.invoking_state);
        self.parent_context_stack.push((self.parser.context(), invoking));
        self.parser.enter_recursion_rule(ctx, state, rule_index, precedence)
    }

    fn visit_state(&mut self, state: &AtnState) -> Result<(), Failure> {
        if self.parser.options().trace {
            let lt1 = self.parser.current_token();
            log::trace!(
                "visit state {} ({}) rule {}, LT(1)={}",
                state.number,
                state.kind.name(),
                self.grammar().info().rule_name(state.rule_index),
                lt1.text()
            );
        }
        let mut alt = 1;
        if state.is_decision_state() {
            alt = self.visit_decision_state(state)?;
        }
        // alternatives are numbered from 1, an override may still name 0
        let transition = alt
            .checked_sub(1)
            .and_then(|i| state.transition(i))
            .ok_or(AtnError::UnexpectedTransition {
                state: state.number,
                found: "missing",
            })?;

        match transition {
            Transition::Epsilon { target, .. } => {
                if state.is_precedence_decision() && !self.atn.state(*target).is_loop_end() {
                    // The operator loop of a left-recursive rule takes another iteration.
                    let (parent, invoking) = self.parent_context_stack.last().copied().unwrap_or((None, None));
                    let rule_index = self.current_rule_index().unwrap_or(state.rule_index);
                    let ctx = self.parser.new_context(parent, invoking, rule_index);
                    let rule_start = self
                        .atn
                        .rule_start_state(state.rule_index)
                        .ok_or(AtnError::InvalidRule(state.rule_index))?;
                    self.parser.push_new_recursion_context(ctx, rule_start, rule_index);
                }
            }
            Transition::Atom { label, .. } => {
                self.parser.match_token(*label)?;
            }
            Transition::Range { .. } | Transition::Set { .. } | Transition::NotSet { .. } => {
                let max = self.atn.max_token_type;
                self.parser
                    .match_where(|symbol| transition.matches(symbol, MIN_USER_TOKEN_TYPE, max))?;
            }
            Transition::Wildcard { .. } => {
                self.parser.match_wildcard()?;
            }
            Transition::Rule { target, precedence, .. } => {
                let rule_index = self.atn.state(*target).rule_index;
                let ctx = self
                    .parser
                    .new_context(self.parser.context(), Some(state.number), rule_index);
                if self.atn.is_left_recursive_rule(rule_index) {
                    self.enter_recursion_rule(ctx, *target, rule_index, *precedence)?;
                } else {
                    self.parser.enter_rule(ctx, *target, rule_index)?;
                }
            }
            Transition::Predicate { rule_index, pred_index, .. } => {
                let ctx = self.parser.context();
                if !self.parser.sempred(ctx, *rule_index, *pred_index) {
                    let predicate = format!("{}:{}", rule_index, pred_index);
                    return Err(self.failed_predicate(*rule_index, Some(*pred_index), predicate).into());
                }
            }
            Transition::Precedence { precedence, .. } => {
                let ctx = self.parser.context();
                if !self.parser.precpred(ctx, *precedence) {
                    let rule_index = self.current_rule_index().unwrap_or(state.rule_index);
                    let predicate = format!("precpred(_ctx, {})", precedence);
                    return Err(self.failed_predicate(rule_index, None, predicate).into());
                }
            }
            Transition::Action { rule_index, action_index, .. } => {
                if let Some(action_index) = action_index {
                    let ctx = self.parser.context();
                    self.parser.action(ctx, *rule_index, *action_index);
                }
            }
        }

        self.parser.set_state(transition.target());
        Ok(())
    }

    fn visit_decision_state(&mut self, state: &AtnState) -> Result<usize, Failure> {
        if state.transitions().len() <= 1 {
            return Ok(1);
        }
        let decision = state.decision.ok_or(AtnError::Verification {
            state: state.number,
            message: "decision state without a decision number".to_string(),
        })?;
        let strategy = self.parser.error_strategy();
        strategy.sync(&mut self.parser)?;

        let index = self.parser.input_mut().index();
        let alt = match &mut self.decision_override {
            Some(forced) if forced.decision == decision && forced.token_index == index && !forced.reached => {
                forced.reached = true;
                log::debug!("decision {} at {} forced to alt {}", decision, index, forced.alt);
                forced.alt
            }
            _ => {
                let ctx = self.parser.context();
                self.simulator.adaptive_predict(&mut self.parser, decision, ctx)?
            }
        };

        if self.is_outer_block(state) {
            if let Some(ctx) = self.parser.context() {
                self.parser.enter_outer_alt(ctx, alt);
            }
        }
        Ok(alt)
    }

    /// True for the block that holds the alternatives of a whole rule.
    fn is_outer_block(&self, state: &AtnState) -> bool {
        self.atn
            .rule_start_state(state.rule_index)
            .and_then(|start| self.atn.state(start).transition(0))
            .is_some_and(|t| t.target() == state.number)
    }

    fn visit_rule_stop_state(&mut self, state: &AtnState) -> Result<(), ParseError> {
        if self.atn.is_left_recursive_rule(state.rule_index) {
            let (parent, invoking) = self
                .parent_context_stack
                .pop()
                .ok_or(AtnError::ContextStackUnderflow { state: state.number })?;
            self.parser.unroll_recursion_contexts(parent);
            self.parser.set_state(invoking.unwrap_or(INVALID_STATE_NUMBER));
        } else {
            self.parser.exit_rule();
        }
        let invoking = self.parser.state();
        let follow = self
            .atn
            .rule_follow_state(invoking)
            .ok_or(AtnError::UnexpectedTransition {
                state: invoking,
                found: "non-rule",
            })?;
        self.parser.set_state(follow);
        Ok(())
    }

    fn current_rule_index(&self) -> Option<usize> {
        let ctx = self.parser.context()?;
        self.parser.tree().rule(ctx).map(|rule| rule.rule_index)
    }

    fn failed_predicate(&mut self, rule_index: usize, predicate_index: Option<usize>, predicate: String) -> RecognitionError {
        let state = self.parser.state();
        let ctx = self.parser.context();
        let token = self.parser.current_token();
        RecognitionError::new(RecognitionErrorKind::FailedPredicate {
            rule_index,
            predicate_index,
            predicate,
        })
        .with_token(Some(token))
        .with_state(state, ctx)
    }

    /// Recovers through the error strategy. If that consumed nothing, an error node keeps
    /// the failure visible in the tree.
    fn recover(&mut self, error: &RecognitionError) -> Result<(), ParseError> {
        let index = self.parser.input_mut().index();
        let strategy = self.parser.error_strategy();
        strategy.recover(&mut self.parser, error)?;
        if self.parser.input_mut().index() != index || !self.parser.options().build_parse_trees {
            return Ok(());
        }
        let token_type = match (&error.kind, &error.expected_tokens) {
            (RecognitionErrorKind::InputMismatch, Some(expected)) => expected.min_element().unwrap_or(INVALID_TYPE),
            _ => INVALID_TYPE,
        };
        let anchor = match &error.offending_token {
            Some(token) => token.clone(),
            None => self.parser.current_token(),
        };
        let conjured = Token::new(token_type, anchor.text()).with_position(anchor.line, anchor.column);
        if let Some(ctx) = self.parser.context() {
            self.parser.tree_mut().add_error_node(ctx, conjured);
        }
        Ok(())
    }
}

impl std::fmt::Debug for ParserInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserInterpreter")
            .field("parser", &self.parser)
            .field("simulator", &self.simulator)
            .field("root", &self.root)
            .finish()
    }
}
