//! Lexer simulation
//!
//!     Matches one token: runs every rule of the current mode in parallel over the input and
//!     keeps the longest match, with ties going to the rule listed first. The simulation
//!     remembers the last accept state it passed; when every thread dies it rewinds to that
//!     point and returns its token type.
//!
//!     Threads are kept in an ordered configuration set so rule priority is the insertion
//!     order. Once an alternative has reached an accept state, its threads that went through
//!     a non-greedy loop stop there (`.*?` matches as little as it can).
//!
//!     Actions are collected along the way and only run once the token is accepted, and only
//!     when crossed in the token rule itself (not in fragments it calls). Predicates are
//!     evaluated as they are crossed; a configuration set that crossed one is never cached as
//!     a DFA edge, since its outcome depends on more than the next character.

use crate::atn::{Atn, LexerActionExecutor, Transition};
use crate::config_set::{AtnConfig, AtnConfigSet};
use crate::dfa::{Dfa, DfaCache, DfaState, DfaTarget};
use crate::error::{RecognitionError, RecognitionErrorKind};
use crate::prediction_context::{ContextId, MergeCache, PredictionContextCache, EMPTY_RETURN_STATE};
use crate::recognizer::LexerHooks;
use crate::stream::{CharStream, InputStream, IntStream};
use crate::token::EOF;
use std::sync::Arc;

pub const MIN_CHAR_VALUE: i32 = 0;
pub const MAX_CHAR_VALUE: i32 = 0x10FFFF;

/// Where the last accept state was seen.
#[derive(Debug, Clone)]
struct SimState {
    index: usize,
    line: usize,
    column: usize,
    dfa_state: Arc<DfaState>,
}

/// The outcome of a match: the token type and the actions to run for it.
pub type Match = (i32, Option<Arc<LexerActionExecutor>>);

pub struct LexerAtnSimulator {
    atn: Arc<Atn>,
    cache: Arc<DfaCache>,
    start_index: usize,
    /// 1-based line of the current position.
    pub line: usize,
    /// 0-based column of the current position.
    pub column: usize,
    mode: usize,
    prev_accept: Option<SimState>,
    merges: MergeCache,
}

impl LexerAtnSimulator {
    pub fn new(atn: Arc<Atn>, cache: Arc<DfaCache>) -> Self {
        LexerAtnSimulator {
            atn,
            cache,
            start_index: 0,
            line: 1,
            column: 0,
            mode: 0,
            prev_accept: None,
            merges: MergeCache::new(),
        }
    }

    pub fn reset(&mut self) {
        self.start_index = 0;
        self.line = 1;
        self.column = 0;
        self.mode = 0;
        self.prev_accept = None;
    }

    fn contexts(&self) -> &PredictionContextCache {
        self.cache.contexts()
    }

    /// Matches the token starting at the current input position in `mode`. Returns `EOF`
    /// when the input is exhausted; the input is left after the token.
    pub fn match_token(
        &mut self,
        input: &mut InputStream,
        mode: usize,
        hooks: &mut dyn LexerHooks,
    ) -> Result<Match, RecognitionError> {
        self.mode = mode;
        let marker = input.mark();
        self.start_index = input.index();
        self.prev_accept = None;
        self.merges.clear();
        let result = match self.cache.dfa(mode).cloned() {
            Some(dfa) => match dfa.start_state() {
                Some(s0) => self.exec_atn(input, &dfa, s0, hooks),
                None => self.match_atn(input, &dfa, hooks),
            },
            None => Err(RecognitionError::new(RecognitionErrorKind::LexerNoViableAlt {
                start_index: self.start_index,
                dead_end_configs: None,
            })
            .with_message(format!("no such lexer mode: {}", mode))),
        };
        input.release(marker);
        result
    }

    fn match_atn(&mut self, input: &mut InputStream, dfa: &Dfa, hooks: &mut dyn LexerHooks) -> Result<Match, RecognitionError> {
        let start_state = dfa.atn_start_state;
        let mut s0_closure = self.compute_start_state(input, start_state, hooks);
        let suppress_edge = s0_closure.has_semantic_context;
        s0_closure.has_semantic_context = false;
        let next = self.add_dfa_state(dfa, s0_closure);
        if !suppress_edge {
            dfa.set_start_state(&next);
        }
        self.exec_atn(input, dfa, next, hooks)
    }

    fn exec_atn(
        &mut self,
        input: &mut InputStream,
        dfa: &Dfa,
        s0: Arc<DfaState>,
        hooks: &mut dyn LexerHooks,
    ) -> Result<Match, RecognitionError> {
        if s0.is_accept {
            self.capture_sim_state(input, &s0);
        }
        let mut t = input.la(1);
        let mut s = s0;
        loop {
            let existing = if t >= MIN_CHAR_VALUE { dfa.edge(&s, t) } else { None };
            let target = match existing {
                Some(target) => target,
                None => self.compute_target_state(input, dfa, &s, t, hooks),
            };
            let DfaTarget::State(target) = target else {
                break;
            };
            // consume before capturing so the accept position is the end of the token
            if t != EOF {
                self.consume(input);
            }
            if target.is_accept {
                self.capture_sim_state(input, &target);
                if t == EOF {
                    break;
                }
            }
            t = input.la(1);
            s = target;
        }
        self.fail_or_accept(input, &s.configs, t)
    }

    fn compute_target_state(
        &mut self,
        input: &mut InputStream,
        dfa: &Dfa,
        s: &DfaState,
        t: i32,
        hooks: &mut dyn LexerHooks,
    ) -> DfaTarget {
        let mut reach = AtnConfigSet::ordered();
        self.reachable_config_set(input, &s.configs, &mut reach, t, hooks);
        if reach.is_empty() {
            if !reach.has_semantic_context && t >= MIN_CHAR_VALUE {
                dfa.add_edge(s, t, &DfaTarget::Error);
            }
            return DfaTarget::Error;
        }
        let suppress_edge = reach.has_semantic_context;
        reach.has_semantic_context = false;
        let to = self.add_dfa_state(dfa, reach);
        let target = DfaTarget::State(to);
        if !suppress_edge && t >= MIN_CHAR_VALUE {
            dfa.add_edge(s, t, &target);
        }
        target
    }

    fn fail_or_accept(&mut self, input: &mut InputStream, reach: &Arc<AtnConfigSet>, t: i32) -> Result<Match, RecognitionError> {
        if let Some(accept) = self.prev_accept.take() {
            input.seek(accept.index);
            self.line = accept.line;
            self.column = accept.column;
            let token_type = accept.dfa_state.lexer_token_type.unwrap_or(EOF);
            return Ok((token_type, accept.dfa_state.lexer_action_executor.clone()));
        }
        if t == EOF && input.index() == self.start_index {
            return Ok((EOF, None));
        }
        Err(RecognitionError::new(RecognitionErrorKind::LexerNoViableAlt {
            start_index: self.start_index,
            dead_end_configs: Some(Arc::clone(reach)),
        }))
    }

    fn reachable_config_set(
        &mut self,
        input: &mut InputStream,
        closure: &AtnConfigSet,
        reach: &mut AtnConfigSet,
        t: i32,
        hooks: &mut dyn LexerHooks,
    ) {
        let atn = Arc::clone(&self.atn);
        // once an alternative reached an accept state, skip its non-greedy threads
        let mut skip_alt = None;
        for config in closure.iter() {
            let current_alt_reached_accept = skip_alt == Some(config.alt);
            if current_alt_reached_accept && config.passed_through_non_greedy {
                continue;
            }
            for transition in atn.state(config.state).transitions() {
                if !transition.matches(t, MIN_CHAR_VALUE, MAX_CHAR_VALUE) {
                    continue;
                }
                let offset = input.index() - self.start_index;
                let executor = config
                    .lexer_action_executor
                    .as_ref()
                    .map(|executor| executor.fix_offset_before_match(offset));
                let mut next = self.moved(config, transition.target());
                next.lexer_action_executor = executor;
                let treat_eof_as_epsilon = t == EOF;
                if self.closure(input, next, reach, current_alt_reached_accept, true, treat_eof_as_epsilon, hooks) {
                    skip_alt = Some(config.alt);
                    break;
                }
            }
        }
    }

    fn compute_start_state(&mut self, input: &mut InputStream, start_state: usize, hooks: &mut dyn LexerHooks) -> AtnConfigSet {
        let atn = Arc::clone(&self.atn);
        let mut configs = AtnConfigSet::ordered();
        for (i, transition) in atn.state(start_state).transitions().iter().enumerate() {
            let config = AtnConfig::new(transition.target(), i + 1, ContextId::EMPTY);
            self.closure(input, config, &mut configs, false, false, false, hooks);
        }
        configs
    }

    /// The same thread moved to `state`, noting whether it entered a non-greedy decision.
    fn moved(&self, config: &AtnConfig, state: usize) -> AtnConfig {
        let target = self.atn.state(state);
        let mut moved = config.moved_to(state);
        moved.passed_through_non_greedy =
            config.passed_through_non_greedy || (target.is_decision_state() && target.non_greedy);
        moved
    }

    /// Adds the epsilon closure of `config` to `configs`. Returns true once the current
    /// alternative has reached an accept state.
    #[allow(clippy::too_many_arguments)]
    fn closure(
        &mut self,
        input: &mut InputStream,
        config: AtnConfig,
        configs: &mut AtnConfigSet,
        mut current_alt_reached_accept: bool,
        speculative: bool,
        treat_eof_as_epsilon: bool,
        hooks: &mut dyn LexerHooks,
    ) -> bool {
        let atn = Arc::clone(&self.atn);
        let state = atn.state(config.state);
        if state.is_rule_stop() {
            let context = self.contexts().get(config.context);
            if config.context.is_empty() {
                self.add(configs, config);
                return true;
            }
            if context.has_empty_path() {
                self.add(configs, config.clone().with_context(ContextId::EMPTY));
                current_alt_reached_accept = true;
            }
            for i in 0..context.len() {
                let return_state = context.return_state(i);
                if return_state == EMPTY_RETURN_STATE {
                    continue;
                }
                let returned = self.moved(&config, return_state).with_context(context.parent(i));
                current_alt_reached_accept = self.closure(
                    input,
                    returned,
                    configs,
                    current_alt_reached_accept,
                    speculative,
                    treat_eof_as_epsilon,
                    hooks,
                );
            }
            return current_alt_reached_accept;
        }

        if !state.only_has_epsilon_transitions() && (!current_alt_reached_accept || !config.passed_through_non_greedy) {
            self.add(configs, config.clone());
        }

        for transition in state.transitions() {
            let Some(target) = self.epsilon_target(input, &config, transition, configs, speculative, treat_eof_as_epsilon, hooks)
            else {
                continue;
            };
            current_alt_reached_accept = self.closure(
                input,
                target,
                configs,
                current_alt_reached_accept,
                speculative,
                treat_eof_as_epsilon,
                hooks,
            );
        }
        current_alt_reached_accept
    }

    #[allow(clippy::too_many_arguments)]
    fn epsilon_target(
        &mut self,
        input: &mut InputStream,
        config: &AtnConfig,
        transition: &Transition,
        configs: &mut AtnConfigSet,
        speculative: bool,
        treat_eof_as_epsilon: bool,
        hooks: &mut dyn LexerHooks,
    ) -> Option<AtnConfig> {
        match transition {
            Transition::Rule { target, follow_state, .. } => {
                let context = self.contexts().singleton(config.context, *follow_state);
                Some(self.moved(config, *target).with_context(context))
            }
            Transition::Precedence { .. } => {
                log::warn!("precedence predicate in lexer state {} ignored", config.state);
                None
            }
            Transition::Predicate {
                target,
                rule_index,
                pred_index,
                ..
            } => {
                configs.has_semantic_context = true;
                self.evaluate_predicate(input, *rule_index, *pred_index, speculative, hooks)
                    .then(|| self.moved(config, *target))
            }
            Transition::Action { target, action_index, .. } => {
                let in_token_rule = config.context.is_empty() || self.contexts().get(config.context).has_empty_path();
                let action = action_index.and_then(|index| self.atn.lexer_action(index)).cloned();
                let mut moved = self.moved(config, *target);
                if let (true, Some(action)) = (in_token_rule, action) {
                    moved.lexer_action_executor =
                        Some(LexerActionExecutor::append(config.lexer_action_executor.as_ref(), action));
                }
                Some(moved)
            }
            Transition::Epsilon { target, .. } => Some(self.moved(config, *target)),
            Transition::Atom { target, .. } | Transition::Range { target, .. } | Transition::Set { target, .. } => {
                (treat_eof_as_epsilon && transition.matches(EOF, MIN_CHAR_VALUE, MAX_CHAR_VALUE))
                    .then(|| self.moved(config, *target))
            }
            Transition::NotSet { .. } | Transition::Wildcard { .. } => None,
        }
    }

    /// Runs a lexer predicate. While the simulation is still speculating, the predicate
    /// sees the text as if the current character were already part of the token.
    fn evaluate_predicate(
        &mut self,
        input: &mut InputStream,
        rule_index: usize,
        pred_index: usize,
        speculative: bool,
        hooks: &mut dyn LexerHooks,
    ) -> bool {
        if !speculative {
            let text = input.text(self.start_index..input.index());
            return hooks.sempred(&text, rule_index, pred_index);
        }
        let (line, column, index) = (self.line, self.column, input.index());
        let marker = input.mark();
        self.consume(input);
        let text = input.text(self.start_index..input.index());
        let holds = hooks.sempred(&text, rule_index, pred_index);
        self.line = line;
        self.column = column;
        input.seek(index);
        input.release(marker);
        holds
    }

    fn add(&mut self, configs: &mut AtnConfigSet, config: AtnConfig) {
        let contexts = self.cache.contexts();
        configs.add(config, contexts, &mut self.merges);
    }

    fn capture_sim_state(&mut self, input: &InputStream, state: &Arc<DfaState>) {
        self.prev_accept = Some(SimState {
            index: input.index(),
            line: self.line,
            column: self.column,
            dfa_state: Arc::clone(state),
        });
    }

    /// Adds a state for `configs`, marking it accepting when a thread finished its token
    /// rule. The first such thread decides the token type.
    fn add_dfa_state(&self, dfa: &Dfa, configs: AtnConfigSet) -> Arc<DfaState> {
        let winner = configs
            .iter()
            .find(|config| self.atn.state(config.state).is_rule_stop())
            .map(|config| {
                let rule = self.atn.state(config.state).rule_index;
                (self.atn.rule_token_type(rule), config.lexer_action_executor.clone())
            });
        let mut proposed = DfaState::new(configs);
        if let Some((token_type, executor)) = winner {
            proposed.is_accept = true;
            proposed.lexer_token_type = token_type;
            proposed.lexer_action_executor = executor;
        }
        dfa.add_state(proposed)
    }

    /// Advances one character, tracking line and column.
    pub fn consume(&mut self, input: &mut InputStream) {
        if input.la(1) == '\n' as i32 {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        input.consume();
    }

    /// Text of the current match so far.
    pub fn text(&self, input: &InputStream) -> String {
        input.text(self.start_index..input.index())
    }

    pub fn dfa(&self, mode: usize) -> Option<&Arc<Dfa>> {
        self.cache.dfa(mode)
    }
}

impl std::fmt::Debug for LexerAtnSimulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexerAtnSimulator")
            .field("mode", &self.mode)
            .field("line", &self.line)
            .field("column", &self.column)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognizer::AcceptAll;
    use crate::testing::grammars;

    fn simulator() -> (LexerAtnSimulator, crate::recognizer::Grammar) {
        let grammar = grammars::expression_lexer();
        let simulator = LexerAtnSimulator::new(grammar.shared_atn(), Arc::clone(grammar.dfa_cache()));
        (simulator, grammar)
    }

    #[test]
    fn test_longest_match_wins() {
        let (mut simulator, _grammar) = simulator();
        let mut input = InputStream::new("123+4");
        let (token_type, _) = simulator.match_token(&mut input, 0, &mut AcceptAll).unwrap();
        assert_eq!(token_type, grammars::expr::INT);
        assert_eq!(input.index(), 3);
        assert_eq!(simulator.column, 3);
    }

    #[test]
    fn test_end_of_input_yields_eof() {
        let (mut simulator, _grammar) = simulator();
        let mut input = InputStream::new("");
        let (token_type, _) = simulator.match_token(&mut input, 0, &mut AcceptAll).unwrap();
        assert_eq!(token_type, EOF);
    }

    #[test]
    fn test_unmatched_character_is_an_error() {
        let (mut simulator, _grammar) = simulator();
        let mut input = InputStream::new("?");
        let error = simulator.match_token(&mut input, 0, &mut AcceptAll).unwrap_err();
        assert!(matches!(
            error.kind,
            RecognitionErrorKind::LexerNoViableAlt { start_index: 0, .. }
        ));
    }

    #[test]
    fn test_second_match_walks_the_dfa() {
        let (mut simulator, grammar) = simulator();
        let mut input = InputStream::new("12 34");
        simulator.match_token(&mut input, 0, &mut AcceptAll).unwrap();
        let states = grammar.dfa_cache().state_count();
        let mut again = InputStream::new("12");
        simulator.reset();
        simulator.match_token(&mut again, 0, &mut AcceptAll).unwrap();
        assert_eq!(grammar.dfa_cache().state_count(), states);
    }
}
