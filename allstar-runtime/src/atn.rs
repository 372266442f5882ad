//! The augmented transition network
//!
//!     An ATN is the grammar compiled to a graph: one sub-network per rule, entered at the
//!     rule's start state and left through its stop state, with rule references as call
//!     edges. Decisions (subrules, loops, rule alternatives) are the states with more than one
//!     outgoing transition; the prediction simulators pick among them.
//!
//!     The ATN is immutable after construction and shared by every recognizer of its grammar.
//!     Construction goes through [Atn::from_parts], which derives the redundant links the
//!     interpreters rely on and then verifies the structural invariants:
//!
//!         - every rule stop state gets an epsilon edge back to the follow state of each call
//!           of its rule (tagged when the call is the precedence-0 entry of a left-recursive
//!           rule)
//!         - block ends learn their block start, loop entries and plus blocks learn their
//!           loop-back state
//!         - the operator loop entry of each left-recursive rule is marked as a precedence
//!           decision
//!
//!     The per-state "next tokens within rule" set is computed lazily on first use and cached
//!     in the state, which is why lookups take `&self`.

use crate::error::AtnError;
use crate::interval_set::IntervalSet;
use serde::{Deserialize, Serialize};

pub mod factory;
pub mod lexer_action;
pub mod ll1;
pub mod serialized;
pub mod state;
pub mod transition;

pub use lexer_action::{LexerAction, LexerActionExecutor};
pub use state::{AtnState, BlockKind, StateKind};
pub use transition::Transition;

use ll1::{Ll1Analyzer, LookContext};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GrammarType {
    Lexer,
    Parser,
}

/// Everything an ATN is built from, before derivation and verification.
#[derive(Debug, Clone)]
pub(crate) struct AtnParts {
    pub grammar_type: GrammarType,
    pub max_token_type: i32,
    pub states: Vec<AtnState>,
    pub rule_to_start_state: Vec<usize>,
    pub rule_to_token_type: Vec<i32>,
    pub mode_to_start_state: Vec<usize>,
    pub decision_to_state: Vec<usize>,
    pub lexer_actions: Vec<LexerAction>,
}

#[derive(Debug)]
pub struct Atn {
    pub grammar_type: GrammarType,
    pub max_token_type: i32,
    states: Vec<AtnState>,
    decision_to_state: Vec<usize>,
    rule_to_start_state: Vec<usize>,
    rule_to_stop_state: Vec<usize>,
    rule_to_token_type: Vec<i32>,
    mode_to_start_state: Vec<usize>,
    lexer_actions: Vec<LexerAction>,
}

impl Atn {
    pub(crate) fn from_parts(parts: AtnParts) -> Result<Atn, AtnError> {
        let AtnParts {
            grammar_type,
            max_token_type,
            mut states,
            rule_to_start_state,
            rule_to_token_type,
            mode_to_start_state,
            decision_to_state,
            lexer_actions,
        } = parts;

        let count = states.len();
        let check = |state: usize| {
            if state < count {
                Ok(state)
            } else {
                Err(AtnError::InvalidState(state))
            }
        };
        for (number, state) in states.iter().enumerate() {
            if state.number != number {
                return Err(AtnError::Verification {
                    state: number,
                    message: format!("state numbered {} stored at {}", state.number, number),
                });
            }
            for transition in state.transitions() {
                check(transition.target())?;
                if let Transition::Rule { follow_state, .. } = transition {
                    check(*follow_state)?;
                }
            }
        }
        for &state in rule_to_start_state
            .iter()
            .chain(&mode_to_start_state)
            .chain(&decision_to_state)
        {
            check(state)?;
        }

        let mut rule_to_stop_state = Vec::with_capacity(rule_to_start_state.len());
        for (rule, &start) in rule_to_start_state.iter().enumerate() {
            match states[start].kind {
                StateKind::RuleStart { stop_state, .. } => {
                    check(stop_state)?;
                    if !states[stop_state].is_rule_stop() || states[stop_state].rule_index != rule {
                        return Err(AtnError::Verification {
                            state: start,
                            message: format!("rule {} stop state {} is not its rule stop", rule, stop_state),
                        });
                    }
                    rule_to_stop_state.push(stop_state);
                }
                _ => {
                    return Err(AtnError::Verification {
                        state: start,
                        message: format!("rule {} does not begin at a rule start state", rule),
                    })
                }
            }
        }

        // Return edges from rule stop states to every follow state.
        let mut returns = Vec::new();
        for state in &states {
            for transition in state.transitions() {
                if let Transition::Rule {
                    target,
                    rule_index,
                    precedence,
                    follow_state,
                } = *transition
                {
                    let start = *rule_to_start_state
                        .get(rule_index)
                        .ok_or(AtnError::InvalidRule(rule_index))?;
                    if start != target {
                        return Err(AtnError::Verification {
                            state: state.number,
                            message: format!("call of rule {} does not target its start state", rule_index),
                        });
                    }
                    let outermost_precedence_return =
                        if states[start].is_left_recursive_rule_start() && precedence == 0 {
                            Some(rule_index)
                        } else {
                            None
                        };
                    returns.push((
                        rule_to_stop_state[rule_index],
                        Transition::Epsilon {
                            target: follow_state,
                            outermost_precedence_return,
                        },
                    ));
                }
            }
        }
        for (stop, transition) in returns {
            states[stop].add_transition(transition);
        }

        // Back links.
        let mut block_ends = Vec::new();
        let mut plus_loop_backs = Vec::new();
        let mut star_loop_backs = Vec::new();
        for state in &states {
            match state.kind {
                StateKind::BlockStart { end_state, .. } => {
                    check(end_state)?;
                    block_ends.push((end_state, state.number));
                }
                StateKind::PlusLoopBack => {
                    for transition in state.transitions() {
                        if let StateKind::BlockStart { block: BlockKind::Plus, .. } = states[transition.target()].kind {
                            plus_loop_backs.push((transition.target(), state.number));
                        }
                    }
                }
                StateKind::StarLoopBack => {
                    for transition in state.transitions() {
                        if states[transition.target()].is_star_loop_entry() {
                            star_loop_backs.push((transition.target(), state.number));
                        }
                    }
                }
                StateKind::LoopEnd { loop_back } => {
                    check(loop_back)?;
                }
                _ => {}
            }
        }
        for (end, start) in block_ends {
            match &mut states[end].kind {
                StateKind::BlockEnd { start_state } => *start_state = Some(start),
                _ => {
                    return Err(AtnError::Verification {
                        state: start,
                        message: format!("block end {} is not a block end state", end),
                    })
                }
            }
        }
        for (block, loop_back_state) in plus_loop_backs {
            if let StateKind::BlockStart { loop_back, .. } = &mut states[block].kind {
                *loop_back = Some(loop_back_state);
            }
        }
        for (entry, loop_back_state) in star_loop_backs {
            if let StateKind::StarLoopEntry { loop_back, .. } = &mut states[entry].kind {
                *loop_back = Some(loop_back_state);
            }
        }

        for (decision, &state) in decision_to_state.iter().enumerate() {
            states[state].decision = Some(decision);
        }

        // Precedence decisions: the operator loop entry of a left-recursive rule, recognized
        // by its exit branch running straight into the rule stop state.
        let mut precedence_decisions = Vec::new();
        for state in &states {
            if !state.is_star_loop_entry() {
                continue;
            }
            let Some(&start) = rule_to_start_state.get(state.rule_index) else {
                continue;
            };
            if !states[start].is_left_recursive_rule_start() {
                continue;
            }
            let Some(last) = state.transitions().last() else {
                continue;
            };
            let loop_end = &states[last.target()];
            if loop_end.is_loop_end() && loop_end.only_has_epsilon_transitions() {
                if let Some(exit) = loop_end.transition(0) {
                    if states[exit.target()].is_rule_stop() {
                        precedence_decisions.push(state.number);
                    }
                }
            }
        }
        for entry in precedence_decisions {
            if let StateKind::StarLoopEntry { precedence_decision, .. } = &mut states[entry].kind {
                *precedence_decision = true;
            }
        }

        let atn = Atn {
            grammar_type,
            max_token_type,
            states,
            decision_to_state,
            rule_to_start_state,
            rule_to_stop_state,
            rule_to_token_type,
            mode_to_start_state,
            lexer_actions,
        };
        atn.verify()?;
        log::debug!(
            "built {:?} ATN: {} states, {} rules, {} decisions",
            atn.grammar_type,
            atn.states.len(),
            atn.rule_to_start_state.len(),
            atn.decision_to_state.len()
        );
        Ok(atn)
    }

    fn verify(&self) -> Result<(), AtnError> {
        let fail = |state: &AtnState, message: &str| {
            Err(AtnError::Verification {
                state: state.number,
                message: message.to_string(),
            })
        };
        for state in &self.states {
            let transitions = state.transitions();
            if !state.only_has_epsilon_transitions() && transitions.len() > 1 {
                return fail(state, "multiple transitions must all be epsilon");
            }
            match &state.kind {
                StateKind::BlockStart { block: BlockKind::Plus, loop_back: None, .. } => {
                    return fail(state, "plus block without loop-back state");
                }
                StateKind::StarLoopEntry { loop_back, .. } => {
                    match loop_back {
                        Some(lb) if matches!(self.states[*lb].kind, StateKind::StarLoopBack) => {}
                        _ => return fail(state, "star loop entry without loop-back state"),
                    }
                    if transitions.len() != 2 {
                        return fail(state, "star loop entry needs exactly two transitions");
                    }
                    let first = &self.states[transitions[0].target()];
                    let second = &self.states[transitions[1].target()];
                    let enters_block =
                        |s: &AtnState| matches!(s.kind, StateKind::BlockStart { block: BlockKind::Star, .. });
                    if enters_block(first) {
                        if !second.is_loop_end() || state.non_greedy {
                            return fail(state, "greedy star loop must enter the block first");
                        }
                    } else if first.is_loop_end() {
                        if !enters_block(second) || !state.non_greedy {
                            return fail(state, "non-greedy star loop must exit first");
                        }
                    } else {
                        return fail(state, "star loop entry must lead to its block and loop end");
                    }
                }
                StateKind::StarLoopBack => {
                    if transitions.len() != 1 || !self.states[transitions[0].target()].is_star_loop_entry() {
                        return fail(state, "star loop-back must return to its loop entry");
                    }
                }
                StateKind::LoopEnd { loop_back } => {
                    if !matches!(self.states[*loop_back].kind, StateKind::StarLoopBack | StateKind::PlusLoopBack) {
                        return fail(state, "loop end must reference a loop-back state");
                    }
                }
                StateKind::BlockEnd { start_state: None } => {
                    return fail(state, "block end without block start");
                }
                _ => {}
            }
            if state.kind.is_decision_kind() {
                if transitions.len() > 1 && state.decision.is_none() {
                    return fail(state, "decision state with several transitions has no decision number");
                }
            } else if transitions.len() > 1 && !state.is_rule_stop() {
                return fail(state, "only decision and rule stop states may branch");
            }
        }
        Ok(())
    }

    pub fn state(&self, number: usize) -> &AtnState {
        &self.states[number]
    }

    pub fn get_state(&self, number: usize) -> Option<&AtnState> {
        self.states.get(number)
    }

    pub fn states(&self) -> &[AtnState] {
        &self.states
    }

    pub fn num_decisions(&self) -> usize {
        self.decision_to_state.len()
    }

    pub fn decision_state(&self, decision: usize) -> Option<&AtnState> {
        self.decision_to_state.get(decision).map(|&s| &self.states[s])
    }

    pub fn decision_to_state(&self) -> &[usize] {
        &self.decision_to_state
    }

    pub fn num_rules(&self) -> usize {
        self.rule_to_start_state.len()
    }

    pub fn rule_start_state(&self, rule: usize) -> Option<usize> {
        self.rule_to_start_state.get(rule).copied()
    }

    pub fn rule_stop_state(&self, rule: usize) -> Option<usize> {
        self.rule_to_stop_state.get(rule).copied()
    }

    pub fn rule_to_start_state(&self) -> &[usize] {
        &self.rule_to_start_state
    }

    pub fn is_left_recursive_rule(&self, rule: usize) -> bool {
        self.rule_start_state(rule)
            .map_or(false, |s| self.states[s].is_left_recursive_rule_start())
    }

    /// Token type emitted by lexer rule `rule`.
    pub fn rule_token_type(&self, rule: usize) -> Option<i32> {
        self.rule_to_token_type.get(rule).copied()
    }

    pub fn rule_to_token_type(&self) -> &[i32] {
        &self.rule_to_token_type
    }

    pub fn num_modes(&self) -> usize {
        self.mode_to_start_state.len()
    }

    pub fn mode_start_state(&self, mode: usize) -> Option<usize> {
        self.mode_to_start_state.get(mode).copied()
    }

    pub fn mode_to_start_state(&self) -> &[usize] {
        &self.mode_to_start_state
    }

    pub fn lexer_action(&self, index: usize) -> Option<&LexerAction> {
        self.lexer_actions.get(index)
    }

    pub fn lexer_actions(&self) -> &[LexerAction] {
        &self.lexer_actions
    }

    /// Follow state of the rule call made from `invoking_state`.
    pub fn rule_follow_state(&self, invoking_state: usize) -> Option<usize> {
        match self.states.get(invoking_state)?.transition(0)? {
            Transition::Rule { follow_state, .. } => Some(*follow_state),
            _ => None,
        }
    }

    /// Tokens that can follow `state` without leaving its rule. Contains `EPSILON` when the
    /// end of the rule is reachable. Computed once per state.
    pub fn next_tokens(&self, state: usize) -> &IntervalSet {
        self.states[state]
            .next_tokens_cell()
            .get_or_init(|| Ll1Analyzer::new(self).look(state, None, None))
    }

    /// Tokens that can follow `state` given the call stack described by `invoking_states`
    /// (innermost first). Contains `EOF` when the outermost rule can end.
    pub fn next_tokens_in_context(&self, state: usize, invoking_states: impl IntoIterator<Item = usize>) -> IntervalSet {
        let context = LookContext::from_invoking_states(self, invoking_states);
        Ll1Analyzer::new(self).look(state, None, Some(context))
    }

    /// Tokens the parser could accept at `state` given the call stack, computed by climbing
    /// out of rules only as long as their ends are reachable.
    pub fn expected_tokens(&self, state: usize, invoking_states: impl IntoIterator<Item = usize>) -> IntervalSet {
        let following = self.next_tokens(state);
        if !following.contains(crate::token::EPSILON) {
            return following.clone();
        }
        let mut expected = following.clone();
        expected.remove(crate::token::EPSILON);
        let mut reaches_end = true;
        for invoking in invoking_states {
            if !reaches_end {
                break;
            }
            let Some(follow) = self.rule_follow_state(invoking) else {
                break;
            };
            let following = self.next_tokens(follow);
            expected.add_set(following);
            expected.remove(crate::token::EPSILON);
            reaches_end = following.contains(crate::token::EPSILON);
        }
        if reaches_end {
            expected.add(crate::token::EOF);
        }
        expected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::grammars;
    use crate::token::{EOF, EPSILON};

    #[test]
    fn test_rule_stop_states_return_to_follow_states() {
        let grammar = grammars::expression();
        let atn = grammar.atn();
        let e = grammars::expr::RULE_E;
        let stop = atn.state(atn.rule_stop_state(e).unwrap());
        // s calls e, the parenthesized primary calls e, and each operator alternative
        // calls e for its right operand
        assert_eq!(stop.transitions().len(), 4);
        let outermost: Vec<Option<usize>> = stop
            .transitions()
            .iter()
            .map(|t| match t {
                Transition::Epsilon { outermost_precedence_return, .. } => *outermost_precedence_return,
                _ => None,
            })
            .collect();
        assert_eq!(outermost.iter().filter(|o| o.is_some()).count(), 2);
    }

    #[test]
    fn test_precedence_decision_is_marked() {
        let grammar = grammars::expression();
        let atn = grammar.atn();
        let marked: Vec<&AtnState> = atn.states().iter().filter(|s| s.is_precedence_decision()).collect();
        assert_eq!(marked.len(), 1);
        assert_eq!(marked[0].rule_index, grammars::expr::RULE_E);
        assert!(marked[0].decision.is_some());
    }

    #[test]
    fn test_next_tokens_within_rule() {
        let grammar = grammars::expression();
        let atn = grammar.atn();
        let start = atn.rule_start_state(grammars::expr::RULE_E).unwrap();
        let first = atn.next_tokens(start);
        assert!(first.contains(grammars::expr::INT));
        assert!(first.contains(grammars::expr::LPAREN));
        assert!(!first.contains(EPSILON));
        let s_start = atn.rule_start_state(grammars::expr::RULE_S).unwrap();
        assert_eq!(atn.next_tokens(s_start), first);
    }

    #[test]
    fn test_expected_tokens_at_end_of_start_rule() {
        let grammar = grammars::ac();
        let atn = grammar.atn();
        let stop = atn.rule_stop_state(0).unwrap();
        let expected = atn.expected_tokens(stop, std::iter::empty());
        assert_eq!(expected.to_vec(), vec![EOF]);
    }
}
