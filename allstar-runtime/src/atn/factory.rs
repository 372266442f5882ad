//! ATN construction
//!
//!     Builds ATNs in code, fragment by fragment, with the same shapes a grammar tool
//!     produces. Every fragment is a [Handle]: an entry state and an exit state. Fragments
//!     compose through `sequence`, `alternatives` and the EBNF operators; a rule body is a
//!     handle wired between the rule's start and stop states.
//!
//!     Rules are declared first (so they can reference each other) and defined afterwards:
//!
//!     ```text
//!     let mut f = AtnFactory::parser(MAX_TOKEN);
//!     let s = f.declare_rule();
//!     let e = f.declare_left_recursive_rule();
//!     f.rule(s, |f| {
//!         let body = f.rule_ref(e);
//!         let eof = f.token(EOF);
//!         f.sequence(vec![body, eof])
//!     });
//!     f.rule(e, |f| {
//!         let int = f.token(INT);
//!         let star = f.token(STAR);
//!         let rhs = f.rule_ref_with_precedence(e, 2);
//!         let times = f.sequence(vec![star, rhs]);
//!         f.left_recursive_body(vec![int], vec![(1, times)])
//!     });
//!     let atn = f.build()?;
//!     ```
//!
//! Left recursion
//!
//!     A left-recursive rule such as `e: e '*' e | e '+' e | INT` is expressed in its
//!     rewritten form: the primary alternatives followed by a greedy loop over the operator
//!     suffixes, each guarded by a precedence predicate:
//!
//!         e[p]: INT ( {3 >= p}? '*' e[4] | {2 >= p}? '+' e[3] )*
//!
//!     [AtnFactory::left_recursive_body] builds exactly that shape. The loop entry becomes the
//!     rule's precedence decision when the ATN is finalized.

use super::state::{AtnState, BlockKind, StateKind};
use super::{Atn, AtnParts, GrammarType, LexerAction, Transition};
use crate::error::AtnError;
use crate::interval_set::IntervalSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Handle {
    pub left: usize,
    pub right: usize,
}

#[derive(Debug)]
pub struct AtnFactory {
    grammar_type: GrammarType,
    max_token_type: i32,
    states: Vec<AtnState>,
    rule_starts: Vec<usize>,
    rule_token_types: Vec<i32>,
    modes: Vec<usize>,
    decisions: Vec<usize>,
    lexer_actions: Vec<LexerAction>,
    current_rule: usize,
}

impl AtnFactory {
    pub fn parser(max_token_type: i32) -> Self {
        Self::new(GrammarType::Parser, max_token_type)
    }

    pub fn lexer(max_token_type: i32) -> Self {
        Self::new(GrammarType::Lexer, max_token_type)
    }

    fn new(grammar_type: GrammarType, max_token_type: i32) -> Self {
        AtnFactory {
            grammar_type,
            max_token_type,
            states: Vec::new(),
            rule_starts: Vec::new(),
            rule_token_types: Vec::new(),
            modes: Vec::new(),
            decisions: Vec::new(),
            lexer_actions: Vec::new(),
            current_rule: 0,
        }
    }

    pub fn declare_rule(&mut self) -> usize {
        self.declare(false, 0)
    }

    pub fn declare_left_recursive_rule(&mut self) -> usize {
        self.declare(true, 0)
    }

    /// Lexer rule emitting `token_type`. Fragment rules use `declare_rule`.
    pub fn declare_token_rule(&mut self, token_type: i32) -> usize {
        self.declare(false, token_type)
    }

    fn declare(&mut self, left_recursive: bool, token_type: i32) -> usize {
        let rule = self.rule_starts.len();
        self.current_rule = rule;
        let stop = self.new_state(StateKind::RuleStop);
        let start = self.new_state(StateKind::RuleStart {
            stop_state: stop,
            left_recursive,
        });
        self.rule_starts.push(start);
        self.rule_token_types.push(token_type);
        rule
    }

    /// Defines the body of a declared rule.
    pub fn rule(&mut self, rule: usize, body: impl FnOnce(&mut Self) -> Handle) {
        let Some(&start) = self.rule_starts.get(rule) else {
            log::warn!("ignoring definition of undeclared rule {}", rule);
            return;
        };
        self.current_rule = rule;
        let handle = body(self);
        let stop = match self.states[start].kind {
            StateKind::RuleStart { stop_state, .. } => stop_state,
            _ => return,
        };
        self.epsilon_edge(start, handle.left);
        self.epsilon_edge(handle.right, stop);
    }

    /// A lexer mode whose tokens are the given rules, tried in order.
    pub fn add_mode(&mut self, rules: &[usize]) -> usize {
        let start = self.new_state(StateKind::TokensStart);
        self.define_decision(start);
        for &rule in rules {
            if let Some(&rule_start) = self.rule_starts.get(rule) {
                self.epsilon_edge(start, rule_start);
            }
        }
        self.modes.push(start);
        self.modes.len() - 1
    }

    pub fn token(&mut self, token_type: i32) -> Handle {
        self.edge(Transition::Atom { target: 0, label: token_type })
    }

    pub fn range(&mut self, from: i32, to: i32) -> Handle {
        self.edge(Transition::Range { target: 0, from, to })
    }

    pub fn set(&mut self, set: IntervalSet) -> Handle {
        self.edge(Transition::Set { target: 0, set })
    }

    pub fn not_set(&mut self, set: IntervalSet) -> Handle {
        self.edge(Transition::NotSet { target: 0, set })
    }

    pub fn wildcard(&mut self) -> Handle {
        self.edge(Transition::Wildcard { target: 0 })
    }

    /// Lexer string literal: one atom per character.
    pub fn literal(&mut self, text: &str) -> Handle {
        let atoms: Vec<Handle> = text.chars().map(|c| self.token(c as i32)).collect();
        if atoms.is_empty() {
            return self.epsilon();
        }
        self.sequence(atoms)
    }

    pub fn char_range(&mut self, from: char, to: char) -> Handle {
        self.range(from as i32, to as i32)
    }

    pub fn rule_ref(&mut self, rule: usize) -> Handle {
        self.rule_ref_with_precedence(rule, 0)
    }

    pub fn rule_ref_with_precedence(&mut self, rule: usize, precedence: i32) -> Handle {
        let left = self.new_state(StateKind::Basic);
        let right = self.new_state(StateKind::Basic);
        let target = self.rule_starts.get(rule).copied().unwrap_or(usize::MAX);
        self.states[left].add_transition(Transition::Rule {
            target,
            rule_index: rule,
            precedence,
            follow_state: right,
        });
        Handle { left, right }
    }

    pub fn epsilon(&mut self) -> Handle {
        let left = self.new_state(StateKind::Basic);
        let right = self.new_state(StateKind::Basic);
        self.epsilon_edge(left, right);
        Handle { left, right }
    }

    pub fn predicate(&mut self, pred_index: usize, ctx_dependent: bool) -> Handle {
        let rule_index = self.current_rule;
        self.edge(Transition::Predicate {
            target: 0,
            rule_index,
            pred_index,
            ctx_dependent,
        })
    }

    pub fn precedence_predicate(&mut self, precedence: i32) -> Handle {
        self.edge(Transition::Precedence { target: 0, precedence })
    }

    pub fn action(&mut self, action_index: usize) -> Handle {
        let rule_index = self.current_rule;
        self.edge(Transition::Action {
            target: 0,
            rule_index,
            action_index: Some(action_index),
            ctx_dependent: false,
        })
    }

    /// A lexer command; the action joins the ATN's action table.
    pub fn lexer_action(&mut self, action: LexerAction) -> Handle {
        let index = match self.lexer_actions.iter().position(|a| *a == action) {
            Some(index) => index,
            None => {
                self.lexer_actions.push(action);
                self.lexer_actions.len() - 1
            }
        };
        self.action(index)
    }

    pub fn sequence(&mut self, elements: Vec<Handle>) -> Handle {
        let Some(first) = elements.first().copied() else {
            return self.epsilon();
        };
        let mut right = first.right;
        for element in &elements[1..] {
            self.epsilon_edge(right, element.left);
            right = element.right;
        }
        Handle {
            left: first.left,
            right,
        }
    }

    /// `( a | b | ... )`. A single alternative is returned unchanged.
    pub fn alternatives(&mut self, alts: Vec<Handle>) -> Handle {
        if alts.len() == 1 {
            return alts[0];
        }
        let end = self.new_state(StateKind::BlockEnd { start_state: None });
        let start = self.new_state(StateKind::BlockStart {
            block: BlockKind::Basic,
            end_state: end,
            loop_back: None,
        });
        if alts.len() > 1 {
            self.define_decision(start);
        }
        self.make_block(start, end, &alts)
    }

    /// `( a | b )?`
    pub fn optional(&mut self, alts: Vec<Handle>, greedy: bool) -> Handle {
        let end = self.new_state(StateKind::BlockEnd { start_state: None });
        let start = self.new_state(StateKind::BlockStart {
            block: BlockKind::Basic,
            end_state: end,
            loop_back: None,
        });
        self.define_decision(start);
        let handle = self.make_block(start, end, &alts);
        self.states[start].non_greedy = !greedy;
        let bypass = if greedy { self.states[start].transitions().len() } else { 0 };
        self.states[start].insert_transition(bypass, Transition::epsilon(end));
        handle
    }

    /// `( a | b )*`
    pub fn star(&mut self, alts: Vec<Handle>, greedy: bool) -> Handle {
        let end = self.new_state(StateKind::BlockEnd { start_state: None });
        let block_start = self.new_state(StateKind::BlockStart {
            block: BlockKind::Star,
            end_state: end,
            loop_back: None,
        });
        if alts.len() > 1 {
            self.define_decision(block_start);
        }
        self.make_block(block_start, end, &alts);

        let loop_back = self.new_state(StateKind::StarLoopBack);
        let entry = self.new_state(StateKind::StarLoopEntry {
            loop_back: None,
            precedence_decision: false,
        });
        self.states[entry].non_greedy = !greedy;
        self.define_decision(entry);
        let loop_end = self.new_state(StateKind::LoopEnd { loop_back });

        if greedy {
            self.epsilon_edge(entry, block_start);
            self.epsilon_edge(entry, loop_end);
        } else {
            self.epsilon_edge(entry, loop_end);
            self.epsilon_edge(entry, block_start);
        }
        self.epsilon_edge(end, loop_back);
        self.epsilon_edge(loop_back, entry);
        Handle {
            left: entry,
            right: loop_end,
        }
    }

    /// `( a | b )+`
    pub fn plus(&mut self, alts: Vec<Handle>, greedy: bool) -> Handle {
        let end = self.new_state(StateKind::BlockEnd { start_state: None });
        let block_start = self.new_state(StateKind::BlockStart {
            block: BlockKind::Plus,
            end_state: end,
            loop_back: None,
        });
        if alts.len() > 1 {
            self.define_decision(block_start);
        }
        self.make_block(block_start, end, &alts);

        let loop_back = self.new_state(StateKind::PlusLoopBack);
        self.states[loop_back].non_greedy = !greedy;
        self.define_decision(loop_back);
        let loop_end = self.new_state(StateKind::LoopEnd { loop_back });

        self.epsilon_edge(end, loop_back);
        if greedy {
            self.epsilon_edge(loop_back, block_start);
            self.epsilon_edge(loop_back, loop_end);
        } else {
            self.epsilon_edge(loop_back, loop_end);
            self.epsilon_edge(loop_back, block_start);
        }
        Handle {
            left: block_start,
            right: loop_end,
        }
    }

    /// Body of a left-recursive rule: the primaries, then a loop over the operator
    /// suffixes. Each suffix comes with the precedence of its alternative and must include
    /// its own right operand (a call with the appropriate precedence).
    pub fn left_recursive_body(&mut self, primaries: Vec<Handle>, suffixes: Vec<(i32, Handle)>) -> Handle {
        let primary = self.alternatives(primaries);
        let guarded: Vec<Handle> = suffixes
            .into_iter()
            .map(|(precedence, suffix)| {
                let guard = self.precedence_predicate(precedence);
                self.sequence(vec![guard, suffix])
            })
            .collect();
        let operators = self.star(guarded, true);
        self.sequence(vec![primary, operators])
    }

    pub fn build(self) -> Result<Atn, AtnError> {
        for &start in &self.rule_starts {
            if self.states[start].transitions().is_empty() {
                return Err(AtnError::Verification {
                    state: start,
                    message: format!("rule {} was declared but never defined", self.states[start].rule_index),
                });
            }
        }
        let rule_to_token_type = match self.grammar_type {
            GrammarType::Lexer => self.rule_token_types,
            GrammarType::Parser => Vec::new(),
        };
        Atn::from_parts(AtnParts {
            grammar_type: self.grammar_type,
            max_token_type: self.max_token_type,
            states: self.states,
            rule_to_start_state: self.rule_starts,
            rule_to_token_type,
            mode_to_start_state: self.modes,
            decision_to_state: self.decisions,
            lexer_actions: self.lexer_actions,
        })
    }

    fn new_state(&mut self, kind: StateKind) -> usize {
        let number = self.states.len();
        self.states.push(AtnState::new(number, self.current_rule, kind));
        number
    }

    fn define_decision(&mut self, state: usize) {
        self.decisions.push(state);
    }

    fn epsilon_edge(&mut self, from: usize, to: usize) {
        self.states[from].add_transition(Transition::epsilon(to));
    }

    /// A two-state fragment joined by `transition`, retargeted to the new right state.
    fn edge(&mut self, mut transition: Transition) -> Handle {
        let left = self.new_state(StateKind::Basic);
        let right = self.new_state(StateKind::Basic);
        transition.retarget(right);
        self.states[left].add_transition(transition);
        Handle { left, right }
    }

    fn make_block(&mut self, start: usize, end: usize, alts: &[Handle]) -> Handle {
        for alt in alts {
            self.epsilon_edge(start, alt.left);
            self.epsilon_edge(alt.right, end);
        }
        Handle { left: start, right: end }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_star_loop_shape() {
        let mut f = AtnFactory::parser(3);
        let s = f.declare_rule();
        f.rule(s, |f| {
            let a = f.token(1);
            let b = f.token(2);
            f.star(vec![a, b], true)
        });
        let atn = f.build().unwrap();
        // the block decision comes before the loop entry decision
        assert_eq!(atn.num_decisions(), 2);
        let entry = atn.decision_state(1).unwrap();
        assert!(entry.is_star_loop_entry());
        assert!(!entry.is_precedence_decision());
        let loop_end = atn.state(entry.transitions()[1].target());
        assert!(loop_end.is_loop_end());
    }

    #[test]
    fn test_non_greedy_optional_prefers_bypass() {
        let mut f = AtnFactory::parser(3);
        let s = f.declare_rule();
        f.rule(s, |f| {
            let a = f.token(1);
            f.optional(vec![a], false)
        });
        let atn = f.build().unwrap();
        let decision = atn.decision_state(0).unwrap();
        assert!(decision.non_greedy);
        let bypass = atn.state(decision.transitions()[0].target());
        assert!(bypass.is_block_end());
    }

    #[test]
    fn test_undefined_rule_is_rejected() {
        let mut f = AtnFactory::parser(3);
        let s = f.declare_rule();
        let t = f.declare_rule();
        f.rule(s, |f| f.rule_ref(t));
        assert!(matches!(f.build(), Err(AtnError::Verification { .. })));
    }

    #[test]
    fn test_lexer_mode_tokens_start() {
        let mut f = AtnFactory::lexer(2);
        let a = f.declare_token_rule(1);
        let b = f.declare_token_rule(2);
        f.rule(a, |f| f.literal("ab"));
        f.rule(b, |f| f.char_range('0', '9'));
        f.add_mode(&[a, b]);
        let atn = f.build().unwrap();
        assert_eq!(atn.num_modes(), 1);
        let start = atn.state(atn.mode_start_state(0).unwrap());
        assert_eq!(start.transitions().len(), 2);
        assert_eq!(atn.rule_token_type(b), Some(2));
    }
}
