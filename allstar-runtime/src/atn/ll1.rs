//! LL(1) lookahead
//!
//!     Computes the set of tokens that can come next from an ATN state by walking epsilon
//!     edges until every path has met a consuming transition. Predicates are seen through:
//!     the set describes what the grammar allows, not what the current semantic state allows.
//!
//!     Rule calls push their follow state on a [LookContext]; reaching a rule stop pops it.
//!     When the stack runs out, the result depends on what lies beyond it: an unbounded
//!     context (no caller information) records `EPSILON`, an exhausted caller chain records
//!     `EOF` because the start rule may end there.

use super::{Atn, Transition};
use crate::interval_set::IntervalSet;
use crate::token::{EOF, EPSILON, MIN_USER_TOKEN_TYPE};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Bottom {
    /// Nothing is known about the callers.
    Unbounded,
    /// The call stack ends here: the outermost rule was the start rule.
    Empty,
}

/// A linear call stack of follow states, innermost last.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LookContext {
    frames: Vec<usize>,
    bottom: Bottom,
}

impl LookContext {
    pub fn unbounded() -> Self {
        LookContext {
            frames: Vec::new(),
            bottom: Bottom::Unbounded,
        }
    }

    /// The stack described by the invoking states of a rule context chain, innermost first.
    pub fn from_invoking_states(atn: &Atn, invoking_states: impl IntoIterator<Item = usize>) -> Self {
        let mut frames: Vec<usize> = invoking_states
            .into_iter()
            .map_while(|invoking| atn.rule_follow_state(invoking))
            .collect();
        frames.reverse();
        LookContext {
            frames,
            bottom: Bottom::Empty,
        }
    }

    fn push(&self, follow_state: usize) -> Self {
        let mut frames = self.frames.clone();
        frames.push(follow_state);
        LookContext {
            frames,
            bottom: self.bottom,
        }
    }

    fn pop(&self) -> Option<(usize, LookContext)> {
        let (&top, rest) = self.frames.split_last()?;
        Some((
            top,
            LookContext {
                frames: rest.to_vec(),
                bottom: self.bottom,
            },
        ))
    }
}

pub struct Ll1Analyzer<'a> {
    atn: &'a Atn,
}

impl<'a> Ll1Analyzer<'a> {
    pub fn new(atn: &'a Atn) -> Self {
        Ll1Analyzer { atn }
    }

    /// Tokens that can follow `state`. With `stop_state`, paths end (recording `EPSILON`)
    /// when they reach it.
    pub fn look(&self, state: usize, stop_state: Option<usize>, context: Option<LookContext>) -> IntervalSet {
        let mut look = IntervalSet::new();
        let add_eof = context.is_some();
        let context = context.unwrap_or_else(LookContext::unbounded);
        let mut walk = LookWalk {
            atn: self.atn,
            stop_state,
            add_eof,
            busy: HashSet::new(),
            called_rules: vec![false; self.atn.num_rules()],
        };
        walk.visit(state, &context, &mut look);
        look
    }

    /// One lookahead set per alternative of a decision state. An alternative whose set is
    /// empty can only be taken by predicate.
    pub fn decision_lookahead(&self, state: usize) -> Vec<IntervalSet> {
        self.atn
            .state(state)
            .transitions()
            .iter()
            .map(|t| self.look(t.target(), None, None))
            .collect()
    }
}

struct LookWalk<'a> {
    atn: &'a Atn,
    stop_state: Option<usize>,
    add_eof: bool,
    busy: HashSet<(usize, LookContext)>,
    called_rules: Vec<bool>,
}

impl LookWalk<'_> {
    fn visit(&mut self, state: usize, context: &LookContext, look: &mut IntervalSet) {
        if !self.busy.insert((state, context.clone())) {
            return;
        }

        if Some(state) == self.stop_state {
            match context.bottom {
                _ if !context.frames.is_empty() => {}
                Bottom::Unbounded => {
                    look.add(EPSILON);
                    return;
                }
                Bottom::Empty if self.add_eof => {
                    look.add(EOF);
                    return;
                }
                Bottom::Empty => {}
            }
        }

        let atn_state = self.atn.state(state);
        if atn_state.is_rule_stop() {
            if context.frames.is_empty() {
                match context.bottom {
                    Bottom::Unbounded => {
                        look.add(EPSILON);
                        return;
                    }
                    Bottom::Empty if self.add_eof => {
                        look.add(EOF);
                        return;
                    }
                    Bottom::Empty => {}
                }
            } else if let Some((return_state, parent)) = context.pop() {
                let rule = self.atn.state(return_state).rule_index;
                let was_called = std::mem::replace(&mut self.called_rules[rule], false);
                self.visit(return_state, &parent, look);
                self.called_rules[rule] = was_called;
                return;
            }
        }

        for transition in atn_state.transitions() {
            match transition {
                Transition::Rule {
                    target,
                    rule_index,
                    follow_state,
                    ..
                } => {
                    if self.called_rules[*rule_index] {
                        continue;
                    }
                    let callee = context.push(*follow_state);
                    self.called_rules[*rule_index] = true;
                    self.visit(*target, &callee, look);
                    self.called_rules[*rule_index] = false;
                }
                Transition::Predicate { target, .. } | Transition::Precedence { target, .. } => {
                    self.visit(*target, context, look);
                }
                Transition::Wildcard { .. } => {
                    look.add_range(MIN_USER_TOKEN_TYPE, self.atn.max_token_type);
                }
                Transition::NotSet { set, .. } => {
                    look.add_set(&set.complement(MIN_USER_TOKEN_TYPE, self.atn.max_token_type));
                }
                t if t.is_epsilon() => {
                    self.visit(t.target(), context, look);
                }
                t => {
                    if let Some(label) = t.label() {
                        look.add_set(&label);
                    }
                }
            }
        }
    }
}
