//! ATN states
//!
//!     States are numbered densely from 0 and owned by the [Atn](super::Atn); everything else
//!     refers to them by number. The [StateKind] carries the links between related states
//!     (a block start and its end, a loop entry and its loop-back). Links that can be
//!     recomputed from the transitions are `Option` until the ATN is finalized.

use super::transition::Transition;
use crate::interval_set::IntervalSet;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    /// `( a | b )` and `( a | b )?`
    Basic,
    /// The block inside `( a | b )+`
    Plus,
    /// The block inside `( a | b )*`
    Star,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateKind {
    Basic,
    RuleStart {
        stop_state: usize,
        left_recursive: bool,
    },
    RuleStop,
    BlockStart {
        block: BlockKind,
        end_state: usize,
        /// Plus blocks only: the loop-back decision that re-enters the block.
        loop_back: Option<usize>,
    },
    BlockEnd {
        start_state: Option<usize>,
    },
    PlusLoopBack,
    StarLoopBack,
    StarLoopEntry {
        loop_back: Option<usize>,
        /// Entry decision of the operator loop of a left-recursive rule.
        precedence_decision: bool,
    },
    LoopEnd {
        loop_back: usize,
    },
    /// Lexer mode entry: one epsilon edge per token rule of the mode.
    TokensStart,
}

impl StateKind {
    pub fn name(&self) -> &'static str {
        match self {
            StateKind::Basic => "basic",
            StateKind::RuleStart { .. } => "rule-start",
            StateKind::RuleStop => "rule-stop",
            StateKind::BlockStart { block: BlockKind::Basic, .. } => "block-start",
            StateKind::BlockStart { block: BlockKind::Plus, .. } => "plus-block-start",
            StateKind::BlockStart { block: BlockKind::Star, .. } => "star-block-start",
            StateKind::BlockEnd { .. } => "block-end",
            StateKind::PlusLoopBack => "plus-loop-back",
            StateKind::StarLoopBack => "star-loop-back",
            StateKind::StarLoopEntry { .. } => "star-loop-entry",
            StateKind::LoopEnd { .. } => "loop-end",
            StateKind::TokensStart => "tokens-start",
        }
    }

    /// Kinds that may carry a decision number.
    pub fn is_decision_kind(&self) -> bool {
        matches!(
            self,
            StateKind::BlockStart { .. }
                | StateKind::PlusLoopBack
                | StateKind::StarLoopEntry { .. }
                | StateKind::TokensStart
        )
    }
}

#[derive(Debug, Clone)]
pub struct AtnState {
    pub number: usize,
    pub rule_index: usize,
    pub kind: StateKind,
    pub decision: Option<usize>,
    /// Decision states of non-greedy subrules prefer exiting.
    pub non_greedy: bool,
    transitions: Vec<Transition>,
    epsilon_only: bool,
    next_tokens: OnceCell<IntervalSet>,
}

impl AtnState {
    pub fn new(number: usize, rule_index: usize, kind: StateKind) -> Self {
        AtnState {
            number,
            rule_index,
            kind,
            decision: None,
            non_greedy: false,
            transitions: Vec::new(),
            epsilon_only: false,
            next_tokens: OnceCell::new(),
        }
    }

    pub fn transitions(&self) -> &[Transition] {
        &self.transitions
    }

    pub fn transition(&self, i: usize) -> Option<&Transition> {
        self.transitions.get(i)
    }

    pub fn add_transition(&mut self, transition: Transition) {
        self.insert_transition(self.transitions.len(), transition);
    }

    pub(crate) fn insert_transition(&mut self, index: usize, transition: Transition) {
        if self.transitions.is_empty() {
            self.epsilon_only = transition.is_epsilon();
        } else if self.epsilon_only != transition.is_epsilon() {
            log::warn!(
                "ATN state {} has both epsilon and non-epsilon transitions",
                self.number
            );
            self.epsilon_only = false;
        }
        self.transitions.insert(index.min(self.transitions.len()), transition);
    }

    pub(crate) fn transitions_mut(&mut self) -> &mut [Transition] {
        &mut self.transitions
    }

    /// False for states without transitions, so rule stop states of uncalled rules still
    /// count as configurations in their own right.
    pub fn only_has_epsilon_transitions(&self) -> bool {
        self.epsilon_only
    }

    pub fn is_rule_stop(&self) -> bool {
        matches!(self.kind, StateKind::RuleStop)
    }

    pub fn is_rule_start(&self) -> bool {
        matches!(self.kind, StateKind::RuleStart { .. })
    }

    pub fn is_left_recursive_rule_start(&self) -> bool {
        matches!(self.kind, StateKind::RuleStart { left_recursive: true, .. })
    }

    pub fn is_loop_end(&self) -> bool {
        matches!(self.kind, StateKind::LoopEnd { .. })
    }

    pub fn is_block_end(&self) -> bool {
        matches!(self.kind, StateKind::BlockEnd { .. })
    }

    pub fn is_star_loop_entry(&self) -> bool {
        matches!(self.kind, StateKind::StarLoopEntry { .. })
    }

    pub fn is_precedence_decision(&self) -> bool {
        matches!(
            self.kind,
            StateKind::StarLoopEntry {
                precedence_decision: true,
                ..
            }
        )
    }

    pub fn is_decision_state(&self) -> bool {
        self.kind.is_decision_kind()
    }

    pub(crate) fn next_tokens_cell(&self) -> &OnceCell<IntervalSet> {
        &self.next_tokens
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_epsilon_only_tracking() {
        let mut state = AtnState::new(0, 0, StateKind::Basic);
        assert!(!state.only_has_epsilon_transitions());
        state.add_transition(Transition::epsilon(1));
        assert!(state.only_has_epsilon_transitions());
        state.add_transition(Transition::Atom { target: 2, label: 5 });
        assert!(!state.only_has_epsilon_transitions());
    }

    #[test]
    fn test_insert_at_front() {
        let mut state = AtnState::new(0, 0, StateKind::Basic);
        state.add_transition(Transition::epsilon(1));
        state.insert_transition(0, Transition::epsilon(2));
        assert_eq!(state.transitions()[0].target(), 2);
    }
}
