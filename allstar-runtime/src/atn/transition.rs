//! ATN transitions
//!
//!     Edges between ATN states. Epsilon-like transitions (epsilon, rule, predicate,
//!     precedence, action) consume nothing; the rest match one input symbol. Transitions are
//!     plain data and serialize as-is into grammar descriptions.

use crate::interval_set::IntervalSet;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Transition {
    Epsilon {
        target: usize,
        /// Set on the return edge of a precedence-0 call into a left-recursive rule: the
        /// index of that rule.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        outermost_precedence_return: Option<usize>,
    },
    Atom {
        target: usize,
        label: i32,
    },
    Range {
        target: usize,
        from: i32,
        to: i32,
    },
    Set {
        target: usize,
        set: IntervalSet,
    },
    NotSet {
        target: usize,
        set: IntervalSet,
    },
    Wildcard {
        target: usize,
    },
    /// Call into another rule. `target` is the rule's start state; `follow_state` is where
    /// the caller resumes.
    Rule {
        target: usize,
        rule_index: usize,
        #[serde(default)]
        precedence: i32,
        follow_state: usize,
    },
    Predicate {
        target: usize,
        rule_index: usize,
        pred_index: usize,
        #[serde(default)]
        ctx_dependent: bool,
    },
    Precedence {
        target: usize,
        precedence: i32,
    },
    Action {
        target: usize,
        rule_index: usize,
        /// `None` for anonymous actions, which are never executed.
        #[serde(default)]
        action_index: Option<usize>,
        #[serde(default)]
        ctx_dependent: bool,
    },
}

impl Transition {
    pub fn epsilon(target: usize) -> Self {
        Transition::Epsilon {
            target,
            outermost_precedence_return: None,
        }
    }

    pub fn target(&self) -> usize {
        match *self {
            Transition::Epsilon { target, .. }
            | Transition::Atom { target, .. }
            | Transition::Range { target, .. }
            | Transition::Set { target, .. }
            | Transition::NotSet { target, .. }
            | Transition::Wildcard { target }
            | Transition::Rule { target, .. }
            | Transition::Predicate { target, .. }
            | Transition::Precedence { target, .. }
            | Transition::Action { target, .. } => target,
        }
    }

    pub(crate) fn retarget(&mut self, new_target: usize) {
        match self {
            Transition::Epsilon { target, .. }
            | Transition::Atom { target, .. }
            | Transition::Range { target, .. }
            | Transition::Set { target, .. }
            | Transition::NotSet { target, .. }
            | Transition::Wildcard { target }
            | Transition::Rule { target, .. }
            | Transition::Predicate { target, .. }
            | Transition::Precedence { target, .. }
            | Transition::Action { target, .. } => *target = new_target,
        }
    }

    /// True for transitions that consume no input.
    pub fn is_epsilon(&self) -> bool {
        matches!(
            self,
            Transition::Epsilon { .. }
                | Transition::Rule { .. }
                | Transition::Predicate { .. }
                | Transition::Precedence { .. }
                | Transition::Action { .. }
        )
    }

    /// Whether this transition consumes `symbol`, with `[min, max]` the vocabulary bounds
    /// used by wildcard and negated sets.
    pub fn matches(&self, symbol: i32, min: i32, max: i32) -> bool {
        match self {
            Transition::Atom { label, .. } => *label == symbol,
            Transition::Range { from, to, .. } => *from <= symbol && symbol <= *to,
            Transition::Set { set, .. } => set.contains(symbol),
            Transition::NotSet { set, .. } => symbol >= min && symbol <= max && !set.contains(symbol),
            Transition::Wildcard { .. } => symbol >= min && symbol <= max,
            _ => false,
        }
    }

    /// The symbols matched, for transitions with an explicit label.
    pub fn label(&self) -> Option<IntervalSet> {
        match self {
            Transition::Atom { label, .. } => Some(IntervalSet::of(*label)),
            Transition::Range { from, to, .. } => Some(IntervalSet::of_range(*from, *to)),
            Transition::Set { set, .. } | Transition::NotSet { set, .. } => Some(set.clone()),
            _ => None,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Transition::Epsilon { .. } => "epsilon",
            Transition::Atom { .. } => "atom",
            Transition::Range { .. } => "range",
            Transition::Set { .. } => "set",
            Transition::NotSet { .. } => "not-set",
            Transition::Wildcard { .. } => "wildcard",
            Transition::Rule { .. } => "rule",
            Transition::Predicate { .. } => "predicate",
            Transition::Precedence { .. } => "precedence",
            Transition::Action { .. } => "action",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_matching() {
        let not_set = Transition::NotSet {
            target: 1,
            set: IntervalSet::of(3),
        };
        assert!(not_set.matches(2, 1, 5));
        assert!(!not_set.matches(3, 1, 5));
        assert!(!not_set.matches(6, 1, 5));

        let range = Transition::Range { target: 1, from: 'a' as i32, to: 'z' as i32 };
        assert!(range.matches('q' as i32, 0, 0x10FFFF));
        assert!(!range.is_epsilon());
        assert!(Transition::epsilon(4).is_epsilon());
    }

    #[test]
    fn test_serialized_shape() {
        let rule = Transition::Rule {
            target: 7,
            rule_index: 2,
            precedence: 0,
            follow_state: 9,
        };
        let json = serde_json::to_string(&rule).unwrap();
        assert_eq!(json, r#"{"type":"rule","target":7,"rule_index":2,"precedence":0,"follow_state":9}"#);
        let back: Transition = serde_json::from_str(r#"{"type":"epsilon","target":3}"#).unwrap();
        assert_eq!(back, Transition::epsilon(3));
    }
}
