//! Semantic contexts
//!
//!     The predicates a configuration has crossed on its way through the ATN, kept as a small
//!     boolean expression tree. `None` is the always-true context. Conjunctions and
//!     disjunctions are flattened, deduplicated and kept sorted, so equal expressions compare
//!     equal; precedence predicates inside one are reduced to the single one that decides the
//!     result (the lowest for AND, the highest for OR).

use crate::tree::NodeId;
use std::collections::BTreeSet;
use std::fmt;

/// Answers predicate questions during prediction and parsing.
pub trait PredicateEvaluator {
    /// User predicate `pred_index` of rule `rule_index`, evaluated in `ctx`.
    fn sempred(&mut self, ctx: Option<NodeId>, rule_index: usize, pred_index: usize) -> bool;

    /// `precedence >= the precedence of the current left-recursive invocation`.
    fn precpred(&mut self, ctx: Option<NodeId>, precedence: i32) -> bool;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum SemanticContext {
    #[default]
    None,
    Predicate {
        rule_index: usize,
        pred_index: usize,
        ctx_dependent: bool,
    },
    Precedence(i32),
    And(Vec<SemanticContext>),
    Or(Vec<SemanticContext>),
}

impl SemanticContext {
    pub fn is_none(&self) -> bool {
        matches!(self, SemanticContext::None)
    }

    pub fn and(a: &SemanticContext, b: &SemanticContext) -> SemanticContext {
        if a.is_none() {
            return b.clone();
        }
        if b.is_none() {
            return a.clone();
        }
        let mut operands = BTreeSet::new();
        for side in [a, b] {
            match side {
                SemanticContext::And(inner) => operands.extend(inner.iter().cloned()),
                other => {
                    operands.insert(other.clone());
                }
            }
        }
        Self::combine(operands, true)
    }

    pub fn or(a: &SemanticContext, b: &SemanticContext) -> SemanticContext {
        if a.is_none() || b.is_none() {
            return SemanticContext::None;
        }
        let mut operands = BTreeSet::new();
        for side in [a, b] {
            match side {
                SemanticContext::Or(inner) => operands.extend(inner.iter().cloned()),
                other => {
                    operands.insert(other.clone());
                }
            }
        }
        Self::combine(operands, false)
    }

    fn combine(operands: BTreeSet<SemanticContext>, conjunction: bool) -> SemanticContext {
        let (precedence, mut rest): (Vec<_>, Vec<_>) = operands
            .into_iter()
            .partition(|op| matches!(op, SemanticContext::Precedence(_)));
        let levels = precedence.iter().filter_map(|p| match p {
            SemanticContext::Precedence(level) => Some(*level),
            _ => None,
        });
        let reduced = if conjunction { levels.min() } else { levels.max() };
        if let Some(level) = reduced {
            rest.push(SemanticContext::Precedence(level));
            rest.sort();
        }
        if rest.len() == 1 {
            return rest.remove(0);
        }
        if conjunction {
            SemanticContext::And(rest)
        } else {
            SemanticContext::Or(rest)
        }
    }

    /// Evaluates the expression. Context-independent predicates see no context.
    pub fn eval(&self, evaluator: &mut dyn PredicateEvaluator, outer: Option<NodeId>) -> bool {
        match self {
            SemanticContext::None => true,
            SemanticContext::Predicate {
                rule_index,
                pred_index,
                ctx_dependent,
            } => {
                let local = if *ctx_dependent { outer } else { None };
                evaluator.sempred(local, *rule_index, *pred_index)
            }
            SemanticContext::Precedence(level) => evaluator.precpred(outer, *level),
            SemanticContext::And(operands) => operands.iter().all(|op| op.eval(evaluator, outer)),
            SemanticContext::Or(operands) => operands.iter().any(|op| op.eval(evaluator, outer)),
        }
    }

    /// Evaluates only the precedence predicates. Returns the simplified remainder, with
    /// `Some(None)` meaning "certainly true" and `None` meaning "certainly false".
    pub fn eval_precedence(&self, evaluator: &mut dyn PredicateEvaluator, outer: Option<NodeId>) -> Option<SemanticContext> {
        match self {
            SemanticContext::Precedence(level) => {
                if evaluator.precpred(outer, *level) {
                    Some(SemanticContext::None)
                } else {
                    None
                }
            }
            SemanticContext::And(operands) => {
                let mut differs = false;
                let mut remaining = Vec::new();
                for operand in operands {
                    let evaluated = operand.eval_precedence(evaluator, outer);
                    differs |= evaluated.as_ref() != Some(operand);
                    match evaluated {
                        None => return None,
                        Some(SemanticContext::None) => {}
                        Some(other) => remaining.push(other),
                    }
                }
                if !differs {
                    return Some(self.clone());
                }
                Some(
                    remaining
                        .iter()
                        .fold(SemanticContext::None, |acc, op| SemanticContext::and(&acc, op)),
                )
            }
            SemanticContext::Or(operands) => {
                let mut differs = false;
                let mut remaining = Vec::new();
                for operand in operands {
                    let evaluated = operand.eval_precedence(evaluator, outer);
                    differs |= evaluated.as_ref() != Some(operand);
                    match evaluated {
                        Some(SemanticContext::None) => return Some(SemanticContext::None),
                        Some(other) => remaining.push(other),
                        None => {}
                    }
                }
                if !differs {
                    return Some(self.clone());
                }
                let mut remaining = remaining.into_iter();
                let first = remaining.next()?;
                Some(remaining.fold(first, |acc, op| SemanticContext::or(&acc, &op)))
            }
            other => Some(other.clone()),
        }
    }
}

impl fmt::Display for SemanticContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |f: &mut fmt::Formatter<'_>, operands: &[SemanticContext], sep: &str| {
            let parts: Vec<String> = operands.iter().map(|op| op.to_string()).collect();
            write!(f, "{}", parts.join(sep))
        };
        match self {
            SemanticContext::None => write!(f, "true"),
            SemanticContext::Predicate {
                rule_index,
                pred_index,
                ..
            } => write!(f, "{{{}:{}}}?", rule_index, pred_index),
            SemanticContext::Precedence(level) => write!(f, "{{{}>=prec}}?", level),
            SemanticContext::And(operands) => join(f, operands, "&&"),
            SemanticContext::Or(operands) => join(f, operands, "||"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed {
        precedence: i32,
        answers: Vec<bool>,
    }

    impl PredicateEvaluator for Fixed {
        fn sempred(&mut self, _ctx: Option<NodeId>, _rule_index: usize, pred_index: usize) -> bool {
            self.answers[pred_index]
        }

        fn precpred(&mut self, _ctx: Option<NodeId>, precedence: i32) -> bool {
            precedence >= self.precedence
        }
    }

    fn pred(pred_index: usize) -> SemanticContext {
        SemanticContext::Predicate {
            rule_index: 0,
            pred_index,
            ctx_dependent: false,
        }
    }

    #[test]
    fn test_none_is_identity_for_and() {
        assert_eq!(SemanticContext::and(&SemanticContext::None, &pred(1)), pred(1));
        assert_eq!(SemanticContext::or(&SemanticContext::None, &pred(1)), SemanticContext::None);
    }

    #[test]
    fn test_precedence_reduction() {
        let and = SemanticContext::and(&SemanticContext::Precedence(3), &SemanticContext::Precedence(2));
        assert_eq!(and, SemanticContext::Precedence(2));
        let or = SemanticContext::or(&SemanticContext::Precedence(3), &SemanticContext::Precedence(2));
        assert_eq!(or, SemanticContext::Precedence(3));
    }

    #[test]
    fn test_flattening_is_order_independent() {
        let ab = SemanticContext::and(&pred(0), &pred(1));
        let ba = SemanticContext::and(&pred(1), &pred(0));
        assert_eq!(ab, ba);
        let abc = SemanticContext::and(&ab, &pred(2));
        assert!(matches!(&abc, SemanticContext::And(ops) if ops.len() == 3));
    }

    #[test]
    fn test_eval_precedence_simplifies() {
        let mut evaluator = Fixed {
            precedence: 2,
            answers: vec![true, false],
        };
        let guarded = SemanticContext::and(&SemanticContext::Precedence(3), &pred(1));
        assert_eq!(guarded.eval_precedence(&mut evaluator, None), Some(pred(1)));
        let failing = SemanticContext::and(&SemanticContext::Precedence(1), &pred(1));
        assert_eq!(failing.eval_precedence(&mut evaluator, None), None);
        assert!(!guarded.eval(&mut evaluator, None));
        assert!(SemanticContext::or(&pred(0), &pred(1)).eval(&mut evaluator, None));
    }
}
