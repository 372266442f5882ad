//! Lexer actions
//!
//!     Commands attached to lexer rules (`-> skip`, `-> channel(HIDDEN)`, `-> pushMode(X)`,
//!     custom code). The ATN stores them in one table and action transitions refer to them by
//!     index. While the lexer simulator explores the ATN, each configuration accumulates the
//!     actions it passed in a [LexerActionExecutor]; the executor of the winning configuration
//!     runs once the token is accepted.
//!
//!     Custom actions are position dependent: they must observe the input as it was when the
//!     action transition was crossed, not at the end of the token. When such an action is
//!     appended before the end of the match, it is wrapped with its offset from the token
//!     start so execution can seek there first.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum LexerAction {
    Channel {
        channel: usize,
    },
    Custom {
        rule_index: usize,
        action_index: usize,
    },
    Mode {
        mode: usize,
    },
    More,
    PopMode,
    PushMode {
        mode: usize,
    },
    Skip,
    Type {
        token_type: i32,
    },
    /// A position-dependent action pinned to an offset from the token start.
    #[serde(skip)]
    Indexed {
        offset: usize,
        action: Box<LexerAction>,
    },
}

impl LexerAction {
    pub fn is_position_dependent(&self) -> bool {
        matches!(self, LexerAction::Custom { .. } | LexerAction::Indexed { .. })
    }
}

/// The actions collected along one lexer ATN path, in execution order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct LexerActionExecutor {
    actions: Vec<LexerAction>,
}

impl LexerActionExecutor {
    pub fn new(actions: Vec<LexerAction>) -> Self {
        LexerActionExecutor { actions }
    }

    pub fn actions(&self) -> &[LexerAction] {
        &self.actions
    }

    /// A new executor running `executor`'s actions followed by `action`.
    pub fn append(executor: Option<&Arc<LexerActionExecutor>>, action: LexerAction) -> Arc<Self> {
        let mut actions = executor.map_or_else(Vec::new, |e| e.actions.clone());
        actions.push(action);
        Arc::new(LexerActionExecutor { actions })
    }

    /// Pins every position-dependent action that is not pinned yet to `offset`.
    ///
    /// Returns the same executor when nothing needed pinning, so DFA states keep sharing it.
    pub fn fix_offset_before_match(self: &Arc<Self>, offset: usize) -> Arc<Self> {
        if !self
            .actions
            .iter()
            .any(|a| a.is_position_dependent() && !matches!(a, LexerAction::Indexed { .. }))
        {
            return Arc::clone(self);
        }
        let actions = self
            .actions
            .iter()
            .map(|action| match action {
                LexerAction::Indexed { .. } => action.clone(),
                action if action.is_position_dependent() => LexerAction::Indexed {
                    offset,
                    action: Box::new(action.clone()),
                },
                action => action.clone(),
            })
            .collect();
        Arc::new(LexerActionExecutor { actions })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_keeps_order() {
        let first = LexerActionExecutor::append(None, LexerAction::Skip);
        let second = LexerActionExecutor::append(Some(&first), LexerAction::PopMode);
        assert_eq!(second.actions(), &[LexerAction::Skip, LexerAction::PopMode]);
        assert_eq!(first.actions().len(), 1);
    }

    #[test]
    fn test_fix_offset_wraps_custom_actions_once() {
        let custom = LexerAction::Custom {
            rule_index: 0,
            action_index: 1,
        };
        let executor = LexerActionExecutor::append(None, custom.clone());
        let executor = LexerActionExecutor::append(Some(&executor), LexerAction::Skip);
        let fixed = executor.fix_offset_before_match(2);
        assert_eq!(
            fixed.actions()[0],
            LexerAction::Indexed {
                offset: 2,
                action: Box::new(custom)
            }
        );
        let again = fixed.fix_offset_before_match(5);
        assert!(Arc::ptr_eq(&fixed, &again));
    }
}
