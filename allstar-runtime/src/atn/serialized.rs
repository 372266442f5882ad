//! Grammar descriptions
//!
//!     The on-disk form of a grammar: names, vocabulary and the ATN, readable from JSON or
//!     YAML. Only the primary structure is stored; everything [Atn::from_parts] derives (rule
//!     return edges, back links, decision marks) is rebuilt on load, so a description is
//!     verified exactly like an ATN built in code.
//!
//!     A parser description may embed the description of its lexer under `lexer`, which is
//!     what the command-line test rig needs to go from text to tree.

use super::state::{AtnState, BlockKind, StateKind};
use super::{Atn, AtnParts, GrammarType, LexerAction, Transition};
use crate::error::DescriptionError;
use crate::recognizer::{Grammar, GrammarInfo};
use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrammarDescription {
    pub grammar_name: String,
    pub grammar_type: GrammarType,
    pub rule_names: Vec<String>,
    #[serde(default)]
    pub vocabulary: Vocabulary,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channel_names: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub mode_names: Vec<String>,
    pub atn: SerializedAtn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexer: Option<Box<GrammarDescription>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedAtn {
    pub max_token_type: i32,
    pub states: Vec<SerializedState>,
    /// Start state of each rule, with the token type for lexer rules.
    pub rules: Vec<SerializedRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub modes: Vec<usize>,
    #[serde(default)]
    pub decisions: Vec<usize>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lexer_actions: Vec<LexerAction>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedRule {
    pub start_state: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedState {
    pub rule_index: usize,
    pub kind: SerializedKind,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub non_greedy: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub transitions: Vec<Transition>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum SerializedKind {
    Basic,
    RuleStart {
        stop_state: usize,
        #[serde(default)]
        left_recursive: bool,
    },
    RuleStop,
    BlockStart {
        end_state: usize,
    },
    PlusBlockStart {
        end_state: usize,
    },
    StarBlockStart {
        end_state: usize,
    },
    BlockEnd,
    PlusLoopBack,
    StarLoopBack,
    StarLoopEntry,
    LoopEnd {
        loop_back: usize,
    },
    TokensStart,
}

impl SerializedKind {
    fn from_kind(kind: &StateKind) -> Self {
        match *kind {
            StateKind::Basic => SerializedKind::Basic,
            StateKind::RuleStart {
                stop_state,
                left_recursive,
            } => SerializedKind::RuleStart {
                stop_state,
                left_recursive,
            },
            StateKind::RuleStop => SerializedKind::RuleStop,
            StateKind::BlockStart { block, end_state, .. } => match block {
                BlockKind::Basic => SerializedKind::BlockStart { end_state },
                BlockKind::Plus => SerializedKind::PlusBlockStart { end_state },
                BlockKind::Star => SerializedKind::StarBlockStart { end_state },
            },
            StateKind::BlockEnd { .. } => SerializedKind::BlockEnd,
            StateKind::PlusLoopBack => SerializedKind::PlusLoopBack,
            StateKind::StarLoopBack => SerializedKind::StarLoopBack,
            StateKind::StarLoopEntry { .. } => SerializedKind::StarLoopEntry,
            StateKind::LoopEnd { loop_back } => SerializedKind::LoopEnd { loop_back },
            StateKind::TokensStart => SerializedKind::TokensStart,
        }
    }

    fn to_kind(&self) -> StateKind {
        let block = |block, end_state| StateKind::BlockStart {
            block,
            end_state,
            loop_back: None,
        };
        match *self {
            SerializedKind::Basic => StateKind::Basic,
            SerializedKind::RuleStart {
                stop_state,
                left_recursive,
            } => StateKind::RuleStart {
                stop_state,
                left_recursive,
            },
            SerializedKind::RuleStop => StateKind::RuleStop,
            SerializedKind::BlockStart { end_state } => block(BlockKind::Basic, end_state),
            SerializedKind::PlusBlockStart { end_state } => block(BlockKind::Plus, end_state),
            SerializedKind::StarBlockStart { end_state } => block(BlockKind::Star, end_state),
            SerializedKind::BlockEnd => StateKind::BlockEnd { start_state: None },
            SerializedKind::PlusLoopBack => StateKind::PlusLoopBack,
            SerializedKind::StarLoopBack => StateKind::StarLoopBack,
            SerializedKind::StarLoopEntry => StateKind::StarLoopEntry {
                loop_back: None,
                precedence_decision: false,
            },
            SerializedKind::LoopEnd { loop_back } => StateKind::LoopEnd { loop_back },
            SerializedKind::TokensStart => StateKind::TokensStart,
        }
    }
}

impl SerializedAtn {
    pub fn from_atn(atn: &Atn) -> Self {
        let states = atn
            .states()
            .iter()
            .map(|state| SerializedState {
                rule_index: state.rule_index,
                kind: SerializedKind::from_kind(&state.kind),
                non_greedy: state.non_greedy,
                // return edges are rebuilt on load
                transitions: if state.is_rule_stop() {
                    Vec::new()
                } else {
                    state.transitions().to_vec()
                },
            })
            .collect();
        let rules = atn
            .rule_to_start_state()
            .iter()
            .enumerate()
            .map(|(rule, &start_state)| SerializedRule {
                start_state,
                token_type: match atn.grammar_type {
                    GrammarType::Lexer => atn.rule_token_type(rule),
                    GrammarType::Parser => None,
                },
            })
            .collect();
        SerializedAtn {
            max_token_type: atn.max_token_type,
            states,
            rules,
            modes: atn.mode_to_start_state().to_vec(),
            decisions: atn.decision_to_state().to_vec(),
            lexer_actions: atn.lexer_actions().to_vec(),
        }
    }

    pub fn to_atn(&self, grammar_type: GrammarType) -> Result<Atn, DescriptionError> {
        let states = self
            .states
            .iter()
            .enumerate()
            .map(|(number, serialized)| {
                let mut state = AtnState::new(number, serialized.rule_index, serialized.kind.to_kind());
                state.non_greedy = serialized.non_greedy;
                for transition in &serialized.transitions {
                    state.add_transition(transition.clone());
                }
                state
            })
            .collect();
        let atn = Atn::from_parts(AtnParts {
            grammar_type,
            max_token_type: self.max_token_type,
            states,
            rule_to_start_state: self.rules.iter().map(|r| r.start_state).collect(),
            rule_to_token_type: match grammar_type {
                GrammarType::Lexer => self.rules.iter().map(|r| r.token_type.unwrap_or(0)).collect(),
                GrammarType::Parser => Vec::new(),
            },
            mode_to_start_state: self.modes.clone(),
            decision_to_state: self.decisions.clone(),
            lexer_actions: self.lexer_actions.clone(),
        })?;
        Ok(atn)
    }
}

impl GrammarDescription {
    /// Describes a built grammar.
    pub fn describe(grammar: &Grammar) -> Self {
        let info = grammar.info();
        GrammarDescription {
            grammar_name: info.grammar_name.clone(),
            grammar_type: grammar.atn().grammar_type,
            rule_names: info.rule_names.clone(),
            vocabulary: info.vocabulary.clone(),
            channel_names: info.channel_names.clone(),
            mode_names: info.mode_names.clone(),
            atn: SerializedAtn::from_atn(grammar.atn()),
            lexer: None,
        }
    }

    pub fn with_lexer(mut self, lexer: GrammarDescription) -> Self {
        self.lexer = Some(Box::new(lexer));
        self
    }

    pub fn from_json(text: &str) -> Result<Self, DescriptionError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_yaml(text: &str) -> Result<Self, DescriptionError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Loads a description, picking YAML for `.yaml`/`.yml` files and JSON otherwise.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, DescriptionError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml") | Some("yml") => Self::from_yaml(&text),
            _ => Self::from_json(&text),
        }
    }

    pub fn to_json(&self) -> Result<String, DescriptionError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn to_yaml(&self) -> Result<String, DescriptionError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Builds and verifies the grammar.
    pub fn build(&self) -> Result<Grammar, DescriptionError> {
        let atn = self.atn.to_atn(self.grammar_type)?;
        let info = GrammarInfo {
            grammar_name: self.grammar_name.clone(),
            rule_names: self.rule_names.clone(),
            vocabulary: self.vocabulary.clone(),
            channel_names: self.channel_names.clone(),
            mode_names: self.mode_names.clone(),
        };
        Ok(Grammar::new(atn, info))
    }

    /// Builds the embedded lexer grammar, if any.
    pub fn build_lexer(&self) -> Result<Option<Grammar>, DescriptionError> {
        match &self.lexer {
            Some(lexer) if lexer.grammar_type == GrammarType::Lexer => Ok(Some(lexer.build()?)),
            Some(lexer) => Err(DescriptionError::WrongGrammarType(format!(
                "embedded lexer '{}' is a {:?} grammar",
                lexer.grammar_name, lexer.grammar_type
            ))),
            None => Ok(None),
        }
    }

    pub fn rule_index(&self, name: &str) -> Result<usize, DescriptionError> {
        self.rule_names
            .iter()
            .position(|r| r == name)
            .ok_or_else(|| DescriptionError::UnknownRule(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AtnError;
    use crate::testing::grammars;

    #[test]
    fn test_description_survives_json() {
        let grammar = grammars::expression();
        let description = GrammarDescription::describe(&grammar);
        let json = description.to_json().unwrap();
        let back = GrammarDescription::from_json(&json).unwrap();
        assert_eq!(back, description);
        let rebuilt = back.build().unwrap();
        assert_eq!(rebuilt.atn().states().len(), grammar.atn().states().len());
        assert_eq!(rebuilt.atn().num_decisions(), grammar.atn().num_decisions());
        let precedence_decisions = rebuilt.atn().states().iter().filter(|s| s.is_precedence_decision()).count();
        assert_eq!(precedence_decisions, 1);
    }

    #[test]
    fn test_lexer_description_survives_yaml() {
        let lexer = grammars::expression_lexer();
        let description = GrammarDescription::describe(&lexer);
        let yaml = description.to_yaml().unwrap();
        let back = GrammarDescription::from_yaml(&yaml).unwrap();
        assert_eq!(back.atn.lexer_actions, description.atn.lexer_actions);
        let rebuilt = back.build().unwrap();
        assert_eq!(rebuilt.atn().rule_to_token_type(), lexer.atn().rule_to_token_type());
    }

    #[test]
    fn test_dangling_target_is_rejected() {
        let mut description = GrammarDescription::describe(&grammars::ac());
        description.atn.states[0].transitions.push(Transition::epsilon(999));
        match description.build() {
            Err(DescriptionError::Atn(AtnError::InvalidState(999))) => {}
            other => panic!("expected invalid state error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_unknown_rule_name() {
        let description = GrammarDescription::describe(&grammars::ac());
        assert_eq!(description.rule_index("s").unwrap(), 0);
        assert!(matches!(description.rule_index("nope"), Err(DescriptionError::UnknownRule(_))));
    }
}
