//! Errors
//!
//!     Three layers of failure:
//!
//!         - [RecognitionError]: the input does not match the grammar. These are reported
//!           to error listeners and recovered from; they only escape a parse when the bail
//!           strategy turns them into [ParseError::Cancelled].
//!         - [AtnError]: the ATN itself is malformed (bad description, broken invariant).
//!         - [ParseError]: what a parse call returns when it cannot produce a tree.
//!
//!     Inside the interpreter, [Failure] carries either of the first two upward so that a
//!     recognition error unwinds to the current rule while a fatal error ends the parse.

use crate::config_set::AtnConfigSet;
use crate::interval_set::IntervalSet;
use crate::token::Token;
use crate::tree::NodeId;
use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub enum RecognitionErrorKind {
    /// No alternative of a decision can match the remaining input.
    NoViableAlt {
        /// First token the decision looked at.
        start_token: Token,
        dead_end_configs: Option<Arc<AtnConfigSet>>,
    },
    /// The current token cannot be matched at this point and single-token repair failed.
    InputMismatch,
    /// A semantic or precedence predicate evaluated false while walking the ATN.
    FailedPredicate {
        rule_index: usize,
        predicate_index: Option<usize>,
        predicate: String,
    },
    /// The lexer found no token starting at `start_index`.
    LexerNoViableAlt {
        start_index: usize,
        dead_end_configs: Option<Arc<AtnConfigSet>>,
    },
}

#[derive(Debug, Clone)]
pub struct RecognitionError {
    pub kind: RecognitionErrorKind,
    pub offending_token: Option<Token>,
    /// ATN state the recognizer was in when the error was detected.
    pub offending_state: Option<usize>,
    /// Rule context in which the error was detected.
    pub ctx: Option<NodeId>,
    /// Tokens that would have been accepted at the offending state.
    pub expected_tokens: Option<IntervalSet>,
    pub message: Option<String>,
}

impl RecognitionError {
    pub fn new(kind: RecognitionErrorKind) -> Self {
        RecognitionError {
            kind,
            offending_token: None,
            offending_state: None,
            ctx: None,
            expected_tokens: None,
            message: None,
        }
    }

    pub fn with_token(mut self, token: Option<Token>) -> Self {
        self.offending_token = token;
        self
    }

    pub fn with_state(mut self, state: usize, ctx: Option<NodeId>) -> Self {
        self.offending_state = Some(state);
        self.ctx = ctx;
        self
    }

    pub fn with_expected(mut self, expected: IntervalSet) -> Self {
        self.expected_tokens = Some(expected);
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn kind_name(&self) -> &'static str {
        match self.kind {
            RecognitionErrorKind::NoViableAlt { .. } => "NoViableAlt",
            RecognitionErrorKind::InputMismatch => "InputMismatch",
            RecognitionErrorKind::FailedPredicate { .. } => "FailedPredicate",
            RecognitionErrorKind::LexerNoViableAlt { .. } => "LexerNoViableAlt",
        }
    }
}

impl fmt::Display for RecognitionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(message) = &self.message {
            return write!(f, "{}", message);
        }
        match &self.kind {
            RecognitionErrorKind::NoViableAlt { start_token, .. } => {
                write!(f, "no viable alternative starting at '{}'", start_token.text())
            }
            RecognitionErrorKind::InputMismatch => match &self.offending_token {
                Some(token) => write!(f, "mismatched input '{}'", token.text()),
                None => write!(f, "mismatched input"),
            },
            RecognitionErrorKind::FailedPredicate { predicate, .. } => {
                write!(f, "failed predicate: {{{}}}?", predicate)
            }
            RecognitionErrorKind::LexerNoViableAlt { start_index, .. } => {
                write!(f, "no viable token at character {}", start_index)
            }
        }
    }
}

impl std::error::Error for RecognitionError {}

/// A malformed ATN.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtnError {
    /// A structural invariant does not hold for `state`.
    Verification { state: usize, message: String },
    /// A transition or table entry points at a state that does not exist.
    InvalidState(usize),
    InvalidRule(usize),
    /// A start rule was requested by a name the grammar does not define.
    UnknownRuleName(String),
    InvalidDecision(usize),
    /// The interpreter met a transition it cannot follow from `state`.
    UnexpectedTransition { state: usize, found: &'static str },
    /// The parser left a rule with no enclosing recursion context to return to.
    ContextStackUnderflow { state: usize },
}

impl fmt::Display for AtnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AtnError::Verification { state, message } => {
                write!(f, "ATN verification failed at state {}: {}", state, message)
            }
            AtnError::InvalidState(state) => write!(f, "reference to unknown ATN state {}", state),
            AtnError::InvalidRule(rule) => write!(f, "reference to unknown rule {}", rule),
            AtnError::UnknownRuleName(name) => write!(f, "no rule named {:?}", name),
            AtnError::InvalidDecision(decision) => write!(f, "reference to unknown decision {}", decision),
            AtnError::UnexpectedTransition { state, found } => {
                write!(f, "unexpected {} transition at ATN state {}", found, state)
            }
            AtnError::ContextStackUnderflow { state } => {
                write!(f, "no recursion context to return to from ATN state {}", state)
            }
        }
    }
}

impl std::error::Error for AtnError {}

/// Why a parse produced no tree.
#[derive(Debug, Clone)]
pub enum ParseError {
    Atn(AtnError),
    /// The bail strategy stopped at the first syntax error.
    Cancelled(RecognitionError),
    /// Rule invocations nested deeper than the configured limit.
    DepthLimitExceeded { depth: usize, rule_index: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Atn(err) => write!(f, "ATN error: {}", err),
            ParseError::Cancelled(err) => write!(f, "parse cancelled: {}", err),
            ParseError::DepthLimitExceeded { depth, rule_index } => write!(
                f,
                "rule nesting depth {} exceeded the limit while entering rule {}",
                depth, rule_index
            ),
        }
    }
}

impl std::error::Error for ParseError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ParseError::Atn(err) => Some(err),
            ParseError::Cancelled(err) => Some(err),
            ParseError::DepthLimitExceeded { .. } => None,
        }
    }
}

impl From<AtnError> for ParseError {
    fn from(err: AtnError) -> Self {
        ParseError::Atn(err)
    }
}

/// How a step of the interpreter failed.
#[derive(Debug, Clone)]
pub enum Failure {
    /// Recoverable: unwinds to the current rule, which reports and recovers.
    Syntax(RecognitionError),
    /// Ends the parse.
    Fatal(ParseError),
}

impl From<RecognitionError> for Failure {
    fn from(err: RecognitionError) -> Self {
        Failure::Syntax(err)
    }
}

impl From<ParseError> for Failure {
    fn from(err: ParseError) -> Self {
        Failure::Fatal(err)
    }
}

impl From<AtnError> for Failure {
    fn from(err: AtnError) -> Self {
        Failure::Fatal(ParseError::Atn(err))
    }
}

/// Errors loading a serialized grammar description.
#[derive(Debug, Clone)]
pub enum DescriptionError {
    Io(String),
    Json(String),
    Yaml(String),
    Atn(AtnError),
    UnknownRule(String),
    /// The description does not carry the grammar kind the caller asked for.
    WrongGrammarType(String),
}

impl fmt::Display for DescriptionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DescriptionError::Io(msg) => write!(f, "IO error: {}", msg),
            DescriptionError::Json(msg) => write!(f, "JSON error: {}", msg),
            DescriptionError::Yaml(msg) => write!(f, "YAML error: {}", msg),
            DescriptionError::Atn(err) => write!(f, "invalid ATN: {}", err),
            DescriptionError::UnknownRule(name) => write!(f, "unknown rule '{}'", name),
            DescriptionError::WrongGrammarType(msg) => write!(f, "wrong grammar type: {}", msg),
        }
    }
}

impl std::error::Error for DescriptionError {}

impl From<std::io::Error> for DescriptionError {
    fn from(err: std::io::Error) -> Self {
        DescriptionError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DescriptionError {
    fn from(err: serde_json::Error) -> Self {
        DescriptionError::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for DescriptionError {
    fn from(err: serde_yaml::Error) -> Self {
        DescriptionError::Yaml(err.to_string())
    }
}

impl From<AtnError> for DescriptionError {
    fn from(err: AtnError) -> Self {
        DescriptionError::Atn(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_overrides_kind_description() {
        let err = RecognitionError::new(RecognitionErrorKind::InputMismatch)
            .with_token(Some(Token::new(3, "b")))
            .with_message("mismatched input 'b' expecting 'c'");
        assert_eq!(err.to_string(), "mismatched input 'b' expecting 'c'");
        assert_eq!(err.kind_name(), "InputMismatch");
    }

    #[test]
    fn test_parse_error_exposes_source() {
        use std::error::Error;
        let err = ParseError::from(AtnError::InvalidRule(7));
        assert_eq!(err.to_string(), "ATN error: reference to unknown rule 7");
        assert!(err.source().is_some());
    }
}
