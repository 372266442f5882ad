//! Error strategies
//!
//!     An error strategy decides what the parser does when the input stops matching:
//!
//!         - [DefaultErrorStrategy] reports the error and repairs the input. At a token match
//!           it tries deleting one extraneous token, then conjuring one missing token; at a
//!           decision it resynchronizes by consuming tokens until one can follow some rule
//!           on the call stack. Until the next successful match, further errors are not
//!           reported, so one mistake produces one message.
//!         - [BailErrorStrategy] ends the parse with [ParseError::Cancelled] at the first
//!           error, for callers that only want to know whether the input is valid (or that
//!           retry a failed SLL parse in LL mode).
//!
//!     Strategies hold no state. What the default strategy remembers between errors lives in
//!     the parser's [RecoveryState](crate::parser::RecoveryState), so one strategy value can be
//!     shared by many parsers.

use crate::atn::StateKind;
use crate::error::{Failure, ParseError, RecognitionError, RecognitionErrorKind};
use crate::interval_set::IntervalSet;
use crate::options::ErrorStrategyKind;
use crate::parser::Parser;
use crate::token::{escape_whitespace, Token, EOF, EPSILON, INVALID_TYPE};
use crate::tree::NodeId;
use once_cell::sync::Lazy;
use std::sync::Arc;

static DEFAULT: Lazy<Arc<dyn ErrorStrategy + Send + Sync>> = Lazy::new(|| Arc::new(DefaultErrorStrategy));
static BAIL: Lazy<Arc<dyn ErrorStrategy + Send + Sync>> = Lazy::new(|| Arc::new(BailErrorStrategy));

/// The shared strategy value for `kind`.
pub fn strategy_for(kind: ErrorStrategyKind) -> Arc<dyn ErrorStrategy> {
    match kind {
        ErrorStrategyKind::Default => DEFAULT.clone(),
        ErrorStrategyKind::Bail => BAIL.clone(),
    }
}

pub trait ErrorStrategy {
    /// Forgets any recovery in progress.
    fn reset(&self, parser: &mut Parser);

    /// Repairs a failed token match in place. Returns the token that stands for the
    /// expected one: the next real token after a deletion, or a conjured token.
    fn recover_inline(&self, parser: &mut Parser) -> Result<Token, Failure>;

    /// Resynchronizes after `error` has been reported.
    fn recover(&self, parser: &mut Parser, error: &RecognitionError) -> Result<(), ParseError>;

    /// Called before each decision so errors are caught where the input goes wrong rather
    /// than inside a later rule.
    fn sync(&self, parser: &mut Parser) -> Result<(), Failure>;

    fn in_error_recovery_mode(&self, parser: &Parser) -> bool;

    /// A token matched; ends the recovery in progress.
    fn report_match(&self, parser: &mut Parser);

    fn report_error(&self, parser: &mut Parser, error: &RecognitionError);
}

/// An input mismatch at `state` in `ctx`, with the tokens that would have fit.
pub fn input_mismatch(parser: &mut Parser, state: usize, ctx: Option<NodeId>) -> RecognitionError {
    let expected = parser
        .grammar()
        .atn()
        .expected_tokens(state, parser.tree().invoking_states(ctx));
    RecognitionError::new(RecognitionErrorKind::InputMismatch)
        .with_token(Some(parser.current_token()))
        .with_state(state, ctx)
        .with_expected(expected)
}

/// `'text'` with whitespace escaped; tokens without text show as `<type>`.
pub fn token_error_display(token: Option<&Token>) -> String {
    let Some(token) = token else {
        return "<no token>".to_string();
    };
    let text = match &token.text {
        Some(text) => text.clone(),
        None if token.token_type == EOF => "<EOF>".to_string(),
        None => format!("<{}>", token.token_type),
    };
    quote(&text)
}

fn quote(text: &str) -> String {
    format!("'{}'", escape_whitespace(text))
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultErrorStrategy;

impl DefaultErrorStrategy {
    fn begin_error_condition(&self, parser: &mut Parser) {
        parser.recovery_mut().error_recovery_mode = true;
    }

    fn end_error_condition(&self, parser: &mut Parser) {
        let recovery = parser.recovery_mut();
        recovery.error_recovery_mode = false;
        recovery.last_error_states.clear();
        recovery.last_error_index = None;
    }

    fn report_no_viable_alternative(&self, parser: &mut Parser, error: &RecognitionError, start_token: &Token) -> String {
        let input = if start_token.token_type == EOF {
            "<EOF>".to_string()
        } else {
            let start = start_token.token_index.unwrap_or(0);
            let stop = error
                .offending_token
                .as_ref()
                .and_then(|t| t.token_index)
                .unwrap_or(start);
            parser.input_mut().text_range(start..stop + 1)
        };
        format!("no viable alternative at input {}", quote(&input))
    }

    fn report_input_mismatch(&self, parser: &mut Parser, error: &RecognitionError) -> String {
        let expected = match &error.expected_tokens {
            Some(expected) => expected.clone(),
            None => parser.expected_tokens(),
        };
        format!(
            "mismatched input {} expecting {}",
            token_error_display(error.offending_token.as_ref()),
            expected.to_string_with(parser.grammar().vocabulary())
        )
    }

    fn report_failed_predicate(&self, parser: &mut Parser, error: &RecognitionError, rule_index: usize) -> String {
        format!("rule {} {}", parser.grammar().info().rule_name(rule_index), error)
    }

    fn report_unwanted_token(&self, parser: &mut Parser) {
        if self.in_error_recovery_mode(parser) {
            return;
        }
        self.begin_error_condition(parser);
        let token = parser.current_token();
        let expecting = parser.expected_tokens();
        let message = format!(
            "extraneous input {} expecting {}",
            token_error_display(Some(&token)),
            expecting.to_string_with(parser.grammar().vocabulary())
        );
        parser.notify_error_listeners(Some(token), message, None);
    }

    fn report_missing_token(&self, parser: &mut Parser) {
        if self.in_error_recovery_mode(parser) {
            return;
        }
        self.begin_error_condition(parser);
        let token = parser.current_token();
        let expecting = parser.expected_tokens();
        let message = format!(
            "missing {} at {}",
            expecting.to_string_with(parser.grammar().vocabulary()),
            token_error_display(Some(&token))
        );
        parser.notify_error_listeners(Some(token), message, None);
    }

    /// Deletes the current token if the one after it is what the parser expects.
    fn single_token_deletion(&self, parser: &mut Parser) -> Option<Token> {
        let next = parser.la(2);
        if !parser.expected_tokens().contains(next) {
            return None;
        }
        self.report_unwanted_token(parser);
        parser.consume();
        let matched = parser.current_token();
        self.report_match(parser);
        Some(matched)
    }

    /// True if the current token could follow the expected one, so conjuring the expected
    /// token repairs the input.
    fn single_token_insertion(&self, parser: &mut Parser) -> bool {
        let current = parser.la(1);
        let atn = parser.grammar().shared_atn();
        let Some(next) = atn.state(parser.state()).transition(0).map(|t| t.target()) else {
            return false;
        };
        let invoking = parser.tree().invoking_states(parser.context());
        if atn.next_tokens_in_context(next, invoking).contains(current) {
            self.report_missing_token(parser);
            return true;
        }
        false
    }

    fn missing_symbol(&self, parser: &mut Parser) -> Token {
        let expected = parser.expected_tokens();
        let expected_type = expected.min_element().unwrap_or(INVALID_TYPE);
        let text = if expected_type == EOF {
            "<missing EOF>".to_string()
        } else {
            format!("<missing {}>", parser.grammar().vocabulary().display_name(expected_type))
        };
        let mut anchor = parser.current_token();
        if anchor.token_type == EOF {
            if let Some(previous) = parser.previous_token() {
                anchor = previous;
            }
        }
        Token::new(expected_type, text).with_position(anchor.line, anchor.column)
    }

    /// Union of the follow sets of every rule invocation on the call stack.
    fn error_recovery_set(&self, parser: &Parser) -> IntervalSet {
        let atn = parser.grammar().atn();
        let mut recover = IntervalSet::new();
        for invoking in parser.tree().invoking_states(parser.context()) {
            if let Some(follow) = atn.rule_follow_state(invoking) {
                recover.add_set(atn.next_tokens(follow));
            }
        }
        recover.remove(EPSILON);
        recover
    }

    fn consume_until(&self, parser: &mut Parser, set: &IntervalSet) {
        let mut token_type = parser.la(1);
        while token_type != EOF && !set.contains(token_type) {
            parser.consume();
            token_type = parser.la(1);
        }
    }
}

impl ErrorStrategy for DefaultErrorStrategy {
    fn reset(&self, parser: &mut Parser) {
        self.end_error_condition(parser);
    }

    fn recover_inline(&self, parser: &mut Parser) -> Result<Token, Failure> {
        if let Some(matched) = self.single_token_deletion(parser) {
            parser.consume();
            return Ok(matched);
        }
        if self.single_token_insertion(parser) {
            return Ok(self.missing_symbol(parser));
        }
        let (state, ctx) = match parser.recovery().next_tokens_state {
            Some(state) => (state, parser.recovery().next_tokens_ctx),
            None => (parser.state(), parser.context()),
        };
        Err(input_mismatch(parser, state, ctx).into())
    }

    fn recover(&self, parser: &mut Parser, _error: &RecognitionError) -> Result<(), ParseError> {
        let index = parser.input_mut().index();
        let state = parser.state();
        let recovery = parser.recovery();
        if recovery.last_error_index == Some(index) && recovery.last_error_states.contains(&state) {
            // Same token, same state: the token is in the recovery set, so nothing would be
            // consumed and the parser would loop. Skip it.
            log::debug!("consuming {} to break an error recovery loop", index);
            parser.consume();
        }
        let index = parser.input_mut().index();
        let recovery = parser.recovery_mut();
        recovery.last_error_index = Some(index);
        recovery.last_error_states.insert(state);
        let follow = self.error_recovery_set(parser);
        self.consume_until(parser, &follow);
        Ok(())
    }

    fn sync(&self, parser: &mut Parser) -> Result<(), Failure> {
        if self.in_error_recovery_mode(parser) {
            return Ok(());
        }
        let atn = parser.grammar().shared_atn();
        let state = parser.state();
        let la = parser.la(1);
        let next = atn.next_tokens(state);
        if next.contains(la) {
            let recovery = parser.recovery_mut();
            recovery.next_tokens_ctx = None;
            recovery.next_tokens_state = None;
            return Ok(());
        }
        if next.contains(EPSILON) {
            if parser.recovery().next_tokens_state.is_none() {
                let ctx = parser.context();
                let recovery = parser.recovery_mut();
                recovery.next_tokens_ctx = ctx;
                recovery.next_tokens_state = Some(state);
            }
            return Ok(());
        }
        match atn.state(state).kind {
            StateKind::BlockStart { .. } | StateKind::StarLoopEntry { .. } => {
                if self.single_token_deletion(parser).is_some() {
                    return Ok(());
                }
                let ctx = parser.context();
                Err(input_mismatch(parser, state, ctx).into())
            }
            StateKind::PlusLoopBack | StateKind::StarLoopBack => {
                self.report_unwanted_token(parser);
                let follow = parser.expected_tokens().or(&self.error_recovery_set(parser));
                self.consume_until(parser, &follow);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn in_error_recovery_mode(&self, parser: &Parser) -> bool {
        parser.recovery().error_recovery_mode
    }

    fn report_match(&self, parser: &mut Parser) {
        self.end_error_condition(parser);
    }

    fn report_error(&self, parser: &mut Parser, error: &RecognitionError) {
        if self.in_error_recovery_mode(parser) {
            return;
        }
        self.begin_error_condition(parser);
        let message = match &error.kind {
            RecognitionErrorKind::NoViableAlt { start_token, .. } => {
                self.report_no_viable_alternative(parser, error, start_token)
            }
            RecognitionErrorKind::InputMismatch => self.report_input_mismatch(parser, error),
            RecognitionErrorKind::FailedPredicate { rule_index, .. } => {
                self.report_failed_predicate(parser, error, *rule_index)
            }
            RecognitionErrorKind::LexerNoViableAlt { .. } => error.to_string(),
        };
        parser.notify_error_listeners(error.offending_token.clone(), message, Some(error.clone()));
    }
}

/// Cancels the parse at the first error. Every context on the stack records the error.
#[derive(Debug, Clone, Copy, Default)]
pub struct BailErrorStrategy;

impl BailErrorStrategy {
    fn mark_contexts(&self, parser: &mut Parser, error: &RecognitionError) {
        let mut current = parser.context();
        while let Some(ctx) = current {
            let tree = parser.tree_mut();
            current = tree.parent(ctx);
            if let Some(rule) = tree.rule_mut(ctx) {
                rule.exception = Some(error.clone());
            }
        }
    }
}

impl ErrorStrategy for BailErrorStrategy {
    fn reset(&self, parser: &mut Parser) {
        DefaultErrorStrategy.reset(parser);
    }

    fn recover_inline(&self, parser: &mut Parser) -> Result<Token, Failure> {
        let (state, ctx) = (parser.state(), parser.context());
        let error = input_mismatch(parser, state, ctx);
        self.mark_contexts(parser, &error);
        Err(Failure::Fatal(ParseError::Cancelled(error)))
    }

    fn recover(&self, parser: &mut Parser, error: &RecognitionError) -> Result<(), ParseError> {
        self.mark_contexts(parser, error);
        Err(ParseError::Cancelled(error.clone()))
    }

    /// No resynchronization; errors surface where they happen.
    fn sync(&self, _parser: &mut Parser) -> Result<(), Failure> {
        Ok(())
    }

    fn in_error_recovery_mode(&self, parser: &Parser) -> bool {
        DefaultErrorStrategy.in_error_recovery_mode(parser)
    }

    fn report_match(&self, parser: &mut Parser) {
        DefaultErrorStrategy.report_match(parser);
    }

    fn report_error(&self, parser: &mut Parser, error: &RecognitionError) {
        DefaultErrorStrategy.report_error(parser, error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_error_display() {
        assert_eq!(token_error_display(None), "<no token>");
        assert_eq!(token_error_display(Some(&Token::new(3, "a\nb"))), "'a\\nb'");
        assert_eq!(token_error_display(Some(&Token::eof(Some(0), 0, 1, 0))), "'<EOF>'");
        let mut untexted = Token::new(7, "");
        untexted.text = None;
        assert_eq!(token_error_display(Some(&untexted)), "'<7>'");
    }

    #[test]
    fn test_strategy_kinds_share_values() {
        let a = strategy_for(ErrorStrategyKind::Bail);
        let b = strategy_for(ErrorStrategyKind::Bail);
        assert!(Arc::ptr_eq(&a, &b));
    }
}
