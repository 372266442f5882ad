//! The lexer interpreter
//!
//!     Turns characters into tokens by running the lexer ATN of a grammar through the
//!     [LexerAtnSimulator]: longest match wins, and among equally long matches the rule
//!     listed first. After each match the rule's lexer actions run against the interpreter,
//!     which is how a rule ends up skipped, retyped, moved to another channel or switching
//!     modes.
//!
//!     A match can produce a token, be skipped (`-> skip`), or be extended by the next match
//!     (`-> more`). At the end of input the interpreter emits EOF, then keeps emitting it.
//!
//!     Characters that start no token are reported to the error listeners as
//!     `token recognition error at: '...'`, dropped one at a time, and lexing continues.

use crate::atn::{LexerAction, LexerActionExecutor};
use crate::error::RecognitionError;
use crate::error_listener::{ErrorListener, ErrorListeners, SyntaxError};
use crate::recognizer::{AcceptAll, Grammar, LexerHooks};
use crate::simulator::LexerAtnSimulator;
use crate::stream::{CharStream, InputStream, IntStream, TokenSource};
use crate::token::{escape_whitespace, Token, DEFAULT_CHANNEL, EOF, INVALID_TYPE};

/// Token type of a match that produces no token.
pub const SKIP: i32 = -3;
/// Token type of a match that continues into the next one.
pub const MORE: i32 = -2;
pub const DEFAULT_MODE: usize = 0;

pub struct LexerInterpreter {
    grammar: Grammar,
    input: InputStream,
    simulator: LexerAtnSimulator,
    hooks: Box<dyn LexerHooks>,
    listeners: ErrorListeners,
    mode: usize,
    mode_stack: Vec<usize>,
    /// Type of the token being built; actions may change it.
    token_type: i32,
    channel: usize,
    /// Replaces the matched text in the emitted token when set.
    text: Option<String>,
    hit_eof: bool,
    token_start: usize,
    token_start_line: usize,
    token_start_column: usize,
    errors: usize,
}

impl LexerInterpreter {
    pub fn new(grammar: Grammar, input: InputStream) -> Self {
        let simulator = LexerAtnSimulator::new(grammar.shared_atn(), std::sync::Arc::clone(grammar.dfa_cache()));
        LexerInterpreter {
            grammar,
            input,
            simulator,
            hooks: Box::new(AcceptAll),
            listeners: ErrorListeners::default(),
            mode: DEFAULT_MODE,
            mode_stack: Vec::new(),
            token_type: INVALID_TYPE,
            channel: DEFAULT_CHANNEL,
            text: None,
            hit_eof: false,
            token_start: 0,
            token_start_line: 1,
            token_start_column: 0,
            errors: 0,
        }
    }

    pub fn grammar(&self) -> &Grammar {
        &self.grammar
    }

    pub fn set_hooks(&mut self, hooks: Box<dyn LexerHooks>) {
        self.hooks = hooks;
    }

    pub fn add_error_listener(&mut self, listener: Box<dyn ErrorListener>) {
        self.listeners.add(listener);
    }

    pub fn remove_error_listeners(&mut self) {
        self.listeners.remove_all();
    }

    /// Rewinds to the start of the input in the default mode.
    pub fn reset(&mut self) {
        self.input.seek(0);
        self.simulator.reset();
        self.mode = DEFAULT_MODE;
        self.mode_stack.clear();
        self.token_type = INVALID_TYPE;
        self.channel = DEFAULT_CHANNEL;
        self.text = None;
        self.hit_eof = false;
        self.errors = 0;
    }

    pub fn mode(&self) -> usize {
        self.mode
    }

    pub fn set_mode(&mut self, mode: usize) {
        self.mode = mode;
    }

    pub fn push_mode(&mut self, mode: usize) {
        self.mode_stack.push(self.mode);
        self.mode = mode;
    }

    /// Returns to the mode that was current before the last push. Popping an empty stack
    /// leaves the mode unchanged.
    pub fn pop_mode(&mut self) -> usize {
        match self.mode_stack.pop() {
            Some(mode) => self.mode = mode,
            None => log::warn!("pop_mode with an empty mode stack in mode {}", self.mode),
        }
        self.mode
    }

    pub fn skip(&mut self) {
        self.token_type = SKIP;
    }

    pub fn more(&mut self) {
        self.token_type = MORE;
    }

    pub fn set_type(&mut self, token_type: i32) {
        self.token_type = token_type;
    }

    pub fn set_channel(&mut self, channel: usize) {
        self.channel = channel;
    }

    pub fn set_text(&mut self, text: impl Into<String>) {
        self.text = Some(text.into());
    }

    /// Text matched for the current token so far.
    pub fn text(&self) -> String {
        match &self.text {
            Some(text) => text.clone(),
            None => self.input.text(self.token_start..self.input.index()),
        }
    }

    /// Lexes the rest of the input. The last token is EOF.
    pub fn all_tokens(&mut self) -> Vec<Token> {
        let mut tokens = Vec::new();
        loop {
            let token = self.next_token();
            let done = token.token_type == EOF;
            tokens.push(token);
            if done {
                return tokens;
            }
        }
    }

    /// Renders the DFA built so far for `mode`.
    pub fn dfa_string(&self, mode: usize) -> Option<String> {
        self.simulator.dfa(mode).map(|dfa| dfa.to_lexer_string())
    }

    fn emit(&mut self) -> Token {
        let text = self.text();
        Token {
            token_type: self.token_type,
            channel: self.channel,
            span: self.token_start..self.input.index(),
            token_index: None,
            line: self.token_start_line,
            column: self.token_start_column,
            text: Some(text),
        }
    }

    fn emit_eof(&mut self) -> Token {
        let index = self.input.index();
        Token::eof(None, index, self.simulator.line, self.simulator.column)
    }

    /// Runs the actions of a match. Actions that depend on the input position see the
    /// input as it was where they appear in the rule.
    fn execute(&mut self, executor: &LexerActionExecutor) {
        let stop = self.input.index();
        let mut requires_seek = false;
        for action in executor.actions() {
            let action = match action {
                LexerAction::Indexed { offset, action } => {
                    let position = self.token_start + offset;
                    self.input.seek(position);
                    requires_seek = position != stop;
                    action.as_ref()
                }
                LexerAction::Custom { .. } => {
                    self.input.seek(stop);
                    requires_seek = false;
                    action
                }
                other => other,
            };
            self.apply(action);
        }
        if requires_seek {
            self.input.seek(stop);
        }
    }

    fn apply(&mut self, action: &LexerAction) {
        match action {
            LexerAction::Channel { channel } => self.set_channel(*channel),
            LexerAction::Custom { rule_index, action_index } => {
                let text = self.text();
                self.hooks.action(&text, *rule_index, *action_index);
            }
            LexerAction::Mode { mode } => self.set_mode(*mode),
            LexerAction::More => self.more(),
            LexerAction::PopMode => {
                self.pop_mode();
            }
            LexerAction::PushMode { mode } => self.push_mode(*mode),
            LexerAction::Skip => self.skip(),
            LexerAction::Type { token_type } => self.set_type(*token_type),
            LexerAction::Indexed { action, .. } => self.apply(action),
        }
    }

    fn notify_listeners(&mut self, error: RecognitionError) {
        self.errors += 1;
        let end = (self.input.index() + 1).min(self.input.size());
        let text = self.input.text(self.token_start..end);
        let display = if text.is_empty() && self.input.la(1) == EOF {
            "<EOF>".to_string()
        } else {
            escape_whitespace(&text)
        };
        let message = format!("token recognition error at: '{}'", display);
        log::debug!("{} (line {}:{})", message, self.token_start_line, self.token_start_column);
        let report = SyntaxError {
            source_name: self.input.source_name(),
            offending_token: None,
            line: self.token_start_line,
            column: self.token_start_column,
            message,
            error: Some(error),
        };
        self.listeners.syntax_error(&report);
    }

    /// Drops the offending character.
    fn recover(&mut self) {
        if self.input.la(1) != EOF {
            self.simulator.consume(&mut self.input);
        }
    }
}

impl TokenSource for LexerInterpreter {
    fn next_token(&mut self) -> Token {
        let marker = self.input.mark();
        let token = 'outer: loop {
            if self.hit_eof {
                break self.emit_eof();
            }
            self.channel = DEFAULT_CHANNEL;
            self.text = None;
            self.token_start = self.input.index();
            self.token_start_line = self.simulator.line;
            self.token_start_column = self.simulator.column;
            loop {
                self.token_type = INVALID_TYPE;
                let matched = self.simulator.match_token(&mut self.input, self.mode, self.hooks.as_mut());
                let token_type = match matched {
                    Ok((token_type, executor)) => {
                        if let Some(executor) = executor {
                            self.execute(&executor);
                        }
                        token_type
                    }
                    Err(error) => {
                        self.notify_listeners(error);
                        self.recover();
                        SKIP
                    }
                };
                if self.input.la(1) == EOF {
                    self.hit_eof = true;
                }
                if self.token_type == INVALID_TYPE {
                    self.token_type = token_type;
                }
                if self.token_type == SKIP {
                    continue 'outer;
                }
                if self.token_type != MORE {
                    break;
                }
            }
            if self.token_type == EOF {
                break self.emit_eof();
            }
            break self.emit();
        };
        self.input.release(marker);
        token
    }

    fn line(&self) -> usize {
        self.simulator.line
    }

    fn column(&self) -> usize {
        self.simulator.column
    }

    fn source_name(&self) -> String {
        self.input.source_name()
    }

    fn syntax_error_count(&self) -> usize {
        self.errors
    }
}

impl std::fmt::Debug for LexerInterpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LexerInterpreter")
            .field("mode", &self.mode)
            .field("mode_stack", &self.mode_stack)
            .field("position", &self.input.index())
            .field("errors", &self.errors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_listener::CollectingErrorListener;
    use crate::testing::grammars::{self, expr};
    use rstest::rstest;

    fn lexer(source: &str) -> (LexerInterpreter, CollectingErrorListener) {
        let mut lexer = grammars::expression_lexer().lexer(InputStream::new(source));
        let collector = CollectingErrorListener::new();
        lexer.remove_error_listeners();
        lexer.add_error_listener(Box::new(collector.clone()));
        (lexer, collector)
    }

    fn types(tokens: &[Token]) -> Vec<i32> {
        tokens.iter().map(|t| t.token_type).collect()
    }

    #[rstest]
    #[case("1+2", vec![expr::INT, expr::PLUS, expr::INT, EOF])]
    #[case("(a * 10)", vec![expr::LPAREN, expr::ID, expr::STAR, expr::INT, expr::RPAREN, EOF])]
    #[case("   ", vec![EOF])]
    #[case("", vec![EOF])]
    fn test_token_types(#[case] source: &str, #[case] expected: Vec<i32>) {
        let (mut lexer, collector) = lexer(source);
        assert_eq!(types(&lexer.all_tokens()), expected);
        assert!(collector.messages().is_empty());
    }

    #[test]
    fn test_positions_and_text() {
        let (mut lexer, _) = lexer("ab\n 12");
        let tokens = lexer.all_tokens();
        assert_eq!(tokens[0].text(), "ab");
        assert_eq!((tokens[0].line, tokens[0].column), (1, 0));
        assert_eq!(tokens[1].text(), "12");
        assert_eq!((tokens[1].line, tokens[1].column), (2, 1));
        assert_eq!(tokens[1].span, 4..6);
        assert_eq!((tokens[2].line, tokens[2].column), (2, 3));
    }

    #[test]
    fn test_recognition_error_drops_one_char() {
        let (mut lexer, collector) = lexer("1?2");
        let tokens = lexer.all_tokens();
        assert_eq!(types(&tokens), vec![expr::INT, expr::INT, EOF]);
        assert_eq!(collector.messages(), vec!["line 1:1 token recognition error at: '?'"]);
        assert_eq!(lexer.syntax_error_count(), 1);
    }

    #[test]
    fn test_eof_repeats() {
        let (mut lexer, _) = lexer("7");
        lexer.all_tokens();
        assert_eq!(lexer.next_token().token_type, EOF);
        assert_eq!(lexer.next_token().token_type, EOF);
    }

    #[test]
    fn test_modes() {
        let mut lexer = grammars::mode_lexer().lexer(InputStream::new("a\"b c\"a"));
        let tokens = lexer.all_tokens();
        let texts: Vec<&str> = tokens.iter().map(|t| t.text()).collect();
        assert_eq!(texts, vec!["a", "\"b c\"", "a", "<EOF>"]);
        assert_eq!(
            types(&tokens),
            vec![grammars::modes::WORD, grammars::modes::STRING, grammars::modes::WORD, EOF]
        );
        assert_eq!(lexer.mode(), DEFAULT_MODE);
    }
}
