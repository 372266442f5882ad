//! Tokens
//!
//!     A token is the unit the parser consumes: a type, a channel, the half-open character
//!     range it covers in the source, and its position in the token stream. Tokens created by
//!     error recovery ("conjured" tokens) never came from the stream, so their `token_index`
//!     is `None`.
//!
//!     Token types are plain `i32` values. The reserved values below mirror the ATN's
//!     conventions: `EOF` is the only negative type a stream ever yields, `EPSILON` only shows
//!     up inside lookahead sets, and user token types start at `MIN_USER_TOKEN_TYPE`.

use serde::Serialize;
use std::fmt;
use std::ops::Range;

/// End of input.
pub const EOF: i32 = -1;
/// Marks "can reach the end of the rule" inside lookahead sets.
pub const EPSILON: i32 = -2;
pub const INVALID_TYPE: i32 = 0;
pub const MIN_USER_TOKEN_TYPE: i32 = 1;

pub const DEFAULT_CHANNEL: usize = 0;
pub const HIDDEN_CHANNEL: usize = 1;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Token {
    pub token_type: i32,
    pub channel: usize,
    /// Half-open character range in the source. Empty for EOF and conjured tokens.
    pub span: Range<usize>,
    /// Position in the token stream, `None` for tokens conjured by error recovery.
    pub token_index: Option<usize>,
    /// 1-based.
    pub line: usize,
    /// 0-based, in characters.
    pub column: usize,
    pub text: Option<String>,
}

impl Token {
    pub fn new(token_type: i32, text: impl Into<String>) -> Self {
        Token {
            token_type,
            channel: DEFAULT_CHANNEL,
            span: 0..0,
            token_index: None,
            line: 1,
            column: 0,
            text: Some(text.into()),
        }
    }

    pub fn eof(index: Option<usize>, position: usize, line: usize, column: usize) -> Self {
        Token {
            token_type: EOF,
            channel: DEFAULT_CHANNEL,
            span: position..position,
            token_index: index,
            line,
            column,
            text: None,
        }
    }

    pub fn with_position(mut self, line: usize, column: usize) -> Self {
        self.line = line;
        self.column = column;
        self
    }

    pub fn with_span(mut self, span: Range<usize>) -> Self {
        self.span = span;
        self
    }

    pub fn with_channel(mut self, channel: usize) -> Self {
        self.channel = channel;
        self
    }

    pub fn is_eof(&self) -> bool {
        self.token_type == EOF
    }

    /// True for tokens that error recovery made up.
    pub fn is_conjured(&self) -> bool {
        self.token_index.is_none() && !self.is_eof()
    }

    /// The token text. EOF reads as `<EOF>`.
    pub fn text(&self) -> &str {
        match &self.text {
            Some(text) => text,
            None if self.is_eof() => "<EOF>",
            None => "",
        }
    }
}

/// `[@index,start:stop='text',<type>,line:column]`, with `stop` inclusive.
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let index = self
            .token_index
            .map(|i| i as i64)
            .unwrap_or(-1);
        let stop = self.span.end as i64 - 1;
        let channel = if self.channel == DEFAULT_CHANNEL {
            String::new()
        } else {
            format!(",channel={}", self.channel)
        };
        write!(
            f,
            "[@{},{}:{}='{}',<{}>{},{}:{}]",
            index,
            self.span.start,
            stop,
            escape_whitespace(self.text()),
            self.token_type,
            channel,
            self.line,
            self.column
        )
    }
}

/// Escapes newlines, carriage returns and tabs so token text stays on one line.
pub fn escape_whitespace(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eof_text() {
        let eof = Token::eof(Some(3), 7, 2, 4);
        assert_eq!(eof.text(), "<EOF>");
        assert!(eof.is_eof());
        assert!(!eof.is_conjured());
    }

    #[test]
    fn test_conjured_token() {
        let token = Token::new(4, "<missing 'c'>");
        assert!(token.is_conjured());
        assert_eq!(token.to_string(), "[@-1,0:-1='<missing 'c'>',<4>,1:0]");
    }

    #[test]
    fn test_display() {
        let mut token = Token::new(2, "ab\n")
            .with_span(3..6)
            .with_position(1, 3)
            .with_channel(HIDDEN_CHANNEL);
        token.token_index = Some(1);
        assert_eq!(token.to_string(), "[@1,3:5='ab\\n',<2>,channel=1,1:3]");
    }
}
