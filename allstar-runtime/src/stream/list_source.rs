//! Pre-lexed token sources
//!
//!     [ListTokenSource] replays a vector of tokens and synthesizes the EOF token when the
//!     list runs out. It is how hand-written token lists and external lexers feed the parser
//!     interpreter.
//!
//!     External lexers built with logos plug in through [TokenKind]: the logos token enum says
//!     which ATN token type (and channel) each variant maps to, and [ListTokenSource::from_logos]
//!     lexes the whole source eagerly, converting byte spans into the character spans and
//!     line/column positions the runtime works with. Logos errors become `INVALID_TYPE`
//!     tokens so the parser can report them like any other unexpected token.

use super::TokenSource;
use crate::token::{Token, DEFAULT_CHANNEL, EOF, INVALID_TYPE};
use logos::Logos;

/// Maps a logos token to a token type of the grammar being interpreted.
pub trait TokenKind {
    fn token_type(&self) -> i32;

    fn channel(&self) -> usize {
        DEFAULT_CHANNEL
    }
}

#[derive(Debug, Clone)]
pub struct ListTokenSource {
    tokens: Vec<Token>,
    next: usize,
    eof: Option<Token>,
    name: String,
}

impl ListTokenSource {
    pub fn new(tokens: Vec<Token>) -> Self {
        ListTokenSource {
            tokens,
            next: 0,
            eof: None,
            name: "<list>".to_string(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Lexes `source` with the logos token type `T`.
    pub fn from_logos<'s, T>(source: &'s str) -> Self
    where
        T: Logos<'s, Source = str> + TokenKind,
        T::Extras: Default,
    {
        Self::new(tokenize::<T>(source))
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    fn eof_token(&self) -> Token {
        let start = self.tokens.last().map_or(0, |t| t.span.end);
        Token::eof(None, start, self.line(), self.column())
    }
}

impl TokenSource for ListTokenSource {
    fn next_token(&mut self) -> Token {
        if self.next >= self.tokens.len() {
            if self.eof.is_none() {
                self.eof = Some(self.eof_token());
            }
            return self.eof.clone().unwrap_or_else(|| self.eof_token());
        }
        let token = self.tokens[self.next].clone();
        if token.token_type == EOF {
            self.eof = Some(token.clone());
        }
        self.next += 1;
        token
    }

    fn line(&self) -> usize {
        if let Some(token) = self.tokens.get(self.next) {
            return token.line;
        }
        match self.tokens.last() {
            Some(last) => last.line + last.text().matches('\n').count(),
            None => 1,
        }
    }

    fn column(&self) -> usize {
        if let Some(token) = self.tokens.get(self.next) {
            return token.column;
        }
        match self.tokens.last() {
            Some(last) => {
                let text = last.text();
                match text.rfind('\n') {
                    Some(newline) => text[newline + 1..].chars().count(),
                    None => last.column + text.chars().count(),
                }
            }
            None => 0,
        }
    }

    fn source_name(&self) -> String {
        self.name.clone()
    }
}

/// Runs a logos lexer over `source` and converts its output to runtime tokens.
pub fn tokenize<'s, T>(source: &'s str) -> Vec<Token>
where
    T: Logos<'s, Source = str> + TokenKind,
    T::Extras: Default,
{
    let mut lexer = T::lexer(source);
    let mut cursor = Cursor::new(source);
    let mut tokens = Vec::new();

    while let Some(result) = lexer.next() {
        let span = lexer.span();
        let (token_type, channel) = match &result {
            Ok(kind) => (kind.token_type(), kind.channel()),
            Err(_) => (INVALID_TYPE, DEFAULT_CHANNEL),
        };
        let start = cursor.advance_to(span.start);
        let end = cursor.advance_to(span.end);
        tokens.push(Token {
            token_type,
            channel,
            span: start.char_index..end.char_index,
            token_index: None,
            line: start.line,
            column: start.column,
            text: Some(lexer.slice().to_string()),
        });
    }

    tokens
}

#[derive(Debug, Clone, Copy)]
struct Position {
    char_index: usize,
    line: usize,
    column: usize,
}

/// Walks forward through the source converting byte offsets to character positions.
struct Cursor<'s> {
    source: &'s str,
    byte: usize,
    position: Position,
}

impl<'s> Cursor<'s> {
    fn new(source: &'s str) -> Self {
        Cursor {
            source,
            byte: 0,
            position: Position {
                char_index: 0,
                line: 1,
                column: 0,
            },
        }
    }

    fn advance_to(&mut self, byte: usize) -> Position {
        if byte > self.byte {
            for c in self.source[self.byte..byte].chars() {
                self.position.char_index += 1;
                if c == '\n' {
                    self.position.line += 1;
                    self.position.column = 0;
                } else {
                    self.position.column += 1;
                }
            }
            self.byte = byte;
        }
        self.position
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Logos, Debug, PartialEq, Clone)]
    enum Sample {
        #[regex(r"[a-zé]+")]
        Word,
        #[regex(r"[0-9]+")]
        Number,
        #[regex(r"[ \n]+")]
        Space,
    }

    impl TokenKind for Sample {
        fn token_type(&self) -> i32 {
            match self {
                Sample::Word => 1,
                Sample::Number => 2,
                Sample::Space => 3,
            }
        }

        fn channel(&self) -> usize {
            match self {
                Sample::Space => crate::token::HIDDEN_CHANNEL,
                _ => DEFAULT_CHANNEL,
            }
        }
    }

    #[test]
    fn test_logos_positions_are_char_based() {
        let tokens = tokenize::<Sample>("é1 ab\ncd");
        let summary: Vec<(i32, usize, usize, usize, usize)> = tokens
            .iter()
            .map(|t| (t.token_type, t.span.start, t.span.end, t.line, t.column))
            .collect();
        assert_eq!(
            summary,
            vec![
                (1, 0, 1, 1, 0),
                (2, 1, 2, 1, 1),
                (3, 2, 3, 1, 2),
                (1, 3, 5, 1, 3),
                (3, 5, 6, 1, 5),
                (1, 6, 8, 2, 0),
            ]
        );
    }

    #[test]
    fn test_unmatched_input_becomes_invalid_token() {
        let tokens = tokenize::<Sample>("a?");
        assert_eq!(tokens.len(), 2);
        assert_eq!(tokens[1].token_type, INVALID_TYPE);
        assert_eq!(tokens[1].text(), "?");
    }

    #[test]
    fn test_eof_is_synthesized_after_last_token() {
        let mut source = ListTokenSource::from_logos::<Sample>("ab\ncd");
        let mut types = Vec::new();
        loop {
            let token = source.next_token();
            types.push(token.token_type);
            if token.is_eof() {
                assert_eq!(token.span, 5..5);
                assert_eq!((token.line, token.column), (2, 2));
                break;
            }
        }
        assert_eq!(types, vec![1, 3, 1, EOF]);
        assert!(source.next_token().is_eof());
    }
}
