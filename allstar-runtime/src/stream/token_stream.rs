//! Buffered token stream
//!
//!     Pulls tokens from a [TokenSource] on demand and keeps every one of them, so any index
//!     can be revisited and `mark`/`release` are free. Lookahead only sees tokens on the
//!     stream's channel; tokens on other channels (whitespace, comments) stay in the buffer
//!     and can be retrieved by index or through the hidden-token queries.

use super::{IntStream, TokenSource, TokenStream};
use crate::token::{Token, DEFAULT_CHANNEL, EOF, INVALID_TYPE};
use std::ops::Range;

pub struct CommonTokenStream<S: TokenSource> {
    source: S,
    tokens: Vec<Token>,
    /// `None` until the first access.
    position: Option<usize>,
    fetched_eof: bool,
    channel: usize,
    /// Open marks. The buffer keeps everything, so marks only check their nesting.
    marks: usize,
}

impl<S: TokenSource> CommonTokenStream<S> {
    pub fn new(source: S) -> Self {
        Self::with_channel(source, DEFAULT_CHANNEL)
    }

    pub fn with_channel(source: S, channel: usize) -> Self {
        CommonTokenStream {
            source,
            tokens: Vec::new(),
            position: None,
            fetched_eof: false,
            channel,
            marks: 0,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    /// Pulls every remaining token from the source.
    pub fn fill(&mut self) {
        self.lazy_init();
        while !self.fetched_eof {
            self.fetch(1000);
        }
    }

    /// Tokens on `channel` (any non-default channel when `None`) directly after `index`.
    pub fn hidden_tokens_to_right(&mut self, index: usize, channel: Option<usize>) -> Vec<Token> {
        self.lazy_init();
        self.sync(index + 1);
        let mut hidden = Vec::new();
        let mut i = index + 1;
        while let Some(token) = self.tokens.get(i) {
            if token.channel == self.channel || token.token_type == EOF {
                break;
            }
            if channel.map_or(true, |c| token.channel == c) {
                hidden.push(token.clone());
            }
            i += 1;
            self.sync(i);
        }
        hidden
    }

    /// Tokens on `channel` (any non-default channel when `None`) directly before `index`.
    pub fn hidden_tokens_to_left(&mut self, index: usize, channel: Option<usize>) -> Vec<Token> {
        self.lazy_init();
        let mut hidden = Vec::new();
        let mut i = index;
        while i > 0 {
            i -= 1;
            let Some(token) = self.tokens.get(i) else {
                break;
            };
            if token.channel == self.channel {
                break;
            }
            if channel.map_or(true, |c| token.channel == c) {
                hidden.push(token.clone());
            }
        }
        hidden.reverse();
        hidden
    }

    /// Number of tokens on the stream's channel, EOF included.
    pub fn number_of_on_channel_tokens(&mut self) -> usize {
        self.fill();
        self.tokens
            .iter()
            .filter(|t| t.channel == self.channel || t.token_type == EOF)
            .count()
    }

    fn lazy_init(&mut self) {
        if self.position.is_none() {
            self.sync(0);
            self.position = Some(self.next_token_on_channel(0));
        }
    }

    /// Makes sure index `i` is buffered. Returns false when EOF came first.
    fn sync(&mut self, i: usize) -> bool {
        if i < self.tokens.len() {
            return true;
        }
        let needed = i - self.tokens.len() + 1;
        self.fetch(needed) >= needed
    }

    fn fetch(&mut self, n: usize) -> usize {
        if self.fetched_eof {
            return 0;
        }
        for i in 0..n {
            let mut token = self.source.next_token();
            token.token_index = Some(self.tokens.len());
            let is_eof = token.token_type == EOF;
            self.tokens.push(token);
            if is_eof {
                self.fetched_eof = true;
                return i + 1;
            }
        }
        n
    }

    fn next_token_on_channel(&mut self, mut i: usize) -> usize {
        self.sync(i);
        if i >= self.tokens.len() {
            return self.tokens.len().saturating_sub(1);
        }
        loop {
            let token = &self.tokens[i];
            if token.channel == self.channel || token.token_type == EOF {
                return i;
            }
            i += 1;
            if !self.sync(i) {
                return self.tokens.len() - 1;
            }
        }
    }

    fn previous_token_on_channel(&mut self, i: usize) -> Option<usize> {
        self.sync(i);
        let mut i = i.min(self.tokens.len().checked_sub(1)?);
        loop {
            let token = &self.tokens[i];
            if token.token_type == EOF || token.channel == self.channel {
                return Some(i);
            }
            i = i.checked_sub(1)?;
        }
    }

    fn lb(&mut self, k: usize) -> Option<&Token> {
        let position = self.position?;
        if k == 0 || position < k {
            return None;
        }
        let mut i = position;
        for _ in 0..k {
            if i == 0 {
                return None;
            }
            i = self.previous_token_on_channel(i - 1)?;
        }
        self.tokens.get(i)
    }
}

impl<S: TokenSource> IntStream for CommonTokenStream<S> {
    fn consume(&mut self) {
        self.lazy_init();
        let Some(position) = self.position else {
            return;
        };
        if self.la(1) == EOF {
            log::debug!("ignoring consume at EOF in {}", self.source.source_name());
            return;
        }
        if self.sync(position + 1) {
            self.position = Some(self.next_token_on_channel(position + 1));
        }
    }

    fn la(&mut self, i: isize) -> i32 {
        self.lt(i).map_or(INVALID_TYPE, |t| t.token_type)
    }

    fn mark(&mut self) -> isize {
        self.marks += 1;
        -(self.marks as isize)
    }

    fn release(&mut self, marker: isize) {
        debug_assert_eq!(marker, -(self.marks as isize), "marks must be released in reverse order");
        self.marks = self.marks.saturating_sub(1);
    }

    fn index(&self) -> usize {
        self.position.unwrap_or(0)
    }

    fn seek(&mut self, index: usize) {
        self.lazy_init();
        self.position = Some(self.next_token_on_channel(index));
    }

    fn size(&self) -> usize {
        self.tokens.len()
    }

    fn source_name(&self) -> String {
        self.source.source_name()
    }
}

impl<S: TokenSource> TokenStream for CommonTokenStream<S> {
    fn lt(&mut self, k: isize) -> Option<&Token> {
        self.lazy_init();
        if k == 0 {
            return None;
        }
        if k < 0 {
            return self.lb(k.unsigned_abs());
        }
        let mut i = self.position?;
        for _ in 1..k {
            if self.sync(i + 1) {
                i = self.next_token_on_channel(i + 1);
            }
        }
        self.tokens.get(i)
    }

    fn get(&self, index: usize) -> Option<&Token> {
        self.tokens.get(index)
    }

    fn token_source(&self) -> &dyn TokenSource {
        &self.source
    }

    fn text_range(&mut self, range: Range<usize>) -> String {
        self.lazy_init();
        if range.start >= range.end {
            return String::new();
        }
        self.sync(range.end - 1);
        let mut text = String::new();
        for token in self.tokens.iter().skip(range.start).take(range.end - range.start) {
            if token.token_type == EOF {
                break;
            }
            text.push_str(token.text());
        }
        text
    }

    fn text(&mut self) -> String {
        self.fill();
        let size = self.tokens.len();
        self.text_range(0..size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ListTokenSource;
    use crate::token::HIDDEN_CHANNEL;

    fn stream() -> CommonTokenStream<ListTokenSource> {
        let tokens = vec![
            Token::new(1, "a"),
            Token::new(9, " ").with_channel(HIDDEN_CHANNEL),
            Token::new(2, "b"),
            Token::new(9, " ").with_channel(HIDDEN_CHANNEL),
            Token::new(3, "c"),
        ];
        CommonTokenStream::new(ListTokenSource::new(tokens))
    }

    #[test]
    fn test_lookahead_skips_hidden_tokens() {
        let mut tokens = stream();
        assert_eq!(tokens.la(1), 1);
        assert_eq!(tokens.la(2), 2);
        assert_eq!(tokens.la(3), 3);
        assert_eq!(tokens.la(4), EOF);
        assert_eq!(tokens.la(9), EOF);
        tokens.consume();
        assert_eq!(tokens.index(), 2);
        assert_eq!(tokens.lt(-1).map(|t| t.text().to_string()), Some("a".to_string()));
    }

    #[test]
    fn test_consume_at_eof_stays_put() {
        let mut tokens = stream();
        for _ in 0..10 {
            tokens.consume();
        }
        assert_eq!(tokens.la(1), EOF);
        assert_eq!(tokens.index(), 5);
    }

    #[test]
    fn test_seek_and_text() {
        let mut tokens = stream();
        tokens.fill();
        assert_eq!(tokens.size(), 6);
        tokens.seek(1);
        assert_eq!(tokens.index(), 2);
        assert_eq!(tokens.text_range(0..3), "a b");
        assert_eq!(tokens.text(), "a b c");
    }

    #[test]
    fn test_hidden_token_queries() {
        let mut tokens = stream();
        tokens.fill();
        let right = tokens.hidden_tokens_to_right(0, None);
        assert_eq!(right.len(), 1);
        assert_eq!(right[0].token_index, Some(1));
        let left = tokens.hidden_tokens_to_left(4, Some(HIDDEN_CHANNEL));
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].token_index, Some(3));
        assert_eq!(tokens.number_of_on_channel_tokens(), 4);
    }
}
