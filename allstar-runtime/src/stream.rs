//! Streams
//!
//!     The interpreters read symbols through a small family of traits. [IntStream] is the
//!     cursor every stream shares: lookahead, consume, and mark/seek so that prediction can
//!     look arbitrarily far ahead and then rewind. [CharStream] adds text extraction for the
//!     lexer, [TokenStream] adds token access for the parser, and [TokenSource] is whatever
//!     produces tokens on demand (a lexer interpreter, a pre-lexed list, a logos lexer).
//!
//!     Lookahead is 1-based: `la(1)` is the current symbol, `la(-1)` the previous one. Reading
//!     past the end yields `EOF` forever.

use crate::token::Token;
use std::ops::Range;

pub mod input_stream;
pub mod list_source;
pub mod token_stream;

pub use input_stream::InputStream;
pub use list_source::{ListTokenSource, TokenKind};
pub use token_stream::CommonTokenStream;

pub trait IntStream {
    fn consume(&mut self);

    /// Symbol at offset `i` from the current position. `la(0)` is undefined and returns 0.
    fn la(&mut self, i: isize) -> i32;

    /// Pins the buffer so that `seek` can return to any index after this point.
    fn mark(&mut self) -> isize;

    fn release(&mut self, marker: isize);

    fn index(&self) -> usize;

    fn seek(&mut self, index: usize);

    fn size(&self) -> usize;

    fn source_name(&self) -> String;
}

pub trait CharStream: IntStream {
    /// Text of the half-open character range, clamped to the stream.
    fn text(&self, range: Range<usize>) -> String;
}

pub trait TokenStream: IntStream {
    /// Token at offset `k` from the current position, skipping off-channel tokens.
    fn lt(&mut self, k: isize) -> Option<&Token>;

    /// Token by absolute index, on any channel.
    fn get(&self, index: usize) -> Option<&Token>;

    fn token_source(&self) -> &dyn TokenSource;

    /// Concatenated text of the tokens in the half-open index range, stopping at EOF.
    fn text_range(&mut self, range: Range<usize>) -> String;

    fn text(&mut self) -> String {
        let size = self.size();
        self.text_range(0..size)
    }
}

pub trait TokenSource {
    fn next_token(&mut self) -> Token;

    fn line(&self) -> usize;

    fn column(&self) -> usize;

    fn source_name(&self) -> String;

    /// Errors reported while producing tokens.
    fn syntax_error_count(&self) -> usize {
        0
    }
}

impl<T: TokenSource + ?Sized> TokenSource for Box<T> {
    fn next_token(&mut self) -> Token {
        (**self).next_token()
    }

    fn line(&self) -> usize {
        (**self).line()
    }

    fn column(&self) -> usize {
        (**self).column()
    }

    fn source_name(&self) -> String {
        (**self).source_name()
    }

    fn syntax_error_count(&self) -> usize {
        (**self).syntax_error_count()
    }
}
