//! Character input held fully in memory, indexed by Unicode scalar value.

use super::{CharStream, IntStream};
use crate::token::EOF;
use std::ops::Range;

#[derive(Debug, Clone)]
pub struct InputStream {
    data: Vec<char>,
    position: usize,
    name: String,
    marks: usize,
}

impl InputStream {
    pub fn new(source: &str) -> Self {
        InputStream {
            data: source.chars().collect(),
            position: 0,
            name: "<unknown>".to_string(),
            marks: 0,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl IntStream for InputStream {
    fn consume(&mut self) {
        if self.position < self.data.len() {
            self.position += 1;
        }
    }

    fn la(&mut self, i: isize) -> i32 {
        if i == 0 {
            return 0;
        }
        // la(-1) is the character just consumed
        let offset = if i < 0 { i } else { i - 1 };
        let target = self.position as isize + offset;
        if target < 0 || target as usize >= self.data.len() {
            return EOF;
        }
        self.data[target as usize] as i32
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
        self.position
    }

    fn seek(&mut self, index: usize) {
        self.position = index.min(self.data.len());
    }

    fn size(&self) -> usize {
        self.data.len()
    }

    fn source_name(&self) -> String {
        self.name.clone()
    }
}

impl CharStream for InputStream {
    fn text(&self, range: Range<usize>) -> String {
        let end = range.end.min(self.data.len());
        if range.start >= end {
            return String::new();
        }
        self.data[range.start..end].iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookahead_and_lookbehind() {
        let mut input = InputStream::new("aé\n");
        assert_eq!(input.la(1), 'a' as i32);
        assert_eq!(input.la(2), 'é' as i32);
        assert_eq!(input.la(-1), EOF);
        input.consume();
        assert_eq!(input.la(-1), 'a' as i32);
        assert_eq!(input.la(3), EOF);
    }

    #[test]
    fn test_consume_at_end_is_noop() {
        let mut input = InputStream::new("x");
        input.consume();
        input.consume();
        assert_eq!(input.index(), 1);
        assert_eq!(input.la(1), EOF);
    }

    #[test]
    fn test_text_is_clamped() {
        let input = InputStream::new("hello");
        assert_eq!(input.text(1..3), "el");
        assert_eq!(input.text(3..99), "lo");
        assert_eq!(input.text(4..2), "");
    }
}
