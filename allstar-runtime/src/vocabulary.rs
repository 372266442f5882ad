//! Token vocabulary
//!
//!     Maps token types to the names used in messages. Literal names carry their quotes
//!     (`'+'`), symbolic names do not (`INT`). The display name prefers the literal, then the
//!     symbolic name, then the bare number.

use crate::token::{EOF, EPSILON};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vocabulary {
    #[serde(default)]
    literal_names: Vec<Option<String>>,
    #[serde(default)]
    symbolic_names: Vec<Option<String>>,
}

impl Vocabulary {
    /// Both tables are indexed by token type; slot 0 is the invalid type.
    pub fn new(literal_names: Vec<Option<String>>, symbolic_names: Vec<Option<String>>) -> Self {
        Vocabulary {
            literal_names,
            symbolic_names,
        }
    }

    /// Builds a vocabulary from `(token_type, literal, symbolic)` triples.
    pub fn from_entries<'a>(entries: impl IntoIterator<Item = (i32, Option<&'a str>, Option<&'a str>)>) -> Self {
        let mut vocabulary = Vocabulary::default();
        for (token_type, literal, symbolic) in entries {
            if token_type < 0 {
                continue;
            }
            let slot = token_type as usize;
            if vocabulary.literal_names.len() <= slot {
                vocabulary.literal_names.resize(slot + 1, None);
                vocabulary.symbolic_names.resize(slot + 1, None);
            }
            vocabulary.literal_names[slot] = literal.map(str::to_string);
            vocabulary.symbolic_names[slot] = symbolic.map(str::to_string);
        }
        vocabulary
    }

    pub fn max_token_type(&self) -> i32 {
        self.literal_names.len().max(self.symbolic_names.len()) as i32 - 1
    }

    pub fn literal_name(&self, token_type: i32) -> Option<&str> {
        lookup(&self.literal_names, token_type)
    }

    pub fn symbolic_name(&self, token_type: i32) -> Option<&str> {
        if token_type == EOF {
            return Some("EOF");
        }
        lookup(&self.symbolic_names, token_type)
    }

    pub fn display_name(&self, token_type: i32) -> String {
        if let Some(literal) = self.literal_name(token_type) {
            return literal.to_string();
        }
        if let Some(symbolic) = self.symbolic_name(token_type) {
            return symbolic.to_string();
        }
        token_type.to_string()
    }

    /// The name used inside expected-token sets.
    pub fn element_name(&self, token_type: i32) -> String {
        match token_type {
            EOF => "<EOF>".to_string(),
            EPSILON => "<EPSILON>".to_string(),
            t => self.display_name(t),
        }
    }

    pub fn literal_names(&self) -> &[Option<String>] {
        &self.literal_names
    }

    pub fn symbolic_names(&self) -> &[Option<String>] {
        &self.symbolic_names
    }

    /// Finds a token type by symbolic or literal name.
    pub fn token_type(&self, name: &str) -> Option<i32> {
        let find = |names: &[Option<String>]| {
            names
                .iter()
                .position(|n| n.as_deref() == Some(name))
                .map(|i| i as i32)
        };
        if name == "EOF" {
            return Some(EOF);
        }
        find(&self.symbolic_names).or_else(|| find(&self.literal_names))
    }
}

fn lookup(names: &[Option<String>], token_type: i32) -> Option<&str> {
    if token_type < 0 {
        return None;
    }
    names.get(token_type as usize).and_then(|n| n.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vocabulary {
        Vocabulary::from_entries([(1, Some("'+'"), Some("PLUS")), (2, None, Some("INT")), (4, None, None)])
    }

    #[test]
    fn test_display_name_precedence() {
        let vocabulary = sample();
        assert_eq!(vocabulary.display_name(1), "'+'");
        assert_eq!(vocabulary.display_name(2), "INT");
        assert_eq!(vocabulary.display_name(4), "4");
        assert_eq!(vocabulary.display_name(EOF), "EOF");
        assert_eq!(vocabulary.element_name(EOF), "<EOF>");
    }

    #[test]
    fn test_token_type_lookup() {
        let vocabulary = sample();
        assert_eq!(vocabulary.token_type("INT"), Some(2));
        assert_eq!(vocabulary.token_type("'+'"), Some(1));
        assert_eq!(vocabulary.token_type("EOF"), Some(EOF));
        assert_eq!(vocabulary.token_type("NOPE"), None);
        assert_eq!(vocabulary.max_token_type(), 4);
    }
}
