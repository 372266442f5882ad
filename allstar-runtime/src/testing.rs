//! Testing utilities
//!
//!     Tests across the runtime share a small set of sample grammars instead of building
//!     ATNs inline. An ATN assembled by hand is easy to get subtly wrong (a missing decision,
//!     a rule body wired to the wrong stop state), and a test against a malformed ATN tunes
//!     the interpreter to the wrong thing. The grammars in [grammars] are built once, in one
//!     place, and their shapes are documented next to their construction.
//!
//!     Two rules:
//!
//!         1. Use the sample grammars from [grammars]. Add a new one there when a test needs
//!            a shape none of them has.
//!         2. Check trees with [tree_assertions] or the LISP rendering, not by poking at
//!            node ids.
//!
//!     ```rust,ignore
//!     use allstar::testing::{grammars, parse_expression};
//!     use allstar::testing::tree_assertions::assert_tree;
//!
//!     let (interpreter, root) = parse_expression("1+2*3");
//!     assert_tree(&interpreter, root).rule("s").child(0).rule("e").child_count(3);
//!     ```
//!
//! Tokens
//!
//!     The expression grammar has a parser ATN, a lexer ATN and a logos lexer ([CalcToken])
//!     that all agree on token types. Parser tests feed the logos tokens through a
//!     [ListTokenSource](crate::stream::ListTokenSource) so that a parser failure never hides
//!     behind a lexer one.

pub mod grammars;
pub mod tree_assertions;

use crate::interpreter::ParserInterpreter;
use crate::stream::{CommonTokenStream, ListTokenSource, TokenKind};
use crate::tree::NodeId;
use grammars::expr;
use logos::Logos;

/// Logos lexer for the expression grammar.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n]+")]
pub enum CalcToken {
    #[regex("[0-9]+")]
    Int,
    #[regex("[a-zA-Z_]+")]
    Id,
    #[token("+")]
    Plus,
    #[token("*")]
    Star,
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
}

impl TokenKind for CalcToken {
    fn token_type(&self) -> i32 {
        match self {
            CalcToken::Int => expr::INT,
            CalcToken::Id => expr::ID,
            CalcToken::Plus => expr::PLUS,
            CalcToken::Star => expr::STAR,
            CalcToken::LParen => expr::LPAREN,
            CalcToken::RParen => expr::RPAREN,
        }
    }
}

/// Buffered token stream over `source`, lexed with [CalcToken].
pub fn calc_tokens(source: &str) -> CommonTokenStream<ListTokenSource> {
    CommonTokenStream::new(ListTokenSource::from_logos::<CalcToken>(source))
}

/// An expression parser over `source`, ready to parse.
pub fn expression_parser(source: &str) -> ParserInterpreter {
    grammars::expression().parser(calc_tokens(source))
}

/// Parses `source` from rule `s` and panics on a fatal error. Syntax errors are recovered
/// and left for the caller to inspect.
pub fn parse_expression(source: &str) -> (ParserInterpreter, NodeId) {
    let mut interpreter = expression_parser(source);
    match interpreter.parse(expr::RULE_S) {
        Ok(root) => (interpreter, root),
        Err(error) => panic!("parsing {:?} failed: {}", source, error),
    }
}
