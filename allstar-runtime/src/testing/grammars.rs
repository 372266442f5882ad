//! Sample grammars
//!
//!     Each function builds one grammar from scratch; grammars are cheap to build and tests
//!     should not share DFA caches by accident. The grammar each ATN encodes is written out
//!     above its constructor.

use crate::atn::factory::{AtnFactory, Handle};
use crate::atn::LexerAction;
use crate::interval_set::IntervalSet;
use crate::recognizer::{Grammar, GrammarInfo};
use crate::token::EOF;
use crate::vocabulary::Vocabulary;

/// Token types and rule indexes of the expression grammar, shared by its parser and lexer.
pub mod expr {
    pub const INT: i32 = 1;
    pub const ID: i32 = 2;
    pub const PLUS: i32 = 3;
    pub const STAR: i32 = 4;
    pub const LPAREN: i32 = 5;
    pub const RPAREN: i32 = 6;
    pub const WS: i32 = 7;

    pub const RULE_S: usize = 0;
    pub const RULE_E: usize = 1;
}

/// Token types of [mode_lexer].
pub mod modes {
    pub const WORD: i32 = 1;
    pub const STRING: i32 = 2;
    pub const OPEN: i32 = 3;
    pub const BODY: i32 = 4;
    pub const WS: i32 = 5;

    pub const DEFAULT_MODE: usize = 0;
    pub const STRING_MODE: usize = 1;
}

/// Token types of the single-letter grammars ([ac], [two_token_choice]).
pub mod letters {
    pub const A: i32 = 1;
    pub const B: i32 = 2;
    pub const C: i32 = 3;
}

fn names(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn finish(factory: AtnFactory, info: GrammarInfo) -> Grammar {
    match factory.build() {
        Ok(atn) => Grammar::new(atn, info),
        Err(error) => panic!("sample grammar {} is malformed: {}", info.grammar_name, error),
    }
}

fn expr_vocabulary() -> Vocabulary {
    Vocabulary::from_entries([
        (expr::INT, None, Some("INT")),
        (expr::ID, None, Some("ID")),
        (expr::PLUS, Some("'+'"), Some("PLUS")),
        (expr::STAR, Some("'*'"), Some("STAR")),
        (expr::LPAREN, Some("'('"), Some("LPAREN")),
        (expr::RPAREN, Some("')'"), Some("RPAREN")),
        (expr::WS, None, Some("WS")),
    ])
}

fn letters_vocabulary() -> Vocabulary {
    Vocabulary::from_entries([
        (letters::A, Some("'a'"), Some("A")),
        (letters::B, Some("'b'"), Some("B")),
        (letters::C, Some("'c'"), Some("C")),
    ])
}

/// ```text
/// s : e EOF ;
/// e : e '*' e
///   | e '+' e
///   | '(' e ')'
///   | INT
///   | ID
///   ;
/// ```
///
/// `e` is left-recursive; `*` binds tighter than `+` and both associate to the left.
pub fn expression() -> Grammar {
    let mut f = AtnFactory::parser(expr::WS);
    let s = f.declare_rule();
    let e = f.declare_left_recursive_rule();
    f.rule(s, |f| {
        let body = f.rule_ref(e);
        let eof = f.token(EOF);
        f.sequence(vec![body, eof])
    });
    f.rule(e, |f| {
        let lparen = f.token(expr::LPAREN);
        let inner = f.rule_ref(e);
        let rparen = f.token(expr::RPAREN);
        let group = f.sequence(vec![lparen, inner, rparen]);
        let int = f.token(expr::INT);
        let id = f.token(expr::ID);

        let star = f.token(expr::STAR);
        let rhs = f.rule_ref_with_precedence(e, 4);
        let times = f.sequence(vec![star, rhs]);
        let plus = f.token(expr::PLUS);
        let rhs = f.rule_ref_with_precedence(e, 3);
        let add = f.sequence(vec![plus, rhs]);

        f.left_recursive_body(vec![group, int, id], vec![(3, times), (2, add)])
    });
    finish(
        f,
        GrammarInfo {
            grammar_name: "Expr".to_string(),
            rule_names: names(&["s", "e"]),
            vocabulary: expr_vocabulary(),
            ..Default::default()
        },
    )
}

fn identifier_chars() -> IntervalSet {
    let mut set = IntervalSet::of_range('a' as i32, 'z' as i32);
    set.add_range('A' as i32, 'Z' as i32);
    set.add('_' as i32);
    set
}

fn whitespace_chars() -> IntervalSet {
    IntervalSet::from_elements([' ', '\t', '\r', '\n'].map(|c| c as i32))
}

/// ```text
/// INT    : [0-9]+ ;
/// ID     : [a-zA-Z_]+ ;
/// PLUS   : '+' ;
/// STAR   : '*' ;
/// LPAREN : '(' ;
/// RPAREN : ')' ;
/// WS     : [ \t\r\n]+ -> skip ;
/// ```
pub fn expression_lexer() -> Grammar {
    let mut f = AtnFactory::lexer(expr::WS);
    let int = f.declare_token_rule(expr::INT);
    let id = f.declare_token_rule(expr::ID);
    let plus = f.declare_token_rule(expr::PLUS);
    let star = f.declare_token_rule(expr::STAR);
    let lparen = f.declare_token_rule(expr::LPAREN);
    let rparen = f.declare_token_rule(expr::RPAREN);
    let ws = f.declare_token_rule(expr::WS);

    f.rule(int, |f| {
        let digit = f.char_range('0', '9');
        f.plus(vec![digit], true)
    });
    f.rule(id, |f| {
        let letter = f.set(identifier_chars());
        f.plus(vec![letter], true)
    });
    f.rule(plus, |f| f.literal("+"));
    f.rule(star, |f| f.literal("*"));
    f.rule(lparen, |f| f.literal("("));
    f.rule(rparen, |f| f.literal(")"));
    f.rule(ws, |f| {
        let blank = f.set(whitespace_chars());
        let blanks = f.plus(vec![blank], true);
        let skip = f.lexer_action(LexerAction::Skip);
        f.sequence(vec![blanks, skip])
    });
    f.add_mode(&[int, id, plus, star, lparen, rparen, ws]);

    finish(
        f,
        GrammarInfo {
            grammar_name: "ExprLexer".to_string(),
            rule_names: names(&["INT", "ID", "PLUS", "STAR", "LPAREN", "RPAREN", "WS"]),
            vocabulary: expr_vocabulary(),
            channel_names: names(&["DEFAULT_TOKEN_CHANNEL", "HIDDEN"]),
            mode_names: names(&["DEFAULT_MODE"]),
        },
    )
}

/// ```text
/// s : 'a' 'c' ;
/// ```
///
/// No EOF at the end: after `'a' 'c'` the parse is done, whatever follows.
pub fn ac() -> Grammar {
    let mut f = AtnFactory::parser(letters::C);
    let s = f.declare_rule();
    f.rule(s, |f| {
        let a = f.token(letters::A);
        let c = f.token(letters::C);
        f.sequence(vec![a, c])
    });
    finish(
        f,
        GrammarInfo {
            grammar_name: "AC".to_string(),
            rule_names: names(&["s"]),
            vocabulary: letters_vocabulary(),
            ..Default::default()
        },
    )
}

/// ```text
/// s : 'a' 'b'
///   | 'a' 'c'
///   ;
/// ```
///
/// The only decision needs two tokens of lookahead.
pub fn two_token_choice() -> Grammar {
    let mut f = AtnFactory::parser(letters::C);
    let s = f.declare_rule();
    f.rule(s, |f| {
        let alts: Vec<Handle> = [letters::B, letters::C]
            .into_iter()
            .map(|second| {
                let a = f.token(letters::A);
                let next = f.token(second);
                f.sequence(vec![a, next])
            })
            .collect();
        f.alternatives(alts)
    });
    finish(
        f,
        GrammarInfo {
            grammar_name: "TwoTokenChoice".to_string(),
            rule_names: names(&["s"]),
            vocabulary: letters_vocabulary(),
            ..Default::default()
        },
    )
}

/// Token type of the single token of [ambiguous] and [predicated].
pub const ID: i32 = 1;

fn id_vocabulary() -> Vocabulary {
    Vocabulary::from_entries([(ID, None, Some("ID"))])
}

/// ```text
/// s : (a | b) EOF ;
/// a : ID ;
/// b : ID ;
/// ```
///
/// Both alternatives of `s` match exactly the same input: a true ambiguity, which full
/// context prediction resolves to the lowest alternative.
pub fn ambiguous() -> Grammar {
    let mut f = AtnFactory::parser(ID);
    let s = f.declare_rule();
    let a = f.declare_rule();
    let b = f.declare_rule();
    f.rule(s, |f| {
        let call_a = f.rule_ref(a);
        let call_b = f.rule_ref(b);
        let choice = f.alternatives(vec![call_a, call_b]);
        let eof = f.token(EOF);
        f.sequence(vec![choice, eof])
    });
    f.rule(a, |f| f.token(ID));
    f.rule(b, |f| f.token(ID));
    finish(
        f,
        GrammarInfo {
            grammar_name: "Ambiguous".to_string(),
            rule_names: names(&["s", "a", "b"]),
            vocabulary: id_vocabulary(),
            ..Default::default()
        },
    )
}

/// ```text
/// s : {p0}? ID EOF
///   | {p1}? ID EOF
///   ;
/// ```
///
/// Only the predicates tell the alternatives apart; the host decides through its hooks.
pub fn predicated() -> Grammar {
    let mut f = AtnFactory::parser(ID);
    let s = f.declare_rule();
    f.rule(s, |f| {
        let alts: Vec<Handle> = (0..2)
            .map(|pred_index| {
                let guard = f.predicate(pred_index, false);
                let id = f.token(ID);
                let eof = f.token(EOF);
                f.sequence(vec![guard, id, eof])
            })
            .collect();
        f.alternatives(alts)
    });
    finish(
        f,
        GrammarInfo {
            grammar_name: "Predicated".to_string(),
            rule_names: names(&["s"]),
            vocabulary: id_vocabulary(),
            ..Default::default()
        },
    )
}

/// ```text
/// WORD : [a-z]+ ;
/// OPEN : '"' -> more, pushMode(STRING_MODE) ;
/// WS   : ' '+ -> skip ;
///
/// mode STRING_MODE;
/// STRING : '"' -> popMode ;
/// BODY   : ~'"'+ -> more ;
/// ```
///
/// A quoted string comes out as one STRING token, quotes included.
pub fn mode_lexer() -> Grammar {
    let mut f = AtnFactory::lexer(modes::WS);
    let word = f.declare_token_rule(modes::WORD);
    let open = f.declare_token_rule(modes::OPEN);
    let ws = f.declare_token_rule(modes::WS);
    let string = f.declare_token_rule(modes::STRING);
    let body = f.declare_token_rule(modes::BODY);

    f.rule(word, |f| {
        let letter = f.char_range('a', 'z');
        f.plus(vec![letter], true)
    });
    f.rule(open, |f| {
        let quote = f.literal("\"");
        let more = f.lexer_action(LexerAction::More);
        let push = f.lexer_action(LexerAction::PushMode {
            mode: modes::STRING_MODE,
        });
        f.sequence(vec![quote, more, push])
    });
    f.rule(ws, |f| {
        let space = f.literal(" ");
        let spaces = f.plus(vec![space], true);
        let skip = f.lexer_action(LexerAction::Skip);
        f.sequence(vec![spaces, skip])
    });
    f.rule(string, |f| {
        let quote = f.literal("\"");
        let pop = f.lexer_action(LexerAction::PopMode);
        f.sequence(vec![quote, pop])
    });
    f.rule(body, |f| {
        let char = f.not_set(IntervalSet::of('"' as i32));
        let chars = f.plus(vec![char], true);
        let more = f.lexer_action(LexerAction::More);
        f.sequence(vec![chars, more])
    });
    f.add_mode(&[word, open, ws]);
    f.add_mode(&[string, body]);

    finish(
        f,
        GrammarInfo {
            grammar_name: "ModeLexer".to_string(),
            rule_names: names(&["WORD", "OPEN", "WS", "STRING", "BODY"]),
            vocabulary: Vocabulary::from_entries([
                (modes::WORD, None, Some("WORD")),
                (modes::STRING, None, Some("STRING")),
                (modes::OPEN, None, Some("OPEN")),
                (modes::BODY, None, Some("BODY")),
                (modes::WS, None, Some("WS")),
            ]),
            channel_names: names(&["DEFAULT_TOKEN_CHANNEL", "HIDDEN"]),
            mode_names: names(&["DEFAULT_MODE", "STRING_MODE"]),
        },
    )
}
