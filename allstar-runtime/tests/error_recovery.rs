use allstar_runtime::error_listener::{CollectingErrorListener, ErrorListeners};
use allstar_runtime::options::ErrorStrategyKind;
use allstar_runtime::stream::{CommonTokenStream, ListTokenSource};
use allstar_runtime::testing::grammars::{self, expr, letters};
use allstar_runtime::testing::tree_assertions::assert_tree;
use allstar_runtime::testing::expression_parser;
use allstar_runtime::token::INVALID_TYPE;
use allstar_runtime::{Grammar, ParseError, ParserInterpreter, ParserOptions, Token};
use rstest::rstest;

/// One token per character, positioned on line 1.
fn letter_tokens(input: &str) -> CommonTokenStream<ListTokenSource> {
    let tokens = input
        .chars()
        .enumerate()
        .map(|(i, c)| {
            let token_type = match c {
                'a' => letters::A,
                'b' => letters::B,
                'c' => letters::C,
                _ => INVALID_TYPE,
            };
            Token::new(token_type, c.to_string())
                .with_position(1, i)
                .with_span(i..i + 1)
        })
        .collect();
    CommonTokenStream::new(ListTokenSource::new(tokens))
}

fn collecting(mut interpreter: ParserInterpreter) -> (ParserInterpreter, CollectingErrorListener) {
    let collector = CollectingErrorListener::new();
    *interpreter.parser_mut().error_listeners() = ErrorListeners::empty();
    interpreter.add_error_listener(Box::new(collector.clone()));
    (interpreter, collector)
}

fn parse_letters(grammar: &Grammar, input: &str) -> (String, Vec<String>, usize) {
    let (mut interpreter, collector) = collecting(grammar.parser(letter_tokens(input)));
    let root = interpreter.parse(0).expect("recovery keeps the parse going");
    (
        interpreter.to_string_tree(root),
        collector.messages(),
        interpreter.number_of_syntax_errors(),
    )
}

#[rstest]
#[case::clean("ac", "(s a c)", &[])]
#[case::mismatch("ab", "(s a b)", &["line 1:1 mismatched input 'b' expecting 'c'"])]
#[case::extraneous("aac", "(s a a c)", &["line 1:1 extraneous input 'a' expecting 'c'"])]
#[case::missing("a", "(s a <missing 'c'>)", &["line 1:1 missing 'c' at '<EOF>'"])]
fn test_inline_recovery(#[case] input: &str, #[case] tree: &str, #[case] messages: &[&str]) {
    let (rendered, reported, count) = parse_letters(&grammars::ac(), input);
    assert_eq!(rendered, tree);
    assert_eq!(reported, messages);
    assert_eq!(count, messages.len());
}

#[test]
fn test_consumed_tokens_become_error_nodes() {
    let (mut interpreter, _) = collecting(grammars::ac().parser(letter_tokens("aac")));
    let root = interpreter.parse(0).expect("parse to finish");
    assert_tree(&interpreter, root)
        .child_count(3)
        .child(1)
        .error_node("a");
    assert_tree(&interpreter, root).child(2).terminal("c");
}

#[test]
fn test_conjured_token_is_positioned_after_previous_token() {
    let (mut interpreter, collector) = collecting(grammars::ac().parser(letter_tokens("a")));
    let root = interpreter.parse(0).expect("parse to finish");
    let missing = interpreter.tree().child(root, 1).expect("conjured node");
    let token = interpreter.tree().node(missing).token().expect("token node").clone();
    assert!(token.is_conjured());
    assert_eq!(token.token_type, letters::C);
    assert_eq!((token.line, token.column), (1, 0));
    let errors = collector.syntax_errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].offending_token.as_ref().is_some_and(Token::is_eof));
}

#[test]
fn test_sync_deletes_extra_operator() {
    let (mut interpreter, collector) = collecting(expression_parser("1 + + 2"));
    let root = interpreter.parse(expr::RULE_S).expect("parse to finish");
    assert_eq!(
        collector.messages(),
        vec!["line 1:4 extraneous input '+' expecting {INT, ID, '('}"]
    );
    assert_eq!(interpreter.to_string_tree(root), "(s (e (e 1) + (e + 2)) <EOF>)");
}

#[test]
fn test_missing_closing_paren() {
    let (mut interpreter, collector) = collecting(expression_parser("(1"));
    let root = interpreter.parse(expr::RULE_S).expect("parse to finish");
    assert_eq!(collector.messages(), vec!["line 1:2 missing ')' at '<EOF>'"]);
    assert_eq!(interpreter.to_string_tree(root), "(s (e ( (e 1) <missing ')'>) <EOF>)");
}

#[test]
fn test_resync_to_follow_set() {
    let (mut interpreter, collector) = collecting(expression_parser("+"));
    let root = interpreter.parse(expr::RULE_S).expect("parse to finish");
    assert_eq!(
        collector.messages(),
        vec!["line 1:0 mismatched input '+' expecting {INT, ID, '('}"]
    );
    let e = assert_tree(&interpreter, root).child(0).rule("e").has_exception();
    e.child(0).error_node("+");
    assert_tree(&interpreter, root).child(1).terminal("<EOF>");
}

#[test]
fn test_errors_are_reported_once_per_position() {
    let (mut interpreter, collector) = collecting(expression_parser("1 2 3"));
    interpreter.parse(expr::RULE_S).expect("parse to finish");
    // everything after the first error is skipped while resynchronizing
    assert_eq!(collector.messages().len(), 1);
    assert!(collector.messages()[0].starts_with("line 1:2 "));
}

#[test]
fn test_bail_strategy_cancels() {
    let mut interpreter = expression_parser("1 + + 2").with_options(ParserOptions {
        error_strategy: ErrorStrategyKind::Bail,
        ..Default::default()
    });
    *interpreter.parser_mut().error_listeners() = ErrorListeners::empty();
    match interpreter.parse(expr::RULE_S) {
        Err(ParseError::Cancelled(error)) => {
            assert_eq!(error.offending_token.as_ref().map(|t| t.text().to_string()), Some("+".to_string()));
        }
        other => panic!("expected cancellation, got {:?}", other.map(|_| ())),
    }
    // every context on the way out records the error
    let tree = interpreter.tree();
    let innermost = interpreter.parser().context().expect("context at the error");
    assert!(tree.rule(innermost).is_some_and(|r| r.exception.is_some()));
    let root = interpreter.root().expect("root context");
    assert!(tree.rule(root).is_some_and(|r| r.exception.is_some()));
}
