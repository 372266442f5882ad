use allstar_runtime::atn::serialized::GrammarDescription;
use allstar_runtime::error_listener::{CollectingErrorListener, ErrorListeners};
use allstar_runtime::stream::{CommonTokenStream, InputStream, ListTokenSource, TokenSource, TokenStream};
use allstar_runtime::testing::grammars::{self, expr, modes};
use allstar_runtime::tree::walker::{ParseTreeListener, ParseTreeWalker};
use allstar_runtime::tree::{NodeId, ParseTree};
use allstar_runtime::{Grammar, ParserOptions, Token};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;

/// Lexes with the interpreted lexer and parses the result, returning the LISP tree and the
/// number of syntax errors across both stages.
fn lex_and_parse(parser: &Grammar, lexer: &Grammar, source: &str) -> (String, usize) {
    let mut lexer = lexer.lexer(InputStream::new(source));
    lexer.remove_error_listeners();
    let tokens = lexer.all_tokens();
    let lexer_errors = lexer.syntax_error_count();

    let mut interpreter = parser.parser(CommonTokenStream::new(ListTokenSource::new(tokens)));
    interpreter.remove_error_listeners();
    let root = interpreter.parse(expr::RULE_S).expect("parse to finish");
    (
        interpreter.to_string_tree(root),
        lexer_errors + interpreter.number_of_syntax_errors(),
    )
}

#[test]
fn test_interpreted_lexer_feeds_parser() {
    let (tree, errors) = lex_and_parse(&grammars::expression(), &grammars::expression_lexer(), "12 * (x + 3)");
    assert_eq!(tree, "(s (e (e 12) * (e ( (e (e x) + (e 3)) ))) <EOF>)");
    assert_eq!(errors, 0);
}

#[test]
fn test_lexer_errors_do_not_stop_parsing() {
    let (tree, errors) = lex_and_parse(&grammars::expression(), &grammars::expression_lexer(), "1 ? + 2");
    assert_eq!(tree, "(s (e (e 1) + (e 2)) <EOF>)");
    assert_eq!(errors, 1);
}

#[test]
fn test_grammars_loaded_from_json_parse_identically() {
    let description = GrammarDescription::describe(&grammars::expression())
        .with_lexer(GrammarDescription::describe(&grammars::expression_lexer()));
    let json = description.to_json().expect("serialize");
    let loaded = GrammarDescription::from_json(&json).expect("deserialize");
    let parser = loaded.build().expect("parser grammar");
    let lexer = loaded.build_lexer().expect("lexer grammar").expect("embedded lexer");
    assert_eq!(parser.rule_names(), ["s", "e"]);
    assert_eq!(parser.info().grammar_name, "Expr");

    for source in ["1", "1+2*3", "(a+b)*c", "1 + + 2"] {
        assert_eq!(
            lex_and_parse(&parser, &lexer, source),
            lex_and_parse(&grammars::expression(), &grammars::expression_lexer(), source),
            "{}",
            source
        );
    }
}

#[test]
fn test_modes_produce_one_string_token() {
    let mut lexer = grammars::mode_lexer().lexer(InputStream::new("say \"hi there\" now"));
    let tokens = lexer.all_tokens();
    let summary: Vec<(i32, String)> = tokens
        .iter()
        .filter(|t| !t.is_eof())
        .map(|t| (t.token_type, t.text().to_string()))
        .collect();
    assert_eq!(
        summary,
        vec![
            (modes::WORD, "say".to_string()),
            (modes::STRING, "\"hi there\"".to_string()),
            (modes::WORD, "now".to_string()),
        ]
    );
    assert_eq!(lexer.mode(), modes::DEFAULT_MODE);
    assert_eq!(lexer.syntax_error_count(), 0);
}

#[derive(Default)]
struct Events {
    log: Vec<String>,
    depth: isize,
}

/// Logs rule entries and exits by rule index.
struct Recorder(Rc<RefCell<Events>>);

impl ParseTreeListener for Recorder {
    fn enter_every_rule(&mut self, tree: &ParseTree, ctx: NodeId) {
        let mut events = self.0.borrow_mut();
        events.depth += 1;
        let rule = tree.rule(ctx).map(|r| r.rule_index).unwrap_or_default();
        events.log.push(format!("enter {}", rule));
    }

    fn exit_every_rule(&mut self, tree: &ParseTree, ctx: NodeId) {
        let mut events = self.0.borrow_mut();
        events.depth -= 1;
        assert!(events.depth >= 0, "exit without matching enter");
        let rule = tree.rule(ctx).map(|r| r.rule_index).unwrap_or_default();
        events.log.push(format!("exit {}", rule));
    }
}

#[test]
fn test_parse_listener_events_balance() {
    for source in ["1", "1+2*3", "((1))", "1 + + 2"] {
        let events = Rc::new(RefCell::new(Events::default()));
        let mut interpreter = allstar_runtime::testing::expression_parser(source);
        interpreter.remove_error_listeners();
        interpreter.add_parse_listener(Box::new(Recorder(Rc::clone(&events))));
        interpreter.parse(expr::RULE_S).expect("parse to finish");

        let events = events.borrow();
        assert_eq!(events.depth, 0, "{}", source);
        let enters = events.log.iter().filter(|e| e.starts_with("enter")).count();
        let exits = events.log.iter().filter(|e| e.starts_with("exit")).count();
        assert_eq!(enters, exits, "{}", source);
        assert_eq!(events.log.first().map(String::as_str), Some("enter 0"));
        assert_eq!(events.log.last().map(String::as_str), Some("exit 0"));
    }
}

#[test]
fn test_walker_replays_finished_tree() {
    let (interpreter, root) = allstar_runtime::testing::parse_expression("1+2");
    let events = Rc::new(RefCell::new(Events::default()));
    let mut recorder = Recorder(Rc::clone(&events));
    ParseTreeWalker::walk(&mut recorder, interpreter.tree(), root);
    assert_eq!(
        events.borrow().log,
        vec!["enter 0", "enter 1", "enter 1", "exit 1", "enter 1", "exit 1", "exit 1", "exit 0"]
    );
}

#[test]
fn test_parse_without_tree_building() {
    let mut interpreter = allstar_runtime::testing::expression_parser("1+2*3").with_options(ParserOptions {
        build_parse_trees: false,
        ..Default::default()
    });
    let root = interpreter.parse(expr::RULE_S).expect("parse to finish");
    assert!(interpreter.tree().children(root).is_empty());
    assert_eq!(interpreter.number_of_syntax_errors(), 0);
}

#[test]
fn test_hidden_channel_tokens_are_invisible_to_the_parser() {
    let tokens = vec![
        Token::new(expr::INT, "1"),
        Token::new(expr::WS, " ").with_channel(1),
        Token::new(expr::PLUS, "+"),
        Token::new(expr::INT, "2"),
    ];
    let mut stream = CommonTokenStream::new(ListTokenSource::new(tokens));
    stream.fill();
    assert_eq!(stream.text(), "1 +2");
    let mut interpreter = grammars::expression().parser(stream);
    interpreter.remove_error_listeners();
    let root = interpreter.parse(expr::RULE_S).expect("parse to finish");
    assert_eq!(interpreter.to_string_tree(root), "(s (e (e 1) + (e 2)) <EOF>)");
}

#[test]
fn test_threads_share_one_dfa_cache() {
    let grammar = Arc::new(grammars::expression());
    let sources = ["1+2", "a*b+c", "(1+2)*3", "x", "1*2*3+4"];
    let handles: Vec<_> = sources
        .iter()
        .map(|&source| {
            let grammar = Arc::clone(&grammar);
            thread::spawn(move || {
                let mut interpreter = grammar.parser(allstar_runtime::testing::calc_tokens(source));
                let collector = CollectingErrorListener::new();
                *interpreter.parser_mut().error_listeners() = ErrorListeners::empty();
                interpreter.add_error_listener(Box::new(collector.clone()));
                let root = interpreter.parse(expr::RULE_S).expect("parse to finish");
                assert!(collector.messages().is_empty());
                interpreter.to_string_tree(root)
            })
        })
        .collect();
    let concurrent: Vec<String> = handles
        .into_iter()
        .map(|handle| handle.join().expect("parser thread"))
        .collect();

    assert!(grammar.dfa_cache().state_count() > 0);
    for (source, tree) in sources.iter().zip(&concurrent) {
        let (interpreter, root) = allstar_runtime::testing::parse_expression(source);
        assert_eq!(&interpreter.to_string_tree(root), tree);
    }
}

#[test]
fn test_trace_logging_does_not_change_the_tree() {
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
    let mut interpreter = allstar_runtime::testing::expression_parser("(1+2)*3").with_options(ParserOptions {
        trace: true,
        ..Default::default()
    });
    let root = interpreter.parse(expr::RULE_S).expect("parse to finish");
    assert_eq!(interpreter.to_string_tree(root), "(s (e (e ( (e (e 1) + (e 2)) )) * (e 3)) <EOF>)");
}
