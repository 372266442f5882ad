use allstar_runtime::error_listener::{CollectingErrorListener, ErrorListeners};
use allstar_runtime::testing::grammars::expr;
use allstar_runtime::testing::tree_assertions::assert_tree;
use allstar_runtime::testing::{expression_parser, parse_expression};
use allstar_runtime::{ParserInterpreter, ParserOptions, PredictionMode};
use rstest::rstest;

fn quiet(source: &str, mode: PredictionMode) -> (ParserInterpreter, CollectingErrorListener) {
    let mut interpreter = expression_parser(source).with_options(ParserOptions {
        prediction_mode: mode,
        ..Default::default()
    });
    let collector = CollectingErrorListener::new();
    *interpreter.parser_mut().error_listeners() = ErrorListeners::empty();
    interpreter.add_error_listener(Box::new(collector.clone()));
    (interpreter, collector)
}

#[rstest]
#[case("1", "(s (e 1) <EOF>)")]
#[case("x", "(s (e x) <EOF>)")]
#[case("1+2+3", "(s (e (e (e 1) + (e 2)) + (e 3)) <EOF>)")]
#[case("1*2+3", "(s (e (e (e 1) * (e 2)) + (e 3)) <EOF>)")]
#[case("1+2*3", "(s (e (e 1) + (e (e 2) * (e 3))) <EOF>)")]
#[case("(1+2)*3", "(s (e (e ( (e (e 1) + (e 2)) )) * (e 3)) <EOF>)")]
#[case("a * (b)", "(s (e (e a) * (e ( (e b) ))) <EOF>)")]
fn test_precedence_and_associativity(
    #[case] source: &str,
    #[case] expected: &str,
    #[values(PredictionMode::Sll, PredictionMode::Ll, PredictionMode::LlExactAmbigDetection)] mode: PredictionMode,
) {
    let (mut interpreter, collector) = quiet(source, mode);
    let root = interpreter.parse(expr::RULE_S).expect("parse to finish");
    assert_eq!(interpreter.to_string_tree(root), expected);
    assert!(collector.messages().is_empty(), "{:?}", collector.messages());
}

#[test]
fn test_left_recursive_start_rule() {
    let (mut interpreter, collector) = quiet("2*3*4", PredictionMode::Ll);
    let root = interpreter.parse(expr::RULE_E).expect("parse to finish");
    insta::assert_snapshot!(interpreter.to_string_tree(root), @"(e (e (e 2) * (e 3)) * (e 4))");
    assert_eq!(interpreter.tree().parent(root), None);
    assert_eq!(interpreter.root(), Some(root));
    assert!(collector.messages().is_empty());
}

#[test]
fn test_operator_nodes_span_their_operands() {
    let (interpreter, root) = parse_expression("1 + 2 * 3");
    let sum = assert_tree(&interpreter, root).child(0).rule("e").child_count(3);
    sum.child(2).rule("e").text("2*3").child(1).terminal("*");
    let sum_id = sum.id();
    let rule = interpreter.tree().rule(sum_id).expect("rule node");
    assert_eq!(rule.start.as_ref().map(|t| t.text().to_string()), Some("1".to_string()));
    assert_eq!(rule.stop.as_ref().map(|t| t.text().to_string()), Some("3".to_string()));
    assert_eq!(interpreter.tree().source_interval(sum_id), Some((0, 4)));
}

#[test]
fn test_reparented_contexts_keep_invoking_states() {
    let (interpreter, root) = parse_expression("1+2");
    let tree = interpreter.tree();
    let sum = tree.child(root, 0).expect("e");
    let left = tree.child(sum, 0).expect("left operand");
    // the left operand was parsed first and moved under the operator node
    assert_eq!(tree.parent(left), Some(sum));
    assert!(tree.rule(left).and_then(|r| r.invoking_state).is_some());
    assert_eq!(tree.parent(sum), Some(root));
}

#[test]
fn test_deep_nesting_hits_the_depth_guard() {
    let source = format!("{}1{}", "(".repeat(40), ")".repeat(40));
    let mut interpreter = expression_parser(&source).with_options(ParserOptions {
        max_rule_depth: 20,
        ..Default::default()
    });
    match interpreter.parse(expr::RULE_S) {
        Err(allstar_runtime::ParseError::DepthLimitExceeded { depth, rule_index }) => {
            assert_eq!(depth, 21);
            assert_eq!(rule_index, expr::RULE_E);
        }
        other => panic!("expected the depth guard, got {:?}", other.map(|_| ())),
    }

    let (mut interpreter, collector) = quiet(&source, PredictionMode::Ll);
    let root = interpreter.parse(expr::RULE_S).expect("default limit is far enough");
    assert!(interpreter.to_string_tree(root).starts_with("(s (e ( (e ( (e ("));
    assert!(collector.messages().is_empty());
}
