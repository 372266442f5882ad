use allstar_runtime::error_listener::{CollectingErrorListener, ErrorListeners};
use allstar_runtime::recognizer::SemanticHooks;
use allstar_runtime::stream::{CommonTokenStream, ListTokenSource};
use allstar_runtime::testing::grammars::{self, letters, ID};
use allstar_runtime::tree::{NodeId, ParseTree};
use allstar_runtime::{Grammar, ParserInterpreter, ParserOptions, PredictionMode, Token};
use std::cell::RefCell;
use std::rc::Rc;

fn stream(types: &[(i32, &str)]) -> CommonTokenStream<ListTokenSource> {
    let tokens = types
        .iter()
        .enumerate()
        .map(|(i, (token_type, text))| {
            Token::new(*token_type, text.to_string())
                .with_position(1, i)
                .with_span(i..i + 1)
        })
        .collect();
    CommonTokenStream::new(ListTokenSource::new(tokens))
}

fn interpreter(
    grammar: &Grammar,
    tokens: &[(i32, &str)],
    mode: PredictionMode,
) -> (ParserInterpreter, CollectingErrorListener) {
    let mut interpreter = grammar.parser(stream(tokens)).with_options(ParserOptions {
        prediction_mode: mode,
        ..Default::default()
    });
    let collector = CollectingErrorListener::new();
    *interpreter.parser_mut().error_listeners() = ErrorListeners::empty();
    interpreter.add_error_listener(Box::new(collector.clone()));
    (interpreter, collector)
}

#[test]
fn test_ambiguity_resolves_to_lowest_alternative() {
    let (mut interpreter, collector) = interpreter(&grammars::ambiguous(), &[(ID, "x")], PredictionMode::Ll);
    let root = interpreter.parse(0).expect("parse to finish");
    assert_eq!(interpreter.to_string_tree(root), "(s (a x) <EOF>)");
    assert_eq!(interpreter.number_of_syntax_errors(), 0);

    let ambiguities = collector.ambiguities();
    assert_eq!(ambiguities.len(), 1);
    let report = &ambiguities[0];
    assert_eq!(report.decision, 0);
    assert_eq!(report.rule_name, "s");
    assert_eq!(report.input_text, "x");
    assert!(!report.exact);
    assert_eq!(report.ambig_alts.iter().copied().collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn test_exact_mode_flags_exact_ambiguities() {
    let (mut interpreter, collector) = interpreter(
        &grammars::ambiguous(),
        &[(ID, "x")],
        PredictionMode::LlExactAmbigDetection,
    );
    interpreter.parse(0).expect("parse to finish");
    let ambiguities = collector.ambiguities();
    assert_eq!(ambiguities.len(), 1);
    assert!(ambiguities[0].exact);
}

#[test]
fn test_sll_mode_never_falls_back() {
    let (mut interpreter, collector) = interpreter(&grammars::ambiguous(), &[(ID, "x")], PredictionMode::Sll);
    let root = interpreter.parse(0).expect("parse to finish");
    assert_eq!(interpreter.to_string_tree(root), "(s (a x) <EOF>)");
    assert!(collector.ambiguities().is_empty());
    assert_eq!(interpreter.decision_info()[0].ll_fallbacks, 0);
}

#[test]
fn test_decision_statistics() {
    let (mut interpreter, _) = interpreter(&grammars::ambiguous(), &[(ID, "x")], PredictionMode::Ll);
    interpreter.parse(0).expect("parse to finish");
    let info = &interpreter.decision_info()[0];
    assert_eq!(info.decision, 0);
    assert_eq!(info.invocations, 1);
    assert_eq!(info.ll_fallbacks, 1);
    assert_eq!(info.ambiguities, 1);
    assert_eq!(info.errors, 0);
    assert!(info.sll_lookahead >= 1);
}

#[test]
fn test_decision_override_picks_other_interpretation() {
    let (mut interpreter, collector) = interpreter(&grammars::ambiguous(), &[(ID, "x")], PredictionMode::Ll);
    interpreter.add_decision_override(0, 0, 2);
    let root = interpreter.parse(0).expect("parse to finish");
    assert_eq!(interpreter.to_string_tree(root), "(s (b x) <EOF>)");
    // the overridden decision is never predicted
    assert!(collector.ambiguities().is_empty());
}

#[test]
fn test_dfa_is_built_lazily_and_shared() {
    let grammar = grammars::two_token_choice();
    let dfa = grammar.dfa_cache().dfa(0).expect("decision 0").clone();
    assert!(dfa.is_empty());

    let input = [(letters::A, "a"), (letters::C, "c")];
    let (mut first, _) = interpreter(&grammar, &input, PredictionMode::Ll);
    let root = first.parse(0).expect("parse to finish");
    assert_eq!(first.to_string_tree(root), "(s a c)");
    insta::assert_snapshot!(dfa.to_string_with(grammar.vocabulary()), @r"
    s0-'a'->s1
    s1-'c'->:s2=>2
    ");

    // a second parser of the same grammar reuses the warmed DFA
    let (mut second, _) = interpreter(&grammar, &input, PredictionMode::Ll);
    second.parse(0).expect("parse to finish");
    assert_eq!(dfa.len(), 3);

    grammar.clear_dfa();
    assert!(dfa.is_empty());
}

/// Accepts only the predicates listed in `accepted`, recording every evaluation.
struct Gate {
    accepted: Vec<usize>,
    calls: Rc<RefCell<Vec<usize>>>,
}

impl SemanticHooks for Gate {
    fn sempred(&mut self, _tree: &ParseTree, _ctx: Option<NodeId>, _rule_index: usize, pred_index: usize) -> bool {
        self.calls.borrow_mut().push(pred_index);
        self.accepted.contains(&pred_index)
    }
}

#[test]
fn test_predicates_choose_the_alternative() {
    for mode in [PredictionMode::Sll, PredictionMode::Ll] {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let (mut interpreter, collector) = interpreter(&grammars::predicated(), &[(ID, "x")], mode);
        interpreter.set_hooks(Box::new(Gate {
            accepted: vec![1],
            calls: Rc::clone(&calls),
        }));
        let root = interpreter.parse(0).expect("parse to finish");
        assert_eq!(interpreter.to_string_tree(root), "(s x <EOF>)");
        let rule = interpreter.tree().rule(root).expect("rule node");
        assert_eq!(rule.alt_number, 2);
        assert!(collector.messages().is_empty());
        // evaluated during prediction, then once more while walking the chosen alternative
        assert!(calls.borrow().contains(&0));
        assert_eq!(calls.borrow().last(), Some(&1));
    }
}
