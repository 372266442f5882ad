use allstar_runtime::atn::serialized::GrammarDescription;
use allstar_runtime::testing::grammars;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes the expression grammar (with its lexer embedded) and `input` into a temp dir.
fn fixture(input: &str, yaml: bool) -> (TempDir, PathBuf, PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let description = GrammarDescription::describe(&grammars::expression())
        .with_lexer(GrammarDescription::describe(&grammars::expression_lexer()));
    let (name, text) = if yaml {
        ("expr.yaml", description.to_yaml().expect("yaml"))
    } else {
        ("expr.json", description.to_json().expect("json"))
    };
    let grammar = dir.path().join(name);
    fs::write(&grammar, text).expect("write grammar");
    let source = dir.path().join("input.txt");
    fs::write(&source, input).expect("write input");
    (dir, grammar, source)
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).expect("write file");
    path
}

#[test]
fn prints_tree_for_valid_input() {
    let (_dir, grammar, input) = fixture("1 + 2 * 3\n", false);
    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(&grammar).arg(&input).arg("--tree");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("(s (e (e 1) + (e (e 2) * (e 3))) <EOF>)"));
}

#[test]
fn reads_yaml_grammars() {
    let (_dir, grammar, input) = fixture("(x)", true);
    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(&grammar).arg(&input).arg("--tree");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("(s (e ( (e x) )) <EOF>)"));
}

#[test]
fn syntax_errors_go_to_stderr_and_fail() {
    let (_dir, grammar, input) = fixture("(1", false);
    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(&grammar).arg(&input).arg("--tree");
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("missing ')' at '<EOF>'"))
        .stdout(predicate::str::contains("<missing ')'>"));
}

#[test]
fn lexer_errors_also_fail() {
    let (_dir, grammar, input) = fixture("1 ? 2", false);
    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(&grammar).arg(&input);
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("token recognition error at: '?'"));
}

#[test]
fn prints_tokens_as_json() {
    let (_dir, grammar, input) = fixture("12", false);
    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(&grammar).arg(&input).arg("--tokens");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("\"token_type\": 1").and(predicate::str::contains("\"text\": \"12\"")));
}

#[test]
fn start_rule_can_be_chosen() {
    let (_dir, grammar, input) = fixture("a*b", false);
    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(&grammar).arg(&input).args(["--start-rule", "e", "--tree", "--sll"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("(e (e a) * (e b))"));
}

#[test]
fn unknown_start_rule_is_a_usage_error() {
    let (_dir, grammar, input) = fixture("1", false);
    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(&grammar).arg(&input).args(["--start-rule", "nope"]);
    cmd.assert().code(2).stderr(predicate::str::contains("unknown rule 'nope'"));
}

#[test]
fn config_overrides_apply() {
    let (dir, grammar, input) = fixture("((((1))))", false);
    let config = write(dir.path(), "allstar.toml", "[parser]\nmax-rule-depth = 3\n");
    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(&grammar).arg(&input).arg("--config").arg(&config);
    cmd.assert().code(2).stderr(predicate::str::contains("exceeded the limit"));

    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(&grammar)
        .arg(&input)
        .arg("--config")
        .arg(&config)
        .args(["--set", "parser.max-rule-depth=100"]);
    cmd.assert().success();
}

#[test]
fn bail_strategy_stops_at_first_error() {
    let (_dir, grammar, input) = fixture("1 + + 2", false);
    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(&grammar)
        .arg(&input)
        .args(["--set", "parser.error-strategy=bail", "--tree"]);
    cmd.assert()
        .code(1)
        .stderr(predicate::str::contains("parse cancelled"))
        .stdout(predicate::str::is_empty());
}

#[test]
fn missing_grammar_file() {
    let dir = tempfile::tempdir().expect("temp dir");
    let input = write(dir.path(), "input.txt", "1");
    let mut cmd = cargo_bin_cmd!("allstar");
    cmd.arg(dir.path().join("absent.json")).arg(&input);
    cmd.assert().code(2).stderr(predicate::str::contains("grammar: IO error"));
}
