//! The lex-then-parse pipeline behind the command line
//!
//! Everything that can fail before parsing starts (configuration, grammar, input) is a
//! [RigError]. Syntax errors are not: they are reported on stderr by the recognizers'
//! listeners and counted in the [Outcome].

use allstar_config::{AllstarConfig, ConfigError, Loader};
use allstar_runtime::atn::serialized::GrammarDescription;
use allstar_runtime::atn::GrammarType;
use allstar_runtime::error_listener::DiagnosticErrorListener;
use allstar_runtime::stream::{CommonTokenStream, InputStream, ListTokenSource, TokenSource};
use allstar_runtime::{DescriptionError, Grammar, ParseError, PredictionMode, Token};
use std::fmt;
use std::fs;

#[derive(Debug, Clone, Default)]
pub struct RunRequest {
    pub grammar: String,
    pub input: String,
    pub start_rule: Option<String>,
    pub config_file: Option<String>,
    pub overrides: Vec<String>,
    pub show_tokens: bool,
    pub show_tree: bool,
    pub trace: bool,
    pub sll: bool,
    pub diagnostics: bool,
}

#[derive(Debug, Default)]
pub struct Outcome {
    pub stdout: String,
    /// Lexer and parser errors together.
    pub syntax_errors: usize,
}

#[derive(Debug)]
pub enum RigError {
    Config(ConfigError),
    Grammar(DescriptionError),
    Input(String, std::io::Error),
    MissingLexer(String),
    Parse(ParseError),
    Output(serde_json::Error),
}

impl fmt::Display for RigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RigError::Config(err) => write!(f, "configuration: {}", err),
            RigError::Grammar(err) => write!(f, "grammar: {}", err),
            RigError::Input(path, err) => write!(f, "cannot read {}: {}", path, err),
            RigError::MissingLexer(name) => {
                write!(f, "grammar '{}' embeds no lexer description", name)
            }
            RigError::Parse(err) => write!(f, "{}", err),
            RigError::Output(err) => write!(f, "cannot render tokens: {}", err),
        }
    }
}

impl std::error::Error for RigError {}

impl From<ConfigError> for RigError {
    fn from(err: ConfigError) -> Self {
        RigError::Config(err)
    }
}

impl From<DescriptionError> for RigError {
    fn from(err: DescriptionError) -> Self {
        RigError::Grammar(err)
    }
}

impl From<serde_json::Error> for RigError {
    fn from(err: serde_json::Error) -> Self {
        RigError::Output(err)
    }
}

fn load_config(request: &RunRequest) -> Result<AllstarConfig, RigError> {
    let mut loader = Loader::new();
    if let Some(path) = &request.config_file {
        loader = loader.with_file(path);
    }
    for assignment in &request.overrides {
        loader = loader.set_assignment(assignment)?;
    }
    let mut config = loader.build()?;
    if request.trace {
        config.parser.trace = true;
    }
    if request.sll {
        config.parser.prediction_mode = PredictionMode::Sll;
    } else if request.diagnostics {
        config.parser.prediction_mode = PredictionMode::LlExactAmbigDetection;
    }
    Ok(config)
}

/// The parser grammar and the lexer feeding it. A lexer-only description yields no parser.
fn load_grammars(path: &str) -> Result<(Option<Grammar>, Grammar), RigError> {
    let description = GrammarDescription::from_path(path)?;
    if description.grammar_type == GrammarType::Lexer {
        return Ok((None, description.build()?));
    }
    let lexer = description
        .build_lexer()?
        .ok_or_else(|| RigError::MissingLexer(description.grammar_name.clone()))?;
    Ok((Some(description.build()?), lexer))
}

fn lex(lexer_grammar: &Grammar, source: &str, config: &AllstarConfig, outcome: &mut Outcome) -> Vec<Token> {
    let mut lexer = lexer_grammar.lexer(InputStream::new(source));
    let tokens = lexer.all_tokens();
    outcome.syntax_errors += lexer.syntax_error_count();
    if config.lexer.dump_dfa {
        if let Some(dfa) = lexer.dfa_string(0) {
            outcome.stdout.push_str(&dfa);
        }
    }
    log::debug!("lexed {} tokens", tokens.len());
    tokens
}

pub fn run(request: &RunRequest) -> Result<Outcome, RigError> {
    let config = load_config(request)?;
    let (parser_grammar, lexer_grammar) = load_grammars(&request.grammar)?;
    let source = fs::read_to_string(&request.input).map_err(|e| RigError::Input(request.input.clone(), e))?;

    let mut outcome = Outcome::default();
    let tokens = lex(&lexer_grammar, &source, &config, &mut outcome);
    if request.show_tokens {
        outcome.stdout.push_str(&serde_json::to_string_pretty(&tokens)?);
        outcome.stdout.push('\n');
    }

    let Some(grammar) = parser_grammar else {
        return Ok(outcome);
    };
    let start_rule = match &request.start_rule {
        Some(name) => grammar
            .rule_index(name)
            .ok_or_else(|| RigError::Grammar(DescriptionError::UnknownRule(name.clone())))?,
        None => 0,
    };

    let source_tokens = ListTokenSource::new(tokens).with_name(request.input.clone());
    let stream = CommonTokenStream::with_channel(source_tokens, config.lexer.channel);
    let mut interpreter = grammar.parser(stream).with_options(config.parser.clone());
    let diagnostics = DiagnosticErrorListener::new(config.diagnostics).with_echo(true);
    if request.diagnostics {
        interpreter.add_error_listener(Box::new(diagnostics.clone()));
    }

    match interpreter.parse(start_rule) {
        Ok(root) => {
            if request.show_tree {
                outcome.stdout.push_str(&interpreter.to_string_tree(root));
                outcome.stdout.push('\n');
            }
        }
        Err(ParseError::Cancelled(error)) => {
            eprintln!("{}", ParseError::Cancelled(error));
            outcome.syntax_errors += 1;
        }
        Err(error) => return Err(RigError::Parse(error)),
    }
    outcome.syntax_errors += interpreter.number_of_syntax_errors();
    log::debug!(
        "parse finished: {} syntax errors, {} diagnostics",
        outcome.syntax_errors,
        diagnostics.messages().len()
    );
    Ok(outcome)
}
