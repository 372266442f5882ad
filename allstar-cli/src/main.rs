//! Command-line test rig for allstar grammars
//! Loads a serialized grammar description, lexes and parses an input file, and prints what
//! the runtime saw.
//!
//! Usage:
//!   allstar `<grammar>` `<input>` [--start-rule `<name>`] [--tokens] [--tree] [--trace]
//!           [--sll] [--diagnostics] [--config `<file>`] [--set `<key=value>`]...
//!
//! The grammar is a JSON or YAML description whose lexer is embedded under `lexer`. Syntax
//! errors go to stderr; the exit code is 1 when any was reported and 2 when the rig itself
//! could not run.

mod rig;

use clap::{Arg, ArgAction, Command};
use rig::RunRequest;

fn main() {
    let matches = Command::new("allstar")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Lex and parse input with an interpreted ATN grammar")
        .arg_required_else_help(true)
        .arg(
            Arg::new("grammar")
                .help("Path to the grammar description (.json, .yaml)")
                .required(true)
                .index(1),
        )
        .arg(
            Arg::new("input")
                .help("Path to the input to parse")
                .required(true)
                .index(2),
        )
        .arg(
            Arg::new("start-rule")
                .long("start-rule")
                .short('r')
                .help("Rule to start parsing from (default: the first rule)"),
        )
        .arg(
            Arg::new("tokens")
                .long("tokens")
                .help("Print the lexed tokens as JSON")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("tree")
                .long("tree")
                .help("Print the parse tree in LISP form")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("trace")
                .long("trace")
                .help("Log every state the parser visits")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("sll")
                .long("sll")
                .help("Use SLL prediction only")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("diagnostics")
                .long("diagnostics")
                .help("Report ambiguities and context sensitivities")
                .action(ArgAction::SetTrue),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Configuration file layered over the defaults"),
        )
        .arg(
            Arg::new("set")
                .long("set")
                .help("Override a configuration key (e.g. parser.max-rule-depth=200)")
                .action(ArgAction::Append),
        )
        .get_matches();

    let trace = matches.get_flag("trace");
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(if trace { "trace" } else { "warn" }))
        .format_timestamp(None)
        .init();

    let request = RunRequest {
        grammar: matches.get_one::<String>("grammar").cloned().unwrap_or_default(),
        input: matches.get_one::<String>("input").cloned().unwrap_or_default(),
        start_rule: matches.get_one::<String>("start-rule").cloned(),
        config_file: matches.get_one::<String>("config").cloned(),
        overrides: matches
            .get_many::<String>("set")
            .map(|values| values.cloned().collect())
            .unwrap_or_default(),
        show_tokens: matches.get_flag("tokens"),
        show_tree: matches.get_flag("tree"),
        trace,
        sll: matches.get_flag("sll"),
        diagnostics: matches.get_flag("diagnostics"),
    };

    match rig::run(&request) {
        Ok(outcome) => {
            print!("{}", outcome.stdout);
            if outcome.syntax_errors > 0 {
                std::process::exit(1);
            }
        }
        Err(error) => {
            eprintln!("Error: {}", error);
            std::process::exit(2);
        }
    }
}
