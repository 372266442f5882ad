//! # allstar
//!
//! An interpreter runtime for adaptive LL(*) parsing.
//!
//! Layout
//!
//!     Grammars reach the runtime as an ATN (augmented transition network), either built in
//!     code through the [atn::factory::AtnFactory] or loaded from a serialized
//!     [atn::serialized::GrammarDescription]. Nothing is generated: the interpreters walk the
//!     ATN directly and consult the prediction simulators whenever a state has more than one
//!     way out.
//!
//!     src/
//!       ├── stream           Character and token streams, token sources
//!       ├── atn              States, transitions, LL(1) analysis, construction
//!       ├── simulator        Parser and lexer prediction (ALL(*) and longest match)
//!       ├── tree             Arena parse tree, walker, queries
//!       ├── interpreter      The ATN-walking parser
//!       ├── lexer            The ATN-walking lexer
//!       └── testing          Sample grammars and tree assertions
//!
//! Sharing
//!
//!     An [recognizer::Grammar] bundles the ATN, the grammar metadata and the DFA cache. The
//!     bundle is `Send + Sync` and is meant to be shared behind an `Arc` by every parse of the
//!     same grammar, so that the DFA warmed by one parse speeds up the next one. Parsers and
//!     lexers themselves are single-threaded and cheap to create.
//!
//! For testing conventions and the sample grammars, see the [testing module](testing).

pub mod atn;
pub mod config_set;
pub mod dfa;
pub mod error;
pub mod error_listener;
pub mod error_strategy;
pub mod interpreter;
pub mod interval_set;
pub mod lexer;
pub mod options;
pub mod parser;
pub mod prediction_context;
pub mod recognizer;
pub mod semantic_context;
pub mod simulator;
pub mod stream;
pub mod testing;
pub mod token;
pub mod tree;
pub mod vocabulary;

pub use error::{AtnError, DescriptionError, ParseError, RecognitionError};
pub use interpreter::ParserInterpreter;
pub use lexer::LexerInterpreter;
pub use options::ParserOptions;
pub use recognizer::{Grammar, GrammarInfo};
pub use simulator::PredictionMode;
pub use token::Token;
pub use tree::{NodeId, ParseTree};
