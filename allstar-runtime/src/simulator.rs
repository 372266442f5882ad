//! Prediction simulators
//!
//!     The simulators decide which way to go at a decision by running the ATN ahead of the
//!     recognizer on the real input, caching what they learn in the grammar's DFAs.
//!
//!         - [ParserAtnSimulator]: ALL(*) prediction. SLL first (call stacks merged, cheap,
//!           cached), full LL with the real call stack only when SLL hits a conflict it
//!           cannot settle.
//!         - [LexerAtnSimulator]: longest match, then earliest rule, for one token at a time.
//!
//!     [PredictionMode] selects how hard the parser simulator works to settle conflicts, and
//!     holds the conflict analysis both prediction stages share.

pub mod lexer;
pub mod mode;
pub mod parser;

pub use lexer::LexerAtnSimulator;
pub use mode::PredictionMode;
pub use parser::{DecisionInfo, ParserAtnSimulator, PredictionHost};
