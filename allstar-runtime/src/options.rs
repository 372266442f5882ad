//! Parser options
//!
//!     Plain values handed to a parser when it is created. Every field has a default, so a
//!     partial TOML or JSON table deserializes into a complete set.

use crate::simulator::PredictionMode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorStrategyKind {
    /// Report, repair and keep going.
    #[default]
    Default,
    /// Cancel the parse at the first syntax error.
    Bail,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ParserOptions {
    pub prediction_mode: PredictionMode,
    /// Without trees, rule contexts are still created (prediction needs the call stack)
    /// but tokens are not attached.
    pub build_parse_trees: bool,
    /// Shrink child lists once a rule is done.
    pub trim_parse_trees: bool,
    /// Log every state the interpreter visits at `trace` level.
    pub trace: bool,
    /// Nesting limit for rule invocations; exceeding it ends the parse with an error.
    pub max_rule_depth: usize,
    pub error_strategy: ErrorStrategyKind,
}

impl Default for ParserOptions {
    fn default() -> Self {
        ParserOptions {
            prediction_mode: PredictionMode::Ll,
            build_parse_trees: true,
            trim_parse_trees: false,
            trace: false,
            max_rule_depth: 1000,
            error_strategy: ErrorStrategyKind::Default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_table_keeps_defaults() {
        let options: ParserOptions = serde_json::from_str(r#"{"prediction-mode": "sll", "max-rule-depth": 50}"#).unwrap();
        assert_eq!(options.prediction_mode, PredictionMode::Sll);
        assert_eq!(options.max_rule_depth, 50);
        assert!(options.build_parse_trees);
        assert_eq!(options.error_strategy, ErrorStrategyKind::Default);
    }
}
