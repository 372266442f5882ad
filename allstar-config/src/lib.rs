//! Shared configuration loader for the allstar toolchain.
//!
//! `defaults/allstar.default.toml` is embedded into every binary so that docs and
//! runtime behavior stay in sync. Applications layer user-specific files on top
//! of those defaults via [`Loader`] before deserializing into [`AllstarConfig`].
//!
//! Keys are kebab-case, matching the serde names of the runtime's option types:
//!
//! ```toml
//! [parser]
//! prediction-mode = "sll"
//! ```

use allstar_runtime::error_listener::DiagnosticOptions;
use allstar_runtime::options::ParserOptions;
use config::builder::DefaultState;
use config::{Config, ConfigBuilder, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;

pub use config::ConfigError;

const DEFAULT_TOML: &str = include_str!("../defaults/allstar.default.toml");

/// Top-level configuration consumed by allstar applications.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AllstarConfig {
    /// Handed as-is to every parser interpreter.
    pub parser: ParserOptions,
    /// Which prediction events `--diagnostics` reports.
    pub diagnostics: DiagnosticOptions,
    pub lexer: LexerConfig,
}

/// How lexed tokens reach the parser.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct LexerConfig {
    /// The token channel the parser reads.
    pub channel: usize,
    /// Print the lexer DFA of the default mode after lexing.
    pub dump_dfa: bool,
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref()).format(FileFormat::Toml).required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref()).format(FileFormat::Toml).required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Apply a `key=value` assignment as given on a command line.
    pub fn set_assignment(self, assignment: &str) -> Result<Self, ConfigError> {
        let Some((key, value)) = assignment.split_once('=') else {
            return Err(ConfigError::Message(format!(
                "expected key=value, got '{}'",
                assignment
            )));
        };
        self.set_override(key.trim(), value.trim())
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<AllstarConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<AllstarConfig, ConfigError> {
    Loader::new().build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use allstar_runtime::options::ErrorStrategyKind;
    use allstar_runtime::PredictionMode;
    use std::io::Write;

    #[test]
    fn loads_default_config() {
        let config = load_defaults().expect("defaults to deserialize");
        assert_eq!(config.parser, ParserOptions::default());
        assert_eq!(config.diagnostics, DiagnosticOptions::default());
        assert_eq!(config.lexer.channel, 0);
        assert!(!config.lexer.dump_dfa);
    }

    #[test]
    fn supports_overrides() {
        let config = Loader::new()
            .set_override("parser.prediction-mode", "sll")
            .expect("override to apply")
            .set_assignment("parser.error-strategy=bail")
            .expect("assignment to apply")
            .build()
            .expect("config to build");
        assert_eq!(config.parser.prediction_mode, PredictionMode::Sll);
        assert_eq!(config.parser.error_strategy, ErrorStrategyKind::Bail);
    }

    #[test]
    fn string_overrides_convert_to_numbers_and_flags() {
        let config = Loader::new()
            .set_assignment("parser.max-rule-depth=50")
            .and_then(|l| l.set_assignment("diagnostics.report-full-context = true"))
            .expect("assignments to apply")
            .build()
            .expect("config to build");
        assert_eq!(config.parser.max_rule_depth, 50);
        assert!(config.diagnostics.report_full_context);
    }

    #[test]
    fn rejects_assignment_without_equals() {
        assert!(Loader::new().set_assignment("parser.trace").is_err());
    }

    #[test]
    fn layers_user_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().expect("temp file");
        writeln!(file, "[parser]\nprediction-mode = \"ll-exact-ambig\"\n\n[lexer]\nchannel = 1").expect("write");
        let config = Loader::new().with_file(file.path()).build().expect("config to build");
        assert_eq!(config.parser.prediction_mode, PredictionMode::LlExactAmbigDetection);
        assert_eq!(config.lexer.channel, 1);
        assert!(config.parser.build_parse_trees);
    }

    #[test]
    fn missing_required_file_is_an_error() {
        assert!(Loader::new().with_file("/nonexistent/allstar.toml").build().is_err());
    }
}
