//! Error listeners
//!
//!     Every report a recognizer makes goes through one funnel, [ErrorListeners], which
//!     hands it to each registered listener in order. Syntax errors are reported by the
//!     error strategy (parser) or the lexer; ambiguity, full-context and context-sensitivity
//!     reports come from the prediction simulator and are informational only.
//!
//!     Reports carry resolved names and text so listeners need no access to the recognizer.

use crate::config_set::{AltSet, AtnConfigSet};
use crate::error::RecognitionError;
use crate::token::Token;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct SyntaxError {
    pub source_name: String,
    /// `None` for lexer errors, which have no token yet.
    pub offending_token: Option<Token>,
    pub line: usize,
    pub column: usize,
    pub message: String,
    pub error: Option<RecognitionError>,
}

#[derive(Debug, Clone)]
pub struct AmbiguityReport {
    pub decision: usize,
    pub rule_name: String,
    pub start_index: usize,
    pub stop_index: usize,
    /// Tokens `start_index..=stop_index`.
    pub input_text: String,
    /// The ambiguity is certain, not just an SLL-style guess.
    pub exact: bool,
    pub ambig_alts: AltSet,
    pub configs: Arc<AtnConfigSet>,
}

#[derive(Debug, Clone)]
pub struct FullContextReport {
    pub decision: usize,
    pub rule_name: String,
    pub start_index: usize,
    pub stop_index: usize,
    pub input_text: String,
    pub conflicting_alts: Option<AltSet>,
    pub configs: Arc<AtnConfigSet>,
}

/// Full LL settled a decision SLL found in conflict: the grammar is context sensitive here.
#[derive(Debug, Clone)]
pub struct ContextSensitivityReport {
    pub decision: usize,
    pub rule_name: String,
    pub start_index: usize,
    pub stop_index: usize,
    pub input_text: String,
    pub prediction: usize,
    pub configs: Arc<AtnConfigSet>,
}

pub trait ErrorListener {
    fn syntax_error(&mut self, _error: &SyntaxError) {}

    fn report_ambiguity(&mut self, _report: &AmbiguityReport) {}

    fn report_attempting_full_context(&mut self, _report: &FullContextReport) {}

    fn report_context_sensitivity(&mut self, _report: &ContextSensitivityReport) {}
}

/// Prints syntax errors to stderr as `line L:C message`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleErrorListener;

impl ErrorListener for ConsoleErrorListener {
    fn syntax_error(&mut self, error: &SyntaxError) {
        eprintln!("line {}:{} {}", error.line, error.column, error.message);
    }
}

/// Which prediction events the diagnostic listener reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DiagnosticOptions {
    /// Skip ambiguities that full LL only guessed.
    pub exact_ambiguity_only: bool,
    pub report_context_sensitivity: bool,
    pub report_full_context: bool,
}

impl Default for DiagnosticOptions {
    fn default() -> Self {
        DiagnosticOptions {
            exact_ambiguity_only: true,
            report_context_sensitivity: true,
            report_full_context: false,
        }
    }
}

/// Turns prediction events into readable diagnostics. Diagnostics are not syntax errors:
/// they are kept (and optionally echoed to stderr) but never counted.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticErrorListener {
    options: DiagnosticOptions,
    echo: bool,
    messages: Rc<RefCell<Vec<String>>>,
}

impl DiagnosticErrorListener {
    pub fn new(options: DiagnosticOptions) -> Self {
        DiagnosticErrorListener {
            options,
            echo: false,
            messages: Rc::default(),
        }
    }

    /// Also print every diagnostic to stderr.
    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }

    /// Diagnostics so far; clones of the listener share them.
    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    fn emit(&self, message: String) {
        if self.echo {
            eprintln!("{}", message);
        }
        log::debug!("{}", message);
        self.messages.borrow_mut().push(message);
    }
}

fn describe_decision(decision: usize, rule_name: &str) -> String {
    if rule_name.is_empty() {
        decision.to_string()
    } else {
        format!("{} ({})", decision, rule_name)
    }
}

pub(crate) fn format_alts(alts: &AltSet) -> String {
    let parts: Vec<String> = alts.iter().map(|a| a.to_string()).collect();
    format!("{{{}}}", parts.join(", "))
}

impl ErrorListener for DiagnosticErrorListener {
    fn report_ambiguity(&mut self, report: &AmbiguityReport) {
        if self.options.exact_ambiguity_only && !report.exact {
            return;
        }
        self.emit(format!(
            "reportAmbiguity d={}: ambigAlts={}, input='{}'",
            describe_decision(report.decision, &report.rule_name),
            format_alts(&report.ambig_alts),
            report.input_text
        ));
    }

    fn report_attempting_full_context(&mut self, report: &FullContextReport) {
        if !self.options.report_full_context {
            return;
        }
        self.emit(format!(
            "reportAttemptingFullContext d={}, input='{}'",
            describe_decision(report.decision, &report.rule_name),
            report.input_text
        ));
    }

    fn report_context_sensitivity(&mut self, report: &ContextSensitivityReport) {
        if !self.options.report_context_sensitivity {
            return;
        }
        self.emit(format!(
            "reportContextSensitivity d={}, input='{}'",
            describe_decision(report.decision, &report.rule_name),
            report.input_text
        ));
    }
}

/// Anything a listener can be told.
#[derive(Debug, Clone)]
pub enum Diagnostic {
    Syntax(SyntaxError),
    Ambiguity(AmbiguityReport),
    AttemptingFullContext(FullContextReport),
    ContextSensitivity(ContextSensitivityReport),
}

/// Records every report. Clones share the record, so a clone can be handed to a parser
/// and this one inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct CollectingErrorListener {
    reports: Rc<RefCell<Vec<Diagnostic>>>,
}

impl CollectingErrorListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reports(&self) -> Vec<Diagnostic> {
        self.reports.borrow().clone()
    }

    pub fn syntax_errors(&self) -> Vec<SyntaxError> {
        self.reports
            .borrow()
            .iter()
            .filter_map(|r| match r {
                Diagnostic::Syntax(error) => Some(error.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn ambiguities(&self) -> Vec<AmbiguityReport> {
        self.reports
            .borrow()
            .iter()
            .filter_map(|r| match r {
                Diagnostic::Ambiguity(report) => Some(report.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn messages(&self) -> Vec<String> {
        self.syntax_errors()
            .into_iter()
            .map(|e| format!("line {}:{} {}", e.line, e.column, e.message))
            .collect()
    }
}

impl ErrorListener for CollectingErrorListener {
    fn syntax_error(&mut self, error: &SyntaxError) {
        self.reports.borrow_mut().push(Diagnostic::Syntax(error.clone()));
    }

    fn report_ambiguity(&mut self, report: &AmbiguityReport) {
        self.reports.borrow_mut().push(Diagnostic::Ambiguity(report.clone()));
    }

    fn report_attempting_full_context(&mut self, report: &FullContextReport) {
        self.reports
            .borrow_mut()
            .push(Diagnostic::AttemptingFullContext(report.clone()));
    }

    fn report_context_sensitivity(&mut self, report: &ContextSensitivityReport) {
        self.reports
            .borrow_mut()
            .push(Diagnostic::ContextSensitivity(report.clone()));
    }
}

/// The dispatch funnel. Starts with a [ConsoleErrorListener].
pub struct ErrorListeners {
    listeners: Vec<Box<dyn ErrorListener>>,
}

impl Default for ErrorListeners {
    fn default() -> Self {
        ErrorListeners {
            listeners: vec![Box::new(ConsoleErrorListener)],
        }
    }
}

impl std::fmt::Debug for ErrorListeners {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ErrorListeners({})", self.listeners.len())
    }
}

impl ErrorListeners {
    pub fn empty() -> Self {
        ErrorListeners { listeners: Vec::new() }
    }

    pub fn add(&mut self, listener: Box<dyn ErrorListener>) {
        self.listeners.push(listener);
    }

    pub fn remove_all(&mut self) {
        self.listeners.clear();
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    pub fn syntax_error(&mut self, error: &SyntaxError) {
        for listener in &mut self.listeners {
            listener.syntax_error(error);
        }
    }

    pub fn report_ambiguity(&mut self, report: &AmbiguityReport) {
        for listener in &mut self.listeners {
            listener.report_ambiguity(report);
        }
    }

    pub fn report_attempting_full_context(&mut self, report: &FullContextReport) {
        for listener in &mut self.listeners {
            listener.report_attempting_full_context(report);
        }
    }

    pub fn report_context_sensitivity(&mut self, report: &ContextSensitivityReport) {
        for listener in &mut self.listeners {
            listener.report_context_sensitivity(report);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ambiguity(exact: bool) -> AmbiguityReport {
        AmbiguityReport {
            decision: 0,
            rule_name: "s".to_string(),
            start_index: 0,
            stop_index: 0,
            input_text: "x".to_string(),
            exact,
            ambig_alts: [1, 2].into_iter().collect(),
            configs: Arc::new(AtnConfigSet::new(true)),
        }
    }

    #[test]
    fn test_diagnostic_listener_filters_inexact_ambiguities() {
        let listener = DiagnosticErrorListener::new(DiagnosticOptions::default());
        let mut listeners = ErrorListeners::empty();
        listeners.add(Box::new(listener.clone()));
        listeners.report_ambiguity(&ambiguity(false));
        assert!(listener.messages().is_empty());
        listeners.report_ambiguity(&ambiguity(true));
        assert_eq!(
            listener.messages(),
            vec!["reportAmbiguity d=0 (s): ambigAlts={1, 2}, input='x'".to_string()]
        );
    }

    #[test]
    fn test_collecting_listener_shares_storage() {
        let collector = CollectingErrorListener::new();
        let mut listeners = ErrorListeners::empty();
        listeners.add(Box::new(collector.clone()));
        listeners.syntax_error(&SyntaxError {
            source_name: "test".to_string(),
            offending_token: None,
            line: 1,
            column: 4,
            message: "token recognition error at: '?'".to_string(),
            error: None,
        });
        assert_eq!(collector.messages(), vec!["line 1:4 token recognition error at: '?'".to_string()]);
    }
}
