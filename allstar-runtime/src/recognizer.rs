//! Grammars and host hooks
//!
//!     A [Grammar] is everything recognizers of one grammar share: the ATN, the names used in
//!     messages and trees, and the DFA cache that prediction fills in as it goes. Cloning a
//!     grammar is cheap and every clone shares the same cache, so a grammar loaded once can
//!     serve any number of parses, on any number of threads.
//!
//!     The runtime interprets the ATN but cannot run grammar code. Predicates and actions are
//!     delegated to the host through [SemanticHooks] (parsers) and [LexerHooks] (lexers);
//!     the defaults accept every predicate and ignore every action.

use crate::atn::Atn;
use crate::dfa::DfaCache;
use crate::interpreter::ParserInterpreter;
use crate::lexer::LexerInterpreter;
use crate::stream::{InputStream, TokenStream};
use crate::tree::{NodeId, ParseTree};
use crate::vocabulary::Vocabulary;
use std::sync::Arc;

/// Names attached to a grammar, used only for messages and rendering.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GrammarInfo {
    pub grammar_name: String,
    pub rule_names: Vec<String>,
    pub vocabulary: Vocabulary,
    pub channel_names: Vec<String>,
    pub mode_names: Vec<String>,
}

impl GrammarInfo {
    pub fn rule_name(&self, rule_index: usize) -> String {
        self.rule_names
            .get(rule_index)
            .cloned()
            .unwrap_or_else(|| format!("<rule {}>", rule_index))
    }
}

#[derive(Debug, Clone)]
pub struct Grammar {
    atn: Arc<Atn>,
    info: Arc<GrammarInfo>,
    dfa: Arc<DfaCache>,
}

impl Grammar {
    pub fn new(atn: Atn, info: GrammarInfo) -> Self {
        let dfa = Arc::new(DfaCache::new(&atn));
        Grammar {
            atn: Arc::new(atn),
            info: Arc::new(info),
            dfa,
        }
    }

    pub fn atn(&self) -> &Atn {
        &self.atn
    }

    pub fn shared_atn(&self) -> Arc<Atn> {
        Arc::clone(&self.atn)
    }

    pub fn info(&self) -> &GrammarInfo {
        &self.info
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.info.vocabulary
    }

    pub fn rule_names(&self) -> &[String] {
        &self.info.rule_names
    }

    pub fn rule_index(&self, name: &str) -> Option<usize> {
        self.info.rule_names.iter().position(|r| r == name)
    }

    pub fn dfa_cache(&self) -> &Arc<DfaCache> {
        &self.dfa
    }

    /// Drops every cached prediction.
    pub fn clear_dfa(&self) {
        self.dfa.clear();
    }

    pub fn parser(&self, input: impl TokenStream + 'static) -> ParserInterpreter {
        ParserInterpreter::new(self.clone(), Box::new(input))
    }

    pub fn lexer(&self, input: InputStream) -> LexerInterpreter {
        LexerInterpreter::new(self.clone(), input)
    }
}

/// Grammar code of a parser, supplied by the host.
pub trait SemanticHooks {
    /// Predicate `pred_index` of rule `rule_index`. `ctx` is `None` when prediction evaluates
    /// a context-independent predicate.
    fn sempred(&mut self, _tree: &ParseTree, _ctx: Option<NodeId>, _rule_index: usize, _pred_index: usize) -> bool {
        true
    }

    fn action(&mut self, _tree: &ParseTree, _ctx: Option<NodeId>, _rule_index: usize, _action_index: usize) {}
}

/// Accepts every predicate, ignores every action.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl SemanticHooks for AcceptAll {}

/// Grammar code of a lexer. `text` is the token text matched so far.
pub trait LexerHooks {
    fn sempred(&mut self, _text: &str, _rule_index: usize, _pred_index: usize) -> bool {
        true
    }

    fn action(&mut self, _text: &str, _rule_index: usize, _action_index: usize) {}
}

impl LexerHooks for AcceptAll {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::grammars;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_grammar_is_shareable() {
        assert_send_sync::<Grammar>();
    }

    #[test]
    fn test_clones_share_the_dfa_cache() {
        let grammar = grammars::expression();
        let clone = grammar.clone();
        assert!(Arc::ptr_eq(grammar.dfa_cache(), clone.dfa_cache()));
        assert_eq!(grammar.rule_index("e"), Some(grammars::expr::RULE_E));
        assert_eq!(grammar.info().rule_name(99), "<rule 99>");
    }
}
