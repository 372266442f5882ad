//! ATN configurations
//!
//!     A configuration is one thread of the prediction simulation: an ATN state, the
//!     alternative it was started for, its simulated call stack and the predicates it crossed.
//!     A configuration set collects the threads alive at one input position.
//!
//!     Parser sets treat `(state, alt, semantic context)` as the identity of a thread and merge
//!     the call stacks of duplicates, which is what keeps closures small. Lexer sets are
//!     ordered: the first thread to reach a state wins (rule priority), so duplicates are
//!     dropped instead of merged.

use crate::atn::{Atn, LexerActionExecutor};
use crate::prediction_context::{ContextId, MergeCache, PredictionContextCache};
use crate::semantic_context::SemanticContext;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// A set of alternative numbers, iterated in ascending order.
pub type AltSet = BTreeSet<usize>;

/// Alternative numbers are 1-based; 0 means "none".
pub const INVALID_ALT_NUMBER: usize = 0;

#[derive(Debug, Clone)]
pub struct AtnConfig {
    pub state: usize,
    pub alt: usize,
    pub context: ContextId,
    pub semantic_context: SemanticContext,
    /// How many rule stops this configuration fell off without context to return to.
    pub reaches_into_outer_context: usize,
    /// Set when the configuration returned out of the precedence-0 invocation of the
    /// decision's own left-recursive rule; the precedence filter must keep it.
    pub precedence_filter_suppressed: bool,
    pub lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    pub passed_through_non_greedy: bool,
}

impl AtnConfig {
    pub fn new(state: usize, alt: usize, context: ContextId) -> Self {
        AtnConfig {
            state,
            alt,
            context,
            semantic_context: SemanticContext::None,
            reaches_into_outer_context: 0,
            precedence_filter_suppressed: false,
            lexer_action_executor: None,
            passed_through_non_greedy: false,
        }
    }

    /// The same thread moved to `state`.
    pub fn moved_to(&self, state: usize) -> Self {
        AtnConfig {
            state,
            ..self.clone()
        }
    }

    pub fn with_context(mut self, context: ContextId) -> Self {
        self.context = context;
        self
    }

    pub fn with_semantic_context(mut self, semantic_context: SemanticContext) -> Self {
        self.semantic_context = semantic_context;
        self
    }
}

impl PartialEq for AtnConfig {
    fn eq(&self, other: &Self) -> bool {
        self.state == other.state
            && self.alt == other.alt
            && self.context == other.context
            && self.semantic_context == other.semantic_context
            && self.precedence_filter_suppressed == other.precedence_filter_suppressed
            && self.passed_through_non_greedy == other.passed_through_non_greedy
            && self.lexer_action_executor == other.lexer_action_executor
    }
}

impl Eq for AtnConfig {}

impl Hash for AtnConfig {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.state.hash(state);
        self.alt.hash(state);
        self.context.hash(state);
        self.semantic_context.hash(state);
    }
}

impl fmt::Display for AtnConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},ctx#{}", self.state, self.alt, self.context.index())?;
        if !self.semantic_context.is_none() {
            write!(f, ",{}", self.semantic_context)?;
        }
        if self.reaches_into_outer_context > 0 {
            write!(f, ",up={}", self.reaches_into_outer_context)?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConfigKey {
    Merged {
        state: usize,
        alt: usize,
        semantic_context: SemanticContext,
    },
    Exact(AtnConfig),
}

#[derive(Debug, Clone, Default)]
pub struct AtnConfigSet {
    configs: Vec<AtnConfig>,
    lookup: HashMap<ConfigKey, usize>,
    /// Built during full-context prediction: contexts are exact, `$` is not a wildcard.
    pub full_ctx: bool,
    ordered: bool,
    /// The single alternative predicted by this set, or [INVALID_ALT_NUMBER].
    pub unique_alt: usize,
    /// Alternatives in conflict when SLL prediction stopped on this set.
    pub conflicting_alts: Option<AltSet>,
    pub has_semantic_context: bool,
    pub dips_into_outer_context: bool,
}

impl AtnConfigSet {
    pub fn new(full_ctx: bool) -> Self {
        AtnConfigSet {
            full_ctx,
            ..Default::default()
        }
    }

    /// A lexer set: insertion order is priority and duplicates are dropped.
    pub fn ordered() -> Self {
        AtnConfigSet {
            ordered: true,
            ..Default::default()
        }
    }

    /// Adds `config`, merging its call stack into an existing thread with the same
    /// identity. Returns true if the set grew.
    pub fn add(&mut self, config: AtnConfig, contexts: &PredictionContextCache, merges: &mut MergeCache) -> bool {
        if !config.semantic_context.is_none() {
            self.has_semantic_context = true;
        }
        if config.reaches_into_outer_context > 0 {
            self.dips_into_outer_context = true;
        }
        let key = if self.ordered {
            ConfigKey::Exact(config.clone())
        } else {
            ConfigKey::Merged {
                state: config.state,
                alt: config.alt,
                semantic_context: config.semantic_context.clone(),
            }
        };
        match self.lookup.get(&key) {
            Some(&index) => {
                if self.ordered {
                    return false;
                }
                let existing = &mut self.configs[index];
                let root_is_wildcard = !self.full_ctx;
                let merged = contexts.merge(existing.context, config.context, root_is_wildcard, merges);
                existing.reaches_into_outer_context =
                    existing.reaches_into_outer_context.max(config.reaches_into_outer_context);
                if config.precedence_filter_suppressed {
                    existing.precedence_filter_suppressed = true;
                }
                existing.context = merged;
                false
            }
            None => {
                self.lookup.insert(key, self.configs.len());
                self.configs.push(config);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    pub fn configs(&self) -> &[AtnConfig] {
        &self.configs
    }

    pub fn iter(&self) -> std::slice::Iter<'_, AtnConfig> {
        self.configs.iter()
    }

    pub fn contains(&self, config: &AtnConfig) -> bool {
        self.configs.iter().any(|c| c == config)
    }

    /// Every alternative represented in the set.
    pub fn alts(&self) -> AltSet {
        self.configs.iter().map(|c| c.alt).collect()
    }

    /// The alternatives reached for each `(state, context)` pair, in a stable order. Pairs
    /// with several alternatives are conflicts.
    pub fn conflicting_alt_subsets(&self) -> Vec<AltSet> {
        let mut subsets: BTreeMap<(usize, ContextId), AltSet> = BTreeMap::new();
        for config in &self.configs {
            subsets.entry((config.state, config.context)).or_default().insert(config.alt);
        }
        subsets.into_values().collect()
    }

    /// The alternatives reached in each ATN state.
    pub fn state_to_alts(&self) -> BTreeMap<usize, AltSet> {
        let mut map: BTreeMap<usize, AltSet> = BTreeMap::new();
        for config in &self.configs {
            map.entry(config.state).or_default().insert(config.alt);
        }
        map
    }

    pub fn has_config_in_rule_stop_state(&self, atn: &Atn) -> bool {
        self.configs.iter().any(|c| atn.state(c.state).is_rule_stop())
    }

    pub fn all_configs_in_rule_stop_states(&self, atn: &Atn) -> bool {
        self.configs.iter().all(|c| atn.state(c.state).is_rule_stop())
    }

    /// The alternative shared by every configuration, if there is exactly one.
    pub fn unique_alt(&self) -> usize {
        let mut alts = self.configs.iter().map(|c| c.alt);
        match alts.next() {
            Some(first) if alts.all(|alt| alt == first) => first,
            _ => INVALID_ALT_NUMBER,
        }
    }
}

impl PartialEq for AtnConfigSet {
    fn eq(&self, other: &Self) -> bool {
        self.configs == other.configs
            && self.full_ctx == other.full_ctx
            && self.unique_alt == other.unique_alt
            && self.conflicting_alts == other.conflicting_alts
            && self.has_semantic_context == other.has_semantic_context
            && self.dips_into_outer_context == other.dips_into_outer_context
    }
}

impl Eq for AtnConfigSet {}

impl Hash for AtnConfigSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.configs.hash(state);
    }
}

impl fmt::Display for AtnConfigSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.configs.iter().map(|c| c.to_string()).collect();
        write!(f, "[{}]", parts.join(","))?;
        if self.has_semantic_context {
            write!(f, ",hasSemanticContext")?;
        }
        if self.unique_alt != INVALID_ALT_NUMBER {
            write!(f, ",uniqueAlt={}", self.unique_alt)?;
        }
        if let Some(conflicting) = &self.conflicting_alts {
            write!(f, ",conflictingAlts={:?}", conflicting)?;
        }
        if self.dips_into_outer_context {
            write!(f, ",dipsIntoOuterContext")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicates_merge_call_stacks() {
        let contexts = PredictionContextCache::new();
        let mut merges = MergeCache::new();
        let mut set = AtnConfigSet::new(true);
        let a = contexts.singleton(ContextId::EMPTY, 4);
        let b = contexts.singleton(ContextId::EMPTY, 9);
        assert!(set.add(AtnConfig::new(1, 1, a), &contexts, &mut merges));
        assert!(!set.add(AtnConfig::new(1, 1, b), &contexts, &mut merges));
        assert_eq!(set.len(), 1);
        assert_eq!(contexts.get(set.configs()[0].context).len(), 2);
        assert!(set.add(AtnConfig::new(1, 2, a), &contexts, &mut merges));
        assert_eq!(set.alts().into_iter().collect::<Vec<_>>(), vec![1, 2]);
    }

    #[test]
    fn test_ordered_set_keeps_first() {
        let contexts = PredictionContextCache::new();
        let mut merges = MergeCache::new();
        let mut set = AtnConfigSet::ordered();
        let a = contexts.singleton(ContextId::EMPTY, 4);
        assert!(set.add(AtnConfig::new(1, 1, ContextId::EMPTY), &contexts, &mut merges));
        assert!(set.add(AtnConfig::new(1, 1, a), &contexts, &mut merges));
        assert!(!set.add(AtnConfig::new(1, 1, a), &contexts, &mut merges));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_conflicting_subsets_group_by_state_and_context() {
        let contexts = PredictionContextCache::new();
        let mut merges = MergeCache::new();
        let mut set = AtnConfigSet::new(false);
        for (state, alt) in [(3, 1), (3, 2), (5, 2)] {
            set.add(AtnConfig::new(state, alt, ContextId::EMPTY), &contexts, &mut merges);
        }
        let subsets = set.conflicting_alt_subsets();
        assert_eq!(subsets.len(), 2);
        assert_eq!(subsets[0].len(), 2);
        assert_eq!(set.unique_alt(), INVALID_ALT_NUMBER);
    }
}
