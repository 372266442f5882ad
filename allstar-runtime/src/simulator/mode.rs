//! Prediction modes and conflict analysis
//!
//!     A conflict is two or more alternatives reaching the same ATN state with the same call
//!     stack: from there on the simulation cannot tell them apart. SLL prediction stops at
//!     the first set where every thread is in such a conflict (or every thread has finished
//!     the decision rule) and, unless the mode is `Sll`, hands the decision to full LL.
//!
//!     Full LL stops as soon as the alternatives still alive are settled:
//!
//!         - `Ll`: when every conflicting subset agrees on its lowest alternative.
//!         - `LlExactAmbigDetection`: only once every subset is the same conflict, which
//!           proves the ambiguity instead of guessing it, at the cost of more lookahead.

use crate::atn::Atn;
use crate::config_set::{AltSet, AtnConfigSet, INVALID_ALT_NUMBER};
use crate::prediction_context::{MergeCache, PredictionContextCache};
use crate::semantic_context::SemanticContext;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PredictionMode {
    /// Never falls back to full context. Fast, and exact for SLL grammars.
    Sll,
    /// SLL, then full LL on conflicts.
    #[default]
    Ll,
    /// Like `Ll`, but keeps looking until ambiguities are certain.
    #[serde(rename = "ll-exact-ambig")]
    LlExactAmbigDetection,
}

impl PredictionMode {
    /// Whether SLL prediction should stop on `configs`.
    pub fn has_sll_conflict_terminating_prediction(
        self,
        atn: &Atn,
        configs: &AtnConfigSet,
        contexts: &PredictionContextCache,
    ) -> bool {
        if configs.all_configs_in_rule_stop_states(atn) {
            return true;
        }
        // Pure SLL ignores predicates when looking for conflicts.
        let stripped;
        let configs = if self == PredictionMode::Sll && configs.has_semantic_context {
            let mut merges = MergeCache::new();
            let mut without = AtnConfigSet::new(configs.full_ctx);
            for config in configs.iter() {
                without.add(
                    config.clone().with_semantic_context(SemanticContext::None),
                    contexts,
                    &mut merges,
                );
            }
            stripped = without;
            &stripped
        } else {
            configs
        };
        let subsets = configs.conflicting_alt_subsets();
        has_conflicting_alt_set(&subsets) && !has_state_associated_with_one_alt(configs)
    }
}

pub fn has_conflicting_alt_set(subsets: &[AltSet]) -> bool {
    subsets.iter().any(|alts| alts.len() > 1)
}

pub fn has_non_conflicting_alt_set(subsets: &[AltSet]) -> bool {
    subsets.iter().any(|alts| alts.len() == 1)
}

pub fn all_subsets_conflict(subsets: &[AltSet]) -> bool {
    !has_non_conflicting_alt_set(subsets)
}

pub fn all_subsets_equal(subsets: &[AltSet]) -> bool {
    match subsets.split_first() {
        Some((first, rest)) => rest.iter().all(|alts| alts == first),
        None => true,
    }
}

pub fn has_state_associated_with_one_alt(configs: &AtnConfigSet) -> bool {
    configs.state_to_alts().values().any(|alts| alts.len() == 1)
}

/// The single alternative covered by every subset, or [INVALID_ALT_NUMBER].
pub fn unique_alt(subsets: &[AltSet]) -> usize {
    let all = alts(subsets);
    if all.len() == 1 {
        all.into_iter().next().unwrap_or(INVALID_ALT_NUMBER)
    } else {
        INVALID_ALT_NUMBER
    }
}

pub fn alts(subsets: &[AltSet]) -> AltSet {
    subsets.iter().flatten().copied().collect()
}

/// The lowest alternative of each subset, if they all agree.
pub fn single_viable_alt(subsets: &[AltSet]) -> usize {
    let mut viable = subsets.iter().filter_map(|alts| alts.iter().next().copied());
    let Some(first) = viable.next() else {
        return INVALID_ALT_NUMBER;
    };
    if viable.all(|alt| alt == first) {
        first
    } else {
        INVALID_ALT_NUMBER
    }
}

pub fn resolves_to_just_one_viable_alt(subsets: &[AltSet]) -> usize {
    single_viable_alt(subsets)
}

/// Union of the conflicting subsets: every alternative involved in a conflict.
pub fn conflicting_alts(configs: &AtnConfigSet) -> AltSet {
    alts(&configs.conflicting_alt_subsets())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(alts: &[usize]) -> AltSet {
        alts.iter().copied().collect()
    }

    #[test]
    fn test_single_viable_alt_needs_agreement() {
        assert_eq!(single_viable_alt(&[set(&[1, 2]), set(&[1, 3])]), 1);
        assert_eq!(single_viable_alt(&[set(&[1, 2]), set(&[2, 3])]), INVALID_ALT_NUMBER);
    }

    #[test]
    fn test_subset_predicates() {
        let subsets = [set(&[1, 2]), set(&[1, 2])];
        assert!(all_subsets_conflict(&subsets));
        assert!(all_subsets_equal(&subsets));
        assert!(has_conflicting_alt_set(&subsets));
        assert_eq!(unique_alt(&subsets), INVALID_ALT_NUMBER);
        assert_eq!(unique_alt(&[set(&[2]), set(&[2])]), 2);
    }

    #[test]
    fn test_mode_names() {
        let mode: PredictionMode = serde_json::from_str("\"ll-exact-ambig\"").unwrap();
        assert_eq!(mode, PredictionMode::LlExactAmbigDetection);
        assert_eq!(serde_json::to_string(&PredictionMode::Sll).unwrap(), "\"sll\"");
    }
}
