//! DFA caches
//!
//!     Prediction results are memoized per decision (per mode for the lexer) in a DFA whose
//!     states are the configuration sets prediction has reached and whose edges are input
//!     symbols. Once a path through a decision has been simulated, the next prediction over
//!     the same symbols walks the DFA instead of the ATN.
//!
//!     A DFA is shared by every recognizer of a grammar, possibly on several threads, so its
//!     store sits behind an `RwLock`. Readers take the read lock for each lookup; adding a
//!     state or an edge takes the write lock briefly. Two threads may compute the same new
//!     state concurrently: states are deduplicated by configuration set under the write
//!     lock, so both end up with the same state and the later edge write is a no-op.
//!
//!     States are immutable once added and handed out as `Arc<DfaState>`. Clearing a DFA
//!     does not wait for predictions in flight, so a start state or an edge is only
//!     published when the states it names still belong to the store; writes naming states
//!     from before a clear are dropped.
//!
//! Precedence DFAs
//!
//!     The operator loop decision of a left-recursive rule depends on the precedence of the
//!     current invocation, so its DFA keeps one start state per precedence level instead of
//!     a single `s0`.

use crate::atn::{Atn, GrammarType, LexerActionExecutor};
use crate::config_set::{AtnConfigSet, INVALID_ALT_NUMBER};
use crate::prediction_context::PredictionContextCache;
use crate::semantic_context::SemanticContext;
use crate::vocabulary::Vocabulary;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A predicate guarding one alternative of an accept state that could not be resolved
/// statically.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredPrediction {
    pub pred: SemanticContext,
    pub alt: usize,
}

impl fmt::Display for PredPrediction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.pred, self.alt)
    }
}

#[derive(Debug, Clone)]
pub struct DfaState {
    /// Position in the owning DFA, assigned when the state is added.
    pub number: usize,
    pub configs: Arc<AtnConfigSet>,
    pub is_accept: bool,
    /// Predicted alternative of an accept state, [INVALID_ALT_NUMBER] when predicates decide.
    pub prediction: usize,
    /// Lexer accept states: the token type and the actions of the winning rule.
    pub lexer_token_type: Option<i32>,
    pub lexer_action_executor: Option<Arc<LexerActionExecutor>>,
    /// SLL found a conflict here; LL prediction must take over.
    pub requires_full_context: bool,
    pub predicates: Option<Vec<PredPrediction>>,
}

impl DfaState {
    pub fn new(configs: AtnConfigSet) -> Self {
        DfaState {
            number: usize::MAX,
            configs: Arc::new(configs),
            is_accept: false,
            prediction: INVALID_ALT_NUMBER,
            lexer_token_type: None,
            lexer_action_executor: None,
            requires_full_context: false,
            predicates: None,
        }
    }

    fn label(&self) -> String {
        let mut label = String::new();
        if self.is_accept {
            label.push(':');
        }
        label.push_str(&format!("s{}", self.number));
        if self.requires_full_context {
            label.push('^');
        }
        if self.is_accept {
            match (&self.predicates, self.lexer_token_type) {
                (Some(predicates), _) => {
                    let rendered: Vec<String> = predicates.iter().map(|p| p.to_string()).collect();
                    label.push_str(&format!("=>[{}]", rendered.join(", ")));
                }
                (None, Some(token_type)) => label.push_str(&format!("=>{}", token_type)),
                (None, None) => label.push_str(&format!("=>{}", self.prediction)),
            }
        }
        label
    }
}

/// Where an edge leads.
#[derive(Debug, Clone)]
pub enum DfaTarget {
    State(Arc<DfaState>),
    /// The symbol kills every configuration.
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    To(usize),
    Error,
}

#[derive(Debug, Default)]
struct DfaStore {
    states: Vec<Arc<DfaState>>,
    lookup: HashMap<Arc<AtnConfigSet>, usize>,
    edges: HashMap<(usize, i32), Edge>,
    s0: Option<usize>,
    precedence_starts: HashMap<i32, usize>,
}

impl DfaStore {
    /// Whether `state` is the very state stored under its number.
    fn holds(&self, state: &DfaState) -> bool {
        self.states
            .get(state.number)
            .is_some_and(|stored| std::ptr::eq(Arc::as_ptr(stored), state))
    }
}

#[derive(Debug)]
pub struct Dfa {
    pub decision: usize,
    /// The decision state (or mode start state) this DFA predicts for.
    pub atn_start_state: usize,
    precedence_dfa: bool,
    store: RwLock<DfaStore>,
}

impl Dfa {
    pub fn new(decision: usize, atn_start_state: usize, precedence_dfa: bool) -> Self {
        Dfa {
            decision,
            atn_start_state,
            precedence_dfa,
            store: RwLock::new(DfaStore::default()),
        }
    }

    pub fn is_precedence_dfa(&self) -> bool {
        self.precedence_dfa
    }

    pub fn start_state(&self) -> Option<Arc<DfaState>> {
        let store = self.read();
        store.s0.map(|id| Arc::clone(&store.states[id]))
    }

    pub fn set_start_state(&self, state: &DfaState) {
        let mut store = self.write();
        if store.holds(state) {
            store.s0 = Some(state.number);
        } else {
            log::debug!("DFA {} dropped stale start state s{}", self.decision, state.number);
        }
    }

    pub fn precedence_start_state(&self, precedence: i32) -> Option<Arc<DfaState>> {
        let store = self.read();
        store
            .precedence_starts
            .get(&precedence)
            .map(|&id| Arc::clone(&store.states[id]))
    }

    pub fn set_precedence_start_state(&self, precedence: i32, state: &DfaState) {
        let mut store = self.write();
        if store.holds(state) {
            store.precedence_starts.insert(precedence, state.number);
        } else {
            log::debug!("DFA {} dropped stale start state s{}", self.decision, state.number);
        }
    }

    /// Adds `state` unless a state with equal configurations exists, and returns the state
    /// that ends up in the DFA.
    pub fn add_state(&self, mut state: DfaState) -> Arc<DfaState> {
        let mut store = self.write();
        if let Some(&existing) = store.lookup.get(&state.configs) {
            return Arc::clone(&store.states[existing]);
        }
        state.number = store.states.len();
        let state = Arc::new(state);
        store.lookup.insert(Arc::clone(&state.configs), state.number);
        store.states.push(Arc::clone(&state));
        state
    }

    pub fn edge(&self, from: &DfaState, symbol: i32) -> Option<DfaTarget> {
        let store = self.read();
        if !store.holds(from) {
            return None;
        }
        match store.edges.get(&(from.number, symbol))? {
            Edge::To(id) => Some(DfaTarget::State(Arc::clone(&store.states[*id]))),
            Edge::Error => Some(DfaTarget::Error),
        }
    }

    pub fn add_edge(&self, from: &DfaState, symbol: i32, target: &DfaTarget) {
        let mut store = self.write();
        let edge = match target {
            DfaTarget::State(state) if store.holds(state) => Edge::To(state.number),
            DfaTarget::Error => Edge::Error,
            DfaTarget::State(_) => return,
        };
        if !store.holds(from) {
            return;
        }
        log::trace!("DFA {} edge s{} -{}-> {:?}", self.decision, from.number, symbol, edge);
        store.edges.insert((from.number, symbol), edge);
    }

    pub fn len(&self) -> usize {
        self.read().states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().states.is_empty()
    }

    pub fn states(&self) -> Vec<Arc<DfaState>> {
        self.read().states.clone()
    }

    /// Forgets every state and edge.
    pub fn clear(&self) {
        *self.write() = DfaStore::default();
    }

    /// One line per edge, `s0-'a'->:s1=>2`, with edge labels named by `vocabulary`.
    pub fn to_string_with(&self, vocabulary: &Vocabulary) -> String {
        self.render(|symbol| vocabulary.display_name(symbol))
    }

    /// Lexer rendering: edge labels are the characters themselves.
    pub fn to_lexer_string(&self) -> String {
        self.render(|symbol| match char::from_u32(symbol as u32) {
            Some(c) if symbol >= 0 => format!("'{}'", c),
            _ => symbol.to_string(),
        })
    }

    fn render(&self, label: impl Fn(i32) -> String) -> String {
        let store = self.read();
        let mut edges: Vec<(usize, i32, usize)> = store
            .edges
            .iter()
            .filter_map(|(&(from, symbol), edge)| match edge {
                Edge::To(to) => Some((from, symbol, *to)),
                Edge::Error => None,
            })
            .collect();
        edges.sort_unstable();
        let mut out = String::new();
        for (from, symbol, to) in edges {
            out.push_str(&format!(
                "{}-{}->{}\n",
                store.states[from].label(),
                label(symbol),
                store.states[to].label()
            ));
        }
        out
    }

    fn read(&self) -> RwLockReadGuard<'_, DfaStore> {
        self.store.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, DfaStore> {
        self.store.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Every DFA of a grammar plus the prediction context store their configurations use.
#[derive(Debug)]
pub struct DfaCache {
    dfas: Vec<Arc<Dfa>>,
    contexts: PredictionContextCache,
}

impl DfaCache {
    pub fn new(atn: &Atn) -> Self {
        let dfas = match atn.grammar_type {
            GrammarType::Parser => atn
                .decision_to_state()
                .iter()
                .enumerate()
                .map(|(decision, &state)| {
                    let precedence = atn.state(state).is_precedence_decision();
                    Arc::new(Dfa::new(decision, state, precedence))
                })
                .collect(),
            GrammarType::Lexer => atn
                .mode_to_start_state()
                .iter()
                .enumerate()
                .map(|(mode, &state)| Arc::new(Dfa::new(mode, state, false)))
                .collect(),
        };
        DfaCache {
            dfas,
            contexts: PredictionContextCache::new(),
        }
    }

    /// The DFA of a parser decision or a lexer mode.
    pub fn dfa(&self, index: usize) -> Option<&Arc<Dfa>> {
        self.dfas.get(index)
    }

    pub fn dfas(&self) -> &[Arc<Dfa>] {
        &self.dfas
    }

    pub fn contexts(&self) -> &PredictionContextCache {
        &self.contexts
    }

    /// Total number of states across every DFA.
    pub fn state_count(&self) -> usize {
        self.dfas.iter().map(|d| d.len()).sum()
    }

    pub fn clear(&self) {
        for dfa in &self.dfas {
            dfa.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_set::AtnConfig;
    use crate::prediction_context::{ContextId, MergeCache};

    fn set_of(states: &[usize]) -> AtnConfigSet {
        let contexts = PredictionContextCache::new();
        let mut merges = MergeCache::new();
        let mut set = AtnConfigSet::new(false);
        for &state in states {
            set.add(AtnConfig::new(state, 1, ContextId::EMPTY), &contexts, &mut merges);
        }
        set
    }

    #[test]
    fn test_states_deduplicate_by_configs() {
        let dfa = Dfa::new(0, 0, false);
        let a = dfa.add_state(DfaState::new(set_of(&[1, 2])));
        let b = dfa.add_state(DfaState::new(set_of(&[1, 2])));
        let c = dfa.add_state(DfaState::new(set_of(&[3])));
        assert_eq!(a.number, b.number);
        assert_eq!(c.number, 1);
        assert_eq!(dfa.len(), 2);
    }

    #[test]
    fn test_edges_and_rendering() {
        let dfa = Dfa::new(0, 0, false);
        let s0 = dfa.add_state(DfaState::new(set_of(&[1])));
        let mut accept = DfaState::new(set_of(&[2]));
        accept.is_accept = true;
        accept.prediction = 2;
        let s1 = dfa.add_state(accept);
        dfa.set_start_state(&s0);
        dfa.add_edge(&s0, 1, &DfaTarget::State(Arc::clone(&s1)));
        dfa.add_edge(&s0, 2, &DfaTarget::Error);
        assert!(matches!(dfa.edge(&s0, 2), Some(DfaTarget::Error)));
        assert!(dfa.edge(&s1, 1).is_none());
        let vocabulary = Vocabulary::from_entries([(1, Some("'a'"), Some("A"))]);
        assert_eq!(dfa.to_string_with(&vocabulary), "s0-'a'->:s1=>2\n");
    }

    #[test]
    fn test_states_from_before_a_clear_are_not_published() {
        let dfa = Dfa::new(0, 0, false);
        let first = dfa.add_state(DfaState::new(set_of(&[1])));
        let second = dfa.add_state(DfaState::new(set_of(&[2])));
        dfa.clear();

        dfa.set_start_state(&second);
        dfa.set_precedence_start_state(0, &second);
        dfa.add_edge(&first, 1, &DfaTarget::State(Arc::clone(&second)));
        dfa.add_edge(&second, 2, &DfaTarget::Error);
        assert!(dfa.start_state().is_none());
        assert!(dfa.precedence_start_state(0).is_none());
        assert!(dfa.to_string_with(&Vocabulary::default()).is_empty());

        // a fresh state reusing number 0 does not inherit the stale edge
        let fresh = dfa.add_state(DfaState::new(set_of(&[3])));
        assert_eq!(fresh.number, 0);
        assert!(dfa.edge(&fresh, 1).is_none());
        assert!(dfa.edge(&first, 1).is_none());
        dfa.set_start_state(&fresh);
        assert_eq!(dfa.start_state().map(|s| s.number), Some(0));
    }

    #[test]
    fn test_clear_while_other_threads_predict() {
        let dfa = Arc::new(Dfa::new(0, 0, false));
        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let dfa = Arc::clone(&dfa);
                std::thread::spawn(move || {
                    for round in 0..200 {
                        let from = dfa.add_state(DfaState::new(set_of(&[worker, round % 5 + 10])));
                        let to = dfa.add_state(DfaState::new(set_of(&[round % 7 + 20])));
                        dfa.set_start_state(&from);
                        dfa.add_edge(&from, 1, &DfaTarget::State(Arc::clone(&to)));
                        if let Some(s0) = dfa.start_state() {
                            if let Some(DfaTarget::State(next)) = dfa.edge(&s0, 1) {
                                assert_eq!(next.configs.len(), 1);
                            }
                        }
                        if round % 17 == worker {
                            dfa.clear();
                        }
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("worker");
        }
        // every published edge still names states of the current store
        dfa.to_string_with(&Vocabulary::default());
    }
}
