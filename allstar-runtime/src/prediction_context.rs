//! Prediction contexts
//!
//!     A prediction context is the simulated call stack of an ATN configuration: the return
//!     states to resume at when the configuration falls off the end of its rule. Stacks that
//!     share suffixes share nodes, so the whole population of stacks seen during prediction
//!     forms a graph-structured stack.
//!
//!     Nodes are hash-consed in a [PredictionContextCache] and referred to by [ContextId]:
//!     structurally equal contexts always get the same id, so equality is an integer compare
//!     and merging can short-circuit on identity. The arena is append-only and lives as long
//!     as the DFA cache that owns it.
//!
//!     Node shapes:
//!
//!         - `Empty` (`$`): the bottom of the stack. In SLL prediction it stands for "any
//!           caller"; in full-context prediction it means the start rule returned.
//!         - `Singleton`: one return state above a parent.
//!         - `Array`: several alternatives stacks, sorted by return state, with
//!           [EMPTY_RETURN_STATE] (an empty path) always last.
//!
//! Merging
//!
//!     `merge` unions two stacks. With `root_is_wildcard` (SLL), `$` absorbs everything;
//!     otherwise `$` is kept as an explicit empty path alongside the others. Merges are
//!     memoized per prediction run in a [MergeCache].

use crate::atn::Atn;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Return state marking an empty path in array contexts. Sorts after every real state.
pub const EMPTY_RETURN_STATE: usize = usize::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContextId(u32);

impl ContextId {
    pub const EMPTY: ContextId = ContextId(0);

    pub fn is_empty(self) -> bool {
        self == Self::EMPTY
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PredictionContext {
    Empty,
    Singleton {
        parent: ContextId,
        return_state: usize,
    },
    Array {
        parents: Vec<ContextId>,
        return_states: Vec<usize>,
    },
}

impl PredictionContext {
    pub fn len(&self) -> usize {
        match self {
            PredictionContext::Empty | PredictionContext::Singleton { .. } => 1,
            PredictionContext::Array { return_states, .. } => return_states.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, PredictionContext::Empty)
    }

    pub fn return_state(&self, i: usize) -> usize {
        match self {
            PredictionContext::Empty => EMPTY_RETURN_STATE,
            PredictionContext::Singleton { return_state, .. } => *return_state,
            PredictionContext::Array { return_states, .. } => return_states[i],
        }
    }

    pub fn parent(&self, i: usize) -> ContextId {
        match self {
            PredictionContext::Empty => ContextId::EMPTY,
            PredictionContext::Singleton { parent, .. } => *parent,
            PredictionContext::Array { parents, .. } => parents[i],
        }
    }

    /// True if one of the stacks is empty.
    pub fn has_empty_path(&self) -> bool {
        self.return_state(self.len() - 1) == EMPTY_RETURN_STATE
    }

    fn entries(&self) -> Vec<(ContextId, usize)> {
        (0..self.len()).map(|i| (self.parent(i), self.return_state(i))).collect()
    }

    fn is_singleton_like(&self) -> bool {
        !matches!(self, PredictionContext::Array { .. })
    }
}

#[derive(Debug)]
struct ContextTable {
    nodes: Vec<Arc<PredictionContext>>,
    index: HashMap<Arc<PredictionContext>, ContextId>,
}

/// Memo of `(a, b) -> merge(a, b)` for one prediction.
pub type MergeCache = HashMap<(ContextId, ContextId), ContextId>;

/// Append-only, hash-consed store of prediction context nodes.
#[derive(Debug)]
pub struct PredictionContextCache {
    table: RwLock<ContextTable>,
}

impl Default for PredictionContextCache {
    fn default() -> Self {
        Self::new()
    }
}

impl PredictionContextCache {
    pub fn new() -> Self {
        let empty = Arc::new(PredictionContext::Empty);
        let mut index = HashMap::new();
        index.insert(Arc::clone(&empty), ContextId::EMPTY);
        PredictionContextCache {
            table: RwLock::new(ContextTable {
                nodes: vec![empty],
                index,
            }),
        }
    }

    /// Number of distinct nodes, `$` included.
    pub fn len(&self) -> usize {
        self.read().nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    pub fn get(&self, id: ContextId) -> Arc<PredictionContext> {
        Arc::clone(&self.read().nodes[id.index()])
    }

    pub fn intern(&self, context: PredictionContext) -> ContextId {
        if context.is_empty() {
            return ContextId::EMPTY;
        }
        if let Some(&id) = self.read().index.get(&context) {
            return id;
        }
        let mut table = self.table.write().unwrap_or_else(|poisoned| poisoned.into_inner());
        // another thread may have added it between the two locks
        if let Some(&id) = table.index.get(&context) {
            return id;
        }
        let id = ContextId(table.nodes.len() as u32);
        let node = Arc::new(context);
        table.nodes.push(Arc::clone(&node));
        table.index.insert(node, id);
        id
    }

    pub fn singleton(&self, parent: ContextId, return_state: usize) -> ContextId {
        if return_state == EMPTY_RETURN_STATE && parent.is_empty() {
            return ContextId::EMPTY;
        }
        self.intern(PredictionContext::Singleton { parent, return_state })
    }

    fn from_entries(&self, entries: Vec<(ContextId, usize)>) -> ContextId {
        match entries.as_slice() {
            [] => ContextId::EMPTY,
            [(parent, return_state)] => self.singleton(*parent, *return_state),
            _ => {
                let (parents, return_states) = entries.into_iter().unzip();
                self.intern(PredictionContext::Array { parents, return_states })
            }
        }
    }

    /// The stack of a parser rule context chain, given the invoking state of each context
    /// from innermost to outermost (the root context contributes nothing).
    pub fn from_invoking_states(&self, atn: &Atn, invoking_states: impl IntoIterator<Item = usize>) -> ContextId {
        let follow_states: Vec<usize> = invoking_states
            .into_iter()
            .map_while(|invoking| atn.rule_follow_state(invoking))
            .collect();
        follow_states
            .into_iter()
            .rev()
            .fold(ContextId::EMPTY, |parent, follow| self.singleton(parent, follow))
    }

    pub fn merge(&self, a: ContextId, b: ContextId, root_is_wildcard: bool, cache: &mut MergeCache) -> ContextId {
        if a == b {
            return a;
        }
        let (node_a, node_b) = (self.get(a), self.get(b));
        if node_a.is_singleton_like() && node_b.is_singleton_like() {
            return self.merge_singletons(a, &node_a, b, &node_b, root_is_wildcard, cache);
        }
        if root_is_wildcard {
            if a.is_empty() {
                return a;
            }
            if b.is_empty() {
                return b;
            }
        }
        self.merge_arrays(a, &node_a, b, &node_b, root_is_wildcard, cache)
    }

    fn cached(cache: &MergeCache, a: ContextId, b: ContextId) -> Option<ContextId> {
        cache.get(&(a, b)).or_else(|| cache.get(&(b, a))).copied()
    }

    fn merge_singletons(
        &self,
        a: ContextId,
        node_a: &PredictionContext,
        b: ContextId,
        node_b: &PredictionContext,
        root_is_wildcard: bool,
        cache: &mut MergeCache,
    ) -> ContextId {
        if let Some(merged) = Self::cached(cache, a, b) {
            return merged;
        }
        if let Some(root) = self.merge_root(a, node_a, b, node_b, root_is_wildcard) {
            cache.insert((a, b), root);
            return root;
        }

        let (parent_a, return_a) = (node_a.parent(0), node_a.return_state(0));
        let (parent_b, return_b) = (node_b.parent(0), node_b.return_state(0));
        if return_a == return_b {
            let parent = self.merge(parent_a, parent_b, root_is_wildcard, cache);
            if parent == parent_a {
                return a;
            }
            if parent == parent_b {
                return b;
            }
            let merged = self.singleton(parent, return_a);
            cache.insert((a, b), merged);
            return merged;
        }

        // different return states: a two-entry array, sharing the parent when possible
        let mut entries = if parent_a == parent_b {
            vec![(parent_a, return_a), (parent_a, return_b)]
        } else {
            vec![(parent_a, return_a), (parent_b, return_b)]
        };
        entries.sort_by_key(|&(_, return_state)| return_state);
        let merged = self.from_entries(entries);
        cache.insert((a, b), merged);
        merged
    }

    fn merge_root(
        &self,
        a: ContextId,
        node_a: &PredictionContext,
        b: ContextId,
        node_b: &PredictionContext,
        root_is_wildcard: bool,
    ) -> Option<ContextId> {
        if root_is_wildcard {
            if a.is_empty() || b.is_empty() {
                return Some(ContextId::EMPTY);
            }
            return None;
        }
        match (a.is_empty(), b.is_empty()) {
            (true, true) => Some(ContextId::EMPTY),
            (true, false) => Some(self.from_entries(vec![
                (node_b.parent(0), node_b.return_state(0)),
                (ContextId::EMPTY, EMPTY_RETURN_STATE),
            ])),
            (false, true) => Some(self.from_entries(vec![
                (node_a.parent(0), node_a.return_state(0)),
                (ContextId::EMPTY, EMPTY_RETURN_STATE),
            ])),
            (false, false) => None,
        }
    }

    fn merge_arrays(
        &self,
        a: ContextId,
        node_a: &PredictionContext,
        b: ContextId,
        node_b: &PredictionContext,
        root_is_wildcard: bool,
        cache: &mut MergeCache,
    ) -> ContextId {
        if let Some(merged) = Self::cached(cache, a, b) {
            return merged;
        }
        let (entries_a, entries_b) = (node_a.entries(), node_b.entries());
        let mut merged_entries = Vec::with_capacity(entries_a.len() + entries_b.len());
        let (mut i, mut j) = (0, 0);
        while i < entries_a.len() && j < entries_b.len() {
            let (parent_a, return_a) = entries_a[i];
            let (parent_b, return_b) = entries_b[j];
            if return_a == return_b {
                let both_empty = return_a == EMPTY_RETURN_STATE && parent_a.is_empty() && parent_b.is_empty();
                if both_empty || parent_a == parent_b {
                    merged_entries.push((parent_a, return_a));
                } else {
                    let parent = self.merge(parent_a, parent_b, root_is_wildcard, cache);
                    merged_entries.push((parent, return_a));
                }
                i += 1;
                j += 1;
            } else if return_a < return_b {
                merged_entries.push((parent_a, return_a));
                i += 1;
            } else {
                merged_entries.push((parent_b, return_b));
                j += 1;
            }
        }
        merged_entries.extend_from_slice(&entries_a[i..]);
        merged_entries.extend_from_slice(&entries_b[j..]);

        let merged = self.from_entries(merged_entries);
        cache.insert((a, b), merged);
        merged
    }

    /// Renders every stack of `id` as `[s1 s2 $]`, innermost return state first.
    pub fn describe(&self, id: ContextId) -> Vec<String> {
        let mut stacks = Vec::new();
        self.collect_stacks(id, String::new(), &mut stacks);
        stacks
    }

    fn collect_stacks(&self, id: ContextId, prefix: String, out: &mut Vec<String>) {
        let node = self.get(id);
        if node.is_empty() {
            out.push(format!("[{}$]", prefix));
            return;
        }
        for i in 0..node.len() {
            let return_state = node.return_state(i);
            if return_state == EMPTY_RETURN_STATE {
                out.push(format!("[{}$]", prefix));
                continue;
            }
            self.collect_stacks(node.parent(i), format!("{}{} ", prefix, return_state), out);
        }
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, ContextTable> {
        self.table.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_gives_structural_identity() {
        let cache = PredictionContextCache::new();
        let a = cache.singleton(ContextId::EMPTY, 5);
        let b = cache.singleton(ContextId::EMPTY, 5);
        assert_eq!(a, b);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.singleton(ContextId::EMPTY, EMPTY_RETURN_STATE), ContextId::EMPTY);
    }

    #[test]
    fn test_wildcard_root_absorbs() {
        let cache = PredictionContextCache::new();
        let mut merges = MergeCache::new();
        let a = cache.singleton(ContextId::EMPTY, 5);
        assert_eq!(cache.merge(a, ContextId::EMPTY, true, &mut merges), ContextId::EMPTY);
    }

    #[test]
    fn test_full_context_root_keeps_empty_path() {
        let cache = PredictionContextCache::new();
        let mut merges = MergeCache::new();
        let a = cache.singleton(ContextId::EMPTY, 5);
        let merged = cache.merge(ContextId::EMPTY, a, false, &mut merges);
        let node = cache.get(merged);
        assert_eq!(node.len(), 2);
        assert_eq!(node.return_state(0), 5);
        assert!(node.has_empty_path());
        assert_eq!(cache.describe(merged), vec!["[5 $]".to_string(), "[$]".to_string()]);
    }

    #[test]
    fn test_same_return_state_merges_parents() {
        let cache = PredictionContextCache::new();
        let mut merges = MergeCache::new();
        let p1 = cache.singleton(ContextId::EMPTY, 1);
        let p2 = cache.singleton(ContextId::EMPTY, 2);
        let a = cache.singleton(p1, 9);
        let b = cache.singleton(p2, 9);
        let merged = cache.merge(a, b, false, &mut merges);
        let node = cache.get(merged);
        assert_eq!(node.return_state(0), 9);
        assert_eq!(cache.describe(merged), vec!["[9 1 $]".to_string(), "[9 2 $]".to_string()]);
    }

    #[test]
    fn test_array_merge_is_sorted_and_deduplicated() {
        let cache = PredictionContextCache::new();
        let mut merges = MergeCache::new();
        let s = |r| cache.singleton(ContextId::EMPTY, r);
        let left = cache.merge(s(3), s(7), false, &mut merges);
        let right = cache.merge(s(5), s(7), false, &mut merges);
        let merged = cache.merge(left, right, false, &mut merges);
        let node = cache.get(merged);
        let returns: Vec<usize> = (0..node.len()).map(|i| node.return_state(i)).collect();
        assert_eq!(returns, vec![3, 5, 7]);
        // merging again yields the same interned node
        assert_eq!(cache.merge(right, left, false, &mut MergeCache::new()), merged);
    }
}
