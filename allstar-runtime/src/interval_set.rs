//! Interval sets
//!
//!     Sorted, non-overlapping, non-adjacent inclusive ranges of `i32`. Used for transition
//!     labels, lookahead sets and expected-token sets. Adjacent or overlapping ranges are
//!     merged on insertion, so two sets with the same members always compare equal.

use crate::token::{EOF, EPSILON};
use crate::vocabulary::Vocabulary;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(i32, i32)", into = "(i32, i32)")]
pub struct Interval {
    pub start: i32,
    pub stop: i32,
}

impl Interval {
    pub fn new(start: i32, stop: i32) -> Self {
        Interval { start, stop }
    }

    pub fn len(&self) -> usize {
        if self.stop < self.start {
            0
        } else {
            (self.stop as i64 - self.start as i64 + 1) as usize
        }
    }

    fn adjacent(&self, other: &Interval) -> bool {
        self.start as i64 == other.stop as i64 + 1 || self.stop as i64 + 1 == other.start as i64
    }

    fn disjoint(&self, other: &Interval) -> bool {
        self.start > other.stop || self.stop < other.start
    }

    fn union(&self, other: &Interval) -> Interval {
        Interval::new(self.start.min(other.start), self.stop.max(other.stop))
    }
}

impl From<(i32, i32)> for Interval {
    fn from((start, stop): (i32, i32)) -> Self {
        Interval::new(start, stop)
    }
}

impl From<Interval> for (i32, i32) {
    fn from(interval: Interval) -> Self {
        (interval.start, interval.stop)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IntervalSet {
    intervals: Vec<Interval>,
}

impl IntervalSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(element: i32) -> Self {
        Self::of_range(element, element)
    }

    pub fn of_range(start: i32, stop: i32) -> Self {
        let mut set = Self::new();
        set.add_range(start, stop);
        set
    }

    pub fn from_elements(elements: impl IntoIterator<Item = i32>) -> Self {
        let mut set = Self::new();
        for element in elements {
            set.add(element);
        }
        set
    }

    pub fn add(&mut self, element: i32) {
        self.add_range(element, element);
    }

    pub fn add_range(&mut self, start: i32, stop: i32) {
        if stop < start {
            return;
        }
        let added = Interval::new(start, stop);
        let mut i = 0;
        while i < self.intervals.len() {
            let current = self.intervals[i];
            if added == current {
                return;
            }
            if added.adjacent(&current) || !added.disjoint(&current) {
                self.intervals[i] = added.union(&current);
                // the widened interval may now swallow its successors
                while i + 1 < self.intervals.len() {
                    let next = self.intervals[i + 1];
                    let merged = self.intervals[i];
                    if !merged.adjacent(&next) && merged.disjoint(&next) {
                        break;
                    }
                    self.intervals.remove(i + 1);
                    self.intervals[i] = merged.union(&next);
                }
                return;
            }
            if added.stop < current.start {
                self.intervals.insert(i, added);
                return;
            }
            i += 1;
        }
        self.intervals.push(added);
    }

    pub fn add_set(&mut self, other: &IntervalSet) {
        for interval in &other.intervals {
            self.add_range(interval.start, interval.stop);
        }
    }

    pub fn or(&self, other: &IntervalSet) -> IntervalSet {
        let mut result = self.clone();
        result.add_set(other);
        result
    }

    pub fn and(&self, other: &IntervalSet) -> IntervalSet {
        let mut result = IntervalSet::new();
        let (mut i, mut j) = (0, 0);
        while i < self.intervals.len() && j < other.intervals.len() {
            let a = self.intervals[i];
            let b = other.intervals[j];
            let start = a.start.max(b.start);
            let stop = a.stop.min(b.stop);
            if start <= stop {
                result.add_range(start, stop);
            }
            if a.stop < b.stop {
                i += 1;
            } else {
                j += 1;
            }
        }
        result
    }

    /// Members of `self` that are not in `other`.
    pub fn subtract(&self, other: &IntervalSet) -> IntervalSet {
        let mut result = self.clone();
        for interval in &other.intervals {
            result.remove_range(interval.start, interval.stop);
        }
        result
    }

    /// Members of `[min, max]` that are not in `self`.
    pub fn complement(&self, min: i32, max: i32) -> IntervalSet {
        IntervalSet::of_range(min, max).subtract(self)
    }

    pub fn remove(&mut self, element: i32) {
        self.remove_range(element, element);
    }

    pub fn remove_range(&mut self, start: i32, stop: i32) {
        let mut kept = Vec::with_capacity(self.intervals.len() + 1);
        for interval in self.intervals.drain(..) {
            if interval.stop < start || interval.start > stop {
                kept.push(interval);
                continue;
            }
            if interval.start < start {
                kept.push(Interval::new(interval.start, start - 1));
            }
            if interval.stop > stop {
                kept.push(Interval::new(stop + 1, interval.stop));
            }
        }
        self.intervals = kept;
    }

    pub fn contains(&self, element: i32) -> bool {
        self.intervals
            .binary_search_by(|interval| {
                if interval.stop < element {
                    std::cmp::Ordering::Less
                } else if interval.start > element {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// Number of members, not intervals.
    pub fn len(&self) -> usize {
        self.intervals.iter().map(Interval::len).sum()
    }

    pub fn min_element(&self) -> Option<i32> {
        self.intervals.first().map(|i| i.start)
    }

    pub fn max_element(&self) -> Option<i32> {
        self.intervals.last().map(|i| i.stop)
    }

    pub fn intervals(&self) -> &[Interval] {
        &self.intervals
    }

    pub fn iter(&self) -> impl Iterator<Item = i32> + '_ {
        self.intervals.iter().flat_map(|i| i.start..=i.stop)
    }

    pub fn to_vec(&self) -> Vec<i32> {
        self.iter().collect()
    }

    /// Renders members by vocabulary name: `{'+', INT}`, or a bare name for one member.
    pub fn to_string_with(&self, vocabulary: &Vocabulary) -> String {
        if self.is_empty() {
            return "{}".to_string();
        }
        let names: Vec<String> = self.iter().map(|t| vocabulary.element_name(t)).collect();
        if self.len() > 1 {
            format!("{{{}}}", names.join(", "))
        } else {
            names.join(", ")
        }
    }
}

impl fmt::Display for IntervalSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "{{}}");
        }
        fn element(t: i32) -> String {
            match t {
                EOF => "<EOF>".to_string(),
                EPSILON => "<EPSILON>".to_string(),
                t => t.to_string(),
            }
        }
        let mut parts = Vec::new();
        for interval in &self.intervals {
            if interval.start == interval.stop {
                parts.push(element(interval.start));
            } else if interval.start <= EOF {
                // reserved members render by name, one at a time
                parts.extend((interval.start..=interval.stop).map(element));
            } else {
                parts.push(format!("{}..{}", interval.start, interval.stop));
            }
        }
        if self.len() > 1 {
            write!(f, "{{{}}}", parts.join(", "))
        } else {
            write!(f, "{}", parts.join(", "))
        }
    }
}

impl FromIterator<i32> for IntervalSet {
    fn from_iter<I: IntoIterator<Item = i32>>(iter: I) -> Self {
        IntervalSet::from_elements(iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_adjacent_ranges_merge() {
        let mut set = IntervalSet::new();
        set.add_range(1, 3);
        set.add_range(7, 9);
        set.add_range(4, 6);
        assert_eq!(set.intervals(), &[Interval::new(1, 9)]);
    }

    #[test]
    fn test_insert_before_and_between() {
        let mut set = IntervalSet::of(10);
        set.add(2);
        set.add(5);
        assert_eq!(set.to_vec(), vec![2, 5, 10]);
        assert_eq!(set.to_string(), "{2, 5, 10}");
    }

    #[test]
    fn test_remove_splits_interval() {
        let mut set = IntervalSet::of_range(1, 5);
        set.remove(3);
        assert_eq!(set.intervals(), &[Interval::new(1, 2), Interval::new(4, 5)]);
        assert!(!set.contains(3));
        assert!(set.contains(4));
    }

    #[test]
    fn test_complement_and_subtract() {
        let set = IntervalSet::from_elements([2, 3, 7]);
        let complement = set.complement(1, 8);
        assert_eq!(complement.to_vec(), vec![1, 4, 5, 6, 8]);
        assert_eq!(set.subtract(&IntervalSet::of(3)).to_vec(), vec![2, 7]);
    }

    #[test]
    fn test_special_members_render() {
        let mut set = IntervalSet::of(EOF);
        set.add(EPSILON);
        assert_eq!(set.to_string(), "{<EPSILON>, <EOF>}");
        let vocabulary = Vocabulary::from_entries([(1, Some("'a'"), None)]);
        set.add(1);
        assert_eq!(set.to_string_with(&vocabulary), "{<EPSILON>, <EOF>, 'a'}");
    }

    proptest! {
        #[test]
        fn membership_matches_inserted_elements(elements in prop::collection::vec(-3i32..40, 0..30)) {
            let set: IntervalSet = elements.iter().copied().collect();
            for candidate in -3i32..40 {
                prop_assert_eq!(set.contains(candidate), elements.contains(&candidate));
            }
            // canonical form: sorted, no overlaps, no adjacency
            for pair in set.intervals().windows(2) {
                prop_assert!(pair[0].stop as i64 + 1 < pair[1].start as i64);
            }
        }

        #[test]
        fn and_is_intersection(a in prop::collection::vec(0i32..30, 0..20), b in prop::collection::vec(0i32..30, 0..20)) {
            let left: IntervalSet = a.iter().copied().collect();
            let right: IntervalSet = b.iter().copied().collect();
            let both = left.and(&right);
            for candidate in 0i32..30 {
                prop_assert_eq!(both.contains(candidate), left.contains(candidate) && right.contains(candidate));
            }
        }
    }
}
