//! Additive merging of evaluation results.
//!
//! Per-sentence, per-document, and corpus-level results all have the same
//! shape; folding them only needs one rule per value type: numbers add,
//! sets union, sequences concatenate, maps merge recursively, and result
//! structs merge field by field. Because all of these are commutative and
//! associative (sequence order aside), sentences and documents can be
//! processed in any order — or in parallel — and merged at a single join
//! point.

use std::collections::{btree_map, BTreeMap, BTreeSet};

/// Additive merge: combine another value of the same shape into `self`.
pub trait Merge {
    /// Fold `other` into `self`.
    fn merge(&mut self, other: Self);
}

impl Merge for usize {
    fn merge(&mut self, other: Self) {
        *self += other;
    }
}

impl Merge for u32 {
    fn merge(&mut self, other: Self) {
        *self += other;
    }
}

impl Merge for u64 {
    fn merge(&mut self, other: Self) {
        *self += other;
    }
}

impl Merge for f64 {
    fn merge(&mut self, other: Self) {
        *self += other;
    }
}

impl<T> Merge for Vec<T> {
    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}

impl<T: Ord> Merge for BTreeSet<T> {
    fn merge(&mut self, other: Self) {
        self.extend(other);
    }
}

impl<K: Ord, V: Merge> Merge for BTreeMap<K, V> {
    fn merge(&mut self, other: Self) {
        for (key, value) in other {
            match self.entry(key) {
                btree_map::Entry::Occupied(mut slot) => slot.get_mut().merge(value),
                btree_map::Entry::Vacant(slot) => {
                    slot.insert(value);
                }
            }
        }
    }
}

impl<V: Merge> Merge for Option<V> {
    fn merge(&mut self, other: Self) {
        match (self.as_mut(), other) {
            (Some(a), Some(b)) => a.merge(b),
            (None, Some(b)) => *self = Some(b),
            (_, None) => {}
        }
    }
}
