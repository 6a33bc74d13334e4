/*!
An insertion-ordered set of NFA instruction indices.

This is the "hybrid" representation used everywhere a subset of NFA
states needs to be both iterated in priority order and compared for
identity: a dense list records insertion order, while a parallel
bit-vector answers membership in constant time and doubles as the
subset's identity key in the lazy DFA cache.
*/

use alloc::vec::Vec;

use crate::util::bitmap::BitVec;

/// An ordered set of instruction indices with a bit-vector mirror.
///
/// Invariants: the dense list contains no duplicates, and bit `i` of the
/// bit-vector is set iff `i` is in the list. Iteration yields elements in
/// the order in which they were inserted.
#[derive(Clone, Debug)]
pub(crate) struct StateSet {
    dense: Vec<u32>,
    bits: BitVec,
}

impl StateSet {
    /// Creates an empty set able to hold indices in `0..capacity`.
    pub(crate) fn new(capacity: usize) -> StateSet {
        StateSet { dense: Vec::with_capacity(capacity), bits: BitVec::new(capacity) }
    }

    /// Inserts `idx` and returns true if it was not already present.
    #[inline(always)]
    pub(crate) fn insert(&mut self, idx: u32) -> bool {
        if self.bits.test(idx as usize) {
            return false;
        }
        self.bits.set(idx as usize);
        self.dense.push(idx);
        true
    }

    #[inline(always)]
    pub(crate) fn contains(&self, idx: u32) -> bool {
        self.bits.test(idx as usize)
    }

    pub(crate) fn len(&self) -> usize {
        self.dense.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    pub(crate) fn clear(&mut self) {
        self.dense.clear();
        self.bits.clear();
    }

    /// The identity key of this set.
    pub(crate) fn bits(&self) -> &BitVec {
        &self.bits
    }

    pub(crate) fn iter(&self) -> core::iter::Copied<core::slice::Iter<'_, u32>> {
        self.dense.iter().copied()
    }

    /// Inserts every element of `other` not already present, preserving
    /// this set's insertion order for the new elements.
    pub(crate) fn union_with(&mut self, other: &StateSet) {
        for idx in other.iter() {
            self.insert(idx);
        }
    }

    /// Replaces the contents of this set with those of `other`.
    pub(crate) fn copy_from(&mut self, other: &StateSet) {
        self.dense.clear();
        self.dense.extend_from_slice(&other.dense);
        self.bits.copy_from(&other.bits);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_is_idempotent() {
        let mut set = StateSet::new(16);
        assert!(set.insert(3));
        assert!(set.insert(1));
        assert!(!set.insert(3));
        assert_eq!(2, set.len());
        assert!(set.contains(1));
        assert!(set.contains(3));
        assert!(!set.contains(0));
    }

    #[test]
    fn list_and_bits_agree() {
        let mut set = StateSet::new(128);
        for idx in [5u32, 99, 0, 64, 5, 99] {
            set.insert(idx);
        }
        for idx in 0..128u32 {
            let in_list = set.iter().any(|x| x == idx);
            assert_eq!(in_list, set.contains(idx), "disagreement at {}", idx);
        }
        assert_eq!(4, set.len());
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut set = StateSet::new(16);
        for idx in [9u32, 2, 7] {
            set.insert(idx);
        }
        let got: Vec<u32> = set.iter().collect();
        assert_eq!(alloc::vec![9, 2, 7], got);
    }

    #[test]
    fn union_and_identity() {
        let mut a = StateSet::new(64);
        let mut b = StateSet::new(64);
        a.insert(1);
        b.insert(2);
        b.insert(1);
        a.union_with(&b);
        assert_eq!(2, a.len());
        // Same members, different insertion order: identical keys.
        let mut c = StateSet::new(64);
        c.insert(2);
        c.insert(1);
        assert_eq!(a.bits(), c.bits());
    }
}
