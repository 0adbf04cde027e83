//! # Grouping Sets
//!
//! A grouping set is a bit-set over input column positions: bit `i` set means input
//! column `i` is a GROUP BY key. Bits are always visited in ascending order, which is what
//! fixes the position of each group-by field in an aggregate's output row.
//!
//! Equality and hashing consider only the set bits. Two sets built with different
//! capacities but the same members are the same grouping set.

use fixedbitset::FixedBitSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Immutable set of input column positions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<usize>", into = "Vec<usize>")]
pub struct GroupSet {
    bits: FixedBitSet,
}

impl GroupSet {
    /// The empty set: a global (no GROUP BY) aggregate.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn of(bits: &[usize]) -> Self {
        bits.iter().copied().collect()
    }

    /// `{start, ..., end - 1}`.
    pub fn range(start: usize, end: usize) -> Self {
        (start..end).collect()
    }

    pub fn cardinality(&self) -> usize {
        self.bits.count_ones(..)
    }

    pub fn is_empty(&self) -> bool {
        self.cardinality() == 0
    }

    pub fn contains(&self, bit: usize) -> bool {
        self.bits.contains(bit)
    }

    /// Set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.bits.ones()
    }

    pub fn max_bit(&self) -> Option<usize> {
        self.iter().last()
    }

    pub fn is_subset(&self, other: &GroupSet) -> bool {
        self.iter().all(|bit| other.contains(bit))
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.iter().collect()
    }
}

/// Output position of the first aggregate-call field for an aggregate grouped by `group_set`.
///
/// Group-by fields occupy the leading output columns, so the first aggregate result lands
/// right after them.
pub fn first_agg_field_index(group_set: &GroupSet) -> usize {
    group_set.cardinality()
}

impl FromIterator<usize> for GroupSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self {
            bits: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<usize>> for GroupSet {
    fn from(bits: Vec<usize>) -> Self {
        bits.into_iter().collect()
    }
}

impl From<GroupSet> for Vec<usize> {
    fn from(set: GroupSet) -> Self {
        set.to_vec()
    }
}

impl PartialEq for GroupSet {
    fn eq(&self, other: &Self) -> bool {
        self.iter().eq(other.iter())
    }
}

impl Eq for GroupSet {}

impl Hash for GroupSet {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for bit in self.iter() {
            bit.hash(state);
        }
        self.cardinality().hash(state);
    }
}

impl fmt::Display for GroupSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, bit) in self.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", bit)?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(set: &GroupSet) -> u64 {
        let mut hasher = DefaultHasher::new();
        set.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_iteration_is_ascending() {
        let set = GroupSet::of(&[5, 1, 3]);
        assert_eq!(set.to_vec(), vec![1, 3, 5]);
        assert_eq!(set.cardinality(), 3);
        assert_eq!(set.max_bit(), Some(5));
        assert_eq!(set.to_string(), "{1, 3, 5}");
    }

    #[test]
    fn test_equality_ignores_capacity() {
        let mut wide = FixedBitSet::with_capacity(64);
        wide.insert(2);
        let wide = GroupSet { bits: wide };
        let narrow = GroupSet::of(&[2]);
        assert_eq!(wide, narrow);
        assert_eq!(hash_of(&wide), hash_of(&narrow));
    }

    #[test]
    fn test_first_agg_field_index() {
        assert_eq!(first_agg_field_index(&GroupSet::empty()), 0);
        assert_eq!(first_agg_field_index(&GroupSet::of(&[0, 4])), 2);
    }

    #[test]
    fn test_subset() {
        let a = GroupSet::of(&[0]);
        let b = GroupSet::of(&[0, 2]);
        assert!(a.is_subset(&b));
        assert!(!b.is_subset(&a));
        assert!(GroupSet::empty().is_subset(&a));
    }
}
