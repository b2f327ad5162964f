//! Packed taxon sets for split comparison.
//!
//! Taxon `t` lives at bit `t - 1`, so the anchor (taxon 1) is bit 0 and a
//! split side stored away from the anchor never has bit 0 set.
//!
//! ```text
//!   taxa 1..=5, side {3,4,5}  →  word 0b11100
//! ```

/// Fixed-width set of taxa, 64 per `u64` word.
///
/// Equality and hashing cover the raw words, so two sides built for the same
/// leaf count compare equal exactly when they hold the same taxa.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Empty set with room for `words * 64` taxa; use `leaves.div_ceil(64)`.
    ///
    /// ```
    /// # use succinct_tree_delta::bitset::Bitset;
    /// let side = Bitset::zeros(2);
    /// assert_eq!(side.count_ones(), 0);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0; words])
    }

    #[inline]
    pub fn set(&mut self, bit: usize) {
        self.0[bit / 64] |= 1 << (bit % 64);
    }

    /// Out-of-range bits read as unset.
    #[inline]
    pub fn contains(&self, bit: usize) -> bool {
        self.0
            .get(bit / 64)
            .is_some_and(|word| word >> (bit % 64) & 1 == 1)
    }

    /// `self ∪= other`; both sets must have the same width.
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        debug_assert_eq!(self.0.len(), other.0.len());
        self.0
            .iter_mut()
            .zip(&other.0)
            .for_each(|(word, extra)| *word |= extra);
    }

    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|word| word.count_ones() as usize).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn side(words: usize, bits: &[usize]) -> Bitset {
        let mut set = Bitset::zeros(words);
        bits.iter().for_each(|&bit| set.set(bit));
        set
    }

    #[test]
    fn test_membership_and_out_of_range() {
        let set = side(1, &[1, 3]);
        assert_eq!(set.0, vec![0b1010]);
        assert!(set.contains(3));
        assert!(!set.contains(0));
        assert!(!set.contains(64));
    }

    #[test]
    fn test_union_of_cherry_and_leaf() {
        // {4,5} joined with {3} gives the side {3,4,5}
        let mut merged = side(1, &[3, 4]);
        merged.or_assign(&side(1, &[2]));
        assert_eq!(merged.0, vec![0b11100]);
        assert_eq!(merged.count_ones(), 3);
        assert!(!merged.contains(0));
    }

    #[test]
    fn test_word_boundaries() {
        let set = side(3, &[63, 64, 130]);
        assert_eq!(set.count_ones(), 3);
        assert!(set.contains(63) && set.contains(64) && set.contains(130));
        assert!(!set.contains(65));
        assert_eq!(set.0[2], 1 << 2);
    }

    #[test]
    fn test_equal_sides_hash_alike() {
        use std::collections::HashSet;
        let sides: HashSet<Bitset> = [side(2, &[5, 70]), side(2, &[70, 5]), side(2, &[5])]
            .into_iter()
            .collect();
        assert_eq!(sides.len(), 2);
    }
}
