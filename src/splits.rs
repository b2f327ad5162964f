//! Non-trivial splits of a tree and their comparison between two trees.
//!
//! # Overview
//! Each internal edge (both ends internal) divides the taxa in two. The
//! traversal starts at the anchor, so the side *away* from the anchor never
//! contains taxon 1 and can be stored as-is: no complement step is needed
//! to make identical splits compare equal.
//!
//! ```text
//!   1 ──┬── 2          splits: {3,4,5} (edge a)
//!       └─a─┬── 3              {4,5}   (edge b)
//!           └─b─┬── 4
//!               └── 5
//! ```
//!
//! Every split remembers one half-edge of its edge (the one on the far
//! side), which is what contraction and delta extraction need.

use crate::bitset::Bitset;
use crate::error::{CompressError, Result};
use crate::tree::{HalfEdgeId, Role, Step, TaxonId, UnrootedTree};
use itertools::Itertools;
use std::collections::HashSet;

/// One non-trivial split and the half-edge that defines it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Split {
    /// Taxa on the side away from the anchor.
    pub leaves: Bitset,
    /// Half-edge of the defining edge at its far-side vertex.
    pub half_edge: HalfEdgeId,
}

/// All non-trivial splits of a tree, in post-order.
#[derive(Debug, Clone)]
pub struct TreeSplits {
    pub splits: Vec<Split>,
    pub num_leaves: usize,
    pub words: usize,
}

/// Presence of each split of one tree in the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitComparison {
    /// `present1[i]`: split `i` of tree 1 also occurs in tree 2.
    pub present1: Vec<bool>,
    /// `present2[i]`: split `i` of tree 2 also occurs in tree 1.
    pub present2: Vec<bool>,
    pub rf_distance: usize,
}

impl TreeSplits {
    /// Collects the splits of `tree` with one post-order pass from the anchor.
    ///
    /// # Algorithm
    /// - **Leaf**: bitset with its own taxon bit set
    /// - **Internal**: OR of the child bitsets
    ///
    /// Child bitsets are moved out of the cache once merged, so each is
    /// cloned only when it becomes a split.
    ///
    /// # Errors
    /// `InconsistentTaxa` when a taxon id exceeds the number of leaves.
    pub fn from_tree(tree: &UnrootedTree) -> Result<Self> {
        let num_leaves = tree.leaf_count();
        let words = num_leaves.div_ceil(64);
        let start = tree.start()?;

        let mut cache: Vec<Option<Bitset>> = vec![None; tree.half_edge_count()];
        let mut splits = Vec::with_capacity(num_leaves.saturating_sub(3));

        for step in tree.depth_first(start) {
            let Step::Exit(h) = step else { continue };

            let mut bits = Bitset::zeros(words);
            match tree[h].role {
                Role::Leaf(taxon) => bits.set(taxon_bit(taxon, num_leaves)?),
                Role::Internal => {
                    for child in tree.children(h) {
                        if let Some(below) = cache[tree.partner(child)].take() {
                            bits.or_assign(&below);
                        }
                    }
                    if h != start {
                        splits.push(Split {
                            leaves: bits.clone(),
                            half_edge: h,
                        });
                    }
                }
            }
            cache[h] = Some(bits);
        }

        Ok(TreeSplits {
            splits,
            num_leaves,
            words,
        })
    }

    /// The defining half-edge of every split, in split order.
    pub fn representatives(&self) -> Vec<HalfEdgeId> {
        self.splits.iter().map(|s| s.half_edge).collect()
    }

    pub fn len(&self) -> usize {
        self.splits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.splits.is_empty()
    }
}

fn taxon_bit(taxon: TaxonId, num_leaves: usize) -> Result<usize> {
    let bit = taxon as usize - 1;
    if bit >= num_leaves {
        return Err(CompressError::InconsistentTaxa(format!(
            "taxon {taxon} outside 1..={num_leaves}"
        )));
    }
    Ok(bit)
}

/// Flags, for both trees, which splits the other tree shares.
///
/// RF = |A| + |B| - 2|A ∩ B|, counted here as the number of `false` flags
/// over both trees. Any parity is accepted; trees with polytomies can be at
/// odd distance.
pub fn compare_splits(a: &TreeSplits, b: &TreeSplits) -> SplitComparison {
    let set_a: HashSet<&Bitset> = a.splits.iter().map(|s| &s.leaves).collect();
    let set_b: HashSet<&Bitset> = b.splits.iter().map(|s| &s.leaves).collect();

    let present1: Vec<bool> = a.splits.iter().map(|s| set_b.contains(&s.leaves)).collect();
    let present2: Vec<bool> = b.splits.iter().map(|s| set_a.contains(&s.leaves)).collect();

    let rf_distance = present1.iter().chain(&present2).filter(|&&p| !p).count();

    SplitComparison {
        present1,
        present2,
        rf_distance,
    }
}

/// Checks that both trees carry exactly the taxa `1..=L`.
///
/// # Errors
/// `TipCountMismatch` for different leaf counts, `InconsistentTaxa` otherwise.
pub fn check_consistency(tree1: &UnrootedTree, tree2: &UnrootedTree) -> Result<()> {
    let (n1, n2) = (tree1.leaf_count(), tree2.leaf_count());
    if n1 != n2 {
        return Err(CompressError::TipCountMismatch(n1, n2));
    }

    let expected: Vec<TaxonId> = (1..=n1 as TaxonId).collect();
    for (label, tree) in [("tree 1", tree1), ("tree 2", tree2)] {
        let taxa = tree.leaves().map(|(_, taxon)| taxon).sorted_unstable().collect_vec();
        if taxa != expected {
            return Err(CompressError::InconsistentTaxa(format!(
                "{label} taxa are not exactly 1..={n1}"
            )));
        }
    }
    Ok(())
}

/// Robinson-Foulds distance between two trees.
pub fn robinson_foulds(tree1: &UnrootedTree, tree2: &UnrootedTree) -> Result<usize> {
    check_consistency(tree1, tree2)?;
    let a = TreeSplits::from_tree(tree1)?;
    let b = TreeSplits::from_tree(tree2)?;
    Ok(compare_splits(&a, &b).rf_distance)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree(newick: &str) -> UnrootedTree {
        UnrootedTree::from_newick(newick).unwrap()
    }

    #[test]
    fn test_split_count_for_binary_tree() {
        for (newick, leaves) in [
            ("((1,2),(3,(4,5)));", 5),
            ("(1,(2,(3,(4,(5,(6,7))))));", 7),
            ("(((8,2),(5,1)),((3,7),(6,4)));", 8),
        ] {
            let splits = TreeSplits::from_tree(&tree(newick)).unwrap();
            assert_eq!(splits.len(), leaves - 3, "{newick}");
            for split in &splits.splits {
                assert!(!split.leaves.contains(0), "anchor on far side in {newick}");
                let size = split.leaves.count_ones();
                assert!(size >= 2 && size <= leaves - 2);
            }
        }
    }

    #[test]
    fn test_splits_of_five_leaf_tree() {
        let t = tree("((1,2),(3,(4,5)));");
        let splits = TreeSplits::from_tree(&t).unwrap();
        let sides: Vec<u64> = splits.splits.iter().map(|s| s.leaves.0[0]).collect();
        // post-order: the cherry comes before its parent
        assert_eq!(sides, vec![0b11000, 0b11100]);
        for split in &splits.splits {
            assert!(!t.is_leaf(split.half_edge));
            assert!(!t.is_leaf(t.partner(split.half_edge)));
        }
    }

    #[test]
    fn test_rf_identical_and_single_move() {
        let a = tree("((1,2),(3,(4,5)));");
        let b = tree("((2,1),((5,4),3));");
        let c = tree("((1,2),((3,4),5));");
        assert_eq!(robinson_foulds(&a, &b).unwrap(), 0);
        assert_eq!(robinson_foulds(&a, &c).unwrap(), 2);

        let cmp = compare_splits(
            &TreeSplits::from_tree(&a).unwrap(),
            &TreeSplits::from_tree(&c).unwrap(),
        );
        assert_eq!(cmp.present1.iter().filter(|p| !**p).count(), 1);
        assert_eq!(cmp.present2.iter().filter(|p| !**p).count(), 1);
    }

    #[test]
    fn test_rf_against_polytomy_can_be_odd() {
        let binary = tree("((1,2),(3,(4,5)));");
        let star_like = tree("(1,2,3,(4,5));");
        assert_eq!(robinson_foulds(&binary, &star_like).unwrap(), 1);
        assert_eq!(robinson_foulds(&star_like, &binary).unwrap(), 1);
    }

    #[test]
    fn test_consistency_checks() {
        let a = tree("((1,2),(3,(4,5)));");
        let fewer = tree("((1,2),(3,4));");
        let gap = tree("((1,2),(3,(4,6)));");
        assert!(matches!(
            check_consistency(&a, &fewer),
            Err(CompressError::TipCountMismatch(5, 4))
        ));
        assert!(matches!(
            check_consistency(&a, &gap),
            Err(CompressError::InconsistentTaxa(_))
        ));
        assert!(check_consistency(&a, &a).is_ok());
    }
}
