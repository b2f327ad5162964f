//! Consensus of two trees: tree 1 with every split absent from tree 2
//! contracted away.
//!
//! The contracted tree keeps all splits the two trees share and nothing
//! else, so its topology is `2 · contracted` bits shorter than tree 1's:
//! `4L - R - 2` for RF distance `R`.

use crate::canonical::canonicalize;
use crate::error::{CompressError, Result};
use crate::succinct::{SuccinctEncoding, encode};
use crate::tree::{HalfEdgeId, UnrootedTree};
use tracing::debug;

/// Result of [`build_consensus`].
#[derive(Debug, Clone, PartialEq)]
pub struct Consensus {
    /// Encoding of the contracted tree.
    pub encoding: SuccinctEncoding,
    /// Edge numbers (from tree 1's full encoding) of the removed edges, ascending.
    pub contracted_edge_ids: Vec<u32>,
}

/// Contracts the private edges of `tree1` and encodes what is left.
///
/// # Parameters
/// - `full`: encoding of the uncontracted `tree1`, source of the edge numbers
/// - `representatives`: defining half-edge of each split of `tree1`
/// - `present`: per split, whether tree 2 shares it
/// - `rf_distance`: RF distance of the pair
///
/// `tree1` is left contracted and must not be used for anything else.
///
/// # Errors
/// `OddRfDistance`, `ContractionCountMismatch` when the flags do not add up
/// to `rf_distance / 2` contractions, and any encoder error.
pub fn build_consensus(
    tree1: &mut UnrootedTree,
    full: &SuccinctEncoding,
    representatives: &[HalfEdgeId],
    present: &[bool],
    rf_distance: usize,
) -> Result<Consensus> {
    if rf_distance % 2 != 0 {
        return Err(CompressError::OddRfDistance(rf_distance));
    }

    let mut contracted_edge_ids = Vec::with_capacity(rf_distance / 2);
    for (&h, &shared) in representatives.iter().zip(present) {
        if shared {
            continue;
        }
        let id = full.edge_id_of(h).ok_or_else(|| {
            CompressError::MalformedTopology(format!("half-edge {h} has no edge number"))
        })?;
        tree1.contract(h)?;
        contracted_edge_ids.push(id);
    }
    contracted_edge_ids.sort_unstable();

    if contracted_edge_ids.len() * 2 != rf_distance {
        return Err(CompressError::ContractionCountMismatch {
            expected: rf_distance / 2,
            actual: contracted_edge_ids.len(),
        });
    }
    debug!(contracted = contracted_edge_ids.len(), "contracted private edges of tree 1");

    // Merged vertices need their children re-sorted.
    canonicalize(tree1)?;
    let encoding = encode(tree1)?;

    Ok(Consensus {
        encoding,
        contracted_edge_ids,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::splits::{TreeSplits, compare_splits};
    use crate::succinct::{bits_to_string, is_balanced};

    fn consensus_of(first: &str, second: &str) -> (Consensus, usize) {
        let mut t1 = UnrootedTree::from_newick(first).unwrap();
        let mut t2 = UnrootedTree::from_newick(second).unwrap();
        canonicalize(&mut t1).unwrap();
        canonicalize(&mut t2).unwrap();
        let full = encode(&t1).unwrap();
        let s1 = TreeSplits::from_tree(&t1).unwrap();
        let s2 = TreeSplits::from_tree(&t2).unwrap();
        let cmp = compare_splits(&s1, &s2);
        let consensus =
            build_consensus(&mut t1, &full, &s1.representatives(), &cmp.present1, cmp.rf_distance)
                .unwrap();
        (consensus, cmp.rf_distance)
    }

    #[test]
    fn test_identical_trees_contract_nothing() {
        let (consensus, rf) = consensus_of("((1,2),(3,(4,5)));", "((2,1),((4,5),3));");
        assert_eq!(rf, 0);
        assert!(consensus.contracted_edge_ids.is_empty());
        assert_eq!(consensus.encoding.topology.len(), 18);
    }

    #[test]
    fn test_single_difference() {
        let (consensus, rf) = consensus_of("((1,2),(3,(4,5)));", "((1,2),((3,4),5));");
        assert_eq!(rf, 2);
        // the {4,5} edge is the fifth entered edge of tree 1
        assert_eq!(consensus.contracted_edge_ids, vec![6]);
        assert_eq!(bits_to_string(&consensus.encoding.topology), "0010010010101111");
        assert_eq!(consensus.encoding.leaf_order, vec![1, 2, 3, 4, 5]);
        assert_eq!(consensus.encoding.branch_lengths.len(), 7);
    }

    #[test]
    fn test_length_shrinks_with_rf() {
        let (consensus, rf) = consensus_of(
            "(((1,2),(3,4)),((5,6),(7,8)));",
            "(((1,8),(3,6)),((5,4),(7,2)));",
        );
        assert!(rf > 0);
        assert_eq!(consensus.encoding.topology.len(), 4 * 8 - rf - 2);
        assert_eq!(consensus.contracted_edge_ids.len(), rf / 2);
        assert!(consensus.contracted_edge_ids.windows(2).all(|w| w[0] < w[1]));
        assert!(is_balanced(&consensus.encoding.topology));
    }

    #[test]
    fn test_rejects_odd_rf() {
        let mut t = UnrootedTree::from_newick("((1,2),(3,(4,5)));").unwrap();
        canonicalize(&mut t).unwrap();
        let full = encode(&t).unwrap();
        assert!(matches!(
            build_consensus(&mut t, &full, &[], &[], 3),
            Err(CompressError::OddRfDistance(3))
        ));
    }

    #[test]
    fn test_flags_must_match_rf() {
        let mut t = UnrootedTree::from_newick("((1,2),(3,(4,5)));").unwrap();
        canonicalize(&mut t).unwrap();
        let full = encode(&t).unwrap();
        let splits = TreeSplits::from_tree(&t).unwrap();
        assert!(matches!(
            build_consensus(&mut t, &full, &splits.representatives(), &[true, true], 2),
            Err(CompressError::ContractionCountMismatch { expected: 1, actual: 0 })
        ));
    }
}
