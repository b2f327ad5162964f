//! Compression pipelines built from the individual stages.
//!
//! - [`simple_compression`]: one tree → [`SuccinctEncoding`].
//! - [`rf_compression`]: two trees → tree 1's encoding plus the
//!   [`ConsensusDelta`] that turns tree 1 into tree 2.
//! - [`compress_series`]: every consecutive pair of a tree sequence, in parallel.

use crate::canonical::canonicalize;
use crate::consensus::build_consensus;
use crate::delta::{ConsensusDelta, extract};
use crate::error::Result;
use crate::splits::{TreeSplits, check_consistency, compare_splits};
use crate::succinct::{SuccinctEncoding, encode};
use crate::tree::UnrootedTree;
use itertools::Itertools;
use rayon::prelude::*;
use tracing::{debug, info};

/// Output of [`rf_compression`].
#[derive(Debug, Clone, PartialEq)]
pub struct RfCompression {
    /// Full encoding of tree 1.
    pub tree1: SuccinctEncoding,
    pub delta: ConsensusDelta,
    pub rf_distance: usize,
}

/// Canonically orders `tree` and encodes it.
pub fn simple_compression(tree: &mut UnrootedTree) -> Result<SuccinctEncoding> {
    canonicalize(tree)?;
    let encoding = encode(tree)?;
    debug!(bits = encoding.topology.len(), leaves = encoding.leaf_order.len(), "encoded tree");
    Ok(encoding)
}

/// Encodes `tree1` and the delta from `tree1` to `tree2`.
///
/// # Algorithm
/// 1. Validate tip count and taxon numbering of both trees.
/// 2. Canonically order both trees and encode tree 1.
/// 3. Compare the splits of both trees (RF distance and presence flags).
/// 4. Contract tree 1's private edges and encode the consensus.
/// 5. Extract tree 2's private fragments.
///
/// `tree1` is consumed: contraction destroys it.
///
/// # Errors
/// Any validation, split or encoding failure; all are fatal.
pub fn rf_compression(mut tree1: UnrootedTree, mut tree2: UnrootedTree) -> Result<RfCompression> {
    check_consistency(&tree1, &tree2)?;

    canonicalize(&mut tree1)?;
    canonicalize(&mut tree2)?;
    let full1 = encode(&tree1)?;

    let splits1 = TreeSplits::from_tree(&tree1)?;
    let splits2 = TreeSplits::from_tree(&tree2)?;
    let comparison = compare_splits(&splits1, &splits2);
    debug!(rf = comparison.rf_distance, splits = splits1.len(), "compared splits");

    let consensus = build_consensus(
        &mut tree1,
        &full1,
        &splits1.representatives(),
        &comparison.present1,
        comparison.rf_distance,
    )?;
    let fragments = extract(&tree2, &splits2.representatives(), &comparison.present2)?;

    Ok(RfCompression {
        tree1: full1,
        delta: ConsensusDelta::new(consensus, fragments),
        rf_distance: comparison.rf_distance,
    })
}

/// Persisted size of every array, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompressionReport {
    pub topology: usize,
    pub permutation: usize,
    pub branch_lengths: usize,
    pub contracted_edges: usize,
    pub subtrees: usize,
    pub subtree_permutations: usize,
}

/// Bytes of a packed bit array with its length header.
pub fn bits_size(len: usize) -> usize {
    8 + len.div_ceil(64) * 8
}

/// Bytes of a 32-bit integer array with its length header.
pub fn u32s_size(len: usize) -> usize {
    8 + 4 * len
}

impl CompressionReport {
    pub fn simple(encoding: &SuccinctEncoding) -> Self {
        CompressionReport {
            topology: bits_size(encoding.topology.len()),
            permutation: u32s_size(encoding.leaf_order.len()),
            branch_lengths: 8 * encoding.branch_lengths.len(),
            ..Default::default()
        }
    }

    /// Sizes of the delta only: tree 1 is assumed to be stored already.
    pub fn rf(rf: &RfCompression) -> Self {
        CompressionReport {
            branch_lengths: 8 * rf.tree1.branch_lengths.len(),
            contracted_edges: u32s_size(rf.delta.contracted_edge_ids.len()),
            subtrees: bits_size(rf.delta.combined_topology.len()),
            subtree_permutations: u32s_size(rf.delta.combined_permutation.len()),
            ..Default::default()
        }
    }

    pub fn total_without_branches(&self) -> usize {
        self.topology
            + self.permutation
            + self.contracted_edges
            + self.subtrees
            + self.subtree_permutations
    }

    pub fn total_with_branches(&self) -> usize {
        self.total_without_branches() + self.branch_lengths
    }

    pub fn log(&self, label: &str) {
        info!(
            "{label} compressed size: {} bytes without branches, {} bytes with branches",
            self.total_without_branches(),
            self.total_with_branches()
        );
        debug!(?self, "{label} size breakdown");
    }
}

/// Summary of one consecutive pair in [`compress_series`].
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesRow {
    pub from: String,
    pub to: String,
    pub rf_distance: usize,
    pub contracted_edges: usize,
    pub fragments: usize,
    pub report: CompressionReport,
}

/// RF-compresses every consecutive pair `(t[i], t[i+1])` in parallel.
///
/// Each pair is independent and works on its own clones, so the pairs run
/// on the rayon pool while each compression stays single-threaded.
pub fn compress_series(trees: &[(String, UnrootedTree)]) -> Result<Vec<SeriesRow>> {
    let pairs: Vec<_> = trees.iter().tuple_windows().collect();

    pairs
        .into_par_iter()
        .map(|((from, t1), (to, t2))| {
            let rf = rf_compression(t1.clone(), t2.clone())?;
            Ok(SeriesRow {
                from: from.clone(),
                to: to.clone(),
                rf_distance: rf.rf_distance,
                contracted_edges: rf.delta.contracted_edge_ids.len(),
                fragments: rf.delta.fragments.len(),
                report: CompressionReport::rf(&rf),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CompressError;

    fn tree(newick: &str) -> UnrootedTree {
        UnrootedTree::from_newick(newick).unwrap()
    }

    #[test]
    fn test_simple_compression_prefix() {
        let mut t = tree("((1,2),(3,(4,5)));");
        let enc = simple_compression(&mut t).unwrap();
        assert_eq!(&enc.topology[..4], &[false, false, true, false]);
        assert_eq!(enc.leaf_order[0], 1);
    }

    #[test]
    fn test_rf_compression_identical() {
        let rf = rf_compression(tree("((1,2),(3,(4,5)));"), tree("((3,(5,4)),(2,1));")).unwrap();
        assert_eq!(rf.rf_distance, 0);
        assert!(rf.delta.contracted_edge_ids.is_empty());
        assert!(rf.delta.fragments.is_empty());
        assert_eq!(rf.delta.consensus_encoding.topology, rf.tree1.topology);
    }

    #[test]
    fn test_rf_compression_one_move() {
        let rf = rf_compression(tree("((1,2),(3,(4,5)));"), tree("((1,2),((3,4),5));")).unwrap();
        assert_eq!(rf.rf_distance, 2);
        assert_eq!(rf.delta.fragments.len(), 1);
        assert_eq!(rf.delta.combined_topology, vec![false, true]);
        assert_eq!(rf.delta.combined_permutation, vec![1, 2, 3]);
        assert_eq!(rf.delta.consensus_encoding.topology.len(), 4 * 5 - 2 - 2);
    }

    #[test]
    fn test_rf_compression_validates_input() {
        assert!(matches!(
            rf_compression(tree("((1,2),(3,(4,5)));"), tree("((1,2),(3,4));")),
            Err(CompressError::TipCountMismatch(5, 4))
        ));
        assert!(matches!(
            rf_compression(tree("((1,2),(3,(4,5)));"), tree("((7,2),(3,(4,5)));")),
            Err(CompressError::InconsistentTaxa(_))
        ));
    }

    #[test]
    fn test_rf_compression_rejects_odd_distance() {
        assert!(matches!(
            rf_compression(tree("((1,2),(3,(4,5)));"), tree("(1,2,3,(4,5));")),
            Err(CompressError::OddRfDistance(1))
        ));
    }

    #[test]
    fn test_report_sizes() {
        let rf = rf_compression(tree("((1,2),(3,(4,5)));"), tree("((1,2),((3,4),5));")).unwrap();
        let report = CompressionReport::rf(&rf);
        assert_eq!(report.contracted_edges, 8 + 4);
        assert_eq!(report.subtrees, 16);
        assert_eq!(report.subtree_permutations, 8 + 12);
        assert_eq!(report.branch_lengths, 8 * 8);
        assert_eq!(report.total_with_branches(), report.total_without_branches() + 64);

        let simple = CompressionReport::simple(&rf.tree1);
        assert_eq!(simple.topology, 16);
        assert_eq!(simple.permutation, 8 + 20);
    }

    #[test]
    fn test_series_rows() {
        let trees = vec![
            ("a".to_string(), tree("((1,2),(3,(4,5)));")),
            ("b".to_string(), tree("((1,2),((3,4),5));")),
            ("c".to_string(), tree("((1,2),((3,4),5));")),
        ];
        let rows = compress_series(&trees).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!((rows[0].from.as_str(), rows[0].to.as_str()), ("a", "b"));
        assert_eq!(rows[0].rf_distance, 2);
        assert_eq!(rows[1].rf_distance, 0);
        assert_eq!(rows[1].fragments, 0);
    }
}
