//! Private fragments of tree 2 relative to the consensus.
//!
//! # Overview
//! An edge of tree 2 is *private* when its split is missing from tree 1.
//! Connected runs of private edges form fragments; each fragment is cut off
//! from the rest of the tree at shared edges, its *attachment points*.
//!
//! ```text
//!   consensus vertex            fragment
//!        |                       0 1        (the private {3,4} edge)
//!   ┌────┼─────┐                 3 4 5  →  1 2 3
//!   3    4     5       tree 2:  ((3,4),5) hanging below a shared edge
//! ```
//!
//! For each fragment two things are stored:
//! - the balanced-parenthesis topology of its private edges, and
//! - the canonical keys of its attachment points in visiting order,
//!   replaced by their ranks so the values are `1..=k`.
//!
//! Fragments are found breadth-first over scan starts (a FIFO worklist
//! seeded with the anchor's neighbour) and depth-first inside each
//! fragment. That order is part of the output format.

use crate::consensus::Consensus;
use crate::error::Result;
use crate::succinct::{CLOSE, OPEN, SuccinctEncoding};
use crate::tree::{HalfEdgeId, UnrootedTree};
use std::collections::VecDeque;
use tracing::debug;

/// Separator between fragment topologies in [`ConsensusDelta::combined_topology`].
pub const TOPOLOGY_SEPARATOR: bool = CLOSE;

/// Separator between fragment permutations in [`ConsensusDelta::combined_permutation`].
pub const PERMUTATION_SEPARATOR: u32 = 0;

/// One maximal private region of tree 2.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Fragment {
    pub topology: Vec<bool>,
    pub permutation: Vec<u32>,
}

impl Fragment {
    /// Replaces every value by its rank among the values (1-based).
    ///
    /// # Example
    /// `[7, 3, 12]` → `[2, 1, 3]`
    pub fn normalize(&mut self) {
        let mut sorted = self.permutation.clone();
        sorted.sort_unstable();
        for value in &mut self.permutation {
            *value = sorted.partition_point(|&v| v < *value) as u32 + 1;
        }
    }
}

/// Everything needed to rebuild tree 2 from tree 1.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsensusDelta {
    pub contracted_edge_ids: Vec<u32>,
    pub consensus_encoding: SuccinctEncoding,
    pub fragments: Vec<Fragment>,
    pub combined_topology: Vec<bool>,
    pub combined_permutation: Vec<u32>,
}

impl ConsensusDelta {
    pub fn new(consensus: Consensus, fragments: Vec<Fragment>) -> Self {
        let (combined_topology, combined_permutation) = combine(&fragments);
        ConsensusDelta {
            contracted_edge_ids: consensus.contracted_edge_ids,
            consensus_encoding: consensus.encoding,
            fragments,
            combined_topology,
            combined_permutation,
        }
    }
}

/// Marks both half-edges of every split of tree 2 that tree 1 lacks.
pub fn private_half_edges(
    tree: &UnrootedTree,
    representatives: &[HalfEdgeId],
    present: &[bool],
) -> Vec<bool> {
    let mut private = vec![false; tree.half_edge_count()];
    for (&h, &shared) in representatives.iter().zip(present) {
        if !shared {
            private[h] = true;
            private[tree.partner(h)] = true;
        }
    }
    private
}

/// Splits `tree2` into its private fragments.
///
/// `tree2` must be in canonical order with keys set; the keys double as
/// attachment tags. Scan starts that reach no private edge yield nothing.
pub fn extract(
    tree2: &UnrootedTree,
    representatives: &[HalfEdgeId],
    present: &[bool],
) -> Result<Vec<Fragment>> {
    let private = private_half_edges(tree2, representatives, present);
    let mut worklist = VecDeque::from([tree2.start()?]);
    let mut fragments = Vec::new();

    while let Some(scan_start) = worklist.pop_front() {
        if tree2.is_leaf(scan_start) {
            continue;
        }
        let mut fragment = Fragment::default();
        collect(tree2, scan_start, &private, &mut fragment, &mut worklist);
        if !fragment.topology.is_empty() {
            fragment.normalize();
            fragments.push(fragment);
        }
    }

    debug!(fragments = fragments.len(), "extracted private fragments of tree 2");
    Ok(fragments)
}

/// Pending work of [`collect`], kept on an explicit stack.
enum Visit {
    Vertex(HalfEdgeId),
    Open,
    Close,
    Attachment(HalfEdgeId),
}

/// Depth-first over the private edges reachable from `scan_start`. Shared
/// child edges become attachment points and later scan starts.
fn collect(
    tree: &UnrootedTree,
    scan_start: HalfEdgeId,
    private: &[bool],
    fragment: &mut Fragment,
    worklist: &mut VecDeque<HalfEdgeId>,
) {
    let mut stack = vec![Visit::Vertex(scan_start)];
    while let Some(visit) = stack.pop() {
        match visit {
            Visit::Vertex(h) => {
                let children: Vec<HalfEdgeId> = tree.children(h).collect();
                for &child in children.iter().rev() {
                    if private[child] {
                        stack.push(Visit::Close);
                        stack.push(Visit::Vertex(tree.partner(child)));
                        stack.push(Visit::Open);
                    } else {
                        stack.push(Visit::Attachment(child));
                    }
                }
            }
            Visit::Open => fragment.topology.push(OPEN),
            Visit::Close => fragment.topology.push(CLOSE),
            Visit::Attachment(child) => {
                fragment.permutation.push(tree[child].canonical_key);
                worklist.push_back(tree.partner(child));
            }
        }
    }
}

/// Concatenates all fragments with one separator between neighbours.
pub fn combine(fragments: &[Fragment]) -> (Vec<bool>, Vec<u32>) {
    let topologies: Vec<&[bool]> = fragments.iter().map(|f| f.topology.as_slice()).collect();
    let permutations: Vec<&[u32]> = fragments.iter().map(|f| f.permutation.as_slice()).collect();
    (
        topologies.join(&TOPOLOGY_SEPARATOR),
        permutations.join(&PERMUTATION_SEPARATOR),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::canonicalize;
    use crate::splits::{TreeSplits, compare_splits};

    fn fragments_of(first: &str, second: &str) -> Vec<Fragment> {
        let mut t1 = UnrootedTree::from_newick(first).unwrap();
        let mut t2 = UnrootedTree::from_newick(second).unwrap();
        canonicalize(&mut t1).unwrap();
        canonicalize(&mut t2).unwrap();
        let s1 = TreeSplits::from_tree(&t1).unwrap();
        let s2 = TreeSplits::from_tree(&t2).unwrap();
        let cmp = compare_splits(&s1, &s2);
        extract(&t2, &s2.representatives(), &cmp.present2).unwrap()
    }

    #[test]
    fn test_normalize_ranks() {
        let mut fragment = Fragment {
            topology: vec![OPEN, CLOSE],
            permutation: vec![7, 3, 12],
        };
        fragment.normalize();
        assert_eq!(fragment.permutation, vec![2, 1, 3]);
    }

    #[test]
    fn test_identical_trees_have_no_fragments() {
        assert!(fragments_of("((1,2),(3,(4,5)));", "(((5,4),3),(1,2));").is_empty());
    }

    #[test]
    fn test_single_fragment() {
        let fragments = fragments_of("((1,2),(3,(4,5)));", "((1,2),((3,4),5));");
        assert_eq!(
            fragments,
            vec![Fragment {
                topology: vec![OPEN, CLOSE],
                permutation: vec![1, 2, 3],
            }]
        );
    }

    #[test]
    fn test_fragment_in_both_directions() {
        let forward = fragments_of("((1,2),(3,(4,5)));", "((1,2),((3,4),5));");
        let backward = fragments_of("((1,2),((3,4),5));", "((1,2),(3,(4,5)));");
        assert_eq!(forward.len(), 1);
        assert_eq!(backward.len(), 1);
        assert_eq!(backward[0].permutation, vec![1, 2, 3]);
    }

    #[test]
    fn test_fragments_are_balanced_permutations() {
        let fragments = fragments_of(
            "(((1,2),(3,4)),((5,6),(7,8)));",
            "(((1,8),(3,6)),((5,4),(7,2)));",
        );
        assert!(!fragments.is_empty());
        for fragment in &fragments {
            assert!(crate::succinct::is_balanced(&fragment.topology));
            let mut ranks = fragment.permutation.clone();
            ranks.sort_unstable();
            assert_eq!(ranks, (1..=ranks.len() as u32).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_combine_separates_neighbours() {
        let fragments = vec![
            Fragment { topology: vec![OPEN, CLOSE], permutation: vec![1, 2, 3] },
            Fragment { topology: vec![OPEN, OPEN, CLOSE, CLOSE], permutation: vec![2, 1, 3, 4] },
        ];
        let (topology, permutation) = combine(&fragments);
        assert_eq!(topology, vec![OPEN, CLOSE, CLOSE, OPEN, OPEN, CLOSE, CLOSE]);
        assert_eq!(permutation, vec![1, 2, 3, 0, 2, 1, 3, 4]);

        let (topology, permutation) = combine(&[]);
        assert!(topology.is_empty());
        assert!(permutation.is_empty());
    }
}
