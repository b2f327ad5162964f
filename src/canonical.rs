//! Canonical child order for every vertex.
//!
//! Two trees with the same topology can list the children of a vertex in
//! any order. To make the succinct encoding depend on topology only, each
//! half-edge gets a key, the smallest taxon id reachable through it (away
//! from the anchor), and every rotation is re-linked so children appear in
//! increasing key order.
//!
//! ```text
//!         start
//!        /     \
//!    (4,5)      3        keys: {4,5} -> 4, 3 -> 3
//!
//! after ordering:  start -> 3 -> (4,5)
//! ```

use crate::error::Result;
use crate::tree::{HalfEdgeId, Role, Step, UNSET_KEY, UnrootedTree};

/// Computes the canonical key of every reachable half-edge.
///
/// Post-order: a leaf half-edge keys to its own taxon, an internal one to
/// the minimum over its children. The key is written on both partners.
pub fn set_keys(tree: &mut UnrootedTree) -> Result<()> {
    let start = tree.start()?;
    let post_order: Vec<HalfEdgeId> = tree
        .depth_first(start)
        .filter_map(|step| match step {
            Step::Exit(h) => Some(h),
            _ => None,
        })
        .collect();

    for h in post_order {
        let key = match tree[h].role {
            Role::Leaf(taxon) => taxon,
            Role::Internal => tree
                .children(h)
                .map(|c| tree[c].canonical_key)
                .min()
                .unwrap_or(UNSET_KEY),
        };
        tree.set_key(h, key);
    }
    Ok(())
}

/// Re-links every rotation so that, after the home half-edge, children are
/// in non-decreasing key order.
///
/// Requires [`set_keys`] to have run; stale keys give a stable but
/// meaningless order. The sort is stable, so a binary vertex costs one
/// comparison and a polytomy left by contraction is handled the same way.
pub fn order(tree: &mut UnrootedTree) -> Result<()> {
    let start = tree.start()?;
    let homes: Vec<HalfEdgeId> = tree
        .depth_first(start)
        .filter_map(|step| match step {
            Step::Enter(h) if !tree.is_leaf(h) => Some(h),
            _ => None,
        })
        .collect();

    for home in homes {
        let mut children: Vec<HalfEdgeId> = tree.children(home).collect();
        children.sort_by_key(|&c| tree[c].canonical_key);
        tree.relink(home, &children);
    }
    Ok(())
}

/// [`set_keys`] followed by [`order`].
pub fn canonicalize(tree: &mut UnrootedTree) -> Result<()> {
    set_keys(tree)?;
    order(tree)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn child_keys(tree: &UnrootedTree) -> Vec<Vec<u32>> {
        let start = tree.start().unwrap();
        tree.depth_first(start)
            .filter_map(|step| match step {
                Step::Enter(h) if !tree.is_leaf(h) => {
                    Some(tree.children(h).map(|c| tree[c].canonical_key).collect())
                }
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_keys_are_subtree_minima() {
        let mut tree = UnrootedTree::from_newick("((1,5),(3,(4,2)));").unwrap();
        set_keys(&mut tree).unwrap();

        let start = tree.start().unwrap();
        // Everything except the anchor is reachable from the start vertex.
        assert_eq!(tree[start].canonical_key, 2);
        for h in tree.children(start) {
            assert_eq!(tree[h].canonical_key, tree[tree.partner(h)].canonical_key);
        }
        let mut keys: Vec<u32> = tree.children(start).map(|c| tree[c].canonical_key).collect();
        keys.sort_unstable();
        assert_eq!(keys, vec![2, 5]);
    }

    #[test]
    fn test_order_sorts_children() {
        let mut tree = UnrootedTree::from_newick("((1,5),((4,2),3));").unwrap();
        canonicalize(&mut tree).unwrap();
        for keys in child_keys(&tree) {
            assert!(keys.windows(2).all(|w| w[0] <= w[1]), "unsorted {keys:?}");
        }
    }

    #[test]
    fn test_order_is_idempotent() {
        let mut once = UnrootedTree::from_newick("((1,5),((4,2),(6,3)));").unwrap();
        canonicalize(&mut once).unwrap();
        let mut twice = once.clone();
        canonicalize(&mut twice).unwrap();

        for h in 0..once.half_edge_count() {
            assert_eq!(once[h].rotation_next, twice[h].rotation_next);
            assert_eq!(once[h].canonical_key, twice[h].canonical_key);
        }
    }

    #[test]
    fn test_order_handles_polytomy() {
        let mut tree = UnrootedTree::from_newick("((1,6),((5,4),(3,2)));").unwrap();
        canonicalize(&mut tree).unwrap();

        let start = tree.start().unwrap();
        let inner: Vec<HalfEdgeId> = tree
            .depth_first(start)
            .filter_map(|step| match step {
                Step::Enter(h) if !tree.is_leaf(h) && h != start => Some(h),
                _ => None,
            })
            .collect();
        // contract both cherries into their parent
        tree.contract(inner[1]).unwrap();
        tree.contract(inner[2]).unwrap();
        canonicalize(&mut tree).unwrap();

        let keys: Vec<u32> = tree.children(inner[0]).map(|c| tree[c].canonical_key).collect();
        assert_eq!(keys, vec![2, 3, 4, 5]);
    }
}
