//! Succinct encoding of one tree.
//!
//! # Layout
//! A tree with `L` leaves becomes three aligned arrays:
//! - `topology`: balanced parentheses, `0` = open and `1` = close, `4L-2` bits.
//! - `leaf_order`: the `L` taxa in traversal order, anchor first.
//! - `branch_lengths`: `2L-2` values, one per entered edge; slot 0 is reserved.
//!
//! The anchor is written as if it were the left child of a binary root:
//!
//! ```text
//!   0 0 1 0  <traversal of the anchor's neighbour>  1 1
//!   ( ( )  (                                         ) )
//!     anchor
//! ```
//!
//! Inside the traversal every edge contributes `0` before descending and
//! `1` after returning. Children are visited in rotation order, so the tree
//! must have been put in canonical order first ([`crate::canonical`]).
//!
//! # Example
//! `((1,2),(3,(4,5)))` encodes to
//! `0010 01 0 01 0 0101 1 1 11` with leaf order `1 2 3 4 5`.

use crate::error::{CompressError, Result};
use crate::tree::{ANCHOR_TAXON, HalfEdgeId, Role, Step, TaxonId, UnrootedTree};

pub const OPEN: bool = false;
pub const CLOSE: bool = true;

const ANCHOR_PREFIX: [bool; 4] = [OPEN, OPEN, CLOSE, OPEN];
const ANCHOR_SUFFIX: [bool; 2] = [CLOSE, CLOSE];

/// Edge numbers start here; 0 and 1 belong to the two virtual root edges
/// opened by the anchor prefix.
pub const FIRST_EDGE_ID: u32 = 2;

/// Value stored in the reserved `branch_lengths[0]` slot. The slot carries
/// no information; readers must not interpret it.
pub const RESERVED_LENGTH: f64 = 0.0;

/// Output of [`encode`].
#[derive(Debug, Clone, PartialEq)]
pub struct SuccinctEncoding {
    pub topology: Vec<bool>,
    pub leaf_order: Vec<TaxonId>,
    pub branch_lengths: Vec<f64>,
    /// Edge number per half-edge index, `None` for half-edges not reached.
    pub edge_id: Vec<Option<u32>>,
}

impl SuccinctEncoding {
    #[inline]
    pub fn edge_id_of(&self, h: HalfEdgeId) -> Option<u32> {
        self.edge_id.get(h).copied().flatten()
    }
}

/// Encodes `tree` in its current rotation order.
///
/// # Algorithm
/// 1. Emit the anchor prefix and seed `leaf_order` with the anchor.
/// 2. Depth-first from the anchor's neighbour: `Open` → `0`, `Close` → `1`,
///    every `Enter` appends the edge's length and numbers both half-edges
///    of the edge; leaves append their taxon.
/// 3. Emit the suffix and check the sizes against the tree.
///
/// # Errors
/// `TopologyLengthMismatch` / `PermutationLengthMismatch` when the tree is
/// not binary apart from contracted edges; `MissingAnchor` /
/// `DuplicateAnchor` from the anchor lookup.
pub fn encode(tree: &UnrootedTree) -> Result<SuccinctEncoding> {
    let start = tree.start()?;
    let expected_bits = tree.expected_topology_bits();
    let expected_lengths = 2 * tree.leaf_count() - 2 - tree.contracted_edges();

    let mut topology = Vec::with_capacity(expected_bits);
    let mut leaf_order = Vec::with_capacity(tree.leaf_count());
    let mut branch_lengths = Vec::with_capacity(expected_lengths);
    let mut edge_id = vec![None; tree.half_edge_count()];
    let mut next_edge = FIRST_EDGE_ID;

    topology.extend_from_slice(&ANCHOR_PREFIX);
    leaf_order.push(ANCHOR_TAXON);
    branch_lengths.push(RESERVED_LENGTH);

    for step in tree.depth_first(start) {
        match step {
            Step::Enter(h) => {
                branch_lengths.push(tree[h].length);
                edge_id[h] = Some(next_edge);
                edge_id[tree.partner(h)] = Some(next_edge);
                next_edge += 1;
                if let Role::Leaf(taxon) = tree[h].role {
                    leaf_order.push(taxon);
                }
            }
            Step::Open(_) => topology.push(OPEN),
            Step::Close(_) => topology.push(CLOSE),
            Step::Exit(_) => {}
        }
    }
    topology.extend_from_slice(&ANCHOR_SUFFIX);

    if topology.len() != expected_bits {
        return Err(CompressError::TopologyLengthMismatch {
            expected: expected_bits,
            actual: topology.len(),
        });
    }
    if leaf_order.len() != tree.leaf_count() {
        return Err(CompressError::PermutationLengthMismatch {
            expected: tree.leaf_count(),
            actual: leaf_order.len(),
        });
    }
    debug_assert_eq!(branch_lengths.len(), expected_lengths);

    Ok(SuccinctEncoding {
        topology,
        leaf_order,
        branch_lengths,
        edge_id,
    })
}

/// True if the running balance never drops below zero and ends at zero.
pub fn is_balanced(bits: &[bool]) -> bool {
    let mut depth: i64 = 0;
    for &bit in bits {
        depth += if bit == OPEN { 1 } else { -1 };
        if depth < 0 {
            return false;
        }
    }
    depth == 0
}

/// Renders bits as a `0`/`1` string.
pub fn bits_to_string(bits: &[bool]) -> String {
    bits.iter().map(|&b| if b { '1' } else { '0' }).collect()
}
