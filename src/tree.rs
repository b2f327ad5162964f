//! Unrooted tree stored as an arena of half-edges.
//!
//! # Overview
//! Every undirected edge is a pair of half-edges, one at each endpoint,
//! linked through `partner`. The half-edges around one internal vertex form
//! a cycle through `rotation_next`. A leaf is a vertex with a single
//! half-edge, so its `rotation_next` is `None`.
//!
//! ```text
//!            2
//!            |  h2
//!     h1     |
//!  1 ---- [ vertex ] ---- ...
//!                     h3
//!
//!  rotation: h1 -> h2 -> h3 -> h1
//! ```
//!
//! Half-edges are addressed by dense indices into one `Vec`. Contraction
//! only rewrites `rotation_next` links; the removed half-edges stay in the
//! arena, flagged, and are never reached again by a traversal.
//!
//! # Anchor
//! The leaf with taxon id 1 fixes where traversals start. The tree is still
//! unrooted, the anchor only makes traversal order deterministic.

use crate::error::{CompressError, Result};
use phylotree::tree::Tree as PhyloTree;
use std::ops::Index;

/// Index of a half-edge in the arena.
pub type HalfEdgeId = usize;

/// Positive taxon identifier carried by a leaf.
pub type TaxonId = u32;

/// Taxon id of the leaf that anchors every traversal.
pub const ANCHOR_TAXON: TaxonId = 1;

/// Key of a half-edge that [`crate::canonical::set_keys`] has not reached.
pub const UNSET_KEY: TaxonId = TaxonId::MAX;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Leaf(TaxonId),
    Internal,
}

/// One directed endpoint of an undirected edge.
#[derive(Clone, Debug)]
pub struct HalfEdge {
    pub index: HalfEdgeId,
    pub role: Role,
    /// Half-edge at the other end of the same edge.
    pub partner: HalfEdgeId,
    /// Next half-edge around the same vertex; `None` for leaves.
    pub rotation_next: Option<HalfEdgeId>,
    /// Branch length, equal on both partners.
    pub length: f64,
    /// Smallest taxon id reachable through this edge, away from the anchor.
    pub canonical_key: TaxonId,
    contracted: bool,
}

impl HalfEdge {
    #[inline]
    pub fn is_leaf(&self) -> bool {
        matches!(self.role, Role::Leaf(_))
    }

    #[inline]
    pub fn taxon(&self) -> Option<TaxonId> {
        match self.role {
            Role::Leaf(taxon) => Some(taxon),
            Role::Internal => None,
        }
    }

    #[inline]
    pub fn is_contracted(&self) -> bool {
        self.contracted
    }
}

/// An unrooted tree (binary until contracted) owning all of its half-edges.
#[derive(Clone, Debug)]
pub struct UnrootedTree {
    half_edges: Vec<HalfEdge>,
    leaf_count: usize,
    contracted_edges: usize,
}

/// One event of a depth-first traversal.
///
/// Children are reported in the current rotation order. For a child
/// half-edge `c` the sequence is `Open(c)`, the events of the subtree
/// entered at `partner(c)`, then `Close(c)`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    /// Arrived at the vertex owning this half-edge, through its edge.
    Enter(HalfEdgeId),
    /// About to cross the edge of this child half-edge.
    Open(HalfEdgeId),
    /// Came back across the edge of this child half-edge.
    Close(HalfEdgeId),
    /// Every child of the vertex entered through this half-edge is done.
    Exit(HalfEdgeId),
}

impl UnrootedTree {
    /// Parses a Newick string and converts it into the half-edge arena.
    ///
    /// # Errors
    /// `Newick` when the text does not parse, plus everything
    /// [`UnrootedTree::from_phylotree`] rejects.
    pub fn from_newick(newick: &str) -> Result<Self> {
        let phylo = PhyloTree::from_newick(newick.trim())
            .map_err(|e| CompressError::Newick(e.to_string()))?;
        Self::from_phylotree(&phylo)
    }

    /// Converts a parsed (rooted) tree into the unrooted half-edge form.
    ///
    /// # Algorithm
    /// 1. Every non-root node becomes a vertex whose first half-edge points
    ///    to its parent, followed by one half-edge per child.
    /// 2. A root with two children is suppressed: the two child edges are
    ///    joined into one edge carrying the sum of both lengths.
    /// 3. A root with three or more children becomes an ordinary vertex.
    ///
    /// Missing branch lengths are read as 0.0.
    ///
    /// # Errors
    /// `InvalidTaxon` for leaves without a positive integer label,
    /// `UnaryNode` for nodes with one child, `TooFewLeaves` below three leaves.
    pub fn from_phylotree(tree: &PhyloTree) -> Result<Self> {
        let root_id = tree.get_root().map_err(|e| CompressError::Newick(e.to_string()))?;
        let root = tree.get(&root_id).map_err(|e| CompressError::Newick(e.to_string()))?;

        let mut arena = UnrootedTree {
            half_edges: Vec::new(),
            leaf_count: 0,
            contracted_edges: 0,
        };

        match root.children.len() {
            0 => return Err(CompressError::TooFewLeaves(1)),
            1 => return Err(CompressError::UnaryNode(root_id)),
            2 => {
                let left = arena.attach(tree, root.children[0])?;
                let right = arena.attach(tree, root.children[1])?;
                let length = arena.half_edges[left].length + arena.half_edges[right].length;
                arena.link(left, right);
                arena.half_edges[left].length = length;
                arena.half_edges[right].length = length;
            }
            _ => {
                arena.attach_vertex(tree, &root.children, None)?;
            }
        }

        if arena.leaf_count < 3 {
            return Err(CompressError::TooFewLeaves(arena.leaf_count));
        }
        Ok(arena)
    }

    /// Builds the subtree below `node_id` and returns the half-edge at its
    /// top vertex that points towards the parent.
    fn attach(&mut self, tree: &PhyloTree, node_id: usize) -> Result<HalfEdgeId> {
        let node = tree.get(&node_id).map_err(|e| CompressError::Newick(e.to_string()))?;
        let length = node.parent_edge.unwrap_or(0.0);

        match node.children.len() {
            0 => {
                let taxon = parse_taxon(node.name.as_deref())?;
                self.leaf_count += 1;
                Ok(self.push(Role::Leaf(taxon), length))
            }
            1 => Err(CompressError::UnaryNode(node_id)),
            _ => self.attach_vertex(tree, &node.children, Some(length)),
        }
    }

    /// Creates an internal vertex with one half-edge per child, plus a home
    /// half-edge towards the parent when `parent_length` is given.
    fn attach_vertex(
        &mut self,
        tree: &PhyloTree,
        children: &[usize],
        parent_length: Option<f64>,
    ) -> Result<HalfEdgeId> {
        let home = parent_length.map(|length| self.push(Role::Internal, length));
        let mut first = None;
        let mut prev = home;

        for &child in children {
            let below = self.attach(tree, child)?;
            let length = self.half_edges[below].length;
            let here = self.push(Role::Internal, length);
            self.link(here, below);
            match prev {
                Some(p) => self.half_edges[p].rotation_next = Some(here),
                None => first = Some(here),
            }
            prev = Some(here);
        }

        // Close the cycle; without a home the first child half-edge starts it.
        let head = home.or(first).ok_or(CompressError::TooFewLeaves(0))?;
        if let Some(last) = prev {
            self.half_edges[last].rotation_next = Some(head);
        }
        Ok(head)
    }

    fn push(&mut self, role: Role, length: f64) -> HalfEdgeId {
        let index = self.half_edges.len();
        let canonical_key = match role {
            Role::Leaf(taxon) => taxon,
            Role::Internal => UNSET_KEY,
        };
        self.half_edges.push(HalfEdge {
            index,
            role,
            partner: index,
            rotation_next: None,
            length,
            canonical_key,
            contracted: false,
        });
        index
    }

    fn link(&mut self, a: HalfEdgeId, b: HalfEdgeId) {
        self.half_edges[a].partner = b;
        self.half_edges[b].partner = a;
    }

    #[inline]
    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Number of arena slots, including contracted half-edges.
    #[inline]
    pub fn half_edge_count(&self) -> usize {
        self.half_edges.len()
    }

    #[inline]
    pub fn contracted_edges(&self) -> usize {
        self.contracted_edges
    }

    #[inline]
    pub fn partner(&self, h: HalfEdgeId) -> HalfEdgeId {
        self.half_edges[h].partner
    }

    #[inline]
    pub fn is_leaf(&self, h: HalfEdgeId) -> bool {
        self.half_edges[h].is_leaf()
    }

    /// Bits the succinct topology of this tree must have:
    /// `4L - 2` minus two per contracted edge.
    pub fn expected_topology_bits(&self) -> usize {
        4 * self.leaf_count - 2 - 2 * self.contracted_edges
    }

    /// All leaf half-edges with their taxa, in arena order.
    pub fn leaves(&self) -> impl Iterator<Item = (HalfEdgeId, TaxonId)> + '_ {
        self.half_edges
            .iter()
            .filter_map(|h| h.taxon().map(|taxon| (h.index, taxon)))
    }

    /// Finds the leaf carrying taxon id 1.
    ///
    /// # Errors
    /// `MissingAnchor` if no leaf carries it, `DuplicateAnchor` if several do.
    pub fn anchor(&self) -> Result<HalfEdgeId> {
        let mut anchors = self
            .leaves()
            .filter(|&(_, taxon)| taxon == ANCHOR_TAXON)
            .map(|(h, _)| h);
        let anchor = anchors.next().ok_or(CompressError::MissingAnchor)?;
        if anchors.next().is_some() {
            return Err(CompressError::DuplicateAnchor);
        }
        Ok(anchor)
    }

    /// Half-edge at the anchor's neighbour through which traversals start.
    pub fn start(&self) -> Result<HalfEdgeId> {
        Ok(self.partner(self.anchor()?))
    }

    /// Children of the vertex owning `h`, seen from `h`: the rest of its
    /// rotation in order. Empty for a leaf.
    pub fn children(&self, h: HalfEdgeId) -> Children<'_> {
        Children {
            tree: self,
            home: h,
            current: self.half_edges[h].rotation_next,
        }
    }

    /// Lazy depth-first traversal starting with `Enter(start)`.
    pub fn depth_first(&self, start: HalfEdgeId) -> DepthFirst<'_> {
        DepthFirst {
            tree: self,
            stack: vec![Step::Enter(start)],
        }
    }

    /// The half-edge whose `rotation_next` is `h`. Walks the rotation, so
    /// this costs the degree of the vertex.
    pub fn predecessor(&self, h: HalfEdgeId) -> Option<HalfEdgeId> {
        let first = self.half_edges[h].rotation_next?;
        let mut current = first;
        loop {
            let next = self.half_edges[current].rotation_next?;
            if next == h {
                return Some(current);
            }
            if next == first {
                return None;
            }
            current = next;
        }
    }

    /// Removes the edge of `h` by merging the rotations at both endpoints.
    ///
    /// The predecessor of `h` is linked to the successor of its partner and
    /// vice versa, so the two endpoint vertices become one vertex of higher
    /// degree. Both half-edges of the removed edge stay in the arena but
    /// are unreachable from then on.
    ///
    /// # Errors
    /// `NotContractible` if either endpoint is a leaf or the edge is already gone.
    pub fn contract(&mut self, h: HalfEdgeId) -> Result<()> {
        let other = self.partner(h);
        if self.is_leaf(h)
            || self.is_leaf(other)
            || self.half_edges[h].contracted
            || self.half_edges[other].contracted
        {
            return Err(CompressError::NotContractible(h));
        }

        let before_h = self.predecessor(h).ok_or(CompressError::NotContractible(h))?;
        let before_other = self.predecessor(other).ok_or(CompressError::NotContractible(h))?;
        let after_h = self.half_edges[h].rotation_next;
        let after_other = self.half_edges[other].rotation_next;

        self.half_edges[before_h].rotation_next = after_other;
        self.half_edges[before_other].rotation_next = after_h;
        self.half_edges[h].contracted = true;
        self.half_edges[other].contracted = true;
        self.contracted_edges += 1;
        Ok(())
    }

    /// Stores `key` on `h` and its partner.
    pub(crate) fn set_key(&mut self, h: HalfEdgeId, key: TaxonId) {
        let other = self.partner(h);
        self.half_edges[h].canonical_key = key;
        self.half_edges[other].canonical_key = key;
    }

    /// Re-links the rotation of the vertex owning `home` to
    /// `home -> children[0] -> ... -> home`.
    pub(crate) fn relink(&mut self, home: HalfEdgeId, children: &[HalfEdgeId]) {
        let mut prev = home;
        for &child in children {
            self.half_edges[prev].rotation_next = Some(child);
            prev = child;
        }
        self.half_edges[prev].rotation_next = Some(home);
    }
}

impl Index<HalfEdgeId> for UnrootedTree {
    type Output = HalfEdge;

    fn index(&self, h: HalfEdgeId) -> &HalfEdge {
        &self.half_edges[h]
    }
}

fn parse_taxon(name: Option<&str>) -> Result<TaxonId> {
    let label = name.unwrap_or_default().trim();
    match label.parse::<TaxonId>() {
        Ok(taxon) if taxon > 0 => Ok(taxon),
        _ => Err(CompressError::InvalidTaxon(label.to_string())),
    }
}

/// Iterator over the rotation of one vertex, starting after `home`.
pub struct Children<'a> {
    tree: &'a UnrootedTree,
    home: HalfEdgeId,
    current: Option<HalfEdgeId>,
}

impl Iterator for Children<'_> {
    type Item = HalfEdgeId;

    fn next(&mut self) -> Option<HalfEdgeId> {
        let current = self.current.filter(|&c| c != self.home)?;
        self.current = self.tree.half_edges[current].rotation_next;
        Some(current)
    }
}

/// Explicit-stack depth-first traversal, see [`Step`].
pub struct DepthFirst<'a> {
    tree: &'a UnrootedTree,
    stack: Vec<Step>,
}

impl Iterator for DepthFirst<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        let step = self.stack.pop()?;
        if let Step::Enter(h) = step {
            self.stack.push(Step::Exit(h));
            let children: Vec<HalfEdgeId> = self.tree.children(h).collect();
            for &child in children.iter().rev() {
                self.stack.push(Step::Close(child));
                self.stack.push(Step::Enter(self.tree.partner(child)));
                self.stack.push(Step::Open(child));
            }
        }
        Some(step)
    }
}
