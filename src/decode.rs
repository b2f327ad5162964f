//! Rebuilding Newick text from a succinct encoding.
//!
//! Reverses [`crate::succinct::encode`]: the anchor becomes one child of a
//! two-child root and the traversal body becomes the other, so parsing the
//! output and unrooting it yields the encoded tree again. The anchor side
//! gets length 0, the other side carries the anchor's pendant edge.

use crate::error::{CompressError, Result};
use crate::succinct::{CLOSE, OPEN, SuccinctEncoding, is_balanced};
use crate::tree::TaxonId;
use std::fmt::Write;

const PREFIX_LEN: usize = 4;
const SUFFIX_LEN: usize = 2;

/// Converts an encoding (full or consensus) back to a Newick string.
///
/// # Errors
/// `MalformedTopology` when the anchor framing, balance, leaf count or
/// branch-length count does not fit the bits.
pub fn to_newick(encoding: &SuccinctEncoding) -> Result<String> {
    let bits = &encoding.topology;
    if bits.len() < PREFIX_LEN + SUFFIX_LEN
        || bits[..PREFIX_LEN] != [OPEN, OPEN, CLOSE, OPEN]
        || bits[bits.len() - SUFFIX_LEN..] != [CLOSE, CLOSE]
    {
        return Err(malformed("missing anchor framing"));
    }
    if !is_balanced(bits) {
        return Err(malformed("unbalanced parentheses"));
    }
    let anchor = *encoding
        .leaf_order
        .first()
        .ok_or_else(|| malformed("empty leaf order"))?;
    let pendant = *encoding
        .branch_lengths
        .get(1)
        .ok_or_else(|| malformed("missing anchor branch length"))?;

    let mut reader = Reader {
        body: &bits[PREFIX_LEN..bits.len() - SUFFIX_LEN],
        pos: 0,
        leaves: &encoding.leaf_order[1..],
        next_leaf: 0,
        lengths: &encoding.branch_lengths,
        next_length: 2,
    };

    let mut out = String::new();
    write!(out, "({anchor}:0,").map_err(fmt_error)?;
    reader.body(&mut out)?;
    write!(out, ":{pendant});").map_err(fmt_error)?;

    if reader.next_leaf != reader.leaves.len() {
        return Err(malformed("leaf order longer than topology"));
    }
    Ok(out)
}

struct Reader<'a> {
    body: &'a [bool],
    pos: usize,
    leaves: &'a [TaxonId],
    next_leaf: usize,
    lengths: &'a [f64],
    next_length: usize,
}

/// An internal vertex whose child list is still being written.
struct Frame {
    has_child: bool,
    length: f64,
}

impl Reader<'_> {
    fn peek(&self) -> Option<bool> {
        self.body.get(self.pos).copied()
    }

    fn next_length(&mut self) -> Result<f64> {
        let length = *self
            .lengths
            .get(self.next_length)
            .ok_or_else(|| malformed("too few branch lengths"))?;
        self.next_length += 1;
        Ok(length)
    }

    fn next_taxon(&mut self) -> Result<TaxonId> {
        let taxon = *self
            .leaves
            .get(self.next_leaf)
            .ok_or_else(|| malformed("too few leaves in leaf order"))?;
        self.next_leaf += 1;
        Ok(taxon)
    }

    /// Writes the anchor neighbour's `(child,child,...)` list.
    ///
    /// An open bit directly followed by a close bit is a leaf; any other
    /// open bit starts a vertex that stays on the stack until its close bit.
    fn body(&mut self, out: &mut String) -> Result<()> {
        out.push('(');
        let mut stack = vec![Frame { has_child: false, length: 0.0 }];

        while let Some(bit) = self.peek() {
            self.pos += 1;
            if bit == OPEN {
                let parent = stack
                    .last_mut()
                    .ok_or_else(|| malformed("unbalanced parentheses"))?;
                if parent.has_child {
                    out.push(',');
                }
                parent.has_child = true;

                let length = self.next_length()?;
                if self.peek() == Some(CLOSE) {
                    self.pos += 1;
                    let taxon = self.next_taxon()?;
                    write!(out, "{taxon}:{length}").map_err(fmt_error)?;
                } else {
                    out.push('(');
                    stack.push(Frame { has_child: false, length });
                }
            } else {
                if stack.len() < 2 {
                    return Err(malformed("close bit without open bit"));
                }
                let frame = stack
                    .pop()
                    .ok_or_else(|| malformed("unbalanced parentheses"))?;
                write!(out, "):{}", frame.length).map_err(fmt_error)?;
            }
        }

        match stack.as_slice() {
            [root] if root.has_child => {
                out.push(')');
                Ok(())
            }
            [_] => Err(malformed("vertex without children")),
            _ => Err(malformed("unclosed vertex")),
        }
    }
}

fn malformed(reason: &str) -> CompressError {
    CompressError::MalformedTopology(reason.to_string())
}

fn fmt_error(e: std::fmt::Error) -> CompressError {
    CompressError::MalformedTopology(e.to_string())
}
