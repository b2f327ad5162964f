//! Error type shared by every stage of the compressor.
//!
//! All variants are fatal: a compression run that hits one of them produces
//! no output. Nothing here is retried.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompressError {
    #[error("Failed to parse Newick: {0}")]
    Newick(String),

    #[error("Leaf label {0:?} is not a positive taxon id")]
    InvalidTaxon(String),

    #[error("Internal node {0} has a single child")]
    UnaryNode(usize),

    #[error("Tree has fewer than three leaves ({0})")]
    TooFewLeaves(usize),

    #[error("No leaf carries taxon id 1")]
    MissingAnchor,

    #[error("More than one leaf carries taxon id 1")]
    DuplicateAnchor,

    #[error("Trees have different number of tips ({0} vs {1})")]
    TipCountMismatch(usize, usize),

    #[error("Tip node IDs are not consistent: {0}")]
    InconsistentTaxa(String),

    #[error("RF distance {0} is odd")]
    OddRfDistance(usize),

    #[error("Topology has {actual} bits, expected {expected}")]
    TopologyLengthMismatch { expected: usize, actual: usize },

    #[error("Leaf order has {actual} entries, expected {expected}")]
    PermutationLengthMismatch { expected: usize, actual: usize },

    #[error("Contracted {actual} edges, expected {expected}")]
    ContractionCountMismatch { expected: usize, actual: usize },

    #[error("Edge of half-edge {0} cannot be contracted")]
    NotContractible(usize),

    #[error("Malformed topology: {0}")]
    MalformedTopology(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CompressError>;
