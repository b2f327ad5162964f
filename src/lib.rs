//! Crate root: module orchestration and public re-exports.
//!
//! Modules:
//! - `tree`: half-edge model of an unrooted tree, built from Newick.
//! - `canonical`: canonical keys and child ordering.
//! - `succinct`: balanced-parenthesis encoding of a canonically ordered tree.
//! - `bitset` / `splits`: split sets, RF distance and presence flags.
//! - `consensus`: contraction of tree 1 down to the shared splits.
//! - `delta`: private fragments of tree 2 relative to the consensus.
//! - `decode`: Newick text back from an encoding.
//! - `compress`: end-to-end pipelines and size reports.
//! - `io`: BEAST/NEXUS reading and binary array persistence.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod bitset;
pub mod canonical;
pub mod compress;
pub mod consensus;
pub mod decode;
pub mod delta;
pub mod error;
pub mod io;
pub mod splits;
pub mod succinct;
pub mod tree;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use bitset::Bitset;
pub use compress::{CompressionReport, RfCompression, compress_series, rf_compression, simple_compression};
pub use decode::to_newick;
pub use delta::{ConsensusDelta, Fragment};
pub use error::{CompressError, Result};
pub use io::{read_beast_trees, read_newick_file};
pub use succinct::SuccinctEncoding;
pub use tree::UnrootedTree;
