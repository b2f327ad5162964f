//! Python binding layer for tree compression.
//!
//! Exposes single-tree encoding, RF-delta encoding, series summaries and
//! decoding. Topologies cross the boundary as lists of bools.

use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use pyo3::types::PyDict;

use crate::compress;
use crate::decode::to_newick;
use crate::error::CompressError;
use crate::io::read_beast_trees;
use crate::succinct::SuccinctEncoding;
use crate::tree::UnrootedTree;

type EncodingTuple = (Vec<bool>, Vec<u32>, Vec<f64>);

fn to_py_err(e: CompressError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

fn as_tuple(encoding: SuccinctEncoding) -> EncodingTuple {
    (encoding.topology, encoding.leaf_order, encoding.branch_lengths)
}

/// Encode one Newick tree.
///
/// Args:
///     newick: Tree with positive integer leaf labels; taxon 1 must be present
///
/// Returns:
///     A tuple of (topology, leaf_order, branch_lengths)
///
/// Raises:
///     ValueError: If the tree does not parse or cannot be encoded
#[pyfunction]
fn compress_tree(newick: &str) -> PyResult<EncodingTuple> {
    let mut tree = UnrootedTree::from_newick(newick).map_err(to_py_err)?;
    let encoding = compress::simple_compression(&mut tree).map_err(to_py_err)?;
    Ok(as_tuple(encoding))
}

/// Encode tree 1 and its delta to tree 2.
///
/// Returns:
///     A dict with keys rf_distance, tree1, consensus, contracted_edges,
///     subtrees and subtree_permutations
///
/// Raises:
///     ValueError: If the trees do not parse, have different taxa, or
///     compression fails
#[pyfunction]
fn compress_pair<'py>(
    py: Python<'py>,
    newick1: &str,
    newick2: &str,
) -> PyResult<Bound<'py, PyDict>> {
    let tree1 = UnrootedTree::from_newick(newick1).map_err(to_py_err)?;
    let tree2 = UnrootedTree::from_newick(newick2).map_err(to_py_err)?;
    let rf = compress::rf_compression(tree1, tree2).map_err(to_py_err)?;

    let dict = PyDict::new(py);
    dict.set_item("rf_distance", rf.rf_distance)?;
    dict.set_item("contracted_edges", rf.delta.contracted_edge_ids)?;
    dict.set_item("subtrees", rf.delta.combined_topology)?;
    dict.set_item("subtree_permutations", rf.delta.combined_permutation)?;
    dict.set_item("consensus", as_tuple(rf.delta.consensus_encoding))?;
    dict.set_item("tree1", as_tuple(rf.tree1))?;
    Ok(dict)
}

/// RF-compress every consecutive pair of a BEAST/NEXUS tree file.
///
/// Args:
///     path: BEAST/NEXUS tree file
///     burnin_trees: Number of trees to skip at the beginning (default: 0)
///     burnin_states: Minimum STATE value to keep trees (default: 0)
///
/// Returns:
///     A list of (from, to, rf_distance, bytes_without_branches, bytes_with_branches)
///
/// Raises:
///     ValueError: If fewer than two trees remain or compression fails
#[pyfunction]
#[pyo3(signature = (path, burnin_trees=0, burnin_states=0))]
fn compress_series(
    path: &str,
    burnin_trees: usize,
    burnin_states: usize,
) -> PyResult<Vec<(String, String, usize, usize, usize)>> {
    let named = read_beast_trees(path, burnin_trees, burnin_states).map_err(to_py_err)?;
    if named.len() < 2 {
        return Err(PyValueError::new_err(format!(
            "Need at least 2 trees in '{}' after burnin removal, found {}",
            path,
            named.len()
        )));
    }
    let trees = named
        .into_iter()
        .map(|(name, tree)| UnrootedTree::from_phylotree(&tree).map(|t| (name, t)))
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_py_err)?;

    let rows = compress::compress_series(&trees).map_err(to_py_err)?;
    Ok(rows
        .into_iter()
        .map(|row| {
            let report = row.report;
            (
                row.from,
                row.to,
                row.rf_distance,
                report.total_without_branches(),
                report.total_with_branches(),
            )
        })
        .collect())
}

/// Rebuild a Newick string from (topology, leaf_order, branch_lengths).
///
/// Raises:
///     ValueError: If the arrays are not a valid encoding
#[pyfunction]
fn decode_tree(topology: Vec<bool>, leaf_order: Vec<u32>, branch_lengths: Vec<f64>) -> PyResult<String> {
    let encoding = SuccinctEncoding {
        topology,
        leaf_order,
        branch_lengths,
        edge_id: Vec::new(),
    };
    to_newick(&encoding).map_err(to_py_err)
}

/// Python module definition
#[pymodule]
fn succinct_tree_delta(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(compress_tree, m)?)?;
    m.add_function(wrap_pyfunction!(compress_pair, m)?)?;
    m.add_function(wrap_pyfunction!(compress_series, m)?)?;
    m.add_function(wrap_pyfunction!(decode_tree, m)?)?;
    Ok(())
}
