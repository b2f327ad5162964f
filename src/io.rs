use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use phylotree::tree::Tree;

use crate::compress::{RfCompression, SeriesRow};
use crate::error::{CompressError, Result};
use crate::succinct::SuccinctEncoding;

pub const TOPOLOGY_FILE: &str = "succinct_tree.bits";
pub const PERMUTATION_FILE: &str = "node_permutation.u32";
pub const BRANCH_LENGTHS_FILE: &str = "branch_lengths.f64";
pub const CONTRACTED_EDGES_FILE: &str = "edges_to_contract.u32";
pub const CONSENSUS_TOPOLOGY_FILE: &str = "consensus_tree.bits";
pub const CONSENSUS_PERMUTATION_FILE: &str = "consensus_permutation.u32";
pub const CONSENSUS_BRANCH_LENGTHS_FILE: &str = "consensus_branch_lengths.f64";
pub const SUBTREES_FILE: &str = "subtrees_succinct.bits";
pub const SUBTREE_PERMUTATIONS_FILE: &str = "succinct_permutations.u32";

/// Strip BEAST annotations from Newick strings.
///
/// BEAST format includes annotations like :[&rate=0.123]2.45 where 2.45 is the actual branch length.
/// This function removes the [&...] annotations while preserving the branch lengths.
fn strip_beast_annotations(newick: &str) -> String {
    let mut result = String::with_capacity(newick.len());
    let mut in_annotation = false;
    let mut chars = newick.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '[' && chars.peek() == Some(&'&') {
            in_annotation = true;
        } else if ch == ']' && in_annotation {
            in_annotation = false;
        } else if !in_annotation {
            result.push(ch);
        }
    }

    result
}

fn parse_newick(newick: &str) -> Result<Tree> {
    let cleaned = strip_beast_annotations(newick);
    Tree::from_newick(cleaned.trim()).map_err(|e| CompressError::Newick(e.to_string()))
}

/// Read a single Newick tree from a file (first non-empty line).
pub fn read_newick_file<P: AsRef<Path>>(path: P) -> Result<Tree> {
    let content = fs::read_to_string(path.as_ref())?;
    let line = content
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .ok_or_else(|| CompressError::Newick(format!("{:?} holds no tree", path.as_ref())))?;
    parse_newick(line)
}

/// Read every tree of a BEAST/NEXUS `.trees` file, named after file and state.
///
/// Burn-in: with both values 0 everything is kept; otherwise a tree is kept
/// when its index is at least `burnin_trees` (if set) or its `STATE_` number
/// exceeds `burnin_states` (if set). Leaves keep their numeric TRANSLATE ids,
/// which serve as taxon ids.
pub fn read_beast_trees<P: AsRef<Path>>(
    path: P,
    burnin_trees: usize,
    burnin_states: usize,
) -> Result<Vec<(String, Tree)>> {
    let content = fs::read_to_string(path.as_ref())?;

    let base_name = path.as_ref()
        .file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.trim_end_matches(".trees"))
        .unwrap_or("unknown");

    collect_tree_blocks(&content)
        .into_iter()
        .enumerate()

        //generate tree name & extract state number
        .map(|(idx, tree)| {
            let state = extract_state(tree.header);
            (idx, tree, state, format!("{base_name}_tree_STATE{state}"))
        })

        // Filter out burn-in trees based on count and/or state number if 0 we don't filter
        .filter(|(idx, _tree, state, _name)| {
                (burnin_trees == 0 && burnin_states == 0) ||
                (burnin_trees > 0 && *idx >= burnin_trees) ||
                (burnin_states > 0 && *state > burnin_states)
        })

        .map(|(_idx, tree, _state, name)| Ok((name, parse_newick(&tree.body)?)))
        .collect()
}

fn extract_state(header: &str) -> usize {
    if let Some(start) = header.to_ascii_uppercase().find("STATE_") {
        let num_start = start + 6; // length of "STATE_"
        let rest = &header[num_start..];
        let state = rest.chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>();
        if let Ok(num) = state.parse::<usize>() {
            return num;
        }
    }
    0
}

struct TreeBlock<'a> { header: &'a str, body: &'a str }

fn collect_tree_blocks(content: &str) -> Vec<TreeBlock<'_>> {
    content
        .lines()
        .skip_while(|line| !line.trim().to_ascii_uppercase().starts_with("TREE "))
        .take_while(|line| !line.trim().to_ascii_uppercase().starts_with("END;"))
        .filter_map(|line| {
            let mut parts = line.splitn(2, " = ");
            let header = parts.next()?.trim();
            let body = parts.next()?.trim();
            Some(TreeBlock { header, body })
        })
        .collect()
}

fn is_gz(path: &Path) -> bool {
    path.to_string_lossy().ends_with(".gz")
}

/// Open `path` for writing, gzip-compressed if it ends with `.gz`.
fn create_output(path: &Path) -> io::Result<Box<dyn Write>> {
    let f = File::create(path)?;
    Ok(if is_gz(path) {
        Box::new(BufWriter::new(GzEncoder::new(f, Compression::default())))
    } else {
        Box::new(BufWriter::new(f))
    })
}

/// Read all of `path`, gunzipping if it ends with `.gz`.
fn read_input(path: &Path) -> io::Result<Vec<u8>> {
    let f = File::open(path)?;
    let mut buf = Vec::new();
    if is_gz(path) {
        GzDecoder::new(f).read_to_end(&mut buf)?;
    } else {
        BufReader::new(f).read_to_end(&mut buf)?;
    }
    Ok(buf)
}

fn truncated(path: &Path) -> io::Error {
    io::Error::new(io::ErrorKind::UnexpectedEof, format!("{} is truncated", path.display()))
}

fn split_header<'a>(path: &Path, buf: &'a [u8]) -> io::Result<(usize, &'a [u8])> {
    let (head, rest) = buf.split_first_chunk::<8>().ok_or_else(|| truncated(path))?;
    let len = usize::try_from(u64::from_le_bytes(*head))
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    Ok((len, rest))
}

/// Packed bit array: u64 LE bit count, then u64 LE words, LSB first.
pub fn write_bits(path: &Path, bits: &[bool]) -> io::Result<()> {
    let mut out = create_output(path)?;
    out.write_all(&(bits.len() as u64).to_le_bytes())?;
    for chunk in bits.chunks(64) {
        let word = chunk
            .iter()
            .enumerate()
            .fold(0u64, |w, (i, &b)| if b { w | (1u64 << i) } else { w });
        out.write_all(&word.to_le_bytes())?;
    }
    out.flush()
}

pub fn read_bits(path: &Path) -> io::Result<Vec<bool>> {
    let buf = read_input(path)?;
    let (len, rest) = split_header(path, &buf)?;
    let needed = len.div_ceil(64).checked_mul(8).ok_or_else(|| truncated(path))?;
    if rest.len() < needed {
        return Err(truncated(path));
    }
    let bits = rest
        .chunks_exact(8)
        .flat_map(|chunk| {
            let mut word = [0u8; 8];
            word.copy_from_slice(chunk);
            let word = u64::from_le_bytes(word);
            (0..64).map(move |i| word & (1u64 << i) != 0)
        })
        .take(len)
        .collect();
    Ok(bits)
}

/// Fixed-width integers: u64 LE count, then u32 LE values.
pub fn write_u32s(path: &Path, values: &[u32]) -> io::Result<()> {
    let mut out = create_output(path)?;
    out.write_all(&(values.len() as u64).to_le_bytes())?;
    for v in values {
        out.write_all(&v.to_le_bytes())?;
    }
    out.flush()
}

pub fn read_u32s(path: &Path) -> io::Result<Vec<u32>> {
    let buf = read_input(path)?;
    let (len, rest) = split_header(path, &buf)?;
    let needed = len.checked_mul(4).ok_or_else(|| truncated(path))?;
    if rest.len() < needed {
        return Err(truncated(path));
    }
    Ok(rest
        .chunks_exact(4)
        .take(len)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Raw f64 LE values, no header.
pub fn write_f64s(path: &Path, values: &[f64]) -> io::Result<()> {
    let mut out = create_output(path)?;
    for v in values {
        out.write_all(&v.to_le_bytes())?;
    }
    out.flush()
}

pub fn read_f64s(path: &Path) -> io::Result<Vec<f64>> {
    let buf = read_input(path)?;
    if buf.len() % 8 != 0 {
        return Err(truncated(path));
    }
    Ok(buf
        .chunks_exact(8)
        .map(|c| {
            let mut bytes = [0u8; 8];
            bytes.copy_from_slice(c);
            f64::from_le_bytes(bytes)
        })
        .collect())
}

fn output_path(dir: &Path, name: &str, gzip: bool) -> PathBuf {
    if gzip {
        dir.join(format!("{name}.gz"))
    } else {
        dir.join(name)
    }
}

/// Existing file for `name` in `dir`, plain or gzipped.
fn input_path(dir: &Path, name: &str) -> io::Result<PathBuf> {
    [dir.join(name), dir.join(format!("{name}.gz"))]
        .into_iter()
        .find(|p| p.exists())
        .ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, format!("{name} not found in {}", dir.display()))
        })
}

/// Write the three arrays of a single-tree encoding into `dir`.
pub fn write_encoding(dir: &Path, encoding: &SuccinctEncoding, gzip: bool) -> io::Result<()> {
    write_encoding_as(
        dir,
        [TOPOLOGY_FILE, PERMUTATION_FILE, BRANCH_LENGTHS_FILE],
        encoding,
        gzip,
    )
}

fn write_encoding_as(
    dir: &Path,
    [topology, permutation, lengths]: [&str; 3],
    encoding: &SuccinctEncoding,
    gzip: bool,
) -> io::Result<()> {
    fs::create_dir_all(dir)?;
    write_bits(&output_path(dir, topology, gzip), &encoding.topology)?;
    write_u32s(&output_path(dir, permutation, gzip), &encoding.leaf_order)?;
    write_f64s(&output_path(dir, lengths, gzip), &encoding.branch_lengths)
}

/// Write tree 1's encoding plus the consensus delta into `dir`.
pub fn write_rf_compression(dir: &Path, rf: &RfCompression, gzip: bool) -> io::Result<()> {
    write_encoding(dir, &rf.tree1, gzip)?;
    write_encoding_as(
        dir,
        [CONSENSUS_TOPOLOGY_FILE, CONSENSUS_PERMUTATION_FILE, CONSENSUS_BRANCH_LENGTHS_FILE],
        &rf.delta.consensus_encoding,
        gzip,
    )?;
    write_u32s(&output_path(dir, CONTRACTED_EDGES_FILE, gzip), &rf.delta.contracted_edge_ids)?;
    write_bits(&output_path(dir, SUBTREES_FILE, gzip), &rf.delta.combined_topology)?;
    write_u32s(&output_path(dir, SUBTREE_PERMUTATIONS_FILE, gzip), &rf.delta.combined_permutation)
}

/// Load an encoding written by [`write_encoding`] or, with `consensus`,
/// the consensus arrays written by [`write_rf_compression`].
///
/// Edge numbers are not persisted; `edge_id` comes back empty.
pub fn read_encoding(dir: &Path, consensus: bool) -> io::Result<SuccinctEncoding> {
    let [topology, permutation, lengths] = if consensus {
        [CONSENSUS_TOPOLOGY_FILE, CONSENSUS_PERMUTATION_FILE, CONSENSUS_BRANCH_LENGTHS_FILE]
    } else {
        [TOPOLOGY_FILE, PERMUTATION_FILE, BRANCH_LENGTHS_FILE]
    };
    Ok(SuccinctEncoding {
        topology: read_bits(&input_path(dir, topology)?)?,
        leaf_order: read_u32s(&input_path(dir, permutation)?)?,
        branch_lengths: read_f64s(&input_path(dir, lengths)?)?,
        edge_id: Vec::new(),
    })
}

/// Write series rows as TSV to a file.
/// If `path` ends with `.gz`, the output is gzip-compressed.
pub fn write_series_tsv<P: AsRef<Path>>(path: P, rows: &[SeriesRow]) -> io::Result<()> {
    let p = path.as_ref();
    if p.as_os_str() == "-" {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            "writing to stdout is not supported by write_series_tsv",
        ));
    }

    let mut out = create_output(p)?;

    writeln!(
        &mut out,
        "from\tto\trf_distance\tcontracted_edges\tfragments\tbytes_without_branches\tbytes_with_branches"
    )?;
    for row in rows {
        writeln!(
            &mut out,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.from,
            row.to,
            row.rf_distance,
            row.contracted_edges,
            row.fragments,
            row.report.total_without_branches(),
            row.report.total_with_branches(),
        )?;
    }

    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_beast_annotations() {
        let raw = "((1:[&rate=0.5]1.5,2:2.0):[&rate=1]0.5,3:1.0);";
        assert_eq!(strip_beast_annotations(raw), "((1:1.5,2:2.0):0.5,3:1.0);");
    }

    #[test]
    fn test_extract_state() {
        assert_eq!(extract_state("tree STATE_120000"), 120000);
        assert_eq!(extract_state("tree t1"), 0);
    }

    #[test]
    fn test_bits_round_trip_across_words() {
        let dir = tempfile::tempdir().unwrap();
        let bits: Vec<bool> = (0..130).map(|i| i % 3 == 0).collect();
        for name in ["t.bits", "t.bits.gz"] {
            let path = dir.path().join(name);
            write_bits(&path, &bits).unwrap();
            assert_eq!(read_bits(&path).unwrap(), bits);
        }
        // header + three words
        assert_eq!(fs::metadata(dir.path().join("t.bits")).unwrap().len(), 8 + 3 * 8);
    }

    #[test]
    fn test_u32_and_f64_files() {
        let dir = tempfile::tempdir().unwrap();
        let ints = vec![1, 4, 2, 3, 0, u32::MAX];
        let floats = vec![0.0, 0.125, 3.5, 1e-9];

        let p = dir.path().join("v.u32");
        write_u32s(&p, &ints).unwrap();
        assert_eq!(read_u32s(&p).unwrap(), ints);
        assert_eq!(fs::metadata(&p).unwrap().len(), 8 + 4 * ints.len() as u64);

        let p = dir.path().join("v.f64.gz");
        write_f64s(&p, &floats).unwrap();
        assert_eq!(read_f64s(&p).unwrap(), floats);
    }

    #[test]
    fn test_truncated_bits_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.bits");
        fs::write(&path, 200u64.to_le_bytes()).unwrap();
        assert_eq!(read_bits(&path).unwrap_err().kind(), io::ErrorKind::UnexpectedEof);
    }

    #[test]
    fn test_oversized_length_header_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("huge.u32");
        fs::write(&path, u64::MAX.to_le_bytes()).unwrap();
        assert!(read_u32s(&path).is_err());
        assert!(read_bits(&path).is_err());
    }

    #[test]
    fn test_read_beast_trees_with_burnin() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("run.trees");
        fs::write(
            &path,
            "#NEXUS\nBegin trees;\n\tTranslate\n\t\t1 A,\n\t\t2 B,\n\t\t3 C,\n\t\t4 D\n;\n\
             tree STATE_0 = ((1:1,2:1):1,(3:1,4:1):1);\n\
             tree STATE_100 = ((1:[&rate=1]1,3:1):1,(2:1,4:1):1);\n\
             tree STATE_200 = ((1:1,4:1):1,(3:1,2:1):1);\n\
             End;\n",
        )
        .unwrap();

        let all = read_beast_trees(&path, 0, 0).unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].0, "run_tree_STATE0");

        let kept = read_beast_trees(&path, 1, 0).unwrap();
        assert_eq!(kept.len(), 2);
        let kept = read_beast_trees(&path, 0, 100).unwrap();
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].0, "run_tree_STATE200");
    }
}
