use clap::{Args, Parser, Subcommand};
use succinct_tree_delta::compress::{
    CompressionReport, compress_series, rf_compression, simple_compression,
};
use succinct_tree_delta::decode::to_newick;
use succinct_tree_delta::io::{
    read_beast_trees, read_encoding, read_newick_file, write_encoding, write_rf_compression,
    write_series_tsv,
};
use succinct_tree_delta::tree::UnrootedTree;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tracing::{Level, error, info};

const EXIT_INPUT: i32 = 2;
const EXIT_COMPRESS: i32 = 3;
const EXIT_OUTPUT: i32 = 4;

/// Succinct encoding of unrooted phylogenetic trees, alone or as an
/// RF-based delta of one tree against another.
#[derive(Parser, Debug)]
#[command(name = "succinct-tree-delta", version, about = "Succinct and RF-delta tree compression")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Quiet mode: only errors are reported
    #[arg(short = 'q', long = "quiet", global = true, default_value_t = false)]
    quiet: bool,

    /// Verbose mode: per-stage details
    #[arg(short = 'v', long = "verbose", global = true, default_value_t = false)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Encode a single Newick tree
    Simple {
        /// Path to a Newick file (first non-empty line is used)
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// Encode tree 1 and the delta that turns it into tree 2
    Rf {
        #[arg(long = "tree1")]
        tree1: PathBuf,

        #[arg(long = "tree2")]
        tree2: PathBuf,

        #[command(flatten)]
        output: OutputArgs,
    },
    /// RF-compress every consecutive pair of a BEAST/NEXUS file
    Series {
        /// Path to BEAST .trees (NEXUS) file
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Output path for the TSV summary (gzip when ending in .gz)
        #[arg(short = 'o', long = "output")]
        output: PathBuf,

        /// Burn-in by number of trees (drop first N trees)
        #[arg(short = 't', long = "burnin-trees", default_value_t = 0)]
        burnin_trees: usize,

        /// Burn-in by state (keep trees with STATE_ > value)
        #[arg(short = 's', long = "burnin-states", default_value_t = 0)]
        burnin_states: usize,
    },
    /// Print the Newick string of a stored encoding
    Decode {
        /// Directory written by `simple` or `rf`
        #[arg(short = 'i', long = "input")]
        input: PathBuf,

        /// Decode the consensus arrays instead of tree 1
        #[arg(long = "consensus", default_value_t = false)]
        consensus: bool,
    },
}

#[derive(Args, Debug)]
struct OutputArgs {
    /// Output directory for the binary arrays
    #[arg(short = 'o', long = "output")]
    dir: PathBuf,

    /// Gzip every array file
    #[arg(long = "gzip", default_value_t = false)]
    gzip: bool,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    match cli.command {
        Command::Simple { input, output } => run_simple(&input, &output),
        Command::Rf { tree1, tree2, output } => run_rf(&tree1, &tree2, &output),
        Command::Series { input, output, burnin_trees, burnin_states } => {
            run_series(&input, &output, burnin_trees, burnin_states)
        }
        Command::Decode { input, consensus } => run_decode(&input, consensus),
    }
}

fn init_logging(quiet: bool, verbose: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::ERROR,
        (false, true) => Level::DEBUG,
        (false, false) => Level::INFO,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_simple(input: &Path, output: &OutputArgs) {
    let t0 = Instant::now();
    let mut tree = load_tree(input);
    info!("Reading tree {:.3}s", t0.elapsed().as_secs_f64());

    let t1 = Instant::now();
    let encoding = simple_compression(&mut tree).unwrap_or_else(|e| {
        error!("Failed to compress {input:?}: {e}");
        process::exit(EXIT_COMPRESS);
    });
    info!("Compressing {} leaves {:.3}s", encoding.leaf_order.len(), t1.elapsed().as_secs_f64());
    CompressionReport::simple(&encoding).log("simple");

    let t2 = Instant::now();
    if let Err(e) = write_encoding(&output.dir, &encoding, output.gzip) {
        error!("Failed to write output {:?}: {e}", output.dir);
        process::exit(EXIT_OUTPUT);
    }
    info!("Writing to {:?} {:.3}s", output.dir, t2.elapsed().as_secs_f64());
}

fn run_rf(tree1: &Path, tree2: &Path, output: &OutputArgs) {
    let t0 = Instant::now();
    let first = load_tree(tree1);
    let second = load_tree(tree2);
    info!("Reading trees {:.3}s", t0.elapsed().as_secs_f64());

    let t1 = Instant::now();
    let rf = rf_compression(first, second).unwrap_or_else(|e| {
        error!("Failed to compress {tree1:?} against {tree2:?}: {e}");
        process::exit(EXIT_COMPRESS);
    });
    info!(
        "RF distance {} with {} contracted edges and {} fragments {:.3}s",
        rf.rf_distance,
        rf.delta.contracted_edge_ids.len(),
        rf.delta.fragments.len(),
        t1.elapsed().as_secs_f64()
    );
    CompressionReport::simple(&rf.tree1).log("tree 1");
    CompressionReport::rf(&rf).log("delta");

    let t2 = Instant::now();
    if let Err(e) = write_rf_compression(&output.dir, &rf, output.gzip) {
        error!("Failed to write output {:?}: {e}", output.dir);
        process::exit(EXIT_OUTPUT);
    }
    info!("Writing to {:?} {:.3}s", output.dir, t2.elapsed().as_secs_f64());
}

fn run_series(input: &Path, output: &Path, burnin_trees: usize, burnin_states: usize) {
    let t0 = Instant::now();
    let named_trees = read_beast_trees(input, burnin_trees, burnin_states).unwrap_or_else(|e| {
        error!("Failed to read {input:?}: {e}");
        process::exit(EXIT_INPUT);
    });
    if named_trees.len() < 2 {
        error!("Need at least 2 trees in {input:?}, found {}.", named_trees.len());
        process::exit(EXIT_INPUT);
    }
    let trees: Vec<(String, UnrootedTree)> = named_trees
        .into_iter()
        .map(|(name, tree)| UnrootedTree::from_phylotree(&tree).map(|t| (name, t)))
        .collect::<Result<Vec<_>, _>>()
        .unwrap_or_else(|e| {
            error!("Failed to convert trees of {input:?}: {e}");
            process::exit(EXIT_INPUT);
        });
    info!("Reading in beast {:.3}s", t0.elapsed().as_secs_f64());
    info!("Read in {} trees", trees.len());

    let t1 = Instant::now();
    let rows = compress_series(&trees).unwrap_or_else(|e| {
        error!("Failed to compress series: {e}");
        process::exit(EXIT_COMPRESS);
    });
    info!("Compressing {} consecutive pairs {:.3}s", rows.len(), t1.elapsed().as_secs_f64());

    let t2 = Instant::now();
    if let Err(e) = write_series_tsv(output, &rows) {
        error!("Failed to write output {output:?}: {e}");
        process::exit(EXIT_OUTPUT);
    }
    info!("Writing to output {:.3}s", t2.elapsed().as_secs_f64());
}

fn run_decode(input: &Path, consensus: bool) {
    let encoding = read_encoding(input, consensus).unwrap_or_else(|e| {
        error!("Failed to read encoding from {input:?}: {e}");
        process::exit(EXIT_INPUT);
    });
    match to_newick(&encoding) {
        Ok(newick) => println!("{newick}"),
        Err(e) => {
            error!("Failed to decode {input:?}: {e}");
            process::exit(EXIT_COMPRESS);
        }
    }
}

fn load_tree(path: &Path) -> UnrootedTree {
    read_newick_file(path)
        .and_then(|tree| UnrootedTree::from_phylotree(&tree))
        .unwrap_or_else(|e| {
            error!("Failed to read tree {path:?}: {e}");
            process::exit(EXIT_INPUT);
        })
}
