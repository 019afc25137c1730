//! CLI argument definitions: top-level `Cli` struct and `Commands` enum.

use clap::{ArgAction, Args, Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xspace")]
#[command(about = "Formally verified explanations for neural-network classifications")]
#[command(version)]
pub(crate) struct Cli {
    /// Log more (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub(crate) verbose: u8,

    #[command(subcommand)]
    pub(crate) command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Explain the classification of every selected dataset sample
    Explain {
        #[command(flatten)]
        inputs: InputArgs,
        #[command(flatten)]
        solver: SolverArgs,
        #[command(flatten)]
        run: RunArgs,
    },

    /// Re-verify explanations read from a file, one per sample
    Check {
        #[command(flatten)]
        inputs: InputArgs,
        /// Explanations in SMT-LIB2 form, one per line
        explanations: PathBuf,
        #[command(flatten)]
        solver: SolverArgs,
    },

    /// Continue a strategy chain from explanations read from a file
    Expand {
        #[command(flatten)]
        inputs: InputArgs,
        /// Explanations in SMT-LIB2 form, one per line
        explanations: PathBuf,
        #[command(flatten)]
        solver: SolverArgs,
        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug)]
pub(crate) struct InputArgs {
    /// Network in NNet format
    pub(crate) model: PathBuf,
    /// CSV dataset with a header row; the last column is the class
    pub(crate) dataset: PathBuf,
}

#[derive(Args, Debug)]
pub(crate) struct SolverArgs {
    /// Solver backend: z3 | cvc5 | z3-bin | opensmt
    #[arg(long, default_value = "z3")]
    pub(crate) solver: String,

    /// Command used to start a process backend
    #[arg(long)]
    pub(crate) solver_path: Option<String>,

    /// Per-check timeout in seconds (0 = none)
    #[arg(long, default_value_t = 0)]
    pub(crate) timeout: u64,
}

#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Strategy chain, e.g. "abductive, trial n 4" or "ucore interval min"
    #[arg(long)]
    pub(crate) strategies: Option<String>,

    /// Visit features in reverse order
    #[arg(short, long)]
    pub(crate) reverse: bool,

    /// Explain at most this many samples
    #[arg(long)]
    pub(crate) max_samples: Option<usize>,

    /// Shuffle the selected samples before capping
    #[arg(long)]
    pub(crate) shuffle: bool,

    /// Seed for --shuffle
    #[arg(long)]
    pub(crate) seed: Option<u64>,

    /// Sample filter: all | correct | incorrect
    #[arg(long)]
    pub(crate) filter: Option<String>,

    /// Only samples whose expected class is K
    #[arg(long, value_name = "K")]
    pub(crate) expected_class: Option<usize>,

    /// Output format: bounds | smtlib2 | intervals
    #[arg(long)]
    pub(crate) format: Option<String>,

    /// Also print free features
    #[arg(long)]
    pub(crate) print_free: bool,

    /// Default chain when --strategies is absent: simple | general | unsat-core | interpolation
    #[arg(long)]
    pub(crate) explanation_type: Option<String>,

    /// Ask the solver for minimal unsat cores
    #[arg(long)]
    pub(crate) minimal_ucore: bool,

    /// JSON configuration file; flags override its values
    #[arg(long)]
    pub(crate) config: Option<PathBuf>,

    /// Write explanations here instead of stdout
    #[arg(long)]
    pub(crate) out: Option<PathBuf>,

    /// Write a JSON report here
    #[arg(long)]
    pub(crate) report: Option<PathBuf>,
}
