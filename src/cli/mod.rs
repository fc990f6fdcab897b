//! Command-line parsing for the `limits` binary.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! statistics code; handlers in `app` convert these structs into plain configs.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::{CalculatorKind, ModelFormat};
use crate::synth::DEFAULT_DRAWS;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "limits", version, about = "Upper limits and intervals for multi-bin Poisson counting experiments")]
pub struct Cli {
    /// Log verbosity level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: tracing::Level,

    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Bayesian upper limit and credible interval (flat prior by default).
    Bayes(LimitArgs),
    /// Asymptotic (Wald) estimate, interval, and upper limit.
    Wald(LimitArgs),
    /// Asymptotic CLs upper limit.
    Cls(LimitArgs),
    /// Expected-limit bands from pseudo-experiments.
    Expected(ExpectedArgs),
    /// Write an ensemble table synthesized from per-bin estimates.
    Synth(SynthArgs),
}

/// Options shared by every limit command.
#[derive(Debug, Args, Clone)]
pub struct LimitArgs {
    /// Input file (ensemble table or Poisson-gamma parameters).
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// How to read the input file.
    #[arg(long, value_enum, default_value_t = ModelFormat::MultiPoisson)]
    pub model: ModelFormat,

    /// Integrated luminosity multiplying every response.
    #[arg(long)]
    pub lumi: Option<f64>,

    /// Lower end of the scan range (default: 0).
    #[arg(long)]
    pub mu_min: Option<f64>,

    /// Upper end of the scan range (default: derived from the counts).
    #[arg(long)]
    pub mu_max: Option<f64>,

    /// Confidence level (Bayes default 0.90, Wald/CLs default 0.95).
    #[arg(long)]
    pub cl: Option<f64>,

    /// Bayes prior proportional to mu^POWER (default: flat; -0.5 is 1/sqrt(mu)).
    #[arg(long, value_name = "POWER", allow_negative_numbers = true)]
    pub prior_power: Option<f64>,

    /// Evaluate a single ensemble draw (0-based) instead of the ensemble average.
    #[arg(long, value_name = "INDEX")]
    pub draw: Option<usize>,

    /// Also write the result as pretty JSON.
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,
}

/// Options for `limits expected`.
#[derive(Debug, Args, Clone)]
pub struct ExpectedArgs {
    #[command(flatten)]
    pub limit: LimitArgs,

    /// Calculator used for every toy.
    #[arg(long, value_enum, default_value_t = CalculatorKind::Bayes)]
    pub method: CalculatorKind,

    /// True parameter of interest used to generate toys.
    #[arg(long = "mu", default_value_t = 0.0)]
    pub true_mu: f64,

    /// Number of pseudo-experiments.
    #[arg(long, env = "LIMITS_TOYS", default_value_t = 1000)]
    pub toys: usize,

    /// Base random seed; toy `i` uses `seed + i`.
    #[arg(long, env = "LIMITS_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Band probabilities, comma-separated (default: 0.025,0.16,0.5,0.84,0.975).
    #[arg(long, value_delimiter = ',')]
    pub prob: Vec<f64>,
}

/// Options for `limits synth`.
#[derive(Debug, Args, Clone)]
pub struct SynthArgs {
    /// One bin as `N,RESPONSE,RESPONSE_UNC,BACKGROUND,BACKGROUND_UNC`; repeat per bin.
    #[arg(long = "bin", value_name = "ESTIMATE", value_parser = parse_bin, required = true)]
    pub bins: Vec<BinArg>,

    /// Bin labels, comma-separated (default: bin1, bin2, ...).
    #[arg(long, value_delimiter = ',')]
    pub labels: Vec<String>,

    /// Number of ensemble draws (a single draw when every uncertainty is zero).
    #[arg(long, default_value_t = DEFAULT_DRAWS)]
    pub draws: usize,

    /// Random seed.
    #[arg(long, env = "LIMITS_SEED", default_value_t = 42)]
    pub seed: u64,

    /// Common correlation between bin responses (multivariate normal).
    #[arg(long)]
    pub correlation: Option<f64>,

    /// Output table path.
    #[arg(short, long, value_name = "PATH")]
    pub output: PathBuf,
}

/// One `--bin` estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinArg {
    pub count: u64,
    pub response: f64,
    pub response_unc: f64,
    pub background: f64,
    pub background_unc: f64,
}

fn parse_bin(s: &str) -> Result<BinArg, String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    if parts.len() != 5 {
        return Err(format!("expected 5 comma-separated values, got {}", parts.len()));
    }
    let count = parts[0]
        .parse::<u64>()
        .map_err(|e| format!("count '{}': {e}", parts[0]))?;
    let mut values = [0.0; 4];
    for (slot, tok) in values.iter_mut().zip(&parts[1..]) {
        *slot = tok.parse::<f64>().map_err(|e| format!("value '{tok}': {e}"))?;
    }
    Ok(BinArg {
        count,
        response: values[0],
        response_unc: values[1],
        background: values[2],
        background_unc: values[3],
    })
}
