//! Shared domain types.
//!
//! Configuration enums are `clap::ValueEnum` so the CLI can parse them
//! directly; result types are `serde`-serializable for `--json` exports.

use std::path::PathBuf;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Which limit calculator to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CalculatorKind {
    /// Flat-prior Bayesian posterior quantile.
    Bayes,
    /// Asymptotic Gaussian quantile around the MLE.
    Wald,
    /// Asymptotic CLs.
    Cls,
}

impl CalculatorKind {
    pub fn display_name(self) -> &'static str {
        match self {
            CalculatorKind::Bayes => "Bayes",
            CalculatorKind::Wald => "Wald",
            CalculatorKind::Cls => "CLs (asymptotic)",
        }
    }

    /// Level used when none is given on the command line.
    pub fn default_cl(self) -> f64 {
        match self {
            CalculatorKind::Bayes => crate::calc::DEFAULT_BAYES_CL,
            CalculatorKind::Wald => crate::calc::DEFAULT_WALD_CL,
            CalculatorKind::Cls => crate::calc::DEFAULT_CLS_CL,
        }
    }
}

/// How to interpret the input file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ModelFormat {
    /// Counts followed by sampled response/background line pairs.
    MultiPoisson,
    /// Bin count, counts, draw count, then response/background line pairs.
    Counted,
    /// Counts followed by fixed values or gamma shape/rate lines.
    PoissonGamma,
}

/// A two-sided interval at level `cl`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    pub lower: f64,
    pub upper: f64,
    pub cl: f64,
}

/// One expected-limit percentile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band {
    pub prob: f64,
    pub limit: f64,
}

/// Expected-limit percentiles plus toy bookkeeping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedBands {
    pub bands: Vec<Band>,
    /// Toys attempted.
    pub toys: usize,
    /// Toys excluded because their calculator failed.
    pub failed: usize,
}

/// Observed data and scan range shared by every summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunInfo {
    pub input: PathBuf,
    pub model: String,
    pub labels: Vec<String>,
    pub counts: Vec<u64>,
    pub mu_min: f64,
    pub mu_max: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BayesSummary {
    pub run: RunInfo,
    pub cl: f64,
    pub upper_limit: f64,
    pub interval: Interval,
    pub map_estimate: f64,
    /// Parabolic uncertainty of the MAP estimate at `cl`.
    pub map_uncertainty: Option<f64>,
    /// Bayes-factor Z-value at the MAP estimate against `mu = 0`.
    pub z_map: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaldSummary {
    pub run: RunInfo,
    pub cl: f64,
    pub estimate: f64,
    pub uncertainty: f64,
    pub upper_limit: f64,
    pub interval: Interval,
    /// Profile-likelihood Z-value against `mu = 0`.
    pub z0: Option<f64>,
    pub p0: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClsSummary {
    pub run: RunInfo,
    pub cl: f64,
    pub estimate: f64,
    pub uncertainty: f64,
    pub upper_limit: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpectedSummary {
    pub run: RunInfo,
    pub method: CalculatorKind,
    pub cl: f64,
    pub true_mu: f64,
    pub seed: u64,
    pub observed_limit: f64,
    pub expected: ExpectedBands,
}

/// Inputs common to every limit command, as understood by the pipeline.
///
/// Derived from CLI flags (plus defaults).
#[derive(Debug, Clone)]
pub struct LimitConfig {
    pub input: PathBuf,
    pub format: ModelFormat,
    /// Global luminosity applied to every response.
    pub lumi: Option<f64>,
    /// Scan range; missing ends come from the model's suggested range.
    pub mu_min: Option<f64>,
    pub mu_max: Option<f64>,
    /// Level; `None` uses the calculator's default.
    pub cl: Option<f64>,
    /// Bayes prior `mu^power`; `None` is flat.
    pub prior_power: Option<f64>,
    /// Evaluate only this ensemble draw (0-based).
    pub draw: Option<usize>,
    pub json: Option<PathBuf>,
}

/// Settings for an expected-limit run.
#[derive(Debug, Clone)]
pub struct ExpectedConfig {
    pub limit: LimitConfig,
    pub method: CalculatorKind,
    pub true_mu: f64,
    pub toys: usize,
    pub seed: u64,
    /// Band probabilities; empty means the defaults.
    pub prob: Vec<f64>,
}

/// Per-bin `(value, uncertainty)` estimates used to synthesize an ensemble.
#[derive(Debug, Clone, PartialEq)]
pub struct BinEstimate {
    pub label: String,
    pub count: u64,
    pub response: f64,
    pub response_unc: f64,
    pub background: f64,
    pub background_unc: f64,
}

/// Settings for ensemble synthesis.
#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub bins: Vec<BinEstimate>,
    pub draws: usize,
    pub seed: u64,
    /// Correlation between every pair of bin responses; `None` samples them independently.
    pub response_correlation: Option<f64>,
    pub output: PathBuf,
}
