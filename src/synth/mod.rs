//! Nuisance-ensemble synthesis from per-bin `(value, uncertainty)` estimates.
//!
//! Each draw samples every bin's response and background together, so the
//! result is a valid [`MultiPoisson`] ensemble. Responses can optionally be
//! correlated across bins through a multivariate normal.

use nalgebra::DMatrix;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::domain::{BinEstimate, SynthConfig};
use crate::error::AppError;
use crate::math::MultiNormal;
use crate::models::{CountingModel, Draw, MultiPoisson};
use crate::prior::GammaPrior;

/// Default number of ensemble draws.
pub const DEFAULT_DRAWS: usize = 500;

/// A single quantity's sampler: exact when the uncertainty is zero.
#[derive(Debug, Clone)]
enum Source {
    Exact(f64),
    Gamma(GammaPrior),
}

impl Source {
    fn new(value: f64, uncertainty: f64, what: &str) -> Result<Self, AppError> {
        if !(value.is_finite() && value >= 0.0) {
            return Err(AppError::range(format!("{what} estimate must be finite and >= 0, got {value}.")));
        }
        if !(uncertainty.is_finite() && uncertainty >= 0.0) {
            return Err(AppError::range(format!(
                "{what} uncertainty must be finite and >= 0, got {uncertainty}."
            )));
        }
        if uncertainty == 0.0 {
            Ok(Source::Exact(value))
        } else {
            Ok(Source::Gamma(GammaPrior::fit(value, uncertainty)?))
        }
    }

    fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match self {
            Source::Exact(v) => *v,
            Source::Gamma(prior) => prior.sample(rng),
        }
    }
}

/// Build the ensemble described by `config`, seeded deterministically.
pub fn synthesize(config: &SynthConfig) -> Result<MultiPoisson, AppError> {
    let mut rng = StdRng::seed_from_u64(config.seed);
    let model = match config.response_correlation {
        Some(rho) => correlated_ensemble(&config.bins, config.draws, rho, &mut rng)?,
        None => gamma_ensemble(&config.bins, config.draws, &mut rng)?,
    };
    tracing::info!(bins = model.nbins(), draws = model.ndraws(), "ensemble synthesized");
    Ok(model)
}

/// Independent gamma draws for every response and background.
///
/// When every uncertainty is zero the ensemble collapses to one exact draw.
pub fn gamma_ensemble<R: Rng + ?Sized>(
    bins: &[BinEstimate],
    draws: usize,
    rng: &mut R,
) -> Result<MultiPoisson, AppError> {
    check_bins(bins, draws)?;
    let response = bins
        .iter()
        .map(|b| Source::new(b.response, b.response_unc, &format!("{} response", b.label)))
        .collect::<Result<Vec<_>, _>>()?;
    let background = background_sources(bins)?;

    let exact = bins.iter().all(|b| b.response_unc == 0.0 && b.background_unc == 0.0);
    let ndraws = if exact { 1 } else { draws };

    let ensemble = (0..ndraws)
        .map(|_| {
            let r = response.iter().map(|s| s.sample(rng)).collect();
            let b = background.iter().map(|s| s.sample(rng)).collect();
            Draw::new(r, b)
        })
        .collect();
    build(bins, ensemble)
}

/// Responses drawn from a multivariate normal with common pairwise
/// correlation `rho`, truncated to non-negative values; backgrounds gamma.
pub fn correlated_ensemble<R: Rng + ?Sized>(
    bins: &[BinEstimate],
    draws: usize,
    rho: f64,
    rng: &mut R,
) -> Result<MultiPoisson, AppError> {
    check_bins(bins, draws)?;
    if !(rho.is_finite() && rho > -1.0 && rho < 1.0) {
        return Err(AppError::range(format!("Response correlation must be in (-1, 1), got {rho}.")));
    }
    if let Some(b) = bins.iter().find(|b| !(b.response_unc.is_finite() && b.response_unc > 0.0)) {
        return Err(AppError::range(format!(
            "Correlated responses need a positive uncertainty in every bin; '{}' has {}.",
            b.label, b.response_unc
        )));
    }

    let n = bins.len();
    let mean: Vec<f64> = bins.iter().map(|b| b.response).collect();
    let std_devs: Vec<f64> = bins.iter().map(|b| b.response_unc).collect();
    let cor = DMatrix::from_fn(n, n, |i, j| if i == j { 1.0 } else { rho });
    let mvn = MultiNormal::from_correlation(&mean, &std_devs, &cor)?;
    let background = background_sources(bins)?;

    let mut ensemble = Vec::with_capacity(draws);
    for _ in 0..draws {
        let r = mvn.sample_positive(rng)?;
        let b = background.iter().map(|s| s.sample(rng)).collect();
        ensemble.push(Draw::new(r, b));
    }
    build(bins, ensemble)
}

fn check_bins(bins: &[BinEstimate], draws: usize) -> Result<(), AppError> {
    if bins.is_empty() {
        return Err(AppError::format("Need at least one bin estimate."));
    }
    if draws == 0 {
        return Err(AppError::range("Number of ensemble draws must be > 0."));
    }
    Ok(())
}

fn background_sources(bins: &[BinEstimate]) -> Result<Vec<Source>, AppError> {
    bins.iter()
        .map(|b| Source::new(b.background, b.background_unc, &format!("{} background", b.label)))
        .collect()
}

fn build(bins: &[BinEstimate], ensemble: Vec<Draw>) -> Result<MultiPoisson, AppError> {
    let labels = bins.iter().map(|b| b.label.clone()).collect();
    let counts = bins.iter().map(|b| b.count).collect();
    MultiPoisson::with_labels(labels, counts, ensemble)
}
