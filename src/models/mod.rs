//! Counting-experiment likelihood models.
//!
//! Two models are provided:
//! - [`MultiPoisson`]: nuisance parameters marginalized by averaging over an
//!   ensemble of sampled `(response, background)` draws
//! - [`MultiPoissonGamma`]: per-bin gamma nuisances marginalized analytically
//!
//! Calculators only ever see the [`CountingModel`] trait.

use rand::RngCore;
use rand_distr::{Distribution, Poisson};

use crate::error::AppError;

pub mod multi_poisson;
pub mod poisson_gamma;

pub use multi_poisson::*;
pub use poisson_gamma::*;

/// Likelihood over one or more Poisson counting bins with the parameter of
/// interest `mu` scaling each bin's response.
///
/// Implementations are immutable after construction and shared across threads.
pub trait CountingModel: Send + Sync {
    fn nbins(&self) -> usize;

    /// Observed counts, one per bin.
    fn counts(&self) -> &[u64];

    fn labels(&self) -> &[String];

    /// `ln p(data | mu)`, nuisances marginalized. May be `-inf`.
    fn ln_likelihood(&self, data: &[u64], mu: f64) -> Result<f64, AppError>;

    fn likelihood(&self, data: &[u64], mu: f64) -> Result<f64, AppError> {
        Ok(self.ln_likelihood(data, mu)?.exp())
    }

    fn ln_likelihood_observed(&self, mu: f64) -> Result<f64, AppError> {
        self.ln_likelihood(self.counts(), mu)
    }

    /// Draw one pseudo-experiment at `mu`.
    fn generate(&self, mu: f64, rng: &mut dyn RngCore) -> Result<Vec<u64>, AppError>;

    /// Default `[mu_min, mu_max]` scan range derived from the observed counts.
    fn suggest_range(&self) -> (f64, f64);
}

/// Either model, selected at runtime from the input file format.
#[derive(Debug, Clone)]
pub enum Model {
    MultiPoisson(MultiPoisson),
    PoissonGamma(MultiPoissonGamma),
}

impl CountingModel for Model {
    fn nbins(&self) -> usize {
        match self {
            Model::MultiPoisson(m) => m.nbins(),
            Model::PoissonGamma(m) => m.nbins(),
        }
    }

    fn counts(&self) -> &[u64] {
        match self {
            Model::MultiPoisson(m) => m.counts(),
            Model::PoissonGamma(m) => m.counts(),
        }
    }

    fn labels(&self) -> &[String] {
        match self {
            Model::MultiPoisson(m) => m.labels(),
            Model::PoissonGamma(m) => m.labels(),
        }
    }

    fn ln_likelihood(&self, data: &[u64], mu: f64) -> Result<f64, AppError> {
        match self {
            Model::MultiPoisson(m) => m.ln_likelihood(data, mu),
            Model::PoissonGamma(m) => m.ln_likelihood(data, mu),
        }
    }

    fn generate(&self, mu: f64, rng: &mut dyn RngCore) -> Result<Vec<u64>, AppError> {
        match self {
            Model::MultiPoisson(m) => m.generate(mu, rng),
            Model::PoissonGamma(m) => m.generate(mu, rng),
        }
    }

    fn suggest_range(&self) -> (f64, f64) {
        match self {
            Model::MultiPoisson(m) => m.suggest_range(),
            Model::PoissonGamma(m) => m.suggest_range(),
        }
    }
}

impl Model {
    pub fn kind_name(&self) -> &'static str {
        match self {
            Model::MultiPoisson(_) => "multi-poisson",
            Model::PoissonGamma(_) => "poisson-gamma",
        }
    }
}

/// Reject data whose length differs from the model's bin count, and a
/// non-finite `mu`.
pub(crate) fn check_inputs(nbins: usize, data: &[u64], mu: f64) -> Result<(), AppError> {
    if data.len() != nbins {
        return Err(AppError::format(format!(
            "Data has {} bins but the model has {nbins}.",
            data.len()
        )));
    }
    if !mu.is_finite() {
        return Err(AppError::range(format!("Parameter of interest must be finite, got {mu}.")));
    }
    Ok(())
}

/// One Poisson draw. Non-positive (or non-finite) means yield zero.
pub(crate) fn sample_poisson(mean: f64, rng: &mut dyn RngCore) -> Result<u64, AppError> {
    if !mean.is_finite() || mean <= 0.0 {
        return Ok(0);
    }
    let pois = Poisson::new(mean)
        .map_err(|e| AppError::computation(format!("Poisson sampler (mean={mean}) failed: {e}")))?;
    let k: f64 = pois.sample(rng);
    Ok(k as u64)
}

/// Scan-range heuristic from total observed count `n`, summed mean response
/// `a`, and summed mean background `b`.
///
/// The signal estimate `(n - b) / a` plus ten of its Poisson standard errors,
/// rounded up to the next multiple of ten.
pub(crate) fn suggest_range_from_totals(n: f64, a: f64, b: f64) -> (f64, f64) {
    if !(a.is_finite() && a > 0.0) {
        return (0.0, 10.0);
    }
    let sig_est = ((n - b) / a).max(0.0);
    let sig_err = n.max(1.0).sqrt() / a;
    let max = (((sig_est + 10.0 * sig_err) / 10.0).floor() + 1.0) * 10.0;
    (0.0, max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn data_length_must_match() {
        let err = check_inputs(2, &[1, 2, 3], 1.0).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Format);
        assert!(check_inputs(3, &[1, 2, 3], f64::NAN).is_err());
        assert!(check_inputs(3, &[1, 2, 3], -1.0).is_ok());
    }

    #[test]
    fn poisson_sampler_handles_zero_mean() {
        let mut rng = StdRng::seed_from_u64(5);
        assert_eq!(sample_poisson(0.0, &mut rng).unwrap(), 0);
        assert_eq!(sample_poisson(-3.0, &mut rng).unwrap(), 0);
        let mean = (0..20_000).map(|_| sample_poisson(3.0, &mut rng).unwrap() as f64).sum::<f64>() / 20_000.0;
        assert!((mean - 3.0).abs() < 0.05);
    }

    #[test]
    fn suggested_range_rounds_to_tens() {
        // n=5, a=1, b=2: 3 + 10*sqrt(5) = 25.36 -> 30.
        assert_eq!(suggest_range_from_totals(5.0, 1.0, 2.0), (0.0, 30.0));
        // n=0: 0 + 10*1 = 10 -> 20.
        assert_eq!(suggest_range_from_totals(0.0, 1.0, 0.0), (0.0, 20.0));
    }
}
