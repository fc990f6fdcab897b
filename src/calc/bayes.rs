//! Bayesian limits from a posterior tabulated on a uniform grid.
//!
//! The posterior `p(mu | data) ∝ L(data | mu) pi(mu)` is tabulated on a uniform
//! grid, normalized in log space against its maximum, integrated with composite
//! Simpson, and inverted by linear interpolation. The prior `pi` is flat unless
//! one is supplied through [`BayesCalculator::with_prior`].
//!
//! The grid is refined until it resolves the posterior: each pass locates the
//! support (where the posterior exceeds [`SUPPORT_CUTOFF`] of its peak) and the
//! next pass spends all [`GRID_STEPS`] intervals on it. Refinement stops once
//! the support spans at least [`MIN_SUPPORT_NODES`] nodes.

use std::sync::Arc;

use rayon::prelude::*;

use crate::calc::{LimitCalculator, check_cl, check_probability};
use crate::domain::Interval;
use crate::error::AppError;
use crate::math::{
    bounded_argmax, check_range, cumulative_simpson, lin_space, linear_interp, second_derivative, std_normal_quantile,
};
use crate::models::CountingModel;
use crate::prior::{FlatPrior, Prior};

/// Grid intervals per pass (even, for Simpson pairs).
pub const GRID_STEPS: usize = 4000;

/// Posterior values below this fraction of the peak are treated as outside the support.
pub const SUPPORT_CUTOFF: f64 = 1e-12;

/// Grid nodes the support must cover before the posterior is integrated.
pub const MIN_SUPPORT_NODES: usize = 200;

/// Narrowing passes allowed after the first scan.
pub const MAX_REFINEMENTS: usize = 12;

pub const DEFAULT_BAYES_CL: f64 = 0.90;

#[derive(Debug, Clone)]
pub struct BayesCalculator<M: CountingModel> {
    model: Arc<M>,
    prior: Arc<dyn Prior>,
    data: Vec<u64>,
    mu_min: f64,
    mu_max: f64,
    cl: f64,
    grid: Vec<f64>,
    /// Normalized posterior density at each grid node.
    density: Vec<f64>,
    /// Posterior CDF at each grid node; starts at 0 and ends at 1.
    cdf: Vec<f64>,
}

impl<M: CountingModel> BayesCalculator<M> {
    /// Flat-prior calculator.
    pub fn new(model: Arc<M>, data: Vec<u64>, mu_min: f64, mu_max: f64, cl: f64) -> Result<Self, AppError> {
        Self::with_prior(model, data, mu_min, mu_max, cl, Arc::new(FlatPrior))
    }

    pub fn with_prior(
        model: Arc<M>,
        data: Vec<u64>,
        mu_min: f64,
        mu_max: f64,
        cl: f64,
        prior: Arc<dyn Prior>,
    ) -> Result<Self, AppError> {
        check_range(mu_min, mu_max)?;
        check_cl(cl)?;

        let (grid, ln_p) = refine(model.as_ref(), prior.as_ref(), &data, mu_min, mu_max)?;
        let peak = peak_of(&ln_p)?;

        let y: Vec<f64> = ln_p.iter().map(|v| (v - peak).exp()).collect();
        let h = grid[1] - grid[0];
        let raw = cumulative_simpson(&y, h)?;
        let total = raw[raw.len() - 1];
        if !(total.is_finite() && total > 0.0) {
            return Err(AppError::computation(format!(
                "Posterior normalization is {total}; the posterior vanishes on [{mu_min}, {mu_max}]."
            )));
        }

        let density = y.iter().map(|v| v / total).collect();
        let cdf = raw.iter().map(|v| v / total).collect();

        Ok(Self {
            model,
            prior,
            data,
            mu_min,
            mu_max,
            cl,
            grid,
            density,
            cdf,
        })
    }

    /// Calculator for the model's observed counts at the default level.
    pub fn observed(model: Arc<M>, mu_min: f64, mu_max: f64) -> Result<Self, AppError> {
        let data = model.counts().to_vec();
        Self::new(model, data, mu_min, mu_max, DEFAULT_BAYES_CL)
    }

    /// Posterior quantile: the `mu` with `CDF(mu) = p`.
    pub fn quantile(&self, p: f64) -> Result<f64, AppError> {
        check_probability(p, "Quantile probability")?;
        let idx = self.cdf.partition_point(|&c| c < p);
        if idx == 0 {
            return Ok(self.grid[0]);
        }
        if idx >= self.cdf.len() {
            return Ok(self.grid[self.grid.len() - 1]);
        }
        Ok(linear_interp(
            (self.cdf[idx - 1], self.grid[idx - 1]),
            (self.cdf[idx], self.grid[idx]),
            p,
        ))
    }

    /// Equal-tailed credible interval at level `cl`.
    pub fn central_interval(&self, cl: f64) -> Result<Interval, AppError> {
        check_cl(cl)?;
        let alpha = 1.0 - cl;
        Ok(Interval {
            lower: self.quantile(alpha / 2.0)?,
            upper: self.quantile(1.0 - alpha / 2.0)?,
            cl,
        })
    }

    /// Posterior CDF at `mu`.
    pub fn cdf(&self, mu: f64) -> f64 {
        self.interpolate(&self.cdf, mu, 0.0, 1.0)
    }

    /// Normalized posterior density at `mu`; zero outside the support.
    pub fn posterior(&self, mu: f64) -> f64 {
        self.interpolate(&self.density, mu, 0.0, 0.0)
    }

    /// Mode of the posterior.
    pub fn map_estimate(&self) -> Result<f64, AppError> {
        let lo = self.grid[0];
        let hi = self.grid[self.grid.len() - 1];
        bounded_argmax(|mu| self.ln_posterior(mu), lo, hi, 200)
    }

    /// Uncertainty of the MAP estimate at level `cl`.
    ///
    /// The unnormalized `ln p` is treated as parabolic around its mode, so the
    /// result is `z / sqrt(-d2 ln p / dmu2)` with `z` the two-sided normal
    /// quantile `Phi^-1((1 + cl) / 2)`.
    pub fn map_uncertainty(&self, cl: f64) -> Result<f64, AppError> {
        check_cl(cl)?;
        let estimate = self.map_estimate()?;
        let lo = self.grid[0];
        let hi = self.grid[self.grid.len() - 1];
        let d2 = second_derivative(|mu| -self.ln_posterior(mu), estimate, lo, hi);
        if !(d2.is_finite() && d2 > 0.0) {
            return Err(AppError::computation(format!(
                "Posterior curvature at the MAP estimate {estimate} is {d2}; its uncertainty is undefined."
            )));
        }
        Ok(std_normal_quantile((1.0 + cl) / 2.0) / d2.sqrt())
    }

    /// Bayes-factor Z-value of the data for `mu` against `mu = 0`.
    pub fn zvalue(&self, mu: f64) -> Result<f64, AppError> {
        let ln_b10 = self.model.ln_likelihood(&self.data, mu)? - self.model.ln_likelihood(&self.data, 0.0)?;
        if !ln_b10.is_finite() {
            return Err(AppError::computation(format!(
                "Bayes factor for mu={mu} against mu=0 is not finite (ln B10 = {ln_b10})."
            )));
        }
        Ok(ln_b10.signum() * (2.0 * ln_b10.abs()).sqrt())
    }

    pub fn range(&self) -> (f64, f64) {
        (self.mu_min, self.mu_max)
    }

    /// Grid actually used for the posterior (the support after refinement).
    pub fn grid(&self) -> &[f64] {
        &self.grid
    }

    pub fn prior(&self) -> &Arc<dyn Prior> {
        &self.prior
    }

    /// Unnormalized `ln L + ln pi`; NaN is mapped to `-inf`.
    fn ln_posterior(&self, mu: f64) -> f64 {
        ln_posterior_at(self.model.as_ref(), self.prior.as_ref(), &self.data, mu).unwrap_or(f64::NEG_INFINITY)
    }

    fn interpolate(&self, values: &[f64], mu: f64, below: f64, above: f64) -> f64 {
        let last = self.grid.len() - 1;
        if mu < self.grid[0] {
            return below;
        }
        if mu > self.grid[last] {
            return above;
        }
        let idx = self.grid.partition_point(|&x| x < mu).clamp(1, last);
        linear_interp(
            (self.grid[idx - 1], values[idx - 1]),
            (self.grid[idx], values[idx]),
            mu,
        )
    }
}

impl<M: CountingModel> LimitCalculator for BayesCalculator<M> {
    fn data(&self) -> &[u64] {
        &self.data
    }

    fn cl(&self) -> f64 {
        self.cl
    }

    fn percentile(&self, p: f64) -> Result<f64, AppError> {
        self.quantile(p)
    }

    fn zvalue(&self, mu: f64) -> Result<f64, AppError> {
        BayesCalculator::zvalue(self, mu)
    }

    fn refit(&self, data: Vec<u64>) -> Result<Self, AppError> {
        Self::with_prior(
            Arc::clone(&self.model),
            data,
            self.mu_min,
            self.mu_max,
            self.cl,
            Arc::clone(&self.prior),
        )
    }

    fn model(&self) -> &dyn CountingModel {
        self.model.as_ref()
    }
}

/// Rescan narrower grids until the posterior support covers
/// [`MIN_SUPPORT_NODES`] nodes or fills the whole grid.
fn refine<M: CountingModel>(
    model: &M,
    prior: &dyn Prior,
    data: &[u64],
    mu_min: f64,
    mu_max: f64,
) -> Result<(Vec<f64>, Vec<f64>), AppError> {
    let ln_cut = SUPPORT_CUTOFF.ln();
    let (mut lo, mut hi) = (mu_min, mu_max);
    let mut passes = 0;
    loop {
        let grid = lin_space(lo, hi, GRID_STEPS)?;
        let ln_p = scan(model, prior, data, &grid)?;
        let peak = peak_of(&ln_p)?;

        let first = ln_p.iter().position(|v| v - peak > ln_cut).unwrap_or(0);
        let last = ln_p.iter().rposition(|v| v - peak > ln_cut).unwrap_or(GRID_STEPS);
        let nodes = last - first + 1;
        let next_lo = grid[first.saturating_sub(1)];
        let next_hi = grid[(last + 1).min(GRID_STEPS)];

        let narrower = next_lo > lo || next_hi < hi;
        if !narrower || (passes > 0 && nodes >= MIN_SUPPORT_NODES) {
            tracing::debug!(lo, hi, nodes, passes, "bayes: posterior grid resolved");
            return Ok((grid, ln_p));
        }
        if passes == MAX_REFINEMENTS {
            return Err(AppError::computation(format!(
                "Posterior support on [{mu_min}, {mu_max}] is unresolved after {passes} refinements \
                 ({nodes} nodes on [{lo}, {hi}])."
            )));
        }
        passes += 1;
        tracing::debug!(lo = next_lo, hi = next_hi, nodes, "bayes: narrowing grid to posterior support");
        lo = next_lo;
        hi = next_hi;
    }
}

fn ln_posterior_at<M: CountingModel>(model: &M, prior: &dyn Prior, data: &[u64], mu: f64) -> Result<f64, AppError> {
    let ln_pi = prior.ln_density(mu);
    if ln_pi == f64::NEG_INFINITY {
        return Ok(f64::NEG_INFINITY);
    }
    let v = model.ln_likelihood(data, mu)? + ln_pi;
    Ok(if v.is_nan() { f64::NEG_INFINITY } else { v })
}

/// `ln L + ln pi` at every grid node.
fn scan<M: CountingModel>(model: &M, prior: &dyn Prior, data: &[u64], grid: &[f64]) -> Result<Vec<f64>, AppError> {
    grid.par_iter()
        .map(|&mu| ln_posterior_at(model, prior, data, mu))
        .collect()
}

fn peak_of(ln_l: &[f64]) -> Result<f64, AppError> {
    let peak = ln_l.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !peak.is_finite() {
        return Err(AppError::computation(
            "Posterior is zero (or infinite) everywhere on the scan range; it is undefined.",
        ));
    }
    Ok(peak)
}
