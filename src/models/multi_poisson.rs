//! Multi-bin Poisson model marginalized over a nuisance ensemble.
//!
//! ```text
//! L(mu) = (1/T) Σ_t Π_i Poisson(N_i | mu * r_ti + b_ti)
//! ```
//!
//! Each draw `t` is one joint "systematic universe": responses and
//! backgrounds for every bin were sampled together, so cross-bin correlations
//! survive the average.

use std::borrow::Cow;

use rand::{Rng, RngCore};
use rayon::prelude::*;

use crate::error::AppError;
use crate::math::{ln_factorials, ln_poisson, log_sum_exp};
use crate::models::{CountingModel, check_inputs, sample_poisson, suggest_range_from_totals};

/// Ensembles at least this large are evaluated in parallel.
pub const PARALLEL_MIN_DRAWS: usize = 512;

/// One joint nuisance draw: a response and a background per bin.
#[derive(Debug, Clone, PartialEq)]
pub struct Draw {
    pub response: Vec<f64>,
    pub background: Vec<f64>,
}

impl Draw {
    pub fn new(response: Vec<f64>, background: Vec<f64>) -> Self {
        Self { response, background }
    }
}

#[derive(Debug, Clone)]
pub struct MultiPoisson {
    labels: Vec<String>,
    counts: Vec<u64>,
    ln_fact: Vec<f64>,
    draws: Vec<Draw>,
}

impl MultiPoisson {
    /// Build from observed counts and an ensemble, with default labels `bin1..binN`.
    pub fn new(counts: Vec<u64>, draws: Vec<Draw>) -> Result<Self, AppError> {
        let labels = (1..=counts.len()).map(|i| format!("bin{i}")).collect();
        Self::with_labels(labels, counts, draws)
    }

    pub fn with_labels(labels: Vec<String>, counts: Vec<u64>, draws: Vec<Draw>) -> Result<Self, AppError> {
        let nbins = counts.len();
        if nbins == 0 {
            return Err(AppError::format("Model needs at least one bin."));
        }
        if labels.len() != nbins {
            return Err(AppError::format(format!(
                "{} labels given for {nbins} bins.",
                labels.len()
            )));
        }
        if draws.is_empty() {
            return Err(AppError::format("Nuisance ensemble is empty; need at least one draw."));
        }
        for (t, draw) in draws.iter().enumerate() {
            if draw.response.len() != nbins || draw.background.len() != nbins {
                return Err(AppError::format(format!(
                    "Draw {} has {} responses and {} backgrounds; expected {nbins} of each.",
                    t + 1,
                    draw.response.len(),
                    draw.background.len()
                )));
            }
            let bad = draw
                .response
                .iter()
                .chain(draw.background.iter())
                .find(|v| !v.is_finite() || **v < 0.0);
            if let Some(v) = bad {
                return Err(AppError::format(format!(
                    "Draw {} contains an invalid value {v}; responses and backgrounds must be finite and >= 0.",
                    t + 1
                )));
            }
        }

        let ln_fact = ln_factorials(&counts);
        tracing::debug!(nbins, draws = draws.len(), "multi-poisson model built");
        Ok(Self {
            labels,
            counts,
            ln_fact,
            draws,
        })
    }

    /// Scale every response by a global luminosity (cross-section interpretation).
    pub fn with_luminosity(mut self, lumi: f64) -> Result<Self, AppError> {
        if !(lumi.is_finite() && lumi > 0.0) {
            return Err(AppError::range(format!("Luminosity must be finite and > 0, got {lumi}.")));
        }
        for draw in &mut self.draws {
            for r in &mut draw.response {
                *r *= lumi;
            }
        }
        Ok(self)
    }

    pub fn draws(&self) -> &[Draw] {
        &self.draws
    }

    pub fn ndraws(&self) -> usize {
        self.draws.len()
    }

    /// The same bins and counts with the ensemble reduced to draw `index` (0-based).
    pub fn single_draw(&self, index: usize) -> Result<Self, AppError> {
        let draw = self.draws.get(index).ok_or_else(|| {
            AppError::range(format!(
                "Draw index {index} is out of range; the ensemble has {} draws.",
                self.draws.len()
            ))
        })?;
        Ok(Self {
            labels: self.labels.clone(),
            counts: self.counts.clone(),
            ln_fact: self.ln_fact.clone(),
            draws: vec![draw.clone()],
        })
    }

    /// Per-bin ensemble mean of the response.
    pub fn mean_response(&self) -> Vec<f64> {
        self.column_means(|d| &d.response)
    }

    /// Per-bin ensemble mean of the background.
    pub fn mean_background(&self) -> Vec<f64> {
        self.column_means(|d| &d.background)
    }

    fn column_means(&self, pick: impl Fn(&Draw) -> &Vec<f64>) -> Vec<f64> {
        let mut sums = vec![0.0; self.counts.len()];
        for draw in &self.draws {
            for (s, v) in sums.iter_mut().zip(pick(draw)) {
                *s += v;
            }
        }
        let t = self.draws.len() as f64;
        sums.into_iter().map(|s| s / t).collect()
    }

    fn ln_draw(data: &[u64], ln_fact: &[f64], draw: &Draw, mu: f64) -> f64 {
        let mut sum = 0.0;
        for i in 0..data.len() {
            let mean = mu * draw.response[i] + draw.background[i];
            sum += ln_poisson(data[i], mean, ln_fact[i]);
            if sum == f64::NEG_INFINITY {
                break;
            }
        }
        sum
    }
}

impl CountingModel for MultiPoisson {
    fn nbins(&self) -> usize {
        self.counts.len()
    }

    fn counts(&self) -> &[u64] {
        &self.counts
    }

    fn labels(&self) -> &[String] {
        &self.labels
    }

    fn ln_likelihood(&self, data: &[u64], mu: f64) -> Result<f64, AppError> {
        check_inputs(self.nbins(), data, mu)?;
        let ln_fact: Cow<'_, [f64]> = if data == self.counts.as_slice() {
            Cow::Borrowed(self.ln_fact.as_slice())
        } else {
            Cow::Owned(ln_factorials(data))
        };

        // Ordered collection then a serial reduction: identical to the serial path.
        let terms: Vec<f64> = if self.draws.len() >= PARALLEL_MIN_DRAWS {
            self.draws
                .par_iter()
                .map(|d| Self::ln_draw(data, &ln_fact, d, mu))
                .collect()
        } else {
            self.draws
                .iter()
                .map(|d| Self::ln_draw(data, &ln_fact, d, mu))
                .collect()
        };

        Ok(log_sum_exp(&terms) - (self.draws.len() as f64).ln())
    }

    fn generate(&self, mu: f64, rng: &mut dyn RngCore) -> Result<Vec<u64>, AppError> {
        if !mu.is_finite() {
            return Err(AppError::range(format!("Parameter of interest must be finite, got {mu}.")));
        }
        let t = rng.gen_range(0..self.draws.len());
        let draw = &self.draws[t];
        (0..self.nbins())
            .map(|i| sample_poisson(mu * draw.response[i] + draw.background[i], &mut *rng))
            .collect()
    }

    fn suggest_range(&self) -> (f64, f64) {
        let n: f64 = self.counts.iter().map(|&c| c as f64).sum();
        let a: f64 = self.mean_response().iter().sum();
        let b: f64 = self.mean_background().iter().sum();
        suggest_range_from_totals(n, a, b)
    }
}
