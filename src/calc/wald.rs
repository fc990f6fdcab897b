//! Asymptotic (Wald) inference around the maximum-likelihood estimate.
//!
//! The likelihood is approximated as Gaussian in `mu` with mean `mu_hat` and
//! width `sigma = 1/sqrt(d²NLL/dmu²)`. Significances use the profile
//! likelihood ratio `t = 2 [NLL(h) - NLL(mu_hat)]`.

use std::sync::Arc;

use crate::calc::{LimitCalculator, check_cl, check_probability};
use crate::domain::Interval;
use crate::error::AppError;
use crate::math::{bounded_argmax, check_range, second_derivative, std_normal_quantile, std_normal_sf};
use crate::models::CountingModel;

pub const DEFAULT_WALD_CL: f64 = 0.95;

/// Coarse grid used to bracket the MLE before golden-section refinement.
pub const FIT_GRID_STEPS: usize = 400;

#[derive(Debug, Clone)]
pub struct WaldCalculator<M: CountingModel> {
    model: Arc<M>,
    data: Vec<u64>,
    mu_min: f64,
    mu_max: f64,
    cl: f64,
    estimate: f64,
    uncertainty: f64,
    nll_hat: f64,
}

impl<M: CountingModel> WaldCalculator<M> {
    pub fn new(model: Arc<M>, data: Vec<u64>, mu_min: f64, mu_max: f64, cl: f64) -> Result<Self, AppError> {
        check_range(mu_min, mu_max)?;
        check_cl(cl)?;
        // Surface input errors (bin count mismatch) before the optimizer swallows them.
        model.ln_likelihood(&data, mu_min)?;

        let nll = |mu: f64| -model.ln_likelihood(&data, mu).unwrap_or(f64::NEG_INFINITY);
        let estimate = bounded_argmax(|mu| -nll(mu), mu_min, mu_max, FIT_GRID_STEPS)?;
        let nll_hat = nll(estimate);

        let d2 = second_derivative(nll, estimate, mu_min, mu_max);
        if !(d2.is_finite() && d2 > 0.0) {
            return Err(AppError::computation(format!(
                "NLL curvature at mu_hat={estimate} is {d2}; the asymptotic uncertainty is undefined."
            )));
        }
        let uncertainty = 1.0 / d2.sqrt();
        tracing::debug!(estimate, uncertainty, "wald: fitted");

        Ok(Self {
            model,
            data,
            mu_min,
            mu_max,
            cl,
            estimate,
            uncertainty,
            nll_hat,
        })
    }

    pub fn observed(model: Arc<M>, mu_min: f64, mu_max: f64) -> Result<Self, AppError> {
        let data = model.counts().to_vec();
        Self::new(model, data, mu_min, mu_max, DEFAULT_WALD_CL)
    }

    /// Maximum-likelihood estimate of `mu` within the scan range.
    pub fn estimate(&self) -> f64 {
        self.estimate
    }

    /// Asymptotic standard error of [`WaldCalculator::estimate`].
    pub fn uncertainty(&self) -> f64 {
        self.uncertainty
    }

    pub fn nll(&self, mu: f64) -> Result<f64, AppError> {
        Ok(-self.model.ln_likelihood(&self.data, mu)?)
    }

    /// `mu_hat + sigma Φ⁻¹(p)`; the median is exactly the estimate.
    pub fn quantile(&self, p: f64) -> Result<f64, AppError> {
        check_probability(p, "Quantile probability")?;
        if p == 0.5 {
            return Ok(self.estimate);
        }
        Ok(self.estimate + self.uncertainty * std_normal_quantile(p))
    }

    pub fn central_interval(&self, cl: f64) -> Result<Interval, AppError> {
        check_cl(cl)?;
        let alpha = 1.0 - cl;
        Ok(Interval {
            lower: self.quantile(alpha / 2.0)?,
            upper: self.quantile(1.0 - alpha / 2.0)?,
            cl,
        })
    }

    /// Profile-likelihood ratio statistic `max(0, 2 [NLL(h) - NLL(mu_hat)])`.
    pub fn test_statistic(&self, h: f64) -> Result<f64, AppError> {
        let t = (2.0 * (self.nll(h)? - self.nll_hat)).max(0.0);
        if !t.is_finite() {
            return Err(AppError::computation(format!(
                "Test statistic at mu={h} is not finite; the likelihood vanishes there."
            )));
        }
        Ok(t)
    }

    /// `sqrt(t)`, positive when `mu_hat > h` and negative otherwise.
    pub fn zvalue(&self, h: f64) -> Result<f64, AppError> {
        let z = self.test_statistic(h)?.sqrt();
        Ok(if self.estimate > h { z } else { -z })
    }

    /// Asymptotic p-value `1 - Φ(Z(mu))`.
    pub fn pvalue(&self, mu: f64) -> Result<f64, AppError> {
        Ok(std_normal_sf(self.zvalue(mu)?))
    }

    pub fn range(&self) -> (f64, f64) {
        (self.mu_min, self.mu_max)
    }

    pub(crate) fn shared_model(&self) -> &Arc<M> {
        &self.model
    }
}

impl<M: CountingModel> LimitCalculator for WaldCalculator<M> {
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
        WaldCalculator::zvalue(self, mu)
    }

    fn refit(&self, data: Vec<u64>) -> Result<Self, AppError> {
        Self::new(Arc::clone(&self.model), data, self.mu_min, self.mu_max, self.cl)
    }

    fn model(&self) -> &dyn CountingModel {
        self.model.as_ref()
    }
}
