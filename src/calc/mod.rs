//! Limit calculators built on a [`CountingModel`].
//!
//! - [`BayesCalculator`]: posterior quantiles under a flat or supplied prior
//! - [`WaldCalculator`]: asymptotic Gaussian approximation around the MLE
//! - [`ClsCalculator`]: asymptotic CLs upper limits
//! - [`ExpectedLimitsGenerator`]: pseudo-experiment limit bands for any of them

use crate::error::AppError;
use crate::models::CountingModel;

pub mod bayes;
pub mod cls;
pub mod expected;
pub mod wald;

pub use bayes::*;
pub use cls::*;
pub use expected::*;
pub use wald::*;

/// Common interface shared by the calculators.
pub trait LimitCalculator: Send + Sync {
    /// Counts this calculator was built on.
    fn data(&self) -> &[u64];

    /// Confidence (credibility) level used by [`LimitCalculator::upper_limit`].
    fn cl(&self) -> f64;

    /// Value of the parameter of interest below which a fraction `p` of the
    /// belief (or coverage) lies. `p` must be in `(0, 1)`.
    fn percentile(&self, p: f64) -> Result<f64, AppError>;

    fn upper_limit(&self) -> Result<f64, AppError> {
        self.percentile(self.cl())
    }

    /// Signed significance of the data against the hypothesis `mu`.
    fn zvalue(&self, mu: f64) -> Result<f64, AppError>;

    /// Same model, range, and level, fitted to different counts.
    fn refit(&self, data: Vec<u64>) -> Result<Self, AppError>
    where
        Self: Sized;

    fn model(&self) -> &dyn CountingModel;
}

/// Shared validation for calculator constructors.
pub(crate) fn check_cl(cl: f64) -> Result<(), AppError> {
    check_probability(cl, "Confidence level")
}

pub(crate) fn check_probability(p: f64, what: &str) -> Result<(), AppError> {
    if !(p > 0.0 && p < 1.0) {
        return Err(AppError::range(format!("{what} must lie strictly between 0 and 1, got {p}.")));
    }
    Ok(())
}
