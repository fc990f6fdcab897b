//! Asymptotic CLs upper limits.
//!
//! With `q = max(0, 2 [NLL(mu) - NLL(mu_hat)])` and the Wald width `sigma`:
//!
//! ```text
//! CLs+b = 1 - Φ(sqrt(q))
//! CLb   = Φ(mu / sigma - sqrt(q))
//! CLs   = CLs+b / CLb
//! ```
//!
//! The upper limit at level `cl` solves `CLs(mu) = 1 - cl` above the MLE.

use std::sync::Arc;

use crate::calc::{LimitCalculator, WaldCalculator, check_cl};
use crate::error::AppError;
use crate::math::{bisect_root, std_normal_cdf, std_normal_sf};
use crate::models::CountingModel;

pub const DEFAULT_CLS_CL: f64 = 0.95;

#[derive(Debug, Clone)]
pub struct ClsCalculator<M: CountingModel> {
    wald: WaldCalculator<M>,
}

impl<M: CountingModel> ClsCalculator<M> {
    pub fn new(model: Arc<M>, data: Vec<u64>, mu_min: f64, mu_max: f64, cl: f64) -> Result<Self, AppError> {
        Ok(Self {
            wald: WaldCalculator::new(model, data, mu_min, mu_max, cl)?,
        })
    }

    pub fn observed(model: Arc<M>, mu_min: f64, mu_max: f64) -> Result<Self, AppError> {
        let data = model.counts().to_vec();
        Self::new(model, data, mu_min, mu_max, DEFAULT_CLS_CL)
    }

    /// Underlying asymptotic fit (MLE and width).
    pub fn wald(&self) -> &WaldCalculator<M> {
        &self.wald
    }

    /// `(CLs+b, CLb)` at `mu`.
    pub fn tail_probabilities(&self, mu: f64) -> Result<(f64, f64), AppError> {
        let sqrt_q = self.wald.test_statistic(mu)?.sqrt();
        let clsb = std_normal_sf(sqrt_q);
        let clb = std_normal_cdf(mu / self.wald.uncertainty() - sqrt_q);
        Ok((clsb, clb))
    }

    pub fn cls(&self, mu: f64) -> Result<f64, AppError> {
        let (clsb, clb) = self.tail_probabilities(mu)?;
        if clb <= 0.0 {
            return Err(AppError::computation(format!("CLb vanishes at mu={mu}; CLs is undefined.")));
        }
        Ok(clsb / clb)
    }

    /// Upper limit: root of `CLs(mu) = 1 - cl` on `[max(mu_hat, mu_min), mu_max]`.
    pub fn limit(&self, cl: f64) -> Result<f64, AppError> {
        check_cl(cl)?;
        let (mu_min, mu_max) = self.wald.range();
        let lo = self.wald.estimate().max(mu_min);
        let alpha = 1.0 - cl;
        bisect_root(|mu| Ok(self.cls(mu)? - alpha), lo, mu_max).map_err(|e| {
            AppError::computation(format!(
                "CLs limit at cl={cl} not bracketed on [{lo}, {mu_max}] (try a larger mu_max): {}",
                e.message()
            ))
        })
    }
}

impl<M: CountingModel> LimitCalculator for ClsCalculator<M> {
    fn data(&self) -> &[u64] {
        self.wald.data()
    }

    fn cl(&self) -> f64 {
        self.wald.cl()
    }

    fn percentile(&self, p: f64) -> Result<f64, AppError> {
        self.limit(p)
    }

    fn zvalue(&self, mu: f64) -> Result<f64, AppError> {
        self.wald.zvalue(mu)
    }

    fn refit(&self, data: Vec<u64>) -> Result<Self, AppError> {
        Ok(Self {
            wald: self.wald.refit(data)?,
        })
    }

    fn model(&self) -> &dyn CountingModel {
        self.wald.shared_model().as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::models::{Draw, MultiPoisson};
    use approx::assert_relative_eq;

    fn model(n: u64, r: f64, b: f64) -> Arc<MultiPoisson> {
        Arc::new(MultiPoisson::new(vec![n], vec![Draw::new(vec![r], vec![b])]).unwrap())
    }

    #[test]
    fn limit_sits_above_mle_and_solves_cls() {
        let calc = ClsCalculator::observed(model(2, 1.0, 1.0), 0.0, 30.0).unwrap();
        let limit = calc.upper_limit().unwrap();
        assert!(limit > calc.wald().estimate());
        assert_relative_eq!(calc.cls(limit).unwrap(), 0.05, epsilon = 1e-6);
    }

    #[test]
    fn cls_is_one_at_boundary_mle_and_decreases() {
        let calc = ClsCalculator::observed(model(1, 1.0, 2.0), 0.0, 30.0).unwrap();
        assert_eq!(calc.wald().estimate(), 0.0);
        assert_relative_eq!(calc.cls(0.0).unwrap(), 1.0, epsilon = 1e-12);
        let mut prev = calc.cls(0.0).unwrap();
        for i in 1..20 {
            let v = calc.cls(i as f64).unwrap();
            assert!(v <= prev);
            prev = v;
        }
    }

    #[test]
    fn tighter_level_gives_lower_limit() {
        let calc = ClsCalculator::observed(model(3, 1.0, 1.0), 0.0, 40.0).unwrap();
        assert!(calc.limit(0.90).unwrap() < calc.limit(0.95).unwrap());
    }

    #[test]
    fn unbracketed_limit_is_computation_error() {
        let calc = ClsCalculator::observed(model(2, 1.0, 1.0), 0.0, 1.5).unwrap();
        assert_eq!(calc.limit(0.95).unwrap_err().kind(), ErrorKind::Computation);
    }

    #[test]
    fn refit_shares_model() {
        let calc = ClsCalculator::observed(model(2, 1.0, 1.0), 0.0, 30.0).unwrap();
        let other = calc.refit(vec![5]).unwrap();
        assert_eq!(other.data(), &[5]);
        assert!(other.upper_limit().unwrap() > calc.upper_limit().unwrap());
        assert_eq!(other.model().nbins(), 1);
    }
}
