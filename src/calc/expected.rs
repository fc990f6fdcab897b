//! Expected limits from pseudo-experiments.
//!
//! Each toy draws a dataset from the calculator's model at a fixed true `mu`,
//! refits the calculator to it, and records the upper limit. Toy `i` uses its
//! own `StdRng` seeded with `seed + i`, so the result depends only on
//! `(seed, toys)` and never on thread count or completion order.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::SeedableRng;
use rand::rngs::StdRng;
use rayon::prelude::*;

use crate::calc::{LimitCalculator, check_probability};
use crate::domain::{Band, ExpectedBands};
use crate::error::{AppError, ErrorKind};

/// Median and the ±1σ, ±2σ Gaussian-equivalent quantiles.
pub const DEFAULT_PROBABILITIES: [f64; 5] = [0.025, 0.16, 0.50, 0.84, 0.975];

#[derive(Debug, Clone)]
pub struct ExpectedLimitsGenerator {
    prob: Vec<f64>,
    interrupt: Option<Arc<AtomicBool>>,
}

impl Default for ExpectedLimitsGenerator {
    fn default() -> Self {
        Self {
            prob: DEFAULT_PROBABILITIES.to_vec(),
            interrupt: None,
        }
    }
}

impl ExpectedLimitsGenerator {
    pub fn new(prob: Vec<f64>) -> Result<Self, AppError> {
        if prob.is_empty() {
            return Ok(Self::default());
        }
        for &p in &prob {
            check_probability(p, "Band probability")?;
        }
        Ok(Self { prob, interrupt: None })
    }

    /// Abort the run (with a computation error) once `flag` is set.
    pub fn with_interrupt(mut self, flag: Arc<AtomicBool>) -> Self {
        self.interrupt = Some(flag);
        self
    }

    pub fn prob(&self) -> &[f64] {
        &self.prob
    }

    /// Run `toys` pseudo-experiments at `true_mu`.
    ///
    /// Toys whose calculator fails numerically are skipped and counted in
    /// [`ExpectedLimits::failed`]; any other error aborts the run.
    pub fn run<C: LimitCalculator>(
        &self,
        calculator: &C,
        true_mu: f64,
        toys: usize,
        seed: u64,
    ) -> Result<ExpectedLimits, AppError> {
        if toys == 0 {
            return Err(AppError::range("Number of toys must be > 0."));
        }
        if !true_mu.is_finite() {
            return Err(AppError::range(format!("True mu must be finite, got {true_mu}.")));
        }
        tracing::info!(toys, true_mu, seed, "expected limits: generating toys");

        let outcomes: Vec<Option<f64>> = (0..toys)
            .into_par_iter()
            .map(|i| self.run_toy(calculator, true_mu, seed.wrapping_add(i as u64), i))
            .collect::<Result<Vec<_>, AppError>>()?;

        let failed = outcomes.iter().filter(|o| o.is_none()).count();
        let mut limits: Vec<f64> = outcomes.into_iter().flatten().collect();
        if limits.is_empty() {
            return Err(AppError::computation(format!(
                "All {toys} toys failed; no expected limits available."
            )));
        }
        limits.sort_by(|a, b| a.total_cmp(b));

        if failed > 0 {
            tracing::warn!(failed, toys, "expected limits: some toys were excluded");
        }
        tracing::info!(used = limits.len(), "expected limits: done");

        Ok(ExpectedLimits {
            limits,
            failed,
            prob: self.prob.clone(),
        })
    }

    fn run_toy<C: LimitCalculator>(
        &self,
        calculator: &C,
        true_mu: f64,
        toy_seed: u64,
        index: usize,
    ) -> Result<Option<f64>, AppError> {
        if let Some(flag) = &self.interrupt {
            if flag.load(Ordering::Relaxed) {
                return Err(AppError::computation("Expected-limit run interrupted."));
            }
        }

        let mut rng = StdRng::seed_from_u64(toy_seed);
        let data = calculator.model().generate(true_mu, &mut rng)?;
        let limit = calculator.refit(data).and_then(|c| c.upper_limit());
        match limit {
            Ok(v) if v.is_finite() => Ok(Some(v)),
            Ok(v) => {
                tracing::warn!(toy = index, limit = v, "toy produced a non-finite limit; excluded");
                Ok(None)
            }
            Err(e) if e.kind() == ErrorKind::Computation => {
                tracing::warn!(toy = index, error = %e, "toy failed; excluded");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}

/// Sorted toy limits and the number of excluded toys.
#[derive(Debug, Clone)]
pub struct ExpectedLimits {
    limits: Vec<f64>,
    failed: usize,
    prob: Vec<f64>,
}

impl ExpectedLimits {
    /// Upper limits of the successful toys, ascending.
    pub fn limits(&self) -> &[f64] {
        &self.limits
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    /// Linear interpolation between order statistics at position `p * n`.
    pub fn percentiles(&self, prob: &[f64]) -> Vec<f64> {
        let n = self.limits.len();
        let last = n - 1;
        prob.iter()
            .map(|&p| {
                let q = (p * n as f64).max(0.0);
                let i = (q.floor() as usize).min(last);
                let x = q - i as f64;
                let lo = self.limits[i];
                let hi = self.limits[(i + 1).min(last)];
                if i == last { lo } else { x * hi + (1.0 - x) * lo }
            })
            .collect()
    }

    /// Percentiles at the generator's probabilities, paired with them.
    pub fn bands(&self) -> ExpectedBands {
        let values = self.percentiles(&self.prob);
        ExpectedBands {
            bands: self
                .prob
                .iter()
                .zip(values)
                .map(|(&prob, limit)| Band { prob, limit })
                .collect(),
            toys: self.limits.len() + self.failed,
            failed: self.failed,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calc::{BayesCalculator, WaldCalculator};
    use crate::models::{Draw, MultiPoisson, MultiPoissonGamma};

    fn bayes() -> BayesCalculator<MultiPoisson> {
        let model = MultiPoisson::new(
            vec![3],
            vec![Draw::new(vec![1.0], vec![1.5]), Draw::new(vec![0.9], vec![2.0])],
        )
        .unwrap();
        BayesCalculator::new(Arc::new(model), vec![3], 0.0, 20.0, 0.95).unwrap()
    }

    #[test]
    fn same_seed_gives_identical_results() {
        let calc = bayes();
        let generator = ExpectedLimitsGenerator::default();
        let a = generator.run(&calc, 0.0, 24, 1234).unwrap();
        let b = generator.run(&calc, 0.0, 24, 1234).unwrap();
        assert_eq!(a.limits(), b.limits());
        assert_eq!(a.failed(), 0);

        // A single-threaded pool must reproduce the default pool exactly.
        let pool = rayon::ThreadPoolBuilder::new().num_threads(1).build().unwrap();
        let c = pool.install(|| generator.run(&calc, 0.0, 24, 1234)).unwrap();
        assert_eq!(a.limits(), c.limits());
    }

    #[test]
    fn limits_are_sorted_and_bands_ordered() {
        let calc = bayes();
        let result = ExpectedLimitsGenerator::default().run(&calc, 0.0, 40, 7).unwrap();
        assert!(result.limits().windows(2).all(|w| w[0] <= w[1]));
        let bands = result.bands();
        assert_eq!(bands.bands.len(), 5);
        assert!(bands.bands.windows(2).all(|w| w[0].limit <= w[1].limit));
        assert_eq!(bands.toys, 40);
    }

    #[test]
    fn percentiles_interpolate_order_statistics() {
        let result = ExpectedLimits {
            limits: vec![1.0, 2.0, 3.0, 4.0],
            failed: 0,
            prob: DEFAULT_PROBABILITIES.to_vec(),
        };
        // q = 0.5 * 4 = 2 -> limits[2]; q = 0.3 * 4 = 1.2 -> 2.2; q near 1 clamps to the max.
        let p = result.percentiles(&[0.5, 0.3, 0.99]);
        assert_eq!(p[0], 3.0);
        assert!((p[1] - 2.2).abs() < 1e-12);
        assert_eq!(p[2], 4.0);
    }

    #[test]
    fn failed_toys_are_excluded_and_counted() {
        // No background: toys with zero counts have a flat Wald curvature and fail.
        let model = MultiPoissonGamma::from_estimates(vec![4], &[(1.0, 0.0)], &[(0.0, 0.0)]).unwrap();
        let calc = WaldCalculator::new(Arc::new(model), vec![4], 0.0, 30.0, 0.95).unwrap();
        // exp(-1) ~ 37% of toys at mu = 1 observe zero events.
        let result = ExpectedLimitsGenerator::default().run(&calc, 1.0, 50, 3).unwrap();
        assert!(result.failed() > 0);
        assert_eq!(result.limits().len() + result.failed(), 50);
    }

    #[test]
    fn all_toys_failing_is_computation_error() {
        let model = MultiPoissonGamma::from_estimates(vec![4], &[(1.0, 0.0)], &[(0.0, 0.0)]).unwrap();
        let calc = WaldCalculator::new(Arc::new(model), vec![4], 0.0, 30.0, 0.95).unwrap();
        // True mu = 0 with no background: every toy observes zero.
        let err = ExpectedLimitsGenerator::default().run(&calc, 0.0, 10, 3).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
    }

    #[test]
    fn zero_toys_and_bad_probabilities_are_range_errors() {
        let calc = bayes();
        let err = ExpectedLimitsGenerator::default().run(&calc, 0.0, 0, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(ExpectedLimitsGenerator::new(vec![0.5, 1.0]).is_err());
        assert_eq!(ExpectedLimitsGenerator::new(vec![]).unwrap().prob(), &DEFAULT_PROBABILITIES);
    }

    #[test]
    fn interrupt_flag_aborts_the_run() {
        let flag = Arc::new(AtomicBool::new(true));
        let generator = ExpectedLimitsGenerator::default().with_interrupt(flag);
        let err = generator.run(&bayes(), 0.0, 8, 1).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Computation);
    }
}
