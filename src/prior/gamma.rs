//! Gamma prior fitted to a `(central value, uncertainty)` estimate.
//!
//! The parametrization places the **mode** at the central value `c` and makes
//! the standard deviation equal to the uncertainty `ec` exactly:
//!
//! ```text
//! k     = (c / ec)^2
//! shape = [k + 2 + sqrt((k + 2)^2 - 4)] / 2
//! scale = [sqrt(c^2 + 4 ec^2) - c] / 2
//! ```
//!
//! so `mode = (shape - 1) * scale = c`, `variance = shape * scale^2 = ec^2`, and
//! `mean = c + scale`.

use rand::Rng;
use rand_distr::{Distribution, Gamma};

use crate::error::AppError;

/// Replacement for a non-positive (or non-finite) central value.
pub const CENTRAL_FLOOR: f64 = 1e-3;

/// Replacement for a negative uncertainty, or a zero uncertainty paired with a
/// floored central value.
pub const UNCERTAINTY_FLOOR: f64 = 1e-4;

#[derive(Debug, Clone)]
pub struct GammaPrior {
    mode: f64,
    std_dev: f64,
    shape: f64,
    scale: f64,
    /// `None` for a point mass at `mode`.
    dist: Option<Gamma<f64>>,
}

impl GammaPrior {
    /// Fit a prior to `(c, ec)`.
    ///
    /// `ec == 0` with `c > 0` yields a point mass at `c`. Otherwise `c` is
    /// floored at [`CENTRAL_FLOOR`] and `ec` at [`UNCERTAINTY_FLOOR`].
    pub fn fit(c: f64, ec: f64) -> Result<Self, AppError> {
        if c.is_finite() && c > 0.0 && ec == 0.0 {
            return Ok(Self {
                mode: c,
                std_dev: 0.0,
                shape: f64::INFINITY,
                scale: 0.0,
                dist: None,
            });
        }

        let c = if c.is_finite() && c > 0.0 {
            c
        } else {
            tracing::debug!(c, floor = CENTRAL_FLOOR, "gamma prior: central value floored");
            CENTRAL_FLOOR
        };
        let ec = if ec.is_finite() && ec > 0.0 {
            ec
        } else {
            tracing::debug!(ec, floor = UNCERTAINTY_FLOOR, "gamma prior: uncertainty floored");
            UNCERTAINTY_FLOOR
        };

        let k = (c / ec).powi(2);
        // (k + 2)^2 - 4 expanded; keeps shape > 1 when k is below f64 resolution at 4.
        let shape = (k + 2.0 + (k * (k + 4.0)).sqrt()) / 2.0;
        // Rationalized form of (sqrt(c^2 + 4ec^2) - c) / 2; no cancellation when ec << c.
        let scale = 2.0 * ec * ec / ((c * c + 4.0 * ec * ec).sqrt() + c);

        let dist = Gamma::new(shape, scale).map_err(|e| {
            AppError::computation(format!("Gamma prior (shape={shape}, scale={scale}) is invalid: {e}"))
        })?;

        Ok(Self {
            mode: c,
            std_dev: ec,
            shape,
            scale,
            dist: Some(dist),
        })
    }

    pub fn is_point_mass(&self) -> bool {
        self.dist.is_none()
    }

    /// Shape `k`; infinite for a point mass.
    pub fn shape(&self) -> f64 {
        self.shape
    }

    /// Scale `θ`; zero for a point mass.
    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Rate `1/θ`; infinite for a point mass.
    pub fn rate(&self) -> f64 {
        if self.scale > 0.0 { 1.0 / self.scale } else { f64::INFINITY }
    }

    pub fn mode(&self) -> f64 {
        self.mode
    }

    pub fn mean(&self) -> f64 {
        self.mode + self.scale
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        match &self.dist {
            Some(dist) => dist.sample(rng),
            None => self.mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn parameters_put_mode_and_std_on_inputs() {
        let prior = GammaPrior::fit(10.0, 2.0).unwrap();
        assert_relative_eq!((prior.shape() - 1.0) * prior.scale(), 10.0, epsilon = 1e-9);
        assert_relative_eq!(prior.shape().sqrt() * prior.scale(), 2.0, epsilon = 1e-9);
        assert_relative_eq!(prior.shape() * prior.scale(), prior.mean(), epsilon = 1e-9);
    }

    #[test]
    fn sample_moments_converge() {
        let prior = GammaPrior::fit(5.0, 1.5).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let n = 200_000;
        let xs: Vec<f64> = (0..n).map(|_| prior.sample(&mut rng)).collect();
        let mean = xs.iter().sum::<f64>() / n as f64;
        let var = xs.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (n as f64 - 1.0);

        assert!((mean - prior.mean()).abs() < 0.02, "mean {mean} vs {}", prior.mean());
        assert!((var.sqrt() - 1.5).abs() < 0.02, "std {}", var.sqrt());
        assert!(xs.iter().all(|x| *x > 0.0));
    }

    #[test]
    fn seeded_sampling_is_reproducible() {
        let prior = GammaPrior::fit(3.0, 0.7).unwrap();
        let a: Vec<f64> = {
            let mut rng = StdRng::seed_from_u64(99);
            (0..5).map(|_| prior.sample(&mut rng)).collect()
        };
        let b: Vec<f64> = {
            let mut rng = StdRng::seed_from_u64(99);
            (0..5).map(|_| prior.sample(&mut rng)).collect()
        };
        assert_eq!(a, b);
    }

    #[test]
    fn zero_uncertainty_is_point_mass() {
        let prior = GammaPrior::fit(4.2, 0.0).unwrap();
        assert!(prior.is_point_mass());
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(prior.sample(&mut rng), 4.2);
        assert_eq!(prior.mean(), 4.2);
    }

    #[test]
    fn degenerate_inputs_are_floored() {
        let prior = GammaPrior::fit(0.0, 0.0).unwrap();
        assert!(!prior.is_point_mass());
        assert_eq!(prior.mode(), CENTRAL_FLOOR);
        assert_eq!(prior.std_dev(), UNCERTAINTY_FLOOR);

        let prior = GammaPrior::fit(2.0, -1.0).unwrap();
        assert_eq!(prior.std_dev(), UNCERTAINTY_FLOOR);
        assert!(prior.shape().is_finite() && prior.scale() > 0.0);
    }

    #[test]
    fn tiny_ratio_keeps_mode_on_the_central_value() {
        // (c / ec)^2 = 1e-16 vanishes next to 4 in f64.
        let prior = GammaPrior::fit(1e-3, 1e5).unwrap();
        assert!(prior.shape() > 1.0);
        assert_relative_eq!(prior.mode(), 1e-3, max_relative = 1e-6);
        assert_relative_eq!((prior.shape() - 1.0) * prior.scale(), 1e-3, max_relative = 1e-6);
    }
}
