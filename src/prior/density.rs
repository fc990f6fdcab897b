//! Priors on the parameter of interest for the Bayesian calculator.
//!
//! A prior only needs to be known up to a constant factor: the posterior is
//! normalized after multiplying it in.

use std::fmt::Debug;

/// Unnormalized prior density on `mu`.
pub trait Prior: Debug + Send + Sync {
    /// `ln pi(mu)`; `-inf` where the density is zero.
    fn ln_density(&self, mu: f64) -> f64;
}

/// Constant density.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FlatPrior;

impl Prior for FlatPrior {
    fn ln_density(&self, _mu: f64) -> f64 {
        0.0
    }
}

/// `pi(mu) ∝ mu^power` for `mu > 0`.
///
/// `power = -0.5` is the `1/sqrt(mu)` reference prior of a single Poisson
/// mean. The point `mu = 0` gets zero density for any non-zero power, so an
/// integrable singularity never reaches the quadrature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PowerPrior {
    pub power: f64,
}

impl PowerPrior {
    pub fn new(power: f64) -> Self {
        Self { power }
    }

    pub fn inverse_sqrt() -> Self {
        Self::new(-0.5)
    }
}

impl Prior for PowerPrior {
    fn ln_density(&self, mu: f64) -> f64 {
        if self.power == 0.0 {
            return 0.0;
        }
        if mu <= 0.0 {
            return f64::NEG_INFINITY;
        }
        self.power * mu.ln()
    }
}
