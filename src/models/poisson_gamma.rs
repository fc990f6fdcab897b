//! Multi-bin Poisson model with analytic gamma nuisances.
//!
//! Per bin `i` the expected count is `mu * e_i + b_i`. Each of `e_i` and `b_i`
//! is either a fixed number or gamma-distributed, `Gamma(shape, rate)`.
//! Integrating a Poisson over a gamma-distributed mean gives a negative
//! binomial, so the marginal per-bin likelihood is the discrete convolution
//!
//! ```text
//! p(n | mu) = Σ_{k=0..n} S(k | mu) B(n - k)
//! ```
//!
//! with `S`/`B` Poisson (fixed nuisance) or `NB(shape, p)` (gamma nuisance;
//! `p = mu/rate` for the signal, `p = 1/rate` for the background).

use rand::RngCore;
use rand_distr::{Distribution, Gamma};

use crate::error::AppError;
use crate::math::{ln_convolve_at, ln_negative_binomial_series, ln_poisson_series};
use crate::models::{CountingModel, check_inputs, sample_poisson, suggest_range_from_totals};
use crate::prior::GammaPrior;

/// Largest observed count accepted per bin.
pub const MAX_COUNT: u64 = 100_000;

/// A per-bin nuisance parameter.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Nuisance {
    Fixed(f64),
    Gamma { shape: f64, rate: f64 },
}

impl Nuisance {
    pub fn gamma(shape: f64, rate: f64) -> Result<Self, AppError> {
        if !(shape.is_finite() && shape > 0.0 && rate.is_finite() && rate > 0.0) {
            return Err(AppError::format(format!(
                "Gamma nuisance needs finite shape > 0 and rate > 0, got shape={shape}, rate={rate}."
            )));
        }
        Ok(Nuisance::Gamma { shape, rate })
    }

    pub fn fixed(value: f64) -> Result<Self, AppError> {
        if !(value.is_finite() && value >= 0.0) {
            return Err(AppError::format(format!("Fixed nuisance must be finite and >= 0, got {value}.")));
        }
        Ok(Nuisance::Fixed(value))
    }

    /// Gamma fitted to `(value, uncertainty)`; zero uncertainty gives `Fixed`.
    pub fn from_estimate(value: f64, uncertainty: f64) -> Result<Self, AppError> {
        if uncertainty == 0.0 {
            return Self::fixed(value);
        }
        let prior = GammaPrior::fit(value, uncertainty)?;
        Self::gamma(prior.shape(), prior.rate())
    }

    pub fn mean(&self) -> f64 {
        match *self {
            Nuisance::Fixed(v) => v,
            Nuisance::Gamma { shape, rate } => shape / rate,
        }
    }

    fn scaled(self, factor: f64) -> Self {
        match self {
            Nuisance::Fixed(v) => Nuisance::Fixed(v * factor),
            // Scaling a gamma variable divides its rate.
            Nuisance::Gamma { shape, rate } => Nuisance::Gamma {
                shape,
                rate: rate / factor,
            },
        }
    }

    /// `ln` pmf of the count contributed by this nuisance times `scale`, for `k = 0..=n`.
    fn ln_count_series(&self, n: u64, scale: f64) -> Vec<f64> {
        match *self {
            Nuisance::Fixed(v) => ln_poisson_series(n, scale * v),
            Nuisance::Gamma { shape, rate } => ln_negative_binomial_series(n, shape, scale / rate),
        }
    }

    fn sample(&self, rng: &mut dyn RngCore) -> Result<f64, AppError> {
        match *self {
            Nuisance::Fixed(v) => Ok(v),
            Nuisance::Gamma { shape, rate } => {
                let dist = Gamma::new(shape, 1.0 / rate)
                    .map_err(|e| AppError::computation(format!("Gamma sampler failed: {e}")))?;
                Ok(dist.sample(rng))
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct MultiPoissonGamma {
    labels: Vec<String>,
    counts: Vec<u64>,
    response: Vec<Nuisance>,
    background: Vec<Nuisance>,
}

impl MultiPoissonGamma {
    pub fn new(
        labels: Vec<String>,
        counts: Vec<u64>,
        response: Vec<Nuisance>,
        background: Vec<Nuisance>,
    ) -> Result<Self, AppError> {
        let nbins = counts.len();
        if nbins == 0 {
            return Err(AppError::format("Model needs at least one bin."));
        }
        if labels.len() != nbins || response.len() != nbins || background.len() != nbins {
            return Err(AppError::format(format!(
                "Inconsistent bin counts: {} labels, {nbins} counts, {} responses, {} backgrounds.",
                labels.len(),
                response.len(),
                background.len()
            )));
        }
        tracing::debug!(nbins, "poisson-gamma model built");
        Ok(Self {
            labels,
            counts,
            response,
            background,
        })
    }

    /// Per-bin gamma nuisances from `(shape, rate)` vectors.
    pub fn from_shape_rate(
        counts: Vec<u64>,
        response_shape: &[f64],
        response_rate: &[f64],
        background_shape: &[f64],
        background_rate: &[f64],
    ) -> Result<Self, AppError> {
        let response = pair_gamma(response_shape, response_rate)?;
        let background = pair_gamma(background_shape, background_rate)?;
        Self::new(default_labels(counts.len()), counts, response, background)
    }

    /// Per-bin nuisances from `(value, uncertainty)` estimates via [`GammaPrior`].
    pub fn from_estimates(
        counts: Vec<u64>,
        response: &[(f64, f64)],
        background: &[(f64, f64)],
    ) -> Result<Self, AppError> {
        let response = response
            .iter()
            .map(|&(v, e)| Nuisance::from_estimate(v, e))
            .collect::<Result<Vec<_>, _>>()?;
        let background = background
            .iter()
            .map(|&(v, e)| Nuisance::from_estimate(v, e))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(default_labels(counts.len()), counts, response, background)
    }

    /// Nuisances inferred from auxiliary "effective counts".
    ///
    /// A background known from a control sample of `y` events scaled by `b`
    /// has posterior `Gamma(y + 1/2, rate = b)`; likewise the response from
    /// `x` effective events scaled by `a`.
    pub fn from_effective_counts(
        counts: Vec<u64>,
        response_counts: &[f64],
        response_scale: &[f64],
        background_counts: &[f64],
        background_scale: &[f64],
    ) -> Result<Self, AppError> {
        let shapes = |xs: &[f64]| xs.iter().map(|x| x + 0.5).collect::<Vec<f64>>();
        Self::from_shape_rate(
            counts,
            &shapes(response_counts),
            response_scale,
            &shapes(background_counts),
            background_scale,
        )
    }

    /// Scale every response by a global luminosity.
    pub fn with_luminosity(mut self, lumi: f64) -> Result<Self, AppError> {
        if !(lumi.is_finite() && lumi > 0.0) {
            return Err(AppError::range(format!("Luminosity must be finite and > 0, got {lumi}.")));
        }
        for r in &mut self.response {
            *r = r.scaled(lumi);
        }
        Ok(self)
    }

    pub fn response(&self) -> &[Nuisance] {
        &self.response
    }

    pub fn background(&self) -> &[Nuisance] {
        &self.background
    }
}

fn default_labels(n: usize) -> Vec<String> {
    (1..=n).map(|i| format!("bin{i}")).collect()
}

fn pair_gamma(shape: &[f64], rate: &[f64]) -> Result<Vec<Nuisance>, AppError> {
    if shape.len() != rate.len() {
        return Err(AppError::format(format!(
            "{} shapes but {} rates.",
            shape.len(),
            rate.len()
        )));
    }
    shape
        .iter()
        .zip(rate)
        .map(|(&s, &r)| Nuisance::gamma(s, r))
        .collect()
}

impl CountingModel for MultiPoissonGamma {
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
        let mu = mu.max(0.0);

        let mut total = 0.0;
        for (i, &n) in data.iter().enumerate() {
            if n > MAX_COUNT {
                return Err(AppError::computation(format!(
                    "Bin {} has count {n}, above the supported maximum {MAX_COUNT}.",
                    i + 1
                )));
            }
            let signal = self.response[i].ln_count_series(n, mu);
            let background = self.background[i].ln_count_series(n, 1.0);
            total += ln_convolve_at(&signal, &background, n as usize);
            if total == f64::NEG_INFINITY {
                break;
            }
        }
        Ok(total)
    }

    fn generate(&self, mu: f64, rng: &mut dyn RngCore) -> Result<Vec<u64>, AppError> {
        if !mu.is_finite() {
            return Err(AppError::range(format!("Parameter of interest must be finite, got {mu}.")));
        }
        let mut out = Vec::with_capacity(self.nbins());
        for i in 0..self.nbins() {
            let e = self.response[i].sample(&mut *rng)?;
            let b = self.background[i].sample(&mut *rng)?;
            out.push(sample_poisson(mu * e + b, &mut *rng)?);
        }
        Ok(out)
    }

    fn suggest_range(&self) -> (f64, f64) {
        let n: f64 = self.counts.iter().map(|&c| c as f64).sum();
        let a: f64 = self.response.iter().map(Nuisance::mean).sum();
        let b: f64 = self.background.iter().map(Nuisance::mean).sum();
        suggest_range_from_totals(n, a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::{ln_factorials, ln_poisson};
    use crate::models::{Draw, MultiPoisson};
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn fixed_nuisances_reduce_to_poisson() {
        let model = MultiPoissonGamma::from_estimates(
            vec![4, 9],
            &[(1.0, 0.0), (2.5, 0.0)],
            &[(0.5, 0.0), (3.0, 0.0)],
        )
        .unwrap();
        let mu = 1.7;
        let lf = ln_factorials(&[4, 9]);
        let expected = ln_poisson(4, mu + 0.5, lf[0]) + ln_poisson(9, 2.5 * mu + 3.0, lf[1]);
        assert_relative_eq!(model.ln_likelihood_observed(mu).unwrap(), expected, epsilon = 1e-12);

        // Same numbers through a single-draw ensemble.
        let ensemble = MultiPoisson::new(vec![4, 9], vec![Draw::new(vec![1.0, 2.5], vec![0.5, 3.0])]).unwrap();
        assert_relative_eq!(
            model.ln_likelihood_observed(mu).unwrap(),
            ensemble.ln_likelihood_observed(mu).unwrap(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn gamma_background_matches_negative_binomial() {
        // Background only (response fixed at 0): p(n) = NB(n | shape, 1/rate).
        let shape = 3.5;
        let rate = 2.0;
        let model = MultiPoissonGamma::new(
            vec!["a".into()],
            vec![3],
            vec![Nuisance::Fixed(0.0)],
            vec![Nuisance::gamma(shape, rate).unwrap()],
        )
        .unwrap();
        let p: f64 = 1.0 / rate;
        // NB(3) = Γ(shape+3)/(Γ(shape) 3!) p^3 / (1+p)^(shape+3)
        let coeff = shape * (shape + 1.0) * (shape + 2.0) / 6.0;
        let expected = coeff * p.powi(3) / (1.0 + p).powf(shape + 3.0);
        assert_relative_eq!(model.likelihood(&[3], 5.0).unwrap(), expected, epsilon = 1e-12);
    }

    #[test]
    fn narrow_gamma_approaches_fixed() {
        let narrow = MultiPoissonGamma::from_estimates(vec![6], &[(2.0, 1e-4)], &[(1.0, 1e-4)]).unwrap();
        let fixed = MultiPoissonGamma::from_estimates(vec![6], &[(2.0, 0.0)], &[(1.0, 0.0)]).unwrap();
        assert_relative_eq!(
            narrow.likelihood(narrow.counts(), 2.0).unwrap(),
            fixed.likelihood(fixed.counts(), 2.0).unwrap(),
            max_relative = 1e-3
        );
    }

    #[test]
    fn effective_counts_use_half_offset() {
        let model = MultiPoissonGamma::from_effective_counts(vec![2], &[10.0], &[5.0], &[4.0], &[2.0]).unwrap();
        assert_eq!(model.response()[0], Nuisance::Gamma { shape: 10.5, rate: 5.0 });
        assert_eq!(model.background()[0], Nuisance::Gamma { shape: 4.5, rate: 2.0 });
    }

    #[test]
    fn luminosity_rescales_response_rate() {
        let model = MultiPoissonGamma::from_shape_rate(vec![1], &[4.0], &[2.0], &[1.0], &[1.0])
            .unwrap()
            .with_luminosity(2.0)
            .unwrap();
        assert_relative_eq!(model.response()[0].mean(), 4.0, epsilon = 1e-12);
    }

    #[test]
    fn rejects_oversized_counts_and_bad_parameters() {
        let model = MultiPoissonGamma::from_estimates(vec![MAX_COUNT + 1], &[(1.0, 0.0)], &[(1.0, 0.0)]).unwrap();
        let err = model.ln_likelihood_observed(1.0).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Computation);
        assert!(Nuisance::gamma(0.0, 1.0).is_err());
        assert!(MultiPoissonGamma::from_shape_rate(vec![1], &[1.0, 2.0], &[1.0], &[1.0], &[1.0]).is_err());
    }

    #[test]
    fn generate_is_seed_reproducible() {
        let model = MultiPoissonGamma::from_estimates(vec![0, 0], &[(1.0, 0.2), (2.0, 0.5)], &[(3.0, 1.0), (0.5, 0.0)])
            .unwrap();
        let mut a = StdRng::seed_from_u64(4);
        let mut b = StdRng::seed_from_u64(4);
        assert_eq!(model.generate(1.0, &mut a).unwrap(), model.generate(1.0, &mut b).unwrap());
    }

    #[test]
    fn gamma_response_matches_direct_quadrature() {
        // L(mu) = ∫ Gamma(e | k, r) Poisson(n | mu e + b) de, integrated with Simpson.
        let (k, r, b, n) = (3.5, 2.0, 1.2, 4u64);
        let model = MultiPoissonGamma::new(
            vec!["sr".into()],
            vec![n],
            vec![Nuisance::gamma(k, r).unwrap()],
            vec![Nuisance::fixed(b).unwrap()],
        )
        .unwrap();
        let ln_norm = k * f64::ln(r) - statrs::function::gamma::ln_gamma(k);
        let ln_fact = ln_factorials(&[n])[0];
        let integrand = |e: f64, mu: f64| {
            if e <= 0.0 {
                return 0.0;
            }
            (ln_norm + (k - 1.0) * e.ln() - r * e + ln_poisson(n, mu * e + b, ln_fact)).exp()
        };

        let (upper, steps) = (40.0, 40_000);
        let h = upper / steps as f64;
        for mu in [0.3, 1.7, 6.0] {
            let mut sum = integrand(0.0, mu) + integrand(upper, mu);
            for i in 1..steps {
                let w = if i % 2 == 1 { 4.0 } else { 2.0 };
                sum += w * integrand(i as f64 * h, mu);
            }
            let quadrature = sum * h / 3.0;
            assert_relative_eq!(model.likelihood(&[n], mu).unwrap(), quadrature, max_relative = 1e-9);
        }
    }
}
