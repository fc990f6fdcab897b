//! Poisson and negative-binomial log-probabilities plus log-space reductions.
//!
//! Everything here works in natural-log space. Products of many per-bin
//! probabilities underflow quickly in linear space; sums of them are reduced
//! with [`log_sum_exp`].

use statrs::function::gamma::ln_gamma;

/// `ln(n!)` for each count.
pub fn ln_factorials(counts: &[u64]) -> Vec<f64> {
    counts.iter().map(|&n| ln_gamma(n as f64 + 1.0)).collect()
}

/// `ln Poisson(n | mean)` given a precomputed `ln(n!)`.
///
/// Negative means are clamped to zero: a zero mean yields probability one for
/// `n = 0` and zero otherwise.
#[inline]
pub fn ln_poisson(n: u64, mean: f64, ln_fact: f64) -> f64 {
    let mean = mean.max(0.0);
    if mean == 0.0 {
        return if n == 0 { 0.0 } else { f64::NEG_INFINITY };
    }
    n as f64 * mean.ln() - mean - ln_fact
}

/// `ln Poisson(k | mean)` for `k = 0..=n`, built recursively.
pub fn ln_poisson_series(n: u64, mean: f64) -> Vec<f64> {
    let mean = mean.max(0.0);
    let len = n as usize + 1;
    let mut out = vec![f64::NEG_INFINITY; len];
    if mean == 0.0 {
        out[0] = 0.0;
        return out;
    }
    let ln_mean = mean.ln();
    out[0] = -mean;
    for k in 1..len {
        out[k] = out[k - 1] + ln_mean - (k as f64).ln();
    }
    out
}

/// `ln NB(k | shape, p)` for `k = 0..=n`.
///
/// This is the gamma-marginalized Poisson: if `x ~ Gamma(shape, rate)` and
/// `k ~ Poisson(c * x)`, then `k ~ NB(shape, p = c / rate)` with
///
/// ```text
/// NB(0)   = (1 + p)^-shape
/// NB(k)   = NB(k-1) * p/(1+p) * (shape - 1 + k)/k
/// ```
pub fn ln_negative_binomial_series(n: u64, shape: f64, p: f64) -> Vec<f64> {
    let len = n as usize + 1;
    let mut out = vec![f64::NEG_INFINITY; len];
    let p = p.max(0.0);
    out[0] = -shape * p.ln_1p();
    if p == 0.0 {
        return out;
    }
    let ln_ratio = p.ln() - p.ln_1p();
    for k in 1..len {
        let dk = k as f64;
        out[k] = out[k - 1] + ln_ratio + (shape - 1.0 + dk).ln() - dk.ln();
    }
    out
}

/// Stable `ln(Σ exp(x_i))`. Returns `-inf` for an empty slice or all `-inf` terms.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        // All -inf (or a +inf term, which dominates).
        return max;
    }
    let sum: f64 = values.iter().map(|v| (v - max).exp()).sum();
    max + sum.ln()
}

/// `ln Σ_k exp(a[k] + b[n-k])`: the discrete convolution of two pmfs at `n`.
pub fn ln_convolve_at(a: &[f64], b: &[f64], n: usize) -> f64 {
    let terms: Vec<f64> = (0..=n).map(|k| a[k] + b[n - k]).collect();
    log_sum_exp(&terms)
}
