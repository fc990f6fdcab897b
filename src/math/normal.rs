//! Standard normal CDF and quantile.

use statrs::function::erf::{erfc, erfc_inv};

/// `Φ(x)`, computed through `erfc` so the upper tail keeps full precision.
pub fn std_normal_cdf(x: f64) -> f64 {
    0.5 * erfc(-x / std::f64::consts::SQRT_2)
}

/// Upper tail `1 - Φ(x)`.
pub fn std_normal_sf(x: f64) -> f64 {
    0.5 * erfc(x / std::f64::consts::SQRT_2)
}

/// `Φ⁻¹(p)` for `p` in `(0, 1)`. Callers validate the range.
pub fn std_normal_quantile(p: f64) -> f64 {
    -std::f64::consts::SQRT_2 * erfc_inv(2.0 * p)
}
