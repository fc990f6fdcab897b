//! One-dimensional bounded optimization and root finding.
//!
//! The likelihoods handled here are smooth and unimodal on the scan range in
//! practice, but can be flat or monotone (e.g. zero observed events). A coarse
//! grid scan finds the bracket first; golden-section search refines it.

use crate::error::AppError;
use crate::math::grid::lin_space;

/// Relative x-tolerance for golden-section refinement.
pub const GOLDEN_TOL: f64 = 1e-10;
const GOLDEN_MAX_ITERS: usize = 300;

/// Relative x-tolerance for bisection.
pub const BISECT_TOL: f64 = 1e-10;
const BISECT_MAX_ITERS: usize = 300;

/// Golden-section search for the maximum of `f` on `[lo, hi]`.
///
/// Returns the abscissa of the best point found. Non-finite values of `f`
/// are treated as `-inf`.
pub fn golden_section_max<F>(f: F, lo: f64, hi: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let eval = |x: f64| {
        let v = f(x);
        if v.is_nan() { f64::NEG_INFINITY } else { v }
    };
    let inv_phi = (5f64.sqrt() - 1.0) / 2.0;

    let (mut a, mut b) = (lo, hi);
    let mut c = b - inv_phi * (b - a);
    let mut d = a + inv_phi * (b - a);
    let mut fc = eval(c);
    let mut fd = eval(d);

    for _ in 0..GOLDEN_MAX_ITERS {
        if (b - a).abs() <= GOLDEN_TOL * (1.0 + a.abs().max(b.abs())) {
            break;
        }
        if fc >= fd {
            b = d;
            d = c;
            fd = fc;
            c = b - inv_phi * (b - a);
            fc = eval(c);
        } else {
            a = c;
            c = d;
            fc = fd;
            d = a + inv_phi * (b - a);
            fd = eval(d);
        }
    }

    if fc >= fd { c } else { d }
}

/// Maximize `f` on `[min, max]`: coarse grid scan, then golden section inside
/// the bracket around the best grid node.
///
/// Maxima at a boundary of the range are returned exactly at that boundary.
pub fn bounded_argmax<F>(f: F, min: f64, max: f64, steps: usize) -> Result<f64, AppError>
where
    F: Fn(f64) -> f64,
{
    let xs = lin_space(min, max, steps)?;
    let values: Vec<f64> = xs
        .iter()
        .map(|&x| {
            let v = f(x);
            if v.is_nan() { f64::NEG_INFINITY } else { v }
        })
        .collect();

    // First index wins on ties so the scan is deterministic.
    let mut best = 0;
    for (i, v) in values.iter().enumerate().skip(1) {
        if *v > values[best] {
            best = i;
        }
    }
    if values[best] == f64::NEG_INFINITY {
        return Err(AppError::computation(
            "Likelihood is zero everywhere on the scan range; cannot locate a maximum.",
        ));
    }

    let lo = xs[best.saturating_sub(1)];
    let hi = xs[(best + 1).min(xs.len() - 1)];
    let refined = golden_section_max(&f, lo, hi);
    let refined_value = f(refined);

    if refined_value.is_finite() && refined_value > values[best] {
        Ok(refined.clamp(min, max))
    } else {
        Ok(xs[best])
    }
}

/// Bisection for a root of `f` on `[lo, hi]`.
///
/// `f(lo)` and `f(hi)` must have opposite signs (or one of them be zero).
pub fn bisect_root<F>(f: F, lo: f64, hi: f64) -> Result<f64, AppError>
where
    F: Fn(f64) -> Result<f64, AppError>,
{
    let (mut a, mut b) = (lo, hi);
    let mut fa = f(a)?;
    let fb = f(b)?;
    if fa == 0.0 {
        return Ok(a);
    }
    if fb == 0.0 {
        return Ok(b);
    }
    if !(fa.is_finite() && fb.is_finite()) || fa.signum() == fb.signum() {
        return Err(AppError::computation(format!(
            "No sign change on [{lo}, {hi}] (f(lo)={fa}, f(hi)={fb}); cannot bracket the root."
        )));
    }

    for _ in 0..BISECT_MAX_ITERS {
        let mid = 0.5 * (a + b);
        if (b - a).abs() <= BISECT_TOL * (1.0 + mid.abs()) {
            return Ok(mid);
        }
        let fm = f(mid)?;
        if fm == 0.0 {
            return Ok(mid);
        }
        if fm.signum() == fa.signum() {
            a = mid;
            fa = fm;
        } else {
            b = mid;
        }
    }
    Ok(0.5 * (a + b))
}

/// Finite-difference second derivative of `f` at `x`, staying inside `[min, max]`.
///
/// Central differences in the interior; one-sided three-point differences when
/// `x` sits within one step of a boundary.
pub fn second_derivative<F>(f: F, x: f64, min: f64, max: f64) -> f64
where
    F: Fn(f64) -> f64,
{
    let h = 1e-4 * (1.0 + x.abs()).min(max - min);
    if x - h >= min && x + h <= max {
        (f(x + h) - 2.0 * f(x) + f(x - h)) / (h * h)
    } else if x - h < min {
        (f(x) - 2.0 * f(x + h) + f(x + 2.0 * h)) / (h * h)
    } else {
        (f(x) - 2.0 * f(x - h) + f(x - 2.0 * h)) / (h * h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn golden_section_finds_parabola_peak() {
        let x = golden_section_max(|x| -(x - 1.7) * (x - 1.7), 0.0, 5.0);
        assert_relative_eq!(x, 1.7, epsilon = 1e-6);
    }

    #[test]
    fn bounded_argmax_refines_interior_peak() {
        // ln Poisson(5 | mu + 2) peaks at mu = 3.
        let f = |mu: f64| 5.0 * (mu + 2.0).ln() - (mu + 2.0);
        let x = bounded_argmax(f, 0.0, 20.0, 200).unwrap();
        assert_relative_eq!(x, 3.0, epsilon = 1e-6);
    }

    #[test]
    fn bounded_argmax_clamps_to_boundary() {
        // Monotone decreasing: maximum sits exactly at the lower edge.
        let x = bounded_argmax(|mu| -mu, 0.0, 10.0, 100).unwrap();
        assert_eq!(x, 0.0);
        let x = bounded_argmax(|mu| mu, 0.0, 10.0, 100).unwrap();
        assert_eq!(x, 10.0);
    }

    #[test]
    fn bounded_argmax_rejects_zero_likelihood() {
        let err = bounded_argmax(|_| f64::NEG_INFINITY, 0.0, 1.0, 10).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Computation);
    }

    #[test]
    fn bisect_root_solves_cubic() {
        let x = bisect_root(|x| Ok(x * x * x - 8.0), 0.0, 5.0).unwrap();
        assert_relative_eq!(x, 2.0, epsilon = 1e-8);
    }

    #[test]
    fn bisect_root_requires_bracket() {
        assert!(bisect_root(|x| Ok(x * x + 1.0), -1.0, 1.0).is_err());
    }

    #[test]
    fn second_derivative_interior_and_edges() {
        let f = |x: f64| 3.0 * x * x + x;
        assert_relative_eq!(second_derivative(f, 1.0, 0.0, 2.0), 6.0, epsilon = 1e-4);
        assert_relative_eq!(second_derivative(f, 0.0, 0.0, 2.0), 6.0, epsilon = 1e-4);
        assert_relative_eq!(second_derivative(f, 2.0, 0.0, 2.0), 6.0, epsilon = 1e-4);
    }
}
