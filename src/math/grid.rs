//! Uniform scan grids and grid-based integration.
//!
//! Posterior inference and the coarse MLE bracket both work on a fixed,
//! deterministic grid over the scan range, so results never depend on
//! iteration order or thread scheduling.

use crate::error::AppError;

/// Validate a scan range `[min, max]`.
pub fn check_range(min: f64, max: f64) -> Result<(), AppError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(AppError::range(format!(
            "Invalid scan range: min={min}, max={max} (must be finite and min < max)."
        )));
    }
    Ok(())
}

/// Generate `steps + 1` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    check_range(min, max)?;
    if steps < 1 {
        return Err(AppError::range("Grid steps must be >= 1."));
    }

    let step = (max - min) / steps as f64;
    let mut out = Vec::with_capacity(steps + 1);
    for i in 0..steps {
        out.push(min + step * i as f64);
    }
    // Pin the last node so the grid closes exactly on `max`.
    out.push(max);
    Ok(out)
}

/// Cumulative integral of `y` sampled on a uniform grid with spacing `h`.
///
/// Composite Simpson on consecutive interval pairs gives the integral at even
/// nodes; odd nodes get the Simpson estimate for the first half of their pair
/// (the quadratic through the three nodes, integrated to the midpoint).
/// `y.len()` must be odd (an even number of intervals).
pub fn cumulative_simpson(y: &[f64], h: f64) -> Result<Vec<f64>, AppError> {
    if y.len() < 3 || y.len() % 2 == 0 {
        return Err(AppError::computation(format!(
            "Simpson integration needs an odd number (>= 3) of nodes, got {}.",
            y.len()
        )));
    }

    let mut out = vec![0.0; y.len()];
    let mut i = 0;
    while i + 2 < y.len() {
        let (y0, y1, y2) = (y[i], y[i + 1], y[i + 2]);
        // Quadratic through (0,y0), (h,y1), (2h,y2) integrated over [0, h].
        let half = h * (5.0 * y0 + 8.0 * y1 - y2) / 12.0;
        let full = h * (y0 + 4.0 * y1 + y2) / 3.0;
        // A negative half-step can only come from curvature overshoot near a
        // sharp edge; keep the CDF monotone.
        out[i + 1] = out[i] + half.clamp(0.0, full.max(0.0));
        out[i + 2] = out[i] + full.max(0.0);
        i += 2;
    }
    Ok(out)
}

/// Linear interpolation through `(x0, y0)` and `(x1, y1)` evaluated at `x`.
pub fn linear_interp(a: (f64, f64), b: (f64, f64), x: f64) -> f64 {
    let (x0, y0) = a;
    let (x1, y1) = b;
    if (x1 - x0).abs() < 1e-300 {
        return y0;
    }
    let u = (x - x0) / (x1 - x0);
    y0 + u * (y1 - y0)
}
