//! Correlated Gaussian sampling through a Cholesky factor.

use nalgebra::{DMatrix, DVector};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::error::AppError;

/// Attempts per positive-quadrant draw before giving up.
pub const MAX_POSITIVE_TRIES: usize = 10_000;

/// Multivariate normal `N(mean, cov)` with the covariance stored as its lower
/// Cholesky factor.
#[derive(Debug, Clone)]
pub struct MultiNormal {
    mean: DVector<f64>,
    chol: DMatrix<f64>,
}

impl MultiNormal {
    pub fn new(mean: &[f64], cov: DMatrix<f64>) -> Result<Self, AppError> {
        let n = mean.len();
        if n == 0 {
            return Err(AppError::format("Multivariate normal needs at least one dimension."));
        }
        if cov.nrows() != n || cov.ncols() != n {
            return Err(AppError::format(format!(
                "Covariance is {}x{} but the mean has {n} entries.",
                cov.nrows(),
                cov.ncols()
            )));
        }
        let chol = cov.cholesky().ok_or_else(|| {
            AppError::computation("Covariance matrix is not positive definite (Cholesky failed).")
        })?;
        Ok(Self {
            mean: DVector::from_column_slice(mean),
            chol: chol.l(),
        })
    }

    /// Independent components: diagonal covariance from standard deviations.
    pub fn diagonal(mean: &[f64], std_devs: &[f64]) -> Result<Self, AppError> {
        if std_devs.len() != mean.len() {
            return Err(AppError::format("Mean and standard deviations differ in length."));
        }
        let var: Vec<f64> = std_devs.iter().map(|s| s * s).collect();
        Self::new(mean, DMatrix::from_diagonal(&DVector::from_vec(var)))
    }

    /// Covariance assembled from standard deviations and a correlation matrix.
    pub fn from_correlation(mean: &[f64], std_devs: &[f64], cor: &DMatrix<f64>) -> Result<Self, AppError> {
        let n = mean.len();
        if std_devs.len() != n || cor.nrows() != n || cor.ncols() != n {
            return Err(AppError::format(format!(
                "Correlation is {}x{} with {} standard deviations; expected {n}.",
                cor.nrows(),
                cor.ncols(),
                std_devs.len()
            )));
        }
        let cov = DMatrix::from_fn(n, n, |i, j| cor[(i, j)] * std_devs[i] * std_devs[j]);
        Self::new(mean, cov)
    }

    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<f64> {
        let z = DVector::from_iterator(self.dim(), (0..self.dim()).map(|_| rng.sample::<f64, _>(StandardNormal)));
        let x = &self.mean + &self.chol * z;
        x.iter().copied().collect()
    }

    /// Rejection-sample a draw with every component `>= 0`.
    pub fn sample_positive<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Vec<f64>, AppError> {
        for _ in 0..MAX_POSITIVE_TRIES {
            let x = self.sample(rng);
            if x.iter().all(|v| *v >= 0.0) {
                return Ok(x);
            }
        }
        Err(AppError::computation(format!(
            "No non-negative draw after {MAX_POSITIVE_TRIES} attempts; mean is too close to zero for the covariance."
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn rejects_non_positive_definite() {
        let cov = DMatrix::from_row_slice(2, 2, &[1.0, 2.0, 2.0, 1.0]);
        assert!(MultiNormal::new(&[0.0, 0.0], cov).is_err());
    }

    #[test]
    fn sample_moments_match_covariance() {
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 1.2, 1.2, 1.0]);
        let mvn = MultiNormal::new(&[10.0, 5.0], cov).unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let n = 100_000;
        let draws: Vec<Vec<f64>> = (0..n).map(|_| mvn.sample(&mut rng)).collect();

        let m0 = draws.iter().map(|d| d[0]).sum::<f64>() / n as f64;
        let m1 = draws.iter().map(|d| d[1]).sum::<f64>() / n as f64;
        let c01 = draws.iter().map(|d| (d[0] - m0) * (d[1] - m1)).sum::<f64>() / n as f64;
        let v0 = draws.iter().map(|d| (d[0] - m0).powi(2)).sum::<f64>() / n as f64;

        assert!((m0 - 10.0).abs() < 0.05);
        assert!((m1 - 5.0).abs() < 0.05);
        assert!((v0 - 4.0).abs() < 0.1);
        assert!((c01 - 1.2).abs() < 0.05);
    }

    #[test]
    fn correlation_form_matches_covariance_form() {
        let cor = DMatrix::from_row_slice(2, 2, &[1.0, 0.6, 0.6, 1.0]);
        let a = MultiNormal::from_correlation(&[1.0, 2.0], &[2.0, 1.0], &cor).unwrap();
        let cov = DMatrix::from_row_slice(2, 2, &[4.0, 1.2, 1.2, 1.0]);
        let b = MultiNormal::new(&[1.0, 2.0], cov).unwrap();
        let mut ra = StdRng::seed_from_u64(9);
        let mut rb = StdRng::seed_from_u64(9);
        let (xa, xb) = (a.sample(&mut ra), b.sample(&mut rb));
        for (u, v) in xa.iter().zip(&xb) {
            assert!((u - v).abs() < 1e-12);
        }
    }

    #[test]
    fn positive_draws_stay_in_quadrant() {
        let mvn = MultiNormal::diagonal(&[0.5, 0.5], &[1.0, 1.0]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let x = mvn.sample_positive(&mut rng).unwrap();
            assert!(x.iter().all(|v| *v >= 0.0));
        }
    }
}
