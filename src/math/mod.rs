//! Numerical building blocks: scan grids and integration, Poisson/negative
//! binomial log-pmfs, bounded 1-D optimization, normal quantiles, and
//! correlated Gaussian sampling.

pub mod grid;
pub mod mnormal;
pub mod normal;
pub mod optimize;
pub mod poisson;

pub use grid::*;
pub use mnormal::*;
pub use normal::*;
pub use optimize::*;
pub use poisson::*;
