//! Priors: gamma priors for nuisance parameters and densities on the
//! parameter of interest.

pub mod density;
pub mod gamma;

pub use density::*;
pub use gamma::*;
