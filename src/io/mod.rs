//! Input/output helpers.
//!
//! - ensemble table read/write (`table`)
//! - counted ensemble layout with explicit bin and draw counts (`counted`)
//! - analytic Poisson-gamma input (`poisson_gamma`)
//! - JSON export of results (`json`)

pub mod counted;
pub mod json;
pub mod poisson_gamma;
pub mod table;

pub use counted::*;
pub use json::*;
pub use poisson_gamma::*;
pub use table::{format_table, parse_table, read_table, write_table};
