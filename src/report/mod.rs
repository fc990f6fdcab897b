//! Terminal reports for limit runs.

pub mod format;

pub use format::*;
