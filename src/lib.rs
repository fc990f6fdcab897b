//! `counting-limits` library crate.
//!
//! Upper limits, intervals, and significances for a parameter of interest
//! scaling the signal in one or more Poisson counting bins, with nuisance
//! uncertainties marginalized either over a sampled ensemble or analytically.
//!
//! The binary (`limits`) is a thin wrapper around this library so that the
//! statistics stay testable without spawning processes.

pub mod app;
pub mod calc;
pub mod cli;
pub mod domain;
pub mod error;
pub mod io;
pub mod math;
pub mod models;
pub mod prior;
pub mod report;
pub mod synth;
