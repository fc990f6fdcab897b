//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - configuration enums (`CalculatorKind`, `ModelFormat`)
//! - run configuration (`LimitConfig`, `ExpectedConfig`, `SynthConfig`)
//! - serializable results (`Interval`, `BayesSummary`, `WaldSummary`, `ExpectedBands`, ...)

pub mod types;

pub use types::*;
