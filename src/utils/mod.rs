//! Utility helpers: run statistics and their cross-worker reduction.

pub mod stats;
pub use stats::{RunReport, RunStats};
