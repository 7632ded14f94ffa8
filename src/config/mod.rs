//! Configuration for a distributed SpMV run.

pub mod options;
pub use options::{ExchangeKind, RunOptions, SplitPolicy};
