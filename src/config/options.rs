//! Run options for the distributed SpMV pipeline.
//!
//! This module provides the `RunOptions` struct, which is used to specify
//! how a run is split, how halos are exchanged and how long it runs. Every
//! field is public; start from `RunOptions::default()` and override what you
//! need.

use crate::matrix::GraphChecks;
use crate::partition::DEFAULT_IMBALANCE;

/// Per-iteration halo exchange strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExchangeKind {
    /// Point-to-point, exactly the plan's send/receive lists.
    #[default]
    Targeted,
    /// One all-gather of every worker's separator values.
    BroadcastAll,
}

/// How the vertex ranges are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SplitPolicy {
    /// Ask the partition oracle and renumber.
    #[default]
    Oracle,
    /// Keep the input order and cut rows by edge count.
    NnzBalanced,
}

/// Pipeline parameters.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Number of SpMV iterations (no convergence test)
    pub steps: usize,

    /// Halo exchange strategy
    pub exchange: ExchangeKind,

    /// Oracle partitioning or contiguous nnz-balanced split
    pub split: SplitPolicy,

    /// Load imbalance handed to the oracle
    pub imbalance: f64,

    /// All-gather the full vector after every step instead of only once at the end
    pub all_gather_each_step: bool,

    /// Fan rows out over rayon inside each worker
    pub parallel_rows: bool,

    /// Worker holding the input and receiving the restored result
    pub root: usize,

    /// Structural checks on the input graph
    pub checks: GraphChecks,
}

impl Default for RunOptions {
    fn default() -> Self {
        RunOptions {
            steps: 100,
            exchange: ExchangeKind::default(),
            split: SplitPolicy::default(),
            imbalance: DEFAULT_IMBALANCE,
            all_gather_each_step: true,
            parallel_rows: cfg!(feature = "rayon"),
            root: 0,
            checks: GraphChecks::all(),
        }
    }
}
