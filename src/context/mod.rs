//! Context module for the halo-spmv pipeline.
//!
//! This module provides the context type that wires the pipeline stages
//! together for one worker. The context encapsulates option handling, oracle
//! and trace injection, and the order in which the collective stages run.
//!
//! Modules:
//! - [`run_context`]: Contains the `SpmvContext` struct and its `Problem`/`Outcome` types.
//!
//! # Example
//! ```rust,ignore
//! use halo_spmv::context::{Problem, SpmvContext};
//! use halo_spmv::parallel::ThreadComm;
//! let outcomes = ThreadComm::run(4, |comm| {
//!     let problem = (comm.rank() == 0).then(|| Problem::with_ones(graph.clone()));
//!     SpmvContext::default().run(&comm, problem)
//! });
//! ```

pub mod run_context;
pub use run_context::{Outcome, Problem, SpmvContext};
