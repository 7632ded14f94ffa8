//! halo-spmv: distributed SpMV over partitioned CSR graphs
//!
//! This crate runs fixed-step iterative sparse matrix-vector products on a
//! graph split across cooperating workers. Each worker owns a contiguous
//! vertex range and refreshes the boundary ("halo") values it reads from its
//! neighbours before every step. Workers talk through the [`parallel::Comm`]
//! trait, backed by MPI (feature `mpi`) or by an in-process thread team.

pub mod parallel;

pub mod config;
pub mod context;
pub mod distribute;
pub mod driver;
pub mod error;
pub mod halo;
pub mod io;
pub mod matrix;
pub mod partition;
pub mod trace;
pub mod utils;

// Re-exports for convenience
pub use config::*;
pub use context::*;
pub use error::*;
pub use matrix::*;
pub use utils::*;

pub use distribute::{Distribution, LocalPart, distribute};
pub use driver::IterationDriver;
pub use halo::{CommPlan, ExchangeVolume, HaloExchange, Strategy};
pub use parallel::{Comm, ThreadComm};
pub use partition::{BoundaryArray, PartitionOracle, Renumbering, partition_graph};
pub use trace::{LogTrace, NoTrace, TraceEvent, TraceSink};
