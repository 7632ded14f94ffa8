//! Matrix module: the global CSR graph, its builder, and per-worker slices.

pub mod builder;
pub use builder::CsrBuilder;
pub mod graph;
pub use graph::{Graph, GraphChecks};
pub mod local;
pub use local::LocalCsr;

/// A read‐only sparse matrix supporting y = A * x.
pub trait SparseMatrix<T> {
    /// Number of rows.
    fn nrows(&self) -> usize;
    /// Number of columns.
    fn ncols(&self) -> usize;
    /// Compute y = A * x.  `x.len() == ncols()`, `y.len() == nrows()`.
    /// `y` is overwritten, never accumulated into.
    fn spmv(&self, x: &[T], y: &mut [T]);
}
