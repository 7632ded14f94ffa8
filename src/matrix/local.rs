// Per-worker row block of the global graph and the SpMV kernel over it

use std::ops::Range;

use super::{Graph, SparseMatrix};
use crate::error::{Result, SpmvError};

#[cfg(feature = "rayon")]
use rayon::prelude::*;

/// Rows `[first_row, first_row + nrows)` of the global graph.
///
/// Offsets are local (`row_ptr[0] == 0`), column ids stay global so the kernel
/// reads straight from the global-length vector. `base_offset` is where this
/// block's edges started in the global edge arrays.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalCsr {
    first_row: usize,
    base_offset: usize,
    global_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    vals: Vec<f64>,
}

impl LocalCsr {
    /// Assemble from already rebased arrays, checking the offsets close the
    /// edge range and every target is a global vertex.
    pub fn from_parts(
        first_row: usize,
        base_offset: usize,
        global_cols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        vals: Vec<f64>,
    ) -> Result<Self> {
        if row_ptr.is_empty() || row_ptr[0] != 0 {
            return Err(SpmvError::Validation("local row offsets must start at 0".into()));
        }
        let last = row_ptr[row_ptr.len() - 1];
        if last != col_idx.len() || col_idx.len() != vals.len() {
            return Err(SpmvError::Validation(format!(
                "local offsets end at {last} but block holds {} targets and {} values",
                col_idx.len(),
                vals.len()
            )));
        }
        if row_ptr.windows(2).any(|w| w[1] < w[0]) {
            return Err(SpmvError::Validation("local row offsets decrease".into()));
        }
        if let Some(&c) = col_idx.iter().find(|&&c| c >= global_cols) {
            return Err(SpmvError::Validation(format!(
                "local block targets vertex {c} of a {global_cols}-vertex graph"
            )));
        }
        Ok(LocalCsr { first_row, base_offset, global_cols, row_ptr, col_idx, vals })
    }

    /// Copy a contiguous row range out of a global graph.
    pub fn slice(graph: &Graph, rows: Range<usize>) -> Result<Self> {
        if rows.start > rows.end || rows.end > graph.nrows() {
            return Err(SpmvError::Validation(format!(
                "row range {rows:?} outside a {}-row graph",
                graph.nrows()
            )));
        }
        let rp = graph.row_ptr();
        let base = rp[rows.start];
        let end = rp[rows.end];
        let row_ptr = rp[rows.start..=rows.end].iter().map(|&o| o - base).collect();
        Self::from_parts(
            rows.start,
            base,
            graph.ncols(),
            row_ptr,
            graph.col_idx()[base..end].to_vec(),
            graph.vals()[base..end].to_vec(),
        )
    }

    pub fn first_row(&self) -> usize {
        self.first_row
    }

    pub fn base_offset(&self) -> usize {
        self.base_offset
    }

    /// Global rows owned by this block.
    pub fn range(&self) -> Range<usize> {
        self.first_row..self.first_row + self.row_ptr.len() - 1
    }

    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    pub fn row_ptr(&self) -> &[usize] {
        &self.row_ptr
    }

    pub fn col_idx(&self) -> &[usize] {
        &self.col_idx
    }

    pub fn vals(&self) -> &[f64] {
        &self.vals
    }

    fn row_dot(&self, r: usize, x: &[f64]) -> f64 {
        let span = self.row_ptr[r]..self.row_ptr[r + 1];
        self.col_idx[span.clone()]
            .iter()
            .zip(&self.vals[span])
            .map(|(&c, &v)| v * x[c])
            .sum()
    }

    /// Parallel SpMV using Rayon; rows are split into chunks sized to the
    /// available cores, each output slot is written by exactly one task.
    #[cfg(feature = "rayon")]
    pub fn spmv_parallel(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.global_cols);
        assert_eq!(y.len(), self.row_ptr.len() - 1);
        let min_len = (y.len() / (4 * num_cpus::get().max(1))).max(64);
        y.par_iter_mut()
            .enumerate()
            .with_min_len(min_len)
            .for_each(|(r, yr)| *yr = self.row_dot(r, x));
    }
}

impl SparseMatrix<f64> for LocalCsr {
    fn nrows(&self) -> usize {
        self.row_ptr.len() - 1
    }
    /// The kernel reads the full global vector.
    fn ncols(&self) -> usize {
        self.global_cols
    }
    fn spmv(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.ncols());
        assert_eq!(y.len(), self.nrows());
        for (r, yr) in y.iter_mut().enumerate() {
            *yr = self.row_dot(r, x);
        }
    }
}
