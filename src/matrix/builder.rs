//! Triplet accumulator that assembles a [`Graph`] in CSR form.

use super::graph::{Graph, GraphChecks};
use crate::error::{Result, SpmvError};

/// Collects `(row, col, val)` triplets in any order.
///
/// Duplicate `(row, col)` pairs are not merged; `build` reports them as a
/// validation error.
#[derive(Debug, Clone)]
pub struct CsrBuilder {
    nrows: usize,
    ncols: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    vals: Vec<f64>,
}

impl CsrBuilder {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self::with_capacity(nrows, ncols, 0)
    }

    pub fn with_capacity(nrows: usize, ncols: usize, nnz: usize) -> Self {
        CsrBuilder {
            nrows,
            ncols,
            rows: Vec::with_capacity(nnz),
            cols: Vec::with_capacity(nnz),
            vals: Vec::with_capacity(nnz),
        }
    }

    pub fn push(&mut self, row: usize, col: usize, val: f64) {
        self.rows.push(row);
        self.cols.push(col);
        self.vals.push(val);
    }

    /// Push `(row, col)` and, off the diagonal, its mirror `(col, row)`.
    pub fn push_symmetric(&mut self, row: usize, col: usize, val: f64) {
        self.push(row, col, val);
        if row != col {
            self.push(col, row, val);
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Counting sort by row, then by column within each row.
    pub fn build(self) -> Result<Graph> {
        let CsrBuilder { nrows, ncols, rows, cols, vals } = self;
        for (i, (&r, &c)) in rows.iter().zip(&cols).enumerate() {
            if r >= nrows || c >= ncols {
                return Err(SpmvError::Validation(format!(
                    "entry {i} at ({r}, {c}) lies outside a {nrows}x{ncols} matrix"
                )));
            }
        }

        // degree histogram shifted by one, then exclusive prefix sum
        let mut row_ptr = vec![0usize; nrows + 1];
        for &r in &rows {
            row_ptr[r + 1] += 1;
        }
        for r in 0..nrows {
            row_ptr[r + 1] += row_ptr[r];
        }

        let nnz = rows.len();
        let mut next = row_ptr.clone();
        let mut col_idx = vec![0usize; nnz];
        let mut out_vals = vec![0.0f64; nnz];
        for ((&r, &c), &v) in rows.iter().zip(&cols).zip(&vals) {
            let slot = next[r];
            col_idx[slot] = c;
            out_vals[slot] = v;
            next[r] += 1;
        }

        let mut graph = Graph::from_csr_unchecked(nrows, ncols, row_ptr, col_idx, out_vals)?;
        graph.sort_rows();
        graph.validate(GraphChecks::OFFSETS | GraphChecks::TARGETS | GraphChecks::SORTED)?;
        Ok(graph)
    }
}
