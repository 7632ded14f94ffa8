//! Global CSR graph owned by the coordinating worker.
//!
//! `row_ptr` has `nrows + 1` non-decreasing entries starting at 0 and ending
//! at `nnz`; every row's slice of `col_idx` is strictly ascending. Public
//! constructors validate, so the rest of the crate indexes without re-checking.

use bitflags::bitflags;
use faer::sparse::{SparseRowMat, SymbolicSparseRowMat};

use super::SparseMatrix;
use crate::error::{Result, SpmvError};

bitflags! {
    /// Structural checks run by [`Graph::validate`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GraphChecks: u8 {
        /// `row_ptr` starts at 0, never decreases and ends at `nnz`.
        const OFFSETS = 1 << 0;
        /// Every edge target lies in `[0, ncols)`.
        const TARGETS = 1 << 1;
        /// Targets of each row are strictly ascending (sorted, no duplicates).
        const SORTED = 1 << 2;
        /// `nrows == ncols`; required for partitioning.
        const SQUARE = 1 << 3;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    nrows: usize,
    ncols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
    vals: Vec<f64>,
}

impl Graph {
    /// Build a graph from raw CSR arrays, rejecting anything that fails the
    /// offset, target or sortedness checks.
    pub fn from_csr(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        vals: Vec<f64>,
    ) -> Result<Self> {
        let g = Self::from_csr_unchecked(nrows, ncols, row_ptr, col_idx, vals)?;
        g.validate(GraphChecks::OFFSETS | GraphChecks::TARGETS | GraphChecks::SORTED)?;
        Ok(g)
    }

    /// Only array lengths are checked; callers follow up with `validate`.
    pub(crate) fn from_csr_unchecked(
        nrows: usize,
        ncols: usize,
        row_ptr: Vec<usize>,
        col_idx: Vec<usize>,
        vals: Vec<f64>,
    ) -> Result<Self> {
        if row_ptr.len() != nrows + 1 {
            return Err(SpmvError::Validation(format!(
                "row_ptr has {} entries, expected {}",
                row_ptr.len(),
                nrows + 1
            )));
        }
        if col_idx.len() != vals.len() {
            return Err(SpmvError::Validation(format!(
                "{} column indices but {} values",
                col_idx.len(),
                vals.len()
            )));
        }
        Ok(Graph { nrows, ncols, row_ptr, col_idx, vals })
    }

    /// Convenience wrapper over [`CsrBuilder`](super::CsrBuilder).
    pub fn from_triplets(nrows: usize, ncols: usize, triplets: &[(usize, usize, f64)]) -> Result<Self> {
        let mut b = super::CsrBuilder::with_capacity(nrows, ncols, triplets.len());
        for &(r, c, v) in triplets {
            b.push(r, c, v);
        }
        b.build()
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
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

    pub fn degree(&self, row: usize) -> usize {
        self.row_ptr[row + 1] - self.row_ptr[row]
    }

    /// Targets and weights of one row.
    pub fn row(&self, row: usize) -> (&[usize], &[f64]) {
        let span = self.row_ptr[row]..self.row_ptr[row + 1];
        (&self.col_idx[span.clone()], &self.vals[span])
    }

    pub fn into_parts(self) -> (Vec<usize>, Vec<usize>, Vec<f64>) {
        (self.row_ptr, self.col_idx, self.vals)
    }

    pub fn validate(&self, checks: GraphChecks) -> Result<()> {
        if checks.contains(GraphChecks::SQUARE) && self.nrows != self.ncols {
            return Err(SpmvError::Validation(format!(
                "graph is {}x{}, expected a square adjacency matrix",
                self.nrows, self.ncols
            )));
        }
        if checks.contains(GraphChecks::OFFSETS) {
            if self.row_ptr[0] != 0 || self.row_ptr[self.nrows] != self.nnz() {
                return Err(SpmvError::Validation(format!(
                    "row offsets span [{}, {}] but there are {} edges",
                    self.row_ptr[0],
                    self.row_ptr[self.nrows],
                    self.nnz()
                )));
            }
            if let Some(r) = self.row_ptr.windows(2).position(|w| w[1] < w[0]) {
                return Err(SpmvError::Validation(format!("row {r} has a negative degree")));
            }
        }
        if checks.contains(GraphChecks::TARGETS) {
            if let Some(e) = self.col_idx.iter().position(|&c| c >= self.ncols) {
                return Err(SpmvError::Validation(format!(
                    "edge {e} targets vertex {} outside [0, {})",
                    self.col_idx[e], self.ncols
                )));
            }
        }
        if checks.contains(GraphChecks::SORTED) {
            for r in 0..self.nrows {
                let (cols, _) = self.row(r);
                if let Some(i) = cols.windows(2).position(|w| w[1] <= w[0]) {
                    return Err(SpmvError::Validation(format!(
                        "row {r} adjacency is unsorted or duplicated at target {}",
                        cols[i + 1]
                    )));
                }
            }
        }
        Ok(())
    }

    /// Sort every row's edges by target, carrying the weights along.
    pub fn sort_rows(&mut self) {
        let mut scratch: Vec<(usize, f64)> = Vec::new();
        for r in 0..self.nrows {
            let span = self.row_ptr[r]..self.row_ptr[r + 1];
            scratch.clear();
            scratch.extend(
                self.col_idx[span.clone()]
                    .iter()
                    .copied()
                    .zip(self.vals[span.clone()].iter().copied()),
            );
            scratch.sort_by_key(|&(c, _)| c);
            for (slot, (c, v)) in span.zip(scratch.iter().copied()) {
                self.col_idx[slot] = c;
                self.vals[slot] = v;
            }
        }
    }

    /// Z-score normalisation of the edge weights. An all-zero weight vector
    /// carries no scale, so it is replaced by the constant 2.0.
    pub fn normalize_values(&mut self) {
        if self.vals.is_empty() {
            return;
        }
        if self.vals.iter().all(|&v| v == 0.0) {
            self.vals.iter_mut().for_each(|v| *v = 2.0);
            return;
        }
        let m = self.vals.len() as f64;
        let mean = self.vals.iter().sum::<f64>() / m;
        let var = self.vals.iter().map(|&v| (v - mean) * (v - mean)).sum::<f64>() / m;
        let std = var.sqrt() + f64::EPSILON;
        self.vals.iter_mut().for_each(|v| *v = (*v - mean) / std);
    }

    /// Copy into a faer sparse row matrix.
    pub fn to_faer(&self) -> SparseRowMat<usize, f64> {
        let symbolic = SymbolicSparseRowMat::new_checked(
            self.nrows,
            self.ncols,
            self.row_ptr.clone(),
            None,
            self.col_idx.clone(),
        );
        SparseRowMat::new(symbolic, self.vals.clone())
    }
}

impl SparseMatrix<f64> for Graph {
    fn nrows(&self) -> usize {
        self.nrows
    }
    fn ncols(&self) -> usize {
        self.ncols
    }
    fn spmv(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.ncols);
        assert_eq!(y.len(), self.nrows);
        for (r, yr) in y.iter_mut().enumerate() {
            let (cols, vals) = self.row(r);
            *yr = cols.iter().zip(vals).map(|(&c, &v)| v * x[c]).sum();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path3() -> Graph {
        // 0 - 1 - 2, weights 1, 2
        Graph::from_csr(3, 3, vec![0, 1, 3, 4], vec![1, 0, 2, 1], vec![1.0, 1.0, 2.0, 2.0]).unwrap()
    }

    #[test]
    fn weighted_degree_from_ones() {
        let g = path3();
        let mut y = vec![0.0; 3];
        g.spmv(&[1.0; 3], &mut y);
        assert_eq!(y, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn rejects_duplicate_targets() {
        let err = Graph::from_csr(2, 2, vec![0, 2, 2], vec![1, 1], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, SpmvError::Validation(m) if m.contains("unsorted or duplicated")));
    }

    #[test]
    fn rejects_out_of_range_target() {
        let err = Graph::from_csr(2, 2, vec![0, 1, 1], vec![5], vec![1.0]).unwrap_err();
        assert!(matches!(err, SpmvError::Validation(m) if m.contains("outside")));
    }

    #[test]
    fn rejects_decreasing_offsets() {
        let err = Graph::from_csr(2, 2, vec![0, 2, 1], vec![0, 1], vec![1.0, 1.0]).unwrap_err();
        assert!(matches!(err, SpmvError::Validation(_)));
    }

    #[test]
    fn sort_rows_carries_weights() {
        let mut g =
            Graph::from_csr_unchecked(1, 3, vec![0, 3], vec![2, 0, 1], vec![20.0, 0.0, 10.0]).unwrap();
        g.sort_rows();
        assert_eq!(g.col_idx(), &[0, 1, 2]);
        assert_eq!(g.vals(), &[0.0, 10.0, 20.0]);
        g.validate(GraphChecks::OFFSETS | GraphChecks::TARGETS | GraphChecks::SORTED).unwrap();
    }

    #[test]
    fn normalize_centres_weights() {
        let mut g = path3();
        g.normalize_values();
        let mean: f64 = g.vals().iter().sum::<f64>() / g.nnz() as f64;
        assert!(mean.abs() < 1e-12);

        let mut z = Graph::from_csr(2, 2, vec![0, 1, 2], vec![1, 0], vec![0.0, 0.0]).unwrap();
        z.normalize_values();
        assert_eq!(z.vals(), &[2.0, 2.0]);
    }

    #[test]
    fn non_square_fails_square_check() {
        let g = Graph::from_csr(1, 2, vec![0, 1], vec![1], vec![1.0]).unwrap();
        assert!(g.validate(GraphChecks::SQUARE).is_err());
    }
}
