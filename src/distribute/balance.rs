//! Contiguous row splitting balanced by edge count.

use crate::error::{Result, SpmvError};
use crate::partition::BoundaryArray;

/// Split the rows described by `row_ptr` into `parts` contiguous ranges of
/// roughly equal edge count.
///
/// `p[i]` is the first row `r >= p[i-1]` with `row_ptr[r] * parts >= i * nnz`;
/// the row straddling a threshold stays with the earlier part. Without any
/// edges the rows are dealt out by count instead.
pub fn balanced_boundaries(row_ptr: &[usize], parts: usize) -> Result<BoundaryArray> {
    if parts == 0 {
        return Err(SpmvError::Partition("cannot split rows into 0 parts".into()));
    }
    if row_ptr.is_empty() {
        return Err(SpmvError::Validation("row offsets are empty".into()));
    }
    let n = row_ptr.len() - 1;
    let nnz = row_ptr[n];

    let mut p = Vec::with_capacity(parts + 1);
    p.push(0);
    if nnz == 0 {
        let mut acc = 0;
        for i in 0..parts {
            acc += n / parts + usize::from(i < n % parts);
            p.push(acc);
        }
        return BoundaryArray::new(p, n);
    }

    let k = parts as u128;
    let total = nnz as u128;
    let mut r = 0usize;
    for i in 1..parts {
        let threshold = i as u128 * total;
        while r < n && (row_ptr[r] as u128) * k < threshold {
            r += 1;
        }
        p.push(r);
    }
    p.push(n);
    BoundaryArray::new(p, n)
}
