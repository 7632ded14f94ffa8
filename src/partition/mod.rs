//! Partitioning: turn per-vertex part labels into contiguous ownership.
//!
//! A [`PartitionOracle`] assigns each vertex a label in `[0, k)`. The
//! partitioner groups vertices by label (stable within a label), renumbers them
//! so every part becomes a contiguous id range, rewrites the graph and any
//! co-indexed vector under that renumbering, and returns the resulting
//! [`BoundaryArray`].

use std::ops::Range;

use crate::error::{Result, SpmvError};
use crate::matrix::{Graph, GraphChecks};

pub mod metrics;
pub mod oracle;
pub use oracle::{ContiguousOracle, GreedyGrowOracle};
#[cfg(feature = "metis")]
pub use oracle::MetisOracle;

/// Target load imbalance handed to the oracle.
pub const DEFAULT_IMBALANCE: f64 = 0.01;

/// `p[0] = 0`, `p[k] = N`, non-decreasing; part `i` owns `[p[i], p[i+1])`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoundaryArray(Vec<usize>);

impl BoundaryArray {
    pub fn new(p: Vec<usize>, n: usize) -> Result<Self> {
        if p.len() < 2 {
            return Err(SpmvError::Partition(format!(
                "boundary array needs at least 2 entries, got {}",
                p.len()
            )));
        }
        if p[0] != 0 || p[p.len() - 1] != n {
            return Err(SpmvError::Partition(format!(
                "boundary array must span [0, {n}], got [{}, {}]",
                p[0],
                p[p.len() - 1]
            )));
        }
        if p.windows(2).any(|w| w[1] < w[0]) {
            return Err(SpmvError::Partition("boundary array decreases".into()));
        }
        Ok(BoundaryArray(p))
    }

    /// Single part owning everything.
    pub fn trivial(n: usize) -> Self {
        BoundaryArray(vec![0, n])
    }

    pub fn parts(&self) -> usize {
        self.0.len() - 1
    }

    pub fn total(&self) -> usize {
        self.0[self.0.len() - 1]
    }

    pub fn range(&self, part: usize) -> Range<usize> {
        self.0[part]..self.0[part + 1]
    }

    pub fn len_of(&self, part: usize) -> usize {
        self.0[part + 1] - self.0[part]
    }

    pub fn sizes(&self) -> Vec<usize> {
        self.0.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Part owning vertex `v`. Empty parts are never returned.
    pub fn owner_of(&self, v: usize) -> Option<usize> {
        if v >= self.total() {
            return None;
        }
        // first part whose end lies past v
        Some(self.0[1..].partition_point(|&end| end <= v))
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }
}

/// Bijection between original vertex ids and contiguous-per-part ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Renumbering {
    /// `old_id[new]` is the original id of renumbered vertex `new`.
    pub old_id: Vec<usize>,
    /// `new_id[old]` is the renumbered id of original vertex `old`.
    pub new_id: Vec<usize>,
}

impl Renumbering {
    pub fn identity(n: usize) -> Self {
        Renumbering { old_id: (0..n).collect(), new_id: (0..n).collect() }
    }

    pub fn is_identity(&self) -> bool {
        self.old_id.iter().enumerate().all(|(i, &o)| i == o)
    }

    pub fn len(&self) -> usize {
        self.old_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.old_id.is_empty()
    }

    /// Group vertices by label, keeping original order within a label.
    pub fn from_labels(labels: &[usize], parts: usize) -> Result<(Self, BoundaryArray)> {
        let n = labels.len();
        let mut p = vec![0usize; parts + 1];
        for (v, &l) in labels.iter().enumerate() {
            if l >= parts {
                return Err(SpmvError::Partition(format!(
                    "vertex {v} labelled {l}, expected a label below {parts}"
                )));
            }
            p[l + 1] += 1;
        }
        for i in 0..parts {
            p[i + 1] += p[i];
        }
        let mut next = p.clone();
        let mut old_id = vec![0usize; n];
        let mut new_id = vec![0usize; n];
        for (v, &l) in labels.iter().enumerate() {
            let slot = next[l];
            old_id[slot] = v;
            new_id[v] = slot;
            next[l] += 1;
        }
        Ok((Renumbering { old_id, new_id }, BoundaryArray::new(p, n)?))
    }

    /// Reorder a vector indexed by original id into renumbered order.
    pub fn permute<T: Copy>(&self, v: &[T]) -> Vec<T> {
        self.old_id.iter().map(|&o| v[o]).collect()
    }

    /// Inverse of [`permute`](Self::permute).
    pub fn restore<T: Copy>(&self, v: &[T]) -> Vec<T> {
        self.new_id.iter().map(|&n| v[n]).collect()
    }

    /// Rebuild `graph` under this renumbering: row `i` of the result is row
    /// `old_id[i]` of the input with every target mapped through `new_id`.
    pub fn apply(&self, graph: &Graph) -> Result<Graph> {
        let n = graph.nrows();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(graph.nnz());
        let mut vals = Vec::with_capacity(graph.nnz());
        row_ptr.push(0);
        for &old in &self.old_id {
            let (cols, ws) = graph.row(old);
            col_idx.extend(cols.iter().map(|&c| self.new_id[c]));
            vals.extend_from_slice(ws);
            row_ptr.push(col_idx.len());
        }
        let mut out = Graph::from_csr_unchecked(n, graph.ncols(), row_ptr, col_idx, vals)?;
        out.sort_rows();
        Ok(out)
    }
}

/// Computes one label per vertex.
pub trait PartitionOracle: Send + Sync {
    /// Return `graph.nrows()` labels in `[0, parts)`, aiming for part sizes
    /// within `imbalance` of the mean.
    fn assign(&self, graph: &Graph, parts: usize, imbalance: f64) -> Result<Vec<usize>>;
}

/// Split `graph` into `parts` contiguous blocks chosen by `oracle`.
///
/// On success `graph` and `vector` have been rewritten in renumbered order.
/// With one part nothing is touched and the oracle is never consulted.
pub fn partition_graph(
    graph: &mut Graph,
    parts: usize,
    vector: &mut Vec<f64>,
    oracle: &dyn PartitionOracle,
    imbalance: f64,
) -> Result<(BoundaryArray, Renumbering)> {
    if parts == 0 {
        return Err(SpmvError::Partition("cannot split a graph into 0 parts".into()));
    }
    graph
        .validate(GraphChecks::SQUARE)
        .map_err(|e| SpmvError::Partition(e.to_string()))?;
    let n = graph.nrows();
    if vector.len() != n {
        return Err(SpmvError::Partition(format!(
            "vector has {} entries for a {n}-vertex graph",
            vector.len()
        )));
    }
    if parts == 1 {
        return Ok((BoundaryArray::trivial(n), Renumbering::identity(n)));
    }

    let labels = oracle.assign(graph, parts, imbalance)?;
    if labels.len() != n {
        return Err(SpmvError::Partition(format!(
            "oracle returned {} labels for {n} vertices",
            labels.len()
        )));
    }
    let (renum, p) = Renumbering::from_labels(&labels, parts)?;
    if !renum.is_identity() {
        *graph = renum.apply(graph)?;
        *vector = renum.permute(vector);
    }
    Ok((p, renum))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed(Vec<usize>, AtomicUsize);

    impl PartitionOracle for Fixed {
        fn assign(&self, _: &Graph, _: usize, _: f64) -> Result<Vec<usize>> {
            self.1.fetch_add(1, Ordering::SeqCst);
            Ok(self.0.clone())
        }
    }

    fn fixed(labels: Vec<usize>) -> Fixed {
        Fixed(labels, AtomicUsize::new(0))
    }

    fn path4() -> Graph {
        Graph::from_triplets(
            4,
            4,
            &[(0, 1, 1.0), (1, 0, 1.0), (1, 2, 2.0), (2, 1, 2.0), (2, 3, 3.0), (3, 2, 3.0)],
        )
        .unwrap()
    }

    #[test]
    fn owner_lookup_skips_empty_parts() {
        let p = BoundaryArray::new(vec![0, 2, 2, 5], 5).unwrap();
        assert_eq!(p.owner_of(0), Some(0));
        assert_eq!(p.owner_of(1), Some(0));
        assert_eq!(p.owner_of(2), Some(2));
        assert_eq!(p.owner_of(4), Some(2));
        assert_eq!(p.owner_of(5), None);
        assert_eq!(p.sizes(), vec![2, 0, 3]);
    }

    #[test]
    fn boundary_array_rejects_bad_shapes() {
        assert!(BoundaryArray::new(vec![0], 0).is_err());
        assert!(BoundaryArray::new(vec![1, 4], 4).is_err());
        assert!(BoundaryArray::new(vec![0, 3, 2, 4], 4).is_err());
    }

    #[test]
    fn single_part_is_a_no_op() {
        let mut g = path4();
        let before = g.clone();
        let mut x = vec![1.0, 2.0, 3.0, 4.0];
        let oracle = fixed(vec![9; 4]);
        let (p, r) = partition_graph(&mut g, 1, &mut x, &oracle, DEFAULT_IMBALANCE).unwrap();
        assert_eq!(p.as_slice(), &[0, 4]);
        assert!(r.is_identity());
        assert_eq!(g, before);
        assert_eq!(x, vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(oracle.1.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn labels_become_contiguous_ranges() {
        let mut g = path4();
        let mut x = vec![10.0, 11.0, 12.0, 13.0];
        let oracle = fixed(vec![1, 0, 1, 0]);
        let (p, r) = partition_graph(&mut g, 2, &mut x, &oracle, DEFAULT_IMBALANCE).unwrap();
        assert_eq!(p.as_slice(), &[0, 2, 4]);
        assert_eq!(r.old_id, vec![1, 3, 0, 2]);
        assert_eq!(r.new_id, vec![2, 0, 3, 1]);
        assert_eq!(x, vec![11.0, 13.0, 10.0, 12.0]);
        assert_eq!(r.restore(&x), vec![10.0, 11.0, 12.0, 13.0]);
        g.validate(GraphChecks::all()).unwrap();
        // old vertex 1 (now 0) neighbours old 0 and 2, now 2 and 3
        assert_eq!(g.row(0), (&[2usize, 3][..], &[1.0, 2.0][..]));
    }

    #[test]
    fn zero_parts_fail_before_oracle() {
        let mut g = path4();
        let mut x = vec![0.0; 4];
        let oracle = fixed(vec![0; 4]);
        assert!(matches!(
            partition_graph(&mut g, 0, &mut x, &oracle, DEFAULT_IMBALANCE),
            Err(SpmvError::Partition(_))
        ));
        assert_eq!(oracle.1.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn non_square_graph_fails_before_oracle() {
        let mut g = Graph::from_triplets(2, 3, &[(0, 2, 1.0)]).unwrap();
        let mut x = vec![0.0; 2];
        let oracle = fixed(vec![0, 1]);
        assert!(partition_graph(&mut g, 2, &mut x, &oracle, DEFAULT_IMBALANCE).is_err());
        assert_eq!(oracle.1.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn bad_labels_are_partition_errors() {
        let mut x = vec![0.0; 4];
        let short = fixed(vec![0, 1]);
        assert!(matches!(
            partition_graph(&mut path4(), 2, &mut x, &short, DEFAULT_IMBALANCE),
            Err(SpmvError::Partition(_))
        ));
        let wide = fixed(vec![0, 1, 2, 0]);
        assert!(matches!(
            partition_graph(&mut path4(), 2, &mut x, &wide, DEFAULT_IMBALANCE),
            Err(SpmvError::Partition(_))
        ));
    }
}
