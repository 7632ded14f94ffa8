// Built-in partition oracles

use std::collections::VecDeque;

use super::PartitionOracle;
use crate::distribute::balance::balanced_boundaries;
use crate::error::{Result, SpmvError};
use crate::matrix::Graph;

/// Breadth-first region growing.
///
/// Parts are grown one at a time from the lowest unassigned vertex until they
/// hold exactly `N / k` vertices (the first `N % k` parts take one more). When
/// a region's frontier runs dry the next unassigned vertex seeds it again, so
/// disconnected graphs still fill every part. Sizes are exact, the tolerance
/// is not needed.
#[derive(Debug, Default, Clone, Copy)]
pub struct GreedyGrowOracle;

impl PartitionOracle for GreedyGrowOracle {
    fn assign(&self, graph: &Graph, parts: usize, _imbalance: f64) -> Result<Vec<usize>> {
        if parts == 0 {
            return Err(SpmvError::Partition("cannot grow 0 regions".into()));
        }
        let n = graph.nrows();
        let mut labels = vec![usize::MAX; n];
        let mut cursor = 0usize;
        let mut queue = VecDeque::new();
        for part in 0..parts {
            let target = n / parts + usize::from(part < n % parts);
            let mut size = 0;
            queue.clear();
            while size < target {
                let v = match queue.pop_front() {
                    Some(v) => v,
                    None => {
                        while labels[cursor] != usize::MAX {
                            cursor += 1;
                        }
                        cursor
                    }
                };
                if labels[v] != usize::MAX {
                    continue;
                }
                labels[v] = part;
                size += 1;
                let (targets, _) = graph.row(v);
                queue.extend(targets.iter().copied().filter(|&t| labels[t] == usize::MAX));
            }
        }
        Ok(labels)
    }
}

/// Labels taken from the nnz-balanced contiguous split, so the renumbering it
/// induces is the identity.
#[derive(Debug, Default, Clone, Copy)]
pub struct ContiguousOracle;

impl PartitionOracle for ContiguousOracle {
    fn assign(&self, graph: &Graph, parts: usize, _imbalance: f64) -> Result<Vec<usize>> {
        let p = balanced_boundaries(graph.row_ptr(), parts)?;
        let mut labels = Vec::with_capacity(graph.nrows());
        for part in 0..parts {
            labels.extend(std::iter::repeat_n(part, p.len_of(part)));
        }
        Ok(labels)
    }
}

/// METIS k-way partitioning through the `metis` crate.
#[cfg(feature = "metis")]
#[derive(Debug, Default, Clone, Copy)]
pub struct MetisOracle;

#[cfg(feature = "metis")]
impl PartitionOracle for MetisOracle {
    fn assign(&self, graph: &Graph, parts: usize, imbalance: f64) -> Result<Vec<usize>> {
        use metis::Idx;

        let to_idx = |v: usize| {
            Idx::try_from(v)
                .map_err(|_| SpmvError::Partition(format!("{v} exceeds the METIS index range")))
        };
        // METIS wants an adjacency list without self loops
        let mut xadj: Vec<Idx> = Vec::with_capacity(graph.nrows() + 1);
        let mut adjncy: Vec<Idx> = Vec::with_capacity(graph.nnz());
        xadj.push(0);
        for r in 0..graph.nrows() {
            let (targets, _) = graph.row(r);
            for &t in targets.iter().filter(|&&t| t != r) {
                adjncy.push(to_idx(t)?);
            }
            xadj.push(to_idx(adjncy.len())?);
        }
        let mut part: Vec<Idx> = vec![0; graph.nrows()];
        let ufactor = (imbalance * 1000.0).round().max(1.0) as Idx;
        metis::Graph::new(1, to_idx(parts)?, &xadj, &adjncy)
            .map_err(|e| SpmvError::Partition(format!("invalid METIS graph: {e}")))?
            .set_option(metis::option::UFactor(ufactor))
            .part_kway(&mut part)
            .map_err(|e| SpmvError::Partition(format!("METIS k-way failed: {e}")))?;
        part.into_iter()
            .map(|l| {
                usize::try_from(l)
                    .map_err(|_| SpmvError::Partition(format!("METIS returned label {l}")))
            })
            .collect()
    }
}
