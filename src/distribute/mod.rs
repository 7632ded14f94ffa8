//! Collective distribution of a partitioned graph.
//!
//! The root holds the whole (renumbered) graph, its boundary array and the
//! co-indexed vector; every worker leaves with its own row block, rebased so
//! local offsets start at zero, plus a full copy of the vector.
//!
//! A worker's row segment only carries its own row starts. The end of its last
//! row is the start of the successor's first row, so each worker hands its
//! edge displacement to its predecessor (the overlap slot). Sending the
//! displacement rather than a row offset keeps empty ranges working.

use crate::error::{Result, SpmvError};
use crate::matrix::{Graph, LocalCsr};
use crate::parallel::{Comm, Tag};
use crate::partition::BoundaryArray;

pub mod balance;

/// What the root contributes to [`distribute`].
#[derive(Debug, Clone, Copy)]
pub struct Distribution<'a> {
    pub graph: &'a Graph,
    pub boundaries: &'a BoundaryArray,
    pub x: &'a [f64],
}

/// One worker's share after distribution.
#[derive(Debug, Clone)]
pub struct LocalPart {
    pub rank: usize,
    pub global_rows: usize,
    pub global_nnz: usize,
    pub boundaries: BoundaryArray,
    pub matrix: LocalCsr,
    /// Full-length vector, identical on every worker.
    pub x: Vec<f64>,
}

/// Per-worker scatter layout computed on the root: vertex count, edge count,
/// edge displacement.
fn layout(graph: &Graph, p: &BoundaryArray, rank: usize) -> Result<Vec<usize>> {
    let row_ptr = graph.row_ptr();
    let mut out = Vec::with_capacity(3 * p.parts());
    let mut displ = 0usize;
    for part in 0..p.parts() {
        let rows = p.range(part);
        let base = row_ptr[rows.start];
        let edges = row_ptr[rows.end] - base;
        if base != displ {
            return Err(SpmvError::comm(
                rank,
                format!("part {part} starts at edge {base} but the layout reached {displ}"),
            ));
        }
        out.extend_from_slice(&[rows.len(), edges, base]);
        displ += edges;
    }
    if displ != graph.nnz() {
        return Err(SpmvError::comm(
            rank,
            format!("layout covers {displ} edges of {}", graph.nnz()),
        ));
    }
    Ok(out)
}

/// Collective. `input` must be `Some` on `root` and is ignored elsewhere.
pub fn distribute<C: Comm>(
    comm: &C,
    root: usize,
    input: Option<Distribution<'_>>,
) -> Result<LocalPart> {
    let rank = comm.rank();
    let k = comm.size();
    let input = if rank == root {
        let d = input.ok_or_else(|| {
            SpmvError::Validation("root worker has nothing to distribute".into())
        })?;
        if d.boundaries.total() != d.graph.nrows() || d.x.len() != d.graph.nrows() {
            return Err(SpmvError::Validation(format!(
                "boundary array covers {} vertices and vector holds {} for a {}-row graph",
                d.boundaries.total(),
                d.x.len(),
                d.graph.nrows()
            )));
        }
        Some(d)
    } else {
        None
    };

    // global scalars, then the boundary array
    let mut header: Vec<usize> = match &input {
        Some(d) => vec![d.graph.nrows(), d.graph.nnz(), d.boundaries.parts()],
        None => Vec::new(),
    };
    comm.broadcast(&mut header, root)?;
    let [n, nnz, parts] = header[..] else {
        return Err(SpmvError::comm(rank, format!("header has {} fields", header.len())));
    };
    if parts != k {
        return Err(SpmvError::comm(
            rank,
            format!("graph was split into {parts} parts for {k} workers"),
        ));
    }
    let mut raw_p: Vec<usize> = match &input {
        Some(d) => d.boundaries.as_slice().to_vec(),
        None => Vec::new(),
    };
    comm.broadcast(&mut raw_p, root)?;
    let boundaries = BoundaryArray::new(raw_p, n)?;
    if boundaries.parts() != k {
        return Err(SpmvError::comm(rank, "boundary array length disagrees with header"));
    }

    // [vertices, edges, displacement] per worker
    let (triples, vcounts, ecounts) = match &input {
        Some(d) => {
            let t = layout(d.graph, &boundaries, rank)?;
            let vc: Vec<usize> = t.chunks_exact(3).map(|c| c[0]).collect();
            let ec: Vec<usize> = t.chunks_exact(3).map(|c| c[1]).collect();
            (t, vc, ec)
        }
        None => (Vec::new(), Vec::new(), Vec::new()),
    };
    let mine = comm.scatter_varcount(&triples, &vec![3; k], 3, root)?;
    let (nverts, nedges, base) = (mine[0], mine[1], mine[2]);
    if nverts != boundaries.len_of(rank) {
        return Err(SpmvError::comm(
            rank,
            format!(
                "received {nverts} vertices but the boundary array assigns {}",
                boundaries.len_of(rank)
            ),
        ));
    }

    let (row_starts, cols, vals): (&[usize], &[usize], &[f64]) = match &input {
        Some(d) => (&d.graph.row_ptr()[..n], d.graph.col_idx(), d.graph.vals()),
        None => (&[], &[], &[]),
    };
    let mut row_ptr = comm.scatter_varcount(row_starts, &vcounts, nverts, root)?;
    let col_idx = comm.scatter_varcount(cols, &ecounts, nedges, root)?;
    let local_vals = comm.scatter_varcount(vals, &ecounts, nedges, root)?;
    if row_ptr.first().is_some_and(|&first| first != base) {
        return Err(SpmvError::comm(
            rank,
            format!("first row starts at edge {} but displacement is {base}", row_ptr[0]),
        ));
    }

    let mut x = match &input {
        Some(d) => d.x.to_vec(),
        None => Vec::new(),
    };
    comm.broadcast(&mut x, root)?;
    if x.len() != n {
        return Err(SpmvError::comm(rank, format!("vector has {} entries, expected {n}", x.len())));
    }

    let end = overlap(comm, base, nnz)?;
    if end != base + nedges {
        return Err(SpmvError::comm(
            rank,
            format!("overlap offset {end} does not close edge range {base}+{nedges}"),
        ));
    }
    row_ptr.push(end);
    row_ptr.iter_mut().for_each(|o| *o -= base);

    let matrix = LocalCsr::from_parts(boundaries.range(rank).start, base, n, row_ptr, col_idx, local_vals)?;
    Ok(LocalPart { rank, global_rows: n, global_nnz: nnz, boundaries, matrix, x })
}

/// Pass each worker's edge displacement to its predecessor and return the one
/// received from the successor (`nnz` on the last worker). Odd ranks send
/// first, even ranks receive first, so blocking sends cannot deadlock.
fn overlap<C: Comm>(comm: &C, base: usize, nnz: usize) -> Result<usize> {
    let rank = comm.rank();
    let last = comm.size() - 1;
    let send = |c: &C| if rank > 0 { c.send(rank - 1, Tag::OVERLAP, &[base]) } else { Ok(()) };
    let recv = |c: &C| -> Result<usize> {
        if rank == last {
            return Ok(nnz);
        }
        let got: Vec<usize> = c.recv(rank + 1, Tag::OVERLAP)?;
        match got[..] {
            [end] => Ok(end),
            _ => Err(SpmvError::comm(rank, format!("overlap message has {} entries", got.len()))),
        }
    };
    if rank % 2 == 1 {
        send(comm)?;
        recv(comm)
    } else {
        let end = recv(comm)?;
        send(comm)?;
        Ok(end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::ThreadComm;

    fn chain(n: usize) -> Graph {
        let mut t = Vec::new();
        for v in 0..n - 1 {
            t.push((v, v + 1, 1.0 + v as f64));
            t.push((v + 1, v, 1.0 + v as f64));
        }
        Graph::from_triplets(n, n, &t).unwrap()
    }

    #[test]
    fn blocks_reassemble_the_graph() {
        let g = chain(7);
        let p = BoundaryArray::new(vec![0, 3, 3, 5, 7], 7).unwrap();
        let x: Vec<f64> = (0..7).map(f64::from).collect();
        let parts = ThreadComm::run(4, |comm| {
            let input = (comm.rank() == 0).then(|| Distribution { graph: &g, boundaries: &p, x: &x });
            distribute(&comm, 0, input).unwrap()
        });
        for part in &parts {
            let expect = LocalCsr::slice(&g, p.range(part.rank)).unwrap();
            assert_eq!(part.matrix, expect);
            assert_eq!(part.x, x);
            assert_eq!(part.global_nnz, g.nnz());
        }
        assert_eq!(parts[1].matrix.row_ptr(), &[0]);
    }

    #[test]
    fn worker_count_mismatch_fails_everywhere() {
        let g = chain(4);
        let p = BoundaryArray::new(vec![0, 2, 4], 4).unwrap();
        let x = vec![0.0; 4];
        let out = ThreadComm::run(3, |comm| {
            let input = (comm.rank() == 0).then(|| Distribution { graph: &g, boundaries: &p, x: &x });
            distribute(&comm, 0, input)
        });
        for res in out {
            assert!(matches!(res, Err(SpmvError::Communication { .. })));
        }
    }

    #[test]
    fn non_zero_root() {
        let g = chain(5);
        let p = BoundaryArray::new(vec![0, 2, 5], 5).unwrap();
        let x = vec![1.0; 5];
        let parts = ThreadComm::run(2, |comm| {
            let input = (comm.rank() == 1).then(|| Distribution { graph: &g, boundaries: &p, x: &x });
            distribute(&comm, 1, input).unwrap()
        });
        assert_eq!(parts[0].matrix.range(), 0..2);
        assert_eq!(parts[1].matrix.range(), 2..5);
        assert_eq!(parts[1].matrix.base_offset(), 3);
    }
}
