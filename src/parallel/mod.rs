//! Message-passing backends for the distributed SpMV pipeline.
//!
//! The [`Comm`] trait exposes a small set of *byte-level* blocking primitives
//! (point-to-point, broadcast, variable-count scatter and all-gather, barrier)
//! that every backend must provide, plus typed helpers layered on top of them
//! via `bytemuck`. Two backends ship with the crate:
//!
//! - [`ThreadComm`]: a team of in-process workers, one OS thread each, talking
//!   through mailboxes. Used by the tests and for single-node runs.
//! - [`MpiComm`]: MPI processes via the `mpi` crate (feature `mpi`).
//!
//! Every call blocks until it has completed locally; collectives block until
//! all participants have joined. There is no timeout. [`Comm::abort`] is the
//! only way out of a hung run.

use bytemuck::Pod;

use crate::error::{Result, SpmvError};

pub mod wire;

pub mod thread_comm;
pub use thread_comm::ThreadComm;

#[cfg(feature = "mpi")]
pub mod mpi_comm;
#[cfg(feature = "mpi")]
pub use mpi_comm::MpiComm;

/// Message tag for point-to-point traffic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Tag(pub u16);

impl Tag {
    /// Overlap row offset sent to the predecessor during distribution.
    pub const OVERLAP: Tag = Tag(1);
    /// Halo request lists exchanged while building a `CommPlan`.
    pub const REQUEST: Tag = Tag(2);
    /// Per-iteration halo values.
    pub const HALO: Tag = Tag(3);

    pub fn as_u16(self) -> u16 {
        self.0
    }
}

pub trait Comm {
    fn rank(&self) -> usize;
    fn size(&self) -> usize;
    fn barrier(&self) -> Result<()>;

    /// Blocking send of `buf` to `peer`.
    fn send_bytes(&self, peer: usize, tag: Tag, buf: &[u8]) -> Result<()>;
    /// Blocking receive from `peer`; the message length is set by the sender.
    fn recv_bytes(&self, peer: usize, tag: Tag) -> Result<Vec<u8>>;
    /// Replace `buf` on every non-root worker with the root's contents.
    fn broadcast_bytes(&self, buf: &mut Vec<u8>, root: usize) -> Result<()>;
    /// Scatter contiguous chunks of `send` (root only) sized by `counts`
    /// (root only). `recv` must already have this worker's chunk length.
    fn scatter_varcount_bytes(
        &self,
        send: &[u8],
        counts: &[usize],
        recv: &mut [u8],
        root: usize,
    ) -> Result<()>;
    /// Concatenate every worker's `local` in rank order; `counts[i]` is the
    /// byte length contributed by worker `i`.
    fn all_gather_varcount_bytes(&self, local: &[u8], counts: &[usize]) -> Result<Vec<u8>>;
    /// Tear the whole run down. Pending and future calls on every worker fail.
    fn abort(&self, reason: &str);

    fn send<T: Pod>(&self, peer: usize, tag: Tag, data: &[T]) -> Result<()> {
        self.send_bytes(peer, tag, wire::encode(data))
    }

    fn recv<T: Pod>(&self, peer: usize, tag: Tag) -> Result<Vec<T>> {
        let bytes = self.recv_bytes(peer, tag)?;
        wire::decode(&bytes, self.rank())
    }

    /// Swap `data` with `peer`. The lower rank sends first so blocking
    /// backends cannot deadlock on a send/send pair.
    fn exchange<T: Pod>(&self, peer: usize, tag: Tag, data: &[T]) -> Result<Vec<T>> {
        if peer == self.rank() {
            return Err(SpmvError::comm(self.rank(), "exchange with self"));
        }
        if self.rank() < peer {
            self.send(peer, tag, data)?;
            self.recv(peer, tag)
        } else {
            let got = self.recv(peer, tag)?;
            self.send(peer, tag, data)?;
            Ok(got)
        }
    }

    fn broadcast<T: Pod>(&self, data: &mut Vec<T>, root: usize) -> Result<()> {
        let mut bytes = if self.rank() == root {
            wire::encode(data.as_slice()).to_vec()
        } else {
            Vec::new()
        };
        self.broadcast_bytes(&mut bytes, root)?;
        if self.rank() != root {
            *data = wire::decode(&bytes, self.rank())?;
        }
        Ok(())
    }

    /// Typed scatterv. `counts` are element counts and only read on the root;
    /// `recv_len` is this worker's element count.
    fn scatter_varcount<T: Pod>(
        &self,
        send: &[T],
        counts: &[usize],
        recv_len: usize,
        root: usize,
    ) -> Result<Vec<T>> {
        let width = std::mem::size_of::<T>();
        let byte_counts: Vec<usize> = counts.iter().map(|&c| c * width).collect();
        let mut recv = vec![0u8; recv_len * width];
        self.scatter_varcount_bytes(wire::encode(send), &byte_counts, &mut recv, root)?;
        wire::decode(&recv, self.rank())
    }

    /// Typed all-gatherv; `counts` are element counts for every worker.
    fn all_gather_varcount<T: Pod>(&self, local: &[T], counts: &[usize]) -> Result<Vec<T>> {
        if counts.len() != self.size() || counts[self.rank()] != local.len() {
            return Err(SpmvError::comm(
                self.rank(),
                format!(
                    "all-gather declares {:?} elements but worker contributes {}",
                    counts.get(self.rank()),
                    local.len()
                ),
            ));
        }
        let width = std::mem::size_of::<T>();
        let byte_counts: Vec<usize> = counts.iter().map(|&c| c * width).collect();
        let bytes = self.all_gather_varcount_bytes(wire::encode(local), &byte_counts)?;
        wire::decode(&bytes, self.rank())
    }

    /// Element-wise `(min, max, sum)` of a few per-worker scalars.
    fn all_reduce(&self, local: &[f64]) -> Result<Vec<(f64, f64, f64)>> {
        let counts = vec![local.len(); self.size()];
        let all = self.all_gather_varcount(local, &counts)?;
        let mut out = vec![(f64::INFINITY, f64::NEG_INFINITY, 0.0); local.len()];
        for chunk in all.chunks_exact(local.len().max(1)) {
            for (slot, &v) in out.iter_mut().zip(chunk) {
                slot.0 = slot.0.min(v);
                slot.1 = slot.1.max(v);
                slot.2 += v;
            }
        }
        Ok(out)
    }
}
