//! MPI-based parallel communication module.
//!
//! This module provides an implementation of the `Comm` trait using the MPI (Message Passing Interface)
//! backend for distributed-memory parallelism. Every worker of the SpMV pipeline is one MPI process;
//! collectives map onto their MPI counterparts (`MPI_Bcast`, `MPI_Scatterv`, `MPI_Allgatherv`) and
//! point-to-point traffic onto blocking `MPI_Send`/`MPI_Recv`. The implementation is only available
//! when the `mpi` feature is enabled.
//!
//! # Usage
//!
//! - The caller owns the `mpi::environment::Universe` and keeps it alive for the whole run; dropping it
//!   finalizes MPI.
//! - MPI errors are fatal by default, so the backend never reports a recoverable error of its own. A
//!   pipeline-level failure is turned into `MPI_Abort` through [`Comm::abort`].
//!
//! # Example
//! ```no_run
//! # #[cfg(feature = "mpi")] {
//! use halo_spmv::parallel::{Comm, MpiComm};
//! let universe = mpi::initialize().expect("MPI init failed");
//! let comm = MpiComm::new(&universe);
//! println!("Rank: {} / {}", comm.rank(), comm.size());
//! comm.barrier().unwrap();
//! # }
//! ```

use mpi::datatype::{Partition, PartitionMut};
use mpi::environment::Universe;
use mpi::topology::SimpleCommunicator;
use mpi::traits::*;
use mpi::Count;

use super::{Comm, Tag};
use crate::error::{Result, SpmvError};

/// MPI communicator wrapper for distributed parallelism.
///
/// Holds the MPI world communicator, the rank of the current process, and the total number of processes.
pub struct MpiComm {
    /// The MPI world communicator (all processes in the job).
    pub world: SimpleCommunicator,
    /// The rank (ID) of this process within the communicator.
    pub rank: usize,
    /// The total number of processes in the communicator.
    pub size: usize,
}

impl MpiComm {
    /// Wraps the world communicator of an already initialized universe.
    pub fn new(universe: &Universe) -> Self {
        let world = universe.world();
        let rank = world.rank() as usize;
        let size = world.size() as usize;
        MpiComm { world, rank, size }
    }

    fn to_counts(&self, counts: &[usize]) -> Result<(Vec<Count>, Vec<Count>)> {
        let mut displs = Vec::with_capacity(counts.len());
        let mut acc: usize = 0;
        let mut out = Vec::with_capacity(counts.len());
        for &c in counts {
            let (count, displ) = match (Count::try_from(c), Count::try_from(acc)) {
                (Ok(count), Ok(displ)) => (count, displ),
                _ => {
                    return Err(SpmvError::comm(
                        self.rank,
                        format!("message of {c} bytes at offset {acc} exceeds MPI count range"),
                    ));
                }
            };
            out.push(count);
            displs.push(displ);
            acc += c;
        }
        Ok((out, displs))
    }
}

impl Comm for MpiComm {
    /// Returns the rank (ID) of this process.
    fn rank(&self) -> usize {
        self.rank
    }
    /// Returns the total number of processes in the communicator.
    fn size(&self) -> usize {
        self.size
    }
    /// Synchronizes all processes at a barrier.
    fn barrier(&self) -> Result<()> {
        self.world.barrier();
        Ok(())
    }

    fn send_bytes(&self, peer: usize, tag: Tag, buf: &[u8]) -> Result<()> {
        self.world
            .process_at_rank(peer as i32)
            .send_with_tag(buf, tag.as_u16() as i32);
        Ok(())
    }

    fn recv_bytes(&self, peer: usize, tag: Tag) -> Result<Vec<u8>> {
        let (msg, _status) = self
            .world
            .process_at_rank(peer as i32)
            .receive_vec_with_tag::<u8>(tag.as_u16() as i32);
        Ok(msg)
    }

    /// Broadcasts the byte length first so non-root ranks can size their buffer.
    fn broadcast_bytes(&self, buf: &mut Vec<u8>, root: usize) -> Result<()> {
        let root_process = self.world.process_at_rank(root as i32);
        let mut len = buf.len() as u64;
        root_process.broadcast_into(&mut len);
        if self.rank != root {
            buf.resize(len as usize, 0);
        }
        root_process.broadcast_into(&mut buf[..]);
        Ok(())
    }

    /// Distributes contiguous chunks of a root buffer (scatterv).
    ///
    /// - `send`/`counts`: only read on the root process.
    /// - `recv`: sized to this process's chunk on every process.
    fn scatter_varcount_bytes(
        &self,
        send: &[u8],
        counts: &[usize],
        recv: &mut [u8],
        root: usize,
    ) -> Result<()> {
        let root_process = self.world.process_at_rank(root as i32);
        if self.rank == root {
            if counts.len() != self.size || counts.iter().sum::<usize>() != send.len() {
                return Err(SpmvError::comm(
                    self.rank,
                    format!("scatter counts {counts:?} do not tile a {}-byte buffer", send.len()),
                ));
            }
            let (counts, displs) = self.to_counts(counts)?;
            let partition = Partition::new(send, counts, displs);
            root_process.scatter_varcount_into_root(&partition, recv);
        } else {
            root_process.scatter_varcount_into(recv);
        }
        Ok(())
    }

    /// Gathers variable-sized chunks from every process onto every process (allgatherv).
    fn all_gather_varcount_bytes(&self, local: &[u8], counts: &[usize]) -> Result<Vec<u8>> {
        if counts.len() != self.size || counts[self.rank] != local.len() {
            return Err(SpmvError::comm(self.rank, "all-gather counts do not match local buffer"));
        }
        let mut out = vec![0u8; counts.iter().sum()];
        let (counts, displs) = self.to_counts(counts)?;
        {
            let mut partition = PartitionMut::new(&mut out[..], counts, displs);
            self.world.all_gather_varcount_into(local, &mut partition);
        }
        Ok(out)
    }

    /// Calls `MPI_Abort` on the world communicator; never returns.
    fn abort(&self, reason: &str) {
        log::error!("rank {} aborting MPI job: {reason}", self.rank);
        self.world.abort(1)
    }
}
