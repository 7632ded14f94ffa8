//! Halo exchange: who needs which boundary values, and how they move.
//!
//! [`CommPlan`] is built once per run. The receive side comes straight from
//! the local edges: every target outside the owned range is a dependency on
//! its owner. The send side is learned by a handshake: each worker tells every
//! owner it depends on which of its vertices it needs. The request-count matrix
//! is all-gathered first so both sides of every pair agree on whether and how
//! much they talk.
//!
//! The per-iteration movement is a [`HaloExchange`] strategy.

use std::collections::BTreeMap;
use std::ops::Range;

use crate::config::ExchangeKind;
use crate::error::{Result, SpmvError};
use crate::matrix::LocalCsr;
use crate::parallel::{Comm, Tag};
use crate::partition::BoundaryArray;

pub mod broadcast;
pub mod targeted;
pub use broadcast::BroadcastAll;
pub use targeted::Targeted;

/// Send and receive lists of one worker, keyed by peer rank. All ids are
/// global and every list is strictly ascending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommPlan {
    pub rank: usize,
    pub range: Range<usize>,
    pub send: BTreeMap<usize, Vec<usize>>,
    pub recv: BTreeMap<usize, Vec<usize>>,
}

impl CommPlan {
    /// Receive side only, from a scan of the local edges.
    pub fn discover(rank: usize, local: &LocalCsr, p: &BoundaryArray) -> Result<Self> {
        let range = local.range();
        let mut recv: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for &t in local.col_idx() {
            if range.contains(&t) {
                continue;
            }
            let owner = p.owner_of(t).ok_or_else(|| {
                SpmvError::comm(rank, format!("edge target {t} has no owner"))
            })?;
            recv.entry(owner).or_default().push(t);
        }
        for ids in recv.values_mut() {
            ids.sort_unstable();
            ids.dedup();
        }
        Ok(CommPlan { rank, range, send: BTreeMap::new(), recv })
    }

    /// Discover dependencies and complete the send side with a handshake.
    /// Collective.
    pub fn build<C: Comm>(comm: &C, local: &LocalCsr, p: &BoundaryArray) -> Result<Self> {
        let rank = comm.rank();
        let k = comm.size();
        let mut plan = Self::discover(rank, local, p)?;

        // row i of the matrix: how many ids worker i requests from each peer
        let mut row = vec![0usize; k];
        for (&peer, ids) in &plan.recv {
            row[peer] = ids.len();
        }
        let matrix = comm.all_gather_varcount(&row, &vec![k; k])?;
        let requested_from_me = |peer: usize| matrix[peer * k + rank];

        for peer in (0..k).filter(|&q| q != rank) {
            let expect = requested_from_me(peer);
            let mine = plan.recv.get(&peer).map(Vec::as_slice).unwrap_or(&[]);
            if expect == 0 && mine.is_empty() {
                continue;
            }
            let got: Vec<usize> = comm.exchange(peer, Tag::REQUEST, mine)?;
            if got.len() != expect {
                return Err(SpmvError::comm(
                    rank,
                    format!("worker {peer} announced {expect} requests but sent {}", got.len()),
                ));
            }
            if let Some(&bad) = got.iter().find(|&&v| !plan.range.contains(&v)) {
                return Err(SpmvError::comm(
                    rank,
                    format!("worker {peer} requested vertex {bad} outside {:?}", plan.range),
                ));
            }
            if got.windows(2).any(|w| w[1] <= w[0]) {
                return Err(SpmvError::comm(
                    rank,
                    format!("request list from worker {peer} is unsorted or duplicated"),
                ));
            }
            if !got.is_empty() {
                plan.send.insert(peer, got);
            }
        }
        Ok(plan)
    }

    /// Ranks this worker talks to in either direction, ascending.
    pub fn peers(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self.send.keys().chain(self.recv.keys()).copied().collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Owned vertices somebody else reads: the union of all send lists.
    pub fn separators(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self.send.values().flatten().copied().collect();
        out.sort_unstable();
        out.dedup();
        out
    }

    pub fn values_to_send(&self) -> usize {
        self.send.values().map(Vec::len).sum()
    }

    pub fn values_to_receive(&self) -> usize {
        self.recv.values().map(Vec::len).sum()
    }
}

/// Values moved by one exchange on this worker.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ExchangeVolume {
    pub sent: usize,
    pub received: usize,
}

impl std::ops::AddAssign for ExchangeVolume {
    fn add_assign(&mut self, rhs: Self) {
        self.sent += rhs.sent;
        self.received += rhs.received;
    }
}

/// Moves halo values into the shared global-length vector.
pub trait HaloExchange {
    /// One-off collective setup against a finished plan.
    fn prepare<C: Comm>(&mut self, comm: &C, plan: &CommPlan) -> Result<()>;
    /// Refresh every halo entry of `x` from its owner. Collective.
    fn exchange<C: Comm>(&self, comm: &C, plan: &CommPlan, x: &mut [f64]) -> Result<ExchangeVolume>;
}

/// Strategy picked from [`ExchangeKind`].
#[derive(Debug, Clone)]
pub enum Strategy {
    Targeted(Targeted),
    BroadcastAll(BroadcastAll),
}

impl Strategy {
    pub fn new(kind: ExchangeKind) -> Self {
        match kind {
            ExchangeKind::Targeted => Strategy::Targeted(Targeted),
            ExchangeKind::BroadcastAll => Strategy::BroadcastAll(BroadcastAll::default()),
        }
    }
}

impl HaloExchange for Strategy {
    fn prepare<C: Comm>(&mut self, comm: &C, plan: &CommPlan) -> Result<()> {
        match self {
            Strategy::Targeted(s) => s.prepare(comm, plan),
            Strategy::BroadcastAll(s) => s.prepare(comm, plan),
        }
    }

    fn exchange<C: Comm>(&self, comm: &C, plan: &CommPlan, x: &mut [f64]) -> Result<ExchangeVolume> {
        match self {
            Strategy::Targeted(s) => s.exchange(comm, plan, x),
            Strategy::BroadcastAll(s) => s.exchange(comm, plan, x),
        }
    }
}
