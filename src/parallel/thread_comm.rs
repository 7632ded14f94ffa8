// thread-team parallel communication

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::{Condvar, Mutex};

use super::{Comm, Tag};
use crate::error::{Result, SpmvError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Channel {
    User(u16),
    Broadcast,
    Scatter,
    Gather,
}

#[derive(Default)]
struct Mailbox {
    slots: Mutex<HashMap<(usize, Channel), VecDeque<Vec<u8>>>>,
    ready: Condvar,
}

#[derive(Default)]
struct BarrierState {
    arrived: usize,
    generation: u64,
}

struct Fabric {
    size: usize,
    mailboxes: Vec<Mailbox>,
    barrier: Mutex<BarrierState>,
    barrier_cv: Condvar,
    aborted: AtomicBool,
    reason: Mutex<Option<String>>,
}

/// One member of an in-process worker team.
///
/// Each worker has its own mailbox keyed by `(source, channel)`; sends never
/// block, receives wait on the mailbox condvar. Messages between a fixed pair
/// on a fixed channel arrive in send order.
pub struct ThreadComm {
    rank: usize,
    fabric: Arc<Fabric>,
}

impl ThreadComm {
    /// Build `size` connected communicators, rank `i` at index `i`.
    pub fn team(size: usize) -> Vec<ThreadComm> {
        let fabric = Arc::new(Fabric {
            size,
            mailboxes: (0..size).map(|_| Mailbox::default()).collect(),
            barrier: Mutex::new(BarrierState::default()),
            barrier_cv: Condvar::new(),
            aborted: AtomicBool::new(false),
            reason: Mutex::new(None),
        });
        (0..size)
            .map(|rank| ThreadComm { rank, fabric: Arc::clone(&fabric) })
            .collect()
    }

    /// Run `f` once per worker on its own thread and collect the results in
    /// rank order. A panicking worker is re-raised after all threads joined.
    pub fn run<F, R>(size: usize, f: F) -> Vec<R>
    where
        F: Fn(ThreadComm) -> R + Sync,
        R: Send,
    {
        let f = &f;
        std::thread::scope(|s| {
            let handles: Vec<_> = Self::team(size)
                .into_iter()
                .map(|comm| s.spawn(move || f(comm)))
                .collect();
            handles
                .into_iter()
                .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
                .collect()
        })
    }

    fn check_abort(&self) -> Result<()> {
        if self.fabric.aborted.load(Ordering::SeqCst) {
            let reason = self
                .fabric
                .reason
                .lock()
                .clone()
                .unwrap_or_else(|| "unknown".to_string());
            return Err(SpmvError::comm(self.rank, format!("run aborted: {reason}")));
        }
        Ok(())
    }

    fn check_peer(&self, peer: usize) -> Result<()> {
        if peer >= self.fabric.size {
            return Err(SpmvError::comm(
                self.rank,
                format!("peer {peer} outside team of {}", self.fabric.size),
            ));
        }
        Ok(())
    }

    fn post(&self, dst: usize, channel: Channel, bytes: Vec<u8>) -> Result<()> {
        self.check_abort()?;
        self.check_peer(dst)?;
        let mailbox = &self.fabric.mailboxes[dst];
        mailbox
            .slots
            .lock()
            .entry((self.rank, channel))
            .or_default()
            .push_back(bytes);
        mailbox.ready.notify_all();
        Ok(())
    }

    fn take(&self, src: usize, channel: Channel) -> Result<Vec<u8>> {
        self.check_peer(src)?;
        let mailbox = &self.fabric.mailboxes[self.rank];
        let mut slots = mailbox.slots.lock();
        loop {
            if let Some(msg) = slots.get_mut(&(src, channel)).and_then(VecDeque::pop_front) {
                return Ok(msg);
            }
            // checked under the mailbox lock so an abort cannot slip between
            // the check and the wait
            self.check_abort()?;
            mailbox.ready.wait(&mut slots);
        }
    }
}

impl Comm for ThreadComm {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.fabric.size
    }

    fn barrier(&self) -> Result<()> {
        let fabric = &self.fabric;
        let mut state = fabric.barrier.lock();
        self.check_abort()?;
        let generation = state.generation;
        state.arrived += 1;
        if state.arrived == fabric.size {
            state.arrived = 0;
            state.generation += 1;
            fabric.barrier_cv.notify_all();
            return Ok(());
        }
        while state.generation == generation {
            self.check_abort()?;
            fabric.barrier_cv.wait(&mut state);
        }
        Ok(())
    }

    fn send_bytes(&self, peer: usize, tag: Tag, buf: &[u8]) -> Result<()> {
        self.post(peer, Channel::User(tag.as_u16()), buf.to_vec())
    }

    fn recv_bytes(&self, peer: usize, tag: Tag) -> Result<Vec<u8>> {
        self.take(peer, Channel::User(tag.as_u16()))
    }

    fn broadcast_bytes(&self, buf: &mut Vec<u8>, root: usize) -> Result<()> {
        self.check_peer(root)?;
        if self.rank == root {
            for dst in (0..self.fabric.size).filter(|&d| d != root) {
                self.post(dst, Channel::Broadcast, buf.clone())?;
            }
        } else {
            *buf = self.take(root, Channel::Broadcast)?;
        }
        Ok(())
    }

    fn scatter_varcount_bytes(
        &self,
        send: &[u8],
        counts: &[usize],
        recv: &mut [u8],
        root: usize,
    ) -> Result<()> {
        self.check_peer(root)?;
        let chunk = if self.rank == root {
            if counts.len() != self.fabric.size {
                return Err(SpmvError::comm(
                    self.rank,
                    format!("scatter has {} counts for {} workers", counts.len(), self.fabric.size),
                ));
            }
            let total: usize = counts.iter().sum();
            if total != send.len() {
                return Err(SpmvError::comm(
                    self.rank,
                    format!("scatter counts cover {total} bytes but buffer holds {}", send.len()),
                ));
            }
            let mut own = Vec::new();
            let mut offset = 0;
            for (dst, &count) in counts.iter().enumerate() {
                let piece = &send[offset..offset + count];
                if dst == root {
                    own = piece.to_vec();
                } else {
                    self.post(dst, Channel::Scatter, piece.to_vec())?;
                }
                offset += count;
            }
            own
        } else {
            self.take(root, Channel::Scatter)?
        };
        if chunk.len() != recv.len() {
            return Err(SpmvError::comm(
                self.rank,
                format!("scatter delivered {} bytes, expected {}", chunk.len(), recv.len()),
            ));
        }
        recv.copy_from_slice(&chunk);
        Ok(())
    }

    fn all_gather_varcount_bytes(&self, local: &[u8], counts: &[usize]) -> Result<Vec<u8>> {
        if counts.len() != self.fabric.size || counts[self.rank] != local.len() {
            return Err(SpmvError::comm(self.rank, "all-gather counts do not match local buffer"));
        }
        for dst in (0..self.fabric.size).filter(|&d| d != self.rank) {
            self.post(dst, Channel::Gather, local.to_vec())?;
        }
        let mut out = Vec::with_capacity(counts.iter().sum());
        for (src, &count) in counts.iter().enumerate() {
            if src == self.rank {
                out.extend_from_slice(local);
                continue;
            }
            let chunk = self.take(src, Channel::Gather)?;
            if chunk.len() != count {
                return Err(SpmvError::comm(
                    self.rank,
                    format!("all-gather got {} bytes from worker {src}, expected {count}", chunk.len()),
                ));
            }
            out.extend_from_slice(&chunk);
        }
        Ok(out)
    }

    fn abort(&self, reason: &str) {
        {
            let mut slot = self.fabric.reason.lock();
            if slot.is_none() {
                *slot = Some(format!("worker {}: {reason}", self.rank));
            }
        }
        self.fabric.aborted.store(true, Ordering::SeqCst);
        for mailbox in &self.fabric.mailboxes {
            let _guard = mailbox.slots.lock();
            mailbox.ready.notify_all();
        }
        let _guard = self.fabric.barrier.lock();
        self.fabric.barrier_cv.notify_all();
    }
}
