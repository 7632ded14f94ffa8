//! Fixed-step exchange/compute loop.
//!
//! Every step: barrier, halo exchange into the front buffer, SpMV of the local
//! block into the owned rows, publish into the back buffer, swap. There is no
//! convergence test. Publishing either all-gathers the whole vector or only
//! writes the owned range; in the second mode the halo exchange of the next
//! step is what keeps the remote entries current, and one all-gather after the
//! last step completes the vector.

use std::time::Instant;

use crate::error::Result;
use crate::halo::{CommPlan, HaloExchange, Strategy};
use crate::matrix::{LocalCsr, SparseMatrix};
use crate::parallel::Comm;
use crate::partition::BoundaryArray;
use crate::trace::{TraceEvent, TraceSink};
use crate::utils::RunStats;

pub struct IterationDriver<'a, C: Comm> {
    pub comm: &'a C,
    pub matrix: &'a LocalCsr,
    pub plan: &'a CommPlan,
    pub strategy: &'a Strategy,
    pub boundaries: &'a BoundaryArray,
    pub steps: usize,
    pub all_gather_each_step: bool,
    pub parallel_rows: bool,
    pub trace: &'a dyn TraceSink,
}

impl<C: Comm> IterationDriver<'_, C> {
    /// Run all steps starting from the full vector `x`. Collective. Returns
    /// the final full vector, identical on every worker.
    pub fn run(&self, x: Vec<f64>) -> Result<(Vec<f64>, RunStats)> {
        let comm = self.comm;
        let rank = comm.rank();
        let range = self.matrix.range();
        let counts = self.boundaries.sizes();
        let started = Instant::now();

        let mut stats = RunStats { steps: self.steps, ..RunStats::default() };
        let mut front = x;
        let mut back = front.clone();
        let mut y = vec![0.0; range.len()];

        for step in 0..self.steps {
            let t0 = Instant::now();
            comm.barrier()?;
            let volume = self.strategy.exchange(comm, self.plan, &mut front)?;
            stats.values_sent += volume.sent;
            stats.values_received += volume.received;
            let t1 = Instant::now();

            self.kernel(&front, &mut y);
            let t2 = Instant::now();

            if self.all_gather_each_step {
                back = comm.all_gather_varcount(&y, &counts)?;
            } else {
                back[range.clone()].copy_from_slice(&y);
            }
            std::mem::swap(&mut front, &mut back);
            let t3 = Instant::now();

            stats.comm += (t1 - t0) + (t3 - t2);
            stats.compute += t2 - t1;
            self.trace.record(&TraceEvent::StepFinished { rank, step, elapsed: t3 - t0 });
        }

        if !self.all_gather_each_step && self.steps > 0 {
            let t = Instant::now();
            front = comm.all_gather_varcount(&front[range.clone()], &counts)?;
            stats.comm += t.elapsed();
        }

        stats.flops = 2 * self.matrix.nnz() as u64 * self.steps as u64;
        stats.total = started.elapsed();
        self.trace.record(&TraceEvent::Finished { rank, steps: self.steps, elapsed: stats.total });
        Ok((front, stats))
    }

    fn kernel(&self, x: &[f64], y: &mut [f64]) {
        #[cfg(feature = "rayon")]
        {
            if self.parallel_rows {
                self.matrix.spmv_parallel(x, y);
                return;
            }
        }
        self.matrix.spmv(x, y);
    }
}
