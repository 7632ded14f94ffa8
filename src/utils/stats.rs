//! Timing and volume counters for a run.

use std::time::Duration;

use crate::error::Result;
use crate::parallel::Comm;

/// What one worker measured.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunStats {
    pub steps: usize,
    /// Time spent in the SpMV kernel.
    pub compute: Duration,
    /// Time spent in barriers, halo exchange and publishing.
    pub comm: Duration,
    pub total: Duration,
    /// `2 * local_nnz` per step.
    pub flops: u64,
    pub values_sent: usize,
    pub values_received: usize,
}

impl RunStats {
    pub fn bytes_exchanged(&self) -> usize {
        (self.values_sent + self.values_received) * std::mem::size_of::<f64>()
    }
}

/// Run-wide figures, identical on every worker.
#[derive(Clone, Debug, PartialEq)]
pub struct RunReport {
    pub workers: usize,
    pub steps: usize,
    pub max_compute: Duration,
    pub max_comm: Duration,
    pub max_total: Duration,
    pub total_flops: f64,
    pub gflops: f64,
    pub comm_bytes_min: f64,
    pub comm_bytes_max: f64,
    pub comm_bytes_avg: f64,
}

impl RunReport {
    /// Collective: reduce every worker's stats.
    pub fn reduce<C: Comm>(comm: &C, stats: &RunStats) -> Result<Self> {
        let r = comm.all_reduce(&[
            stats.compute.as_secs_f64(),
            stats.comm.as_secs_f64(),
            stats.total.as_secs_f64(),
            stats.flops as f64,
            stats.bytes_exchanged() as f64,
        ])?;
        let workers = comm.size();
        let max_total = r[2].1;
        let total_flops = r[3].2;
        Ok(RunReport {
            workers,
            steps: stats.steps,
            max_compute: Duration::from_secs_f64(r[0].1),
            max_comm: Duration::from_secs_f64(r[1].1),
            max_total: Duration::from_secs_f64(max_total),
            total_flops,
            gflops: if max_total > 0.0 { total_flops / max_total * 1e-9 } else { 0.0 },
            comm_bytes_min: r[4].0,
            comm_bytes_max: r[4].1,
            comm_bytes_avg: r[4].2 / workers as f64,
        })
    }
}
