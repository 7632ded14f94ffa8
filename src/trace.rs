//! Progress reporting for a run.
//!
//! The pipeline never prints. Each stage hands a [`TraceEvent`] to the
//! injected [`TraceSink`]; [`LogTrace`] forwards them to the `log` facade.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq)]
pub enum TraceEvent {
    GraphReady { rows: usize, nnz: usize },
    Partitioned { parts: usize, edge_cut: usize, imbalance: f64 },
    Distributed { rank: usize, rows: usize, nnz: usize },
    PlanBuilt { rank: usize, peers: usize, send: usize, recv: usize },
    StepFinished { rank: usize, step: usize, elapsed: Duration },
    Finished { rank: usize, steps: usize, elapsed: Duration },
    Aborted { rank: usize, reason: String },
}

pub trait TraceSink: Send + Sync {
    fn record(&self, event: &TraceEvent);
}

/// Stage completions at info, per-step events at debug, aborts at error.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl TraceSink for LogTrace {
    fn record(&self, event: &TraceEvent) {
        match event {
            TraceEvent::GraphReady { rows, nnz } => {
                log::info!("graph ready: {rows} rows, {nnz} edges")
            }
            TraceEvent::Partitioned { parts, edge_cut, imbalance } => log::info!(
                "partitioned into {parts} parts, edge cut {edge_cut}, imbalance {:.3}",
                imbalance
            ),
            TraceEvent::Distributed { rank, rows, nnz } => {
                log::info!("worker {rank}: received {rows} rows, {nnz} edges")
            }
            TraceEvent::PlanBuilt { rank, peers, send, recv } => log::info!(
                "worker {rank}: halo plan with {peers} peers, {send} values out, {recv} in"
            ),
            TraceEvent::StepFinished { rank, step, elapsed } => {
                log::debug!("worker {rank}: step {step} took {elapsed:?}")
            }
            TraceEvent::Finished { rank, steps, elapsed } => {
                log::info!("worker {rank}: {steps} steps in {elapsed:?}")
            }
            TraceEvent::Aborted { rank, reason } => {
                log::error!("worker {rank}: aborting run: {reason}")
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl TraceSink for NoTrace {
    fn record(&self, _event: &TraceEvent) {}
}
