//! Per-worker context for a distributed SpMV run.
//!
//! This module provides the `SpmvContext` struct, which holds the run options,
//! the partition oracle and the trace sink, and drives one worker through the
//! whole pipeline: validate, split, distribute, build the halo plan, iterate,
//! gather.
//!
//! # Usage
//!
//! 1. Construct a `SpmvContext` on every worker with identical options.
//! 2. Call `run` on every worker; the root passes `Some(Problem)`, the others
//!    `None`.
//! 3. The root's `Outcome::result` holds the final vector in the input vertex
//!    order.
//!
//! Any failure on any worker aborts the communicator, so every worker returns
//! an error instead of hanging.

use crate::config::{RunOptions, SplitPolicy};
use crate::distribute::balance::balanced_boundaries;
use crate::distribute::{Distribution, distribute};
use crate::driver::IterationDriver;
use crate::error::{Result, SpmvError};
use crate::halo::{CommPlan, HaloExchange, Strategy};
use crate::matrix::{Graph, GraphChecks};
use crate::parallel::Comm;
use crate::partition::metrics::{edge_cut, imbalance};
use crate::partition::{
    BoundaryArray, GreedyGrowOracle, PartitionOracle, Renumbering, partition_graph,
};
use crate::trace::{LogTrace, TraceEvent, TraceSink};
use crate::utils::{RunReport, RunStats};

/// Input held by the root worker.
#[derive(Debug, Clone)]
pub struct Problem {
    pub graph: Graph,
    /// Starting vector, indexed by original vertex id.
    pub x: Vec<f64>,
}

impl Problem {
    pub fn new(graph: Graph, x: Vec<f64>) -> Self {
        Problem { graph, x }
    }

    /// Start from the all-ones vector.
    pub fn with_ones(graph: Graph) -> Self {
        let x = vec![1.0; graph.ncols()];
        Problem { graph, x }
    }
}

/// What a worker is left with after a successful run.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub stats: RunStats,
    pub report: RunReport,
    /// Final vector in partitioned order, identical on every worker.
    pub x: Vec<f64>,
    /// Final vector in the input order; root only.
    pub result: Option<Vec<f64>>,
    pub plan: CommPlan,
    pub boundaries: BoundaryArray,
}

/// Context and configuration for one worker of a run.
pub struct SpmvContext {
    /// Run parameters; must match on every worker
    pub options: RunOptions,
    /// Consulted on the root when `options.split` is `SplitPolicy::Oracle`
    pub oracle: Box<dyn PartitionOracle>,
    /// Receives progress events
    pub trace: Box<dyn TraceSink>,
}

impl Default for SpmvContext {
    fn default() -> Self {
        Self::new(RunOptions::default())
    }
}

impl SpmvContext {
    pub fn new(options: RunOptions) -> Self {
        SpmvContext { options, oracle: Box::new(GreedyGrowOracle), trace: Box::new(LogTrace) }
    }

    pub fn with_oracle(mut self, oracle: impl PartitionOracle + 'static) -> Self {
        self.oracle = Box::new(oracle);
        self
    }

    pub fn with_trace(mut self, trace: impl TraceSink + 'static) -> Self {
        self.trace = Box::new(trace);
        self
    }

    /// Run the pipeline on this worker. Collective.
    ///
    /// # Returns
    /// * `Ok(Outcome)` on success
    /// * `Err(SpmvError)` after aborting the communicator
    pub fn run<C: Comm>(&self, comm: &C, problem: Option<Problem>) -> Result<Outcome> {
        self.run_inner(comm, problem).inspect_err(|e| {
            let reason = e.to_string();
            self.trace.record(&TraceEvent::Aborted { rank: comm.rank(), reason: reason.clone() });
            comm.abort(&reason);
        })
    }

    fn run_inner<C: Comm>(&self, comm: &C, problem: Option<Problem>) -> Result<Outcome> {
        let opts = &self.options;
        let rank = comm.rank();
        if opts.root >= comm.size() {
            return Err(SpmvError::Validation(format!(
                "root {} outside a team of {}",
                opts.root,
                comm.size()
            )));
        }

        let prepared = if rank == opts.root {
            let problem = problem.ok_or_else(|| {
                SpmvError::Validation("root worker was given no problem".into())
            })?;
            Some(self.prepare(comm.size(), problem)?)
        } else {
            None
        };

        let input = prepared.as_ref().map(|(graph, x, p, _)| Distribution {
            graph,
            boundaries: p,
            x,
        });
        let part = distribute(comm, opts.root, input)?;
        self.trace.record(&TraceEvent::Distributed {
            rank,
            rows: part.matrix.range().len(),
            nnz: part.matrix.nnz(),
        });

        let plan = CommPlan::build(comm, &part.matrix, &part.boundaries)?;
        self.trace.record(&TraceEvent::PlanBuilt {
            rank,
            peers: plan.peers().len(),
            send: plan.values_to_send(),
            recv: plan.values_to_receive(),
        });

        let mut strategy = Strategy::new(opts.exchange);
        strategy.prepare(comm, &plan)?;

        let driver = IterationDriver {
            comm,
            matrix: &part.matrix,
            plan: &plan,
            strategy: &strategy,
            boundaries: &part.boundaries,
            steps: opts.steps,
            all_gather_each_step: opts.all_gather_each_step,
            parallel_rows: opts.parallel_rows,
            trace: self.trace.as_ref(),
        };
        let (x, stats) = driver.run(part.x)?;
        let report = RunReport::reduce(comm, &stats)?;

        let result = prepared.map(|(_, _, _, renum)| renum.restore(&x));
        Ok(Outcome { stats, report, x, result, plan, boundaries: part.boundaries })
    }

    /// Root-only: validate the input and choose the vertex ranges.
    fn prepare(
        &self,
        parts: usize,
        problem: Problem,
    ) -> Result<(Graph, Vec<f64>, BoundaryArray, Renumbering)> {
        let opts = &self.options;
        let Problem { mut graph, mut x } = problem;
        graph.validate(opts.checks | GraphChecks::SQUARE)?;
        if x.len() != graph.nrows() {
            return Err(SpmvError::Validation(format!(
                "vector has {} entries for a {}-vertex graph",
                x.len(),
                graph.nrows()
            )));
        }
        self.trace.record(&TraceEvent::GraphReady { rows: graph.nrows(), nnz: graph.nnz() });

        let (p, renum) = match opts.split {
            SplitPolicy::Oracle => {
                partition_graph(&mut graph, parts, &mut x, self.oracle.as_ref(), opts.imbalance)?
            }
            SplitPolicy::NnzBalanced => (
                balanced_boundaries(graph.row_ptr(), parts)?,
                Renumbering::identity(graph.nrows()),
            ),
        };

        let labels: Vec<usize> = (0..p.parts())
            .flat_map(|part| std::iter::repeat_n(part, p.len_of(part)))
            .collect();
        self.trace.record(&TraceEvent::Partitioned {
            parts,
            edge_cut: edge_cut(&graph, &labels),
            imbalance: imbalance(&p.sizes()),
        });
        Ok((graph, x, p, renum))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExchangeKind;
    use crate::matrix::SparseMatrix;
    use crate::parallel::ThreadComm;
    use crate::trace::testing::Recorder;
    use std::sync::Arc;

    struct Shared(Arc<Recorder>);

    impl TraceSink for Shared {
        fn record(&self, event: &TraceEvent) {
            self.0.record(event);
        }
    }

    fn grid(w: usize) -> Graph {
        let mut t = Vec::new();
        for y in 0..w {
            for x in 0..w {
                let v = y * w + x;
                if x + 1 < w {
                    t.push((v, v + 1, 0.25));
                    t.push((v + 1, v, 0.25));
                }
                if y + 1 < w {
                    t.push((v, v + w, 0.5));
                    t.push((v + w, v, 0.5));
                }
            }
        }
        Graph::from_triplets(w * w, w * w, &t).unwrap()
    }

    #[test]
    fn result_is_restored_to_input_order() {
        let g = grid(6);
        let x0: Vec<f64> = (0..36).map(|i| (i % 7) as f64).collect();
        let mut expect = vec![0.0; 36];
        let mut cur = x0.clone();
        for _ in 0..3 {
            g.spmv(&cur, &mut expect);
            cur.clone_from(&expect);
        }

        let out = ThreadComm::run(4, |comm| {
            let options = RunOptions {
                steps: 3,
                exchange: ExchangeKind::BroadcastAll,
                parallel_rows: false,
                ..RunOptions::default()
            };
            let ctx = SpmvContext::new(options).with_trace(crate::trace::NoTrace);
            let problem = (comm.rank() == 0).then(|| Problem::new(g.clone(), x0.clone()));
            ctx.run(&comm, problem).unwrap()
        });
        let got = out[0].result.as_ref().unwrap();
        for (a, b) in got.iter().zip(&expect) {
            approx::assert_relative_eq!(a, b, epsilon = 1e-12);
        }
        assert!(out[1].result.is_none());
        assert_eq!(out[0].x, out[3].x);
        assert_eq!(out[2].report.total_flops, out[0].report.total_flops);
    }

    #[test]
    fn trace_sees_every_stage() {
        let rec = Arc::new(Recorder::default());
        ThreadComm::run(2, |comm| {
            let options = RunOptions { steps: 2, ..RunOptions::default() };
            let ctx = SpmvContext::new(options).with_trace(Shared(Arc::clone(&rec)));
            let problem = (comm.rank() == 0).then(|| Problem::with_ones(grid(3)));
            ctx.run(&comm, problem).unwrap();
        });
        let events = rec.0.lock();
        assert_eq!(events.iter().filter(|e| matches!(e, TraceEvent::GraphReady { .. })).count(), 1);
        assert_eq!(events.iter().filter(|e| matches!(e, TraceEvent::PlanBuilt { .. })).count(), 2);
        assert_eq!(events.iter().filter(|e| matches!(e, TraceEvent::StepFinished { .. })).count(), 4);
        assert_eq!(events.iter().filter(|e| matches!(e, TraceEvent::Finished { .. })).count(), 2);
    }

    #[test]
    fn invalid_root_fails_on_every_worker() {
        let out = ThreadComm::run(2, |comm| {
            let options = RunOptions { root: 5, ..RunOptions::default() };
            SpmvContext::new(options).with_trace(crate::trace::NoTrace).run(&comm, None)
        });
        assert!(out.iter().all(Result::is_err));
    }
}
