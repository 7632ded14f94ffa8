// All-gather halo exchange over separator vertices

use super::{CommPlan, ExchangeVolume, HaloExchange};
use crate::error::{Result, SpmvError};
use crate::parallel::Comm;

/// Every worker publishes the values of its separator vertices (the union of
/// its send lists) to everyone. Costs more bandwidth than [`Targeted`] but is
/// a single collective per step.
///
/// [`Targeted`]: super::Targeted
#[derive(Debug, Default, Clone)]
pub struct BroadcastAll {
    /// Separator count per worker, in rank order.
    counts: Vec<usize>,
    /// All separator ids, concatenated in rank order.
    ids: Vec<usize>,
    /// This worker's separators.
    mine: Vec<usize>,
    prepared: bool,
}

impl HaloExchange for BroadcastAll {
    fn prepare<C: Comm>(&mut self, comm: &C, plan: &CommPlan) -> Result<()> {
        self.mine = plan.separators();
        self.counts = comm.all_gather_varcount(&[self.mine.len()], &vec![1; comm.size()])?;
        self.ids = comm.all_gather_varcount(&self.mine, &self.counts)?;
        self.prepared = true;
        Ok(())
    }

    fn exchange<C: Comm>(&self, comm: &C, plan: &CommPlan, x: &mut [f64]) -> Result<ExchangeVolume> {
        if !self.prepared {
            return Err(SpmvError::comm(comm.rank(), "broadcast exchange used before prepare"));
        }
        let local: Vec<f64> = self.mine.iter().map(|&g| x[g]).collect();
        let all = comm.all_gather_varcount(&local, &self.counts)?;
        if all.len() != self.ids.len() {
            return Err(SpmvError::comm(
                comm.rank(),
                format!("gathered {} separator values for {} ids", all.len(), self.ids.len()),
            ));
        }
        for (&g, v) in self.ids.iter().zip(all) {
            if !plan.range.contains(&g) {
                x[g] = v;
            }
        }
        Ok(ExchangeVolume { sent: local.len(), received: self.ids.len() - local.len() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::halo::Targeted;
    use crate::matrix::{Graph, LocalCsr};
    use crate::parallel::ThreadComm;
    use crate::partition::BoundaryArray;

    #[test]
    fn covers_every_targeted_halo_entry() {
        let n = 9;
        let mut t = Vec::new();
        for v in 0..n {
            t.push((v, (v + 1) % n, 1.0));
            t.push(((v + 1) % n, v, 1.0));
            t.push((v, (v + 4) % n, 0.5));
            t.push(((v + 4) % n, v, 0.5));
        }
        let g = Graph::from_triplets(n, n, &t).unwrap();
        let p = BoundaryArray::new(vec![0, 3, 6, 9], n).unwrap();
        let out = ThreadComm::run(3, |comm| {
            let local = LocalCsr::slice(&g, p.range(comm.rank())).unwrap();
            let plan = CommPlan::build(&comm, &local, &p).unwrap();
            let seed = |x: &mut Vec<f64>| {
                for v in plan.range.clone() {
                    x[v] = v as f64 + 0.25;
                }
            };
            let mut a = vec![f64::NAN; n];
            seed(&mut a);
            Targeted.exchange(&comm, &plan, &mut a).unwrap();

            let mut bc = BroadcastAll::default();
            bc.prepare(&comm, &plan).unwrap();
            let mut b = vec![f64::NAN; n];
            seed(&mut b);
            bc.exchange(&comm, &plan, &mut b).unwrap();
            (plan, a, b)
        });
        for (plan, a, b) in out {
            for ids in plan.recv.values() {
                for &g in ids {
                    assert_eq!(a[g], b[g]);
                    assert_eq!(b[g], g as f64 + 0.25);
                }
            }
        }
    }

    #[test]
    fn exchange_without_prepare_is_an_error() {
        let out = ThreadComm::run(1, |comm| {
            let plan = CommPlan {
                rank: 0,
                range: 0..1,
                send: Default::default(),
                recv: Default::default(),
            };
            BroadcastAll::default().exchange(&comm, &plan, &mut [0.0])
        });
        assert!(out[0].is_err());
    }
}
