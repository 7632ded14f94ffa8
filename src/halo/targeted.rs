// Point-to-point halo exchange sized to the plan's lists

use super::{CommPlan, ExchangeVolume, HaloExchange};
use crate::error::{Result, SpmvError};
use crate::parallel::{Comm, Tag};

/// Each pair of neighbours swaps exactly the values named in the plan.
/// Peers are visited in ascending rank order on every worker.
#[derive(Debug, Default, Clone, Copy)]
pub struct Targeted;

impl HaloExchange for Targeted {
    fn prepare<C: Comm>(&mut self, _comm: &C, _plan: &CommPlan) -> Result<()> {
        Ok(())
    }

    fn exchange<C: Comm>(&self, comm: &C, plan: &CommPlan, x: &mut [f64]) -> Result<ExchangeVolume> {
        let mut volume = ExchangeVolume::default();
        let mut outgoing = Vec::new();
        for peer in plan.peers() {
            outgoing.clear();
            if let Some(ids) = plan.send.get(&peer) {
                outgoing.extend(ids.iter().map(|&g| x[g]));
            }
            let incoming: Vec<f64> = comm.exchange(peer, Tag::HALO, &outgoing)?;
            let wanted = plan.recv.get(&peer).map(Vec::as_slice).unwrap_or(&[]);
            if incoming.len() != wanted.len() {
                return Err(SpmvError::comm(
                    comm.rank(),
                    format!(
                        "worker {peer} sent {} halo values, expected {}",
                        incoming.len(),
                        wanted.len()
                    ),
                ));
            }
            for (&g, v) in wanted.iter().zip(incoming) {
                x[g] = v;
            }
            volume.sent += outgoing.len();
            volume.received += wanted.len();
        }
        Ok(volume)
    }
}
