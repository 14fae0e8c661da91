//! Least-busy candidate search within one tier.
//!
//! One call scans the whole pool once for a given `lbset` and standby phase.
//! Matching workers that are unusable are handed to the failure gate first;
//! the ones still unusable are skipped and add no weight.
//!
//! Every usable worker accrues its `lbfactor` into its own `lbstatus` and
//! into the round's `total_factor`. The candidate is the worker with the
//! fewest active requests; equal `busy` goes to the higher `lbstatus`, and
//! an exact tie stays with the worker seen first.

use std::sync::Arc;

use crate::health::gate::FailureGate;
use crate::health::probe::Prober;
use crate::load_balancer::pool::WorkerPool;
use crate::load_balancer::worker::Worker;

/// Result of scanning one tier in one standby phase.
#[derive(Debug, Default)]
pub struct TierScan {
    pub candidate: Option<Arc<Worker>>,
    /// Sum of the weights accrued by every usable worker of the scan.
    pub total_factor: i64,
    /// Highest `lbset` in the pool; only tracked on non-standby scans.
    pub max_lbset: u32,
}

/// `busy` and `lbstatus` of the current best worker, as seen when it was compared.
#[derive(Debug, Clone, Copy)]
struct Standing {
    busy: usize,
    lbstatus: i64,
}

impl Standing {
    fn beats(&self, best: &Standing) -> bool {
        self.busy < best.busy || (self.busy == best.busy && self.lbstatus > best.lbstatus)
    }
}

pub async fn scan_tier<P: Prober>(
    pool: &WorkerPool,
    lbset: u32,
    standby: bool,
    gate: &FailureGate<P>,
) -> TierScan {
    let mut scan = TierScan::default();
    let mut best: Option<Standing> = None;

    for worker in &pool.workers {
        if !standby {
            scan.max_lbset = scan.max_lbset.max(worker.lbset);
        }
        if worker.lbset != lbset || worker.standby != standby {
            continue;
        }

        if !worker.is_usable() && !gate.maybe_recover(worker).await {
            continue;
        }

        let lbstatus = worker.accrue();
        scan.total_factor += i64::from(worker.lbfactor);
        let standing = Standing {
            busy: worker.busy(),
            lbstatus,
        };

        tracing::debug!(
            balancer = %pool.name,
            worker = %worker.url,
            lbset,
            standby,
            busy = standing.busy,
            lbstatus = standing.lbstatus,
            "Comparing worker"
        );

        let take = match &best {
            None => true,
            Some(current) => standing.beats(current),
        };
        if take {
            best = Some(standing);
            scan.candidate = Some(worker.clone());
        }
    }

    scan
}
