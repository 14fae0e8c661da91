//! Tiered least-busy balancing policy.
//!
//! # Search Order
//! ```text
//! lbset 0, regular → lbset 0, standby → lbset 1, regular → lbset 1, standby → ...
//! ```
//! The first scan that yields a candidate ends the search. The highest
//! `lbset` seen during the regular scans bounds how far it goes.
//!
//! The winner then spends the weight the whole cohort accrued during its
//! scan, so a worker that keeps winning falls behind the ones that kept
//! accruing while losing.

use std::sync::Arc;

use crate::health::gate::FailureGate;
use crate::health::probe::Prober;
use crate::load_balancer::pool::WorkerPool;
use crate::load_balancer::selector::scan_tier;
use crate::load_balancer::worker::Worker;
use crate::observability::metrics;

/// Per-request information passed to the balancer.
#[derive(Debug, Clone, Copy, Default)]
pub struct SelectContext<'a> {
    pub request_id: &'a str,
}

impl<'a> SelectContext<'a> {
    pub fn new(request_id: &'a str) -> Self {
        Self { request_id }
    }
}

/// Picks a worker for each request.
#[derive(Debug)]
pub struct BalancerPolicy<P> {
    gate: FailureGate<P>,
}

impl<P: Prober> BalancerPolicy<P> {
    pub fn new(prober: P) -> Self {
        Self {
            gate: FailureGate::new(prober),
        }
    }

    pub fn gate(&self) -> &FailureGate<P> {
        &self.gate
    }

    /// Select the least busy usable worker of the highest-priority tier
    /// that has one. `None` means no worker can take the request.
    pub async fn select(&self, pool: &WorkerPool, ctx: &SelectContext<'_>) -> Option<Arc<Worker>> {
        tracing::debug!(
            request_id = %ctx.request_id,
            balancer = %pool.name,
            workers = pool.len(),
            "Selecting least busy worker"
        );

        let mut lbset = 0;
        let mut max_lbset = 0;
        let mut found = None;

        while found.is_none() {
            for standby in [false, true] {
                let scan = scan_tier(pool, lbset, standby, &self.gate).await;
                max_lbset = max_lbset.max(scan.max_lbset);
                if let Some(candidate) = scan.candidate {
                    found = Some((candidate, scan.total_factor));
                    break;
                }
            }
            if lbset >= max_lbset {
                break;
            }
            lbset += 1;
        }

        let Some((worker, total_factor)) = found else {
            tracing::warn!(
                request_id = %ctx.request_id,
                balancer = %pool.name,
                "No usable worker in any lbset"
            );
            metrics::record_no_candidate(&pool.name);
            return None;
        };

        let lbstatus = worker.spend(total_factor);
        tracing::debug!(
            request_id = %ctx.request_id,
            balancer = %pool.name,
            worker = %worker.url,
            lbset = worker.lbset,
            busy = worker.busy(),
            lbstatus,
            "Selected worker"
        );
        metrics::record_selection(&pool.name, worker.url.as_str());

        Some(worker)
    }
}
