//! Failure gate: when may an errored worker come back?
//!
//! # State Transitions
//! ```text
//! usable            → usable      (no probe, O(1))
//! in error, waiting → in error    (retry interval not yet passed, no probe)
//! in error, due     → probe → healthy   → usable, retries += 1
//!                           → unhealthy → in error
//! ```
//!
//! Every probe restarts the worker's error clock, whatever its outcome.
//! Concurrent probes of the same worker are allowed; each one simply writes
//! what it observed.

use crate::health::probe::Prober;
use crate::load_balancer::worker::Worker;
use crate::observability::metrics;

#[derive(Debug)]
pub struct FailureGate<P> {
    prober: P,
}

impl<P: Prober> FailureGate<P> {
    pub fn new(prober: P) -> Self {
        Self { prober }
    }

    pub fn prober(&self) -> &P {
        &self.prober
    }

    /// Decide whether `worker` can take traffic now, probing it if it is
    /// in error and its retry interval has passed.
    pub async fn maybe_recover(&self, worker: &Worker) -> bool {
        if !worker.in_error() {
            return worker.is_usable();
        }

        tracing::debug!(
            worker = %worker.hostname,
            since_error = ?worker.since_error(),
            retry = ?worker.retry,
            "Retrying worker"
        );

        if !worker.retry_elapsed() {
            return false;
        }

        let result = self.prober.probe(worker).await;
        worker.stamp_error_time();
        metrics::record_probe(worker.url.as_str(), result.healthy);

        if result.healthy {
            worker.recover();
            metrics::record_recovery(worker.url.as_str());
            tracing::info!(
                worker = %worker.url,
                status = ?result.status,
                retries = worker.retries(),
                "Worker recovered"
            );
            worker.is_usable()
        } else {
            tracing::warn!(
                worker = %worker.url,
                status = ?result.status,
                error = ?result.error,
                "Worker still failing"
            );
            false
        }
    }
}
