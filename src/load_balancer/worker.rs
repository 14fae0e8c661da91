//! Worker abstraction.
//!
//! # Responsibilities
//! - Represent a single backend server and its balancer settings
//! - Track active requests (`busy`) for least-busy selection
//! - Track fairness credit (`lbstatus`)
//! - Track error state, last error time and recovery count
//!
//! # Design Decisions
//! - Every runtime field is an atomic (or a small lock for the timestamp),
//!   so concurrent selections never lose updates
//! - `busy` is only changed through `BusyGuard`, which keeps it non-negative

use std::ops::Deref;
use std::sync::atomic::{AtomicI64, AtomicU64, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use url::Url;

use crate::config::WorkerConfig;
use crate::observability::metrics;

/// Status bit: the worker failed and is waiting for a recovery probe.
pub const IN_ERROR: u8 = 0x01;
/// Status bit: the worker was taken out of rotation by an operator.
pub const DISABLED: u8 = 0x02;

const NOT_USABLE: u8 = IN_ERROR | DISABLED;

/// Default retry interval before an errored worker is probed again.
pub const DEFAULT_RETRY: Duration = Duration::from_secs(60);

/// Error type for worker construction.
#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("invalid worker url '{url}': {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("worker url '{0}' has no host")]
    MissingHost(String),
    #[error("worker url '{0}' is not plain http")]
    UnsupportedScheme(String),
}

/// A single backend server.
#[derive(Debug)]
pub struct Worker {
    /// Base URL, as configured.
    pub url: Url,
    /// Host part of the base URL.
    pub hostname: String,
    /// Priority tier; lower sets are tried first.
    pub lbset: u32,
    /// Fairness weight.
    pub lbfactor: u32,
    /// Only used once every non-standby worker of the tier is unusable.
    pub standby: bool,
    /// Minimum time between the last error and the next recovery probe.
    pub retry: Duration,

    status: AtomicU8,
    busy: AtomicUsize,
    lbstatus: AtomicI64,
    retries: AtomicU64,
    error_time: RwLock<Option<Instant>>,
}

impl Worker {
    /// Create a worker with default balancer settings.
    pub fn new(url: &str) -> Result<Self, WorkerError> {
        let parsed = Url::parse(url).map_err(|source| WorkerError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;
        if parsed.scheme() != "http" {
            return Err(WorkerError::UnsupportedScheme(url.to_string()));
        }
        let hostname = parsed
            .host_str()
            .ok_or_else(|| WorkerError::MissingHost(url.to_string()))?
            .to_string();

        Ok(Self {
            url: parsed,
            hostname,
            lbset: 0,
            lbfactor: 1,
            standby: false,
            retry: DEFAULT_RETRY,
            status: AtomicU8::new(0),
            busy: AtomicUsize::new(0),
            lbstatus: AtomicI64::new(0),
            retries: AtomicU64::new(0),
            error_time: RwLock::new(None),
        })
    }

    /// Build a worker from its configuration entry.
    pub fn from_config(config: &WorkerConfig) -> Result<Self, WorkerError> {
        let lbfactor = if config.lbfactor == 0 {
            tracing::warn!(worker = %config.url, "lbfactor 0 is not allowed, using 1");
            1
        } else {
            config.lbfactor
        };

        let worker = Self::new(&config.url)?
            .with_lbset(config.lbset)
            .with_lbfactor(lbfactor)
            .with_standby(config.standby)
            .with_retry(Duration::from_secs(config.retry_secs));

        if config.disabled {
            worker.disable();
        }
        Ok(worker)
    }

    pub fn with_lbset(mut self, lbset: u32) -> Self {
        self.lbset = lbset;
        self
    }

    pub fn with_lbfactor(mut self, lbfactor: u32) -> Self {
        self.lbfactor = lbfactor.max(1);
        self
    }

    pub fn with_standby(mut self, standby: bool) -> Self {
        self.standby = standby;
        self
    }

    pub fn with_retry(mut self, retry: Duration) -> Self {
        self.retry = retry;
        self
    }

    // --- Status ---

    /// True if no not-usable bit is set.
    pub fn is_usable(&self) -> bool {
        self.status.load(Ordering::Acquire) & NOT_USABLE == 0
    }

    pub fn in_error(&self) -> bool {
        self.status.load(Ordering::Acquire) & IN_ERROR != 0
    }

    pub fn is_disabled(&self) -> bool {
        self.status.load(Ordering::Acquire) & DISABLED != 0
    }

    /// Mark the worker as failed and restart its retry clock.
    pub fn mark_in_error(&self) {
        self.status.fetch_or(IN_ERROR, Ordering::AcqRel);
        self.stamp_error_time();
    }

    /// Clear the error bit after a successful probe and count the recovery.
    pub fn recover(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
        self.status.fetch_and(!IN_ERROR, Ordering::AcqRel);
    }

    pub fn disable(&self) {
        self.status.fetch_or(DISABLED, Ordering::AcqRel);
    }

    pub fn enable(&self) {
        self.status.fetch_and(!DISABLED, Ordering::AcqRel);
    }

    // --- Error clock ---

    /// Set `error_time` to now. Never moves the clock backwards.
    pub fn stamp_error_time(&self) {
        let now = Instant::now();
        if let Ok(mut guard) = self.error_time.write() {
            match *guard {
                Some(prev) if prev > now => {}
                _ => *guard = Some(now),
            }
        }
    }

    /// Time since the last error or probe. `None` if the worker never failed.
    pub fn since_error(&self) -> Option<Duration> {
        self.error_time
            .read()
            .ok()
            .and_then(|guard| guard.map(|t| t.elapsed()))
    }

    /// Retry interval has passed since the last error (or there was none).
    pub fn retry_elapsed(&self) -> bool {
        match self.since_error() {
            Some(elapsed) => elapsed > self.retry,
            None => true,
        }
    }

    // --- Counters ---

    /// Number of requests currently routed to this worker.
    pub fn busy(&self) -> usize {
        self.busy.load(Ordering::Relaxed)
    }

    pub fn lbstatus(&self) -> i64 {
        self.lbstatus.load(Ordering::Relaxed)
    }

    /// Add this worker's weight to its credit, returning the new credit.
    pub fn accrue(&self) -> i64 {
        let factor = i64::from(self.lbfactor);
        self.lbstatus.fetch_add(factor, Ordering::AcqRel) + factor
    }

    /// Spend `total` credit after winning a selection, returning the new credit.
    pub fn spend(&self, total: i64) -> i64 {
        self.lbstatus.fetch_sub(total, Ordering::AcqRel) - total
    }

    /// Successful recoveries since the worker was created.
    pub fn retries(&self) -> u64 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Count a request against this worker until the guard is dropped.
    pub fn acquire(self: &Arc<Self>) -> BusyGuard {
        let busy = self.busy.fetch_add(1, Ordering::AcqRel) + 1;
        metrics::record_busy(self.url.as_str(), busy);
        BusyGuard {
            worker: self.clone(),
        }
    }

    /// Move `error_time` into the past.
    #[cfg(test)]
    pub(crate) fn backdate_error(&self, ago: Duration) {
        if let Ok(mut guard) = self.error_time.write() {
            *guard = Instant::now().checked_sub(ago);
        }
    }
}

/// A RAII guard that keeps a request counted in the worker's `busy`.
#[derive(Debug)]
pub struct BusyGuard {
    pub worker: Arc<Worker>,
}

impl Deref for BusyGuard {
    type Target = Worker;
    fn deref(&self) -> &Self::Target {
        &self.worker
    }
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        let busy = self.worker.busy.fetch_sub(1, Ordering::AcqRel) - 1;
        metrics::record_busy(self.worker.url.as_str(), busy);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ::metrics::{
        Counter, Gauge, GaugeFn, Histogram, Key, KeyName, Metadata, Recorder, SharedString, Unit,
    };
    use std::sync::Mutex;

    #[test]
    fn test_new_parses_hostname() {
        let w = Worker::new("http://app-1.internal:8080/").unwrap();
        assert_eq!(w.hostname, "app-1.internal");
        assert_eq!(w.lbfactor, 1);
        assert_eq!(w.retry, DEFAULT_RETRY);
        assert!(w.is_usable());
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            Worker::new("not a url"),
            Err(WorkerError::InvalidUrl { .. })
        ));
        assert!(matches!(
            Worker::new("https://app-1.internal"),
            Err(WorkerError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn test_busy_guard() {
        let w = Arc::new(Worker::new("http://127.0.0.1:8080").unwrap());
        {
            let _g1 = w.acquire();
            let _g2 = w.acquire();
            assert_eq!(w.busy(), 2);
        }
        assert_eq!(w.busy(), 0);
    }

    /// Records every value written to any gauge.
    #[derive(Debug, Default)]
    struct LastGauge(Mutex<Vec<f64>>);

    impl GaugeFn for LastGauge {
        fn increment(&self, _: f64) {}
        fn decrement(&self, _: f64) {}
        fn set(&self, value: f64) {
            self.0.lock().unwrap().push(value);
        }
    }

    struct GaugeRecorder(Arc<LastGauge>);

    impl Recorder for GaugeRecorder {
        fn describe_counter(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_gauge(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}
        fn describe_histogram(&self, _: KeyName, _: Option<Unit>, _: SharedString) {}

        fn register_counter(&self, _: &Key, _: &Metadata<'_>) -> Counter {
            Counter::noop()
        }

        fn register_gauge(&self, _: &Key, _: &Metadata<'_>) -> Gauge {
            Gauge::from_arc(self.0.clone())
        }

        fn register_histogram(&self, _: &Key, _: &Metadata<'_>) -> Histogram {
            Histogram::noop()
        }
    }

    #[test]
    fn test_busy_gauge_follows_guards() {
        let gauge = Arc::new(LastGauge::default());
        let recorder = GaugeRecorder(gauge.clone());
        let w = Arc::new(Worker::new("http://127.0.0.1:8080").unwrap());

        ::metrics::with_local_recorder(&recorder, || {
            let g1 = w.acquire();
            let g2 = w.acquire();
            drop(g1);
            drop(g2);
        });

        assert_eq!(*gauge.0.lock().unwrap(), vec![1.0, 2.0, 1.0, 0.0]);
    }

    #[test]
    fn test_error_and_recover() {
        let w = Worker::new("http://127.0.0.1:8080").unwrap();
        assert!(w.since_error().is_none());

        w.mark_in_error();
        assert!(w.in_error());
        assert!(!w.is_usable());
        assert!(w.since_error().is_some());

        w.recover();
        assert!(!w.in_error());
        assert!(w.is_usable());
        assert_eq!(w.retries(), 1);
    }

    #[test]
    fn test_disabled_is_not_usable() {
        let w = Worker::new("http://127.0.0.1:8080").unwrap();
        w.disable();
        assert!(!w.is_usable());
        assert!(!w.in_error());

        // recovering from an error keeps the operator's flag
        w.mark_in_error();
        w.recover();
        assert!(!w.is_usable());

        w.enable();
        assert!(w.is_usable());
    }

    #[test]
    fn test_accrue_and_spend() {
        let w = Worker::new("http://127.0.0.1:8080").unwrap().with_lbfactor(3);
        assert_eq!(w.accrue(), 3);
        assert_eq!(w.accrue(), 6);
        assert_eq!(w.spend(10), -4);
        assert_eq!(w.lbstatus(), -4);
    }
}
