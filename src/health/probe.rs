//! Active HEAD probing of errored workers.
//!
//! # Responsibilities
//! - Send one HTTP HEAD to a worker's base URL
//! - Bound both connect and total time by the probe timeout
//! - Classify the answer with the configured `ProbeMode`
//!
//! Transport failures are ordinary results here, not errors: a dead
//! backend is exactly what the probe exists to notice.

use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Method, Request, Uri};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use serde::{Deserialize, Serialize};

use crate::config::ProbeConfig;
use crate::load_balancer::worker::Worker;

/// Probe timeout used when none is configured.
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

const PROBE_USER_AGENT: &str = "busyness-proxy-probe";

static DEFAULT_TIMEOUT_WARNED: AtomicBool = AtomicBool::new(false);

/// Which status codes count as a healthy probe answer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeMode {
    /// Any status in `[100, 500)`.
    #[default]
    Lenient,
    /// Only `200 OK`.
    Strict,
}

impl ProbeMode {
    pub fn is_healthy(self, code: u16) -> bool {
        match self {
            ProbeMode::Lenient => (100..500).contains(&code),
            ProbeMode::Strict => code == 200,
        }
    }
}

/// Why a probe got no status code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProbeError {
    #[error("invalid probe uri: {0}")]
    InvalidUri(String),
    #[error("connect failed: {0}")]
    Connect(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeResult {
    pub status: Option<u16>,
    pub error: Option<ProbeError>,
    pub healthy: bool,
}

impl ProbeResult {
    pub fn from_status(code: u16, mode: ProbeMode) -> Self {
        Self {
            status: Some(code),
            error: None,
            healthy: mode.is_healthy(code),
        }
    }

    pub fn failed(error: ProbeError) -> Self {
        Self {
            status: None,
            error: Some(error),
            healthy: false,
        }
    }
}

/// Something that can check whether a worker answers again.
pub trait Prober: Send + Sync {
    fn probe(&self, worker: &Worker) -> impl Future<Output = ProbeResult> + Send;
}

/// HTTP HEAD prober.
#[derive(Debug, Clone)]
pub struct HeadProbe {
    client: Client<HttpConnector, Body>,
    timeout: Duration,
    mode: ProbeMode,
}

impl HeadProbe {
    pub fn new(config: &ProbeConfig) -> Self {
        let timeout = resolve_timeout(config.timeout_secs);

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(timeout));

        // Fresh connection per probe; a pooled socket would say nothing about the backend.
        let client = Client::builder(TokioExecutor::new())
            .pool_max_idle_per_host(0)
            .build(connector);

        tracing::info!(timeout = ?timeout, mode = ?config.mode, "Health probe configured");

        Self {
            client,
            timeout,
            mode: config.mode,
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn mode(&self) -> ProbeMode {
        self.mode
    }

    async fn head(&self, worker: &Worker) -> ProbeResult {
        let uri: Uri = match worker.url.as_str().parse() {
            Ok(uri) => uri,
            Err(e) => return ProbeResult::failed(ProbeError::InvalidUri(e.to_string())),
        };

        let request = match Request::builder()
            .method(Method::HEAD)
            .uri(uri)
            .header(header::USER_AGENT, PROBE_USER_AGENT)
            .body(Body::empty())
        {
            Ok(req) => req,
            Err(e) => return ProbeResult::failed(ProbeError::InvalidUri(e.to_string())),
        };

        // Only the status line matters; the response is dropped unread.
        match tokio::time::timeout(self.timeout, self.client.request(request)).await {
            Ok(Ok(response)) => ProbeResult::from_status(response.status().as_u16(), self.mode),
            Ok(Err(e)) if e.is_connect() => ProbeResult::failed(ProbeError::Connect(e.to_string())),
            Ok(Err(e)) => ProbeResult::failed(ProbeError::Request(e.to_string())),
            Err(_) => ProbeResult::failed(ProbeError::Timeout(self.timeout)),
        }
    }
}

impl Prober for HeadProbe {
    fn probe(&self, worker: &Worker) -> impl Future<Output = ProbeResult> + Send {
        async move {
            let result = self.head(worker).await;
            tracing::debug!(
                worker = %worker.url,
                status = ?result.status,
                error = ?result.error,
                healthy = result.healthy,
                "Checked backend"
            );
            result
        }
    }
}

fn resolve_timeout(configured: Option<u64>) -> Duration {
    match configured {
        Some(secs) if secs > 0 => Duration::from_secs(secs),
        other => {
            warn_default_timeout(&DEFAULT_TIMEOUT_WARNED, other);
            Duration::from_secs(DEFAULT_PROBE_TIMEOUT_SECS)
        }
    }
}

/// Warn about the default timeout unless `warned` is already set.
/// Returns whether this call emitted the warning.
fn warn_default_timeout(warned: &AtomicBool, configured: Option<u64>) -> bool {
    if warned.swap(true, Ordering::Relaxed) {
        return false;
    }
    tracing::warn!(
        ?configured,
        default_secs = DEFAULT_PROBE_TIMEOUT_SECS,
        "Probe timeout not configured, using default"
    );
    true
}
