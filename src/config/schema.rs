//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::health::probe::ProbeMode;

/// Root configuration for the proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream forwarding timeouts.
    pub timeouts: TimeoutConfig,

    /// Recovery probe settings.
    pub probe: ProbeConfig,

    /// Balancers and their workers.
    pub balancers: Vec<BalancerConfig>,

    /// Route definitions mapping requests to balancers.
    pub routes: Vec<RouteConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Admin API settings.
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Timeout configuration for forwarded requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            request_secs: 30,
        }
    }
}

/// Recovery probe configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// HEAD request timeout in seconds, applied to connect and total time.
    /// Unset (or 0) falls back to 5 seconds.
    pub timeout_secs: Option<u64>,

    /// Which status codes count as healthy.
    pub mode: ProbeMode,
}

/// A named pool of workers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct BalancerConfig {
    /// Balancer name, referenced by routes.
    pub name: String,

    /// Workers in declaration order.
    #[serde(default)]
    pub workers: Vec<WorkerConfig>,
}

/// Backend worker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WorkerConfig {
    /// Base URL (e.g., "http://10.0.0.5:8080").
    pub url: String,

    /// Priority tier; 0 is tried first.
    pub lbset: u32,

    /// Fairness weight (1-100).
    pub lbfactor: u32,

    /// Hot standby: only used when the regular workers of its tier are unusable.
    pub standby: bool,

    /// Seconds to wait after an error before probing the worker again.
    pub retry_secs: u64,

    /// Start out of rotation.
    pub disabled: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            lbset: 0,
            lbfactor: 1,
            standby: false,
            retry_secs: 60,
            disabled: false,
        }
    }
}

/// Route configuration mapping requests to a balancer.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RouteConfig {
    /// Route identifier for logging/metrics.
    pub name: String,

    /// Host header to match (exact match).
    pub host: Option<String>,

    /// Path prefix to match.
    pub path_prefix: Option<String>,

    /// Balancer to forward to.
    pub balancer: String,

    /// Route priority (higher = checked first).
    #[serde(default)]
    pub priority: u32,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
