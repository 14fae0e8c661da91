//! Reverse proxy with a tiered least-busy balancer.
//!
//! Requests are routed to a named balancer, which picks the worker with
//! the fewest active requests from the highest-priority tier that has a
//! usable one. Workers that fail are taken out of rotation and probed with
//! HTTP HEAD once their retry interval has passed.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod load_balancer;
pub mod observability;
pub mod routing;

pub use config::schema::ProxyConfig;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::{BalancerPolicy, SelectContext, Worker, WorkerPool};
