//! Route lookup.
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - Routes sorted by priority once; first match wins
//! - Explicit no-match rather than silent default

use axum::http::Request;

use crate::config::RouteConfig;
use crate::routing::matcher::Matcher;

/// A compiled route.
#[derive(Debug, Clone)]
pub struct Route {
    pub name: String,
    pub balancer: String,
    pub priority: u32,
    matchers: Vec<Matcher>,
}

impl Route {
    pub fn from_config(config: &RouteConfig) -> Self {
        let mut matchers = Vec::new();
        if let Some(host) = &config.host {
            matchers.push(Matcher::host(host.as_str()));
        }
        if let Some(prefix) = &config.path_prefix {
            matchers.push(Matcher::path_prefix(prefix.as_str()));
        }
        Self {
            name: config.name.clone(),
            balancer: config.balancer.clone(),
            priority: config.priority,
            matchers,
        }
    }

    pub fn matches<B>(&self, req: &Request<B>) -> bool {
        self.matchers.iter().all(|m| m.matches(req))
    }
}

/// Ordered route table.
#[derive(Debug, Default)]
pub struct Router {
    routes: Vec<Route>,
}

impl Router {
    pub fn from_config(configs: &[RouteConfig]) -> Self {
        let mut routes: Vec<Route> = configs.iter().map(Route::from_config).collect();
        // stable sort keeps declaration order among equal priorities
        routes.sort_by(|a, b| b.priority.cmp(&a.priority));
        Self { routes }
    }

    pub fn match_request<B>(&self, req: &Request<B>) -> Option<&Route> {
        self.routes.iter().find(|r| r.matches(req))
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}
