//! HTTP server setup and request forwarding.
//!
//! # Responsibilities
//! - Create the Axum router catching every path
//! - Wire up middleware (request ID, tracing)
//! - Match a route, ask the balancer for a worker, forward the request
//! - Keep the worker counted as busy while its response streams
//! - Mark workers in error when they refuse connections
//! - Swap in reloaded configuration without dropping traffic

use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwap;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderValue, Request, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::any,
    Router,
};
use futures_util::StreamExt;
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use url::{Position, Url};

use crate::config::ProxyConfig;
use crate::health::probe::HeadProbe;
use crate::http::request::{request_id, MakeRequestUuid, X_REQUEST_ID};
use crate::load_balancer::{BalancerPolicy, BalancerRegistry, SelectContext};
use crate::observability::metrics;
use crate::routing::Router as ProxyRouter;

/// Everything built from one configuration. Replaced as a whole on reload.
pub struct ServerState {
    pub config: ProxyConfig,
    pub router: ProxyRouter,
    pub balancers: BalancerRegistry,
    pub policy: BalancerPolicy<HeadProbe>,
    pub client: Client<HttpConnector, Body>,
}

impl ServerState {
    pub fn new(config: ProxyConfig) -> Self {
        let router = ProxyRouter::from_config(&config.routes);
        let balancers = BalancerRegistry::new(&config.balancers);
        let policy = BalancerPolicy::new(HeadProbe::new(&config.probe));

        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(Some(Duration::from_secs(config.timeouts.connect_secs)));
        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            config,
            router,
            balancers,
            policy,
            client,
        }
    }
}

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub inner: Arc<ArcSwap<ServerState>>,
}

impl AppState {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(ServerState::new(config))),
        }
    }

    /// Rebuild routes and balancers from `config`. In-flight requests keep
    /// the state they started with.
    pub fn reload(&self, config: ProxyConfig) {
        let balancers = config.balancers.len();
        let routes = config.routes.len();
        self.inner.store(Arc::new(ServerState::new(config)));
        tracing::info!(balancers, routes, "Configuration reloaded");
    }
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    state: AppState,
}

impl HttpServer {
    pub fn new(config: ProxyConfig) -> Self {
        Self {
            state: AppState::new(config),
        }
    }

    /// Shared state, for the admin API.
    pub fn state(&self) -> AppState {
        self.state.clone()
    }

    /// Build the Axum router with all middleware layers.
    pub fn router(&self) -> Router {
        Router::new()
            .route("/", any(proxy_handler))
            .route("/{*path}", any(proxy_handler))
            .with_state(self.state.clone())
            .layer(
                ServiceBuilder::new()
                    .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
                    .layer(TraceLayer::new_for_http())
                    .layer(PropagateRequestIdLayer::new(X_REQUEST_ID)),
            )
    }

    /// Serve on `listener` until `shutdown` fires, applying every config
    /// that arrives on `config_updates`.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        tokio::spawn(reload_loop(
            self.state.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));

        axum::serve(listener, self.router())
            .with_graceful_shutdown(wait_for(shutdown))
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn reload_loop(
    state: AppState,
    mut config_updates: mpsc::UnboundedReceiver<ProxyConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = config_updates.recv() => match update {
                Some(config) => state.reload(config),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

pub(crate) async fn wait_for(mut shutdown: broadcast::Receiver<()>) {
    let _ = shutdown.recv().await;
    tracing::info!("Shutdown signal received");
}

/// Main proxy handler.
async fn proxy_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start = Instant::now();
    let inner = state.inner.load_full();
    let request_id = request_id(&request);
    let method = request.method().to_string();

    let Some(route) = inner.router.match_request(&request) else {
        tracing::warn!(request_id = %request_id, path = %request.uri().path(), "No route matched");
        metrics::record_request(&method, 404, "none", start);
        return (StatusCode::NOT_FOUND, "No matching route found").into_response();
    };

    let Some(pool) = inner.balancers.get(&route.balancer) else {
        tracing::error!(request_id = %request_id, balancer = %route.balancer, "Route points at unknown balancer");
        metrics::record_request(&method, 503, "none", start);
        return (StatusCode::SERVICE_UNAVAILABLE, "No usable worker").into_response();
    };

    let ctx = SelectContext::new(&request_id);
    let Some(worker) = inner.policy.select(&pool, &ctx).await else {
        metrics::record_request(&method, 503, "none", start);
        return (StatusCode::SERVICE_UNAVAILABLE, "No usable worker").into_response();
    };

    let guard = worker.acquire();
    let worker_url = guard.url.to_string();

    let (mut parts, body) = request.into_parts();
    parts.uri = match upstream_uri(&guard.url, &parts.uri) {
        Ok(uri) => uri,
        Err(e) => {
            tracing::error!(request_id = %request_id, worker = %worker_url, error = %e, "Cannot build upstream uri");
            metrics::record_request(&method, 500, &worker_url, start);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Invalid upstream uri").into_response();
        }
    };
    if let Ok(host) = HeaderValue::from_str(&guard.url[Position::BeforeHost..Position::AfterPort]) {
        parts.headers.insert(header::HOST, host);
    }

    let timeout = Duration::from_secs(inner.config.timeouts.request_secs);
    let upstream = inner.client.request(Request::from_parts(parts, body));

    match tokio::time::timeout(timeout, upstream).await {
        Ok(Ok(response)) => {
            let status = response.status();
            metrics::record_request(&method, status.as_u16(), &worker_url, start);

            // The guard rides along with the body so the worker stays busy
            // until the client has the whole response.
            let (parts, body) = response.into_parts();
            let stream = Body::new(body).into_data_stream().map(move |chunk| {
                let _busy = &guard;
                chunk
            });
            Response::from_parts(parts, Body::from_stream(stream))
        }
        Ok(Err(e)) => {
            if e.is_connect() {
                guard.mark_in_error();
                tracing::warn!(request_id = %request_id, worker = %worker_url, error = %e, "Worker refused connection, marked in error");
            } else {
                tracing::error!(request_id = %request_id, worker = %worker_url, error = %e, "Upstream error");
            }
            metrics::record_request(&method, 502, &worker_url, start);
            (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
        }
        Err(_) => {
            tracing::warn!(request_id = %request_id, worker = %worker_url, timeout = ?timeout, "Upstream timed out");
            metrics::record_request(&method, 504, &worker_url, start);
            (StatusCode::GATEWAY_TIMEOUT, "Upstream timed out").into_response()
        }
    }
}

/// Worker base URL joined with the request's path and query.
fn upstream_uri(base: &Url, original: &Uri) -> Result<Uri, axum::http::uri::InvalidUri> {
    let prefix = base.path().trim_end_matches('/');
    let path_and_query = original
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    format!("{}{}{}", &base[..Position::BeforePath], prefix, path_and_query).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_upstream_uri_root_base() {
        let base = Url::parse("http://10.0.0.1:8080/").unwrap();
        let uri: Uri = "/api/users?page=2".parse().unwrap();
        assert_eq!(
            upstream_uri(&base, &uri).unwrap().to_string(),
            "http://10.0.0.1:8080/api/users?page=2"
        );
    }

    #[test]
    fn test_upstream_uri_with_base_path() {
        let base = Url::parse("http://app.internal/v2/").unwrap();
        let uri: Uri = "http://proxy.local/items".parse().unwrap();
        assert_eq!(
            upstream_uri(&base, &uri).unwrap().to_string(),
            "http://app.internal/v2/items"
        );
    }
}
