//! Admin API.
//!
//! Served on its own listener, bearer-token protected:
//! - `GET  /admin/status`
//! - `GET  /admin/balancers`
//! - `POST /admin/balancers/{balancer}/workers/{index}/disable`
//! - `POST /admin/balancers/{balancer}/workers/{index}/enable`

pub mod auth;
pub mod handlers;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use self::auth::admin_auth_middleware;
use self::handlers::*;
use crate::http::server::{wait_for, AppState};

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/admin/status", get(get_status))
        .route("/admin/balancers", get(get_balancers))
        .route(
            "/admin/balancers/{balancer}/workers/{index}/disable",
            post(disable_worker),
        )
        .route(
            "/admin/balancers/{balancer}/workers/{index}/enable",
            post(enable_worker),
        )
        .layer(middleware::from_fn_with_state(state.clone(), admin_auth_middleware))
        .with_state(state)
}

/// Serve the admin API until `shutdown` fires.
pub async fn run_admin(
    state: AppState,
    listener: TcpListener,
    shutdown: broadcast::Receiver<()>,
) -> Result<(), std::io::Error> {
    tracing::info!(address = %listener.local_addr()?, "Admin API starting");
    axum::serve(listener, setup_admin_router(state))
        .with_graceful_shutdown(wait_for(shutdown))
        .await
}
