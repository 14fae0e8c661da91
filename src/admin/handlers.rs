use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::http::server::AppState;
use crate::load_balancer::{Worker, WorkerPool};

#[derive(Debug, Serialize, Deserialize)]
pub struct SystemStatus {
    pub version: String,
    pub status: String,
    pub probe_mode: String,
    pub probe_timeout_secs: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct WorkerStatus {
    pub index: usize,
    pub url: String,
    pub lbset: u32,
    pub lbfactor: u32,
    pub standby: bool,
    pub busy: usize,
    pub lbstatus: i64,
    pub in_error: bool,
    pub disabled: bool,
    pub retries: u64,
    pub secs_since_error: Option<u64>,
}

impl WorkerStatus {
    fn from_worker(index: usize, worker: &Worker) -> Self {
        Self {
            index,
            url: worker.url.to_string(),
            lbset: worker.lbset,
            lbfactor: worker.lbfactor,
            standby: worker.standby,
            busy: worker.busy(),
            lbstatus: worker.lbstatus(),
            in_error: worker.in_error(),
            disabled: worker.is_disabled(),
            retries: worker.retries(),
            secs_since_error: worker.since_error().map(|d| d.as_secs()),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalancerStatus {
    pub name: String,
    pub workers: Vec<WorkerStatus>,
}

impl BalancerStatus {
    fn from_pool(pool: &WorkerPool) -> Self {
        Self {
            name: pool.name.clone(),
            workers: pool
                .workers
                .iter()
                .enumerate()
                .map(|(i, w)| WorkerStatus::from_worker(i, w))
                .collect(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AdminError {
    #[error("balancer '{0}' not found")]
    UnknownBalancer(String),
    #[error("balancer '{0}' has no worker #{1}")]
    UnknownWorker(String, usize),
}

impl IntoResponse for AdminError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.to_string() }));
        (StatusCode::NOT_FOUND, body).into_response()
    }
}

pub async fn get_status(State(state): State<AppState>) -> Json<SystemStatus> {
    let inner = state.inner.load();
    let probe = inner.policy.gate().prober();
    Json(SystemStatus {
        version: env!("CARGO_PKG_VERSION").to_string(),
        status: "operational".to_string(),
        probe_mode: format!("{:?}", probe.mode()).to_lowercase(),
        probe_timeout_secs: probe.timeout().as_secs(),
    })
}

pub async fn get_balancers(State(state): State<AppState>) -> Json<Vec<BalancerStatus>> {
    let inner = state.inner.load();
    let statuses = inner
        .balancers
        .pools()
        .iter()
        .map(|pool| BalancerStatus::from_pool(pool))
        .collect();
    Json(statuses)
}

pub async fn disable_worker(
    State(state): State<AppState>,
    Path((balancer, index)): Path<(String, usize)>,
) -> Result<Json<WorkerStatus>, AdminError> {
    set_disabled(&state, &balancer, index, true)
}

pub async fn enable_worker(
    State(state): State<AppState>,
    Path((balancer, index)): Path<(String, usize)>,
) -> Result<Json<WorkerStatus>, AdminError> {
    set_disabled(&state, &balancer, index, false)
}

fn set_disabled(
    state: &AppState,
    balancer: &str,
    index: usize,
    disabled: bool,
) -> Result<Json<WorkerStatus>, AdminError> {
    let inner = state.inner.load();
    let pool = inner
        .balancers
        .get(balancer)
        .ok_or_else(|| AdminError::UnknownBalancer(balancer.to_string()))?;
    let worker = pool
        .worker(index)
        .ok_or_else(|| AdminError::UnknownWorker(balancer.to_string(), index))?;

    if disabled {
        worker.disable();
    } else {
        worker.enable();
    }
    tracing::info!(balancer, worker = %worker.url, disabled, "Worker status changed by admin");

    Ok(Json(WorkerStatus::from_worker(index, worker)))
}
