//! Admin API over a real listener.

use busyness_proxy::admin::handlers::{BalancerStatus, SystemStatus, WorkerStatus};
use busyness_proxy::admin::run_admin;
use tokio::net::TcpListener;

mod common;

const KEY: &str = "test-key";

struct Admin {
    proxy: common::RunningProxy,
    base: String,
}

async fn start_admin() -> Admin {
    let b1 = common::start_mock_backend("b1").await;
    let b2 = common::start_mock_backend("b2").await;
    let mut config = common::proxy_config(vec![common::worker(b1), common::worker(b2)]);
    config.admin.enabled = true;
    config.admin.api_key = KEY.into();
    let proxy = common::start_proxy(config).await;

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let base = format!("http://{}", listener.local_addr().unwrap());
    tokio::spawn(run_admin(
        proxy.state.clone(),
        listener,
        proxy.shutdown.subscribe(),
    ));

    Admin { proxy, base }
}

#[tokio::test]
async fn test_rejects_missing_or_wrong_key() {
    let admin = start_admin().await;
    let client = common::client();

    let res = client
        .get(format!("{}/admin/status", admin.base))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(format!("{}/admin/status", admin.base))
        .bearer_auth("nope")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);

    admin.proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_status_reports_probe_settings() {
    let admin = start_admin().await;
    let status: SystemStatus = common::client()
        .get(format!("{}/admin/status", admin.base))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(status.status, "operational");
    assert_eq!(status.probe_mode, "lenient");
    assert_eq!(status.probe_timeout_secs, 1);

    admin.proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_balancers_show_worker_state() {
    let admin = start_admin().await;
    common::bodies(&admin.proxy, 3).await;

    let balancers: Vec<BalancerStatus> = common::client()
        .get(format!("{}/admin/balancers", admin.base))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    assert_eq!(balancers.len(), 1);
    assert_eq!(balancers[0].name, "web");
    let workers = &balancers[0].workers;
    assert_eq!(workers.len(), 2);
    assert!(workers.iter().all(|w| !w.in_error && !w.disabled));
    assert_eq!(workers.iter().map(|w| w.lbstatus).sum::<i64>(), 0);

    admin.proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_disable_and_enable_worker() {
    let admin = start_admin().await;
    let client = common::client();

    let worker: WorkerStatus = client
        .post(format!("{}/admin/balancers/web/workers/0/disable", admin.base))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(worker.disabled);

    let bodies = common::bodies(&admin.proxy, 4).await;
    assert!(bodies.iter().all(|b| b == "b2"));

    let worker: WorkerStatus = client
        .post(format!("{}/admin/balancers/web/workers/0/enable", admin.base))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(!worker.disabled);

    let bodies = common::bodies(&admin.proxy, 4).await;
    assert!(bodies.iter().any(|b| b == "b1"));

    admin.proxy.shutdown.trigger();
}

#[tokio::test]
async fn test_unknown_worker_is_404() {
    let admin = start_admin().await;
    let client = common::client();

    let res = client
        .post(format!("{}/admin/balancers/web/workers/9/disable", admin.base))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    let res = client
        .post(format!("{}/admin/balancers/api/workers/0/disable", admin.base))
        .bearer_auth(KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);

    admin.proxy.shutdown.trigger();
}
