mod support;

use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use axum::Router;
use ethers::types::U256;
use evm_balance_exporter::api::router;
use evm_balance_exporter::config::ExporterConfig;
use evm_balance_exporter::metrics::PrometheusSink;
use evm_balance_exporter::monitor::ExporterSupervisor;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

use support::{addr, target, ScriptedRpc};

async fn exporter(probe_ok: bool) -> (Router, Arc<ExporterSupervisor>) {
    let rpc = Arc::new(ScriptedRpc::default());
    rpc.set_balance(addr(1), addr(2), U256::from(1_000_000_000u64));
    rpc.set_probe_ok(probe_ok);

    let config = ExporterConfig {
        port: 0,
        networks: vec![target("ethereum", addr(1), addr(2))],
    };
    let sink = Arc::new(PrometheusSink::new().unwrap());
    let supervisor = Arc::new(
        ExporterSupervisor::start(&config, sink.clone(), |_| Ok(rpc.clone())).unwrap(),
    );

    // Let the first scrape and probe ticks land.
    tokio::time::sleep(Duration::from_millis(300)).await;
    (router(supervisor.clone(), sink), supervisor)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, String::from_utf8_lossy(&body).into_owned())
}

#[tokio::test]
async fn health_endpoint_reports_healthy_exporter() {
    let (app, supervisor) = exporter(true).await;

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "healthy");

    supervisor.stop().await;
}

#[tokio::test]
async fn health_endpoint_is_non_200_when_unreachable() {
    let (app, supervisor) = exporter(false).await;

    let (status, body) = get(&app, "/health").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, "unhealthy");

    supervisor.stop().await;
}

#[tokio::test]
async fn metrics_endpoint_exposes_balances_and_health() {
    let (app, supervisor) = exporter(true).await;

    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains("token_balance{"));
    assert!(body.contains("alias=\"bridge_eth\""));
    assert!(body.contains("exporter_rpc_health{network=\"ethereum\"} 1"));
    assert!(body.contains("exporter_health 1"));
    assert!(body.contains("exporter_last_successful_scrape_timestamp"));

    supervisor.stop().await;
}
