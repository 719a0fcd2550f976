// src/server/metrics_server.rs

//! Serves Prometheus metrics on `/metrics`. Mirrors the teacher's
//! `metrics_server::run_metrics_server`: update the dynamic gauges just before
//! encoding, then hand back the text exposition format.

use crate::core::metrics::{
    MPFC_DESIRED_DURATION_SECONDS, MPFC_MEMORY_RATIO, MPFC_TRACKED_QUEUE_COUNT,
    duration_gauge_value, gather_metrics,
};
use crate::core::mpfc::handle::MpfcHandle;
use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use std::net::SocketAddr;
use tokio::sync::broadcast;
use tracing::{error, info};

async fn metrics_handler(mpfc: Option<MpfcHandle>) -> impl IntoResponse {
    if let Some(mpfc) = &mpfc {
        let snapshot = mpfc.metrics_snapshot().await;
        MPFC_DESIRED_DURATION_SECONDS.set(duration_gauge_value(snapshot.desired_duration));
        MPFC_TRACKED_QUEUE_COUNT.set(snapshot.tracked_queue_count as f64);
        MPFC_MEMORY_RATIO.set(snapshot.memory_ratio);
    }

    let body = gather_metrics();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4")],
        body,
    )
}

/// Runs the metrics HTTP server until `shutdown` fires.
pub async fn run(port: u16, mpfc: Option<MpfcHandle>, mut shutdown: broadcast::Receiver<()>) {
    let app = Router::new().route("/metrics", get(move || metrics_handler(mpfc.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "metrics server listening on /metrics");

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("failed to bind metrics server on port {port}: {e}");
            return;
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown.recv().await.ok();
            info!("metrics server shutting down");
        })
        .await
    {
        error!("metrics server error: {e}");
    }
}
