//! Prometheus metrics for the submission pipeline
//!
//! Exposes metrics for:
//! - Broadcast and confirmed transactions
//! - Failures by pipeline stage
//! - Gas price fallbacks
//! - Submission latency

use crate::error::{ClientError, ClientResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, Counter, CounterVec, Encoder,
    Histogram, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref TX_SUBMITTED: Counter = register_counter!(
        "trato_transactions_submitted_total",
        "Total transactions accepted by the node"
    ).unwrap();

    pub static ref TX_CONFIRMED: Counter = register_counter!(
        "trato_transactions_confirmed_total",
        "Total transactions with an observed receipt"
    ).unwrap();

    pub static ref TX_FAILED: CounterVec = register_counter_vec!(
        "trato_transactions_failed_total",
        "Total failed submissions by pipeline stage",
        &["stage"]
    ).unwrap();

    pub static ref TX_LATENCY: Histogram = register_histogram!(
        "trato_submission_latency_seconds",
        "Time from queueing a submission to its receipt",
        vec![0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]
    ).unwrap();

    pub static ref GAS_PRICE_FALLBACKS: Counter = register_counter!(
        "trato_gas_price_fallbacks_total",
        "Times the static fallback replaced an unavailable gas oracle"
    ).unwrap();
}

/// Prometheus metrics server
pub struct MetricsServer {
    port: u16,
}

impl MetricsServer {
    pub fn new(port: u16) -> Self {
        Self { port }
    }

    pub async fn run(&self) -> ClientResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ClientError::Config(format!("metrics bind {addr}: {e}")))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| ClientError::Config(format!("metrics server: {e}")))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    render().map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

// Helper functions to record metrics

pub fn record_tx_submitted() {
    TX_SUBMITTED.inc();
}

pub fn record_tx_confirmed(latency_secs: f64) {
    TX_CONFIRMED.inc();
    TX_LATENCY.observe(latency_secs);
}

pub fn record_tx_failed(stage: &str) {
    TX_FAILED.with_label_values(&[stage]).inc();
}

pub fn record_gas_price_fallback() {
    GAS_PRICE_FALLBACKS.inc();
}
