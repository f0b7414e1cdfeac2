//! Prometheus metrics for monitoring
//!
//! Exposes metrics for:
//! - Mint attempts and outcomes
//! - Signing network latency
//! - Metadata resolution failures
//! - Open sessions

use crate::error::{ClaimError, ClaimResult};

use axum::{http::StatusCode, routing::get, Router};
use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_gauge, register_histogram, Counter,
    CounterVec, Encoder, Gauge, Histogram, TextEncoder,
};
use std::net::SocketAddr;
use tracing::info;

lazy_static! {
    pub static ref MINT_ATTEMPTS: Counter = register_counter!(
        "airdrop_claim_mint_attempts_total",
        "Total mint attempts"
    ).unwrap();

    pub static ref MINT_SUCCEEDED: Counter = register_counter!(
        "airdrop_claim_mint_succeeded_total",
        "Total mints with a broadcast transaction"
    ).unwrap();

    pub static ref MINT_FAILED: CounterVec = register_counter_vec!(
        "airdrop_claim_mint_failed_total",
        "Total failed mints by error kind",
        &["kind"]
    ).unwrap();

    pub static ref SIGNING_LATENCY: Histogram = register_histogram!(
        "airdrop_claim_signing_latency_seconds",
        "Signing network execute latency",
        vec![0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0]
    ).unwrap();

    pub static ref METADATA_FAILURES: Counter = register_counter!(
        "airdrop_claim_metadata_failures_total",
        "Metadata fetches that failed or timed out"
    ).unwrap();

    pub static ref ACTIVE_SESSIONS: Gauge = register_gauge!(
        "airdrop_claim_active_sessions",
        "Open claim sessions"
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

    pub async fn run(&self) -> ClaimResult<()> {
        let app = Router::new().route("/metrics", get(metrics_handler));

        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        info!("Starting metrics server on {}", addr);

        let listener = tokio::net::TcpListener::bind(&addr)
            .await
            .map_err(|e| ClaimError::Config(format!("bind {}: {}", addr, e)))?;
        axum::serve(listener, app)
            .await
            .map_err(|e| ClaimError::Config(format!("metrics server: {}", e)))?;

        Ok(())
    }
}

async fn metrics_handler() -> Result<String, StatusCode> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    String::from_utf8(buffer).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}

// Helper functions to record metrics

pub fn record_mint_attempt() {
    MINT_ATTEMPTS.inc();
}

pub fn record_mint_success() {
    MINT_SUCCEEDED.inc();
}

pub fn record_mint_failure(kind: &str) {
    MINT_FAILED.with_label_values(&[kind]).inc();
}

pub fn record_signing_latency(latency_secs: f64) {
    SIGNING_LATENCY.observe(latency_secs);
}

pub fn record_metadata_failure() {
    METADATA_FAILURES.inc();
}

pub fn set_active_sessions(count: usize) {
    ACTIVE_SESSIONS.set(count as f64);
}
