//! # Prometheus Metrics
//!
//! Escrow activity counters, scraped at `/metrics` on the metrics port.
//! Everything lives in a dedicated [`prometheus::Registry`] under the `htlc`
//! namespace.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};
use std::sync::Arc;

use htlc_contracts::HtlcError;

/// Metric handles for the node. Prometheus handles are internally
/// reference-counted, so cloning is cheap.
#[derive(Clone)]
pub struct NodeMetrics {
    registry: Registry,
    pub contracts_created_total: IntCounter,
    pub contracts_withdrawn_total: IntCounter,
    pub contracts_refunded_total: IntCounter,
    /// Rejected operations, labelled by error kind.
    pub operations_rejected_total: IntCounterVec,
    pub active_contracts: IntGauge,
    pub operation_latency_seconds: Histogram,
}

impl NodeMetrics {
    /// Create and register every metric.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("htlc".into()), None)?;

        let contracts_created_total =
            IntCounter::new("contracts_created_total", "Contracts created")?;
        registry.register(Box::new(contracts_created_total.clone()))?;

        let contracts_withdrawn_total = IntCounter::new(
            "contracts_withdrawn_total",
            "Contracts settled to the receiver",
        )?;
        registry.register(Box::new(contracts_withdrawn_total.clone()))?;

        let contracts_refunded_total = IntCounter::new(
            "contracts_refunded_total",
            "Contracts refunded to the sender",
        )?;
        registry.register(Box::new(contracts_refunded_total.clone()))?;

        let operations_rejected_total = IntCounterVec::new(
            Opts::new(
                "operations_rejected_total",
                "Escrow operations rejected, by error kind",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(operations_rejected_total.clone()))?;

        let active_contracts =
            IntGauge::new("active_contracts", "Contracts currently holding funds")?;
        registry.register(Box::new(active_contracts.clone()))?;

        let operation_latency_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "operation_latency_seconds",
                "Time spent inside escrow operations",
            )
            .buckets(vec![0.00001, 0.0001, 0.001, 0.01, 0.1, 1.0]),
        )?;
        registry.register(Box::new(operation_latency_seconds.clone()))?;

        Ok(Self {
            registry,
            contracts_created_total,
            contracts_withdrawn_total,
            contracts_refunded_total,
            operations_rejected_total,
            active_contracts,
            operation_latency_seconds,
        })
    }

    pub fn record_rejection(&self, error: &HtlcError) {
        self.operations_rejected_total
            .with_label_values(&[error.kind()])
            .inc();
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn encode(&self) -> Result<String, prometheus::Error> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

pub type SharedMetrics = Arc<NodeMetrics>;

/// `GET /metrics`.
pub async fn metrics_handler(
    axum::extract::State(metrics): axum::extract::State<SharedMetrics>,
) -> impl IntoResponse {
    match metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "failed to encode metrics");
            (StatusCode::INTERNAL_SERVER_ERROR, "metrics encoding failed").into_response()
        }
    }
}
