use crate::error::{FetchError, Result};
use axum::{
    body::Body,
    extract::State,
    http::{Response, StatusCode},
    response::IntoResponse,
};
use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// Metrics service for collecting and exposing Prometheus metrics
#[derive(Clone)]
pub struct MetricsService {
    handle: Arc<PrometheusHandle>,
}

impl MetricsService {
    /// Install the global Prometheus recorder
    pub fn new() -> Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            FetchError::Config(format!("Failed to install metrics recorder: {}", e))
        })?;

        Self::register_metrics();

        info!("Metrics service initialized successfully");

        Ok(Self {
            handle: Arc::new(handle),
        })
    }

    fn register_metrics() {
        describe_counter!(
            "fetchgate_proxy_requests_total",
            "Total number of proxy requests dispatched upstream"
        );
        describe_histogram!(
            "fetchgate_proxy_duration_seconds",
            "Upstream dispatch latencies in seconds"
        );
        describe_counter!(
            "fetchgate_proxy_rejected_total",
            "Total number of proxy requests rejected before dispatch"
        );

        debug!("All metrics registered with descriptions");
    }

    /// Render metrics in Prometheus format
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

/// Metrics endpoint handler
pub async fn metrics_handler(State(service): State<MetricsService>) -> impl IntoResponse {
    let metrics = service.render();
    Response::builder()
        .status(StatusCode::OK)
        .header("content-type", "text/plain; version=0.0.4")
        .body(Body::from(metrics))
        .unwrap_or_else(|_| Response::new(Body::empty()))
}

/// Record a dispatched proxy request
pub fn record_proxy_request(method: &'static str, outcome: &'static str, elapsed: Duration) {
    counter!(
        "fetchgate_proxy_requests_total",
        "method" => method,
        "outcome" => outcome
    )
    .increment(1);

    histogram!("fetchgate_proxy_duration_seconds", "method" => method)
        .record(elapsed.as_secs_f64());
}

/// Record a proxy request rejected for invalid input
pub fn record_proxy_rejected() {
    counter!("fetchgate_proxy_rejected_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_proxy_request("GET", "success", Duration::from_millis(5));
        record_proxy_rejected();
    }
}
