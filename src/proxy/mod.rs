use crate::config::{AppConfig, UpstreamConfig};
use crate::dispatch::{build_client, validate_path, Dispatcher, Method, RequestDescriptor};
use crate::error::{FetchError, Result, GENERIC_FAILURE_MESSAGE};
use crate::metrics;
use crate::token::{CookieTokenProvider, RequestContext};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Proxy handler state
#[derive(Clone)]
pub struct ProxyState {
    pub client: reqwest::Client,
    pub upstream: Arc<UpstreamConfig>,
    pub pass_through_status: bool,
}

impl ProxyState {
    /// Create a new proxy state
    pub fn new(config: &AppConfig) -> Result<Self> {
        let client = build_client(Some(Duration::from_secs(config.server.timeout_secs)))?;

        Ok(Self {
            client,
            upstream: Arc::new(config.upstream.clone()),
            pass_through_status: config.proxy.pass_through_status,
        })
    }

    /// Dispatcher holding the caller's token, scoped to one proxied request
    fn dispatcher_for(&self, headers: HeaderMap) -> Dispatcher {
        let context = Arc::new(RequestContext::new(headers));
        let provider = CookieTokenProvider::new(context, self.upstream.token_cookie.clone())
            .with_bearer_fallback(self.upstream.accept_bearer_header);

        Dispatcher::with_client(self.client.clone(), self.upstream.base_url.clone())
            .with_token_provider(Arc::new(provider))
    }

    fn failure_status(&self, err: &FetchError) -> StatusCode {
        if self.pass_through_status {
            err.status_code()
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Parse and validate a proxy envelope `{method, path, body?}`
pub fn parse_envelope(raw: &[u8]) -> Result<RequestDescriptor> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|_| FetchError::InvalidRequest("Body must be valid JSON".to_string()))?;

    let envelope = value
        .as_object()
        .ok_or_else(|| FetchError::InvalidRequest("Body must be a JSON object".to_string()))?;

    let method: Method = envelope
        .get("method")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::InvalidMethod("method must be a string".to_string()))?
        .parse()?;

    let path = envelope
        .get("path")
        .and_then(Value::as_str)
        .ok_or_else(|| FetchError::InvalidPath("path must be a string".to_string()))?;
    validate_path(path)?;

    let body = envelope.get("body").filter(|b| !b.is_null()).cloned();

    RequestDescriptor::new(method, path, body)
}

/// Forwards a validated envelope to the upstream with the caller's token
#[axum::debug_handler]
pub async fn proxy_handler(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    raw: Bytes,
) -> Response {
    let request = match parse_envelope(&raw) {
        Ok(request) => request,
        Err(e) => {
            warn!(error = %e, "Rejected proxy request");
            metrics::record_proxy_rejected();
            return e.into_response();
        }
    };

    let started = Instant::now();
    debug!(method = %request.method, path = %request.path, "Proxying request");

    let result = state.dispatcher_for(headers).send(&request).await;
    let elapsed = started.elapsed();

    match result {
        Ok(value) => {
            info!(
                method = %request.method,
                path = %request.path,
                latency_ms = elapsed.as_secs_f64() * 1000.0,
                "Proxy request completed"
            );
            metrics::record_proxy_request(request.method.as_str(), "success", elapsed);
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(e) => {
            warn!(
                method = %request.method,
                path = %request.path,
                upstream_status = ?e.upstream_status(),
                error = %e,
                "Proxy request failed"
            );
            metrics::record_proxy_request(request.method.as_str(), "failure", elapsed);

            let status = state.failure_status(&e);
            (status, Json(json!({ "error": GENERIC_FAILURE_MESSAGE }))).into_response()
        }
    }
}

/// Liveness endpoint
pub async fn health_handler() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}
