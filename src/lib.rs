pub mod config;
pub mod dispatch;
pub mod error;
pub mod hooks;
pub mod metrics;
pub mod proxy;
pub mod server_query;
pub mod token;

use crate::config::AppConfig;
use crate::error::{FetchError, Result};
use crate::metrics::{metrics_handler, MetricsService};
use crate::proxy::{health_handler, proxy_handler, ProxyState};
use axum::{
    http::{HeaderValue, Request},
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use uuid::Uuid;

pub use crate::dispatch::{Dispatcher, Method, RequestDescriptor};
pub use crate::server_query::{server_query, ServerQuery};
pub use crate::token::{RequestContext, TokenProvider};

/// Env var selecting log output: `json` or anything else for compact text
pub const LOG_FORMAT_ENV: &str = "FETCHGATE_LOG_FORMAT";

#[derive(Clone, Copy, Default)]
struct UuidRequestId;

impl MakeRequestId for UuidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Build the axum app serving the proxy endpoint, `/health` and optionally `/metrics`
pub fn build_app(config: &AppConfig, metrics: Option<MetricsService>) -> Result<Router> {
    let proxy_state = ProxyState::new(config)?;

    let mut app = Router::new()
        .route(&config.proxy.path, post(proxy_handler))
        .route("/health", get(health_handler))
        .with_state(proxy_state);

    if let Some(metrics) = metrics {
        app = app.merge(
            Router::new()
                .route("/metrics", get(metrics_handler))
                .with_state(metrics),
        );
    }

    Ok(app.layer(
        ServiceBuilder::new()
            .layer(SetRequestIdLayer::x_request_id(UuidRequestId))
            .layer(TraceLayer::new_for_http())
            .layer(PropagateRequestIdLayer::x_request_id()),
    ))
}

/// Initialize the proxy server
pub async fn init_server(config: AppConfig, metrics: Option<MetricsService>) -> Result<()> {
    config.validate()?;

    info!("Starting fetchgate");
    info!(
        "Server listening on {}:{}",
        config.server.host, config.server.port
    );
    info!(
        proxy_path = %config.proxy.path,
        pass_through_status = config.proxy.pass_through_status,
        "Proxy endpoint configured"
    );

    let app = build_app(&config, metrics)?;

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Fetchgate ready to accept connections");

    axum::serve(listener, app)
        .await
        .map_err(|e| FetchError::Config(format!("Server error: {}", e)))?;

    Ok(())
}

/// Initialize tracing/logging
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "fetchgate=debug,tower_http=debug".into());

    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|format| format.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .compact()
            .init();
    }
}
