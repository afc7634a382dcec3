use crate::config::UpstreamConfig;
use crate::dispatch::{build_client, Dispatcher, Method};
use crate::error::Result;
use crate::token::{CookieTokenProvider, RequestContext};
use serde::de::DeserializeOwned;
use std::sync::Arc;

/// GET helper for trusted code that already holds the incoming request
#[derive(Debug, Clone)]
pub struct ServerQuery {
    client: reqwest::Client,
    upstream: UpstreamConfig,
}

impl ServerQuery {
    pub fn new(upstream: UpstreamConfig, client: reqwest::Client) -> Self {
        Self { client, upstream }
    }

    /// Dispatcher bound to the cookie found in `context`
    pub fn dispatcher(&self, context: Arc<RequestContext>) -> Dispatcher {
        let provider = CookieTokenProvider::new(context, self.upstream.token_cookie.clone())
            .with_bearer_fallback(self.upstream.accept_bearer_header);

        Dispatcher::with_client(self.client.clone(), self.upstream.base_url.clone())
            .with_token_provider(Arc::new(provider))
    }

    pub async fn query<T: DeserializeOwned>(
        &self,
        context: Arc<RequestContext>,
        path: &str,
    ) -> Result<T> {
        self.dispatcher(context)
            .dispatch_as(Method::Get, path, None)
            .await
    }
}

/// One-shot GET with a fresh client
pub async fn server_query<T: DeserializeOwned>(
    upstream: &UpstreamConfig,
    context: Arc<RequestContext>,
    path: &str,
) -> Result<T> {
    ServerQuery::new(upstream.clone(), build_client(None)?)
        .query(context, path)
        .await
}
