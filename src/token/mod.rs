//! Bearer token sources.
//!
//! A [`TokenProvider`] is the only way the dispatcher learns about a token.
//! Providers that depend on the incoming request read from an explicit
//! [`RequestContext`] handed to them at construction, never from ambient state.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use secrecy::{ExposeSecret, Secret};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

/// Secret string wrapper that prevents accidental exposure
pub type SecretString = Secret<String>;

/// Capability yielding an optional bearer token
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Look up the token. `None` means the request goes out unauthenticated.
    async fn token(&self) -> Option<SecretString>;
}

/// Snapshot of the trusted request headers a provider may read from
#[derive(Clone, Default)]
pub struct RequestContext {
    headers: HeaderMap,
}

// Header values carry credentials; only names are printed.
impl fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestContext")
            .field("headers", &self.headers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl RequestContext {
    pub fn new(headers: HeaderMap) -> Self {
        Self { headers }
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Value of the named cookie across all `Cookie` headers
    pub fn cookie(&self, name: &str) -> Option<String> {
        self.headers
            .get_all(header::COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .flat_map(|value| value.split(';'))
            .filter_map(|pair| pair.trim().split_once('='))
            .find(|(key, _)| key.trim() == name)
            .map(|(_, value)| value.trim().trim_matches('"').to_string())
    }

    /// Token from an `Authorization: Bearer` header
    pub fn bearer(&self) -> Option<String> {
        let value = self.headers.get(header::AUTHORIZATION)?.to_str().ok()?;
        let (scheme, token) = value.split_once(' ')?;

        if scheme.eq_ignore_ascii_case("bearer") {
            Some(token.trim().to_string())
        } else {
            None
        }
    }
}

impl From<HeaderMap> for RequestContext {
    fn from(headers: HeaderMap) -> Self {
        Self::new(headers)
    }
}

fn non_empty(token: String) -> Option<SecretString> {
    if token.is_empty() {
        None
    } else {
        Some(Secret::new(token))
    }
}

/// Fixed token, e.g. a service credential
#[derive(Debug, Clone)]
pub struct StaticTokenProvider {
    token: SecretString,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Secret::new(token.into()),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> Option<SecretString> {
        non_empty(self.token.expose_secret().clone())
    }
}

/// Reads a named cookie, optionally falling back to the bearer header
#[derive(Debug, Clone)]
pub struct CookieTokenProvider {
    context: Arc<RequestContext>,
    cookie_name: String,
    bearer_fallback: bool,
}

impl CookieTokenProvider {
    pub fn new(context: Arc<RequestContext>, cookie_name: impl Into<String>) -> Self {
        Self {
            context,
            cookie_name: cookie_name.into(),
            bearer_fallback: false,
        }
    }

    pub fn with_bearer_fallback(mut self, enabled: bool) -> Self {
        self.bearer_fallback = enabled;
        self
    }
}

#[async_trait]
impl TokenProvider for CookieTokenProvider {
    async fn token(&self) -> Option<SecretString> {
        let from_cookie = self.context.cookie(&self.cookie_name).and_then(non_empty);

        if from_cookie.is_some() || !self.bearer_fallback {
            return from_cookie;
        }

        self.context.bearer().and_then(non_empty)
    }
}

/// Adapts an async closure into a provider
pub struct FnTokenProvider<F> {
    lookup: F,
}

impl<F> FnTokenProvider<F> {
    pub fn new(lookup: F) -> Self {
        Self { lookup }
    }
}

#[async_trait]
impl<F, Fut> TokenProvider for FnTokenProvider<F>
where
    F: Fn() -> Fut + Send + Sync,
    Fut: Future<Output = Option<String>> + Send,
{
    async fn token(&self) -> Option<SecretString> {
        (self.lookup)().await.and_then(non_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn context_with(name: header::HeaderName, value: &'static str) -> Arc<RequestContext> {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_static(value));
        Arc::new(RequestContext::new(headers))
    }

    #[test]
    fn test_cookie_lookup() {
        let ctx = context_with(header::COOKIE, "theme=dark; token=abc123; other=1");
        assert_eq!(ctx.cookie("token").as_deref(), Some("abc123"));
        assert_eq!(ctx.cookie("theme").as_deref(), Some("dark"));
        assert_eq!(ctx.cookie("missing"), None);
    }

    #[test]
    fn test_cookie_lookup_does_not_match_prefix() {
        let ctx = context_with(header::COOKIE, "xtoken=nope");
        assert_eq!(ctx.cookie("token"), None);
    }

    #[test]
    fn test_bearer_lookup() {
        let ctx = context_with(header::AUTHORIZATION, "Bearer xyz");
        assert_eq!(ctx.bearer().as_deref(), Some("xyz"));

        let ctx = context_with(header::AUTHORIZATION, "Basic dXNlcjpwYXNz");
        assert_eq!(ctx.bearer(), None);
    }

    #[test]
    fn test_debug_redacts_header_values() {
        let ctx = context_with(header::COOKIE, "token=do-not-print");
        let debug = format!("{:?}", CookieTokenProvider::new(ctx, "token"));
        assert!(debug.contains("cookie"));
        assert!(!debug.contains("do-not-print"));
    }

    #[tokio::test]
    async fn test_cookie_provider() {
        let provider = CookieTokenProvider::new(context_with(header::COOKIE, "token=abc"), "token");
        let token = provider.token().await.unwrap();
        assert_eq!(token.expose_secret(), "abc");
    }

    #[tokio::test]
    async fn test_cookie_provider_empty_value_is_none() {
        let provider = CookieTokenProvider::new(context_with(header::COOKIE, "token="), "token");
        assert!(provider.token().await.is_none());
    }

    #[tokio::test]
    async fn test_cookie_provider_bearer_fallback() {
        let ctx = context_with(header::AUTHORIZATION, "Bearer from-header");

        let strict = CookieTokenProvider::new(ctx.clone(), "token");
        assert!(strict.token().await.is_none());

        let lenient = CookieTokenProvider::new(ctx, "token").with_bearer_fallback(true);
        assert_eq!(lenient.token().await.unwrap().expose_secret(), "from-header");
    }

    #[tokio::test]
    async fn test_fn_provider() {
        let provider = FnTokenProvider::new(|| async { Some("later".to_string()) });
        assert_eq!(provider.token().await.unwrap().expose_secret(), "later");

        let empty = FnTokenProvider::new(|| async { None::<String> });
        assert!(empty.token().await.is_none());
    }

    #[tokio::test]
    async fn test_static_provider_empty() {
        assert!(StaticTokenProvider::new("").token().await.is_none());
    }
}
