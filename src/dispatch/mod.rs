//! Authenticated request dispatcher.
//!
//! Builds exactly one HTTP request against `<base_url><path>`, attaches the
//! bearer token when the provider yields one, and normalizes the outcome into
//! either the decoded JSON body or a [`FetchError`]. Nothing is logged,
//! cached or retried here.

use crate::error::{FetchError, Result};
use crate::token::TokenProvider;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use secrecy::ExposeSecret;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

/// HTTP verbs the dispatcher accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub const ALL: [Method; 4] = [Method::Get, Method::Post, Method::Put, Method::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        }
    }

    fn to_http(self) -> reqwest::Method {
        match self {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = FetchError;

    /// Case-sensitive: `get` is not a valid verb.
    fn from_str(s: &str) -> Result<Self> {
        Method::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| FetchError::InvalidMethod(s.to_string()))
    }
}

/// Ensure a path is rooted; it is appended to the base URL as-is
pub fn validate_path(path: &str) -> Result<()> {
    if path.starts_with('/') {
        Ok(())
    } else {
        Err(FetchError::InvalidPath(path.to_string()))
    }
}

/// One request to send through a [`Dispatcher`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestDescriptor {
    pub method: Method,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
}

impl RequestDescriptor {
    pub fn new(method: Method, path: impl Into<String>, body: Option<Value>) -> Result<Self> {
        let path = path.into();
        validate_path(&path)?;
        Ok(Self { method, path, body })
    }

    pub fn get(path: impl Into<String>) -> Result<Self> {
        Self::new(Method::Get, path, None)
    }
}

/// Sends authenticated requests to a single upstream
#[derive(Clone)]
pub struct Dispatcher {
    client: reqwest::Client,
    base_url: String,
    token_provider: Option<Arc<dyn TokenProvider>>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("base_url", &self.base_url)
            .field("has_token_provider", &self.token_provider.is_some())
            .finish()
    }
}

/// Client used by dispatchers: no redirects, so a 3xx surfaces as a failure
pub fn build_client(timeout: Option<Duration>) -> Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    builder
        .build()
        .map_err(|e| FetchError::Config(format!("Failed to create HTTP client: {}", e)))
}

impl Dispatcher {
    /// Create a dispatcher with its own HTTP client
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(build_client(None)?, base_url))
    }

    /// Create a dispatcher sharing an existing client
    pub fn with_client(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            token_provider: None,
        }
    }

    pub fn with_token_provider(mut self, provider: Arc<dyn TokenProvider>) -> Self {
        self.token_provider = Some(provider);
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Send one request and decode the JSON response
    pub async fn dispatch(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        validate_path(path)?;

        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.request(method.to_http(), url);

        if let Some(provider) = &self.token_provider {
            if let Some(token) = provider.token().await {
                request = request.header(AUTHORIZATION, format!("Bearer {}", token.expose_secret()));
            }
        }

        if let Some(body) = body.filter(|_| method != Method::Get) {
            let payload = serde_json::to_vec(body)?;
            request = request.header(CONTENT_TYPE, "application/json").body(payload);
        }

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Send a descriptor
    pub async fn send(&self, request: &RequestDescriptor) -> Result<Value> {
        self.dispatch(request.method, &request.path, request.body.as_ref())
            .await
    }

    /// Send one request and deserialize the response into `T`
    pub async fn dispatch_as<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let value = self.dispatch(method, path, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    pub async fn get(&self, path: &str) -> Result<Value> {
        self.dispatch(Method::Get, path, None).await
    }

    pub async fn post(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.dispatch(Method::Post, path, body).await
    }

    pub async fn put(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.dispatch(Method::Put, path, body).await
    }

    pub async fn delete(&self, path: &str, body: Option<&Value>) -> Result<Value> {
        self.dispatch(Method::Delete, path, body).await
    }
}
