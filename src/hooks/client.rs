use crate::dispatch::{build_client, Method};
use crate::error::{FetchError, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

#[derive(Serialize)]
struct Envelope<'a> {
    method: Method,
    path: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    body: Option<&'a Value>,
}

/// Untrusted-side client for the proxy endpoint. It never sees the real token.
#[derive(Debug, Clone)]
pub struct ProxyClient {
    client: reqwest::Client,
    endpoint: String,
}

impl ProxyClient {
    /// `endpoint` is the full proxy URL, e.g. `http://localhost:8080/api/proxy`
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        Ok(Self::with_client(build_client(None)?, endpoint))
    }

    /// Use a preconfigured client (cookie store, default headers)
    pub fn with_client(client: reqwest::Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `{method, path, body?}` to the proxy and decode its response
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<T> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&Envelope { method, path, body })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Upstream {
                status: status.as_u16(),
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_request_posts_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/proxy"))
            .and(body_json(json!({"method": "PUT", "path": "/items/1", "body": {"done": true}})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ProxyClient::new(format!("{}/api/proxy", mock_server.uri())).unwrap();
        let value: Value = client
            .request(Method::Put, "/items/1", Some(&json!({"done": true})))
            .await
            .unwrap();

        assert_eq!(value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_request_omits_absent_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(body_json(json!({"method": "GET", "path": "/items"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .expect(1)
            .mount(&mock_server)
            .await;

        let client = ProxyClient::new(mock_server.uri()).unwrap();
        let value: Vec<Value> = client.request(Method::Get, "/items", None).await.unwrap();
        assert!(value.is_empty());
    }

    #[tokio::test]
    async fn test_proxy_failure_maps_to_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "Request failed"})))
            .mount(&mock_server)
            .await;

        let client = ProxyClient::new(mock_server.uri()).unwrap();
        let err = client
            .request::<Value>(Method::Get, "/items", None)
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Upstream { status: 500 }));
    }
}
