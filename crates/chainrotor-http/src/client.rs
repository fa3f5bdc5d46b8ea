//! HTTP JSON-RPC client backed by `reqwest`.
//!
//! One POST per request, or one POST carrying a JSON array for a batch.
//! No retries: a failed call surfaces immediately so the rotator can
//! exclude the endpoint.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use chainrotor_core::error::TransportError;
use chainrotor_core::request::{align_batch, JsonRpcRequest, JsonRpcResponse};
use chainrotor_core::transport::{RpcTransport, TransportKind};

/// Configuration for `HttpRpcClient`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpClientConfig {
    /// Whole-request timeout, in milliseconds. Zero disables it.
    #[serde(default = "default_timeout_ms")]
    pub request_timeout_ms: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_timeout_ms() -> u64 { 30_000 }
fn default_user_agent() -> String { format!("chainrotor/{}", env!("CARGO_PKG_VERSION")) }

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_timeout_ms(),
            user_agent: default_user_agent(),
        }
    }
}

impl HttpClientConfig {
    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

/// HTTP JSON-RPC client for one endpoint.
pub struct HttpRpcClient {
    url: String,
    http: reqwest::Client,
    timeout_ms: u64,
}

impl HttpRpcClient {
    /// Build a client for `url`.
    ///
    /// HTTP is connectionless at this level, so "dialing" only validates the
    /// URL and builds the underlying client.
    pub fn new(url: impl Into<String>, config: &HttpClientConfig) -> Result<Self, TransportError> {
        let url = url.into();
        let dial_err = |reason: String| TransportError::Dial { url: url.clone(), reason };

        let parsed = reqwest::Url::parse(&url).map_err(|e| dial_err(e.to_string()))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(dial_err(format!("unsupported scheme '{}'", parsed.scheme())));
        }

        let mut builder = reqwest::Client::builder().user_agent(config.user_agent.as_str());
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let http = builder.build()
            .map_err(|e| dial_err(e.to_string()))?;

        Ok(Self { url, http, timeout_ms: config.request_timeout_ms })
    }

    /// Create with default configuration.
    pub fn default_for(url: impl Into<String>) -> Result<Self, TransportError> {
        Self::new(url, &HttpClientConfig::default())
    }

    async fn post<B, R>(&self, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + ?Sized + Sync,
        R: serde::de::DeserializeOwned,
    {
        let resp = self
            .http
            .post(&self.url)
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest(e))?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Http(format!("HTTP {status}: {body}")));
        }

        resp.json::<R>().await.map_err(|e| self.map_reqwest(e))
    }

    fn map_reqwest(&self, e: reqwest::Error) -> TransportError {
        if e.is_timeout() {
            TransportError::Timeout { ms: self.timeout_ms }
        } else {
            TransportError::Http(e.to_string())
        }
    }
}

#[async_trait]
impl RpcTransport for HttpRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        tracing::trace!(url = %self.url, method = %req.method, "http request");
        self.post(&req).await
    }

    /// True HTTP batch: all requests as a JSON array in one HTTP call.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        if reqs.is_empty() {
            return Ok(vec![]);
        }
        let responses: Vec<JsonRpcResponse> = self.post(&reqs).await?;
        Ok(align_batch(&reqs, responses))
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> TransportKind {
        TransportKind::RequestResponse
    }
}
