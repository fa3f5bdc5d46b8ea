//! Dialing by URL scheme.

use std::sync::Arc;

use async_trait::async_trait;

use chainrotor_core::error::TransportError;
use chainrotor_core::transport::{Dialer, RpcTransport, TransportKind};
use chainrotor_http::{HttpClientConfig, HttpRpcClient};
use chainrotor_ws::{WsClientConfig, WsRpcClient};

/// Opens `ws://`/`wss://` URLs with [`WsRpcClient`] and everything else with
/// [`HttpRpcClient`].
#[derive(Debug, Clone, Default)]
pub struct SchemeDialer {
    pub http: HttpClientConfig,
    pub ws: WsClientConfig,
}

impl SchemeDialer {
    pub fn new(http: HttpClientConfig, ws: WsClientConfig) -> Self {
        Self { http, ws }
    }
}

#[async_trait]
impl Dialer for SchemeDialer {
    async fn dial(&self, url: &str) -> Result<Arc<dyn RpcTransport>, TransportError> {
        match TransportKind::from_url(url) {
            TransportKind::Streaming => {
                let client = WsRpcClient::connect(url, self.ws.clone()).await?;
                Ok(Arc::new(client))
            }
            TransportKind::RequestResponse => Ok(Arc::new(HttpRpcClient::new(url, &self.http)?)),
        }
    }
}
