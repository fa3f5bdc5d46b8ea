//! A transport bound to one rotator slot.
//!
//! Every call issued through a [`RotatingClient`] is monitored: if it fails,
//! the slot is reported to the owning rotator before the error is handed
//! back to the caller. Call sites see ordinary errors while the rotator
//! updates its exclusion table.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::TransportError;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::rotator::SlotTable;
use crate::transport::{HealthStatus, RpcTransport, TransportKind};

/// One endpoint's connection, as handed out by
/// [`Rotator::next`](crate::rotator::Rotator::next).
///
/// Holds a weak handle to the rotator's slot table, so a client outliving
/// its rotator simply stops reporting.
pub struct RotatingClient {
    slot: usize,
    url: String,
    kind: TransportKind,
    inner: Arc<dyn RpcTransport>,
    table: Weak<SlotTable>,
}

impl RotatingClient {
    pub(crate) fn new(slot: usize, inner: Arc<dyn RpcTransport>, table: Weak<SlotTable>) -> Self {
        Self {
            slot,
            url: inner.url().to_string(),
            kind: inner.kind(),
            inner,
            table,
        }
    }

    /// Position of this connection within its rotator.
    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn endpoint(&self) -> &str {
        &self.url
    }

    /// The wrapped transport. Calls made on it directly are not monitored.
    pub fn transport(&self) -> &Arc<dyn RpcTransport> {
        &self.inner
    }

    fn report(&self, err: &TransportError) {
        match self.table.upgrade() {
            Some(table) => table.report_failure(self.slot, err),
            None => tracing::debug!(slot = self.slot, url = %self.url, "rotator dropped, failure not recorded"),
        }
    }

    fn observe<T>(&self, result: Result<T, TransportError>) -> Result<T, TransportError> {
        if let Err(e) = &result {
            self.report(e);
        }
        result
    }
}

#[async_trait]
impl RpcTransport for RotatingClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let result = self.inner.send(req).await;
        self.observe(result)
    }

    /// Only a batch-level failure marks the slot; errors carried inside
    /// individual responses do not.
    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let result = self.inner.send_batch(reqs).await;
        self.observe(result)
    }

    fn health(&self) -> HealthStatus {
        match self.table.upgrade() {
            Some(table) if table.is_active(self.slot) => HealthStatus::Healthy,
            Some(_) => HealthStatus::Unhealthy,
            None => HealthStatus::Unknown,
        }
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> TransportKind {
        self.kind
    }

    fn close(&self) {
        self.inner.close();
    }

    /// Any error, including a JSON-RPC error object or an undecodable
    /// result, marks the slot as failed.
    async fn call<T: DeserializeOwned>(
        &self,
        id: u64,
        method: &str,
        params: Vec<Value>,
    ) -> Result<T, TransportError>
    where
        Self: Sized,
    {
        let req = JsonRpcRequest::new(id, method, params);
        let result = match self.inner.send(req).await {
            Ok(resp) => resp
                .into_result()
                .map_err(TransportError::Rpc)
                .and_then(|v| serde_json::from_value(v).map_err(TransportError::Deserialization)),
            Err(e) => Err(e),
        };
        self.observe(result)
    }
}

impl std::fmt::Debug for RotatingClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RotatingClient")
            .field("slot", &self.slot)
            .field("url", &self.url)
            .field("kind", &self.kind)
            .finish()
    }
}
