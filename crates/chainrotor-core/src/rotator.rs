//! Round-robin endpoint rotator with timed exclusion.
//!
//! The rotator owns a fixed set of connections (slots `0..N`). Each slot is
//! either active or excluded until a deadline. Selection and the exclusion
//! sweep happen under one lock:
//!
//! 1. every excluded slot whose deadline has passed goes back to active
//!    (emitting a recovery event);
//! 2. slots are scanned from the cursor, wrapping once, for the first active
//!    slot of the requested kind;
//! 3. the cursor moves one past the hit.
//!
//! A failed call on any [`RotatingClient`] excludes its slot for the
//! configured cooldown. Expiry is lazy: nothing happens until the next
//! selection.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use serde::{Deserialize, Serialize};

use crate::clock::{Clock, SystemClock};
use crate::config::RotatorConfig;
use crate::connection::RotatingClient;
use crate::error::{RotatorError, TransportError};
use crate::notifier::HealthNotifier;
use crate::request::{JsonRpcRequest, JsonRpcResponse};
use crate::transport::{Dialer, HealthStatus, RpcTransport, TransportKind};

/// Native-asset metadata carried by a rotator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeAsset {
    pub symbol: String,
    pub decimals: u32,
}

impl NativeAsset {
    /// Zero decimals means "unspecified" and falls back to 18.
    pub fn new(symbol: impl Into<String>, decimals: u32) -> Self {
        Self {
            symbol: symbol.into(),
            decimals: if decimals == 0 { 18 } else { decimals },
        }
    }
}

impl Default for NativeAsset {
    fn default() -> Self {
        Self::new("ETH", 18)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SlotStatus {
    Active,
    Excluded { until: Instant },
}

struct SlotInfo {
    url: String,
    kind: TransportKind,
}

struct TableState {
    status: Vec<SlotStatus>,
    cursor: usize,
    closed: bool,
}

/// Health state shared between a rotator and the clients it hands out.
pub(crate) struct SlotTable {
    slots: Vec<SlotInfo>,
    state: Mutex<TableState>,
    notifier: Option<Arc<dyn HealthNotifier>>,
    clock: Arc<dyn Clock>,
    cooldown: Duration,
}

impl SlotTable {
    fn lock(&self) -> MutexGuard<'_, TableState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn select(&self, kind: TransportKind) -> Result<usize, RotatorError> {
        let mut state = self.lock();
        if state.closed {
            return Err(RotatorError::Closed);
        }

        let now = self.clock.now();
        for idx in 0..state.status.len() {
            if let SlotStatus::Excluded { until } = state.status[idx] {
                if now > until {
                    state.status[idx] = SlotStatus::Active;
                    let url = &self.slots[idx].url;
                    tracing::info!(slot = idx, url = %url, "endpoint back in rotation");
                    if let Some(notifier) = &self.notifier {
                        if let Err(e) = notifier.notify_recovery(url) {
                            tracing::warn!(slot = idx, error = %e, "health notifier failed on recovery");
                        }
                    }
                }
            }
        }

        let len = self.slots.len();
        let start = state.cursor;
        for offset in 0..len {
            let idx = (start + offset) % len;
            if state.status[idx] == SlotStatus::Active && self.slots[idx].kind == kind {
                state.cursor = (idx + 1) % len;
                tracing::debug!(slot = idx, %kind, "selected endpoint");
                return Ok(idx);
            }
        }

        Err(RotatorError::NoActiveEndpoint { kind })
    }

    /// Exclude `slot` until now + cooldown. Repeated reports refresh the
    /// deadline.
    pub(crate) fn report_failure(&self, slot: usize, cause: &TransportError) {
        let Some(info) = self.slots.get(slot) else {
            tracing::warn!(slot, "failure reported for unknown slot");
            return;
        };
        let mut state = self.lock();
        let until = self.clock.now() + self.cooldown;
        state.status[slot] = SlotStatus::Excluded { until };
        tracing::warn!(
            slot,
            url = %info.url,
            error = %cause,
            cooldown_ms = self.cooldown.as_millis() as u64,
            "endpoint excluded"
        );
        if let Some(notifier) = &self.notifier {
            if let Err(e) = notifier.notify_failure(&info.url, cause) {
                tracing::warn!(slot, error = %e, "health notifier failed on exclusion");
            }
        }
    }

    pub(crate) fn is_active(&self, slot: usize) -> bool {
        self.lock().status.get(slot) == Some(&SlotStatus::Active)
    }

    fn active_count(&self) -> usize {
        self.lock()
            .status
            .iter()
            .filter(|s| **s == SlotStatus::Active)
            .count()
    }
}

/// Point-in-time view of one slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlotSummary {
    pub slot: usize,
    pub url: String,
    pub kind: TransportKind,
    pub status: HealthStatus,
    /// Time left on the exclusion. Zero means it lifts on the next selection.
    pub excluded_for: Option<Duration>,
}

/// Pool of connections to one logical RPC service.
///
/// Built with [`Rotator::builder`]. Cheap operations only happen under the
/// internal lock; network calls made through the returned clients never
/// hold it.
pub struct Rotator {
    clients: Vec<Arc<RotatingClient>>,
    table: Arc<SlotTable>,
    native: NativeAsset,
    config: RotatorConfig,
}

/// Construction options for a [`Rotator`].
pub struct RotatorBuilder {
    native: NativeAsset,
    config: RotatorConfig,
    notifier: Option<Arc<dyn HealthNotifier>>,
    clock: Arc<dyn Clock>,
}

impl Default for RotatorBuilder {
    fn default() -> Self {
        Self {
            native: NativeAsset::default(),
            config: RotatorConfig::default(),
            notifier: None,
            clock: Arc::new(SystemClock),
        }
    }
}

impl RotatorBuilder {
    pub fn native(mut self, native: NativeAsset) -> Self {
        self.native = native;
        self
    }

    pub fn config(mut self, config: RotatorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn notifier(mut self, notifier: Arc<dyn HealthNotifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Dial every endpoint and build the rotator from the ones that answer.
    ///
    /// Endpoints that fail to dial are skipped for the lifetime of the
    /// rotator. Fails if `endpoints` is empty or no dial succeeds.
    pub async fn connect<S: AsRef<str> + Sync>(
        self,
        endpoints: &[S],
        dialer: &dyn Dialer,
    ) -> Result<Rotator, RotatorError> {
        if endpoints.is_empty() {
            return Err(RotatorError::NoEndpoints);
        }

        let attempts = join_all(endpoints.iter().map(|url| dialer.dial(url.as_ref()))).await;

        let mut transports = Vec::with_capacity(attempts.len());
        for (url, attempt) in endpoints.iter().zip(attempts) {
            let url: &str = url.as_ref();
            match attempt {
                Ok(t) => transports.push(t),
                Err(e) => tracing::warn!(url, error = %e, "skipping unreachable endpoint"),
            }
        }

        if transports.is_empty() {
            return Err(RotatorError::AllDialsFailed { attempted: endpoints.len() });
        }
        self.build(transports)
    }

    /// Build from already-opened transports, one slot each, in order.
    pub fn build(self, transports: Vec<Arc<dyn RpcTransport>>) -> Result<Rotator, RotatorError> {
        if transports.is_empty() {
            return Err(RotatorError::NoEndpoints);
        }

        let table = Arc::new(SlotTable {
            slots: transports
                .iter()
                .map(|t| SlotInfo { url: t.url().to_string(), kind: t.kind() })
                .collect(),
            state: Mutex::new(TableState {
                status: vec![SlotStatus::Active; transports.len()],
                cursor: 0,
                closed: false,
            }),
            notifier: self.notifier,
            clock: self.clock,
            cooldown: self.config.cooldown(),
        });

        let clients = transports
            .into_iter()
            .enumerate()
            .map(|(slot, t)| Arc::new(RotatingClient::new(slot, t, Arc::downgrade(&table))))
            .collect::<Vec<_>>();

        tracing::info!(
            slots = clients.len(),
            symbol = %self.native.symbol,
            "rotator ready"
        );

        Ok(Rotator {
            clients,
            table,
            native: self.native,
            config: self.config,
        })
    }
}

impl Rotator {
    pub fn builder() -> RotatorBuilder {
        RotatorBuilder::default()
    }

    /// Next active connection of `kind`, round robin.
    ///
    /// Lifts expired exclusions first. Never blocks on I/O.
    pub fn next(&self, kind: TransportKind) -> Result<Arc<RotatingClient>, RotatorError> {
        let idx = self.table.select(kind)?;
        Ok(Arc::clone(&self.clients[idx]))
    }

    /// Next active HTTP connection.
    pub fn next_http(&self) -> Result<Arc<RotatingClient>, RotatorError> {
        self.next(TransportKind::RequestResponse)
    }

    /// Next active WebSocket connection.
    pub fn next_ws(&self) -> Result<Arc<RotatingClient>, RotatorError> {
        self.next(TransportKind::Streaming)
    }

    /// The connection in `slot`, active or not. Meant for diagnostics;
    /// regular traffic should go through [`next`](Self::next).
    pub fn client(&self, slot: usize) -> Option<Arc<RotatingClient>> {
        self.clients.get(slot).cloned()
    }

    /// Exclude `slot` for the cooldown period.
    ///
    /// Called automatically by [`RotatingClient`] on a failed call.
    pub fn report_failure(&self, slot: usize, cause: &TransportError) {
        self.table.report_failure(slot, cause);
    }

    /// Close every connection, excluded or not. Later `next` calls fail
    /// with [`RotatorError::Closed`].
    pub fn close(&self) {
        self.table.lock().closed = true;
        for client in &self.clients {
            client.close();
        }
        tracing::info!(slots = self.clients.len(), "rotator closed");
    }

    pub fn native_symbol(&self) -> &str {
        &self.native.symbol
    }

    pub fn native_decimals(&self) -> u32 {
        self.native.decimals
    }

    pub fn config(&self) -> &RotatorConfig {
        &self.config
    }

    /// Number of slots.
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Always `false`: a rotator cannot be built without a slot.
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    /// Per-slot state. Expired exclusions are reported as excluded with zero
    /// time left until the next selection lifts them.
    pub fn health_summary(&self) -> Vec<SlotSummary> {
        let now = self.table.clock.now();
        let state = self.table.lock();
        self.table
            .slots
            .iter()
            .zip(state.status.iter())
            .enumerate()
            .map(|(slot, (info, status))| {
                let (status, excluded_for) = match *status {
                    SlotStatus::Active => (HealthStatus::Healthy, None),
                    SlotStatus::Excluded { until } => (
                        HealthStatus::Unhealthy,
                        Some(until.saturating_duration_since(now)),
                    ),
                };
                SlotSummary {
                    slot,
                    url: info.url.clone(),
                    kind: info.kind,
                    status,
                    excluded_for,
                }
            })
            .collect()
    }
}

impl Rotator {
    /// Run `call` under the configured request timeout. A call that runs
    /// out of time counts as a failure of `slot`.
    async fn timed<T>(
        &self,
        slot: usize,
        call: impl Future<Output = Result<T, TransportError>>,
    ) -> Result<T, TransportError> {
        let Some(timeout) = self.config.request_timeout() else {
            return call.await;
        };
        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => {
                let err = TransportError::Timeout { ms: timeout.as_millis() as u64 };
                self.report_failure(slot, &err);
                Err(err)
            }
        }
    }
}

/// A rotator is itself a transport: each request goes to the next HTTP
/// connection, once. Retrying on another endpoint is up to the caller.
#[async_trait]
impl RpcTransport for Rotator {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        let client = self.next_http()?;
        self.timed(client.slot(), client.send(req)).await
    }

    async fn send_batch(
        &self,
        reqs: Vec<JsonRpcRequest>,
    ) -> Result<Vec<JsonRpcResponse>, TransportError> {
        let client = self.next_http()?;
        self.timed(client.slot(), client.send_batch(reqs)).await
    }

    fn health(&self) -> HealthStatus {
        match self.table.active_count() {
            0 => HealthStatus::Unhealthy,
            n if n == self.clients.len() => HealthStatus::Healthy,
            _ => HealthStatus::Degraded,
        }
    }

    fn url(&self) -> &str {
        "rotator"
    }

    fn close(&self) {
        Rotator::close(self);
    }
}

impl std::fmt::Debug for Rotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Rotator")
            .field("slots", &self.clients.len())
            .field("native", &self.native)
            .finish()
    }
}
