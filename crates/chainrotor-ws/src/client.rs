//! WebSocket JSON-RPC client with auto-reconnect.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot};
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use chainrotor_core::error::TransportError;
use chainrotor_core::request::{JsonRpcRequest, JsonRpcResponse, RpcId};
use chainrotor_core::transport::{RpcTransport, TransportKind};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type Reply = oneshot::Sender<Result<JsonRpcResponse, TransportError>>;

/// Configuration for the WebSocket client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WsClientConfig {
    /// Reconnect backoff starting duration, in milliseconds.
    #[serde(default = "default_reconnect_initial_ms")]
    pub reconnect_initial_ms: u64,
    /// Maximum reconnect backoff, in milliseconds.
    #[serde(default = "default_reconnect_max_ms")]
    pub reconnect_max_ms: u64,
    /// How long a request may wait for its response, in milliseconds.
    /// Zero disables it.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_reconnect_initial_ms() -> u64 { 500 }
fn default_reconnect_max_ms() -> u64 { 60_000 }
fn default_request_timeout_ms() -> u64 { 30_000 }

impl Default for WsClientConfig {
    fn default() -> Self {
        Self {
            reconnect_initial_ms: default_reconnect_initial_ms(),
            reconnect_max_ms: default_reconnect_max_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

impl WsClientConfig {
    fn reconnect_initial(&self) -> Duration {
        Duration::from_millis(self.reconnect_initial_ms)
    }

    fn reconnect_max(&self) -> Duration {
        Duration::from_millis(self.reconnect_max_ms)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }
}

/// Command sent from callers to the background WS task.
enum WsCommand {
    Send { req: JsonRpcRequest, tx: Reply },
    Close,
}

/// An in-flight request, keyed by the ID it was sent under.
struct Pending {
    caller_id: RpcId,
    tx: Reply,
}

enum SessionEnd {
    Closed,
    Disconnected,
}

/// WebSocket JSON-RPC client.
///
/// A background task owns the socket. Requests are renumbered on the wire so
/// concurrent callers may reuse IDs; each response carries the caller's
/// original ID. While the socket is down, requests fail immediately instead
/// of queueing. A request that outlives the configured timeout fails with
/// [`TransportError::Timeout`], so a silent endpoint surfaces as an error.
pub struct WsRpcClient {
    url: String,
    cmd_tx: mpsc::UnboundedSender<WsCommand>,
    closed: AtomicBool,
    request_timeout: Option<Duration>,
}

impl WsRpcClient {
    /// Perform the handshake with `url` and start the background task.
    ///
    /// Fails if the initial handshake fails; later disconnects are retried
    /// in the background.
    pub async fn connect(
        url: impl Into<String>,
        config: WsClientConfig,
    ) -> Result<Self, TransportError> {
        let url = url.into();
        let (stream, _) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .map_err(|e| TransportError::Dial { url: url.clone(), reason: e.to_string() })?;
        tracing::info!(url = %url, "WebSocket connected");

        let request_timeout = config.request_timeout();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel::<WsCommand>();
        tokio::spawn(ws_task(url.clone(), stream, cmd_rx, config));

        Ok(Self {
            url,
            cmd_tx,
            closed: AtomicBool::new(false),
            request_timeout,
        })
    }
}

impl Drop for WsRpcClient {
    fn drop(&mut self) {
        let _ = self.cmd_tx.send(WsCommand::Close);
    }
}

#[async_trait]
impl RpcTransport for WsRpcClient {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let (tx, rx) = oneshot::channel();
        self.cmd_tx
            .send(WsCommand::Send { req, tx })
            .map_err(|_| TransportError::WebSocket("WS task closed".into()))?;
        let reply = match self.request_timeout {
            Some(limit) => time::timeout(limit, rx).await.map_err(|_| TransportError::Timeout {
                ms: limit.as_millis() as u64,
            })?,
            None => rx.await,
        };
        reply.map_err(|_| TransportError::WebSocket("WS response dropped".into()))?
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Streaming
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            let _ = self.cmd_tx.send(WsCommand::Close);
        }
    }
}

/// Background task that owns the WebSocket connection.
async fn ws_task(
    url: String,
    mut stream: WsStream,
    mut cmd_rx: mpsc::UnboundedReceiver<WsCommand>,
    config: WsClientConfig,
) {
    loop {
        if let SessionEnd::Closed = run_session(stream, &mut cmd_rx).await {
            tracing::debug!(url = %url, "WS task stopped");
            return;
        }

        let mut backoff = config.reconnect_initial();
        stream = loop {
            tracing::warn!(url = %url, "WS disconnected, reconnecting in {backoff:?}");
            if !wait_rejecting(backoff, &mut cmd_rx).await {
                return;
            }
            match tokio_tungstenite::connect_async(url.as_str()).await {
                Ok((s, _)) => {
                    tracing::info!(url = %url, "WS reconnected");
                    break s;
                }
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "WS reconnect failed");
                    backoff = (backoff * 2).min(config.reconnect_max());
                }
            }
        };
    }
}

/// Sleep for `delay`, failing any request that arrives meanwhile.
/// Returns `false` if the client closed.
async fn wait_rejecting(delay: Duration, cmd_rx: &mut mpsc::UnboundedReceiver<WsCommand>) -> bool {
    let sleep = time::sleep(delay);
    tokio::pin!(sleep);
    loop {
        tokio::select! {
            _ = &mut sleep => return true,
            cmd = cmd_rx.recv() => match cmd {
                None | Some(WsCommand::Close) => return false,
                Some(WsCommand::Send { tx, .. }) => {
                    let _ = tx.send(Err(TransportError::WebSocket("connection lost, reconnecting".into())));
                }
            }
        }
    }
}

/// Multiplex requests over one live socket until it drops or the client
/// closes. Requests still in flight at that point fail.
async fn run_session(stream: WsStream, cmd_rx: &mut mpsc::UnboundedReceiver<WsCommand>) -> SessionEnd {
    let (mut sink, mut source) = stream.split();
    let mut pending: HashMap<u64, Pending> = HashMap::new();
    let mut next_id: u64 = 1;

    let end = 'session: loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                None | Some(WsCommand::Close) => {
                    let _ = sink.send(Message::Close(None)).await;
                    break 'session SessionEnd::Closed;
                }
                Some(WsCommand::Send { mut req, tx }) => {
                    let wire_id = next_id;
                    next_id += 1;
                    let caller_id = std::mem::replace(&mut req.id, RpcId::Number(wire_id));
                    let text = match serde_json::to_string(&req) {
                        Ok(text) => text,
                        Err(e) => {
                            let _ = tx.send(Err(e.into()));
                            continue 'session;
                        }
                    };
                    if let Err(e) = sink.send(Message::Text(text)).await {
                        let _ = tx.send(Err(TransportError::WebSocket(e.to_string())));
                        break 'session SessionEnd::Disconnected;
                    }
                    drop_abandoned(&mut pending);
                    pending.insert(wire_id, Pending { caller_id, tx });
                }
            },
            msg = source.next() => match msg {
                None | Some(Ok(Message::Close(_))) => break 'session SessionEnd::Disconnected,
                Some(Err(e)) => {
                    tracing::warn!(error = %e, "WS receive error");
                    break 'session SessionEnd::Disconnected;
                }
                Some(Ok(Message::Text(text))) => handle_message(&text, &mut pending),
                Some(Ok(_)) => {}
            }
        }
    };

    for (_, p) in pending.drain() {
        let _ = p.tx.send(Err(TransportError::WebSocket(
            "connection closed before response".into(),
        )));
    }
    end
}

/// Forget requests whose caller stopped waiting (timed out or dropped).
fn drop_abandoned(pending: &mut HashMap<u64, Pending>) {
    pending.retain(|_, p| !p.tx.is_closed());
}

fn handle_message(text: &str, pending: &mut HashMap<u64, Pending>) {
    // Subscription notifications carry no `id` and fail to parse here.
    let Ok(mut resp) = serde_json::from_str::<JsonRpcResponse>(text) else {
        tracing::trace!("ignoring non-response WS message");
        return;
    };
    let Some(wire_id) = resp.id.as_number() else {
        return;
    };
    if let Some(p) = pending.remove(&wire_id) {
        resp.id = p.caller_id;
        let _ = p.tx.send(Ok(resp));
    }
}
