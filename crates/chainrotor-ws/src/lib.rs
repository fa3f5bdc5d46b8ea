//! chainrotor-ws — WebSocket JSON-RPC transport for ChainRotor.
//!
//! [`WsRpcClient`] keeps one socket per endpoint, multiplexes concurrent
//! requests over it and reconnects with exponential backoff. Requests in
//! flight when the socket drops fail, so a rotator above it can exclude the
//! endpoint.

pub mod client;

pub use client::{WsClientConfig, WsRpcClient};
