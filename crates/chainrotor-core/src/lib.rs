//! chainrotor-core — endpoint rotation for a single logical RPC service.
//!
//! # Overview
//!
//! A [`Rotator`] holds one connection per reachable endpoint of a node
//! cluster and hands them out round robin, filtered by [`TransportKind`].
//! Calls made through a [`RotatingClient`] that fail exclude that endpoint
//! for a cooldown; the exclusion lifts on the first selection after the
//! deadline. An optional [`HealthNotifier`] observes both transitions.
//!
//! - [`RpcTransport`] / [`Dialer`] — seams implemented by the HTTP and WS crates
//! - [`JsonRpcRequest`] / [`JsonRpcResponse`] — wire types
//! - [`TransportError`] / [`RotatorError`] — structured errors
//! - [`Clock`] — injectable time source for deterministic tests

pub mod clock;
pub mod config;
pub mod connection;
pub mod error;
pub mod notifier;
pub mod request;
pub mod rotator;
pub mod transport;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::RotatorConfig;
pub use connection::RotatingClient;
pub use error::{RotatorError, TransportError};
pub use notifier::{ChannelNotifier, HealthEvent, HealthNotifier, NotifyError, TracingNotifier};
pub use request::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, RpcId};
pub use rotator::{NativeAsset, Rotator, RotatorBuilder, SlotSummary};
pub use transport::{Dialer, HealthStatus, RpcTransport, TransportKind};
