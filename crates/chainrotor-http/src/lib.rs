//! chainrotor-http — HTTP request/response transport for ChainRotor.
//!
//! ```rust,no_run
//! use chainrotor_core::RpcTransport;
//! use chainrotor_http::HttpRpcClient;
//!
//! # async fn run() -> Result<(), chainrotor_core::TransportError> {
//! let client = HttpRpcClient::default_for("https://rpc.example.com")?;
//! let block: String = client.call(1, "eth_blockNumber", vec![]).await?;
//! # Ok(())
//! # }
//! ```

pub mod client;

pub use client::{HttpClientConfig, HttpRpcClient};
