//! chainrotor-directory — chain id → public RPC endpoints.
//!
//! [`EndpointDirectory`] caches the chainlist catalog in memory and on disk,
//! loads it lazily on first use and refreshes it in the background.
//! [`default_rotator`] turns a chain id into a ready [`Rotator`] over that
//! chain's endpoints.
//!
//! ```no_run
//! use chainrotor_core::Rotator;
//! use chainrotor_directory::{default_rotator, DirectoryConfig, EndpointDirectory, SchemeDialer};
//!
//! # async fn run() -> Result<(), chainrotor_directory::DirectoryError> {
//! let directory = EndpointDirectory::open(DirectoryConfig::default()).await?;
//! let rotator = default_rotator(&directory, 1, &SchemeDialer::default(), Rotator::builder()).await?;
//! let client = rotator.next_http()?;
//! # let _ = client;
//! # Ok(())
//! # }
//! ```
//!
//! [`Rotator`]: chainrotor_core::Rotator

pub mod catalog;
pub mod config;
pub mod dialer;
pub mod directory;
pub mod error;
pub mod rotator;
pub mod source;
pub mod store;

pub use catalog::{index_catalog, ChainInfo, EndpointRecord, NativeCurrency, RpcEntry};
pub use config::DirectoryConfig;
pub use dialer::SchemeDialer;
pub use directory::{DirectoryBuilder, EndpointDirectory};
pub use error::DirectoryError;
pub use rotator::default_rotator;
pub use source::{CatalogSource, HttpCatalogSource};
pub use store::{FileSnapshotStore, SnapshotStore};
