//! Building a rotator for a chain straight from the directory.

use chainrotor_core::rotator::{Rotator, RotatorBuilder};
use chainrotor_core::transport::Dialer;

use crate::directory::EndpointDirectory;
use crate::error::DirectoryError;

/// Resolve `chain_id` and dial a rotator over its endpoints.
///
/// The chain's native asset is applied on top of `builder`; its notifier,
/// config and clock are kept. Fails with [`DirectoryError::UnknownChain`]
/// for an absent chain and [`DirectoryError::NoEndpoints`] when the chain
/// has no usable URLs.
pub async fn default_rotator(
    directory: &EndpointDirectory,
    chain_id: i64,
    dialer: &dyn Dialer,
    builder: RotatorBuilder,
) -> Result<Rotator, DirectoryError> {
    let record = directory
        .resolve(chain_id)
        .await?
        .ok_or(DirectoryError::UnknownChain(chain_id))?;
    if record.rpc_urls.is_empty() {
        return Err(DirectoryError::NoEndpoints(chain_id));
    }

    tracing::debug!(chain_id, endpoints = record.rpc_urls.len(), chain = %record.chain_name, "building rotator");
    let rotator = builder
        .native(record.native_asset())
        .connect(&record.rpc_urls, dialer)
        .await?;
    Ok(rotator)
}
