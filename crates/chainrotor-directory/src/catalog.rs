//! Catalog wire types and their reduction to [`EndpointRecord`]s.
//!
//! The catalog is a JSON array of chain entries:
//!
//! ```json
//! [{ "chainId": 1, "name": "Ethereum Mainnet", "icon": "ethereum",
//!    "rpc": [{ "url": "https://eth.llamarpc.com" }],
//!    "nativeCurrency": { "name": "Ether", "symbol": "ETH", "decimals": 18 } }]
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};

use chainrotor_core::rotator::NativeAsset;

/// URLs containing this token are templates (`${INFURA_API_KEY}` and the
/// like) and cannot be dialed as-is.
const PLACEHOLDER: char = '$';

/// One chain as published by the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainInfo {
    #[serde(default)]
    pub chain_id: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub icon: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rpc: Vec<RpcEntry>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub native_currency: NativeCurrency,
}

/// An RPC entry. Accepts both `{"url": ...}` objects and bare strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "RawRpcEntry")]
pub struct RpcEntry {
    pub url: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRpcEntry {
    Bare(String),
    Object {
        #[serde(default, deserialize_with = "null_as_default")]
        url: String,
    },
}

impl From<RawRpcEntry> for RpcEntry {
    fn from(raw: RawRpcEntry) -> Self {
        match raw {
            RawRpcEntry::Bare(url) | RawRpcEntry::Object { url } => Self { url },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NativeCurrency {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub symbol: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub decimals: u32,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Endpoint list and metadata for one chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EndpointRecord {
    pub chain_id: i64,
    /// Dialable URLs, in catalog order.
    pub rpc_urls: Vec<String>,
    /// Upper-cased.
    pub native_symbol: String,
    pub native_decimals: u32,
    pub chain_name: String,
    pub icon: String,
}

impl EndpointRecord {
    /// Build from a catalog entry, dropping URLs that cannot be dialed.
    pub fn from_chain(info: &ChainInfo) -> Self {
        let native = NativeAsset::new(
            info.native_currency.symbol.to_uppercase(),
            info.native_currency.decimals,
        );
        Self {
            chain_id: info.chain_id,
            rpc_urls: info
                .rpc
                .iter()
                .filter(|entry| is_dialable(&entry.url))
                .map(|entry| entry.url.clone())
                .collect(),
            native_symbol: native.symbol,
            native_decimals: native.decimals,
            chain_name: info.name.clone(),
            icon: info.icon.clone(),
        }
    }

    pub fn native_asset(&self) -> NativeAsset {
        NativeAsset::new(self.native_symbol.clone(), self.native_decimals)
    }
}

fn is_dialable(url: &str) -> bool {
    !url.is_empty() && !url.contains(PLACEHOLDER)
}

/// Index a catalog by chain id. Entries with a non-positive id are dropped;
/// a repeated id keeps the last entry.
pub fn index_catalog(catalog: &[ChainInfo]) -> HashMap<i64, EndpointRecord> {
    catalog
        .iter()
        .filter(|info| info.chain_id > 0)
        .map(|info| (info.chain_id, EndpointRecord::from_chain(info)))
        .collect()
}
