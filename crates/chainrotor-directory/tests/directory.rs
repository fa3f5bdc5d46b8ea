//! Directory lifecycle: snapshot start-up, lazy first load, refresh and the
//! rotator factory, driven by in-memory sources and stores.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use chainrotor_core::{Dialer, JsonRpcRequest, JsonRpcResponse, Rotator, RpcTransport, TransportError};
use chainrotor_directory::{
    default_rotator, CatalogSource, ChainInfo, DirectoryConfig, DirectoryError,
    EndpointDirectory, FileSnapshotStore, NativeCurrency, RpcEntry, SnapshotStore,
};
use tokio_util::sync::CancellationToken;

// ─── Fakes ────────────────────────────────────────────────────────────────────

/// Catalog source serving a swappable catalog, or failing on demand.
struct FakeSource {
    catalog: Mutex<Vec<ChainInfo>>,
    failing: AtomicBool,
    fetches: AtomicUsize,
}

impl FakeSource {
    fn new(catalog: Vec<ChainInfo>) -> Arc<Self> {
        Arc::new(Self {
            catalog: Mutex::new(catalog),
            failing: AtomicBool::new(false),
            fetches: AtomicUsize::new(0),
        })
    }

    fn failing() -> Arc<Self> {
        let source = Self::new(vec![]);
        source.failing.store(true, Ordering::SeqCst);
        source
    }

    fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CatalogSource for FakeSource {
    async fn fetch(&self) -> Result<Vec<ChainInfo>, DirectoryError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DirectoryError::Fetch("connection refused".into()));
        }
        Ok(self.catalog.lock().unwrap().clone())
    }

    fn describe(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
struct MemoryStore {
    saved: Mutex<Option<Vec<ChainInfo>>>,
}

#[async_trait]
impl SnapshotStore for MemoryStore {
    async fn load(&self) -> Result<Option<Vec<ChainInfo>>, DirectoryError> {
        Ok(self.saved.lock().unwrap().clone())
    }

    async fn save(&self, catalog: &[ChainInfo]) -> Result<(), DirectoryError> {
        *self.saved.lock().unwrap() = Some(catalog.to_vec());
        Ok(())
    }
}

struct EchoTransport {
    url: String,
}

#[async_trait]
impl RpcTransport for EchoTransport {
    async fn send(&self, req: JsonRpcRequest) -> Result<JsonRpcResponse, TransportError> {
        Ok(JsonRpcResponse::success(req.id, serde_json::json!(self.url)))
    }

    fn url(&self) -> &str {
        &self.url
    }
}

struct EchoDialer;

#[async_trait]
impl Dialer for EchoDialer {
    async fn dial(&self, url: &str) -> Result<Arc<dyn RpcTransport>, TransportError> {
        Ok(Arc::new(EchoTransport { url: url.to_string() }))
    }
}

fn chain(id: i64, symbol: &str, urls: &[&str]) -> ChainInfo {
    ChainInfo {
        chain_id: id,
        name: format!("chain-{id}"),
        icon: String::new(),
        rpc: urls.iter().map(|u| RpcEntry { url: u.to_string() }).collect(),
        native_currency: NativeCurrency {
            name: symbol.to_string(),
            symbol: symbol.to_string(),
            decimals: 18,
        },
    }
}

fn catalog() -> Vec<ChainInfo> {
    vec![
        chain(1, "eth", &["https://mainnet.infura.io/v3/${INFURA_API_KEY}", "https://eth.llamarpc.com"]),
        chain(56, "bnb", &["https://bsc-dataseed.bnbchain.org", "wss://bsc-rpc.publicnode.com"]),
        chain(424242, "dead", &["https://rpc.${NETWORK}.example"]),
    ]
}

async fn open(source: Arc<FakeSource>, store: Arc<dyn SnapshotStore>) -> EndpointDirectory {
    EndpointDirectory::builder(DirectoryConfig::default())
        .source(source)
        .store(store)
        .open()
        .await
        .unwrap()
}

// ─── Resolution ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn resolve_returns_only_dialable_urls() {
    let dir = open(FakeSource::new(catalog()), Arc::new(MemoryStore::default())).await;
    let eth = dir.resolve(1).await.unwrap().unwrap();
    assert_eq!(eth.rpc_urls, vec!["https://eth.llamarpc.com"]);
    assert_eq!(eth.native_symbol, "ETH");
}

#[tokio::test]
async fn unknown_chain_is_none() {
    let dir = open(FakeSource::new(catalog()), Arc::new(MemoryStore::default())).await;
    assert!(dir.resolve(999_999).await.unwrap().is_none());
}

#[tokio::test]
async fn resolved_records_are_copies() {
    let dir = open(FakeSource::new(catalog()), Arc::new(MemoryStore::default())).await;
    let mut bsc = dir.resolve(56).await.unwrap().unwrap();
    bsc.rpc_urls.clear();

    let mut all = dir.resolve_all().await.unwrap();
    all.get_mut(&56).unwrap().rpc_urls.push("https://evil".into());

    assert_eq!(dir.resolve(56).await.unwrap().unwrap().rpc_urls.len(), 2);
    assert_eq!(dir.resolve_all().await.unwrap().len(), 3);
}

// ─── Loading ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_load_failure_is_returned_and_retried() {
    let source = FakeSource::failing();
    let dir = open(source.clone(), Arc::new(MemoryStore::default())).await;
    assert!(!dir.is_loaded());

    let err = dir.resolve(1).await.unwrap_err();
    assert!(matches!(err, DirectoryError::Fetch(_)));

    *source.catalog.lock().unwrap() = catalog();
    source.failing.store(false, Ordering::SeqCst);
    assert!(dir.resolve(1).await.unwrap().is_some());
    assert_eq!(source.fetches(), 2);
}

#[tokio::test]
async fn first_load_happens_once() {
    let source = FakeSource::new(catalog());
    let dir = open(source.clone(), Arc::new(MemoryStore::default())).await;
    for _ in 0..5 {
        dir.resolve(1).await.unwrap();
    }
    dir.resolve_all().await.unwrap();
    assert_eq!(source.fetches(), 1);
}

#[tokio::test]
async fn snapshot_satisfies_first_use_without_fetching() {
    let store = Arc::new(MemoryStore::default());
    store.save(&catalog()).await.unwrap();

    let source = FakeSource::failing();
    let dir = open(source.clone(), store).await;
    assert!(dir.is_loaded());
    assert_eq!(dir.resolve(56).await.unwrap().unwrap().native_symbol, "BNB");
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn remote_load_is_persisted() {
    let store = Arc::new(MemoryStore::default());
    let dir = open(FakeSource::new(catalog()), store.clone()).await;
    dir.resolve(1).await.unwrap();
    assert_eq!(store.saved.lock().unwrap().clone(), Some(catalog()));
}

#[tokio::test]
async fn failed_refresh_keeps_current_data() {
    let source = FakeSource::new(catalog());
    let dir = open(source.clone(), Arc::new(MemoryStore::default())).await;
    let before = dir.resolve_all().await.unwrap();

    source.failing.store(true, Ordering::SeqCst);
    assert!(dir.refresh().await.is_err());
    assert_eq!(dir.resolve_all().await.unwrap(), before);
}

#[tokio::test]
async fn refresh_replaces_the_whole_catalog() {
    let source = FakeSource::new(catalog());
    let dir = open(source.clone(), Arc::new(MemoryStore::default())).await;
    dir.resolve(1).await.unwrap();

    *source.catalog.lock().unwrap() = vec![chain(10, "eth", &["https://mainnet.optimism.io"])];
    assert_eq!(dir.refresh().await.unwrap(), 1);

    assert!(dir.resolve(1).await.unwrap().is_none());
    let ids: Vec<i64> = dir.resolve_all().await.unwrap().into_keys().collect();
    assert_eq!(ids, vec![10]);
}

#[tokio::test]
async fn file_snapshot_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let path = tmp.path().join("chainlist.json");

    let first = open(FakeSource::new(catalog()), Arc::new(FileSnapshotStore::new(&path))).await;
    let fetched: HashMap<_, _> = first.resolve_all().await.unwrap();
    drop(first);

    let offline = FakeSource::failing();
    let second = open(offline.clone(), Arc::new(FileSnapshotStore::new(&path))).await;
    assert_eq!(second.resolve_all().await.unwrap(), fetched);
    assert_eq!(offline.fetches(), 0);
}

#[tokio::test]
async fn shutdown_before_first_load_reports_not_loaded() {
    let token = CancellationToken::new();
    let source = FakeSource::new(catalog());
    let dir = EndpointDirectory::builder(DirectoryConfig::default())
        .source(source.clone())
        .store(Arc::new(MemoryStore::default()))
        .cancel_on(&token)
        .open()
        .await
        .unwrap();

    token.cancel();
    assert!(matches!(dir.resolve(1).await.unwrap_err(), DirectoryError::NotLoaded));
    assert_eq!(source.fetches(), 0);
}

#[tokio::test]
async fn shutdown_keeps_loaded_data_readable() {
    let dir = open(FakeSource::new(catalog()), Arc::new(MemoryStore::default())).await;
    dir.resolve(1).await.unwrap();
    dir.shutdown();
    assert!(dir.resolve(56).await.unwrap().is_some());
}

// ─── Background refresh ───────────────────────────────────────────────────────

fn every_ten_seconds() -> DirectoryConfig {
    DirectoryConfig { refresh_interval_secs: 10, ..Default::default() }
}

#[tokio::test(start_paused = true)]
async fn refresh_runs_each_interval_until_shutdown() {
    let source = FakeSource::new(catalog());
    let dir = EndpointDirectory::builder(every_ten_seconds())
        .source(source.clone())
        .store(Arc::new(MemoryStore::default()))
        .open()
        .await
        .unwrap();

    dir.resolve(1).await.unwrap();
    assert_eq!(source.fetches(), 1);

    tokio::time::sleep(Duration::from_secs(35)).await;
    assert_eq!(source.fetches(), 4);

    dir.shutdown();
    tokio::time::sleep(Duration::from_secs(100)).await;
    assert_eq!(source.fetches(), 4);
}

#[tokio::test(start_paused = true)]
async fn snapshot_start_still_schedules_refreshes() {
    let store = Arc::new(MemoryStore::default());
    store.save(&catalog()).await.unwrap();
    let source = FakeSource::new(vec![chain(10, "eth", &["https://mainnet.optimism.io"])]);
    let dir = EndpointDirectory::builder(every_ten_seconds())
        .source(source.clone())
        .store(store)
        .open()
        .await
        .unwrap();

    assert!(dir.resolve(1).await.unwrap().is_some());
    assert_eq!(source.fetches(), 0);

    tokio::time::sleep(Duration::from_secs(25)).await;
    assert_eq!(source.fetches(), 2);
    assert!(dir.resolve(1).await.unwrap().is_none());
    assert!(dir.resolve(10).await.unwrap().is_some());
}

#[tokio::test(start_paused = true)]
async fn parent_cancellation_stops_refresh() {
    let token = CancellationToken::new();
    let source = FakeSource::new(catalog());
    let dir = EndpointDirectory::builder(every_ten_seconds())
        .source(source.clone())
        .store(Arc::new(MemoryStore::default()))
        .cancel_on(&token)
        .open()
        .await
        .unwrap();

    dir.resolve(1).await.unwrap();
    tokio::time::sleep(Duration::from_secs(15)).await;
    assert_eq!(source.fetches(), 2);

    token.cancel();
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(source.fetches(), 2);
    assert!(dir.resolve(56).await.unwrap().is_some());
}

// ─── Rotator factory ──────────────────────────────────────────────────────────

#[tokio::test]
async fn default_rotator_uses_chain_metadata() {
    let dir = open(FakeSource::new(catalog()), Arc::new(MemoryStore::default())).await;
    let rotator = default_rotator(&dir, 56, &EchoDialer, Rotator::builder()).await.unwrap();

    assert_eq!(rotator.len(), 2);
    assert_eq!(rotator.native_symbol(), "BNB");
    assert_eq!(rotator.native_decimals(), 18);
    assert_eq!(rotator.next_http().unwrap().endpoint(), "https://bsc-dataseed.bnbchain.org");
    assert_eq!(rotator.next_ws().unwrap().endpoint(), "wss://bsc-rpc.publicnode.com");
}

#[tokio::test]
async fn default_rotator_rejects_unknown_and_empty_chains() {
    let dir = open(FakeSource::new(catalog()), Arc::new(MemoryStore::default())).await;

    let err = default_rotator(&dir, 7, &EchoDialer, Rotator::builder()).await.unwrap_err();
    assert!(matches!(err, DirectoryError::UnknownChain(7)));

    let err = default_rotator(&dir, 424242, &EchoDialer, Rotator::builder()).await.unwrap_err();
    assert!(matches!(err, DirectoryError::NoEndpoints(424242)));
}
