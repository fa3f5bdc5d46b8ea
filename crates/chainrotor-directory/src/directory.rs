//! The endpoint directory: chain id → endpoint list, lazily loaded and
//! periodically refreshed.
//!
//! Lifecycle:
//!
//! 1. At open, a persisted snapshot (if any) is installed.
//! 2. The first `resolve`/`resolve_all` fetches the remote catalog if no
//!    snapshot was installed. A failed fetch is returned to the caller and
//!    retried by the next call.
//! 3. Once loaded, a background task refetches on a fixed interval. A failed
//!    refresh is logged and the current data stays in place.
//!
//! Every successful fetch is persisted back to the snapshot store. The
//! in-memory index is replaced as a whole, so readers see either the old or
//! the new catalog, never a mix.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::OnceCell;
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::catalog::{index_catalog, ChainInfo, EndpointRecord};
use crate::config::DirectoryConfig;
use crate::error::DirectoryError;
use crate::source::{CatalogSource, HttpCatalogSource};
use crate::store::{FileSnapshotStore, SnapshotStore};

type ChainIndex = HashMap<i64, EndpointRecord>;

struct Shared {
    config: DirectoryConfig,
    source: Arc<dyn CatalogSource>,
    store: Arc<dyn SnapshotStore>,
    /// `None` until the first snapshot or remote load succeeds.
    chains: RwLock<Option<Arc<ChainIndex>>>,
    cancel: CancellationToken,
}

impl Shared {
    fn current(&self) -> Option<Arc<ChainIndex>> {
        self.chains.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn install(&self, catalog: &[ChainInfo]) -> usize {
        let index = index_catalog(catalog);
        let count = index.len();
        *self.chains.write().unwrap_or_else(|e| e.into_inner()) = Some(Arc::new(index));
        count
    }

    async fn load_remote(&self) -> Result<usize, DirectoryError> {
        tracing::info!(source = %self.source.describe(), "fetching endpoint catalog");
        let catalog = self.source.fetch().await?;

        match self.store.save(&catalog).await {
            Ok(()) => tracing::debug!("persisted endpoint catalog snapshot"),
            Err(e) => tracing::warn!(error = %e, "failed to persist endpoint catalog snapshot"),
        }

        let chains = self.install(&catalog);
        tracing::info!(chains, "loaded endpoint catalog from remote source");
        Ok(chains)
    }
}

async fn refresh_loop(shared: Arc<Shared>) {
    let period = shared.config.refresh_interval();
    let mut ticker = time::interval_at(time::Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shared.cancel.cancelled() => {
                tracing::debug!("endpoint catalog refresh stopped");
                return;
            }
            _ = ticker.tick() => {
                if let Err(e) = shared.load_remote().await {
                    tracing::error!(error = %e, "endpoint catalog refresh failed, keeping current data");
                }
            }
        }
    }
}

/// Cached mapping from chain id to its known RPC endpoints.
///
/// Dropping the directory (or calling [`shutdown`](Self::shutdown)) stops the
/// background refresh.
pub struct EndpointDirectory {
    shared: Arc<Shared>,
    started: OnceCell<()>,
}

/// Construction options for an [`EndpointDirectory`].
pub struct DirectoryBuilder {
    config: DirectoryConfig,
    source: Option<Arc<dyn CatalogSource>>,
    store: Option<Arc<dyn SnapshotStore>>,
    cancel: CancellationToken,
}

impl DirectoryBuilder {
    /// Replace the HTTP catalog source.
    pub fn source(mut self, source: Arc<dyn CatalogSource>) -> Self {
        self.source = Some(source);
        self
    }

    /// Replace the file snapshot store.
    pub fn store(mut self, store: Arc<dyn SnapshotStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Stop refreshing when `parent` is cancelled.
    pub fn cancel_on(mut self, parent: &CancellationToken) -> Self {
        self.cancel = parent.child_token();
        self
    }

    /// Build the directory and install the persisted snapshot, if any.
    pub async fn open(self) -> Result<EndpointDirectory, DirectoryError> {
        let source: Arc<dyn CatalogSource> = match self.source {
            Some(source) => source,
            None => Arc::new(HttpCatalogSource::new(&self.config)?),
        };
        let store: Arc<dyn SnapshotStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileSnapshotStore::new(&self.config.snapshot_path)),
        };

        let shared = Arc::new(Shared {
            config: self.config,
            source,
            store,
            chains: RwLock::new(None),
            cancel: self.cancel,
        });

        match shared.store.load().await {
            Ok(Some(catalog)) => {
                let chains = shared.install(&catalog);
                tracing::info!(chains, "loaded endpoint catalog from snapshot");
            }
            Ok(None) => tracing::debug!("no endpoint catalog snapshot found"),
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable endpoint catalog snapshot"),
        }

        Ok(EndpointDirectory { shared, started: OnceCell::new() })
    }
}

impl EndpointDirectory {
    pub fn builder(config: DirectoryConfig) -> DirectoryBuilder {
        DirectoryBuilder {
            config,
            source: None,
            store: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Open with the HTTP catalog source and file snapshot from `config`.
    pub async fn open(config: DirectoryConfig) -> Result<Self, DirectoryError> {
        Self::builder(config).open().await
    }

    /// Endpoint data for `chain_id`, or `None` for an unknown chain.
    ///
    /// The returned record is a copy; the directory's own data is untouched
    /// by whatever the caller does with it.
    pub async fn resolve(&self, chain_id: i64) -> Result<Option<EndpointRecord>, DirectoryError> {
        let chains = self.loaded().await?;
        Ok(chains.get(&chain_id).cloned())
    }

    /// Copies of every known chain's endpoint data.
    pub async fn resolve_all(&self) -> Result<HashMap<i64, EndpointRecord>, DirectoryError> {
        let chains = self.loaded().await?;
        Ok(chains.as_ref().clone())
    }

    /// Fetch the remote catalog now, outside the refresh schedule.
    /// Returns the number of chains installed.
    pub async fn refresh(&self) -> Result<usize, DirectoryError> {
        self.shared.load_remote().await
    }

    pub fn is_loaded(&self) -> bool {
        self.shared.current().is_some()
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.shared.config
    }

    /// Stop the background refresh. Already-loaded data stays readable.
    pub fn shutdown(&self) {
        self.shared.cancel.cancel();
    }

    async fn loaded(&self) -> Result<Arc<ChainIndex>, DirectoryError> {
        if !self.shared.cancel.is_cancelled() {
            self.started.get_or_try_init(|| self.start()).await?;
        }
        self.shared.current().ok_or(DirectoryError::NotLoaded)
    }

    /// First-use initialisation: load remotely unless a snapshot is already
    /// installed, then schedule refreshes.
    async fn start(&self) -> Result<(), DirectoryError> {
        if !self.is_loaded() {
            self.shared.load_remote().await?;
        }
        tokio::spawn(refresh_loop(Arc::clone(&self.shared)));
        Ok(())
    }
}

impl Drop for EndpointDirectory {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl std::fmt::Debug for EndpointDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointDirectory")
            .field("source", &self.shared.source.describe())
            .field("chains", &self.shared.current().map(|c| c.len()))
            .finish()
    }
}
