//! Media library façade.
//!
//! Wires the cache, the folder index and the reconciliation engine into the
//! flow a host app drives:
//!
//! 1. [`MediaLibrary::hydrate`] creates the schema, loads the cached folders
//!    and publishes them, so the UI has something to show immediately
//! 2. [`MediaLibrary::start_scan`] spawns a single worker task that owns the
//!    folder index for the duration of the session
//! 3. Every committed batch replaces the published snapshot; hosts read it
//!    with [`MediaLibrary::folders`] or watch it through [`MediaLibrary::subscribe`]
//! 4. [`MediaLibrary::wait_for_scan`] hands the index back and returns the report
//!
//! After a session that ended with a failed commit, the next scan rebuilds the
//! index from the cache first, so writes that landed late are not missed.

use crate::error::{CoreError, Result};
use bridge_traits::media::AssetSource;
use core_library::db::{create_pool, DatabaseConfig};
use core_library::{CacheLoader, FolderIndex, FolderSnapshot, MediaStore, SqliteMediaStore};
use core_runtime::config::CoreConfig;
use core_runtime::events::{CoreEvent, EventBus, LibraryEvent};
use core_sync::{ReconcileConfig, ReconciliationEngine, ScanReport, SyncError, WatchSink};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

type WorkerOutput = (FolderIndex, core_sync::Result<ScanReport>);

/// Where the folder index lives right now
enum IndexSlot {
    /// Held by the library between sessions
    Idle(FolderIndex),
    /// Moved into the scan worker
    Scanning(JoinHandle<WorkerOutput>),
}

/// Host-facing entry point to the media index
pub struct MediaLibrary {
    config: CoreConfig,
    store: Arc<dyn MediaStore>,
    engine: Arc<ReconciliationEngine>,
    event_bus: EventBus,
    sink: Arc<WatchSink>,
    slot: Mutex<IndexSlot>,
    scan_cancel: Mutex<Option<CancellationToken>>,
    shutdown: CancellationToken,
    scanning: Arc<AtomicBool>,
    /// Set when the last session may have left writes the index has not seen
    index_stale: Arc<AtomicBool>,
    hydrated: AtomicBool,
}

impl MediaLibrary {
    /// Open the SQLite cache at `config.database_path` and hydrate from it
    ///
    /// # Errors
    ///
    /// - `CoreError::Config` for an invalid configuration
    /// - `CoreError::Library` if the cache cannot be opened or read
    pub async fn open(config: CoreConfig, source: Arc<dyn AssetSource>) -> Result<Self> {
        config.validate()?;

        let pool = create_pool(DatabaseConfig::new(config.database_path.clone())).await?;
        let library = Self::new(config, Arc::new(SqliteMediaStore::new(pool)), source);
        library.hydrate().await?;

        Ok(library)
    }

    /// Assemble a library over an existing store without touching it
    ///
    /// Nothing is published until [`hydrate`](Self::hydrate) runs.
    pub fn new(config: CoreConfig, store: Arc<dyn MediaStore>, source: Arc<dyn AssetSource>) -> Self {
        let event_bus = EventBus::new(config.event_buffer_size);
        let engine = ReconciliationEngine::new(
            ReconcileConfig::from(&config),
            Arc::clone(&store),
            source,
        )
        .with_event_bus(event_bus.clone());
        let (sink, _) = WatchSink::new(FolderSnapshot::default());

        Self {
            config,
            store,
            engine: Arc::new(engine),
            event_bus,
            sink: Arc::new(sink),
            slot: Mutex::new(IndexSlot::Idle(FolderIndex::new())),
            scan_cancel: Mutex::new(None),
            shutdown: CancellationToken::new(),
            scanning: Arc::new(AtomicBool::new(false)),
            index_stale: Arc::new(AtomicBool::new(false)),
            hydrated: AtomicBool::new(false),
        }
    }

    /// Create the schema, rebuild the folder index from the cache and publish it
    ///
    /// May be called again between sessions to reload from the cache.
    ///
    /// # Errors
    ///
    /// - `SyncError::SessionAlreadyRunning` while a scan owns the index
    /// - `LibraryError::StoreUnavailable` if the cache cannot be read
    #[instrument(skip(self))]
    pub async fn hydrate(&self) -> Result<()> {
        let mut slot = self.slot.lock().await;
        if matches!(*slot, IndexSlot::Scanning(_)) {
            return Err(SyncError::SessionAlreadyRunning.into());
        }

        self.store.initialize().await?;
        let index = CacheLoader::new(Arc::clone(&self.store)).load().await?;

        let snapshot = index.snapshot();
        self.event_bus
            .emit(CoreEvent::Library(LibraryEvent::CacheLoaded {
                folders: snapshot.len() as u64,
                videos: snapshot.total_videos() as u64,
            }))
            .ok();
        self.publish(snapshot);

        *slot = IndexSlot::Idle(index);
        self.index_stale.store(false, Ordering::SeqCst);
        self.hydrated.store(true, Ordering::SeqCst);

        info!("Media library hydrated from cache");
        Ok(())
    }

    /// Start a reconciliation session on a background worker
    ///
    /// Returns as soon as the worker is spawned. Progress shows up in the
    /// published snapshot; the outcome comes from [`wait_for_scan`](Self::wait_for_scan).
    ///
    /// # Errors
    ///
    /// - `CoreError::InitializationFailed` before the first hydrate
    /// - `SyncError::SessionAlreadyRunning` while another session runs
    #[instrument(skip(self))]
    pub async fn start_scan(&self) -> Result<()> {
        if !self.is_hydrated() {
            return Err(CoreError::InitializationFailed(
                "hydrate the library before starting a scan".to_string(),
            ));
        }

        let mut slot = self.slot.lock().await;
        if let IndexSlot::Scanning(handle) = &*slot {
            if !handle.is_finished() {
                warn!("Scan requested while another one is running");
                return Err(SyncError::SessionAlreadyRunning.into());
            }
        }

        let mut index = match std::mem::replace(&mut *slot, IndexSlot::Idle(FolderIndex::new())) {
            IndexSlot::Idle(index) => index,
            IndexSlot::Scanning(handle) => {
                let (index, result) = self.join_worker(handle).await;
                if let Err(err) = result {
                    warn!(error = %err, "Previous scan ended with an error nobody collected");
                }
                index
            }
        };

        if self.index_stale.load(Ordering::SeqCst) {
            // A commit the last session gave up on may have landed since
            match CacheLoader::new(Arc::clone(&self.store)).load().await {
                Ok(fresh) => {
                    info!("Reloaded folder index from cache after an unfinished commit");
                    index = fresh;
                    self.publish(index.snapshot());
                    self.index_stale.store(false, Ordering::SeqCst);
                }
                Err(err) => {
                    *slot = IndexSlot::Idle(index);
                    return Err(err.into());
                }
            }
        }

        let cancel = self.shutdown.child_token();
        *self.scan_cancel.lock().await = Some(cancel.clone());

        let engine = Arc::clone(&self.engine);
        let sink = Arc::clone(&self.sink);
        let scanning = Arc::clone(&self.scanning);
        let index_stale = Arc::clone(&self.index_stale);
        scanning.store(true, Ordering::SeqCst);

        let handle = tokio::spawn(async move {
            let result = engine.run(&mut index, &*sink, &cancel).await;
            if matches!(
                result,
                Err(SyncError::CommitFailed { .. } | SyncError::SessionAlreadyRunning)
            ) {
                index_stale.store(true, Ordering::SeqCst);
            }
            scanning.store(false, Ordering::SeqCst);
            (index, result)
        });
        *slot = IndexSlot::Scanning(handle);

        info!(page_size = self.config.page_size, "Scan worker started");
        Ok(())
    }

    /// Ask the running session to stop before its next batch
    ///
    /// Returns `false` if no session is running.
    pub async fn cancel_scan(&self) -> bool {
        match self.scan_cancel.lock().await.as_ref() {
            Some(token) if self.is_scanning() => {
                info!("Cancelling scan");
                token.cancel();
                true
            }
            _ => false,
        }
    }

    /// Wait for the current or last unclaimed session and take back the index
    ///
    /// # Errors
    ///
    /// - `CoreError::NoActiveScan` if no session was started since the last wait
    /// - `CoreError::Sync` with the session's error
    /// - `CoreError::Worker` if the worker task panicked; the index is then
    ///   rebuilt from the cache
    pub async fn wait_for_scan(&self) -> Result<ScanReport> {
        let mut slot = self.slot.lock().await;

        match std::mem::replace(&mut *slot, IndexSlot::Idle(FolderIndex::new())) {
            IndexSlot::Idle(index) => {
                *slot = IndexSlot::Idle(index);
                Err(CoreError::NoActiveScan)
            }
            IndexSlot::Scanning(handle) => {
                let (index, result) = self.join_worker(handle).await;
                *slot = IndexSlot::Idle(index);
                *self.scan_cancel.lock().await = None;
                result
            }
        }
    }

    pub fn is_scanning(&self) -> bool {
        self.scanning.load(Ordering::SeqCst)
    }

    /// Whether the cached folders have been published
    pub fn is_hydrated(&self) -> bool {
        self.hydrated.load(Ordering::SeqCst)
    }

    /// Latest published folder snapshot
    pub fn folders(&self) -> FolderSnapshot {
        self.sink.current()
    }

    /// Receiver that observes every newly published snapshot
    pub fn subscribe(&self) -> watch::Receiver<FolderSnapshot> {
        self.sink.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    fn publish(&self, snapshot: FolderSnapshot) {
        self.sink.publish(snapshot);
    }

    async fn join_worker(
        &self,
        handle: JoinHandle<WorkerOutput>,
    ) -> (FolderIndex, Result<ScanReport>) {
        match handle.await {
            Ok((index, result)) => (index, result.map_err(CoreError::from)),
            Err(join_err) => {
                error!(error = %join_err, "Scan worker did not finish");
                self.scanning.store(false, Ordering::SeqCst);

                let index = match CacheLoader::new(Arc::clone(&self.store)).load().await {
                    Ok(index) => index,
                    Err(err) => {
                        warn!(error = %err, "Could not rebuild folder index after worker failure");
                        FolderIndex::new()
                    }
                };
                self.publish(index.snapshot());

                (index, Err(CoreError::Worker(join_err.to_string())))
            }
        }
    }
}

impl Drop for MediaLibrary {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}
