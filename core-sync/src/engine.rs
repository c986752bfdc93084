//! # Reconciliation Engine
//!
//! Brings the persistent media cache and the folder index in line with an
//! external asset source, one page at a time.
//!
//! ## Workflow
//!
//! For every page, strictly in sequence:
//! 1. Check the cancellation token (between batches only)
//! 2. Fetch the page through the cursor, bounded by `fetch_timeout`
//! 3. Normalize descriptors and collapse repeated ids
//! 4. Look up each stored modification time; stage items that are new or differ
//! 5. Commit the staged items in one transaction, bounded by `commit_timeout`
//! 6. Apply the committed items to the folder index
//! 7. Hand a snapshot to the progress sink
//!
//! Steps 5 to 7 run only when the page changed something. The index is never
//! touched before the commit returns, so it never shows data that is not
//! durable. A failing batch aborts the session; earlier batches stay committed.
//!
//! A commit that outlives `commit_timeout` is not cancelled: it keeps running
//! on its own task and the store stays leased until it settles. Staged records
//! that are already durable when the engine gives up are applied to the index
//! before the session aborts. A write that lands even later is only picked up
//! by the next cache load.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use core_sync::{ReconcileConfig, ReconciliationEngine, WatchSink};
//! use tokio_util::sync::CancellationToken;
//!
//! let engine = ReconciliationEngine::new(ReconcileConfig::default(), store, source)
//!     .with_event_bus(event_bus);
//! let (sink, folders) = WatchSink::new(index.snapshot());
//!
//! let report = engine.run(&mut index, &sink, &CancellationToken::new()).await?;
//! println!("{} items changed", report.items_changed());
//! ```

use crate::normalize::DescriptorNormalizer;
use crate::session::{ScanSession, SessionId, SessionState};
use crate::sink::ProgressSink;
use crate::{Result, SyncError};
use bridge_traits::media::{AssetPage, AssetSource, MediaKind, PageRequest, ScanCursor};
use core_library::{FolderIndex, MediaRecord, MediaStore};
use core_runtime::config::{
    CoreConfig, DEFAULT_FALLBACK_FOLDER_NAME, DEFAULT_FALLBACK_FOLDER_PATH, DEFAULT_PAGE_SIZE,
};
use core_runtime::events::{CoreEvent, EventBus, ScanEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Upper bound for one progress sink delivery
pub const DEFAULT_SINK_TIMEOUT: Duration = Duration::from_secs(5);

/// Engine settings
#[derive(Debug, Clone)]
pub struct ReconcileConfig {
    /// Items requested per page
    pub page_size: u32,
    /// Upper bound for one page fetch
    pub fetch_timeout: Duration,
    /// How long to wait for a batch commit before aborting the session
    pub commit_timeout: Duration,
    /// Upper bound for one progress sink delivery
    pub sink_timeout: Duration,
    /// Only assets of this kind are indexed
    pub media_kind: MediaKind,
    pub fallback_folder_path: String,
    pub fallback_folder_name: String,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            fetch_timeout: Duration::from_secs(30),
            commit_timeout: Duration::from_secs(30),
            sink_timeout: DEFAULT_SINK_TIMEOUT,
            media_kind: MediaKind::Video,
            fallback_folder_path: DEFAULT_FALLBACK_FOLDER_PATH.to_string(),
            fallback_folder_name: DEFAULT_FALLBACK_FOLDER_NAME.to_string(),
        }
    }
}

impl From<&CoreConfig> for ReconcileConfig {
    fn from(config: &CoreConfig) -> Self {
        Self {
            page_size: config.page_size,
            fetch_timeout: config.fetch_timeout,
            commit_timeout: config.commit_timeout,
            sink_timeout: DEFAULT_SINK_TIMEOUT,
            media_kind: config.media_kind,
            fallback_folder_path: config.fallback_folder_path.clone(),
            fallback_folder_name: config.fallback_folder_name.clone(),
        }
    }
}

/// Counters for one finished session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    pub session_id: SessionId,
    pub state: SessionState,
    pub pages_fetched: u64,
    /// Items left after normalization and in-page de-duplication
    pub items_seen: u64,
    pub items_skipped: u64,
    pub items_unchanged: u64,
    pub items_added: u64,
    pub items_updated: u64,
    pub batches_committed: u64,
    pub snapshots_emitted: u64,
    pub sink_failures: u64,
    pub duration: Duration,
}

impl ScanReport {
    fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            state: SessionState::Idle,
            pages_fetched: 0,
            items_seen: 0,
            items_skipped: 0,
            items_unchanged: 0,
            items_added: 0,
            items_updated: 0,
            batches_committed: 0,
            snapshots_emitted: 0,
            sink_failures: 0,
            duration: Duration::ZERO,
        }
    }

    /// Items written to the store during the session
    pub fn items_changed(&self) -> u64 {
        self.items_added + self.items_updated
    }
}

type PendingWrite = JoinHandle<core_library::Result<()>>;

enum CommitFailure {
    /// The store answered with an error; the transaction rolled back
    Rejected(SyncError),
    /// No answer in time; the write is still running
    TimedOut { error: SyncError, write: PendingWrite },
}

/// Paginates an asset source into the media store and folder index
pub struct ReconciliationEngine {
    config: ReconcileConfig,
    store: Arc<dyn MediaStore>,
    source: Arc<dyn AssetSource>,
    normalizer: DescriptorNormalizer,
    event_bus: Option<EventBus>,
}

impl ReconciliationEngine {
    pub fn new(
        config: ReconcileConfig,
        store: Arc<dyn MediaStore>,
        source: Arc<dyn AssetSource>,
    ) -> Self {
        let normalizer = DescriptorNormalizer::new(
            config.media_kind,
            config.fallback_folder_path.clone(),
            config.fallback_folder_name.clone(),
        );

        Self {
            config,
            store,
            source,
            normalizer,
            event_bus: None,
        }
    }

    /// Publish lifecycle events on `event_bus`
    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Run one reconciliation session to completion
    ///
    /// `index` must reflect the store when the call starts (normally the
    /// bootstrap result). It is updated batch by batch and stays valid when
    /// the session aborts.
    ///
    /// # Errors
    ///
    /// - `SessionAlreadyRunning` if another session holds the store; nothing is touched
    /// - `SourceUnavailable` if a page fetch fails or times out
    /// - `StoreUnavailable` if a modification-time lookup fails
    /// - `CommitFailed` if a batch transaction fails or times out
    /// - `Cancelled` if `cancel` fired before a batch started
    #[instrument(skip_all, fields(source = %self.source.name()))]
    pub async fn run(
        &self,
        index: &mut FolderIndex,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
    ) -> Result<ScanReport> {
        let lease = self.store.try_begin_session().ok_or_else(|| {
            warn!("Rejected scan: another session is running");
            SyncError::SessionAlreadyRunning
        })?;

        let mut session = ScanSession::new();
        let mut report = ScanReport::new(session.id());
        let started = Instant::now();

        info!(
            session_id = %session.id(),
            page_size = self.config.page_size,
            "Starting reconciliation session"
        );
        self.emit(ScanEvent::Started {
            session_id: session.id().to_string(),
            page_size: self.config.page_size,
        });

        let mut pending = None;
        let outcome = self
            .paginate(&mut session, index, sink, cancel, &mut report, &mut pending)
            .await;

        report.duration = started.elapsed();

        if let Some(write) = pending.filter(|write| !write.is_finished()) {
            // No new session may start until the abandoned write settles
            tokio::spawn(async move {
                let _lease = lease;
                match write.await {
                    Ok(Ok(())) => warn!("Abandoned batch commit completed late"),
                    Ok(Err(err)) => warn!(error = %err, "Abandoned batch commit failed"),
                    Err(err) => warn!(error = %err, "Abandoned batch commit did not finish"),
                }
            });
        }

        match outcome {
            Ok(()) => {
                report.state = session.state();
                info!(
                    session_id = %session.id(),
                    pages = report.pages_fetched,
                    added = report.items_added,
                    updated = report.items_updated,
                    unchanged = report.items_unchanged,
                    elapsed_ms = report.duration.as_millis() as u64,
                    "Reconciliation session completed"
                );
                self.emit(ScanEvent::Completed {
                    session_id: session.id().to_string(),
                    pages_fetched: report.pages_fetched,
                    items_seen: report.items_seen,
                    items_added: report.items_added,
                    items_updated: report.items_updated,
                    duration_ms: report.duration.as_millis() as u64,
                });
                Ok(report)
            }
            Err(err) => {
                session.abort();

                if matches!(err, SyncError::Cancelled) {
                    info!(
                        session_id = %session.id(),
                        batches_committed = report.batches_committed,
                        "Reconciliation session cancelled"
                    );
                    self.emit(ScanEvent::Cancelled {
                        session_id: session.id().to_string(),
                        batches_committed: report.batches_committed,
                    });
                } else {
                    error!(
                        session_id = %session.id(),
                        batch = session.batch(),
                        batches_committed = report.batches_committed,
                        error = %err,
                        "Reconciliation session aborted"
                    );
                    self.emit(ScanEvent::Failed {
                        session_id: session.id().to_string(),
                        message: err.to_string(),
                        batches_committed: report.batches_committed,
                    });
                }

                Err(err)
            }
        }
    }

    async fn paginate(
        &self,
        session: &mut ScanSession,
        index: &mut FolderIndex,
        sink: &dyn ProgressSink,
        cancel: &CancellationToken,
        report: &mut ScanReport,
        pending: &mut Option<PendingWrite>,
    ) -> Result<()> {
        session.transition(SessionState::Paginating)?;
        let mut cursor: Option<ScanCursor> = None;

        loop {
            if cancel.is_cancelled() {
                return Err(SyncError::Cancelled);
            }

            let page = self.fetch_page(cursor.take()).await?;
            report.pages_fetched += 1;

            session.transition(SessionState::BatchDiffing)?;
            let batch = session.batch();

            let AssetPage {
                items,
                next_cursor,
                has_more,
            } = page;

            let normalized = self.normalizer.normalize_page(items);
            report.items_skipped += normalized.skipped;
            report.items_seen += normalized.records.len() as u64;

            let staged = self.diff(normalized.records, report).await?;

            debug!(
                batch,
                staged = staged.len(),
                skipped = normalized.skipped,
                duplicates = normalized.duplicates,
                "Diffed batch"
            );

            if !staged.is_empty() {
                session.transition(SessionState::BatchCommitting)?;

                match self.commit(batch, &staged).await {
                    Ok(()) => {}
                    Err(CommitFailure::Rejected(err)) => return Err(err),
                    Err(CommitFailure::TimedOut { error, write }) => {
                        *pending = Some(write);
                        let landed = timeout(self.config.commit_timeout, self.find_landed(&staged))
                            .await
                            .unwrap_or_default();
                        if !landed.is_empty() {
                            warn!(
                                batch,
                                landed = landed.len(),
                                "Timed-out commit is durable; updating index"
                            );
                            self.apply_batch(session, batch, index, sink, landed, report)
                                .await?;
                        }
                        return Err(error);
                    }
                }

                self.apply_batch(session, batch, index, sink, staged, report)
                    .await?;
            }

            if !has_more {
                session.transition(SessionState::Done)?;
                return Ok(());
            }

            // More pages without a way to reach them would restart the listing
            let Some(next) = next_cursor else {
                return Err(SyncError::SourceUnavailable(format!(
                    "{} reported more items after batch {} without a cursor",
                    self.source.name(),
                    batch
                )));
            };

            session.transition(SessionState::Paginating)?;
            cursor = Some(next);
        }
    }

    async fn fetch_page(&self, cursor: Option<ScanCursor>) -> Result<AssetPage> {
        let request = PageRequest::after(cursor, self.config.page_size, self.config.media_kind);

        match timeout(self.config.fetch_timeout, self.source.fetch_page(request)).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(err)) => {
                warn!(error = %err, "Page fetch failed");
                Err(SyncError::SourceUnavailable(err.to_string()))
            }
            Err(_) => {
                let err = SyncError::Timeout {
                    operation: "fetch_page".to_string(),
                    after: self.config.fetch_timeout,
                };
                warn!(error = %err, "Page fetch timed out");
                Err(SyncError::SourceUnavailable(err.to_string()))
            }
        }
    }

    /// Keep only records that are absent from the store or carry a different
    /// modification time
    async fn diff(
        &self,
        records: Vec<MediaRecord>,
        report: &mut ScanReport,
    ) -> Result<Vec<MediaRecord>> {
        let mut staged = Vec::new();

        for record in records {
            let stored = self
                .store
                .lookup_modified_at(&record.id)
                .await
                .map_err(|e| SyncError::StoreUnavailable(e.to_string()))?;

            match stored {
                None => {
                    report.items_added += 1;
                    staged.push(record);
                }
                Some(modified_at) if modified_at != record.modified_at => {
                    report.items_updated += 1;
                    staged.push(record);
                }
                Some(_) => report.items_unchanged += 1,
            }
        }

        Ok(staged)
    }

    /// Write `records` in one transaction
    ///
    /// The write runs on its own task so that giving up on it never drops a
    /// transaction halfway through its commit.
    async fn commit(
        &self,
        batch: u64,
        records: &[MediaRecord],
    ) -> std::result::Result<(), CommitFailure> {
        let store = Arc::clone(&self.store);
        let records = records.to_vec();
        let mut write = tokio::spawn(async move { store.commit_batch(records).await });

        let failed = |reason: String| SyncError::CommitFailed { batch, reason };

        let outcome = timeout(self.config.commit_timeout, &mut write).await;
        match outcome {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(err))) => Err(CommitFailure::Rejected(failed(err.to_string()))),
            Ok(Err(join_err)) => Err(CommitFailure::Rejected(failed(join_err.to_string()))),
            Err(_) => {
                let error = failed(
                    SyncError::Timeout {
                        operation: "commit_batch".to_string(),
                        after: self.config.commit_timeout,
                    }
                    .to_string(),
                );
                warn!(batch, error = %error, "Batch commit timed out");
                Err(CommitFailure::TimedOut { error, write })
            }
        }
    }

    /// Staged records whose exact version is already in the store
    async fn find_landed(&self, staged: &[MediaRecord]) -> Vec<MediaRecord> {
        let mut landed = Vec::new();

        for record in staged {
            match self.store.lookup_modified_at(&record.id).await {
                Ok(Some(modified_at)) if modified_at == record.modified_at => {
                    landed.push(record.clone())
                }
                Ok(_) => {}
                Err(err) => warn!(id = %record.id, error = %err, "Could not verify staged record"),
            }
        }

        landed
    }

    /// Apply durable records to the index and hand the result to the sink
    async fn apply_batch(
        &self,
        session: &mut ScanSession,
        batch: u64,
        index: &mut FolderIndex,
        sink: &dyn ProgressSink,
        records: Vec<MediaRecord>,
        report: &mut ScanReport,
    ) -> Result<()> {
        report.batches_committed += 1;
        session.transition(SessionState::BatchEmitting)?;

        let changed = records.len() as u64;
        for record in records {
            index.apply_upsert(record);
        }

        let snapshot = index.snapshot();
        let folders = snapshot.len() as u64;
        let delivery = timeout(self.config.sink_timeout, sink.on_folders_updated(snapshot))
            .await
            .unwrap_or_else(|_| {
                Err(SyncError::Timeout {
                    operation: "on_folders_updated".to_string(),
                    after: self.config.sink_timeout,
                })
            });
        match delivery {
            Ok(()) => report.snapshots_emitted += 1,
            Err(err) => {
                report.sink_failures += 1;
                warn!(batch, error = %err, "Progress sink rejected snapshot");
            }
        }

        self.emit(ScanEvent::BatchCommitted {
            session_id: session.id().to_string(),
            batch,
            changed,
            folders,
        });
        Ok(())
    }

    fn emit(&self, event: ScanEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Scan(event)).ok();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::FnSink;
    use async_trait::async_trait;
    use bridge_traits::error::{BridgeError, Result as BridgeResult};
    use bridge_traits::media::AssetDescriptor;
    use core_library::{FolderSnapshot, LibraryError, SessionLease, SessionLock};
    use mockall::mock;
    use mockall::predicate::*;
    use std::sync::Mutex;

    mock! {
        Source {}

        #[async_trait]
        impl AssetSource for Source {
            async fn fetch_page(&self, request: PageRequest) -> BridgeResult<AssetPage>;
            fn name(&self) -> &str;
        }
    }

    mock! {
        Store {}

        #[async_trait]
        impl MediaStore for Store {
            async fn initialize(&self) -> core_library::Result<()>;
            async fn scan_all(&self) -> core_library::Result<Vec<MediaRecord>>;
            async fn lookup_modified_at(&self, id: &str) -> core_library::Result<Option<i64>>;
            async fn commit_batch(&self, records: Vec<MediaRecord>) -> core_library::Result<()>;
            async fn find_by_id(&self, id: &str) -> core_library::Result<Option<MediaRecord>>;
            async fn find_by_folder(&self, folder_path: &str) -> core_library::Result<Vec<MediaRecord>>;
            async fn count(&self) -> core_library::Result<u64>;
            fn try_begin_session(&self) -> Option<SessionLease>;
        }
    }

    fn asset(id: &str, modified_at: i64) -> AssetDescriptor {
        AssetDescriptor {
            id: id.to_string(),
            uri: format!("/sdcard/Movies/{}.mp4", id),
            filename: format!("{}.mp4", id),
            kind: MediaKind::Video,
            modified_at: Some(modified_at),
            ..Default::default()
        }
    }

    fn source_with_pages(pages: Vec<AssetPage>) -> MockSource {
        let pages = Mutex::new(pages.into_iter());
        let mut source = MockSource::new();
        source.expect_name().return_const("mock-source".to_string());
        source
            .expect_fetch_page()
            .returning(move |_| Ok(pages.lock().unwrap().next().unwrap_or_default()));
        source
    }

    fn store_with_lock(lock: &SessionLock) -> MockStore {
        let lock = lock.clone();
        let mut store = MockStore::new();
        store
            .expect_try_begin_session()
            .returning(move || lock.try_acquire());
        store
    }

    fn recording_sink() -> (FnSink<impl Fn(FolderSnapshot) -> Result<()> + Send + Sync>, Arc<Mutex<Vec<FolderSnapshot>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let target = Arc::clone(&seen);
        let sink = FnSink::new(move |snapshot| {
            target.lock().unwrap().push(snapshot);
            Ok(())
        });
        (sink, seen)
    }

    #[tokio::test]
    async fn test_mixed_batch_writes_only_changed_items() {
        let lock = SessionLock::new();
        let mut store = store_with_lock(&lock);

        // u1..u3 unchanged, c1/c2 changed, n1 new
        store.expect_lookup_modified_at().returning(|id| {
            Ok(match id {
                "u1" | "u2" | "u3" => Some(100),
                "c1" | "c2" => Some(50),
                _ => None,
            })
        });
        store
            .expect_commit_batch()
            .withf(|records| {
                let mut ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
                ids.sort();
                ids == ["c1", "c2", "n1"]
            })
            .times(1)
            .returning(|_| Ok(()));

        let source = source_with_pages(vec![AssetPage::last(vec![
            asset("u1", 100),
            asset("u2", 100),
            asset("u3", 100),
            asset("c1", 200),
            asset("c2", 200),
            asset("n1", 300),
        ])]);

        let engine = ReconciliationEngine::new(
            ReconcileConfig::default(),
            Arc::new(store),
            Arc::new(source),
        );
        let (sink, seen) = recording_sink();
        let mut index = FolderIndex::new();

        let report = engine
            .run(&mut index, &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.state, SessionState::Done);
        assert_eq!(report.items_unchanged, 3);
        assert_eq!(report.items_updated, 2);
        assert_eq!(report.items_added, 1);
        assert_eq!(report.batches_committed, 1);
        assert_eq!(seen.lock().unwrap().len(), 1);
        assert_eq!(index.video_count(), 3);
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn test_unchanged_batch_emits_nothing() {
        let lock = SessionLock::new();
        let mut store = store_with_lock(&lock);
        store.expect_lookup_modified_at().returning(|_| Ok(Some(7)));
        store.expect_commit_batch().never();

        let source = source_with_pages(vec![AssetPage::last(vec![asset("a", 7), asset("b", 7)])]);
        let engine = ReconciliationEngine::new(
            ReconcileConfig::default(),
            Arc::new(store),
            Arc::new(source),
        );
        let (sink, seen) = recording_sink();

        let report = engine
            .run(&mut FolderIndex::new(), &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.items_changed(), 0);
        assert_eq!(report.snapshots_emitted, 0);
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_busy_store_is_rejected_without_side_effects() {
        let lock = SessionLock::new();
        let _held = lock.try_acquire().unwrap();

        let mut store = store_with_lock(&lock);
        store.expect_lookup_modified_at().never();
        store.expect_commit_batch().never();

        let mut source = MockSource::new();
        source.expect_name().return_const("mock-source".to_string());
        source.expect_fetch_page().never();

        let engine = ReconciliationEngine::new(
            ReconcileConfig::default(),
            Arc::new(store),
            Arc::new(source),
        );
        let (sink, seen) = recording_sink();

        let result = engine
            .run(&mut FolderIndex::new(), &sink, &CancellationToken::new())
            .await;

        assert!(matches!(result, Err(SyncError::SessionAlreadyRunning)));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_source_failure_keeps_prior_batches() {
        let lock = SessionLock::new();
        let mut store = store_with_lock(&lock);
        store.expect_lookup_modified_at().returning(|_| Ok(None));
        store.expect_commit_batch().times(1).returning(|_| Ok(()));

        let mut source = MockSource::new();
        source.expect_name().return_const("mock-source".to_string());
        source
            .expect_fetch_page()
            .withf(|request| request.cursor.is_none())
            .times(1)
            .returning(|_| Ok(AssetPage::more(vec![asset("a", 1)], ScanCursor::new("p2"))));
        source
            .expect_fetch_page()
            .withf(|request| request.cursor == Some(ScanCursor::new("p2")))
            .times(1)
            .returning(|_| Err(BridgeError::AccessDenied("media permission revoked".to_string())));

        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let engine = ReconciliationEngine::new(
            ReconcileConfig::default(),
            Arc::new(store),
            Arc::new(source),
        )
        .with_event_bus(bus);
        let (sink, seen) = recording_sink();
        let mut index = FolderIndex::new();

        let result = engine.run(&mut index, &sink, &CancellationToken::new()).await;

        assert!(matches!(result, Err(SyncError::SourceUnavailable(_))));
        assert_eq!(index.video_count(), 1);
        assert_eq!(seen.lock().unwrap().len(), 1);

        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        assert!(matches!(
            last,
            Some(CoreEvent::Scan(ScanEvent::Failed { batches_committed: 1, .. }))
        ));
    }

    #[tokio::test]
    async fn test_commit_failure_leaves_index_untouched() {
        let lock = SessionLock::new();
        let mut store = store_with_lock(&lock);
        store.expect_lookup_modified_at().returning(|_| Ok(None));
        store
            .expect_commit_batch()
            .returning(|_| Err(LibraryError::Transaction("disk full".to_string())));

        let source = source_with_pages(vec![AssetPage::last(vec![asset("a", 1)])]);
        let engine = ReconciliationEngine::new(
            ReconcileConfig::default(),
            Arc::new(store),
            Arc::new(source),
        );
        let (sink, seen) = recording_sink();
        let mut index = FolderIndex::new();

        let result = engine.run(&mut index, &sink, &CancellationToken::new()).await;

        match result {
            Err(SyncError::CommitFailed { batch, reason }) => {
                assert_eq!(batch, 1);
                assert!(reason.contains("disk full"));
            }
            other => panic!("expected CommitFailed, got {:?}", other),
        }
        assert!(index.is_empty());
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_lookup_failure_is_store_unavailable() {
        let lock = SessionLock::new();
        let mut store = store_with_lock(&lock);
        store
            .expect_lookup_modified_at()
            .returning(|_| Err(LibraryError::StoreUnavailable("database is locked".to_string())));
        store.expect_commit_batch().never();

        let source = source_with_pages(vec![AssetPage::last(vec![asset("a", 1)])]);
        let engine = ReconciliationEngine::new(
            ReconcileConfig::default(),
            Arc::new(store),
            Arc::new(source),
        );
        let (sink, _seen) = recording_sink();

        let result = engine
            .run(&mut FolderIndex::new(), &sink, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SyncError::StoreUnavailable(_))));
    }

    #[tokio::test]
    async fn test_cancelled_before_first_batch() {
        let lock = SessionLock::new();
        let store = store_with_lock(&lock);

        let mut source = MockSource::new();
        source.expect_name().return_const("mock-source".to_string());
        source.expect_fetch_page().never();

        let engine = ReconciliationEngine::new(
            ReconcileConfig::default(),
            Arc::new(store),
            Arc::new(source),
        );
        let (sink, _seen) = recording_sink();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = engine.run(&mut FolderIndex::new(), &sink, &cancel).await;
        assert!(matches!(result, Err(SyncError::Cancelled)));
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn test_sink_failure_does_not_abort() {
        let lock = SessionLock::new();
        let mut store = store_with_lock(&lock);
        store.expect_lookup_modified_at().returning(|_| Ok(None));
        store.expect_commit_batch().times(2).returning(|_| Ok(()));

        let source = source_with_pages(vec![
            AssetPage::more(vec![asset("a", 1)], ScanCursor::new("2")),
            AssetPage::last(vec![asset("b", 1)]),
        ]);
        let engine = ReconciliationEngine::new(
            ReconcileConfig::default(),
            Arc::new(store),
            Arc::new(source),
        );
        let sink = FnSink::new(|_| Err(SyncError::Sink("ui gone".to_string())));
        let mut index = FolderIndex::new();

        let report = engine
            .run(&mut index, &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.batches_committed, 2);
        assert_eq!(report.sink_failures, 2);
        assert_eq!(report.snapshots_emitted, 0);
        assert_eq!(index.video_count(), 2);
    }

    #[tokio::test]
    async fn test_more_without_cursor_is_source_error() {
        let lock = SessionLock::new();
        let mut store = store_with_lock(&lock);
        store.expect_lookup_modified_at().returning(|_| Ok(Some(1)));

        let source = source_with_pages(vec![AssetPage {
            items: vec![asset("a", 1)],
            next_cursor: None,
            has_more: true,
        }]);
        let engine = ReconciliationEngine::new(
            ReconcileConfig::default(),
            Arc::new(store),
            Arc::new(source),
        );
        let (sink, _seen) = recording_sink();

        let result = engine
            .run(&mut FolderIndex::new(), &sink, &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(SyncError::SourceUnavailable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_timeout_is_source_unavailable() {
        struct StalledSource;

        #[async_trait]
        impl AssetSource for StalledSource {
            async fn fetch_page(&self, _request: PageRequest) -> BridgeResult<AssetPage> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(AssetPage::default())
            }
        }

        let lock = SessionLock::new();
        let store = store_with_lock(&lock);
        let config = ReconcileConfig {
            fetch_timeout: Duration::from_secs(5),
            ..Default::default()
        };
        let engine = ReconciliationEngine::new(config, Arc::new(store), Arc::new(StalledSource));
        let (sink, _seen) = recording_sink();

        let result = engine
            .run(&mut FolderIndex::new(), &sink, &CancellationToken::new())
            .await;

        match result {
            Err(SyncError::SourceUnavailable(reason)) => assert!(reason.contains("timed out")),
            other => panic!("expected SourceUnavailable, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_sink_is_counted_as_failure() {
        struct StalledSink;

        #[async_trait]
        impl ProgressSink for StalledSink {
            async fn on_folders_updated(&self, _snapshot: FolderSnapshot) -> Result<()> {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }

        let lock = SessionLock::new();
        let mut store = store_with_lock(&lock);
        store.expect_lookup_modified_at().returning(|_| Ok(None));
        store.expect_commit_batch().times(2).returning(|_| Ok(()));

        let source = source_with_pages(vec![
            AssetPage::more(vec![asset("a", 1)], ScanCursor::new("2")),
            AssetPage::last(vec![asset("b", 1)]),
        ]);
        let config = ReconcileConfig {
            sink_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let engine = ReconciliationEngine::new(config, Arc::new(store), Arc::new(source));
        let mut index = FolderIndex::new();

        let report = engine
            .run(&mut index, &StalledSink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.batches_committed, 2);
        assert_eq!(report.sink_failures, 2);
        assert_eq!(index.video_count(), 2);
        assert!(!lock.is_held());
    }

    #[tokio::test]
    async fn test_requests_use_configured_page_size_and_kind() {
        let lock = SessionLock::new();
        let store = store_with_lock(&lock);

        let mut source = MockSource::new();
        source.expect_name().return_const("mock-source".to_string());
        source
            .expect_fetch_page()
            .with(eq(PageRequest::first(20, MediaKind::Video)))
            .times(1)
            .returning(|_| Ok(AssetPage::last(Vec::new())));

        let config = ReconcileConfig {
            page_size: 20,
            ..Default::default()
        };
        let engine = ReconciliationEngine::new(config, Arc::new(store), Arc::new(source));
        let (sink, _seen) = recording_sink();

        let report = engine
            .run(&mut FolderIndex::new(), &sink, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.pages_fetched, 1);
    }
}
