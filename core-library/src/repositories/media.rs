//! Media store trait and SQLite implementation

use crate::error::{LibraryError, Result};
use crate::models::MediaRecord;
use crate::session::{SessionLease, SessionLock};
use async_trait::async_trait;
use futures::future::BoxFuture;
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::{debug, info, warn};

const CREATE_VIDEOS_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS videos (
        id TEXT PRIMARY KEY NOT NULL,
        uri TEXT NOT NULL,
        filename TEXT NOT NULL,
        folder_path TEXT NOT NULL,
        folder_name TEXT NOT NULL,
        duration_seconds INTEGER NOT NULL DEFAULT 0,
        size_bytes INTEGER NOT NULL DEFAULT 0,
        modified_at INTEGER NOT NULL DEFAULT 0
    )
"#;

const CREATE_FOLDER_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_videos_folder_path ON videos(folder_path)";

const SELECT_COLUMNS: &str = "SELECT id, uri, filename, folder_path, folder_name, \
     duration_seconds, size_bytes, modified_at FROM videos";

/// Persistent store of media records keyed by id
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Create the schema if it does not exist. Safe to call on every start.
    async fn initialize(&self) -> Result<()>;

    /// Read every stored record
    ///
    /// Rows come back newest first; callers must not depend on it.
    async fn scan_all(&self) -> Result<Vec<MediaRecord>>;

    /// Stored modification time for `id`, `None` if the id is unknown
    async fn lookup_modified_at(&self, id: &str) -> Result<Option<i64>>;

    /// Insert or fully replace `records` in one transaction
    ///
    /// # Errors
    ///
    /// On error nothing from the batch is visible in the store.
    async fn commit_batch(&self, records: Vec<MediaRecord>) -> Result<()>;

    /// Find a record by id
    async fn find_by_id(&self, id: &str) -> Result<Option<MediaRecord>>;

    /// All records of one folder, newest first
    async fn find_by_folder(&self, folder_path: &str) -> Result<Vec<MediaRecord>>;

    /// Count stored records
    async fn count(&self) -> Result<u64>;

    /// Claim the store for a reconciliation session
    ///
    /// Returns `None` while another session holds it.
    fn try_begin_session(&self) -> Option<SessionLease>;
}

/// SQLite implementation of MediaStore
#[derive(Debug, Clone)]
pub struct SqliteMediaStore {
    pool: SqlitePool,
    session_lock: SessionLock,
}

impl SqliteMediaStore {
    /// Create a new store over an existing pool
    ///
    /// Clones share the session lock, so two handles to the same store still
    /// admit a single session.
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            session_lock: SessionLock::new(),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Run `body` inside a write transaction
    ///
    /// Commits when `body` returns `Ok`, rolls back otherwise.
    ///
    /// ```rust,ignore
    /// store
    ///     .with_transaction(move |tx| {
    ///         Box::pin(async move { SqliteMediaStore::upsert_batch(tx, &records).await })
    ///     })
    ///     .await?;
    /// ```
    pub async fn with_transaction<T, F>(&self, body: F) -> Result<T>
    where
        T: Send,
        F: for<'c> FnOnce(&'c mut Transaction<'static, Sqlite>) -> BoxFuture<'c, Result<T>>
            + Send,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| LibraryError::Transaction(format!("begin failed: {}", e)))?;

        match body(&mut tx).await {
            Ok(value) => {
                tx.commit()
                    .await
                    .map_err(|e| LibraryError::Transaction(format!("commit failed: {}", e)))?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    warn!(error = %rollback_err, "Rollback failed");
                }
                Err(err)
            }
        }
    }

    /// Insert or replace `records` within `tx`
    pub async fn upsert_batch(
        tx: &mut Transaction<'static, Sqlite>,
        records: &[MediaRecord],
    ) -> Result<()> {
        for record in records {
            record
                .validate()
                .map_err(|message| LibraryError::InvalidInput {
                    field: "MediaRecord".to_string(),
                    message,
                })?;

            sqlx::query(
                r#"
                INSERT OR REPLACE INTO videos (
                    id, uri, filename, folder_path, folder_name,
                    duration_seconds, size_bytes, modified_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&record.id)
            .bind(&record.uri)
            .bind(&record.filename)
            .bind(&record.folder_path)
            .bind(&record.folder_name)
            .bind(record.duration_seconds)
            .bind(record.size_bytes)
            .bind(record.modified_at)
            .execute(&mut **tx)
            .await?;
        }

        Ok(())
    }
}

#[async_trait]
impl MediaStore for SqliteMediaStore {
    async fn initialize(&self) -> Result<()> {
        sqlx::query(CREATE_VIDEOS_TABLE)
            .execute(&self.pool)
            .await
            .map_err(|e| LibraryError::StoreUnavailable(e.to_string()))?;
        sqlx::query(CREATE_FOLDER_INDEX)
            .execute(&self.pool)
            .await
            .map_err(|e| LibraryError::StoreUnavailable(e.to_string()))?;

        info!("Media store schema ready");
        Ok(())
    }

    async fn scan_all(&self) -> Result<Vec<MediaRecord>> {
        let sql = format!("{} ORDER BY modified_at DESC, id ASC", SELECT_COLUMNS);
        let records = sqlx::query_as::<_, MediaRecord>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| LibraryError::StoreUnavailable(e.to_string()))?;

        debug!(count = records.len(), "Scanned media store");
        Ok(records)
    }

    async fn lookup_modified_at(&self, id: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT modified_at FROM videos WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(modified_at,)| modified_at))
    }

    async fn commit_batch(&self, records: Vec<MediaRecord>) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }

        let count = records.len();
        self.with_transaction(move |tx| {
            Box::pin(async move { SqliteMediaStore::upsert_batch(tx, &records).await })
        })
        .await?;

        debug!(count, "Committed media batch");
        Ok(())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<MediaRecord>> {
        let sql = format!("{} WHERE id = ?", SELECT_COLUMNS);
        let record = sqlx::query_as::<_, MediaRecord>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn find_by_folder(&self, folder_path: &str) -> Result<Vec<MediaRecord>> {
        let sql = format!(
            "{} WHERE folder_path = ? ORDER BY modified_at DESC, id ASC",
            SELECT_COLUMNS
        );
        let records = sqlx::query_as::<_, MediaRecord>(&sql)
            .bind(folder_path)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }

    async fn count(&self) -> Result<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM videos")
            .fetch_one(&self.pool)
            .await?;

        Ok(count as u64)
    }

    fn try_begin_session(&self) -> Option<SessionLease> {
        self.session_lock.try_acquire()
    }
}
