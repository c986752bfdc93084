//! Startup loader that rebuilds the folder index from the persistent cache.
//!
//! Gives the UI an immediate, possibly stale, view before any scan runs.
//! The loader only reads; it never touches the asset source.

use crate::error::{LibraryError, Result};
use crate::folder_index::FolderIndex;
use crate::repositories::MediaStore;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct CacheLoader {
    store: Arc<dyn MediaStore>,
}

impl CacheLoader {
    pub fn new(store: Arc<dyn MediaStore>) -> Self {
        Self { store }
    }

    /// Read every cached record and group it by folder
    ///
    /// An empty store yields an empty index.
    ///
    /// # Errors
    ///
    /// `LibraryError::StoreUnavailable` if the store cannot be read.
    #[instrument(skip(self))]
    pub async fn load(&self) -> Result<FolderIndex> {
        let records = self.store.scan_all().await.map_err(|e| {
            warn!(error = %e, "Failed to read media cache");
            match e {
                LibraryError::StoreUnavailable(_) => e,
                other => LibraryError::StoreUnavailable(other.to_string()),
            }
        })?;

        let index = FolderIndex::from_records(records);

        info!(
            folders = index.folder_count(),
            videos = index.video_count(),
            "Loaded cached folders"
        );

        Ok(index)
    }
}
