use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Commit failed for batch {batch}: {reason}")]
    CommitFailed { batch: u64, reason: String },

    #[error("A reconciliation session is already running on this store")]
    SessionAlreadyRunning,

    #[error("Scan cancelled")]
    Cancelled,

    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: String, after: Duration },

    #[error("Invalid state transition from {from} to {to}: {reason}")]
    InvalidStateTransition {
        from: String,
        to: String,
        reason: String,
    },

    #[error("Progress sink error: {0}")]
    Sink(String),
}

impl SyncError {
    /// Whether a fresh session may succeed where this one failed.
    ///
    /// Already-committed batches survive every error, so only a guard
    /// violation or a broken state machine calls for a different action.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::StoreUnavailable(_)
                | SyncError::SourceUnavailable(_)
                | SyncError::CommitFailed { .. }
                | SyncError::Timeout { .. }
                | SyncError::Cancelled
        )
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
