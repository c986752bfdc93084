//! # Progress Sinks
//!
//! Receivers of folder snapshots during a scan.
//!
//! The engine calls [`ProgressSink::on_folders_updated`] once per committed
//! batch, strictly sequentially, and always after the batch is durable. A sink
//! error is logged by the engine and never undoes or stops anything.
//!
//! - [`WatchSink`]: latest-value accessor on `tokio::sync::watch`
//! - [`ChannelSink`]: snapshots in order over `tokio::sync::mpsc`, without waiting on the reader
//! - [`FnSink`]: adapter for a plain closure

use crate::{Result, SyncError};
use async_trait::async_trait;
use core_library::FolderSnapshot;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};

#[async_trait]
pub trait ProgressSink: Send + Sync {
    /// Deliver the folder index as it stands after a committed batch
    async fn on_folders_updated(&self, snapshot: FolderSnapshot) -> Result<()>;
}

/// Publishes the most recent snapshot; slow readers only see the latest one.
#[derive(Debug)]
pub struct WatchSink {
    sender: watch::Sender<FolderSnapshot>,
}

impl WatchSink {
    /// Create a sink seeded with `initial`, plus its first receiver
    pub fn new(initial: FolderSnapshot) -> (Self, watch::Receiver<FolderSnapshot>) {
        let (sender, receiver) = watch::channel(initial);
        (Self { sender }, receiver)
    }

    /// Wrap an existing sender
    pub fn from_sender(sender: watch::Sender<FolderSnapshot>) -> Self {
        Self { sender }
    }

    pub fn subscribe(&self) -> watch::Receiver<FolderSnapshot> {
        self.sender.subscribe()
    }

    /// Latest published snapshot
    pub fn current(&self) -> FolderSnapshot {
        self.sender.borrow().clone()
    }

    /// Replace the published snapshot outside of a scan session
    pub fn publish(&self, snapshot: FolderSnapshot) {
        // send_replace keeps the value even with no receiver attached
        self.sender.send_replace(snapshot);
    }
}

#[async_trait]
impl ProgressSink for WatchSink {
    async fn on_folders_updated(&self, snapshot: FolderSnapshot) -> Result<()> {
        self.publish(snapshot);
        Ok(())
    }
}

/// Forwards snapshots over a bounded channel.
///
/// Never waits for the reader: when the channel is full the snapshot is
/// refused with `SyncError::Sink`, and the next one supersedes it.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: mpsc::Sender<FolderSnapshot>,
}

impl ChannelSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<FolderSnapshot>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ProgressSink for ChannelSink {
    async fn on_folders_updated(&self, snapshot: FolderSnapshot) -> Result<()> {
        self.sender.try_send(snapshot).map_err(|e| match e {
            TrySendError::Full(_) => SyncError::Sink("snapshot channel is full".to_string()),
            TrySendError::Closed(_) => SyncError::Sink("snapshot receiver dropped".to_string()),
        })
    }
}

/// Calls a closure with each snapshot.
pub struct FnSink<F> {
    callback: F,
}

impl<F> FnSink<F>
where
    F: Fn(FolderSnapshot) -> Result<()> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> ProgressSink for FnSink<F>
where
    F: Fn(FolderSnapshot) -> Result<()> + Send + Sync,
{
    async fn on_folders_updated(&self, snapshot: FolderSnapshot) -> Result<()> {
        (self.callback)(snapshot)
    }
}
