//! # Event Bus System
//!
//! Lifecycle notifications for the media index, carried over `tokio::sync::broadcast`.
//!
//! ## Overview
//!
//! The event bus system consists of:
//! - **Event Types**: Strongly-typed enums for scan sessions and the cached library
//! - **EventBus**: Central broadcast channel for publishing events
//! - **EventStream**: Wrapper for consuming events with filtering
//!
//! Folder snapshots do not travel on the bus. They are delivered through the
//! progress sink of a scan session; the bus only reports what happened.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     emit      ┌───────────┐
//! │ Scan session ├──────────────>│           │     subscribe    ┌────────────┐
//! └──────────────┘               │ EventBus  ├─────────────────>│ Subscriber │
//!                                │ (broadcast│                  └────────────┘
//! ┌──────────────┐     emit      │  channel) │     subscribe    ┌────────────┐
//! │ Cache loader ├──────────────>│           ├─────────────────>│ Subscriber │
//! └──────────────┘               └───────────┘                  └────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, ScanEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let event_bus = EventBus::new(100);
//! let mut subscriber = event_bus.subscribe();
//!
//! event_bus
//!     .emit(CoreEvent::Scan(ScanEvent::Started {
//!         session_id: "session-1".to_string(),
//!         page_size: 50,
//!     }))
//!     .ok();
//!
//! let event = subscriber.recv().await.unwrap();
//! assert_eq!(event.description(), "Scan started");
//! # }
//! ```
//!
//! ## Error Handling
//!
//! `emit` fails only when nobody is subscribed. Publishers call `.ok()` on the
//! result: a missing listener is never a reason to stop a scan.

use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::broadcast;

// Re-export commonly used types
pub use tokio::sync::broadcast::error::{RecvError, SendError};
pub use tokio::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
///
/// Subscribers that can't keep up will receive `RecvError::Lagged`.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event enum published and received through the event bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Reconciliation session events
    Scan(ScanEvent),
    /// Cached library events
    Library(LibraryEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Scan(e) => e.description(),
            CoreEvent::Library(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Scan(ScanEvent::Failed { .. }) => EventSeverity::Error,
            CoreEvent::Scan(ScanEvent::Cancelled { .. }) => EventSeverity::Warning,
            CoreEvent::Scan(ScanEvent::Completed { .. }) => EventSeverity::Info,
            CoreEvent::Library(LibraryEvent::CacheLoaded { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    /// Debug-level events (verbose)
    Debug,
    /// Informational events
    Info,
    /// Warning events
    Warning,
    /// Error events
    Error,
}

// ============================================================================
// Scan Events
// ============================================================================

/// Events emitted by a reconciliation session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum ScanEvent {
    /// Session acquired the store and is about to fetch the first page.
    Started {
        /// Unique identifier for this session.
        session_id: String,
        /// Items requested per page.
        page_size: u32,
    },
    /// A batch with at least one changed item was committed.
    BatchCommitted {
        /// The session ID.
        session_id: String,
        /// 1-based batch (page) number.
        batch: u64,
        /// Items written by this batch.
        changed: u64,
        /// Folder count of the snapshot that followed the commit.
        folders: u64,
    },
    /// Source exhausted; every batch committed.
    Completed {
        /// The session ID.
        session_id: String,
        /// Pages fetched from the source.
        pages_fetched: u64,
        /// Items received from the source, after normalization.
        items_seen: u64,
        /// Items that were not in the store before.
        items_added: u64,
        /// Items whose modification time differed from the store.
        items_updated: u64,
        /// Wall-clock duration in milliseconds.
        duration_ms: u64,
    },
    /// Session aborted on a source, store or commit failure.
    Failed {
        /// The session ID.
        session_id: String,
        /// Human-readable error message.
        message: String,
        /// Batches committed before the failure (they stay committed).
        batches_committed: u64,
    },
    /// Session stopped at a batch boundary after a cancellation request.
    Cancelled {
        /// The session ID.
        session_id: String,
        /// Batches committed before cancellation.
        batches_committed: u64,
    },
}

impl ScanEvent {
    fn description(&self) -> &str {
        match self {
            ScanEvent::Started { .. } => "Scan started",
            ScanEvent::BatchCommitted { .. } => "Scan batch committed",
            ScanEvent::Completed { .. } => "Scan completed successfully",
            ScanEvent::Failed { .. } => "Scan failed",
            ScanEvent::Cancelled { .. } => "Scan cancelled",
        }
    }
}

// ============================================================================
// Library Events
// ============================================================================

/// Events related to the cached library.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event")]
pub enum LibraryEvent {
    /// Folder index rebuilt from the persistent cache at startup.
    CacheLoaded {
        /// Number of folder groups.
        folders: u64,
        /// Number of media records.
        videos: u64,
    },
}

impl LibraryEvent {
    fn description(&self) -> &str {
        match self {
            LibraryEvent::CacheLoaded { .. } => "Cached library loaded",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus yields another producer on the same channel; every
/// `subscribe()` creates an independent receiver.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus with the specified buffer size.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is 0 (a `tokio::sync::broadcast` requirement).
    /// `CoreConfig` validation rejects a zero buffer before it gets here.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publishes an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    ///
    /// # Errors
    ///
    /// Returns `SendError` if there are no active subscribers.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscription to the event bus.
    ///
    /// Only events emitted after the call are received.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Returns the current number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A filtered stream of events.
///
/// # Example
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus, EventStream};
///
/// let event_bus = EventBus::new(100);
/// let scan_only = EventStream::new(event_bus.subscribe())
///     .filter(|event| matches!(event, CoreEvent::Scan(_)));
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    /// Creates a new event stream from a receiver.
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Adds a filter function to this stream.
    ///
    /// Only events that match the filter will be returned by `recv()`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    /// Receives the next event that passes the filter (if any).
    ///
    /// # Errors
    ///
    /// Returns `RecvError::Lagged(n)` if the subscriber fell behind by `n` events.
    /// Returns `RecvError::Closed` if all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;

            let Some(filter) = &self.filter else {
                return Ok(event);
            };

            if filter(&event) {
                return Ok(event);
            }
        }
    }

    /// Attempts to receive an event without blocking.
    ///
    /// Returns `None` if no matching events are currently available.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    let Some(filter) = &self.filter else {
                        return Some(Ok(event));
                    };

                    if filter(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn started(id: &str) -> CoreEvent {
        CoreEvent::Scan(ScanEvent::Started {
            session_id: id.to_string(),
            page_size: 50,
        })
    }

    fn cache_loaded() -> CoreEvent {
        CoreEvent::Library(LibraryEvent::CacheLoaded {
            folders: 2,
            videos: 5,
        })
    }

    #[tokio::test]
    async fn test_event_bus_subscription() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);

        let _sub1 = bus.subscribe();
        let _sub2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert!(bus.emit(started("s-1")).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let sent = bus.emit(started("s-1")).unwrap();
        assert_eq!(sent, 2);

        assert_eq!(sub1.recv().await.unwrap(), started("s-1"));
        assert_eq!(sub2.recv().await.unwrap(), started("s-1"));
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = EventStream::new(bus.subscribe())
            .filter(|event| matches!(event, CoreEvent::Library(_)));

        bus.emit(started("s-1")).unwrap();
        bus.emit(cache_loaded()).unwrap();

        assert_eq!(stream.recv().await.unwrap(), cache_loaded());
        assert!(stream.try_recv().is_none());
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();

        for i in 0..5 {
            bus.emit(started(&format!("s-{}", i))).ok();
        }

        let result = sub.recv().await;
        assert!(matches!(result, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let failed = CoreEvent::Scan(ScanEvent::Failed {
            session_id: "s-1".to_string(),
            message: "source unavailable".to_string(),
            batches_committed: 3,
        });
        assert_eq!(failed.severity(), EventSeverity::Error);

        let cancelled = CoreEvent::Scan(ScanEvent::Cancelled {
            session_id: "s-1".to_string(),
            batches_committed: 0,
        });
        assert_eq!(cancelled.severity(), EventSeverity::Warning);

        assert_eq!(cache_loaded().severity(), EventSeverity::Info);
        assert_eq!(started("s-1").severity(), EventSeverity::Debug);
    }

    #[test]
    fn test_event_serialization() {
        let event = CoreEvent::Scan(ScanEvent::BatchCommitted {
            session_id: "s-1".to_string(),
            batch: 4,
            changed: 12,
            folders: 3,
        });

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"type\":\"Scan\""));
        assert!(json.contains("\"event\":\"BatchCommitted\""));

        let back: CoreEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[tokio::test]
    async fn test_try_recv_with_event() {
        let bus = EventBus::default();
        let mut stream = EventStream::new(bus.subscribe());
        assert!(stream.try_recv().is_none());

        bus.emit(cache_loaded()).unwrap();
        assert_eq!(stream.try_recv().unwrap().unwrap(), cache_loaded());
    }
}
