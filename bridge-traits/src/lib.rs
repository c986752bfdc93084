//! # Host Bridge Traits
//!
//! Contracts between the indexing core and the collaborators it does not own.
//!
//! ## Overview
//!
//! Each trait represents a capability that the core requires but that must be
//! implemented differently per host (device media store on mobile, directory
//! walk on desktop).
//!
//! ## Traits
//!
//! - [`AssetSource`](media::AssetSource) - Paginated provider of media items
//! - [`LoggerSink`](time::LoggerSink) - Forward structured logs to host logging
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Host
//! implementations should convert platform errors (permission denial, I/O,
//! malformed cursors) into `BridgeError` with enough context to act on.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so implementations can be shared
//! across async tasks behind an `Arc`.

pub mod error;
pub mod media;
pub mod time;

pub use error::BridgeError;

pub use media::{AssetDescriptor, AssetPage, AssetSource, MediaKind, PageRequest, ScanCursor};
pub use time::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
