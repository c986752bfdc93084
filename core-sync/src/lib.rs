//! # Reconciliation Module
//!
//! Keeps the local media cache and folder index in line with an external
//! asset source.
//!
//! ## Overview
//!
//! A scan session walks the source page by page, keeps only the items that
//! are new or carry a different modification time, commits them in one
//! transaction per page and publishes a fresh folder snapshot after each
//! commit. Running it twice against an unchanged source writes nothing.
//!
//! ## Components
//!
//! - **Session State Machine** (`session`): Scan phases with validated transitions
//! - **Descriptor Normalizer** (`normalize`): Defaults and de-duplication for untrusted source items
//! - **Progress Sinks** (`sink`): Where folder snapshots go after each committed batch
//! - **Reconciliation Engine** (`engine`): The paginate, diff, commit, emit loop

pub mod engine;
pub mod error;
pub mod normalize;
pub mod session;
pub mod sink;

pub use engine::{ReconcileConfig, ReconciliationEngine, ScanReport};
pub use error::{Result, SyncError};
pub use normalize::{DescriptorNormalizer, NormalizedPage};
pub use session::{ScanSession, SessionId, SessionState};
pub use sink::{ChannelSink, FnSink, ProgressSink, WatchSink};
