//! # Media Library Module
//!
//! Owns the persistent media cache and the in-memory folder view derived from it.
//!
//! ## Overview
//!
//! This module manages:
//! - SQLite connection pooling and the `videos` schema
//! - The [`MediaStore`](repositories::MediaStore) contract used by reconciliation
//! - The copy-on-write [`FolderIndex`](folder_index::FolderIndex) and its snapshots
//! - The [`CacheLoader`](bootstrap::CacheLoader) that rebuilds the index at startup

pub mod bootstrap;
pub mod db;
pub mod error;
pub mod folder_index;
pub mod models;
pub mod repositories;
pub mod session;

pub use bootstrap::CacheLoader;
pub use error::{LibraryError, Result};
pub use folder_index::{FolderIndex, FolderSnapshot};
pub use models::{FolderGroup, MediaRecord, VideoSort};
pub use repositories::{MediaStore, SqliteMediaStore};
pub use session::{SessionLease, SessionLock};
