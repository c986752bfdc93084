//! # Repository Pattern Implementation
//!
//! Data access for the media cache.
//!
//! ## Architecture
//!
//! - [`MediaStore`] defines what reconciliation and bootstrap need from storage
//! - [`SqliteMediaStore`] implements it with sqlx against the `videos` table
//! - All operations return `Result<T>` for error handling

pub mod media;

pub use media::{MediaStore, SqliteMediaStore};
