//! # Core Configuration Module
//!
//! Provides configuration management for the media index core.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `CoreConfig`
//! instance holding every setting the core needs to open its cache and run a
//! reconciliation session. Validation is fail-fast: `build()` rejects
//! inconsistent values with an actionable message instead of letting a scan
//! misbehave later.
//!
//! ## Usage
//!
//! ```
//! use core_runtime::config::CoreConfig;
//! use std::time::Duration;
//!
//! let config = CoreConfig::builder()
//!     .database_path("/path/to/media.db")
//!     .page_size(100)
//!     .fetch_timeout(Duration::from_secs(10))
//!     .build()
//!     .expect("valid config");
//!
//! assert_eq!(config.page_size, 100);
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::CoreConfig;
//!
//! // Missing database path
//! let config = CoreConfig::builder()
//!     .build()
//!     .expect("Should fail - database path is required");
//! ```

use crate::error::{Error, Result};
use crate::events::DEFAULT_EVENT_BUFFER_SIZE;
use bridge_traits::media::MediaKind;
use std::path::PathBuf;
use std::time::Duration;

/// Items requested per page when nothing else is configured.
///
/// Small enough to keep the gap between UI updates short, large enough to
/// amortize the per-call cost of the media store.
pub const DEFAULT_PAGE_SIZE: u32 = 50;

/// Upper bound accepted for `page_size`.
pub const MAX_PAGE_SIZE: u32 = 1000;

/// Folder path used when an asset URI carries no directory component.
pub const DEFAULT_FALLBACK_FOLDER_PATH: &str = "Internal";

/// Folder name used when the source reports no folder or album name.
pub const DEFAULT_FALLBACK_FOLDER_NAME: &str = "Videos";

/// Core configuration for the media index.
///
/// Use [`CoreConfigBuilder`] to construct instances.
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// Path to the SQLite cache database
    pub database_path: PathBuf,

    /// Items requested from the asset source per page
    pub page_size: u32,

    /// Maximum time a single page fetch may take
    pub fetch_timeout: Duration,

    /// Maximum time a single batch commit may take
    pub commit_timeout: Duration,

    /// Kind of media indexed by this instance
    pub media_kind: MediaKind,

    /// Folder path for assets whose URI has no directory component
    pub fallback_folder_path: String,

    /// Folder name for assets without a folder or album name
    pub fallback_folder_name: String,

    /// Buffer size of the lifecycle event bus
    pub event_buffer_size: usize,
}

impl CoreConfig {
    /// Creates a new builder for constructing a `CoreConfig`.
    pub fn builder() -> CoreConfigBuilder {
        CoreConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - Database path is not empty
    /// - Page size is within 1..=MAX_PAGE_SIZE
    /// - Timeouts are non-zero
    /// - Fallback folder values are not blank
    /// - Event buffer can hold at least one event
    pub fn validate(&self) -> Result<()> {
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("Database path cannot be empty".to_string()));
        }

        if self.page_size == 0 {
            return Err(Error::Config(
                "Page size must be greater than 0".to_string(),
            ));
        }

        if self.page_size > MAX_PAGE_SIZE {
            return Err(Error::Config(format!(
                "Page size {} exceeds maximum of {}",
                self.page_size, MAX_PAGE_SIZE
            )));
        }

        if self.fetch_timeout.is_zero() || self.commit_timeout.is_zero() {
            return Err(Error::Config(
                "Fetch and commit timeouts must be non-zero".to_string(),
            ));
        }

        if self.fallback_folder_path.trim().is_empty() {
            return Err(Error::Config(
                "Fallback folder path cannot be blank".to_string(),
            ));
        }

        if self.fallback_folder_name.trim().is_empty() {
            return Err(Error::Config(
                "Fallback folder name cannot be blank".to_string(),
            ));
        }

        if self.event_buffer_size == 0 {
            return Err(Error::Config(
                "Event buffer size must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Builder for constructing [`CoreConfig`] instances.
#[derive(Debug, Default)]
pub struct CoreConfigBuilder {
    database_path: Option<PathBuf>,
    page_size: Option<u32>,
    fetch_timeout: Option<Duration>,
    commit_timeout: Option<Duration>,
    media_kind: Option<MediaKind>,
    fallback_folder_path: Option<String>,
    fallback_folder_name: Option<String>,
    event_buffer_size: Option<usize>,
}

impl CoreConfigBuilder {
    /// Sets the database path.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_runtime::config::CoreConfig;
    ///
    /// let builder = CoreConfig::builder()
    ///     .database_path("/path/to/media.db");
    /// ```
    pub fn database_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.database_path = Some(path.into());
        self
    }

    /// Sets the number of items requested per page.
    ///
    /// Default: 50
    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Sets the timeout applied to each page fetch.
    ///
    /// Default: 30 seconds
    pub fn fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = Some(timeout);
        self
    }

    /// Sets the timeout applied to each batch commit.
    ///
    /// Default: 30 seconds
    pub fn commit_timeout(mut self, timeout: Duration) -> Self {
        self.commit_timeout = Some(timeout);
        self
    }

    /// Sets the media kind to index.
    ///
    /// Default: [`MediaKind::Video`]
    pub fn media_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = Some(kind);
        self
    }

    /// Sets the folder path used for URIs without a directory component.
    pub fn fallback_folder_path(mut self, path: impl Into<String>) -> Self {
        self.fallback_folder_path = Some(path.into());
        self
    }

    /// Sets the folder name used when the source reports none.
    pub fn fallback_folder_name(mut self, name: impl Into<String>) -> Self {
        self.fallback_folder_name = Some(name.into());
        self
    }

    /// Sets the lifecycle event bus buffer size.
    pub fn event_buffer_size(mut self, size: usize) -> Self {
        self.event_buffer_size = Some(size);
        self
    }

    /// Builds the final configuration.
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` if:
    /// - The database path was never set
    /// - Any value fails [`CoreConfig::validate`]
    pub fn build(self) -> Result<CoreConfig> {
        let database_path = self.database_path.ok_or_else(|| {
            Error::Config("Database path is required. Use .database_path() to set it.".to_string())
        })?;

        let config = CoreConfig {
            database_path,
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
            fetch_timeout: self.fetch_timeout.unwrap_or(Duration::from_secs(30)),
            commit_timeout: self.commit_timeout.unwrap_or(Duration::from_secs(30)),
            media_kind: self.media_kind.unwrap_or_default(),
            fallback_folder_path: self
                .fallback_folder_path
                .unwrap_or_else(|| DEFAULT_FALLBACK_FOLDER_PATH.to_string()),
            fallback_folder_name: self
                .fallback_folder_name
                .unwrap_or_else(|| DEFAULT_FALLBACK_FOLDER_NAME.to_string()),
            event_buffer_size: self
                .event_buffer_size
                .unwrap_or(DEFAULT_EVENT_BUFFER_SIZE),
        };

        config.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_requires_database_path() {
        let result = CoreConfig::builder().build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Database path is required"));
    }

    #[test]
    fn test_builder_defaults() {
        let config = CoreConfig::builder()
            .database_path("/db/media.db")
            .build()
            .unwrap();

        assert_eq!(config.database_path, PathBuf::from("/db/media.db"));
        assert_eq!(config.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.fetch_timeout, Duration::from_secs(30));
        assert_eq!(config.commit_timeout, Duration::from_secs(30));
        assert_eq!(config.media_kind, MediaKind::Video);
        assert_eq!(config.fallback_folder_path, "Internal");
        assert_eq!(config.fallback_folder_name, "Videos");
        assert_eq!(config.event_buffer_size, DEFAULT_EVENT_BUFFER_SIZE);
    }

    #[test]
    fn test_validate_rejects_zero_page_size() {
        let result = CoreConfig::builder()
            .database_path("/db/media.db")
            .page_size(0)
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must be greater than 0"));
    }

    #[test]
    fn test_validate_rejects_excessive_page_size() {
        let result = CoreConfig::builder()
            .database_path("/db/media.db")
            .page_size(MAX_PAGE_SIZE + 1)
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let result = CoreConfig::builder()
            .database_path("/db/media.db")
            .commit_timeout(Duration::ZERO)
            .build();

        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("non-zero"));
    }

    #[test]
    fn test_validate_rejects_blank_fallbacks() {
        let result = CoreConfig::builder()
            .database_path("/db/media.db")
            .fallback_folder_name("   ")
            .build();

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Fallback folder name"));
    }

    #[test]
    fn test_builder_overrides() {
        let config = CoreConfig::builder()
            .database_path(PathBuf::from("/db/media.db"))
            .page_size(200)
            .media_kind(MediaKind::Audio)
            .fallback_folder_path("Root")
            .fallback_folder_name("Clips")
            .event_buffer_size(16)
            .build()
            .unwrap();

        assert_eq!(config.page_size, 200);
        assert_eq!(config.media_kind, MediaKind::Audio);
        assert_eq!(config.fallback_folder_path, "Root");
        assert_eq!(config.fallback_folder_name, "Clips");
        assert_eq!(config.event_buffer_size, 16);
    }
}
