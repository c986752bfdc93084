//! Media Asset Source Abstractions
//!
//! Defines the contract for the external collection of media items the core
//! indexes (the device media store on mobile, a directory walk on desktop).
//! The core only ever pulls pages from it; nothing here pushes changes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Kind of media item exposed by an asset source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    Video,
    Audio,
    Photo,
    Unknown,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Photo => "photo",
            MediaKind::Unknown => "unknown",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque, source-defined position inside a paginated listing.
///
/// The core never inspects the contents; it only hands back whatever the
/// source returned as `next_cursor`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ScanCursor(String);

impl ScanCursor {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ScanCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One media item as reported by the source.
///
/// Everything except `id` and `uri` is optional because the source is
/// untrusted: consumers must substitute defaults instead of failing.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Stable identity assigned by the source
    pub id: String,
    /// Opaque locator handed to the playback layer
    pub uri: String,
    /// Display file name
    pub filename: String,
    /// Media kind reported by the source
    pub kind: MediaKind,
    /// Folder path if the source knows it; derived from `uri` otherwise
    pub folder_path: Option<String>,
    /// Folder or album display name
    pub folder_name: Option<String>,
    /// Duration in whole seconds
    pub duration_seconds: Option<i64>,
    /// File size in bytes
    pub size_bytes: Option<i64>,
    /// Last modification time (Unix epoch seconds)
    pub modified_at: Option<i64>,
}

/// Parameters for a single page fetch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    /// `None` starts a new listing
    pub cursor: Option<ScanCursor>,
    /// Maximum number of items to return
    pub page_size: u32,
    /// Only items of this kind are requested
    pub kind: MediaKind,
}

impl PageRequest {
    /// Request for the first page of a listing
    pub fn first(page_size: u32, kind: MediaKind) -> Self {
        Self {
            cursor: None,
            page_size,
            kind,
        }
    }

    /// Request for the page following `cursor`
    pub fn after(cursor: Option<ScanCursor>, page_size: u32, kind: MediaKind) -> Self {
        Self {
            cursor,
            page_size,
            kind,
        }
    }
}

/// One page of results
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssetPage {
    pub items: Vec<AssetDescriptor>,
    pub next_cursor: Option<ScanCursor>,
    pub has_more: bool,
}

impl AssetPage {
    /// Final page with no continuation
    pub fn last(items: Vec<AssetDescriptor>) -> Self {
        Self {
            items,
            next_cursor: None,
            has_more: false,
        }
    }

    /// Page that continues at `cursor`
    pub fn more(items: Vec<AssetDescriptor>, cursor: ScanCursor) -> Self {
        Self {
            items,
            next_cursor: Some(cursor),
            has_more: true,
        }
    }
}

/// Paginated media provider
///
/// Implementations must return items in a stable order for the duration of
/// one listing (from a `None` cursor until `has_more` is false). Callers are
/// responsible for verifying access before listing; a denied permission is
/// reported as an error like any other failure.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::media::{AssetSource, PageRequest, MediaKind};
///
/// async fn count_videos(source: &dyn AssetSource) -> Result<usize> {
///     let mut request = PageRequest::first(50, MediaKind::Video);
///     let mut total = 0;
///     loop {
///         let page = source.fetch_page(request.clone()).await?;
///         total += page.items.len();
///         if !page.has_more {
///             return Ok(total);
///         }
///         request = PageRequest::after(page.next_cursor, 50, MediaKind::Video);
///     }
/// }
/// ```
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch the next page of assets
    async fn fetch_page(&self, request: PageRequest) -> Result<AssetPage>;

    /// Human-readable name used in logs
    fn name(&self) -> &str {
        "asset-source"
    }
}
