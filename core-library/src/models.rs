//! Domain models for the media cache
//!
//! `MediaRecord` is the persisted row; `FolderGroup` is the derived grouping the
//! folder screen renders. Groups are never stored, they are always rebuilt from
//! records.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::cmp::Ordering;
use std::iter::Peekable;
use std::str::Chars;

// =============================================================================
// Media Record
// =============================================================================

/// One media item as stored in the `videos` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct MediaRecord {
    /// Stable identity assigned by the asset source
    pub id: String,
    /// Opaque locator handed to the playback layer
    pub uri: String,
    pub filename: String,
    pub folder_path: String,
    pub folder_name: String,
    pub duration_seconds: i64,
    pub size_bytes: i64,
    /// Sole authority for change detection
    pub modified_at: i64,
}

impl MediaRecord {
    /// Validate record invariants before it is written
    pub fn validate(&self) -> Result<(), String> {
        if self.id.trim().is_empty() {
            return Err("Media id cannot be empty".to_string());
        }

        if self.folder_path.is_empty() {
            return Err(format!("Media {} has no folder path", self.id));
        }

        if self.duration_seconds < 0 || self.size_bytes < 0 {
            return Err(format!(
                "Media {} has negative duration or size",
                self.id
            ));
        }

        Ok(())
    }
}

// =============================================================================
// Folder Group
// =============================================================================

/// Media records sharing a folder path, in insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderGroup {
    pub folder_path: String,
    pub folder_name: String,
    pub videos: Vec<MediaRecord>,
}

impl FolderGroup {
    pub fn new(folder_path: impl Into<String>, folder_name: impl Into<String>) -> Self {
        Self {
            folder_path: folder_path.into(),
            folder_name: folder_name.into(),
            videos: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.videos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.videos.is_empty()
    }

    pub fn find(&self, id: &str) -> Option<&MediaRecord> {
        self.videos.iter().find(|video| video.id == id)
    }

    /// Videos ordered for display. The stored order is left untouched.
    pub fn sorted_videos(&self, sort: VideoSort) -> Vec<MediaRecord> {
        let mut videos = self.videos.clone();
        match sort {
            VideoSort::Newest => videos.sort_by(|a, b| {
                b.modified_at
                    .cmp(&a.modified_at)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            VideoSort::Duration => videos.sort_by(|a, b| {
                b.duration_seconds
                    .cmp(&a.duration_seconds)
                    .then_with(|| a.id.cmp(&b.id))
            }),
            VideoSort::Name => videos.sort_by(|a, b| {
                natural_cmp(&a.filename, &b.filename).then_with(|| a.id.cmp(&b.id))
            }),
        }
        videos
    }
}

/// Display orderings offered by the folder screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoSort {
    /// Most recently modified first
    #[default]
    Newest,
    /// Longest first
    Duration,
    /// Filename A to Z, numeric runs compared by value
    Name,
}

/// Case-insensitive comparison that orders `clip2` before `clip10`.
pub fn natural_cmp(a: &str, b: &str) -> Ordering {
    let mut left = a.chars().peekable();
    let mut right = b.chars().peekable();

    loop {
        let ordering = match (left.peek().copied(), right.peek().copied()) {
            (None, None) => return a.cmp(b),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(l), Some(r)) if l.is_ascii_digit() && r.is_ascii_digit() => {
                let left_digits = take_digits(&mut left);
                let right_digits = take_digits(&mut right);
                compare_numeric(&left_digits, &right_digits)
            }
            (Some(l), Some(r)) => {
                left.next();
                right.next();
                l.to_lowercase().cmp(r.to_lowercase())
            }
        };

        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

fn take_digits(chars: &mut Peekable<Chars<'_>>) -> String {
    let mut digits = String::new();
    while let Some(c) = chars.peek().copied() {
        if !c.is_ascii_digit() {
            break;
        }
        digits.push(c);
        chars.next();
    }
    digits
}

fn compare_numeric(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}
