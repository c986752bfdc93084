//! Turns untrusted asset descriptors into storable media records.
//!
//! Rules:
//! - descriptors with a blank id or another media kind are dropped
//! - folder path comes from the descriptor, else the URI up to its last `/`,
//!   else the configured fallback
//! - folder name comes from the descriptor, else the configured fallback
//! - missing duration, size and modification time become 0
//! - an id repeated within one page keeps only its last occurrence

use bridge_traits::media::{AssetDescriptor, MediaKind};
use core_library::models::MediaRecord;
use core_runtime::logging::strip_path;
use std::collections::HashMap;
use tracing::debug;

/// Result of normalizing one page
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedPage {
    pub records: Vec<MediaRecord>,
    /// Descriptors dropped for a blank id or a foreign media kind
    pub skipped: u64,
    /// Earlier occurrences superseded by a later one with the same id
    pub duplicates: u64,
}

#[derive(Debug, Clone)]
pub struct DescriptorNormalizer {
    kind: MediaKind,
    fallback_folder_path: String,
    fallback_folder_name: String,
}

impl DescriptorNormalizer {
    pub fn new(
        kind: MediaKind,
        fallback_folder_path: impl Into<String>,
        fallback_folder_name: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            fallback_folder_path: fallback_folder_path.into(),
            fallback_folder_name: fallback_folder_name.into(),
        }
    }

    pub fn normalize_page(&self, items: Vec<AssetDescriptor>) -> NormalizedPage {
        let mut page = NormalizedPage::default();
        let mut slots: Vec<Option<MediaRecord>> = Vec::with_capacity(items.len());
        let mut positions: HashMap<String, usize> = HashMap::with_capacity(items.len());

        for descriptor in items {
            let Some(record) = self.normalize(descriptor) else {
                page.skipped += 1;
                continue;
            };

            if let Some(previous) = positions.insert(record.id.clone(), slots.len()) {
                slots[previous] = None;
                page.duplicates += 1;
            }
            slots.push(Some(record));
        }

        page.records = slots.into_iter().flatten().collect();
        page
    }

    /// `None` when the descriptor must be skipped
    pub fn normalize(&self, descriptor: AssetDescriptor) -> Option<MediaRecord> {
        let id = descriptor.id.trim();
        if id.is_empty() {
            debug!(file = %strip_path(&descriptor.uri), "Skipping asset without id");
            return None;
        }

        if descriptor.kind != self.kind {
            debug!(id, kind = %descriptor.kind, "Skipping asset of another kind");
            return None;
        }

        let folder_path = descriptor
            .folder_path
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| self.folder_from_uri(&descriptor.uri));

        let folder_name = descriptor
            .folder_name
            .filter(|name| !name.trim().is_empty())
            .unwrap_or_else(|| self.fallback_folder_name.clone());

        let filename = if descriptor.filename.is_empty() {
            let base = strip_path(&descriptor.uri);
            if base.is_empty() {
                id.to_string()
            } else {
                base.to_string()
            }
        } else {
            descriptor.filename
        };

        Some(MediaRecord {
            id: id.to_string(),
            uri: descriptor.uri,
            filename,
            folder_path,
            folder_name,
            duration_seconds: descriptor.duration_seconds.unwrap_or(0).max(0),
            size_bytes: descriptor.size_bytes.unwrap_or(0).max(0),
            modified_at: descriptor.modified_at.unwrap_or(0),
        })
    }

    fn folder_from_uri(&self, uri: &str) -> String {
        match uri.rfind('/') {
            Some(end) if end > 0 => uri[..end].to_string(),
            _ => self.fallback_folder_path.clone(),
        }
    }
}
