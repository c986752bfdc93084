//! # Folder Index
//!
//! In-memory grouping of media records by folder path.
//!
//! ## Overview
//!
//! Groups are held behind `Arc` and mutated with `Arc::make_mut`, so a
//! [`FolderSnapshot`] is a cheap list of shared pointers. A group that is
//! still referenced by a snapshot is cloned before it is changed; readers of
//! an older snapshot never observe a later upsert.
//!
//! The index is owned by exactly one task at a time (the bootstrap loader,
//! then the scan worker). Snapshots are what crosses task boundaries.

use crate::models::{FolderGroup, MediaRecord};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

/// Mutable grouping of records by folder, in first-seen folder order.
#[derive(Debug, Clone, Default)]
pub struct FolderIndex {
    groups: Vec<Arc<FolderGroup>>,
    positions: HashMap<String, usize>,
    locations: HashMap<String, String>,
}

impl FolderIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build an index from scratch
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = MediaRecord>,
    {
        let mut index = Self::new();
        index.rebuild_from(records);
        index
    }

    /// Clear the index and repopulate it from `records`
    ///
    /// The first record seen for a folder fixes that folder's display name.
    pub fn rebuild_from<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = MediaRecord>,
    {
        self.groups.clear();
        self.positions.clear();
        self.locations.clear();

        for record in records {
            self.apply_upsert(record);
        }
    }

    /// Insert `record`, or replace the entry with the same id in place
    ///
    /// A record whose folder changed is moved; a folder left empty by the
    /// move is dropped.
    pub fn apply_upsert(&mut self, record: MediaRecord) {
        if let Some(previous) = self.locations.get(&record.id) {
            if *previous != record.folder_path {
                let previous = previous.clone();
                self.remove_from_folder(&previous, &record.id);
            }
        }

        let id = record.id.clone();
        let folder_path = record.folder_path.clone();

        match self.positions.get(&folder_path) {
            Some(&position) => {
                let group = Arc::make_mut(&mut self.groups[position]);
                match group.videos.iter_mut().find(|video| video.id == record.id) {
                    Some(existing) => *existing = record,
                    None => group.videos.push(record),
                }
            }
            None => {
                trace!(folder = %folder_path, "New folder group");
                let mut group = FolderGroup::new(folder_path.clone(), record.folder_name.clone());
                group.videos.push(record);
                self.positions.insert(folder_path.clone(), self.groups.len());
                self.groups.push(Arc::new(group));
            }
        }

        self.locations.insert(id, folder_path);
    }

    fn remove_from_folder(&mut self, folder_path: &str, id: &str) {
        let Some(&position) = self.positions.get(folder_path) else {
            return;
        };

        let group = Arc::make_mut(&mut self.groups[position]);
        group.videos.retain(|video| video.id != id);

        if group.videos.is_empty() {
            self.groups.remove(position);
            self.positions = self
                .groups
                .iter()
                .enumerate()
                .map(|(i, group)| (group.folder_path.clone(), i))
                .collect();
        }
    }

    /// Point-in-time copy of the grouped contents
    pub fn snapshot(&self) -> FolderSnapshot {
        FolderSnapshot {
            groups: self.groups.clone(),
        }
    }

    pub fn folder(&self, folder_path: &str) -> Option<&FolderGroup> {
        self.positions
            .get(folder_path)
            .map(|&position| self.groups[position].as_ref())
    }

    pub fn find_video(&self, id: &str) -> Option<&MediaRecord> {
        let folder_path = self.locations.get(id)?;
        self.folder(folder_path)?.find(id)
    }

    /// Every record in the index, folder by folder
    pub fn records(&self) -> impl Iterator<Item = &MediaRecord> {
        self.groups.iter().flat_map(|group| group.videos.iter())
    }

    pub fn folder_count(&self) -> usize {
        self.groups.len()
    }

    pub fn video_count(&self) -> usize {
        self.locations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Immutable view of a [`FolderIndex`] at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FolderSnapshot {
    groups: Vec<Arc<FolderGroup>>,
}

impl FolderSnapshot {
    pub fn groups(&self) -> &[Arc<FolderGroup>] {
        &self.groups
    }

    pub fn iter(&self) -> impl Iterator<Item = &FolderGroup> {
        self.groups.iter().map(|group| group.as_ref())
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    pub fn folder(&self, folder_path: &str) -> Option<&FolderGroup> {
        self.iter().find(|group| group.folder_path == folder_path)
    }

    pub fn find_video(&self, id: &str) -> Option<&MediaRecord> {
        self.iter().find_map(|group| group.find(id))
    }

    pub fn total_videos(&self) -> usize {
        self.groups.iter().map(|group| group.videos.len()).sum()
    }
}
