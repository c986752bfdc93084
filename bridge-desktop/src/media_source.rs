//! Asset Source Implementation using Tokio

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result},
    media::{AssetDescriptor, AssetPage, AssetSource, MediaKind, PageRequest, ScanCursor},
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::UNIX_EPOCH;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// File extensions recognized as video (lowercase, without the dot)
pub const VIDEO_EXTENSIONS: &[&str] = &[
    "3gp", "avi", "flv", "m4v", "mkv", "mov", "mp4", "mpeg", "mpg", "ts", "webm", "wmv",
];

/// Directory-walking video source
///
/// Provides paginated listings using:
/// - `tokio::fs` to walk every root recursively
/// - The full file path as the stable asset id
/// - Newest-modified-first ordering
///
/// The listing is captured when a page without a cursor is requested; the
/// cursor is an offset into that capture, so the order stays stable for the
/// whole session even if files change underneath. It is released once the
/// last page has been served.
pub struct FsVideoSource {
    roots: Vec<PathBuf>,
    listing: Mutex<Option<Arc<Vec<AssetDescriptor>>>>,
}

impl FsVideoSource {
    /// Create a source over explicit root directories
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            listing: Mutex::new(None),
        }
    }

    /// Create a source over the user's video directory
    pub fn with_default_roots() -> Self {
        let root = dirs::video_dir().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("Videos")
        });

        Self::new(vec![root])
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    fn map_io_error(path: &Path, e: std::io::Error) -> BridgeError {
        match e.kind() {
            ErrorKind::PermissionDenied => {
                BridgeError::AccessDenied(format!("{}: {}", path.display(), e))
            }
            _ => BridgeError::Io(e),
        }
    }

    fn is_video(path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                let ext = ext.to_ascii_lowercase();
                VIDEO_EXTENSIONS.contains(&ext.as_str())
            })
            .unwrap_or(false)
    }

    fn is_hidden(path: &Path) -> bool {
        path.file_name()
            .and_then(|name| name.to_str())
            .map(|name| name.starts_with('.'))
            .unwrap_or(false)
    }

    async fn capture_listing(&self) -> Result<Vec<AssetDescriptor>> {
        let mut items = Vec::new();

        for root in &self.roots {
            match fs::metadata(root).await {
                Ok(metadata) if metadata.is_dir() => {}
                Ok(_) => {
                    warn!(path = ?root, "Video root is not a directory");
                    continue;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!(path = ?root, "Video root does not exist");
                    continue;
                }
                Err(e) => return Err(Self::map_io_error(root, e)),
            }

            self.walk(root, &mut items).await;
        }

        items.sort_by(|a, b| {
            b.modified_at
                .cmp(&a.modified_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        // Overlapping roots list the same file twice
        items.dedup_by(|a, b| a.id == b.id);

        info!(roots = self.roots.len(), count = items.len(), "Captured video listing");
        Ok(items)
    }

    /// Depth-first walk; unreadable subdirectories are skipped
    async fn walk(&self, root: &Path, items: &mut Vec<AssetDescriptor>) {
        let mut pending = vec![root.to_path_buf()];

        while let Some(dir) = pending.pop() {
            let mut read_dir = match fs::read_dir(&dir).await {
                Ok(read_dir) => read_dir,
                Err(e) => {
                    warn!(path = ?dir, error = %e, "Skipping unreadable directory");
                    continue;
                }
            };

            loop {
                let entry = match read_dir.next_entry().await {
                    Ok(Some(entry)) => entry,
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = ?dir, error = %e, "Directory listing interrupted");
                        break;
                    }
                };

                let path = entry.path();
                if Self::is_hidden(&path) {
                    continue;
                }

                // file_type does not follow symlinks, so linked directories cannot loop
                let Ok(file_type) = entry.file_type().await else {
                    continue;
                };

                if file_type.is_dir() {
                    pending.push(path);
                } else if file_type.is_file() && Self::is_video(&path) {
                    match entry.metadata().await {
                        Ok(metadata) => items.push(Self::describe(&path, &metadata)),
                        Err(e) => debug!(path = ?path, error = %e, "Skipping file without metadata"),
                    }
                }
            }
        }
    }

    fn describe(path: &Path, metadata: &std::fs::Metadata) -> AssetDescriptor {
        let parent = path.parent();

        AssetDescriptor {
            id: path.to_string_lossy().into_owned(),
            uri: path.to_string_lossy().into_owned(),
            filename: path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            kind: MediaKind::Video,
            folder_path: parent.map(|p| p.to_string_lossy().into_owned()),
            folder_name: parent
                .and_then(|p| p.file_name())
                .map(|name| name.to_string_lossy().into_owned()),
            duration_seconds: None,
            size_bytes: i64::try_from(metadata.len()).ok(),
            modified_at: metadata
                .modified()
                .ok()
                .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
                .map(|d| d.as_secs() as i64),
        }
    }
}

impl Default for FsVideoSource {
    fn default() -> Self {
        Self::with_default_roots()
    }
}

#[async_trait]
impl AssetSource for FsVideoSource {
    async fn fetch_page(&self, request: PageRequest) -> Result<AssetPage> {
        if request.kind != MediaKind::Video {
            debug!(kind = %request.kind, "Desktop source only lists videos");
            return Ok(AssetPage::last(Vec::new()));
        }

        let mut guard = self.listing.lock().await;

        let (listing, offset) = match &request.cursor {
            None => {
                let listing = Arc::new(self.capture_listing().await?);
                *guard = Some(Arc::clone(&listing));
                (listing, 0)
            }
            Some(cursor) => {
                let listing = guard.as_ref().map(Arc::clone).ok_or_else(|| {
                    BridgeError::InvalidCursor(format!("{} (no listing in progress)", cursor))
                })?;
                let offset = cursor
                    .as_str()
                    .parse::<usize>()
                    .ok()
                    .filter(|offset| *offset <= listing.len())
                    .ok_or_else(|| BridgeError::InvalidCursor(cursor.to_string()))?;
                (listing, offset)
            }
        };
        let page_size = request.page_size.max(1) as usize;
        let end = (offset + page_size).min(listing.len());

        // Served in full; release it unless a newer session replaced it
        let finished = end == listing.len();
        if finished && guard.as_ref().is_some_and(|current| Arc::ptr_eq(current, &listing)) {
            *guard = None;
        }
        drop(guard);

        let items = listing[offset..end].to_vec();

        debug!(offset, count = items.len(), total = listing.len(), "Serving video page");

        if !finished {
            Ok(AssetPage::more(items, ScanCursor::new(end.to_string())))
        } else {
            Ok(AssetPage::last(items))
        }
    }

    fn name(&self) -> &str {
        "desktop-filesystem"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::time::{Duration, SystemTime};

    struct TempTree {
        root: PathBuf,
    }

    impl TempTree {
        fn new() -> Self {
            let root = env::temp_dir().join(format!("fs-video-source-{}", uuid::Uuid::new_v4()));
            std::fs::create_dir_all(&root).unwrap();
            Self { root }
        }

        fn file(&self, relative: &str, age_secs: u64) -> PathBuf {
            let path = self.root.join(relative);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            let file = std::fs::File::create(&path).unwrap();
            file.set_modified(SystemTime::now() - Duration::from_secs(age_secs))
                .unwrap();
            path
        }
    }

    impl Drop for TempTree {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.root);
        }
    }

    async fn collect_all(source: &FsVideoSource, page_size: u32) -> Vec<AssetPage> {
        let mut pages = Vec::new();
        let mut request = PageRequest::first(page_size, MediaKind::Video);
        loop {
            let page = source.fetch_page(request).await.unwrap();
            let next = page.next_cursor.clone();
            let more = page.has_more;
            pages.push(page);
            if !more {
                return pages;
            }
            request = PageRequest::after(next, page_size, MediaKind::Video);
        }
    }

    #[tokio::test]
    async fn test_lists_only_visible_videos() {
        let tree = TempTree::new();
        let clip = tree.file("Movies/clip.MP4", 10);
        tree.file("Movies/notes.txt", 10);
        tree.file("Movies/.hidden.mp4", 10);
        tree.file(".cache/thumb.mp4", 10);

        let source = FsVideoSource::new(vec![tree.root.clone()]);
        let page = source
            .fetch_page(PageRequest::first(10, MediaKind::Video))
            .await
            .unwrap();

        assert!(!page.has_more);
        assert_eq!(page.items.len(), 1);

        let item = &page.items[0];
        assert_eq!(item.id, clip.to_string_lossy());
        assert_eq!(item.filename, "clip.MP4");
        let movies = tree.root.join("Movies").to_string_lossy().into_owned();
        assert_eq!(item.folder_name.as_deref(), Some("Movies"));
        assert_eq!(item.folder_path.as_deref(), Some(movies.as_str()));
        assert_eq!(item.size_bytes, Some(0));
    }

    #[tokio::test]
    async fn test_newest_first_across_folders() {
        let tree = TempTree::new();
        tree.file("a/old.mkv", 300);
        tree.file("b/new.mp4", 10);
        tree.file("a/mid.mov", 100);

        let source = FsVideoSource::new(vec![tree.root.clone()]);
        let page = source
            .fetch_page(PageRequest::first(10, MediaKind::Video))
            .await
            .unwrap();

        let names: Vec<&str> = page.items.iter().map(|i| i.filename.as_str()).collect();
        assert_eq!(names, ["new.mp4", "mid.mov", "old.mkv"]);
    }

    #[tokio::test]
    async fn test_pages_cover_listing_once() {
        let tree = TempTree::new();
        for i in 0..5 {
            tree.file(&format!("clips/{}.mp4", i), i * 10);
        }

        let source = FsVideoSource::new(vec![tree.root.clone()]);
        let pages = collect_all(&source, 2).await;

        assert_eq!(pages.len(), 3);
        assert_eq!(pages[0].next_cursor, Some(ScanCursor::new("2")));

        let mut ids: Vec<String> = pages
            .into_iter()
            .flat_map(|p| p.items)
            .map(|i| i.id)
            .collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), 5);
    }

    #[tokio::test]
    async fn test_listing_is_stable_within_a_session() {
        let tree = TempTree::new();
        tree.file("v/1.mp4", 10);
        tree.file("v/2.mp4", 20);

        let source = FsVideoSource::new(vec![tree.root.clone()]);
        let first = source
            .fetch_page(PageRequest::first(1, MediaKind::Video))
            .await
            .unwrap();

        tree.file("v/3.mp4", 0);

        let second = source
            .fetch_page(PageRequest::after(first.next_cursor, 1, MediaKind::Video))
            .await
            .unwrap();
        assert!(!second.has_more);
        assert_eq!(second.items[0].filename, "2.mp4");
    }

    #[tokio::test]
    async fn test_listing_released_after_last_page() {
        let tree = TempTree::new();
        for i in 0..3 {
            tree.file(&format!("v/{}.mp4", i), i * 10);
        }

        let source = FsVideoSource::new(vec![tree.root.clone()]);
        let first = source
            .fetch_page(PageRequest::first(2, MediaKind::Video))
            .await
            .unwrap();
        assert!(source.listing.lock().await.is_some());

        let last = source
            .fetch_page(PageRequest::after(first.next_cursor.clone(), 2, MediaKind::Video))
            .await
            .unwrap();
        assert!(!last.has_more);
        assert!(source.listing.lock().await.is_none());

        let replay = source
            .fetch_page(PageRequest::after(first.next_cursor, 2, MediaKind::Video))
            .await;
        assert!(matches!(replay, Err(BridgeError::InvalidCursor(_))));
    }

    #[tokio::test]
    async fn test_invalid_cursors() {
        let tree = TempTree::new();
        tree.file("v/1.mp4", 10);
        let source = FsVideoSource::new(vec![tree.root.clone()]);

        let without_listing = source
            .fetch_page(PageRequest::after(Some(ScanCursor::new("0")), 10, MediaKind::Video))
            .await;
        assert!(matches!(without_listing, Err(BridgeError::InvalidCursor(_))));

        source
            .fetch_page(PageRequest::first(10, MediaKind::Video))
            .await
            .unwrap();

        for token in ["abc", "99"] {
            let result = source
                .fetch_page(PageRequest::after(Some(ScanCursor::new(token)), 10, MediaKind::Video))
                .await;
            assert!(matches!(result, Err(BridgeError::InvalidCursor(_))), "{}", token);
        }
    }

    #[tokio::test]
    async fn test_missing_root_and_other_kinds_are_empty() {
        let missing = env::temp_dir().join(format!("missing-{}", uuid::Uuid::new_v4()));
        let source = FsVideoSource::new(vec![missing]);

        let page = source
            .fetch_page(PageRequest::first(10, MediaKind::Video))
            .await
            .unwrap();
        assert!(page.items.is_empty());
        assert!(!page.has_more);

        let photos = source
            .fetch_page(PageRequest::first(10, MediaKind::Photo))
            .await
            .unwrap();
        assert!(photos.items.is_empty());
    }
}
