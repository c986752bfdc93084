//! Core service façade and bootstrap helpers.
//!
//! This crate wires a host-provided [`AssetSource`] into the shared core: the
//! SQLite media cache, the folder index and the reconciliation engine, all
//! behind [`MediaLibrary`]. Desktop apps typically enable the `desktop-shims`
//! feature (which depends on `bridge-desktop`) and call [`bootstrap_desktop`];
//! mobile hosts implement `AssetSource` over the platform media store and call
//! [`MediaLibrary::open`] directly.

pub mod error;
pub mod library;

pub use error::{CoreError, Result};
pub use library::MediaLibrary;

pub use bridge_traits::media::AssetSource;
pub use core_library::{FolderGroup, FolderSnapshot, MediaRecord, VideoSort};
pub use core_runtime::config::CoreConfig;
pub use core_sync::ScanReport;

#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub use bridge_desktop::FsVideoSource;

/// Convenience bootstrapper for desktop hosts.
///
/// Indexes video files below `roots`, or below the user's video directory
/// when `roots` is empty.
///
/// ```no_run
/// # async fn example() -> core_service::Result<()> {
/// use core_service::{bootstrap_desktop, CoreConfig};
///
/// let config = CoreConfig::builder().database_path("media.db").build()?;
/// let library = bootstrap_desktop(config, Vec::new()).await?;
/// library.start_scan().await?;
/// let report = library.wait_for_scan().await?;
/// println!("{} folders", library.folders().len());
/// # Ok(())
/// # }
/// ```
#[cfg(all(feature = "desktop-shims", not(target_arch = "wasm32")))]
pub async fn bootstrap_desktop(
    config: CoreConfig,
    roots: Vec<std::path::PathBuf>,
) -> Result<MediaLibrary> {
    use std::sync::Arc;

    let source = if roots.is_empty() {
        FsVideoSource::with_default_roots()
    } else {
        FsVideoSource::new(roots)
    };

    MediaLibrary::open(config, Arc::new(source)).await
}
