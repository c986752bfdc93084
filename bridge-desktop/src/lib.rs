//! # Desktop Bridge Implementations
//!
//! Default implementations of bridge traits for desktop platforms
//! (macOS, Windows, Linux).
//!
//! ## Overview
//!
//! Desktop hosts have no system media store to page through, so this crate
//! provides one:
//! - `AssetSource` using a `tokio::fs` walk over video directories
//!
//! ## Usage
//!
//! ```ignore
//! use bridge_desktop::FsVideoSource;
//! use bridge_traits::media::{AssetSource, MediaKind, PageRequest};
//!
//! #[tokio::main]
//! async fn main() {
//!     let source = FsVideoSource::with_default_roots();
//!     let page = source.fetch_page(PageRequest::first(50, MediaKind::Video)).await.unwrap();
//!
//!     // Hand the source to the core instead of paging by hand
//! }
//! ```

mod media_source;

pub use media_source::{FsVideoSource, VIDEO_EXTENSIONS};
