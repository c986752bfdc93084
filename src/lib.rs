//! Workspace placeholder crate.
//!
//! This crate exists to expose shared feature flags that map to the individual
//! workspace crates. Host applications can depend on `media-index-workspace`
//! and enable `desktop-shims` to get the façade plus the desktop asset source
//! without wiring each crate individually.

#[cfg(feature = "desktop-shims")]
pub use core_service::*;
