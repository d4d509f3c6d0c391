//! Filesystem helpers: source discovery and metadata.

pub mod metadata;
pub mod walker;

pub use walker::discover_files;
