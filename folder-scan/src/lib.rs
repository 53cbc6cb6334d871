//! # Folder Scan
//!
//! Finds the images LocalLens should index under a folder.
//!
//! The walk is recursive, keeps files whose extension is in the configured
//! allowlist (case-insensitive), prunes directories matching any opt-in
//! exclude pattern and returns
//! paths in a stable, sorted order.

pub mod config;
pub mod error;
pub mod scanner;

pub use config::{COMMON_EXCLUDES, DEFAULT_IMAGE_EXTENSIONS, ExcludeMatcher, ScanConfig};
pub use error::{Result, ScanError};
pub use scanner::find_images;
