//! Recursive image enumeration.

use std::path::{Path, PathBuf};

use tracing::{debug, info};
use walkdir::{DirEntry, WalkDir};

use crate::config::{ExcludeMatcher, ScanConfig};
use crate::error::{Result, ScanError};

/// List every image under `root`, sorted by path.
///
/// An empty result is not an error. A missing root, or a root that is not a
/// directory, is.
pub fn find_images(root: &Path, config: &ScanConfig) -> Result<Vec<PathBuf>> {
    config.validate()?;

    let metadata = match std::fs::metadata(root) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ScanError::DirectoryNotFound(root.to_path_buf()));
        }
        Err(source) => {
            return Err(ScanError::Io {
                path: root.to_path_buf(),
                source,
            });
        }
    };
    if !metadata.is_dir() {
        return Err(ScanError::NotADirectory(root.to_path_buf()));
    }

    let excludes = config.exclude_matcher();
    let walker = WalkDir::new(root)
        .follow_links(config.follow_symlinks)
        .max_depth(config.max_depth.unwrap_or(usize::MAX))
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !is_excluded(root, entry, &excludes));

    let mut images = Vec::new();
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if config.is_image(&entry.file_name().to_string_lossy()) {
            debug!(path = %entry.path().display(), "found image");
            images.push(entry.into_path());
        }
    }

    images.sort();
    info!(root = %root.display(), count = images.len(), "scanned folder for images");
    Ok(images)
}

fn is_excluded(root: &Path, entry: &DirEntry, excludes: &ExcludeMatcher) -> bool {
    if excludes.is_empty() {
        return false;
    }
    let Ok(relative) = entry.path().strip_prefix(root) else {
        return false;
    };

    let mut candidate = String::new();
    for component in relative.components() {
        candidate.push('/');
        candidate.push_str(&component.as_os_str().to_string_lossy());
    }
    if entry.file_type().is_dir() {
        candidate.push('/');
    }
    excludes.should_exclude(&candidate)
}
