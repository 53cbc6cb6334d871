//! Configuration for image discovery.

use serde::{Deserialize, Serialize};
use wildmatch::WildMatch;

use crate::error::{Result, ScanError};

/// Extensions recognised as images when none are configured.
pub const DEFAULT_IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "gif", "webp", "bmp"];

/// Directories that rarely hold user photos. Not applied unless requested
/// through [`ScanConfig::with_common_excludes`].
pub const COMMON_EXCLUDES: [&str; 4] = [
    // Version control
    "**/.git/**",
    // Dependencies
    "**/node_modules/**",
    // NAS thumbnail caches
    "**/@eaDir/**",
    // Trash
    "**/.Trash*/**",
];

/// Configuration for a folder scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// File extensions to keep, without the leading dot. Matched
    /// case-insensitively.
    pub extensions: Vec<String>,

    /// Maximum depth to recurse (None = unlimited).
    pub max_depth: Option<usize>,

    /// Whether to follow symbolic links.
    pub follow_symlinks: bool,

    /// Patterns to exclude (wildcard patterns matched against the path
    /// relative to the scan root, with a leading `/`). Empty by default, so
    /// every allowlisted file under the root is found.
    pub exclude_patterns: Vec<String>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_IMAGE_EXTENSIONS.iter().map(ToString::to_string).collect(),
            max_depth: None,
            follow_symlinks: false,
            exclude_patterns: Vec::new(),
        }
    }
}

impl ScanConfig {
    /// Add an exclude pattern.
    pub fn exclude(mut self, pattern: impl Into<String>) -> Self {
        self.exclude_patterns.push(pattern.into());
        self
    }

    /// Set the maximum depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Replace the extension allowlist.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.extensions = extensions.into_iter().map(Into::into).collect();
        self
    }

    /// Enable following symbolic links.
    pub fn follow_symlinks(mut self) -> Self {
        self.follow_symlinks = true;
        self
    }

    /// Add [`COMMON_EXCLUDES`].
    pub fn with_common_excludes(mut self) -> Self {
        self.exclude_patterns
            .extend(COMMON_EXCLUDES.iter().map(ToString::to_string));
        self
    }

    /// Check that the allowlist and patterns are usable.
    pub fn validate(&self) -> Result<()> {
        if self.extensions.is_empty() {
            return Err(ScanError::InvalidPattern(
                "at least one extension is required".to_string(),
            ));
        }
        if let Some(bad) = self
            .extensions
            .iter()
            .find(|ext| ext.trim().is_empty() || ext.starts_with('.') || ext.contains('/'))
        {
            return Err(ScanError::InvalidPattern(format!(
                "invalid extension {bad:?}"
            )));
        }
        if self.exclude_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(ScanError::InvalidPattern(
                "empty exclude pattern".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether a file name has an allowed extension.
    pub fn is_image(&self, file_name: &str) -> bool {
        let Some((_, ext)) = file_name.rsplit_once('.') else {
            return false;
        };
        self.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext))
    }

    /// Compile the exclude patterns for repeated matching.
    pub fn exclude_matcher(&self) -> ExcludeMatcher {
        ExcludeMatcher {
            patterns: self.exclude_patterns.iter().map(|p| WildMatch::new(p)).collect(),
        }
    }
}

/// Compiled exclude patterns.
#[derive(Debug, Clone)]
pub struct ExcludeMatcher {
    patterns: Vec<WildMatch>,
}

impl ExcludeMatcher {
    /// Check if a root-relative path should be excluded.
    pub fn should_exclude(&self, relative: &str) -> bool {
        self.patterns.iter().any(|pattern| pattern.matches(relative))
    }

    /// Whether no pattern is configured.
    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}
