//! On-disk format of the embedding store.

use std::collections::{BTreeMap, HashMap};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::error::{EmbeddingError, Result};
use crate::store::Entry;

/// Version written into every index file.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Serialize)]
pub(crate) struct SnapshotRef<'a> {
    format_version: u32,
    model: Option<&'a str>,
    dimension: Option<usize>,
    entries: BTreeMap<&'a str, StoredEntryRef<'a>>,
}

#[derive(Serialize)]
struct StoredEntryRef<'a> {
    description: &'a str,
    embedding: &'a [f32],
}

impl<'a> SnapshotRef<'a> {
    pub(crate) fn new(
        model: Option<&'a str>,
        dimension: Option<usize>,
        entries: &'a HashMap<String, Entry>,
    ) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            model,
            dimension,
            entries: entries
                .iter()
                .map(|(id, entry)| {
                    (
                        id.as_str(),
                        StoredEntryRef {
                            description: &entry.description,
                            embedding: &entry.embedding,
                        },
                    )
                })
                .collect(),
        }
    }

    pub(crate) fn to_bytes(&self, path: &Path) -> Result<Vec<u8>> {
        serde_json::to_vec_pretty(self).map_err(|source| EmbeddingError::Serialization {
            path: path.to_path_buf(),
            source,
        })
    }
}

#[derive(Deserialize)]
pub(crate) struct Snapshot {
    format_version: u32,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    dimension: Option<usize>,
    #[serde(default)]
    entries: BTreeMap<String, StoredEntry>,
}

#[derive(Deserialize)]
struct StoredEntry {
    description: String,
    embedding: Vec<f32>,
}

/// Entries decoded from a file whose header matched the store.
pub(crate) struct Decoded {
    pub(crate) dimension: Option<usize>,
    pub(crate) entries: HashMap<String, Entry>,
}

impl Snapshot {
    pub(crate) fn from_bytes(path: &Path, bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|source| EmbeddingError::Serialization {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Check the header against what the store expects and unpack the
    /// entries.
    pub(crate) fn validate(
        self,
        path: &Path,
        model: Option<&str>,
        expected_dimension: Option<usize>,
    ) -> Result<Decoded> {
        if self.format_version != FORMAT_VERSION {
            return Err(EmbeddingError::UnsupportedFormat {
                path: path.to_path_buf(),
                version: self.format_version,
            });
        }

        if let Some(expected) = model
            && self.model.as_deref() != Some(expected)
        {
            return Err(header_mismatch(
                path,
                "model",
                expected,
                self.model.as_deref().unwrap_or("<none>"),
            ));
        }

        if let (Some(expected), Some(found)) = (expected_dimension, self.dimension)
            && expected != found
        {
            return Err(header_mismatch(path, "dimension", expected, found));
        }

        let dimension = self
            .dimension
            .or(expected_dimension)
            .or_else(|| self.entries.values().next().map(|e| e.embedding.len()));

        let mut entries = HashMap::with_capacity(self.entries.len());
        for (id, stored) in self.entries {
            if let Some(dimension) = dimension
                && stored.embedding.len() != dimension
            {
                return Err(header_mismatch(
                    path,
                    "entry dimension",
                    dimension,
                    format!("{} for {id}", stored.embedding.len()),
                ));
            }
            if stored.embedding.is_empty() {
                return Err(header_mismatch(
                    path,
                    "entry dimension",
                    "a non-empty vector",
                    format!("0 for {id}"),
                ));
            }
            entries.insert(
                id.clone(),
                Entry {
                    id,
                    description: stored.description,
                    embedding: stored.embedding,
                },
            );
        }

        Ok(Decoded { dimension, entries })
    }
}

fn header_mismatch(
    path: &Path,
    field: &'static str,
    expected: impl ToString,
    found: impl ToString,
) -> EmbeddingError {
    EmbeddingError::HeaderMismatch {
        path: path.to_path_buf(),
        field,
        expected: expected.to_string(),
        found: found.to_string(),
    }
}

/// Write `bytes` to `path` so that a crash leaves either the old file or the
/// new one, never a torn mix.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let persistence = |source| EmbeddingError::Persistence {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await.map_err(persistence)?;
    }

    let temp_path = temp_path_for(path);
    let written = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(source) = written {
        let _ = fs::remove_file(&temp_path).await;
        return Err(persistence(source));
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(OsStr::to_os_string)
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
