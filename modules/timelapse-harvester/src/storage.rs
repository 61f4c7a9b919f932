use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use timelapse_common::{HarvestError, Result};

use crate::traits::{BlobEntry, BlobStore};

// ---------------------------------------------------------------------------
// MemoryBlobStore
// ---------------------------------------------------------------------------

struct StoredBlob {
    bytes: Vec<u8>,
    last_modified: DateTime<Utc>,
}

/// In-process store. Objects written with [`put`](BlobStore::put) are stamped
/// with the wall clock; [`put_at`](MemoryBlobStore::put_at) sets the stamp
/// explicitly.
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: Mutex<BTreeMap<(String, String), StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_at(&self, bucket: &str, key: &str, bytes: Vec<u8>, last_modified: DateTime<Utc>) {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).insert(
            (bucket.to_string(), key.to_string()),
            StoredBlob {
                bytes,
                last_modified,
            },
        );
    }

    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .keys()
            .filter(|(b, _)| b == bucket)
            .map(|(_, k)| k.clone())
            .collect()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.put_at(bucket, key, bytes, Utc::now());
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&(bucket.to_string(), key.to_string()))
            .map(|blob| blob.bytes.clone())
            .ok_or_else(|| HarvestError::io(format!("no object {bucket}/{key}")))
    }

    async fn list(&self, bucket: &str) -> Result<Vec<BlobEntry>> {
        Ok(self
            .objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|((b, _), _)| b == bucket)
            .map(|((_, key), blob)| BlobEntry {
                key: key.clone(),
                last_modified: blob.last_modified,
            })
            .collect())
    }
}

// ---------------------------------------------------------------------------
// FsBlobStore
// ---------------------------------------------------------------------------

/// Buckets are directories under `root`; objects are files. Writes go to a
/// temporary file first and are renamed into place, so a listed object is
/// always complete.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf> {
        for part in [bucket, key] {
            if part.is_empty()
                || part.starts_with('.')
                || part.contains(['/', '\\'])
            {
                return Err(HarvestError::io(format!(
                    "invalid bucket or key name: {part:?}"
                )));
            }
        }
        Ok(self.root.join(bucket).join(key))
    }
}

fn is_temp(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.starts_with('.'))
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<()> {
        let path = self.object_path(bucket, key)?;
        let dir = self.root.join(bucket);
        tokio::fs::create_dir_all(&dir).await?;

        let tmp = dir.join(format!(".{key}.tmp"));
        let written = match tokio::fs::write(&tmp, &bytes).await {
            Ok(()) => tokio::fs::rename(&tmp, &path).await,
            Err(e) => Err(e),
        };
        if let Err(e) = written {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(e.into());
        }

        tracing::debug!(path = %path.display(), bytes = bytes.len(), "Stored object");
        Ok(())
    }

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>> {
        let path = self.object_path(bucket, key)?;
        Ok(tokio::fs::read(&path).await?)
    }

    async fn list(&self, bucket: &str) -> Result<Vec<BlobEntry>> {
        let dir = self.root.join(bucket);
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut listed = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            let metadata = entry.metadata().await?;
            if !metadata.is_file() || is_temp(&path) {
                continue;
            }
            let Some(key) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            listed.push(BlobEntry {
                key: key.to_string(),
                last_modified: DateTime::<Utc>::from(metadata.modified()?),
            });
        }
        listed.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(listed)
    }
}
