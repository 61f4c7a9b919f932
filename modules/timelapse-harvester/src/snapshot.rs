use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use timelapse_common::{HarvestError, PostRecord, Result};
use tracing::{debug, info};

use crate::retry::{with_retry, RetryPolicy};
use crate::traits::{BlobEntry, BlobStore};

/// Object key format: one snapshot per second per bucket.
const KEY_FORMAT: &str = "%m_%d_%Y_%H_%M_%S.json";

/// Output of one job run: every record it produced, serialized as one object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub taken_at: DateTime<Utc>,
    pub records: Vec<PostRecord>,
}

pub fn snapshot_key(taken_at: DateTime<Utc>) -> String {
    taken_at.format(KEY_FORMAT).to_string()
}

/// Snapshot reads and writes over a [`BlobStore`], with bounded retry on
/// every store call.
#[derive(Clone)]
pub struct SnapshotStore {
    store: Arc<dyn BlobStore>,
    retry: RetryPolicy,
}

impl SnapshotStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Serialize `records` and store them under the key for `taken_at`.
    pub async fn write(
        &self,
        bucket: &str,
        taken_at: DateTime<Utc>,
        records: &[PostRecord],
    ) -> Result<String> {
        let key = snapshot_key(taken_at);
        let snapshot = Snapshot {
            taken_at,
            records: records.to_vec(),
        };
        let bytes = serde_json::to_vec(&snapshot)
            .map_err(|e| HarvestError::DataInconsistency(format!("cannot encode snapshot: {e}")))?;
        let size = bytes.len();

        with_retry(&self.retry, "snapshot_put", || {
            self.store.put(bucket, &key, bytes.clone())
        })
        .await?;

        info!(bucket, key = %key, records = records.len(), bytes = size, "Wrote snapshot");
        Ok(key)
    }

    pub async fn read(&self, bucket: &str, key: &str) -> Result<Snapshot> {
        let bytes = with_retry(&self.retry, "snapshot_get", || self.store.get(bucket, key)).await?;
        serde_json::from_slice(&bytes).map_err(|e| {
            HarvestError::DataInconsistency(format!("snapshot {bucket}/{key} is unreadable: {e}"))
        })
    }

    /// Snapshots last modified strictly after `since`, oldest first.
    pub async fn list_since(&self, bucket: &str, since: DateTime<Utc>) -> Result<Vec<BlobEntry>> {
        let mut entries: Vec<BlobEntry> =
            with_retry(&self.retry, "snapshot_list", || self.store.list(bucket))
                .await?
                .into_iter()
                .filter(|entry| entry.last_modified > since)
                .collect();
        entries.sort_by(|a, b| {
            a.last_modified
                .cmp(&b.last_modified)
                .then_with(|| a.key.cmp(&b.key))
        });

        debug!(bucket, since = %since, selected = entries.len(), "Selected snapshots");
        Ok(entries)
    }

    /// Every record of every snapshot selected by [`list_since`](Self::list_since).
    pub async fn read_records_since(
        &self,
        bucket: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>> {
        let mut records = Vec::new();
        for entry in self.list_since(bucket, since).await? {
            let snapshot = self.read(bucket, &entry.key).await?;
            records.extend(snapshot.records);
        }
        Ok(records)
    }
}
