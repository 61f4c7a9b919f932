// Trait abstractions for the two external collaborators.
//
// FeedSource: the platform listing/lookup API (RedditClient in production).
// BlobStore: durable object storage for snapshots.
//
// Both are mocked in tests (MockFeed, MemoryBlobStore): no network, no disk.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reddit_client::{RedditClient, RedditError, Submission};
use timelapse_common::{HarvestError, Result};

// ---------------------------------------------------------------------------
// FeedSource
// ---------------------------------------------------------------------------

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// One page of the feed, newest first. `after` is the reference id of
    /// the last item already seen.
    async fn list_new(
        &self,
        feed_id: &str,
        page_size: u32,
        after: Option<&str>,
    ) -> Result<Vec<Submission>>;

    /// Batched lookup of current state by reference id. Order and
    /// completeness of the response are not guaranteed.
    async fn get_by_ids(&self, reference_ids: &[String]) -> Result<Vec<Submission>>;

    /// Lookup of a single item by reference id.
    async fn get_by_id(&self, reference_id: &str) -> Result<Submission>;
}

#[async_trait]
impl FeedSource for RedditClient {
    async fn list_new(
        &self,
        feed_id: &str,
        page_size: u32,
        after: Option<&str>,
    ) -> Result<Vec<Submission>> {
        RedditClient::list_new(self, feed_id, page_size, after)
            .await
            .map_err(reddit_error)
    }

    async fn get_by_ids(&self, reference_ids: &[String]) -> Result<Vec<Submission>> {
        self.info(reference_ids).await.map_err(reddit_error)
    }

    async fn get_by_id(&self, reference_id: &str) -> Result<Submission> {
        self.submission(reference_id).await.map_err(reddit_error)
    }
}

/// Network failures and 429/5xx are retryable I/O failures, other API
/// statuses are non-retryable I/O failures, undecodable bodies are data
/// inconsistencies.
pub(crate) fn reddit_error(err: RedditError) -> HarvestError {
    match err {
        RedditError::Parse(msg) => {
            HarvestError::DataInconsistency(format!("unreadable Reddit response: {msg}"))
        }
        other => HarvestError::TransientIo {
            retryable: other.is_retryable(),
            message: other.to_string(),
        },
    }
}

// ---------------------------------------------------------------------------
// BlobStore
// ---------------------------------------------------------------------------

/// A stored object as reported by a bucket listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobEntry {
    pub key: String,
    pub last_modified: DateTime<Utc>,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, bucket: &str, key: &str, bytes: Vec<u8>) -> Result<()>;

    async fn get(&self, bucket: &str, key: &str) -> Result<Vec<u8>>;

    /// All objects in the bucket. A bucket that does not exist yet is empty.
    async fn list(&self, bucket: &str) -> Result<Vec<BlobEntry>>;
}
