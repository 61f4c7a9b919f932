// Test mocks for the harvester workflows.
//
// MockFeed (FeedSource): in-memory newest-first listings with real cursor
// pagination, plus a current-state table for batched lookups. Knobs for
// reordered/partial batch responses and transient failures.
//
// MemoryBlobStore lives in `storage` since it is also a usable backend.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reddit_client::Submission;
use timelapse_common::{HarvestError, Result};

use crate::traits::FeedSource;

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A submission with id `id`, fullname `t3_<id>`, created at `created_utc`.
pub fn submission(id: &str, created_utc: i64) -> Submission {
    Submission {
        id: id.to_string(),
        name: format!("t3_{id}"),
        created_utc: created_utc as f64,
        title: Some(format!("post {id}")),
        author: Some("someuser".to_string()),
        author_fullname: Some("t2_someuser".to_string()),
        subreddit: Some("stocks".to_string()),
        subreddit_id: Some("t5_2qjfk".to_string()),
        score: Some(1),
        num_comments: Some(0),
        ..Default::default()
    }
}

/// Same submission with a different score, as seen at a later time.
pub fn with_score(mut item: Submission, score: i64) -> Submission {
    item.score = Some(score);
    item
}

/// UTC instant from epoch seconds.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(secs, 0).single().expect("valid timestamp")
}

// ---------------------------------------------------------------------------
// MockFeed
// ---------------------------------------------------------------------------

pub struct MockFeed {
    feeds: HashMap<String, Vec<Submission>>,
    current: HashMap<String, Submission>,
    omitted: HashSet<String>,
    reverse_batches: bool,
    failures_left: AtomicU32,
    page_requests: AtomicUsize,
    batch_requests: Mutex<Vec<Vec<String>>>,
}

impl Default for MockFeed {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFeed {
    pub fn new() -> Self {
        Self {
            feeds: HashMap::new(),
            current: HashMap::new(),
            omitted: HashSet::new(),
            reverse_batches: false,
            failures_left: AtomicU32::new(0),
            page_requests: AtomicUsize::new(0),
            batch_requests: Mutex::new(Vec::new()),
        }
    }

    /// Register a feed's items. They are served newest first and also become
    /// the current state for lookups unless overridden.
    pub fn with_submissions(mut self, feed_id: &str, mut items: Vec<Submission>) -> Self {
        items.sort_by(|a, b| b.created_utc.total_cmp(&a.created_utc));
        for item in &items {
            self.current
                .entry(item.name.clone())
                .or_insert_with(|| item.clone());
        }
        self.feeds
            .entry(feed_id.to_string())
            .or_default()
            .extend(items);
        self
    }

    /// Override the state returned by lookups for one item.
    pub fn with_current_state(mut self, item: Submission) -> Self {
        self.current.insert(item.name.clone(), item);
        self
    }

    /// Batched lookups return items in reverse request order.
    pub fn reverse_batch_order(mut self) -> Self {
        self.reverse_batches = true;
        self
    }

    /// Lookups silently drop this reference id (deleted/removed post).
    pub fn omit_from_lookup(mut self, reference_id: &str) -> Self {
        self.omitted.insert(reference_id.to_string());
        self
    }

    /// The next `n` calls fail with a retryable I/O error.
    pub fn fail_next(self, n: u32) -> Self {
        self.failures_left.store(n, Ordering::SeqCst);
        self
    }

    pub fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    pub fn batch_requests(&self) -> Vec<Vec<String>> {
        self.batch_requests.lock().unwrap().clone()
    }

    fn take_failure(&self) -> Result<()> {
        let left = self.failures_left.load(Ordering::SeqCst);
        if left > 0 {
            self.failures_left.store(left - 1, Ordering::SeqCst);
            return Err(HarvestError::transient("MockFeed: injected failure"));
        }
        Ok(())
    }

    fn lookup(&self, reference_id: &str) -> Option<Submission> {
        if self.omitted.contains(reference_id) {
            return None;
        }
        self.current.get(reference_id).cloned()
    }
}

#[async_trait]
impl FeedSource for MockFeed {
    async fn list_new(
        &self,
        feed_id: &str,
        page_size: u32,
        after: Option<&str>,
    ) -> Result<Vec<Submission>> {
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let items = self.feeds.get(feed_id).map(Vec::as_slice).unwrap_or(&[]);
        let start = match after {
            None => 0,
            Some(cursor) => match items.iter().position(|s| s.name == cursor) {
                Some(pos) => pos + 1,
                None => return Ok(Vec::new()),
            },
        };

        Ok(items
            .iter()
            .skip(start)
            .take(page_size as usize)
            .cloned()
            .collect())
    }

    async fn get_by_ids(&self, reference_ids: &[String]) -> Result<Vec<Submission>> {
        self.take_failure()?;
        self.batch_requests
            .lock()
            .unwrap()
            .push(reference_ids.to_vec());

        let mut items: Vec<Submission> = reference_ids
            .iter()
            .filter_map(|id| self.lookup(id))
            .collect();
        if self.reverse_batches {
            items.reverse();
        }
        Ok(items)
    }

    async fn get_by_id(&self, reference_id: &str) -> Result<Submission> {
        self.take_failure()?;
        self.lookup(reference_id)
            .ok_or_else(|| HarvestError::io(format!("MockFeed: no submission {reference_id}")))
    }
}
