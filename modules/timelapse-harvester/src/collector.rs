use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use timelapse_common::{HarvestError, PostRecord, Result};
use tracing::{debug, info};

use crate::fetcher::fetch_new_since;
use crate::projection::Projector;
use crate::traits::FeedSource;

const PROGRESS_EVERY: usize = 100;

/// `[start, end]` time range covered by one collection run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CutoffWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl CutoffWindow {
    /// The `hours_back` hours up to `now`. A span reaching before the
    /// earliest representable instant is a configuration error.
    pub fn trailing(hours_back: u32, now: DateTime<Utc>) -> Result<Self> {
        let start = Duration::try_hours(i64::from(hours_back))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                HarvestError::Config(format!("look-back of {hours_back} hours is out of range"))
            })?;
        Ok(Self { start, end: now })
    }

    pub fn overlap_with(&self, later: &CutoffWindow) -> Duration {
        let end = self.end.min(later.end);
        let start = self.start.max(later.start);
        (end - start).max(Duration::zero())
    }
}

/// Window for a run scheduled every `hour_interval` hours. One extra hour is
/// included so consecutive runs overlap and nothing falls between them.
pub fn overlap_window(hour_interval: u32, now: DateTime<Utc>) -> Result<CutoffWindow> {
    let hours_back = hour_interval.checked_add(1).ok_or_else(|| {
        HarvestError::Config(format!("hour interval {hour_interval} is out of range"))
    })?;
    CutoffWindow::trailing(hours_back, now)
}

/// Fetches recent submissions and projects each through the submission table.
pub struct Collector {
    feed: Arc<dyn FeedSource>,
    projector: Projector,
}

impl Collector {
    pub fn new(feed: Arc<dyn FeedSource>, projector: Projector) -> Self {
        Self { feed, projector }
    }

    pub async fn collect_recent(
        &self,
        hours_back: u32,
        feed_id: &str,
    ) -> Result<Vec<PostRecord>> {
        self.collect_recent_at(hours_back, feed_id, Utc::now()).await
    }

    pub async fn collect_recent_at(
        &self,
        hours_back: u32,
        feed_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>> {
        self.collect_window(CutoffWindow::trailing(hours_back, now)?, feed_id)
            .await
    }

    /// Every submission created since `window.start`, projected. No dedup:
    /// overlapping runs record the same post more than once.
    pub async fn collect_window(
        &self,
        window: CutoffWindow,
        feed_id: &str,
    ) -> Result<Vec<PostRecord>> {
        let items = fetch_new_since(self.feed.as_ref(), feed_id, window.start).await?;

        let mut records = Vec::with_capacity(items.len());
        for (i, item) in items.iter().enumerate() {
            records.push(self.projector.project(item)?);
            if (i + 1) % PROGRESS_EVERY == 0 {
                debug!(feed_id, projected = i + 1, total = items.len(), "Projecting submissions");
            }
        }

        info!(
            feed_id,
            start = %window.start,
            end = %window.end,
            records = records.len(),
            "Collected recent submissions"
        );
        Ok(records)
    }

    /// Current state of one submission, projected.
    pub async fn load_submission(&self, reference_id: &str) -> Result<PostRecord> {
        let item = self.feed.get_by_id(reference_id).await?;
        self.projector.project(&item)
    }
}
