use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use timelapse_common::{Config, Result};
use tracing::info;

use crate::collector::{overlap_window, Collector};
use crate::projection::{ItemType, MappingSource, Projector};
use crate::resampler::Resampler;
use crate::snapshot::SnapshotStore;
use crate::traits::FeedSource;

/// Invocation result in the shape scheduled-function runtimes expect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobResponse {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    pub body: String,
}

impl JobResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status_code: 200,
            body: body.into(),
        }
    }

    pub fn failed(body: impl Into<String>) -> Self {
        Self {
            status_code: 500,
            body: body.into(),
        }
    }
}

/// Collaborators shared by both scheduled jobs.
#[derive(Clone)]
pub struct Harvester {
    feed: Arc<dyn FeedSource>,
    snapshots: SnapshotStore,
    mappings: Arc<dyn MappingSource>,
}

impl Harvester {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        snapshots: SnapshotStore,
        mappings: Arc<dyn MappingSource>,
    ) -> Self {
        Self {
            feed,
            snapshots,
            mappings,
        }
    }

    async fn submission_projector(&self, config: &Config) -> Result<Projector> {
        Projector::load(self.mappings.as_ref(), ItemType::Submission, config.debug).await
    }

    /// Collect the last `hour_interval + 1` hours of the subreddit and store
    /// them as one snapshot in the original-load bucket.
    pub async fn collect_recent_job(
        &self,
        config: &Config,
        now: DateTime<Utc>,
    ) -> Result<JobResponse> {
        let projector = self.submission_projector(config).await?;
        let collector = Collector::new(self.feed.clone(), projector);
        let window = overlap_window(config.hour_interval, now)?;

        let records = collector.collect_window(window, &config.subreddit).await?;
        let key = self
            .snapshots
            .write(&config.original_load_bucket, now, &records)
            .await?;

        info!(
            subreddit = %config.subreddit,
            bucket = %config.original_load_bucket,
            key = %key,
            records = records.len(),
            "Collection job finished"
        );
        Ok(JobResponse::ok(format!(
            "Stored {} submissions from r/{} in {}/{}",
            records.len(),
            config.subreddit,
            config.original_load_bucket,
            key
        )))
    }

    /// Re-sample posts from the last `n_days_time_lapsed_submissions` days of
    /// collection snapshots that sit in an age bucket, into the n-days-old
    /// bucket.
    pub async fn resample_aged_job(
        &self,
        config: &Config,
        now: DateTime<Utc>,
    ) -> Result<JobResponse> {
        let resampler = Resampler::new(
            self.feed.clone(),
            self.snapshots.clone(),
            self.submission_projector(config).await?,
            config.original_load_bucket.clone(),
        )
        .allow_partial_refetch(config.allow_partial_refetch);

        let records = resampler
            .resample_at(config.n_days_time_lapsed_submissions, now)
            .await?;
        let key = self
            .snapshots
            .write(&config.n_days_old_bucket, now, &records)
            .await?;

        info!(
            bucket = %config.n_days_old_bucket,
            key = %key,
            records = records.len(),
            days_back = config.n_days_time_lapsed_submissions,
            "Resample job finished"
        );
        Ok(JobResponse::ok(format!(
            "Stored {} aged submissions in {}/{}",
            records.len(),
            config.n_days_old_bucket,
            key
        )))
    }
}
