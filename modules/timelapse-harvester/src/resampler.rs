// Historical resampler.
//
// Reads the snapshots written by the collector over the last `days_back`
// days, reduces them to unique posts, keeps the posts whose age is within
// one hour past a whole number of days, and records their current state
// tagged with that number of days. Run hourly, this yields one observation
// of each post per day of age.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use reddit_client::Submission;
use timelapse_common::{FieldValue, HarvestError, IdentityKey, PostRecord, Result, DAYS_OLD};
use tracing::{debug, info, warn};

use crate::projection::Projector;
use crate::snapshot::SnapshotStore;
use crate::traits::FeedSource;

const SECS_PER_HOUR: f64 = 3600.0;
const HOURS_PER_DAY: f64 = 24.0;

/// A unique historical post that falls in an age bucket right now.
#[derive(Debug, Clone, PartialEq)]
pub struct AgedSubmission {
    pub identity: IdentityKey,
    pub hours_since_created: f64,
    pub n_days: u32,
}

pub fn hours_since(created_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    now.signed_duration_since(created_at).num_seconds() as f64 / SECS_PER_HOUR
}

/// Whole days of age when `hours` lies in `[24n, 24n + 1)` for some `n >= 1`.
pub fn age_bucket(hours: f64) -> Option<u32> {
    if hours >= HOURS_PER_DAY && hours % HOURS_PER_DAY < 1.0 {
        Some((hours / HOURS_PER_DAY).floor() as u32)
    } else {
        None
    }
}

/// Unique identities across `records`, plus the number of records skipped
/// for lacking one.
pub fn dedup_identities<'a, I>(records: I) -> (BTreeSet<IdentityKey>, usize)
where
    I: IntoIterator<Item = &'a PostRecord>,
{
    let mut unique = BTreeSet::new();
    let mut skipped = 0;
    for record in records {
        match record.identity() {
            Some(key) => {
                unique.insert(key);
            }
            None => skipped += 1,
        }
    }
    (unique, skipped)
}

/// Identities whose age falls in a bucket at `now`. Creation times outside
/// the representable range never qualify.
pub fn select_aged(
    identities: &BTreeSet<IdentityKey>,
    now: DateTime<Utc>,
) -> Vec<AgedSubmission> {
    identities
        .iter()
        .filter_map(|identity| {
            let hours = hours_since(identity.created_at()?, now);
            age_bucket(hours).map(|n_days| AgedSubmission {
                identity: identity.clone(),
                hours_since_created: hours,
                n_days,
            })
        })
        .collect()
}

pub struct Resampler {
    feed: Arc<dyn FeedSource>,
    snapshots: SnapshotStore,
    projector: Projector,
    source_bucket: String,
    allow_partial_refetch: bool,
}

impl Resampler {
    pub fn new(
        feed: Arc<dyn FeedSource>,
        snapshots: SnapshotStore,
        projector: Projector,
        source_bucket: impl Into<String>,
    ) -> Self {
        Self {
            feed,
            snapshots,
            projector,
            source_bucket: source_bucket.into(),
            allow_partial_refetch: true,
        }
    }

    /// Whether posts missing from the batched lookup are skipped (default)
    /// or fail the run.
    pub fn allow_partial_refetch(mut self, allow: bool) -> Self {
        self.allow_partial_refetch = allow;
        self
    }

    pub async fn resample(&self, days_back: u32) -> Result<Vec<PostRecord>> {
        self.resample_at(days_back, Utc::now()).await
    }

    pub async fn resample_at(
        &self,
        days_back: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<PostRecord>> {
        let identities = self.unique_historical(days_back, now).await?;
        let aged = select_aged(&identities, now);
        debug!(unique = identities.len(), aged = aged.len(), "Selected aged submissions");
        for entry in &aged {
            debug!(
                reference_id = %entry.identity.reference_id,
                hours = entry.hours_since_created,
                n_days = entry.n_days,
                "Submission due for re-sampling"
            );
        }

        if aged.is_empty() {
            info!(days_back, "No submissions in an age bucket");
            return Ok(Vec::new());
        }

        let reference_ids: Vec<String> = aged
            .iter()
            .map(|a| a.identity.reference_id.clone())
            .collect();
        let current: HashMap<String, Submission> = self
            .feed
            .get_by_ids(&reference_ids)
            .await?
            .into_iter()
            .map(|item| (item.name.clone(), item))
            .collect();

        let mut records = Vec::with_capacity(aged.len());
        let mut missing = Vec::new();
        for entry in &aged {
            let Some(item) = current.get(&entry.identity.reference_id) else {
                missing.push(entry.identity.reference_id.clone());
                continue;
            };
            let mut record = self.projector.project(item)?;
            record.insert(DAYS_OLD, FieldValue::Int(i64::from(entry.n_days)));
            records.push(record);
        }

        if !missing.is_empty() {
            if !self.allow_partial_refetch {
                return Err(HarvestError::DataInconsistency(format!(
                    "{} submissions missing from lookup: {}",
                    missing.len(),
                    missing.join(", ")
                )));
            }
            warn!(count = missing.len(), ?missing, "Submissions missing from lookup; skipped");
        }

        info!(
            days_back,
            unique = identities.len(),
            aged = aged.len(),
            records = records.len(),
            "Resampled aged submissions"
        );
        Ok(records)
    }

    /// Unique identities in the source bucket's snapshots from the last
    /// `days_back` days.
    pub async fn unique_historical(
        &self,
        days_back: u32,
        now: DateTime<Utc>,
    ) -> Result<BTreeSet<IdentityKey>> {
        let since = Duration::try_days(i64::from(days_back))
            .and_then(|span| now.checked_sub_signed(span))
            .ok_or_else(|| {
                HarvestError::Config(format!("look-back of {days_back} days is out of range"))
            })?;
        let records = self
            .snapshots
            .read_records_since(&self.source_bucket, since)
            .await?;

        let (unique, skipped) = dedup_identities(&records);
        if skipped > 0 {
            warn!(
                skipped,
                bucket = %self.source_bucket,
                "Records without identity fields skipped"
            );
        }
        debug!(
            records = records.len(),
            unique = unique.len(),
            "Deduplicated historical records"
        );
        Ok(unique)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use timelapse_common::{CREATED_TIME_UTC, SUBMISSION_ID, SUBMISSION_REFERENCE_ID};

    use crate::projection::{ItemType, MappingTable};
    use crate::retry::RetryPolicy;
    use crate::storage::MemoryBlobStore;
    use crate::testing::{at, submission, with_score, MockFeed};
    use crate::traits::BlobStore;

    const T0: i64 = 1_700_000_000;
    const BUCKET: &str = "original-load";

    fn identity_record(id: &str, created: i64) -> PostRecord {
        [
            (SUBMISSION_ID, FieldValue::from(id)),
            (SUBMISSION_REFERENCE_ID, FieldValue::from(format!("t3_{id}"))),
            (CREATED_TIME_UTC, FieldValue::Int(created)),
        ]
        .into_iter()
        .collect()
    }

    fn projector() -> Projector {
        let table = MappingTable::new(
            ItemType::Submission,
            [
                (SUBMISSION_ID, "id"),
                (SUBMISSION_REFERENCE_ID, "fullname"),
                (CREATED_TIME_UTC, "created_utc"),
                ("score", "score"),
            ],
        )
        .unwrap();
        Projector::new(table, true)
    }

    async fn resampler(feed: MockFeed, snapshots: &[(i64, Vec<PostRecord>)]) -> Resampler {
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = SnapshotStore::new(blobs.clone()).with_retry(RetryPolicy::none());
        for (taken_at, records) in snapshots {
            let key = store.write(BUCKET, at(*taken_at), records).await.unwrap();
            let bytes = blobs.get(BUCKET, &key).await.unwrap();
            blobs.put_at(BUCKET, &key, bytes, at(*taken_at));
        }
        Resampler::new(Arc::new(feed), store, projector(), BUCKET)
    }

    #[test]
    fn age_bucket_boundaries() {
        let now = at(T0);
        let bucket = |age_secs: i64| age_bucket(hours_since(at(T0 - age_secs), now));

        assert_eq!(bucket(24 * 3600 + 3 * 60), Some(1));
        assert_eq!(bucket(47 * 3600), None);
        assert_eq!(bucket(48 * 3600 + 30 * 60), Some(2));
        assert_eq!(bucket(23 * 3600 + 59 * 60), None);
        assert_eq!(bucket(24 * 3600), Some(1));
        assert_eq!(bucket(25 * 3600), None);
        assert_eq!(bucket(30 * 60), None);
    }

    #[test]
    fn dedup_is_idempotent_and_skips_identity_less_records() {
        let mut records = vec![
            identity_record("a", T0),
            identity_record("b", T0 - 10),
            identity_record("a", T0),
        ];
        records.push([("score", FieldValue::Int(3))].into_iter().collect());

        let (once, skipped) = dedup_identities(&records);
        assert_eq!(once.len(), 2);
        assert_eq!(skipped, 1);

        let doubled: Vec<PostRecord> = records.iter().chain(records.iter()).cloned().collect();
        let (twice, _) = dedup_identities(&doubled);
        assert_eq!(once, twice);
    }

    #[tokio::test]
    async fn tags_aged_posts_with_their_current_state() {
        let now = T0 + 24 * 3600 + 3 * 60;
        let feed = MockFeed::new()
            .with_current_state(with_score(submission("a", T0), 250))
            .with_current_state(submission("young", now - 3600));
        let resampler = resampler(
            feed,
            &[
                (T0, vec![identity_record("a", T0)]),
                (T0 + 3600, vec![identity_record("a", T0), identity_record("young", now - 3600)]),
            ],
        )
        .await;

        let records = resampler.resample_at(7, at(now)).await.unwrap();

        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get(SUBMISSION_REFERENCE_ID), Some(&FieldValue::from("t3_a")));
        assert_eq!(record.get("score"), Some(&FieldValue::Int(250)));
        assert_eq!(record.get(DAYS_OLD), Some(&FieldValue::Int(1)));
        assert_eq!(record.keys().last(), Some(DAYS_OLD));
    }

    #[tokio::test]
    async fn refetch_is_keyed_by_reference_id_not_position() {
        let now = T0 + 48 * 3600 + 10 * 60;
        let feed = MockFeed::new()
            .with_current_state(with_score(submission("a", T0), 10))
            .with_current_state(with_score(submission("b", T0 + 60), 20))
            .with_current_state(with_score(submission("c", T0 - 24 * 3600), 30))
            .reverse_batch_order();
        let resampler = resampler(
            feed,
            &[(
                T0 + 60,
                vec![
                    identity_record("a", T0),
                    identity_record("b", T0 + 60),
                    identity_record("c", T0 - 24 * 3600),
                ],
            )],
        )
        .await;

        let records = resampler.resample_at(7, at(now)).await.unwrap();
        assert_eq!(records.len(), 3);
        for record in &records {
            let expected = match record.get(SUBMISSION_ID).and_then(FieldValue::as_str) {
                Some("a") => (10, 2),
                Some("b") => (20, 2),
                Some("c") => (30, 3),
                other => panic!("unexpected record {other:?}"),
            };
            assert_eq!(record.get("score"), Some(&FieldValue::Int(expected.0)));
            assert_eq!(record.get(DAYS_OLD), Some(&FieldValue::Int(expected.1)));
        }
    }

    #[tokio::test]
    async fn one_batched_lookup_per_run() {
        let now = T0 + 24 * 3600;
        let feed = MockFeed::new()
            .with_current_state(submission("a", T0))
            .with_current_state(submission("b", T0));
        let feed = Arc::new(feed);
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = SnapshotStore::new(blobs).with_retry(RetryPolicy::none());
        store
            .write(BUCKET, at(T0), &[identity_record("a", T0), identity_record("b", T0)])
            .await
            .unwrap();
        let resampler = Resampler::new(feed.clone(), store, projector(), BUCKET);

        resampler.resample_at(7, at(now)).await.unwrap();
        assert_eq!(
            feed.batch_requests(),
            vec![vec!["t3_a".to_string(), "t3_b".to_string()]]
        );
    }

    #[tokio::test]
    async fn missing_posts_are_skipped_or_fatal_by_policy() {
        let now = T0 + 24 * 3600 + 60;
        let feed = || {
            MockFeed::new()
                .with_current_state(submission("a", T0))
                .with_current_state(submission("gone", T0))
                .omit_from_lookup("t3_gone")
        };
        let snapshots = [(T0, vec![identity_record("a", T0), identity_record("gone", T0)])];

        let lenient = resampler(feed(), &snapshots).await;
        assert_eq!(lenient.resample_at(7, at(now)).await.unwrap().len(), 1);

        let strict = resampler(feed(), &snapshots)
            .await
            .allow_partial_refetch(false);
        let err = strict.resample_at(7, at(now)).await.unwrap_err();
        assert!(matches!(err, HarvestError::DataInconsistency(_)));
    }

    #[tokio::test]
    async fn only_snapshots_inside_days_back_are_read() {
        let now = T0 + 10 * 24 * 3600 + 60;
        // Snapshot written 9 days before `now` mentions an 8-day-old post;
        // with days_back = 7 it is never read.
        let old_post = now - 8 * 24 * 3600;
        let recent_post = now - 3 * 24 * 3600;
        let feed = MockFeed::new()
            .with_current_state(submission("old", old_post))
            .with_current_state(submission("recent", recent_post));
        let resampler = resampler(
            feed,
            &[
                (now - 9 * 24 * 3600, vec![identity_record("old", old_post)]),
                (now - 2 * 24 * 3600, vec![identity_record("recent", recent_post)]),
            ],
        )
        .await;

        let records = resampler.resample_at(7, at(now)).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get(SUBMISSION_ID), Some(&FieldValue::from("recent")));
        assert_eq!(records[0].get(DAYS_OLD), Some(&FieldValue::Int(3)));
    }

    #[tokio::test]
    async fn no_aged_posts_skips_the_lookup() {
        let now = T0 + 3600;
        let feed = Arc::new(MockFeed::new().with_current_state(submission("a", T0)));
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = SnapshotStore::new(blobs).with_retry(RetryPolicy::none());
        store.write(BUCKET, at(T0), &[identity_record("a", T0)]).await.unwrap();
        let resampler = Resampler::new(feed.clone(), store, projector(), BUCKET);

        assert!(resampler.resample_at(7, at(now)).await.unwrap().is_empty());
        assert!(feed.batch_requests().is_empty());
    }

    #[test]
    fn out_of_range_creation_times_are_never_due() {
        let identities: BTreeSet<IdentityKey> = [
            identity_record("a", T0 - 24 * 3600),
            identity_record("far", i64::MAX),
        ]
        .iter()
        .filter_map(PostRecord::identity)
        .collect();

        let aged = select_aged(&identities, at(T0));
        assert_eq!(aged.len(), 1);
        assert_eq!(aged[0].identity.submission_id, "a");
        assert_eq!(aged[0].n_days, 1);
        assert!((aged[0].hours_since_created - 24.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn oversized_days_back_is_a_config_error() {
        let feed = Arc::new(MockFeed::new().with_current_state(submission("a", T0)));
        let blobs = Arc::new(MemoryBlobStore::new());
        let store = SnapshotStore::new(blobs).with_retry(RetryPolicy::none());
        let resampler = Resampler::new(feed.clone(), store, projector(), BUCKET);

        let err = resampler.resample_at(u32::MAX, at(T0)).await.unwrap_err();
        assert!(matches!(err, HarvestError::Config(_)));
        assert!(feed.batch_requests().is_empty());
    }
}
