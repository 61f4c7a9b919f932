use chrono::{DateTime, Utc};
use reddit_client::Submission;
use timelapse_common::Result;
use tracing::{debug, info};

use crate::traits::FeedSource;

/// Listing page size; the platform maximum.
pub const PAGE_SIZE: u32 = reddit_client::MAX_PAGE_SIZE;

/// All items of `feed_id` created at or after `cutoff`, newest first.
pub async fn fetch_new_since(
    source: &dyn FeedSource,
    feed_id: &str,
    cutoff: DateTime<Utc>,
) -> Result<Vec<Submission>> {
    fetch_new_since_paged(source, feed_id, cutoff, PAGE_SIZE).await
}

/// Pages through the feed until a page yields fewer qualifying items than
/// `page_size`. A page whose items all qualify may be followed by more
/// qualifying items, so the next page is requested after the last kept one.
pub async fn fetch_new_since_paged(
    source: &dyn FeedSource,
    feed_id: &str,
    cutoff: DateTime<Utc>,
    page_size: u32,
) -> Result<Vec<Submission>> {
    let cutoff_secs = cutoff.timestamp_micros() as f64 / 1_000_000.0;
    let mut collected: Vec<Submission> = Vec::new();
    let mut after: Option<String> = None;
    let mut pages = 0u32;

    loop {
        let page = source
            .list_new(feed_id, page_size, after.as_deref())
            .await?;
        pages += 1;

        let fetched = page.len();
        let before = collected.len();
        collected.extend(page.into_iter().filter(|s| s.created_utc >= cutoff_secs));
        let kept = collected.len() - before;

        debug!(feed_id, page = pages, fetched, kept, "Fetched feed page");

        if kept == 0 || kept < page_size as usize {
            break;
        }
        after = collected.last().map(|s| s.name.clone());
    }

    info!(
        feed_id,
        cutoff = %cutoff,
        pages,
        count = collected.len(),
        "Fetched new submissions"
    );
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{at, submission, MockFeed};

    const NOW: i64 = 1_700_000_000;

    /// `count` items, one minute apart, newest created one minute before NOW.
    fn minute_spaced(count: usize) -> Vec<Submission> {
        (0..count)
            .map(|i| submission(&format!("s{i}"), NOW - 60 * (i as i64 + 1)))
            .collect()
    }

    #[tokio::test]
    async fn stops_on_partial_page() {
        let feed = MockFeed::new().with_submissions("stocks", minute_spaced(30));
        let items = fetch_new_since(&feed, "stocks", at(NOW - 3600)).await.unwrap();

        assert_eq!(items.len(), 30);
        assert_eq!(feed.page_requests(), 1);
    }

    #[tokio::test]
    async fn filters_items_older_than_cutoff() {
        // 30 items within the hour, 20 older.
        let mut items = minute_spaced(30);
        items.extend((0..20).map(|i| submission(&format!("old{i}"), NOW - 7200 - i)));
        let feed = MockFeed::new().with_submissions("stocks", items);

        let fetched = fetch_new_since(&feed, "stocks", at(NOW - 1800)).await.unwrap();

        assert_eq!(fetched.len(), 30);
        assert!(fetched.iter().all(|s| s.created_utc >= (NOW - 1800) as f64));
        assert_eq!(feed.page_requests(), 1);
    }

    #[tokio::test]
    async fn cutoff_is_inclusive() {
        let feed = MockFeed::new().with_submissions(
            "stocks",
            vec![submission("edge", NOW - 3600), submission("older", NOW - 3601)],
        );
        let items = fetch_new_since(&feed, "stocks", at(NOW - 3600)).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "edge");
    }

    #[tokio::test]
    async fn paginates_full_pages_until_exhausted() {
        // 250 qualifying items at page size 100: 100 + 100 + 50.
        let feed = MockFeed::new().with_submissions("stocks", minute_spaced(250));
        let items = fetch_new_since(&feed, "stocks", at(NOW - 86_400)).await.unwrap();

        assert_eq!(items.len(), 250);
        assert_eq!(feed.page_requests(), 3);
        assert!(items.windows(2).all(|w| w[0].created_utc > w[1].created_utc));
    }

    #[tokio::test]
    async fn exact_multiple_needs_one_extra_request() {
        let feed = MockFeed::new().with_submissions("stocks", minute_spaced(200));
        let items = fetch_new_since(&feed, "stocks", at(NOW - 86_400)).await.unwrap();

        assert_eq!(items.len(), 200);
        assert_eq!(feed.page_requests(), 3);
    }

    #[tokio::test]
    async fn stops_when_page_is_full_but_not_all_qualify() {
        // 150 items; the first page holds 100 but only 40 are recent enough.
        let feed = MockFeed::new().with_submissions("stocks", minute_spaced(150));
        let items = fetch_new_since(&feed, "stocks", at(NOW - 40 * 60)).await.unwrap();

        assert_eq!(items.len(), 40);
        assert_eq!(feed.page_requests(), 1);
    }

    #[tokio::test]
    async fn small_pages_terminate_within_bound() {
        let feed = MockFeed::new().with_submissions("stocks", minute_spaced(23));
        let items = fetch_new_since_paged(&feed, "stocks", at(NOW - 86_400), 5)
            .await
            .unwrap();

        assert_eq!(items.len(), 23);
        // ceil(23 / 5) = 5 pages, the last one partial.
        assert_eq!(feed.page_requests(), 5);
    }

    #[tokio::test]
    async fn empty_feed_makes_one_request() {
        let feed = MockFeed::new();
        let items = fetch_new_since(&feed, "stocks", at(NOW)).await.unwrap();

        assert!(items.is_empty());
        assert_eq!(feed.page_requests(), 1);
    }

    #[tokio::test]
    async fn source_errors_propagate() {
        let feed = MockFeed::new()
            .with_submissions("stocks", minute_spaced(3))
            .fail_next(1);
        let err = fetch_new_since(&feed, "stocks", at(NOW - 3600)).await.unwrap_err();

        assert!(err.is_retryable());
    }
}
