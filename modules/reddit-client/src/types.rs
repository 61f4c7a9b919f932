use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;

// --- Listing envelope ---

/// Wrapper for Reddit listing responses (`{"kind": "Listing", "data": {...}}`).
#[derive(Debug, Clone, Deserialize)]
pub struct Listing<T> {
    pub data: ListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ListingData<T> {
    /// Fullname of the last item on the page, used as the next `after` cursor.
    pub after: Option<String>,
    #[serde(default = "Vec::new")]
    pub children: Vec<Thing<T>>,
}

/// A single typed child of a listing (`t1` comment, `t2` account, `t3` link).
#[derive(Debug, Clone, Deserialize)]
pub struct Thing<T> {
    pub kind: String,
    pub data: T,
}

impl<T> Listing<T> {
    /// Children of the given kind; `/api/info` mixes kinds when handed
    /// fullnames of different types.
    pub fn into_items(self, kind: &str) -> Vec<T> {
        self.data
            .children
            .into_iter()
            .filter(|t| t.kind == kind)
            .map(|t| t.data)
            .collect()
    }
}

/// Fullname prefix for submissions ("links" in Reddit's API vocabulary).
pub const SUBMISSION_KIND: &str = "t3";
pub const ACCOUNT_KIND: &str = "t2";

fn epoch_to_datetime(secs: f64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs.trunc() as i64, 0).single()
}

// --- Submission ---

/// A subreddit post as returned by `/r/{sub}/new` and `/api/info`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Submission {
    pub id: String,
    /// Fullname (`t3_<id>`); stable across time and accepted by `/api/info`.
    pub name: String,
    pub created_utc: f64,
    pub title: Option<String>,
    pub selftext: Option<String>,
    pub author: Option<String>,
    pub author_fullname: Option<String>,
    pub subreddit: Option<String>,
    pub subreddit_id: Option<String>,
    pub subreddit_subscribers: Option<i64>,
    pub score: Option<i64>,
    pub ups: Option<i64>,
    pub downs: Option<i64>,
    pub upvote_ratio: Option<f64>,
    pub num_comments: Option<i64>,
    pub num_crossposts: Option<i64>,
    pub total_awards_received: Option<i64>,
    pub permalink: Option<String>,
    pub url: Option<String>,
    pub domain: Option<String>,
    pub link_flair_text: Option<String>,
    pub is_self: Option<bool>,
    pub is_video: Option<bool>,
    pub over_18: Option<bool>,
    pub spoiler: Option<bool>,
    pub stickied: Option<bool>,
    pub locked: Option<bool>,
    pub removed_by_category: Option<String>,
}

impl Submission {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        epoch_to_datetime(self.created_utc)
    }
}

// --- Comment ---

/// A comment (`t1`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Comment {
    pub id: String,
    pub name: String,
    pub created_utc: f64,
    pub body: Option<String>,
    pub author: Option<String>,
    pub author_fullname: Option<String>,
    pub subreddit: Option<String>,
    pub subreddit_id: Option<String>,
    /// Fullname of the submission this comment belongs to.
    pub link_id: Option<String>,
    /// Fullname of the parent comment or submission.
    pub parent_id: Option<String>,
    pub score: Option<i64>,
    pub controversiality: Option<i64>,
    pub permalink: Option<String>,
    pub is_submitter: Option<bool>,
    pub stickied: Option<bool>,
}

impl Comment {
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        epoch_to_datetime(self.created_utc)
    }
}

// --- Redditor ---

/// An account (`t2`) as returned by `/user/{name}/about`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Redditor {
    pub id: String,
    pub name: String,
    pub created_utc: Option<f64>,
    pub link_karma: Option<i64>,
    pub comment_karma: Option<i64>,
    pub total_karma: Option<i64>,
    pub is_mod: Option<bool>,
    pub is_gold: Option<bool>,
    pub is_employee: Option<bool>,
    pub verified: Option<bool>,
    pub has_verified_email: Option<bool>,
}

impl Redditor {
    pub fn fullname(&self) -> String {
        format!("{ACCOUNT_KIND}_{}", self.id)
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_utc.and_then(epoch_to_datetime)
    }
}
