pub mod error;
pub mod types;

pub use error::{RedditError, Result};
pub use types::{Comment, Listing, Redditor, Submission, Thing, SUBMISSION_KIND};

use std::time::Duration;

use serde::de::DeserializeOwned;

/// Public JSON endpoints; works without credentials at a lower rate limit.
pub const PUBLIC_BASE_URL: &str = "https://www.reddit.com";

/// OAuth endpoints; requires a bearer token.
pub const OAUTH_BASE_URL: &str = "https://oauth.reddit.com";

/// Reddit refuses listing pages larger than this.
pub const MAX_PAGE_SIZE: u32 = 100;

/// `/api/info` accepts at most this many fullnames per request.
pub const MAX_INFO_IDS: usize = 100;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RedditClient {
    client: reqwest::Client,
    base_url: String,
    access_token: Option<String>,
}

impl RedditClient {
    /// Anonymous client against the public JSON endpoints.
    pub fn new(user_agent: &str) -> Result<Self> {
        Self::with_base_url(PUBLIC_BASE_URL, user_agent, None)
    }

    /// Client authenticated with an already-issued OAuth bearer token.
    pub fn with_token(user_agent: &str, access_token: String) -> Result<Self> {
        Self::with_base_url(OAUTH_BASE_URL, user_agent, Some(access_token))
    }

    pub fn with_base_url(
        base_url: &str,
        user_agent: &str,
        access_token: Option<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let mut req = self.client.get(url).query(query);
        if let Some(token) = &self.access_token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RedditError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// One page of a subreddit's `new` listing, newest first.
    /// `after` is the fullname of the last item already seen.
    pub async fn list_new(
        &self,
        subreddit: &str,
        limit: u32,
        after: Option<&str>,
    ) -> Result<Vec<Submission>> {
        let limit = limit.min(MAX_PAGE_SIZE);
        let url = format!("{}/r/{}/new.json", self.base_url, subreddit);
        let mut query = vec![("limit", limit.to_string()), ("raw_json", "1".to_string())];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let listing: Listing<Submission> = self.get_json(&url, &query).await?;
        let items = listing.into_items(SUBMISSION_KIND);
        tracing::debug!(subreddit, limit, ?after, count = items.len(), "Fetched listing page");
        Ok(items)
    }

    /// Batched lookup by fullname. Requests are chunked at [`MAX_INFO_IDS`];
    /// results are concatenated in chunk order.
    pub async fn info(&self, fullnames: &[String]) -> Result<Vec<Submission>> {
        let url = format!("{}/api/info.json", self.base_url);
        let mut items = Vec::with_capacity(fullnames.len());

        for chunk in fullnames.chunks(MAX_INFO_IDS) {
            let query = [("id", chunk.join(",")), ("raw_json", "1".to_string())];
            let listing: Listing<Submission> = self.get_json(&url, &query).await?;
            items.extend(listing.into_items(SUBMISSION_KIND));
        }

        tracing::info!(
            requested = fullnames.len(),
            returned = items.len(),
            "Fetched submissions by id"
        );
        Ok(items)
    }

    /// Lookup of a single submission by fullname.
    pub async fn submission(&self, fullname: &str) -> Result<Submission> {
        self.info(&[fullname.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RedditError::NotFound(fullname.to_string()))
    }
}
