pub mod error;
pub mod types;

pub use error::{RedditError, Result};
pub use types::{ListingEnvelope, RawPost};

use std::time::Duration;

const BASE_URL: &str = "https://www.reddit.com";

/// Per-request timeout. Retry policy lives with the caller, not here.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

/// Listing strategies a subreddit can be read with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListingSort {
    New,
    Hot,
    Top,
}

impl ListingSort {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingSort::New => "new",
            ListingSort::Hot => "hot",
            ListingSort::Top => "top",
        }
    }

    pub const ALL: [ListingSort; 3] = [ListingSort::New, ListingSort::Hot, ListingSort::Top];
}

impl std::fmt::Display for ListingSort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct RedditClient {
    client: reqwest::Client,
    base_url: String,
    user_agent: String,
}

impl RedditClient {
    pub fn new(user_agent: String) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(REQUEST_TIMEOUT)
                .build()
                .unwrap_or_default(),
            base_url: BASE_URL.to_string(),
            user_agent,
        }
    }

    /// Override the API host. Used by tests against a local stub server.
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    /// Fetch one page of a subreddit listing.
    pub async fn listing(
        &self,
        subreddit: &str,
        sort: ListingSort,
        limit: u32,
    ) -> Result<Vec<RawPost>> {
        let url = format!("{}/r/{}/{}.json", self.base_url, subreddit, sort.as_str());
        let mut params = vec![("limit", limit.to_string()), ("raw_json", "1".to_string())];
        if sort == ListingSort::Top {
            params.push(("t", "week".to_string()));
        }
        self.get_listing(&url, &params).await
    }

    /// Search within a subreddit, newest first.
    pub async fn search(&self, subreddit: &str, query: &str, limit: u32) -> Result<Vec<RawPost>> {
        let url = format!("{}/r/{}/search.json", self.base_url, subreddit);
        let params = vec![
            ("q", query.to_string()),
            ("restrict_sr", "1".to_string()),
            ("sort", "new".to_string()),
            ("limit", limit.to_string()),
            ("raw_json", "1".to_string()),
        ];
        self.get_listing(&url, &params).await
    }

    async fn get_listing(&self, url: &str, params: &[(&str, String)]) -> Result<Vec<RawPost>> {
        tracing::debug!(url, "reddit: fetching listing");

        let resp = self
            .client
            .get(url)
            .query(params)
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(RedditError::Api {
                status: status.as_u16(),
                message: truncate(&body, 200),
            });
        }

        let envelope: ListingEnvelope = resp.json().await.map_err(|e| {
            if e.is_decode() {
                RedditError::Parse(e.to_string())
            } else {
                RedditError::Network(e.to_string())
            }
        })?;

        let posts: Vec<RawPost> = envelope
            .data
            .children
            .into_iter()
            .filter(|t| t.kind == "t3")
            .map(|t| t.data)
            .collect();

        tracing::debug!(url, count = posts.len(), "reddit: listing fetched");
        Ok(posts)
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.len() <= max {
        return s.to_string();
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn top_listing_sort_segment() {
        assert_eq!(ListingSort::Top.as_str(), "top");
        assert_eq!(ListingSort::ALL.len(), 3);
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        let s = "héllo wörld";
        let t = truncate(s, 3);
        assert!(t.len() <= 3);
        assert!(s.starts_with(&t));
    }
}
