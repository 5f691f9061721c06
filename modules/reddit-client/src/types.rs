use serde::Deserialize;

/// Top-level envelope for every listing endpoint: `{"kind": "Listing", "data": {...}}`.
#[derive(Debug, Deserialize)]
pub struct ListingEnvelope {
    pub data: ListingData,
}

#[derive(Debug, Deserialize)]
pub struct ListingData {
    #[serde(default)]
    pub children: Vec<Thing>,
    pub after: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Thing {
    pub kind: String,
    pub data: RawPost,
}

/// A post as Reddit serves it. Only the fields the pipeline consumes are
/// mapped; everything else is dropped at parse time.
#[derive(Debug, Clone, Deserialize)]
pub struct RawPost {
    pub id: String,
    pub subreddit: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub author: Option<String>,
    #[serde(default)]
    pub score: i64,
    /// Destination URL for link posts; for video posts this is the media page.
    pub url_overridden_by_dest: Option<String>,
    pub url: Option<String>,
    pub created_utc: f64,
    pub link_flair_text: Option<String>,
    #[serde(default)]
    pub over_18: bool,
    #[serde(default)]
    pub is_video: bool,
    pub media: Option<Media>,
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Media {
    pub reddit_video: Option<RedditVideo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditVideo {
    pub fallback_url: Option<String>,
    /// Duration in seconds.
    pub duration: Option<f64>,
}

impl RawPost {
    /// Best media URL for this post: the hosted video if present, otherwise
    /// the destination link.
    pub fn media_url(&self) -> Option<&str> {
        if let Some(v) = self.media.as_ref().and_then(|m| m.reddit_video.as_ref()) {
            if let Some(fb) = v.fallback_url.as_deref() {
                return Some(fb);
            }
        }
        self.url_overridden_by_dest
            .as_deref()
            .or(self.url.as_deref())
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.media
            .as_ref()
            .and_then(|m| m.reddit_video.as_ref())
            .and_then(|v| v.duration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING_JSON: &str = r#"{
        "kind": "Listing",
        "data": {
            "after": "t3_next",
            "children": [{
                "kind": "t3",
                "data": {
                    "id": "abc123",
                    "subreddit": "aivideo",
                    "title": "AI generated city flyover",
                    "selftext": "made with sora",
                    "author": "clipmaker",
                    "score": 42,
                    "url_overridden_by_dest": "https://v.redd.it/xyz",
                    "created_utc": 1754300000.0,
                    "link_flair_text": "Sora",
                    "over_18": false,
                    "is_video": true,
                    "media": {
                        "reddit_video": {
                            "fallback_url": "https://v.redd.it/xyz/DASH_720.mp4",
                            "duration": 12.5
                        }
                    },
                    "thumbnail": "https://b.thumbs.redditmedia.com/abc.jpg"
                }
            }]
        }
    }"#;

    #[test]
    fn parses_listing_envelope() {
        let envelope: ListingEnvelope = serde_json::from_str(LISTING_JSON).unwrap();
        assert_eq!(envelope.data.after.as_deref(), Some("t3_next"));
        let post = &envelope.data.children[0].data;
        assert_eq!(post.id, "abc123");
        assert_eq!(post.score, 42);
        assert_eq!(post.duration_secs(), Some(12.5));
    }

    #[test]
    fn media_url_prefers_hosted_video() {
        let envelope: ListingEnvelope = serde_json::from_str(LISTING_JSON).unwrap();
        let post = &envelope.data.children[0].data;
        assert_eq!(post.media_url(), Some("https://v.redd.it/xyz/DASH_720.mp4"));
    }

    #[test]
    fn tolerates_missing_optional_fields() {
        let json = r#"{"id": "x", "subreddit": "videos", "created_utc": 0.0}"#;
        let post: RawPost = serde_json::from_str(json).unwrap();
        assert!(post.media_url().is_none());
        assert!(!post.over_18);
    }
}
