use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Platforms ---

/// External platform a candidate was observed on. The catalog keys external
/// ids per platform, so two platforms may legitimately carry the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Reddit,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Reddit => "reddit",
        }
    }

    pub fn parse(s: &str) -> Option<Platform> {
        match s {
            "reddit" => Some(Platform::Reddit),
            _ => None,
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// --- Candidates ---

/// A raw post observed from an external source, not yet accepted into the
/// catalog. Produced once per fetch and consumed by the ingestion pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CandidateItem {
    pub external_id: String,
    pub platform: Platform,
    /// Subreddit-equivalent source name, without any `r/` prefix.
    pub source: String,
    pub title: String,
    pub body: String,
    pub flair: Option<String>,
    pub author: Option<String>,
    /// Popularity metric at fetch time (upvote score).
    pub score: i64,
    pub media_url: String,
    pub duration_secs: Option<f64>,
    pub nsfw: bool,
    pub posted_at: DateTime<Utc>,
}

impl CandidateItem {
    /// Combined text the relevance filter runs over.
    pub fn searchable_text(&self) -> String {
        let mut text = format!("{} {}", self.title, self.body);
        if let Some(flair) = &self.flair {
            text.push(' ');
            text.push_str(flair);
        }
        text
    }
}

// --- URL helpers ---

/// Strip tracking parameters and fragments from a media URL so equality
/// checks are stable across shares of the same clip.
pub fn sanitize_media_url(url: &str) -> String {
    const TRACKING_PARAMS: &[&str] = &[
        "utm_source", "utm_medium", "utm_campaign", "utm_term", "utm_content",
        "fbclid", "gclid", "ref", "share_id", "si",
    ];

    let Ok(mut parsed) = url::Url::parse(url) else {
        return url.trim_end_matches('/').to_string();
    };

    parsed.set_fragment(None);
    if parsed.query().is_some() {
        let clean_pairs: Vec<(String, String)> = parsed
            .query_pairs()
            .filter(|(key, _)| !TRACKING_PARAMS.contains(&key.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();

        if clean_pairs.is_empty() {
            parsed.set_query(None);
        } else {
            parsed.query_pairs_mut().clear().extend_pairs(clean_pairs);
        }
    }

    parsed.to_string().trim_end_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_strips_tracking_params() {
        assert_eq!(
            sanitize_media_url("https://v.redd.it/abc123?utm_source=share&utm_medium=web"),
            "https://v.redd.it/abc123"
        );
    }

    #[test]
    fn sanitize_keeps_meaningful_params() {
        assert_eq!(
            sanitize_media_url("https://www.youtube.com/watch?v=xyz&utm_source=share"),
            "https://www.youtube.com/watch?v=xyz"
        );
    }

    #[test]
    fn sanitize_trims_trailing_slash() {
        assert_eq!(
            sanitize_media_url("https://v.redd.it/abc123/"),
            "https://v.redd.it/abc123"
        );
    }

    #[test]
    fn searchable_text_includes_flair() {
        let c = CandidateItem {
            external_id: "x1".into(),
            platform: Platform::Reddit,
            source: "aivideo".into(),
            title: "Sunset".into(),
            body: "over the bay".into(),
            flair: Some("Sora".into()),
            author: None,
            score: 1,
            media_url: "https://v.redd.it/x1".into(),
            duration_secs: None,
            nsfw: false,
            posted_at: Utc::now(),
        };
        assert_eq!(c.searchable_text(), "Sunset over the bay Sora");
    }
}
