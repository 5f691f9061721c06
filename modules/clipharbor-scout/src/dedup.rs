//! Duplicate resolution.
//!
//! A candidate is scored against a bounded pool of recent catalog entries
//! (same-source recent, cross-source same-author, exact media URL — unioned
//! by id). The score is additive over weighted evidence; an exact media URL
//! short-circuits to a certain match. Crossing the threshold turns the
//! candidate into a Replace (when it is more popular than the match) or a
//! Skip; otherwise it inserts.
//!
//! The weights and thresholds are empirically tuned values carried over
//! verbatim; treat them as tunable configuration, not structure.

use std::collections::HashSet;

use clipharbor_catalog::CatalogEntry;
use clipharbor_common::CandidateItem;
use uuid::Uuid;

/// What the orchestrator should do with a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// New content: create a catalog entry.
    Insert,
    /// Duplicate of the given entry, and more popular: overwrite it in place.
    Replace(Uuid),
    /// Duplicate of something at least as popular: drop the candidate.
    Skip,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchReason {
    ExactMediaUrl,
    SameAuthorCrossSource,
    TitleSimilarityCombo,
}

/// Best match found for a candidate within the comparison pool.
#[derive(Debug, Clone)]
pub struct DuplicateMatch {
    pub candidate_external_id: String,
    pub entry_id: Uuid,
    pub score: f64,
    pub reason: MatchReason,
}

#[derive(Debug, Clone, Copy)]
pub struct DedupConfig {
    /// Trailing window entries must fall in to be compared at all.
    pub window_hours: i64,
    /// Exact media URL match fixes the score here; decides regardless of threshold.
    pub exact_url_score: f64,
    pub title_sim_threshold: f64,
    pub title_match_weight: f64,
    pub duration_tolerance_secs: f64,
    pub duration_match_weight: f64,
    pub cross_source_author_weight: f64,
    pub same_source_author_weight: f64,
    pub media_id_weight: f64,
    /// Decision threshold for ordinary matches.
    pub decision_threshold: f64,
    /// Lower threshold when the match is the same author on another source.
    pub author_decision_threshold: f64,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            window_hours: 48,
            exact_url_score: 1.0,
            title_sim_threshold: 0.7,
            title_match_weight: 0.4,
            duration_tolerance_secs: 5.0,
            duration_match_weight: 0.3,
            cross_source_author_weight: 0.4,
            same_source_author_weight: 0.2,
            media_id_weight: 0.5,
            decision_threshold: 0.7,
            author_decision_threshold: 0.6,
        }
    }
}

/// Union comparison pools, deduplicating by entry id and preserving order.
pub fn union_pools(pools: Vec<Vec<CatalogEntry>>) -> Vec<CatalogEntry> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    pools
        .into_iter()
        .flatten()
        .filter(|e| seen.insert(e.id))
        .collect()
}

/// Resolve a candidate against its comparison pool.
pub fn resolve(candidate: &CandidateItem, pool: &[CatalogEntry], cfg: &DedupConfig) -> Decision {
    let Some((matched, score, reason)) = best_scored(candidate, pool, cfg) else {
        return Decision::Insert;
    };

    let threshold = if reason == MatchReason::SameAuthorCrossSource {
        cfg.author_decision_threshold
    } else {
        cfg.decision_threshold
    };

    if score < threshold && score < cfg.exact_url_score {
        return Decision::Insert;
    }

    if candidate.score > matched.likes {
        Decision::Replace(matched.id)
    } else {
        Decision::Skip
    }
}

/// Highest-scoring pool entry for a candidate, if any evidence matched.
pub fn best_match(
    candidate: &CandidateItem,
    pool: &[CatalogEntry],
    cfg: &DedupConfig,
) -> Option<DuplicateMatch> {
    best_scored(candidate, pool, cfg).map(|(entry, score, reason)| DuplicateMatch {
        candidate_external_id: candidate.external_id.clone(),
        entry_id: entry.id,
        score,
        reason,
    })
}

fn best_scored<'a>(
    candidate: &CandidateItem,
    pool: &'a [CatalogEntry],
    cfg: &DedupConfig,
) -> Option<(&'a CatalogEntry, f64, MatchReason)> {
    pool.iter()
        .filter_map(|e| score_entry(candidate, e, cfg).map(|(score, reason)| (e, score, reason)))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}

fn score_entry(c: &CandidateItem, e: &CatalogEntry, cfg: &DedupConfig) -> Option<(f64, MatchReason)> {
    // Exact media URL: certain duplicate, no further scoring.
    if c.media_url == e.media_url {
        return Some((cfg.exact_url_score, MatchReason::ExactMediaUrl));
    }

    let same_source = c.platform.as_str() == e.platform && c.source == e.source;
    let same_author = match (c.author.as_deref(), e.author()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    };
    let cross_source_author = same_author && !same_source;

    let mut score = 0.0;

    if title_similarity(&c.title, &e.title) >= cfg.title_sim_threshold {
        score += cfg.title_match_weight;
    }

    if let (Some(a), Some(b)) = (c.duration_secs, e.duration_secs) {
        if (a - b).abs() <= cfg.duration_tolerance_secs {
            score += cfg.duration_match_weight;
        }
    }

    if same_author {
        score += if cross_source_author {
            cfg.cross_source_author_weight
        } else {
            cfg.same_source_author_weight
        };
    }

    if same_source {
        if let (Some(a), Some(b)) = (media_id(&c.media_url), media_id(&e.media_url)) {
            if a == b {
                score += cfg.media_id_weight;
            }
        }
    }

    if score <= 0.0 {
        return None;
    }

    let reason = if cross_source_author {
        MatchReason::SameAuthorCrossSource
    } else {
        MatchReason::TitleSimilarityCombo
    };
    Some((score, reason))
}

/// Meaningful-word overlap ratio between two titles, in [0, 1].
/// Words of four or more characters, case- and punctuation-insensitive.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let wa = meaningful_words(a);
    let wb = meaningful_words(b);
    if wa.is_empty() || wb.is_empty() {
        return 0.0;
    }
    let intersection = wa.intersection(&wb).count();
    let union = wa.union(&wb).count();
    intersection as f64 / union as f64
}

fn meaningful_words(s: &str) -> HashSet<String> {
    s.to_lowercase()
        .split(|ch: char| !ch.is_alphanumeric())
        .filter(|w| w.len() > 3)
        .map(str::to_string)
        .collect()
}

/// Platform-specific media identifier embedded in a URL, when the host is
/// one we know how to read. Lets two uploads of the same hosted video match
/// even when the full URLs differ (e.g. different DASH renditions).
pub fn media_id(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.");
    let mut segments = parsed.path_segments()?.filter(|s| !s.is_empty());

    match host {
        "v.redd.it" | "streamable.com" | "gfycat.com" | "youtu.be" => {
            segments.next().map(str::to_string)
        }
        "youtube.com" => parsed
            .query_pairs()
            .find(|(k, _)| k == "v")
            .map(|(_, v)| v.into_owned()),
        "imgur.com" | "i.imgur.com" => segments
            .next()
            .map(|s| s.split('.').next().unwrap_or(s).to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use clipharbor_common::Platform;

    fn candidate(
        external_id: &str,
        source: &str,
        title: &str,
        author: Option<&str>,
        score: i64,
        media_url: &str,
        duration: Option<f64>,
    ) -> CandidateItem {
        CandidateItem {
            external_id: external_id.into(),
            platform: Platform::Reddit,
            source: source.into(),
            title: title.into(),
            body: String::new(),
            flair: None,
            author: author.map(Into::into),
            score,
            media_url: media_url.into(),
            duration_secs: duration,
            nsfw: false,
            posted_at: Utc::now(),
        }
    }

    fn entry(
        source: &str,
        title: &str,
        author: Option<&str>,
        likes: i64,
        media_url: &str,
        duration: Option<f64>,
    ) -> CatalogEntry {
        CatalogEntry {
            id: Uuid::new_v4(),
            external_id: "existing".into(),
            platform: "reddit".into(),
            source: source.into(),
            title: title.into(),
            media_url: media_url.into(),
            thumbnail_url: String::new(),
            tags: vec![],
            views: likes,
            likes,
            nsfw: false,
            blacklisted: false,
            metadata: match author {
                Some(a) => serde_json::json!({ "author": a }),
                None => serde_json::json!({}),
            },
            duration_secs: duration,
            posted_at: Utc::now(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            media_checked_at: None,
        }
    }

    #[test]
    fn exact_media_url_never_inserts() {
        let url = "https://v.redd.it/abc123";
        let existing = entry("aivideo", "old title", None, 100, url, None);
        let id = existing.id;
        let pool = vec![existing];

        // Less popular: skip.
        let c = candidate("new", "videos", "totally different", None, 10, url, None);
        assert_eq!(resolve(&c, &pool, &DedupConfig::default()), Decision::Skip);

        // Strictly more popular: replace.
        let c = candidate("new", "videos", "totally different", None, 500, url, None);
        assert_eq!(resolve(&c, &pool, &DedupConfig::default()), Decision::Replace(id));
    }

    #[test]
    fn unrelated_candidate_inserts() {
        let pool = vec![entry(
            "aivideo",
            "AI Generated Sunset Timelapse",
            Some("clipmaker"),
            10,
            "https://v.redd.it/abc123",
            Some(12.0),
        )];
        let c = candidate(
            "new",
            "aivideo",
            "Procedural city walkthrough",
            Some("someoneelse"),
            5,
            "https://v.redd.it/zzz999",
            Some(60.0),
        );
        assert_eq!(resolve(&c, &pool, &DedupConfig::default()), Decision::Insert);
    }

    #[test]
    fn cross_source_repost_by_same_author_replaces_when_more_popular() {
        let existing = entry(
            "aivideo",
            "AI Generated Sunset Timelapse",
            Some("clipmaker"),
            10,
            "https://v.redd.it/abc123",
            None,
        );
        let id = existing.id;
        let pool = vec![existing];

        let c = candidate(
            "new",
            "videos",
            "AI-Generated Sunset Timelapse (Remastered)",
            Some("clipmaker"),
            50,
            "https://v.redd.it/def456",
            None,
        );
        // Title overlap 3/4 = 0.75 -> +0.4; cross-source author -> +0.4.
        // 0.8 meets the 0.6 author threshold; 50 > 10 favors the candidate.
        assert_eq!(resolve(&c, &pool, &DedupConfig::default()), Decision::Replace(id));
    }

    #[test]
    fn cross_source_repost_skips_when_less_popular() {
        let pool = vec![entry(
            "aivideo",
            "AI Generated Sunset Timelapse",
            Some("clipmaker"),
            90,
            "https://v.redd.it/abc123",
            None,
        )];
        let c = candidate(
            "new",
            "videos",
            "AI-Generated Sunset Timelapse (Remastered)",
            Some("clipmaker"),
            50,
            "https://v.redd.it/def456",
            None,
        );
        assert_eq!(resolve(&c, &pool, &DedupConfig::default()), Decision::Skip);
    }

    #[test]
    fn same_source_title_match_alone_stays_below_threshold() {
        // Title (+0.4) only: below the 0.7 same-source threshold.
        let pool = vec![entry(
            "aivideo",
            "Neon jellyfish drifting through space",
            None,
            10,
            "https://v.redd.it/abc123",
            None,
        )];
        let c = candidate(
            "new",
            "aivideo",
            "Neon jellyfish drifting through space",
            None,
            20,
            "https://v.redd.it/other",
            None,
        );
        assert_eq!(resolve(&c, &pool, &DedupConfig::default()), Decision::Insert);
    }

    #[test]
    fn same_hosted_video_and_duration_crosses_threshold() {
        // Shared v.redd.it id (+0.5) and duration within 5s (+0.3) -> 0.8.
        let existing = entry(
            "aivideo",
            "completely different words here",
            None,
            30,
            "https://v.redd.it/abc123/DASH_480.mp4",
            Some(14.0),
        );
        let id = existing.id;
        let pool = vec![existing];
        let c = candidate(
            "new",
            "aivideo",
            "no overlap at all",
            None,
            80,
            "https://v.redd.it/abc123/DASH_720.mp4",
            Some(12.0),
        );
        assert_eq!(resolve(&c, &pool, &DedupConfig::default()), Decision::Replace(id));
    }

    #[test]
    fn title_similarity_ignores_case_and_punctuation() {
        let sim = title_similarity(
            "AI Generated Sunset Timelapse",
            "AI-Generated Sunset Timelapse (Remastered)",
        );
        assert!((sim - 0.75).abs() < 1e-9);
        assert_eq!(title_similarity("short", ""), 0.0);
    }

    #[test]
    fn media_id_reads_known_hosts() {
        assert_eq!(
            media_id("https://v.redd.it/abc123/DASH_720.mp4").as_deref(),
            Some("abc123")
        );
        assert_eq!(
            media_id("https://www.youtube.com/watch?v=xyz789").as_deref(),
            Some("xyz789")
        );
        assert_eq!(media_id("https://youtu.be/xyz789").as_deref(), Some("xyz789"));
        assert_eq!(
            media_id("https://i.imgur.com/abc.mp4").as_deref(),
            Some("abc")
        );
        assert_eq!(media_id("https://example.com/video/1"), None);
    }

    #[test]
    fn union_pools_dedups_by_id() {
        let a = entry("aivideo", "one", None, 1, "https://v.redd.it/a", None);
        let b = entry("videos", "two", None, 2, "https://v.redd.it/b", None);
        let dup = a.clone();
        let unioned = union_pools(vec![vec![a, b], vec![dup]]);
        assert_eq!(unioned.len(), 2);
    }
}
