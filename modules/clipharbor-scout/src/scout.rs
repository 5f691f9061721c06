use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{info, warn};

use clipharbor_catalog::{CatalogEntry, CatalogStore, EntryMetadata, NewEntry};
use clipharbor_common::{sanitize_media_url, CandidateItem, Platform};
use reddit_client::{ListingSort, RawPost, RedditClient, RedditError};

use crate::dedup::{self, Decision, DedupConfig};
use crate::language::LanguageDetector;
use crate::media::{self, MediaProbeError, ThumbnailService, PLACEHOLDER_THUMBNAIL};
use crate::relevance::RelevanceFilter;
use crate::retry::{with_retry, RetryError, RetryPolicy};
use crate::sources::SourceProfile;

/// Posts requested per listing call.
const LISTING_LIMIT: u32 = 100;

/// Stats from one harvest cycle.
#[derive(Debug, Default)]
pub struct CycleStats {
    pub sources_ok: u32,
    pub sources_failed: u32,
    pub listings_failed: u32,
    pub candidates_seen: u32,
    pub already_known: u32,
    pub popularity_refreshed: u32,
    pub rejected_relevance: u32,
    pub inserted: u32,
    pub replaced: u32,
    pub skipped_duplicates: u32,
    pub items_failed: u32,
}

impl std::fmt::Display for CycleStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Harvest Cycle Complete ===")?;
        writeln!(f, "Sources ok:          {}", self.sources_ok)?;
        writeln!(f, "Sources failed:      {}", self.sources_failed)?;
        writeln!(f, "Listings failed:     {}", self.listings_failed)?;
        writeln!(f, "Candidates seen:     {}", self.candidates_seen)?;
        writeln!(f, "Already known:       {}", self.already_known)?;
        writeln!(f, "Popularity refresh:  {}", self.popularity_refreshed)?;
        writeln!(f, "Rejected relevance:  {}", self.rejected_relevance)?;
        writeln!(f, "Inserted:            {}", self.inserted)?;
        writeln!(f, "Replaced:            {}", self.replaced)?;
        writeln!(f, "Skipped duplicates:  {}", self.skipped_duplicates)?;
        writeln!(f, "Items failed:        {}", self.items_failed)?;
        Ok(())
    }
}

pub struct Scout {
    store: CatalogStore,
    reddit: RedditClient,
    thumbnails: Arc<dyn ThumbnailService>,
    language: Arc<dyn LanguageDetector>,
    relevance: RelevanceFilter,
    dedup: DedupConfig,
    retry: RetryPolicy,
    pacing: Duration,
    sources: Vec<SourceProfile>,
    http: reqwest::Client,
}

impl Scout {
    pub fn new(
        store: CatalogStore,
        reddit: RedditClient,
        thumbnails: Arc<dyn ThumbnailService>,
        language: Arc<dyn LanguageDetector>,
        pacing_millis: u64,
        sources: Vec<SourceProfile>,
    ) -> Result<Self> {
        Ok(Self {
            store,
            reddit,
            thumbnails,
            language,
            relevance: RelevanceFilter::new()?,
            dedup: DedupConfig::default(),
            retry: RetryPolicy::default(),
            pacing: Duration::from_millis(pacing_millis),
            sources,
            http: reqwest::Client::new(),
        })
    }

    /// Run one harvest cycle over every configured source. A failing source
    /// never aborts its siblings; the cycle itself cannot fail.
    pub async fn run_cycle(&self) -> CycleStats {
        let mut stats = CycleStats::default();

        for profile in &self.sources {
            match self.scrape_source(profile, &mut stats).await {
                Ok(()) => stats.sources_ok += 1,
                Err(e) => {
                    warn!(source = profile.name, error = %e, "Source scrape failed");
                    stats.sources_failed += 1;
                }
            }
            tokio::time::sleep(self.pacing).await;
        }

        stats
    }

    /// Fetch all listing strategies for one source, then run each unioned
    /// candidate through the decision pipeline.
    async fn scrape_source(&self, profile: &SourceProfile, stats: &mut CycleStats) -> Result<()> {
        let candidates = self.fetch_candidates(profile, stats).await?;
        stats.candidates_seen += candidates.len() as u32;

        let fresh = self.drop_known(candidates, stats).await;

        for candidate in fresh {
            self.ingest(profile, candidate, stats).await;
        }

        Ok(())
    }

    /// Run every listing strategy with retry, pacing between calls, and
    /// union the results by external id (highest score wins a collision).
    async fn fetch_candidates(
        &self,
        profile: &SourceProfile,
        stats: &mut CycleStats,
    ) -> Result<Vec<CandidateItem>> {
        let mut by_id: HashMap<String, CandidateItem> = HashMap::new();
        let mut calls = 0u32;
        let mut failed = 0u32;

        for sort in ListingSort::ALL {
            calls += 1;
            let result = with_retry(self.retry, "reddit listing", RedditError::is_transient, || {
                self.reddit.listing(profile.name, sort, LISTING_LIMIT)
            })
            .await;

            match result {
                Ok(posts) => merge_candidates(&mut by_id, posts),
                Err(e) => {
                    warn!(source = profile.name, %sort, error = %e, "Listing fetch failed");
                    failed += 1;
                }
            }
            tokio::time::sleep(self.pacing).await;
        }

        for term in profile.search_terms {
            calls += 1;
            let result = with_retry(self.retry, "reddit search", RedditError::is_transient, || {
                self.reddit.search(profile.name, term, LISTING_LIMIT)
            })
            .await;

            match result {
                Ok(posts) => merge_candidates(&mut by_id, posts),
                Err(e) => {
                    warn!(source = profile.name, term, error = %e, "Search fetch failed");
                    failed += 1;
                }
            }
            tokio::time::sleep(self.pacing).await;
        }

        stats.listings_failed += failed;
        if failed == calls {
            anyhow::bail!("every listing strategy failed");
        }

        Ok(by_id.into_values().collect())
    }

    /// Drop candidates the catalog already has, refreshing popularity
    /// counters when the incoming score is strictly higher. Re-ingesting an
    /// unchanged candidate is a no-op.
    async fn drop_known(
        &self,
        candidates: Vec<CandidateItem>,
        stats: &mut CycleStats,
    ) -> Vec<CandidateItem> {
        let ids: Vec<String> = candidates.iter().map(|c| c.external_id.clone()).collect();
        let known = match self
            .store
            .entries_by_external_ids(Platform::Reddit.as_str(), &ids)
            .await
        {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Known-id lookup failed, treating all candidates as new");
                Vec::new()
            }
        };
        let known_by_id: HashMap<&str, &CatalogEntry> =
            known.iter().map(|e| (e.external_id.as_str(), e)).collect();

        let mut fresh = Vec::new();
        for candidate in candidates {
            match known_by_id.get(candidate.external_id.as_str()) {
                Some(entry) => {
                    stats.already_known += 1;
                    if candidate.score > entry.likes {
                        match self
                            .store
                            .refresh_popularity(entry.id, candidate.score, candidate.score)
                            .await
                        {
                            Ok(()) => stats.popularity_refreshed += 1,
                            Err(e) => {
                                warn!(id = %entry.id, error = %e, "Popularity refresh failed")
                            }
                        }
                    }
                }
                None => fresh.push(candidate),
            }
        }
        fresh
    }

    /// Decide and persist one candidate. Failures are logged and isolated.
    async fn ingest(&self, profile: &SourceProfile, candidate: CandidateItem, stats: &mut CycleStats) {
        let relevant = self
            .relevance
            .is_relevant(&candidate.searchable_text(), profile.trusted);
        if !relevant {
            stats.rejected_relevance += 1;
            return;
        }

        // Resolution faults fail open to Insert so one bad lookup never
        // stalls the cycle.
        let decision = match self.assemble_pool(&candidate).await {
            Ok(pool) => dedup::resolve(&candidate, &pool, &self.dedup),
            Err(e) => {
                warn!(
                    external_id = candidate.external_id.as_str(),
                    error = %e,
                    "Duplicate resolution failed, proceeding with insert"
                );
                Decision::Insert
            }
        };

        match decision {
            Decision::Insert => {
                let entry = self.build_entry(&candidate).await;
                match self.store.insert(&entry).await {
                    Ok(id) => {
                        info!(id = %id, title = candidate.title.as_str(), "Inserted catalog entry");
                        stats.inserted += 1;
                    }
                    Err(e) if e.is_unique_violation() => {
                        // Lost a race with another writer; the entry exists.
                        info!(
                            external_id = candidate.external_id.as_str(),
                            "Entry appeared concurrently, skipping"
                        );
                        stats.skipped_duplicates += 1;
                    }
                    Err(e) => {
                        warn!(
                            external_id = candidate.external_id.as_str(),
                            error = %e,
                            "Insert failed"
                        );
                        stats.items_failed += 1;
                    }
                }
            }
            Decision::Replace(existing_id) => {
                let entry = self.build_entry(&candidate).await;
                match self.store.update_fields(existing_id, &entry).await {
                    Ok(()) => {
                        info!(
                            id = %existing_id,
                            title = candidate.title.as_str(),
                            "Replaced duplicate with more popular candidate"
                        );
                        stats.replaced += 1;
                    }
                    Err(e) => {
                        warn!(id = %existing_id, error = %e, "Replace failed");
                        stats.items_failed += 1;
                    }
                }
            }
            Decision::Skip => {
                stats.skipped_duplicates += 1;
            }
        }
    }

    /// The three overlapping comparison pools, unioned by id.
    async fn assemble_pool(
        &self,
        candidate: &CandidateItem,
    ) -> clipharbor_catalog::Result<Vec<CatalogEntry>> {
        let platform = candidate.platform.as_str();
        let since = window_start(Utc::now(), self.dedup.window_hours);

        let exact = self
            .store
            .find_by_exact_media_url(&candidate.media_url, since)
            .await?;
        let by_author = match candidate.author.as_deref() {
            Some(author) => {
                self.store
                    .find_recent_by_author_across_sources(platform, author, since)
                    .await?
            }
            None => Vec::new(),
        };
        let same_source = self
            .store
            .find_recent_by_source(platform, &candidate.source, since)
            .await?;

        Ok(dedup::union_pools(vec![exact, by_author, same_source]))
    }

    /// Materialize a candidate into row fields. Thumbnail and language are
    /// best-effort collaborators; their failures degrade, never block.
    async fn build_entry(&self, candidate: &CandidateItem) -> NewEntry {
        let thumbnail_url = match self.thumbnails.ensure_thumbnail(&candidate.media_url).await {
            Ok(thumb) => thumb,
            Err(e) => {
                warn!(
                    media_url = candidate.media_url.as_str(),
                    error = %e,
                    "Thumbnail extraction failed, using placeholder"
                );
                PLACEHOLDER_THUMBNAIL.to_string()
            }
        };

        let metadata = EntryMetadata {
            author: candidate.author.clone(),
            permalink: None,
            language: self.language.detect(&candidate.searchable_text()),
        };

        let mut tags = vec!["ai-generated".to_string()];
        if let Some(flair) = &candidate.flair {
            tags.push(flair.to_lowercase());
        }

        NewEntry {
            external_id: candidate.external_id.clone(),
            platform: candidate.platform.as_str().to_string(),
            source: candidate.source.clone(),
            title: candidate.title.clone(),
            media_url: candidate.media_url.clone(),
            thumbnail_url,
            tags,
            views: candidate.score,
            likes: candidate.score,
            nsfw: candidate.nsfw,
            metadata: metadata.to_value(),
            duration_secs: candidate.duration_secs,
            posted_at: candidate.posted_at,
        }
    }

    /// Maintenance pass: re-check media reachability for the entries that
    /// have gone longest unverified. Gone media gets the entry blacklisted;
    /// transient failures wait for the next pass.
    pub async fn revalidate_media(&self, limit: i64) -> (u32, u32) {
        let batch = match self.store.stale_media_batch(limit).await {
            Ok(batch) => batch,
            Err(e) => {
                warn!(error = %e, "Stale media batch query failed");
                return (0, 0);
            }
        };

        let mut checked = 0u32;
        let mut blacklisted = 0u32;

        for entry in batch {
            let result = with_retry(
                self.retry,
                "media probe",
                MediaProbeError::is_transient,
                || media::probe_media(&self.http, &entry.media_url),
            )
            .await;

            match result {
                Ok(()) => {
                    if let Err(e) = self.store.mark_media_checked(entry.id).await {
                        warn!(id = %entry.id, error = %e, "Failed to record media check");
                    } else {
                        checked += 1;
                    }
                }
                Err(RetryError::Fatal(probe_err)) if probe_err.is_gone() => {
                    info!(
                        id = %entry.id,
                        media_url = entry.media_url.as_str(),
                        error = %probe_err,
                        "Media gone, blacklisting entry"
                    );
                    match self.store.set_blacklisted(entry.id, true).await {
                        Ok(_) => blacklisted += 1,
                        Err(e) => warn!(id = %entry.id, error = %e, "Blacklist failed"),
                    }
                }
                Err(e) => {
                    warn!(id = %entry.id, error = %e, "Media probe inconclusive, leaving for next pass");
                }
            }
            tokio::time::sleep(self.pacing).await;
        }

        (checked, blacklisted)
    }
}

/// Start of the trailing comparison window.
fn window_start(now: DateTime<Utc>, hours: i64) -> DateTime<Utc> {
    now - TimeDelta::hours(hours)
}

/// Union posts into the candidate map; on an id collision the higher score
/// wins (listings overlap, scores drift between them).
fn merge_candidates(by_id: &mut HashMap<String, CandidateItem>, posts: Vec<RawPost>) {
    for post in posts {
        let Some(candidate) = to_candidate(post) else {
            continue;
        };
        let replace = match by_id.get(&candidate.external_id) {
            Some(existing) => candidate.score > existing.score,
            None => true,
        };
        if replace {
            by_id.insert(candidate.external_id.clone(), candidate);
        }
    }
}

/// Map a raw post to a candidate. Posts without a media URL are not video
/// candidates and are dropped here.
pub fn to_candidate(post: RawPost) -> Option<CandidateItem> {
    let media_url = sanitize_media_url(post.media_url()?);
    let duration_secs = post.duration_secs();
    let posted_at =
        DateTime::<Utc>::from_timestamp(post.created_utc as i64, 0).unwrap_or_else(Utc::now);
    let author = post
        .author
        .filter(|a| !a.is_empty() && a != "[deleted]");

    Some(CandidateItem {
        external_id: post.id,
        platform: Platform::Reddit,
        source: post.subreddit,
        title: post.title,
        body: post.selftext,
        flair: post.link_flair_text,
        author,
        score: post.score.max(0),
        media_url,
        duration_secs,
        nsfw: post.over_18,
        posted_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(id: &str, score: i64, url: Option<&str>) -> RawPost {
        serde_json::from_value(serde_json::json!({
            "id": id,
            "subreddit": "aivideo",
            "title": "AI generated clip",
            "selftext": "",
            "author": "clipmaker",
            "score": score,
            "url_overridden_by_dest": url,
            "created_utc": 1754300000.0,
            "over_18": false,
            "is_video": url.is_some(),
        }))
        .unwrap()
    }

    #[test]
    fn posts_without_media_are_dropped() {
        assert!(to_candidate(raw("a", 1, None)).is_none());
        assert!(to_candidate(raw("a", 1, Some("https://v.redd.it/a"))).is_some());
    }

    #[test]
    fn deleted_author_becomes_none() {
        let mut post = raw("a", 1, Some("https://v.redd.it/a"));
        post.author = Some("[deleted]".into());
        assert_eq!(to_candidate(post).unwrap().author, None);
    }

    #[test]
    fn candidate_media_url_is_sanitized() {
        let post = raw("a", 1, Some("https://v.redd.it/a?utm_source=share"));
        assert_eq!(to_candidate(post).unwrap().media_url, "https://v.redd.it/a");
    }

    #[test]
    fn merge_keeps_highest_score_per_id() {
        let mut by_id = HashMap::new();
        merge_candidates(&mut by_id, vec![raw("a", 5, Some("https://v.redd.it/a"))]);
        merge_candidates(
            &mut by_id,
            vec![
                raw("a", 9, Some("https://v.redd.it/a")),
                raw("b", 1, Some("https://v.redd.it/b")),
            ],
        );
        merge_candidates(&mut by_id, vec![raw("a", 2, Some("https://v.redd.it/a"))]);

        assert_eq!(by_id.len(), 2);
        assert_eq!(by_id["a"].score, 9);
    }

    #[test]
    fn window_start_subtracts_hours() {
        let now = Utc::now();
        assert_eq!(now - window_start(now, 48), TimeDelta::hours(48));
    }
}
