//! Feed composition.
//!
//! Homepage pages are stratified: the page index picks a stage, the stage's
//! weighted time-window buckets split the limit, and every bucket query
//! excludes what earlier buckets (and the viewer's session memory) already
//! chose. Constrained queries (explicit window, search, source filters)
//! bypass stratification and read a single page.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use clipharbor_catalog::{CatalogEntry, CatalogStore, EntryFilter, EntrySort, Result};

// --- Stages ---

#[derive(Debug, Clone, Copy)]
pub struct Bucket {
    pub label: &'static str,
    /// None means the unrestricted evergreen pool.
    pub window_hours: Option<i64>,
    pub weight: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct FeedStage {
    pub label: &'static str,
    pub buckets: &'static [Bucket],
}

static FRESH_MIX: FeedStage = FeedStage {
    label: "fresh_mix",
    buckets: &[
        Bucket { label: "last_day", window_hours: Some(24), weight: 0.5 },
        Bucket { label: "last_three_days", window_hours: Some(72), weight: 0.3 },
        Bucket { label: "last_week", window_hours: Some(168), weight: 0.2 },
    ],
};

static WEEKLY_POPULAR: FeedStage = FeedStage {
    label: "weekly_popular",
    buckets: &[
        Bucket { label: "last_week", window_hours: Some(168), weight: 0.7 },
        Bucket { label: "last_month", window_hours: Some(720), weight: 0.2 },
        Bucket { label: "evergreen", window_hours: None, weight: 0.1 },
    ],
};

static LONG_TAIL: FeedStage = FeedStage {
    label: "long_tail",
    buckets: &[
        Bucket { label: "last_month", window_hours: Some(720), weight: 0.4 },
        Bucket { label: "last_quarter", window_hours: Some(2160), weight: 0.3 },
        Bucket { label: "evergreen", window_hours: None, weight: 0.3 },
    ],
};

/// Stage for a zero-based page index: early pages lean recent, deep pages
/// lean long-tail.
pub fn stage_for_page(page: i64) -> &'static FeedStage {
    match page {
        0..=1 => &FRESH_MIX,
        2..=4 => &WEEKLY_POPULAR,
        _ => &LONG_TAIL,
    }
}

// --- Allocation ---

/// Split `limit` slots across weighted buckets by largest remainder: each
/// bucket gets floor(limit*weight); shortfall goes to the largest-weight
/// buckets first; overflow is trimmed from the smallest-weight buckets that
/// hold more than one slot. When limit >= bucket count, no bucket with
/// positive weight ends up empty.
pub fn allocate(limit: usize, weights: &[f64]) -> Vec<usize> {
    if weights.is_empty() || limit == 0 {
        return vec![0; weights.len()];
    }

    let mut alloc: Vec<usize> = weights
        .iter()
        .map(|w| (limit as f64 * w).floor() as usize)
        .collect();

    // Index order: heaviest buckets first.
    let mut by_weight: Vec<usize> = (0..weights.len()).collect();
    by_weight.sort_by(|&a, &b| weights[b].total_cmp(&weights[a]));

    let assigned: usize = alloc.iter().sum();
    if assigned < limit {
        let mut shortfall = limit - assigned;
        let mut i = 0;
        while shortfall > 0 {
            alloc[by_weight[i % by_weight.len()]] += 1;
            shortfall -= 1;
            i += 1;
        }
    } else if assigned > limit {
        let mut overflow = assigned - limit;
        for &idx in by_weight.iter().rev() {
            while overflow > 0 && alloc[idx] > 1 {
                alloc[idx] -= 1;
                overflow -= 1;
            }
        }
    }

    // Every weighted bucket gets at least one slot when there is room.
    if limit >= weights.len() {
        loop {
            let Some(starved) = (0..weights.len()).find(|&i| weights[i] > 0.0 && alloc[i] == 0)
            else {
                break;
            };
            let Some(&donor) = by_weight
                .iter()
                .rev()
                .find(|&&i| alloc[i] > 1)
            else {
                break;
            };
            alloc[donor] -= 1;
            alloc[starved] += 1;
        }
    }

    alloc
}

// --- Output shapes ---

#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub stage: &'static str,
    pub bucket: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub window_hours: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedItem {
    #[serde(flatten)]
    pub entry: CatalogEntry,
    /// log(views per hour since posting + 1), rounded to 2 decimals.
    pub heat: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
}

#[derive(Debug, Serialize)]
pub struct FeedPage {
    pub items: Vec<FeedItem>,
    pub total: i64,
}

/// Derived popularity-over-time signal.
pub fn popularity_over_time(views: i64, posted_at: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let hours = ((now - posted_at).num_minutes() as f64 / 60.0).max(1.0);
    let heat = (views as f64 / hours + 1.0).ln();
    (heat * 100.0).round() / 100.0
}

// --- Composer ---

#[derive(Debug, Clone, Default)]
pub struct FeedParams {
    pub limit: i64,
    pub offset: i64,
    /// Explicit sort requests force constrained mode.
    pub sort: Option<EntrySort>,
    pub source: Option<String>,
    pub platform: Option<String>,
    pub search: Option<String>,
    pub include_nsfw: bool,
    pub language: Option<String>,
    /// Explicit trending window in hours.
    pub trending_hours: Option<i64>,
}

impl FeedParams {
    fn is_constrained(&self) -> bool {
        self.sort.is_some()
            || self.trending_hours.is_some()
            || self.search.is_some()
            || self.source.is_some()
            || self.platform.is_some()
            || self.language.is_some()
    }

    fn base_filter(&self, exclude_ids: Vec<Uuid>, window_hours: Option<i64>) -> EntryFilter {
        EntryFilter {
            platform: self.platform.clone(),
            source: self.source.clone(),
            search: self.search.clone(),
            include_nsfw: self.include_nsfw,
            language: self.language.clone(),
            posted_within_hours: window_hours,
            exclude_ids,
        }
    }
}

pub struct FeedComposer {
    store: CatalogStore,
}

impl FeedComposer {
    pub fn new(store: CatalogStore) -> Self {
        Self { store }
    }

    /// Compose one result page. `exclude` carries the viewer's session
    /// memory; every bucket also excludes ids chosen earlier in the same
    /// request. Errors propagate — a partial page is never returned.
    pub async fn compose(&self, params: &FeedParams, exclude: &[Uuid]) -> Result<FeedPage> {
        let now = Utc::now();
        let seed = day_seed(now);

        if params.is_constrained() {
            return self.compose_constrained(params, exclude, &seed, now).await;
        }
        self.compose_stratified(params, exclude, &seed, now).await
    }

    async fn compose_constrained(
        &self,
        params: &FeedParams,
        exclude: &[Uuid],
        seed: &str,
        now: DateTime<Utc>,
    ) -> Result<FeedPage> {
        let filter = params.base_filter(exclude.to_vec(), params.trending_hours);
        let sort = params.sort.unwrap_or_default();
        let (rows, total) = self
            .store
            .query_page(&filter, sort, seed, params.limit, params.offset)
            .await?;

        let items = rows
            .into_iter()
            .map(|entry| to_item(entry, now, None))
            .collect();
        Ok(FeedPage { items, total })
    }

    async fn compose_stratified(
        &self,
        params: &FeedParams,
        exclude: &[Uuid],
        seed: &str,
        now: DateTime<Utc>,
    ) -> Result<FeedPage> {
        let limit = params.limit.max(0) as usize;
        let page = params.offset / params.limit.max(1);
        let stage = stage_for_page(page);

        let weights: Vec<f64> = stage.buckets.iter().map(|b| b.weight).collect();
        let alloc = allocate(limit, &weights);

        let mut items: Vec<FeedItem> = Vec::with_capacity(limit);
        let mut exclude_ids = exclude.to_vec();

        for (bucket, slots) in stage.buckets.iter().zip(alloc) {
            if slots == 0 {
                continue;
            }
            let filter = params.base_filter(exclude_ids.clone(), bucket.window_hours);
            let sort = match bucket.window_hours {
                Some(_) => EntrySort::Trending,
                None => EntrySort::MostViewed,
            };
            let (rows, _) = self
                .store
                .query_page(&filter, sort, seed, slots as i64, 0)
                .await?;

            for entry in rows {
                exclude_ids.push(entry.id);
                items.push(to_item(
                    entry,
                    now,
                    Some(Provenance {
                        stage: stage.label,
                        bucket: bucket.label,
                        window_hours: bucket.window_hours,
                    }),
                ));
            }
        }

        // Thin windows leave slots unfilled; backfill from the whole pool.
        if items.len() < limit {
            let missing = (limit - items.len()) as i64;
            let filter = params.base_filter(exclude_ids.clone(), None);
            let (rows, _) = self
                .store
                .query_page(&filter, EntrySort::Newest, seed, missing, 0)
                .await?;
            for entry in rows {
                items.push(to_item(
                    entry,
                    now,
                    Some(Provenance {
                        stage: stage.label,
                        bucket: "backfill",
                        window_hours: None,
                    }),
                ));
            }
        }

        // Pagination metadata counts the unrestricted pool.
        let total_filter = params.base_filter(Vec::new(), None);
        let (_, total) = self
            .store
            .query_page(&total_filter, EntrySort::Newest, seed, 0, 0)
            .await?;

        Ok(FeedPage { items, total })
    }
}

fn to_item(entry: CatalogEntry, now: DateTime<Utc>, provenance: Option<Provenance>) -> FeedItem {
    let heat = popularity_over_time(entry.views, entry.posted_at, now);
    FeedItem { entry, heat, provenance }
}

/// Seed that rotates daily so tiebreak ordering is stable within a day but
/// not frozen forever.
fn day_seed(now: DateTime<Utc>) -> String {
    now.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    #[test]
    fn allocation_matches_weekly_popular_expectations() {
        // 12 slots over 0.7/0.2/0.1 -> floors {8,2,1}, shortfall 1 to the
        // heaviest bucket.
        let alloc = allocate(12, &[0.7, 0.2, 0.1]);
        assert_eq!(alloc.iter().sum::<usize>(), 12);
        assert!(alloc[0] == 8 || alloc[0] == 9);
        assert!(alloc[1] == 2 || alloc[1] == 3);
        assert!(alloc[2] == 1 || alloc[2] == 2);
    }

    #[test]
    fn no_weighted_bucket_starves_when_limit_allows() {
        let alloc = allocate(3, &[0.7, 0.2, 0.1]);
        assert_eq!(alloc.iter().sum::<usize>(), 3);
        assert!(alloc.iter().all(|&n| n >= 1));
    }

    #[test]
    fn tiny_limit_keeps_total_exact() {
        let alloc = allocate(2, &[0.7, 0.2, 0.1]);
        assert_eq!(alloc.iter().sum::<usize>(), 2);
    }

    #[test]
    fn overweight_config_trims_smallest_buckets() {
        // Weights summing past 1.0 must still produce exactly `limit`.
        let alloc = allocate(10, &[0.8, 0.8]);
        assert_eq!(alloc.iter().sum::<usize>(), 10);
        assert!(alloc[1] >= 1);
    }

    #[test]
    fn stages_shift_with_depth() {
        assert_eq!(stage_for_page(0).label, "fresh_mix");
        assert_eq!(stage_for_page(1).label, "fresh_mix");
        assert_eq!(stage_for_page(3).label, "weekly_popular");
        assert_eq!(stage_for_page(9).label, "long_tail");
    }

    #[test]
    fn stage_weights_sum_to_one() {
        for stage in [&FRESH_MIX, &WEEKLY_POPULAR, &LONG_TAIL] {
            let sum: f64 = stage.buckets.iter().map(|b| b.weight).sum();
            assert!((sum - 1.0).abs() < 1e-9, "{} sums to {sum}", stage.label);
        }
    }

    #[test]
    fn heat_is_log_views_per_hour_rounded() {
        let now = Utc::now();
        // 100 views, 1 hour old: ln(101) = 4.6151... -> 4.62
        let h = popularity_over_time(100, now - TimeDelta::hours(1), now);
        assert!((h - 4.62).abs() < 1e-9);
        // Fresher than an hour clamps the denominator to 1.
        let h = popularity_over_time(100, now - TimeDelta::minutes(5), now);
        assert!((h - 4.62).abs() < 1e-9);
        // Zero views: ln(1) = 0.
        assert_eq!(popularity_over_time(0, now - TimeDelta::hours(5), now), 0.0);
    }

    #[test]
    fn explicit_filters_force_constrained_mode() {
        let mut p = FeedParams { limit: 24, ..Default::default() };
        assert!(!p.is_constrained());
        p.trending_hours = Some(24);
        assert!(p.is_constrained());

        let p = FeedParams {
            limit: 24,
            search: Some("sunset".into()),
            ..Default::default()
        };
        assert!(p.is_constrained());
    }
}
