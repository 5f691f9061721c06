use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

/// Filters a feed read can apply. Blacklisted entries are never served.
#[derive(Debug, Clone, Default)]
pub struct EntryFilter {
    pub platform: Option<String>,
    pub source: Option<String>,
    /// Case-insensitive substring match on the title.
    pub search: Option<String>,
    pub include_nsfw: bool,
    pub language: Option<String>,
    /// Restrict to entries posted within the trailing N hours.
    pub posted_within_hours: Option<i64>,
    /// Ids already chosen for this page or recently served to this viewer.
    pub exclude_ids: Vec<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EntrySort {
    #[default]
    Newest,
    MostViewed,
    MostLiked,
    Trending,
}

impl EntrySort {
    pub fn parse(s: &str) -> Option<EntrySort> {
        match s {
            "newest" | "new" => Some(EntrySort::Newest),
            "views" | "most_viewed" => Some(EntrySort::MostViewed),
            "likes" | "most_liked" => Some(EntrySort::MostLiked),
            "trending" => Some(EntrySort::Trending),
            _ => None,
        }
    }
}

/// Append the WHERE clause for a filter. The builder must already contain
/// a statement ending in `WHERE blacklisted = FALSE`.
pub(crate) fn push_filter(qb: &mut QueryBuilder<'_, Postgres>, f: &EntryFilter) {
    if let Some(platform) = &f.platform {
        qb.push(" AND platform = ").push_bind(platform.clone());
    }
    if let Some(source) = &f.source {
        qb.push(" AND source = ").push_bind(source.clone());
    }
    if let Some(search) = &f.search {
        qb.push(" AND title ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)));
    }
    if !f.include_nsfw {
        qb.push(" AND nsfw = FALSE");
    }
    if let Some(language) = &f.language {
        qb.push(" AND metadata->>'language' = ").push_bind(language.clone());
    }
    if let Some(hours) = f.posted_within_hours {
        // make_interval takes int4; hours never get near that bound.
        qb.push(" AND posted_at >= now() - make_interval(hours => ")
            .push_bind(hours as i32)
            .push(")");
    }
    if !f.exclude_ids.is_empty() {
        qb.push(" AND NOT (id = ANY(")
            .push_bind(f.exclude_ids.clone())
            .push("))");
    }
}

/// Append the combined ordering: primary sort field, popularity tiebreak,
/// then a seed-rotated pseudo-random tiebreak so identical queries do not
/// freeze into one ordering across days.
pub(crate) fn push_order(qb: &mut QueryBuilder<'_, Postgres>, sort: EntrySort, seed: &str) {
    qb.push(" ORDER BY ");
    match sort {
        EntrySort::Newest => {
            qb.push("posted_at DESC, likes DESC");
        }
        EntrySort::MostViewed => {
            qb.push("views DESC, likes DESC");
        }
        EntrySort::MostLiked => {
            qb.push("likes DESC, views DESC");
        }
        EntrySort::Trending => {
            qb.push(
                "(views::float8 / GREATEST(EXTRACT(EPOCH FROM (now() - posted_at)) / 3600.0, 1.0)) DESC, likes DESC",
            );
        }
    }
    qb.push(", md5(id::text || ").push_bind(seed.to_string()).push(")");
}

/// Escape LIKE wildcards so user search text matches literally.
fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rendered(f: &EntryFilter) -> String {
        let mut qb = QueryBuilder::new("SELECT * FROM catalog_entries WHERE blacklisted = FALSE");
        push_filter(&mut qb, f);
        qb.into_sql()
    }

    #[test]
    fn empty_filter_hides_nsfw_by_default() {
        let sql = rendered(&EntryFilter::default());
        assert!(sql.contains("nsfw = FALSE"));
        assert!(!sql.contains("source ="));
    }

    #[test]
    fn filter_binds_in_declaration_order() {
        let f = EntryFilter {
            platform: Some("reddit".into()),
            source: Some("aivideo".into()),
            search: Some("sunset".into()),
            include_nsfw: true,
            language: Some("en".into()),
            posted_within_hours: Some(24),
            exclude_ids: vec![Uuid::new_v4()],
        };
        let sql = rendered(&f);
        assert!(sql.contains("platform = $1"));
        assert!(sql.contains("source = $2"));
        assert!(sql.contains("title ILIKE $3"));
        assert!(!sql.contains("nsfw = FALSE"));
        assert!(sql.contains("metadata->>'language' = $4"));
        assert!(sql.contains("make_interval(hours => $5)"));
        assert!(sql.contains("id = ANY($6)"));
    }

    #[test]
    fn order_includes_day_rotating_tiebreak() {
        let mut qb = QueryBuilder::new("SELECT * FROM catalog_entries WHERE blacklisted = FALSE");
        push_order(&mut qb, EntrySort::Newest, "2026-08-06");
        let sql = qb.into_sql();
        assert!(sql.contains("ORDER BY posted_at DESC, likes DESC, md5(id::text || $1)"));
    }

    #[test]
    fn trending_orders_by_views_per_hour() {
        let mut qb = QueryBuilder::new("SELECT 1");
        push_order(&mut qb, EntrySort::Trending, "s");
        assert!(qb.into_sql().contains("GREATEST(EXTRACT(EPOCH FROM (now() - posted_at)) / 3600.0, 1.0)"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(escape_like("100%_ai"), "100\\%\\_ai");
    }
}
