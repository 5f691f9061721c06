use chrono::{DateTime, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::info;
use uuid::Uuid;

use crate::entry::{CatalogEntry, NewEntry};
use crate::error::{CatalogError, Result};
use crate::query::{push_filter, push_order, EntryFilter, EntrySort};

/// Upper bound on any duplicate-resolution comparison pool query.
const POOL_LIMIT: i64 = 200;

/// Catalog store over Postgres. The single owner of catalog_entries;
/// the scout writes through it, the API reads through it.
#[derive(Clone)]
pub struct CatalogStore {
    pool: PgPool,
}

impl CatalogStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(8)
            .connect(database_url)
            .await?;
        info!("Connected to Postgres");
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }

    // --- Lookups for the ingestion pipeline ---

    pub async fn find_by_external_id(
        &self,
        platform: &str,
        external_id: &str,
    ) -> Result<Option<CatalogEntry>> {
        let row = sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT * FROM catalog_entries
            WHERE platform = $1 AND external_id = $2
            "#,
        )
        .bind(platform)
        .bind(external_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    /// All entries already known for a set of external ids on one platform.
    /// Used to drop already-ingested candidates before the decision pipeline.
    pub async fn entries_by_external_ids(
        &self,
        platform: &str,
        external_ids: &[String],
    ) -> Result<Vec<CatalogEntry>> {
        if external_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT * FROM catalog_entries
            WHERE platform = $1 AND external_id = ANY($2)
            "#,
        )
        .bind(platform)
        .bind(external_ids)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn find_recent_by_source(
        &self,
        platform: &str,
        source: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT * FROM catalog_entries
            WHERE platform = $1 AND source = $2 AND created_at >= $3
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(platform)
        .bind(source)
        .bind(since)
        .bind(POOL_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    /// Recent entries by one author regardless of source. Catches the same
    /// clip reposted across communities.
    pub async fn find_recent_by_author_across_sources(
        &self,
        platform: &str,
        author: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT * FROM catalog_entries
            WHERE platform = $1 AND metadata->>'author' = $2 AND created_at >= $3
            ORDER BY created_at DESC
            LIMIT $4
            "#,
        )
        .bind(platform)
        .bind(author)
        .bind(since)
        .bind(POOL_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn find_by_exact_media_url(
        &self,
        media_url: &str,
        since: DateTime<Utc>,
    ) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT * FROM catalog_entries
            WHERE media_url = $1 AND created_at >= $2
            ORDER BY created_at DESC
            LIMIT $3
            "#,
        )
        .bind(media_url)
        .bind(since)
        .bind(POOL_LIMIT)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    // --- Writes (resolver decisions) ---

    /// Insert a new entry. A uniqueness race with a concurrent writer
    /// surfaces as `CatalogError::DuplicateEntry`.
    pub async fn insert(&self, e: &NewEntry) -> Result<Uuid> {
        let result = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO catalog_entries
                (external_id, platform, source, title, media_url, thumbnail_url,
                 tags, views, likes, nsfw, metadata, duration_secs, posted_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#,
        )
        .bind(&e.external_id)
        .bind(&e.platform)
        .bind(&e.source)
        .bind(&e.title)
        .bind(&e.media_url)
        .bind(&e.thumbnail_url)
        .bind(&e.tags)
        .bind(e.views)
        .bind(e.likes)
        .bind(e.nsfw)
        .bind(&e.metadata)
        .bind(e.duration_secs)
        .bind(e.posted_at)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(id) => Ok(id),
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                Err(CatalogError::DuplicateEntry {
                    platform: e.platform.clone(),
                    external_id: e.external_id.clone(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Overwrite an existing entry's fields in place on a Replace decision.
    /// The row id and created_at are preserved; external identity follows
    /// the replacing candidate.
    pub async fn update_fields(&self, id: Uuid, e: &NewEntry) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE catalog_entries SET
                external_id = $2, platform = $3, source = $4, title = $5,
                media_url = $6, thumbnail_url = $7, tags = $8,
                views = $9, likes = $10, nsfw = $11, metadata = $12,
                duration_secs = $13, posted_at = $14, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(&e.external_id)
        .bind(&e.platform)
        .bind(&e.source)
        .bind(&e.title)
        .bind(&e.media_url)
        .bind(&e.thumbnail_url)
        .bind(&e.tags)
        .bind(e.views)
        .bind(e.likes)
        .bind(e.nsfw)
        .bind(&e.metadata)
        .bind(e.duration_secs)
        .bind(e.posted_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Raise popularity counters to the observed values. Counters only move
    /// up here; moderation is the sole path that resets anything.
    pub async fn refresh_popularity(&self, id: Uuid, views: i64, likes: i64) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE catalog_entries SET
                views = GREATEST(views, $2),
                likes = GREATEST(likes, $3),
                updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(views)
        .bind(likes)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    // --- Feed reads ---

    /// Filtered, sorted, paginated page plus the total matching count.
    pub async fn query_page(
        &self,
        filter: &EntryFilter,
        sort: EntrySort,
        seed: &str,
        limit: i64,
        offset: i64,
    ) -> Result<(Vec<CatalogEntry>, i64)> {
        let mut count_qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT COUNT(*) FROM catalog_entries WHERE blacklisted = FALSE");
        push_filter(&mut count_qb, filter);
        let total: i64 = count_qb
            .build_query_scalar()
            .fetch_one(&self.pool)
            .await?;

        let mut qb: QueryBuilder<'_, Postgres> =
            QueryBuilder::new("SELECT * FROM catalog_entries WHERE blacklisted = FALSE");
        push_filter(&mut qb, filter);
        push_order(&mut qb, sort, seed);
        qb.push(" LIMIT ").push_bind(limit);
        qb.push(" OFFSET ").push_bind(offset);

        let rows = qb
            .build_query_as::<CatalogEntry>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<CatalogEntry>> {
        let row = sqlx::query_as::<_, CatalogEntry>(
            "SELECT * FROM catalog_entries WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }

    // --- Media maintenance ---

    /// Entries whose backing media has gone longest without revalidation.
    pub async fn stale_media_batch(&self, limit: i64) -> Result<Vec<CatalogEntry>> {
        let rows = sqlx::query_as::<_, CatalogEntry>(
            r#"
            SELECT * FROM catalog_entries
            WHERE blacklisted = FALSE
            ORDER BY media_checked_at ASC NULLS FIRST
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    pub async fn mark_media_checked(&self, id: Uuid) -> Result<()> {
        sqlx::query("UPDATE catalog_entries SET media_checked_at = now() WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    // --- Moderation (outside the ingestion pipeline) ---

    pub async fn mark_nsfw(&self, id: Uuid, nsfw: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE catalog_entries SET nsfw = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(nsfw)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn set_blacklisted(&self, id: Uuid, blacklisted: bool) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE catalog_entries SET blacklisted = $2, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .bind(blacklisted)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM catalog_entries WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
