use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

/// A row from the catalog_entries table. Owned by the catalog store;
/// mutated only through resolver decisions and moderation actions.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CatalogEntry {
    pub id: Uuid,
    pub external_id: String,
    pub platform: String,
    pub source: String,
    pub title: String,
    pub media_url: String,
    pub thumbnail_url: String,
    pub tags: Vec<String>,
    pub views: i64,
    pub likes: i64,
    pub nsfw: bool,
    pub blacklisted: bool,
    pub metadata: serde_json::Value,
    pub duration_secs: Option<f64>,
    /// When the post was created on its platform.
    pub posted_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub media_checked_at: Option<DateTime<Utc>>,
}

impl CatalogEntry {
    pub fn author(&self) -> Option<&str> {
        self.metadata.get("author").and_then(|v| v.as_str())
    }

    pub fn language(&self) -> Option<&str> {
        self.metadata.get("language").and_then(|v| v.as_str())
    }
}

/// Parameters for inserting a new catalog entry, or overwriting an existing
/// one in place on a Replace decision.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub external_id: String,
    pub platform: String,
    pub source: String,
    pub title: String,
    pub media_url: String,
    pub thumbnail_url: String,
    pub tags: Vec<String>,
    pub views: i64,
    pub likes: i64,
    pub nsfw: bool,
    pub metadata: serde_json::Value,
    pub duration_secs: Option<f64>,
    pub posted_at: DateTime<Utc>,
}

/// The opaque metadata bag stored as JSONB on every entry.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EntryMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permalink: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

impl EntryMetadata {
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|_| serde_json::json!({}))
    }
}
