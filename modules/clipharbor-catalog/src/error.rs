use thiserror::Error;

pub type Result<T> = std::result::Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Duplicate entry: {platform}/{external_id}")]
    DuplicateEntry {
        platform: String,
        external_id: String,
    },
}

impl CatalogError {
    /// True when the error is a uniqueness race with a concurrent writer.
    /// Callers treat this as "item already present" rather than a failure.
    pub fn is_unique_violation(&self) -> bool {
        matches!(self, CatalogError::DuplicateEntry { .. })
    }
}
