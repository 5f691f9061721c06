use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClipharborError {
    #[error("Source error: {0}")]
    Source(String),

    #[error("Catalog error: {0}")]
    Catalog(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Validation error: {0}")]
    Validation(String),
}
