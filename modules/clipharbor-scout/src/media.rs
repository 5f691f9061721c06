//! Media collaborators: thumbnail extraction and reachability probes.
//!
//! Thumbnailing is an external service consumed through a narrow trait; a
//! failure yields a placeholder reference and never blocks catalog writes.

use async_trait::async_trait;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use clipharbor_common::ClipharborError;

/// Reference stored when no thumbnail could be produced.
pub const PLACEHOLDER_THUMBNAIL: &str = "placeholder://thumb";

#[async_trait]
pub trait ThumbnailService: Send + Sync {
    /// Produce (or look up) a thumbnail reference for a media URL.
    async fn ensure_thumbnail(&self, media_url: &str) -> Result<String, ClipharborError>;
}

#[derive(Deserialize)]
struct ThumbResponse {
    #[serde(rename = "ref")]
    thumb_ref: String,
}

/// Client for the thumbnailer sidecar. When no sidecar is configured the
/// service degrades to returning the placeholder for everything.
pub struct HttpThumbnailService {
    client: reqwest::Client,
    base_url: Option<String>,
}

impl HttpThumbnailService {
    pub fn new(base_url: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }
}

#[async_trait]
impl ThumbnailService for HttpThumbnailService {
    async fn ensure_thumbnail(&self, media_url: &str) -> Result<String, ClipharborError> {
        let Some(base) = &self.base_url else {
            debug!("No thumbnailer configured, using placeholder");
            return Ok(PLACEHOLDER_THUMBNAIL.to_string());
        };

        let resp = self
            .client
            .get(format!("{base}/thumbnail"))
            .query(&[("src", media_url)])
            .send()
            .await
            .map_err(|e| ClipharborError::Media(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(ClipharborError::Media(format!(
                "thumbnailer returned status {status}"
            )));
        }

        let body: ThumbResponse = resp
            .json()
            .await
            .map_err(|e| ClipharborError::Media(e.to_string()))?;
        Ok(body.thumb_ref)
    }
}

// --- Reachability probes (media revalidation) ---

#[derive(Debug, Error)]
pub enum MediaProbeError {
    #[error("network error: {0}")]
    Network(String),

    #[error("media returned status {0}")]
    Status(u16),
}

impl MediaProbeError {
    pub fn is_transient(&self) -> bool {
        match self {
            MediaProbeError::Network(_) => true,
            MediaProbeError::Status(s) => *s == 429 || *s == 408 || (500..=599).contains(s),
        }
    }

    /// Statuses that mean the media is gone for good.
    pub fn is_gone(&self) -> bool {
        matches!(self, MediaProbeError::Status(403 | 404 | 410))
    }
}

/// HEAD the media URL to confirm it still resolves.
pub async fn probe_media(client: &reqwest::Client, url: &str) -> Result<(), MediaProbeError> {
    let resp = client
        .head(url)
        .send()
        .await
        .map_err(|e| MediaProbeError::Network(e.to_string()))?;

    let status = resp.status();
    if status.is_success() || status.is_redirection() {
        Ok(())
    } else {
        Err(MediaProbeError::Status(status.as_u16()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_error_classes() {
        assert!(MediaProbeError::Status(503).is_transient());
        assert!(MediaProbeError::Network("reset".into()).is_transient());
        assert!(!MediaProbeError::Status(404).is_transient());
        assert!(MediaProbeError::Status(404).is_gone());
        assert!(MediaProbeError::Status(410).is_gone());
        assert!(!MediaProbeError::Status(500).is_gone());
    }

    #[tokio::test]
    async fn unconfigured_thumbnailer_returns_placeholder() {
        let service = HttpThumbnailService::new(None);
        let thumb = service.ensure_thumbnail("https://v.redd.it/abc").await.unwrap();
        assert_eq!(thumb, PLACEHOLDER_THUMBNAIL);
    }
}
