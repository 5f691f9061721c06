use thiserror::Error;

pub type Result<T> = std::result::Result<T, RedditError>;

#[derive(Debug, Error)]
pub enum RedditError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl RedditError {
    /// Whether a retry has any chance of succeeding. Rate limits, server
    /// errors, gateway timeouts and transport failures are transient;
    /// everything else (not-found, forbidden, malformed responses) is not.
    pub fn is_transient(&self) -> bool {
        match self {
            RedditError::Network(_) => true,
            RedditError::Api { status, .. } => {
                *status == 429 || *status == 408 || (500..=599).contains(status)
            }
            RedditError::Parse(_) => false,
        }
    }
}

impl From<reqwest::Error> for RedditError {
    fn from(err: reqwest::Error) -> Self {
        RedditError::Network(err.to_string())
    }
}

impl From<serde_json::Error> for RedditError {
    fn from(err: serde_json::Error) -> Self {
        RedditError::Parse(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_transient() {
        assert!(RedditError::Api { status: 429, message: String::new() }.is_transient());
        assert!(RedditError::Api { status: 503, message: String::new() }.is_transient());
        assert!(RedditError::Network("timeout".into()).is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        assert!(!RedditError::Api { status: 404, message: String::new() }.is_transient());
        assert!(!RedditError::Api { status: 403, message: String::new() }.is_transient());
        assert!(!RedditError::Parse("bad json".into()).is_transient());
    }
}
