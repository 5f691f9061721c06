use std::env;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Postgres
    pub database_url: String,

    // Source fetching
    pub reddit_user_agent: String,
    pub cycle_interval_mins: u64,
    pub pacing_millis: u64,
    /// Thumbnailer sidecar base URL. Absent means placeholder thumbnails.
    pub thumbnailer_url: Option<String>,

    // Web server
    pub api_host: String,
    pub api_port: u16,

    // Moderation
    pub admin_token: String,
}

impl Config {
    /// Load configuration for the scout binary.
    /// Panics with a clear message if required vars are missing.
    pub fn scout_from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            reddit_user_agent: env::var("REDDIT_USER_AGENT")
                .unwrap_or_else(|_| "clipharbor/0.1 (catalog bot)".to_string()),
            cycle_interval_mins: parsed_env("CYCLE_INTERVAL_MINS", 30),
            pacing_millis: parsed_env("PACING_MILLIS", 1500),
            thumbnailer_url: env::var("THUMBNAILER_URL").ok(),
            api_host: String::new(),
            api_port: 0,
            admin_token: String::new(),
        }
    }

    /// Load configuration for the API server (read side plus moderation).
    pub fn api_from_env() -> Self {
        Self {
            database_url: required_env("DATABASE_URL"),
            reddit_user_agent: String::new(),
            cycle_interval_mins: 0,
            pacing_millis: 0,
            thumbnailer_url: None,
            api_host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            api_port: parsed_env("API_PORT", 3000),
            admin_token: required_env("ADMIN_TOKEN"),
        }
    }

    /// Log the loaded configuration without secrets.
    pub fn log_redacted(&self) {
        tracing::info!(
            cycle_interval_mins = self.cycle_interval_mins,
            pacing_millis = self.pacing_millis,
            api_host = %self.api_host,
            api_port = self.api_port,
            "Config loaded"
        );
    }
}

fn required_env(key: &str) -> String {
    env::var(key).unwrap_or_else(|_| panic!("{key} environment variable is required"))
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(v) => v
            .parse()
            .unwrap_or_else(|_| panic!("{key} must be a number")),
        Err(_) => default,
    }
}
