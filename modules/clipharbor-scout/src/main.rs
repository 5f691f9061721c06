use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clipharbor_catalog::CatalogStore;
use clipharbor_common::Config;
use clipharbor_scout::language::ScriptLanguageDetector;
use clipharbor_scout::media::HttpThumbnailService;
use clipharbor_scout::scout::Scout;
use clipharbor_scout::sources;
use reddit_client::RedditClient;

/// Media revalidation runs after every N-th harvest cycle.
const MEDIA_REVALIDATE_EVERY_CYCLES: u64 = 4;
/// Entries re-checked per maintenance pass.
const MEDIA_REVALIDATE_BATCH: i64 = 30;

#[derive(Parser)]
#[command(about = "Clipharbor harvest loop")]
struct Args {
    /// Run a single cycle and exit (for cron-style deployments).
    #[arg(long)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Clipharbor scout starting...");

    let args = Args::parse();
    let config = Config::scout_from_env();
    config.log_redacted();

    let store = CatalogStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let reddit = RedditClient::new(config.reddit_user_agent.clone());
    let thumbnails = Arc::new(HttpThumbnailService::new(config.thumbnailer_url.clone()));
    let language = Arc::new(ScriptLanguageDetector);

    let scout = Scout::new(
        store,
        reddit,
        thumbnails,
        language,
        config.pacing_millis,
        sources::default_sources(),
    )?;

    let interval = Duration::from_secs(config.cycle_interval_mins * 60);
    let mut cycle: u64 = 0;

    // Cycles run strictly back to back: the next one only starts after the
    // current one (and its sleep) completes, so overlap cannot happen.
    loop {
        let stats = scout.run_cycle().await;
        info!("{stats}");

        if cycle % MEDIA_REVALIDATE_EVERY_CYCLES == 0 {
            let (checked, blacklisted) = scout.revalidate_media(MEDIA_REVALIDATE_BATCH).await;
            info!(checked, blacklisted, "Media revalidation pass complete");
        }

        if args.once {
            break;
        }

        cycle += 1;
        info!(mins = config.cycle_interval_mins, "Cycle complete, sleeping");
        tokio::time::sleep(interval).await;
    }

    info!("Single cycle finished, exiting");
    Ok(())
}
