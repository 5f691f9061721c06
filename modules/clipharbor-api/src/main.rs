use std::sync::Arc;

use anyhow::Result;
use axum::{
    http::{header, HeaderValue},
    routing::{get, post},
    Router,
};
use tower_http::set_header::SetResponseHeaderLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

use clipharbor_catalog::CatalogStore;
use clipharbor_common::Config;

mod feed;
mod rest;
mod session;

use feed::FeedComposer;
use session::SessionMemory;

pub struct AppState {
    pub store: CatalogStore,
    pub composer: FeedComposer,
    pub sessions: SessionMemory,
    pub admin_token: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::api_from_env();

    let store = CatalogStore::connect(&config.database_url).await?;
    store.migrate().await?;

    let state = Arc::new(AppState {
        store: store.clone(),
        composer: FeedComposer::new(store),
        sessions: SessionMemory::new(),
        admin_token: config.admin_token.clone(),
    });

    let app = Router::new()
        // Health check
        .route("/", get(|| async { "ok" }))
        // Feed
        .route("/api/feed", get(rest::api_feed))
        .route(
            "/api/clips/{id}",
            get(rest::api_clip_detail).delete(rest::api_delete_clip),
        )
        // Moderation
        .route("/api/clips/{id}/nsfw", post(rest::api_mark_nsfw))
        .route("/api/clips/{id}/blacklist", post(rest::api_blacklist))
        .with_state(state)
        // CORS
        .layer(
            tower_http::cors::CorsLayer::new()
                .allow_origin(tower_http::cors::Any)
                .allow_methods(tower_http::cors::Any)
                .allow_headers(tower_http::cors::Any),
        )
        // Feed pages are viewer-specific: never cache
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        // Logging layer: method + path + status + latency only
        .layer(
            tower_http::trace::TraceLayer::new_for_http().make_span_with(
                |request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        path = %request.uri().path(),
                    )
                },
            ),
        );

    let addr = format!("{}:{}", config.api_host, config.api_port);
    info!("Clipharbor API starting on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
