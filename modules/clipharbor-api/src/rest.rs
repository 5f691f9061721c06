use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{ConnectInfo, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Json},
};
use serde::Deserialize;
use tracing::warn;
use uuid::Uuid;

use clipharbor_catalog::EntrySort;

use crate::feed::FeedParams;
use crate::session;
use crate::AppState;

// --- Query structs ---

#[derive(Deserialize)]
pub struct FeedQuery {
    limit: Option<i64>,
    offset: Option<i64>,
    sort: Option<String>,
    source: Option<String>,
    platform: Option<String>,
    q: Option<String>,
    nsfw: Option<bool>,
    lang: Option<String>,
    window_hours: Option<i64>,
}

#[derive(Deserialize)]
pub struct NsfwBody {
    nsfw: bool,
}

// --- Helpers ---

/// Compose the viewer fingerprint from network and client signals.
/// Proxied deployments put the real client in x-forwarded-for.
fn viewer_fingerprint(headers: &HeaderMap, addr: &SocketAddr) -> String {
    let ip = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| addr.ip().to_string());
    let user_agent = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    let locale = headers
        .get(header::ACCEPT_LANGUAGE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    session::fingerprint(&[&ip, user_agent, locale])
}

fn authorized(headers: &HeaderMap, admin_token: &str) -> bool {
    let presented = headers
        .get("x-admin-token")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");
    !admin_token.is_empty() && constant_time_eq(presented.as_bytes(), admin_token.as_bytes())
}

/// Constant-time comparison to prevent timing attacks.
pub fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

// --- Handlers ---

pub async fn api_feed(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Query(params): Query<FeedQuery>,
) -> impl IntoResponse {
    let limit = params.limit.unwrap_or(24).clamp(1, 100);
    let offset = params.offset.unwrap_or(0).max(0);

    let feed_params = FeedParams {
        limit,
        offset,
        sort: params.sort.as_deref().and_then(EntrySort::parse),
        source: params.source,
        platform: params.platform,
        search: params.q,
        include_nsfw: params.nsfw.unwrap_or(false),
        language: params.lang,
        trending_hours: params.window_hours,
    };

    let fingerprint = viewer_fingerprint(&headers, &addr);
    let exclude = state.sessions.recent(&fingerprint);

    match state.composer.compose(&feed_params, &exclude).await {
        Ok(page) => {
            let served: Vec<Uuid> = page.items.iter().map(|i| i.entry.id).collect();
            state.sessions.remember(&fingerprint, &served);

            Json(serde_json::json!({
                "items": page.items,
                "total": page.total,
                "limit": limit,
                "offset": offset,
                "has_more": offset + (page.items.len() as i64) < page.total,
            }))
            .into_response()
        }
        Err(e) => {
            warn!(error = %e, "Feed composition failed");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_clip_detail(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let uuid = match Uuid::parse_str(&id) {
        Ok(u) => u,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    match state.store.get(uuid).await {
        Ok(Some(entry)) if !entry.blacklisted => {
            Json(serde_json::json!({ "clip": entry })).into_response()
        }
        Ok(_) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(error = %e, "Failed to load clip detail");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_mark_nsfw(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Json(body): Json<NsfwBody>,
) -> impl IntoResponse {
    if !authorized(&headers, &state.admin_token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let uuid = match Uuid::parse_str(&id) {
        Ok(u) => u,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    match state.store.mark_nsfw(uuid, body.nsfw).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(id = %uuid, error = %e, "Failed to mark nsfw");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_blacklist(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&headers, &state.admin_token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let uuid = match Uuid::parse_str(&id) {
        Ok(u) => u,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    match state.store.set_blacklisted(uuid, true).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(id = %uuid, error = %e, "Failed to blacklist");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}

pub async fn api_delete_clip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if !authorized(&headers, &state.admin_token) {
        return StatusCode::UNAUTHORIZED.into_response();
    }
    let uuid = match Uuid::parse_str(&id) {
        Ok(u) => u,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    };

    match state.store.delete(uuid).await {
        Ok(true) => StatusCode::NO_CONTENT.into_response(),
        Ok(false) => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(id = %uuid, error = %e, "Failed to delete clip");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
