//! HTTP API endpoints.
//!
//! Room creation and lookup, creation defaults, and the read-only content
//! helpers (genres, title suggestions, cover images) used by the lobby UI.

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

use crate::config::{
    CreateRoomOptions, PLAYERS_RANGE, POINTS_RANGE, POOL_SIZE_RANGE, ROUNDS_RANGE, SECONDS_RANGE,
};
use crate::error::RoomError;
use crate::state::AppState;
use crate::types::{Phase, RoomCode, RoomConfig};

const DEFAULT_SUGGESTIONS: usize = 10;
const MAX_SUGGESTIONS: usize = 20;
const COVER_CACHE_CONTROL: &str = "public, max-age=86400";

/// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub room_code: RoomCode,
    pub owner_token: String,
}

/// Create a room.
///
/// POST /api/rooms
///
/// The body is optional; an empty body creates a room with the server defaults.
pub async fn create_room(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<CreateRoomResponse>, RoomError> {
    let options = if body.iter().all(u8::is_ascii_whitespace) {
        CreateRoomOptions::default()
    } else {
        serde_json::from_slice::<CreateRoomOptions>(&body)
            .map_err(|e| RoomError::InvalidConfig(e.to_string()))?
    };

    let (code, config) = options.resolve(&state.settings.room_defaults)?;
    let (room_code, owner_token) = state.create_room(code, config).await?;
    Ok(Json(CreateRoomResponse {
        room_code,
        owner_token,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RoomLookupResponse {
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub player_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_players: Option<usize>,
}

/// Check whether a room exists.
///
/// GET /api/rooms/{code}
pub async fn get_room(
    State(state): State<Arc<AppState>>,
    Path(code): Path<String>,
) -> Json<RoomLookupResponse> {
    let response = match state.snapshot(&code).await {
        Ok(view) => RoomLookupResponse {
            exists: true,
            phase: Some(view.phase),
            player_count: Some(view.players.len()),
            max_players: Some(view.max_players),
        },
        Err(_) => RoomLookupResponse {
            exists: false,
            phase: None,
            player_count: None,
            max_players: None,
        },
    };
    Json(response)
}

#[derive(Debug, Serialize)]
pub struct Limits {
    pub rounds_total: [u32; 2],
    pub seconds_per_round: [u32; 2],
    pub max_players: [usize; 2],
    pub points: [u32; 2],
    pub pool_size: [usize; 2],
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub defaults: RoomConfig,
    pub limits: Limits,
    pub pool_size: usize,
}

/// Room creation defaults and limits.
///
/// GET /api/config
pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<ConfigResponse> {
    Json(ConfigResponse {
        defaults: state.settings.room_defaults.clone(),
        limits: Limits {
            rounds_total: [*ROUNDS_RANGE.start(), *ROUNDS_RANGE.end()],
            seconds_per_round: [*SECONDS_RANGE.start(), *SECONDS_RANGE.end()],
            max_players: [*PLAYERS_RANGE.start(), *PLAYERS_RANGE.end()],
            points: [*POINTS_RANGE.start(), *POINTS_RANGE.end()],
            pool_size: [*POOL_SIZE_RANGE.start(), *POOL_SIZE_RANGE.end()],
        },
        pool_size: state.pool.len(),
    })
}

/// GET /api/genres
pub async fn get_genres(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({ "genres": state.pool.genres() }))
}

#[derive(Debug, Deserialize)]
pub struct SuggestQuery {
    #[serde(default)]
    pub q: String,
    pub limit: Option<usize>,
    pub room_code: Option<String>,
}

/// Autocomplete titles for answer input.
///
/// GET /api/suggest?q=&limit=&room_code=
///
/// Returns nothing for rooms that turned suggestions off.
pub async fn suggest(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SuggestQuery>,
) -> Json<serde_json::Value> {
    let limit = params
        .limit
        .unwrap_or(DEFAULT_SUGGESTIONS)
        .clamp(1, MAX_SUGGESTIONS);

    let enabled = match params.room_code.as_deref().filter(|c| !c.trim().is_empty()) {
        Some(code) => state
            .snapshot(code)
            .await
            .map(|view| view.suggestions_enabled)
            .unwrap_or(true),
        None => true,
    };

    let suggestions = if enabled {
        state.titles.suggest(&params.q, limit)
    } else {
        Vec::new()
    };
    Json(json!({ "suggestions": suggestions }))
}

/// Proxy a cover image from the catalog CDN.
///
/// GET /api/covers/{content_id}/{*filename}
pub async fn proxy_cover(
    State(state): State<Arc<AppState>>,
    Path((content_id, filename)): Path<(String, String)>,
) -> Response {
    if [content_id.as_str(), filename.as_str()]
        .iter()
        .any(|part| part.split('/').any(|seg| seg == ".." || seg.is_empty()))
    {
        return StatusCode::BAD_REQUEST.into_response();
    }

    let url = format!("{}/{}/{}", state.settings.cover_base_url, content_id, filename);
    let upstream = match state.http.get(&url).send().await.and_then(|r| r.error_for_status()) {
        Ok(resp) => resp,
        Err(e) => {
            tracing::error!("Cover fetch failed for {}: {}", url, e);
            return StatusCode::BAD_GATEWAY.into_response();
        }
    };

    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("image/jpeg")
        .to_string();

    match upstream.bytes().await {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, content_type),
                (header::CACHE_CONTROL, COVER_CACHE_CONTROL.to_string()),
            ],
            bytes,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Cover body read failed for {}: {}", url, e);
            StatusCode::BAD_GATEWAY.into_response()
        }
    }
}
