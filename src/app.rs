use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{api, auth, state::AppState, ws};

/// Assemble the HTTP and WebSocket routes
pub fn build_router(state: Arc<AppState>) -> Router {
    // Routes behind the shared secret
    let protected = Router::new()
        .route("/api/rooms", post(api::create_room))
        .route("/api/rooms/{code}", get(api::get_room))
        .route("/api/config", get(api::get_config))
        .route("/api/genres", get(api::get_genres))
        .route("/api/suggest", get(api::suggest))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::api_key_middleware,
        ));

    Router::new()
        .route("/api/health", get(api::health))
        .route("/api/covers/{content_id}/{*filename}", get(api::proxy_cover))
        .route("/ws", get(ws::ws_handler))
        .merge(protected)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
