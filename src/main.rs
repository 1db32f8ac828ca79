use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use quizroom::{
    app,
    config::Settings,
    pool::ContentPool,
    state::{spawn_idle_room_sweeper, AppState},
};

#[tokio::main]
async fn main() {
    // Load .env file if present (before any env var reads)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist, only log if it's a different issue
        if !matches!(e, dotenvy::Error::Io(_)) {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "quizroom=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting quiz room server...");

    let settings = Settings::from_env();
    if settings.uses_default_secret() {
        tracing::warn!("API_SECRET_KEY is not set - using the default shared secret!");
    }

    let pool = match ContentPool::load(&settings.pool_path) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("{}. Games cannot start until the pool is fixed.", e);
            ContentPool::default()
        }
    };

    let addr = settings.bind_addr.clone();
    let state = Arc::new(AppState::new(settings, pool));

    // Delete rooms that were created but never joined
    spawn_idle_room_sweeper(state.clone());
    let app = app::build_router(state);

    tracing::info!("Listening on http://{}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
