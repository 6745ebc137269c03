use std::sync::Arc;

use axum::{Router, http::HeaderValue};
use huddle::{AppState, Config, RoomCoordinator, blobs, db, rooms};
use sqlx::sqlite::SqlitePoolOptions;
use tower_http::cors::{Any, CorsLayer};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "huddle=info".into()))
        .init();

    let config = Config::from_env()?;

    let db_pool = SqlitePoolOptions::new()
        .max_connections(16)
        .connect(&config.database_url)
        .await?;
    db::init_schema(&db_pool).await?;
    tracing::info!("room store ready");

    let store = Arc::new(rooms::SqliteRoomStore::new(db_pool.clone()));
    rooms::spawn_reaper(store.clone(), config.room_retention, config.reaper_interval);

    let app_state = AppState {
        db_pool,
        coordinator: RoomCoordinator::new(store),
    };

    let cors = CorsLayer::new()
        .allow_origin(config.frontend_url.parse::<HeaderValue>()?)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .merge(rooms::router())
        .merge(blobs::router())

        .with_state(app_state)
        .layer(cors);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("listening on {addr}");
    axum::serve(listener, app).await?;
    Ok(())
}
