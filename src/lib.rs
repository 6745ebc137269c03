pub mod appresult;
pub mod blobs;
pub mod config;
pub mod db;
pub mod error;
pub mod rooms;

use axum::extract::FromRef;
use sqlx::SqlitePool;

pub use appresult::{AppError, AppResult};
pub use config::Config;
pub use error::{RelayError, RelayResult};
pub use rooms::RoomCoordinator;

#[derive(Clone, FromRef)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub coordinator: RoomCoordinator,
}
