use axum::{
    Json, debug_handler,
    extract::{Path, State},
};

use crate::AppResult;

use super::{RoomCoordinator, store::Room};

/// Creates the room on first reference.
#[debug_handler(state = crate::AppState)]
pub(crate) async fn room(
    State(coordinator): State<RoomCoordinator>,
    Path(room_id): Path<String>,
) -> AppResult<Json<Room>> {
    Ok(Json(coordinator.store().find_or_create(&room_id).await?))
}
