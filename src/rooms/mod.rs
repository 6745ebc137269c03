mod call;
mod coordinator;
mod directory;
mod events;
mod msg;
mod presence;
mod retention;
mod room;
mod store;
mod ws;

use axum::{Router, routing::get};

use crate::AppState;

pub use coordinator::RoomCoordinator;
pub use events::{
    AnswerPayload, ClientEvent, ConnectionId, DeletePayload, Delivery, IceCandidatePayload, MediaPayload,
    OfferPayload, RoomUser, ServerEvent, Target, TextPayload,
};
pub use msg::{Message, MessageType, NewMessage};
pub use retention::spawn_reaper;
pub use store::{Room, RoomStore, SqliteRoomStore};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/room/{room_id}", get(room::room))
        .route("/ws", get(ws::room_ws))
}
