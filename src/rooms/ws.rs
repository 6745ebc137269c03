use axum::{
    debug_handler,
    extract::{
        State, WebSocketUpgrade,
        ws::{Message as Frame, WebSocket},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt};
use tracing::debug;

use super::{RoomCoordinator, events::ClientEvent};

#[debug_handler(state = crate::AppState)]
pub async fn room_ws(
    State(coordinator): State<RoomCoordinator>,

    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |stream| serve_connection(coordinator, stream))
}

/// Events from one socket are handled in arrival order; a post still in
/// flight when the peer hangs up completes before cleanup runs.
async fn serve_connection(coordinator: RoomCoordinator, stream: WebSocket) {
    let (connection_id, mut rx) = coordinator.connect();
    let (mut sender, mut receiver) = stream.split();

    let mut outbox_task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(json) => json,
                Err(e) => {
                    tracing::warn!(error = %e, "unencodable event");
                    continue;
                }
            };
            if sender.send(Frame::Text(json.into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Frame::Text(text))) => match serde_json::from_str::<ClientEvent>(text.as_str()) {
                    Ok(event) => coordinator.handle(connection_id, event).await,
                    Err(e) => debug!(connection = %connection_id, error = %e, "undecodable frame"),
                },
                Some(Ok(Frame::Close(_))) | None => break,
                Some(Err(e)) => {
                    debug!(connection = %connection_id, error = %e, "socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
            _ = &mut outbox_task => break,
        }
    }

    coordinator.disconnect(connection_id);
    outbox_task.abort();
}
