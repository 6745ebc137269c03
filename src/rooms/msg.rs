use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{RelayError, RelayResult};

use super::{
    events::{ConnectionId, Delivery, ServerEvent},
    store::RoomStore,
};

pub(crate) const SYSTEM_USERNAME: &str = "System";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Voice,
    Image,
    CallNotification,
    CallEnded,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        use MessageType::*;
        match self {
            Text => "text",
            Voice => "voice",
            Image => "image",
            CallNotification => "call_notification",
            CallEnded => "call_ended",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageType {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use MessageType::*;
        Ok(match s {
            "text" => Text,
            "voice" => Voice,
            "image" => Image,
            "call_notification" => CallNotification,
            "call_ended" => CallEnded,
            other => return Err(RelayError::Corrupt(format!("unknown message type {other:?}"))),
        })
    }
}

/// A message as the room store persisted it. Only this form is ever broadcast.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: Uuid,
    pub username: String,
    pub message: String,
    #[serde(rename = "type")]
    pub kind: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_initiator: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Draft handed to the store; it has no identifier until persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub username: String,
    pub message: String,
    pub kind: MessageType,
    pub url: Option<String>,
    pub call_initiator: Option<String>,
}

impl NewMessage {
    pub fn text(username: &str, message: String) -> Self {
        Self {
            username: username.to_owned(),
            message,
            kind: MessageType::Text,
            url: None,
            call_initiator: None,
        }
    }

    pub fn voice(username: &str, url: String) -> Self {
        Self {
            username: username.to_owned(),
            message: "Voice message".to_owned(),
            kind: MessageType::Voice,
            url: Some(url),
            call_initiator: None,
        }
    }

    pub fn image(username: &str, url: String) -> Self {
        Self {
            username: username.to_owned(),
            message: "Image message".to_owned(),
            kind: MessageType::Image,
            url: Some(url),
            call_initiator: None,
        }
    }

    pub fn call_notification(initiator: &str) -> Self {
        Self {
            username: SYSTEM_USERNAME.to_owned(),
            message: format!("{initiator} started a call"),
            kind: MessageType::CallNotification,
            url: None,
            call_initiator: Some(initiator.to_owned()),
        }
    }

    pub fn call_ended(username: &str) -> Self {
        Self {
            username: SYSTEM_USERNAME.to_owned(),
            message: format!("{username} left the call"),
            kind: MessageType::CallEnded,
            url: None,
            call_initiator: Some(username.to_owned()),
        }
    }
}

pub(crate) async fn post_text(
    store: &dyn RoomStore,
    room_id: &str,
    username: &str,
    message: String,
) -> RelayResult<Vec<Delivery>> {
    let persisted = store.append(room_id, NewMessage::text(username, message)).await?;
    Ok(vec![Delivery::room(room_id, ServerEvent::ReceiveMessage(persisted))])
}

pub(crate) async fn post_voice(
    store: &dyn RoomStore,
    room_id: &str,
    username: &str,
    url: String,
) -> RelayResult<Vec<Delivery>> {
    let persisted = store.append(room_id, NewMessage::voice(username, url)).await?;
    Ok(vec![Delivery::room(room_id, ServerEvent::ReceiveVoiceMessage(persisted))])
}

/// Images go out twice: once to the rest of the room, once back to the sender.
/// The sender is excluded from the first so nobody gets two copies.
pub(crate) async fn post_image(
    store: &dyn RoomStore,
    from: ConnectionId,
    room_id: &str,
    username: &str,
    url: String,
) -> RelayResult<Vec<Delivery>> {
    let persisted = store.append(room_id, NewMessage::image(username, url)).await?;
    Ok(vec![
        Delivery::room_except(room_id, from, ServerEvent::ReceiveImageMessage(persisted.clone())),
        Delivery::to(from, ServerEvent::ReceiveImageMessage(persisted)),
    ])
}

/// Removing an absent message still announces the deletion.
pub(crate) async fn delete_message(
    store: &dyn RoomStore,
    room_id: &str,
    message_id: String,
) -> RelayResult<Vec<Delivery>> {
    if !store.remove_message(room_id, &message_id).await? {
        tracing::debug!(room = room_id, message = %message_id, "delete target absent");
    }
    Ok(vec![Delivery::room(room_id, ServerEvent::MessageDeleted { message_id })])
}
