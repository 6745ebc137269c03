//! Websocket wire protocol and the delivery descriptions handlers produce.
//!
//! Every frame is `{"event": <name>, "data": <payload>}`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::msg::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomUser {
    pub room_id: String,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPayload {
    pub room_id: String,
    pub username: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaPayload {
    pub room_id: String,
    pub username: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletePayload {
    pub room_id: String,
    pub message_id: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct OfferPayload {
    pub to: ConnectionId,
    pub offer: Value,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AnswerPayload {
    pub to: ConnectionId,
    pub answer: Value,
    #[serde(default)]
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct IceCandidatePayload {
    pub to: ConnectionId,
    pub candidate: Value,
}

/// Inbound events, one per client frame.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientEvent {
    JoinRoom(RoomUser),
    SendMessage(TextPayload),
    SendVoiceMessage(MediaPayload),
    SendImageMessage(MediaPayload),
    DeleteMessage(DeletePayload),
    JoinCall(RoomUser),
    LeaveCall(RoomUser),
    Offer(OfferPayload),
    Answer(AnswerPayload),
    IceCandidate(IceCandidatePayload),
}

impl ClientEvent {
    pub fn name(&self) -> &'static str {
        use ClientEvent::*;
        match self {
            JoinRoom(_) => "join_room",
            SendMessage(_) => "send_message",
            SendVoiceMessage(_) => "send_voice_message",
            SendImageMessage(_) => "send_image_message",
            DeleteMessage(_) => "delete_message",
            JoinCall(_) => "join_call",
            LeaveCall(_) => "leave_call",
            Offer(_) => "offer",
            Answer(_) => "answer",
            IceCandidate(_) => "ice_candidate",
        }
    }
}

/// Outbound events.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    Connected {
        connection_id: ConnectionId,
    },
    OnlineUsers(Vec<String>),
    ReceiveMessage(Message),
    ReceiveVoiceMessage(Message),
    ReceiveImageMessage(Message),
    MessageDeleted {
        message_id: String,
    },
    CallNotification(Message),
    CallEndedNotification(Message),
    UserJoinedCall {
        connection_id: ConnectionId,
        username: String,
    },
    UserLeftCall {
        connection_id: ConnectionId,
    },
    Offer {
        from: ConnectionId,
        offer: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    Answer {
        from: ConnectionId,
        answer: Value,
        #[serde(skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },
    IceCandidate {
        from: ConnectionId,
        candidate: Value,
    },
}

/// Who receives a delivery. Room membership is whatever the connection
/// directory says at dispatch time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    Room(String),
    RoomExcept(String, ConnectionId),
    Connection(ConnectionId),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub target: Target,
    pub event: ServerEvent,
}

impl Delivery {
    pub fn room(room_id: &str, event: ServerEvent) -> Self {
        Self { target: Target::Room(room_id.to_owned()), event }
    }

    pub fn room_except(room_id: &str, except: ConnectionId, event: ServerEvent) -> Self {
        Self { target: Target::RoomExcept(room_id.to_owned(), except), event }
    }

    pub fn to(connection_id: ConnectionId, event: ServerEvent) -> Self {
        Self { target: Target::Connection(connection_id), event }
    }
}
