use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqlitePool;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{RelayError, RelayResult};

use super::msg::{Message, NewMessage};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub room_id: String,
    pub messages: Vec<Message>,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
}

/// Durable per-room message log.
///
/// Implementations must tolerate concurrent use across rooms; ordering is
/// only promised within one room.
#[async_trait]
pub trait RoomStore: Send + Sync {
    /// Returns the room, creating an empty one on first reference.
    async fn find_or_create(&self, room_id: &str) -> RelayResult<Room>;

    /// Persists `draft`, assigning its identifier and timestamp, and bumps
    /// the room's last activity.
    async fn append(&self, room_id: &str, draft: NewMessage) -> RelayResult<Message>;

    /// Returns `false` when nothing matched.
    async fn remove_message(&self, room_id: &str, message_id: &str) -> RelayResult<bool>;

    /// Messages in insertion order.
    async fn messages(&self, room_id: &str) -> RelayResult<Vec<Message>>;

    /// Drops rooms idle since before `cutoff`, with their messages.
    async fn purge_inactive(&self, cutoff: OffsetDateTime) -> RelayResult<u64>;
}

pub(crate) fn to_millis(at: OffsetDateTime) -> i64 {
    (at.unix_timestamp_nanos() / 1_000_000) as i64
}

pub(crate) fn from_millis(millis: i64) -> RelayResult<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(millis as i128 * 1_000_000)
        .map_err(|e| RelayError::Corrupt(format!("timestamp {millis}: {e}")))
}

/// Truncated to what the database keeps, so a freshly appended message
/// compares equal to the one read back later.
fn now() -> OffsetDateTime {
    from_millis(to_millis(OffsetDateTime::now_utc())).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}

type MessageRow = (String, String, String, String, Option<String>, Option<String>, i64);

fn message_from_row(
    (id, username, message, kind, url, call_initiator, created_at): MessageRow,
) -> RelayResult<Message> {
    Ok(Message {
        id: Uuid::parse_str(&id).map_err(|e| RelayError::Corrupt(format!("message id {id}: {e}")))?,
        username,
        message,
        kind: kind.parse()?,
        url,
        call_initiator,
        created_at: from_millis(created_at)?,
    })
}

#[derive(Clone)]
pub struct SqliteRoomStore {
    db_pool: SqlitePool,
}

impl SqliteRoomStore {
    pub fn new(db_pool: SqlitePool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl RoomStore for SqliteRoomStore {
    async fn find_or_create(&self, room_id: &str) -> RelayResult<Room> {
        sqlx::query("INSERT INTO rooms (room_id,last_activity) VALUES (?,?) ON CONFLICT(room_id) DO NOTHING")
            .bind(room_id)
            .bind(to_millis(now()))
            .execute(&self.db_pool)
            .await?;

        let (last_activity,): (i64,) = sqlx::query_as("SELECT last_activity FROM rooms WHERE room_id=?")
            .bind(room_id)
            .fetch_one(&self.db_pool)
            .await?;

        Ok(Room {
            room_id: room_id.to_owned(),
            messages: self.messages(room_id).await?,
            last_activity: from_millis(last_activity)?,
        })
    }

    async fn append(&self, room_id: &str, draft: NewMessage) -> RelayResult<Message> {
        let message = Message {
            id: Uuid::now_v7(),
            username: draft.username,
            message: draft.message,
            kind: draft.kind,
            url: draft.url,
            call_initiator: draft.call_initiator,
            created_at: now(),
        };
        let at = to_millis(message.created_at);

        let mut tx = self.db_pool.begin().await?;
        sqlx::query(
            "INSERT INTO rooms (room_id,last_activity) VALUES (?,?) \
             ON CONFLICT(room_id) DO UPDATE SET last_activity=excluded.last_activity",
        )
            .bind(room_id)
            .bind(at)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            "INSERT INTO messages (id,room_id,username,message,type,url,call_initiator,created_at) \
             VALUES (?,?,?,?,?,?,?,?)",
        )
            .bind(message.id.to_string())
            .bind(room_id)
            .bind(&message.username)
            .bind(&message.message)
            .bind(message.kind.as_str())
            .bind(message.url.as_deref())
            .bind(message.call_initiator.as_deref())
            .bind(at)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(message)
    }

    async fn remove_message(&self, room_id: &str, message_id: &str) -> RelayResult<bool> {
        let mut tx = self.db_pool.begin().await?;
        let removed = sqlx::query("DELETE FROM messages WHERE id=? AND room_id=?")
            .bind(message_id)
            .bind(room_id)
            .execute(&mut *tx)
            .await?
            .rows_affected() > 0;

        if removed {
            sqlx::query("UPDATE rooms SET last_activity=? WHERE room_id=?")
                .bind(to_millis(now()))
                .bind(room_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await?;

        Ok(removed)
    }

    async fn messages(&self, room_id: &str) -> RelayResult<Vec<Message>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT id,username,message,type,url,call_initiator,created_at \
             FROM messages WHERE room_id=? ORDER BY seq",
        )
            .bind(room_id)
            .fetch_all(&self.db_pool)
            .await?;

        rows.into_iter().map(message_from_row).collect()
    }

    async fn purge_inactive(&self, cutoff: OffsetDateTime) -> RelayResult<u64> {
        let cutoff = to_millis(cutoff);

        let mut tx = self.db_pool.begin().await?;
        sqlx::query("DELETE FROM messages WHERE room_id IN (SELECT room_id FROM rooms WHERE last_activity<?)")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?;
        let purged = sqlx::query("DELETE FROM rooms WHERE last_activity<?")
            .bind(cutoff)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        tx.commit().await?;

        Ok(purged)
    }
}


#[cfg(test)]
mod tests {
    use time::Duration;

    use super::*;
    use crate::{db, rooms::msg::MessageType};

    async fn store() -> SqliteRoomStore {
        SqliteRoomStore::new(db::memory_pool().await.unwrap())
    }

    #[tokio::test]
    async fn first_reference_creates_an_empty_room() {
        let store = store().await;
        let room = store.find_or_create("r1").await.unwrap();
        assert_eq!(room.room_id, "r1");
        assert!(room.messages.is_empty());

        let again = store.find_or_create("r1").await.unwrap();
        assert_eq!(again.last_activity, room.last_activity);
    }

    #[tokio::test]
    async fn append_assigns_identity_and_keeps_order() {
        let store = store().await;
        let first = store.append("r1", NewMessage::text("alice", "one".to_owned())).await.unwrap();
        let second = store.append("r1", NewMessage::image("bob", "/img".to_owned())).await.unwrap();
        store.append("r2", NewMessage::text("carol", "elsewhere".to_owned())).await.unwrap();

        assert_ne!(first.id, second.id);
        assert_eq!(store.messages("r1").await.unwrap(), vec![first.clone(), second.clone()]);

        let room = store.find_or_create("r1").await.unwrap();
        assert_eq!(room.last_activity, second.created_at);
        assert_eq!(room.messages[1].kind, MessageType::Image);
        assert_eq!(room.messages[1].url.as_deref(), Some("/img"));
    }

    #[tokio::test]
    async fn remove_is_scoped_to_the_room() {
        let store = store().await;
        let msg = store.append("r1", NewMessage::text("alice", "hi".to_owned())).await.unwrap();
        let id = msg.id.to_string();

        assert!(!store.remove_message("r2", &id).await.unwrap());
        assert!(store.remove_message("r1", &id).await.unwrap());
        assert!(!store.remove_message("r1", &id).await.unwrap());
        assert!(!store.remove_message("r1", "not-a-uuid").await.unwrap());
        assert!(store.messages("r1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn call_notices_keep_their_initiator() {
        let store = store().await;
        let notice = store.append("r1", NewMessage::call_notification("bob")).await.unwrap();
        let stored = store.messages("r1").await.unwrap();
        assert_eq!(stored, vec![notice]);
        assert_eq!(stored[0].username, "System");
        assert_eq!(stored[0].call_initiator.as_deref(), Some("bob"));
    }

    #[tokio::test]
    async fn purge_drops_only_idle_rooms() {
        let store = store().await;
        store.append("old", NewMessage::text("alice", "ancient".to_owned())).await.unwrap();
        sqlx::query("UPDATE rooms SET last_activity=? WHERE room_id='old'")
            .bind(to_millis(OffsetDateTime::now_utc() - Duration::days(31)))
            .execute(&store.db_pool)
            .await
            .unwrap();
        store.append("fresh", NewMessage::text("bob", "recent".to_owned())).await.unwrap();

        let purged = store
            .purge_inactive(OffsetDateTime::now_utc() - Duration::days(30))
            .await
            .unwrap();
        assert_eq!(purged, 1);
        assert!(store.messages("old").await.unwrap().is_empty());
        assert_eq!(store.messages("fresh").await.unwrap().len(), 1);
    }
}
