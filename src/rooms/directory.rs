use std::collections::HashMap;

use super::events::ConnectionId;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Membership {
    pub room_id: String,
    pub username: String,
}

/// Last room and name each live connection joined with.
#[derive(Debug, Default)]
pub struct ConnectionDirectory {
    entries: HashMap<ConnectionId, Membership>,
}

impl ConnectionDirectory {
    /// Overwrites any earlier join; returns what it replaced.
    pub fn remember(&mut self, connection_id: ConnectionId, room_id: &str, username: &str) -> Option<Membership> {
        self.entries.insert(
            connection_id,
            Membership {
                room_id: room_id.to_owned(),
                username: username.to_owned(),
            },
        )
    }

    pub fn forget(&mut self, connection_id: ConnectionId) -> Option<Membership> {
        self.entries.remove(&connection_id)
    }

    pub fn members_of<'a>(&'a self, room_id: &'a str) -> impl Iterator<Item = ConnectionId> + 'a {
        self.entries
            .iter()
            .filter(move |(_, membership)| membership.room_id == room_id)
            .map(|(connection_id, _)| *connection_id)
    }
}
