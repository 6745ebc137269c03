use std::collections::{BTreeSet, HashMap};

/// Display names currently present, per room.
///
/// Keyed by name rather than connection: two connections sharing a name
/// count once, and evicting a name clears it from every room.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    rooms: HashMap<String, BTreeSet<String>>,
}

impl PresenceTracker {
    /// Adds `username` and returns the room's snapshot for broadcasting.
    pub fn join(&mut self, room_id: &str, username: &str) -> Vec<String> {
        let users = self.rooms.entry(room_id.to_owned()).or_default();
        users.insert(username.to_owned());
        users.iter().cloned().collect()
    }

    pub fn leave(&mut self, room_id: &str, username: &str) -> bool {
        let Some(users) = self.rooms.get_mut(room_id) else {
            return false;
        };
        let removed = users.remove(username);
        if users.is_empty() {
            self.rooms.remove(room_id);
        }
        removed
    }

    /// Sorted by name.
    pub fn snapshot(&self, room_id: &str) -> Vec<String> {
        self.rooms
            .get(room_id)
            .map(|users| users.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn rooms_with(&self, username: &str) -> Vec<String> {
        let mut rooms: Vec<String> = self
            .rooms
            .iter()
            .filter(|(_, users)| users.contains(username))
            .map(|(room_id, _)| room_id.clone())
            .collect();
        rooms.sort();
        rooms
    }

    /// Removes `username` from every room holding it and returns each
    /// affected room with its updated snapshot.
    pub fn evict(&mut self, username: &str) -> Vec<(String, Vec<String>)> {
        self.rooms_with(username)
            .into_iter()
            .map(|room_id| {
                self.leave(&room_id, username);
                let online = self.snapshot(&room_id);
                (room_id, online)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_is_idempotent() {
        let mut presence = PresenceTracker::default();
        presence.join("r1", "alice");
        presence.join("r1", "alice");
        let online = presence.join("r1", "alice");

        assert_eq!(online, vec!["alice"]);
        assert_eq!(presence.snapshot("r1"), vec!["alice"]);
    }

    #[test]
    fn snapshot_is_sorted() {
        let mut presence = PresenceTracker::default();
        presence.join("r1", "carol");
        presence.join("r1", "alice");
        presence.join("r1", "bob");

        assert_eq!(presence.snapshot("r1"), vec!["alice", "bob", "carol"]);
        assert!(presence.snapshot("nowhere").is_empty());
    }

    #[test]
    fn leave_absent_is_a_no_op() {
        let mut presence = PresenceTracker::default();
        assert!(!presence.leave("r1", "alice"));

        presence.join("r1", "alice");
        assert!(!presence.leave("r1", "bob"));
        assert!(presence.leave("r1", "alice"));
        assert!(presence.snapshot("r1").is_empty());
    }

    #[test]
    fn evict_clears_the_name_everywhere() {
        let mut presence = PresenceTracker::default();
        presence.join("r1", "alice");
        presence.join("r1", "bob");
        presence.join("r2", "alice");
        presence.join("r3", "carol");

        let affected = presence.evict("alice");

        assert_eq!(
            affected,
            vec![
                ("r1".to_owned(), vec!["bob".to_owned()]),
                ("r2".to_owned(), vec![]),
            ]
        );
        assert!(presence.rooms_with("alice").is_empty());
        assert_eq!(presence.snapshot("r3"), vec!["carol"]);
    }
}
