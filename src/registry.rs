use std::collections::HashMap;

use rand::Rng;

use crate::session::{Removal, Session};
use crate::types::Player;

const CODE_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

fn create_game_code() -> String {
    let mut rng = rand::rng();
    (0..CODE_LEN)
        .map(|_| char::from(CODE_ALPHABET[rng.random_range(0..CODE_ALPHABET.len())]))
        .collect()
}

/// All live sessions, plus a connection id -> code index kept in step with
/// every roster change.
#[derive(Debug, Default)]
pub struct Registry {
    sessions: HashMap<String, Session>,
    by_connection: HashMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Creates a waiting session hosted by `host` and returns its code.
    pub fn create(&mut self, host: Player) -> String {
        let code = loop {
            let candidate = create_game_code();
            if !self.sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        self.insert(Session::new(code.clone(), host));
        code
    }

    fn insert(&mut self, session: Session) {
        for player in session.players() {
            self.by_connection
                .insert(player.id.clone(), session.code().to_string());
        }
        self.sessions.insert(session.code().to_string(), session);
    }

    pub fn get(&self, code: &str) -> Option<&Session> {
        self.sessions.get(code)
    }

    pub fn get_mut(&mut self, code: &str) -> Option<&mut Session> {
        self.sessions.get_mut(code)
    }

    /// Code of the session the connection plays in, if any.
    pub fn find_by_player(&self, connection_id: &str) -> Option<&str> {
        self.by_connection.get(connection_id).map(String::as_str)
    }

    pub fn add_player(&mut self, code: &str, player: Player) -> bool {
        let Some(session) = self.sessions.get_mut(code) else {
            return false;
        };
        self.by_connection.insert(player.id.clone(), code.to_string());
        session.add_player(player);
        true
    }

    /// Removes a player from their session. A session left with no players
    /// is deleted before this returns.
    pub fn remove_player(&mut self, connection_id: &str) -> Option<(String, Removal)> {
        let code = self.by_connection.remove(connection_id)?;
        let removal = self.sessions.get_mut(&code)?.remove_player(connection_id)?;
        if removal.remaining == 0 {
            self.delete(&code);
        }
        Some((code, removal))
    }

    /// Removes the session, cancelling its pending timer first.
    pub fn delete(&mut self, code: &str) -> Option<Session> {
        let mut session = self.sessions.remove(code)?;
        session.cancel_timer();
        for player in session.players() {
            self.by_connection.remove(&player.id);
        }
        tracing::info!("Game {} deleted", code);
        Some(session)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_short_and_lowercase() {
        for _ in 0..100 {
            let code = create_game_code();
            assert_eq!(code.len(), CODE_LEN);
            assert!(code.bytes().all(|b| CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn create_then_join_preserves_call_order() {
        let mut registry = Registry::new();
        let code = registry.create(Player::new("a", "Alice"));
        assert!(registry.add_player(&code, Player::new("b", "Bob")));
        assert!(registry.add_player(&code, Player::new("c", "Carol")));

        let names: Vec<&str> = registry
            .get(&code)
            .unwrap()
            .players()
            .iter()
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(names, vec!["Alice", "Bob", "Carol"]);
        assert_eq!(registry.find_by_player("c"), Some(code.as_str()));
    }

    #[test]
    fn codes_are_unique_across_sessions() {
        let mut registry = Registry::new();
        for i in 0..200 {
            registry.create(Player::new(format!("host-{i}"), "Host"));
        }
        assert_eq!(registry.len(), 200);
    }

    #[test]
    fn removing_last_player_deletes_session() {
        let mut registry = Registry::new();
        let code = registry.create(Player::new("a", "Alice"));

        let (removed_from, removal) = registry.remove_player("a").unwrap();
        assert_eq!(removed_from, code);
        assert_eq!(removal.remaining, 0);
        assert!(registry.get(&code).is_none());
        assert!(registry.find_by_player("a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn removing_unknown_connection_is_noop() {
        let mut registry = Registry::new();
        let code = registry.create(Player::new("a", "Alice"));
        assert!(registry.remove_player("ghost").is_none());
        assert_eq!(registry.get(&code).unwrap().players().len(), 1);
    }

    #[test]
    fn delete_clears_connection_index() {
        let mut registry = Registry::new();
        let code = registry.create(Player::new("a", "Alice"));
        registry.add_player(&code, Player::new("b", "Bob"));

        assert!(registry.delete(&code).is_some());
        assert!(registry.find_by_player("a").is_none());
        assert!(registry.find_by_player("b").is_none());
        assert!(registry.delete(&code).is_none());
    }
}
