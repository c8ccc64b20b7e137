//! Identity allocation and the set of joined players.
//!
//! Both structures are touched directly by session tasks, so they are safe for
//! concurrent use without going through the tick loop.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use shared::{EntityId, EntityIdSource, Player, PlayerId};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Two independent monotonically increasing counters. The first id handed out
/// by each is 1.
#[derive(Debug, Default)]
pub struct IdGen {
    players: AtomicU64,
    entities: AtomicU64,
}

impl IdGen {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_player(&self) -> PlayerId {
        self.players.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn next_entity(&self) -> u64 {
        self.entities.fetch_add(1, Ordering::Relaxed) + 1
    }
}

impl EntityIdSource for IdGen {
    fn next_entity_id(&self) -> EntityId {
        format!("u{}", self.next_entity())
    }
}

/// Authoritative set of connected players.
#[derive(Debug, Default)]
pub struct Registry {
    players: DashMap<PlayerId, Player>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false, leaving the existing entry untouched, if the id is taken.
    pub fn add(&self, player: Player) -> bool {
        match self.players.entry(player.id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(player);
                true
            }
        }
    }

    pub fn remove(&self, id: PlayerId) -> bool {
        self.players.remove(&id).is_some()
    }

    pub fn get(&self, id: PlayerId) -> Option<Player> {
        self.players.get(&id).map(|entry| entry.value().clone())
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Owned copy of the current players, ordered by id.
    pub fn snapshot(&self) -> BTreeMap<PlayerId, Player> {
        self.players
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_id_counters_are_independent() {
        let ids = IdGen::new();
        assert_eq!(ids.next_player(), 1);
        assert_eq!(ids.next_player(), 2);
        assert_eq!(ids.next_entity_id(), "u1");
        assert_eq!(ids.next_player(), 3);
        assert_eq!(ids.next_entity_id(), "u2");
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let ids = Arc::new(IdGen::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                thread::spawn(move || (0..100).map(|_| ids.next_player()).collect::<Vec<_>>())
            })
            .collect();

        let mut all: Vec<PlayerId> = handles
            .into_iter()
            .flat_map(|handle| handle.join().unwrap())
            .collect();
        all.sort_unstable();
        all.dedup();
        assert_eq!(all.len(), 800);
        assert_eq!(all.last(), Some(&800));
    }

    #[test]
    fn test_add_remove_get() {
        let registry = Registry::new();
        assert!(registry.add(Player::new(1, "Ann", "#ff0000")));
        assert_eq!(registry.get(1).unwrap().name, "Ann");

        assert!(registry.remove(1));
        assert!(registry.get(1).is_none());
        assert!(!registry.remove(1));
    }

    #[test]
    fn test_add_rejects_collision() {
        let registry = Registry::new();
        assert!(registry.add(Player::new(1, "Ann", "#ff0000")));
        assert!(!registry.add(Player::new(1, "Impostor", "#000000")));
        assert_eq!(registry.get(1).unwrap().name, "Ann");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let registry = Registry::new();
        registry.add(Player::new(1, "Ann", "#ff0000"));

        let before = registry.snapshot();
        registry.add(Player::new(2, "Bob", "#00ff00"));
        registry.remove(1);

        assert_eq!(before.len(), 1);
        assert!(before.contains_key(&1));
        assert_eq!(registry.snapshot().keys().collect::<Vec<_>>(), vec![&2]);
    }
}
