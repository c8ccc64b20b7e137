use std::collections::BTreeMap;

use crate::entity::{Entity, EntityId, Owner, Player, PlayerId};
use crate::protocol::Snapshot;

/// Snapshot of everything the simulation knows: players, entities and the last
/// authoritative clock reading.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct World {
    pub time: i64,
    pub my_id: Option<PlayerId>,
    pub players: BTreeMap<PlayerId, Player>,
    pub entities: BTreeMap<EntityId, Entity>,
}

impl World {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a fresh world from an authoritative snapshot.
    pub fn from_snapshot(snapshot: &Snapshot) -> Self {
        let mut world = World::new();
        world.apply_snapshot(snapshot);
        world
    }

    pub fn set_players(&mut self, players: BTreeMap<PlayerId, Player>) {
        self.players = players;
    }

    pub fn upsert_player(&mut self, player: Player) {
        self.players.insert(player.id, player);
    }

    pub fn remove_player(&mut self, id: PlayerId) -> Option<Player> {
        self.players.remove(&id)
    }

    pub fn my_player(&self) -> Option<&Player> {
        self.my_id.and_then(|id| self.players.get(&id))
    }

    /// Inserts or replaces an entity. Returns true if the id was new.
    pub fn upsert_entity(&mut self, mut entity: Entity) -> bool {
        entity.selectable = entity.kind.is_selectable();
        self.entities.insert(entity.id.clone(), entity).is_none()
    }

    pub fn remove_entity(&mut self, id: &str) -> Option<Entity> {
        self.entities.remove(id)
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn entity_mut(&mut self, id: &str) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    pub fn entities_by_owner(&self, owner: Owner) -> impl Iterator<Item = &Entity> {
        self.entities.values().filter(move |e| e.owner == owner)
    }

    /// Merges an authoritative snapshot wholesale.
    ///
    /// Supplied entities replace local ones, ids in `removed` are dropped and a
    /// full snapshot additionally drops every entity it does not mention.
    pub fn apply_snapshot(&mut self, snapshot: &Snapshot) {
        self.time = snapshot.server_time;
        self.players = snapshot.players.clone();

        for entity in snapshot.entities.values() {
            self.upsert_entity(entity.clone());
        }
        for id in &snapshot.removed {
            self.entities.remove(id);
        }
        if snapshot.full {
            self.entities
                .retain(|id, _| snapshot.entities.contains_key(id));
        }
    }

    pub fn clear(&mut self) {
        self.time = 0;
        self.players.clear();
        self.entities.clear();
    }
}
