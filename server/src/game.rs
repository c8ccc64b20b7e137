//! Authoritative game state and snapshot building.

use log::debug;
use shared::{
    Entity, EntityId, EntityIdSource, GameEvent, Model, Player, PlayerId, QueuedCommand,
    Snapshot, World,
};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Entities that changed since the previous broadcast, plus ids that vanished.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityDelta {
    pub changed: BTreeMap<EntityId, Entity>,
    pub removed: Vec<EntityId>,
}

pub struct GameState {
    model: Model,
    /// Wire view of every entity as of the last broadcast
    last_sent: BTreeMap<EntityId, Entity>,
}

impl GameState {
    pub fn new(tick_rate: u32, ids: Arc<dyn EntityIdSource>) -> Self {
        Self {
            model: Model::authoritative(tick_rate, ids),
            last_sent: BTreeMap::new(),
        }
    }

    pub fn world(&self) -> &World {
        &self.model.world
    }

    pub fn tick(&self) -> u64 {
        self.model.tick_count()
    }

    pub fn set_players(&mut self, players: BTreeMap<PlayerId, Player>) {
        self.model.world.set_players(players);
    }

    /// Advances the simulation by one tick with the commands drained for it.
    pub fn step(&mut self, commands: &[QueuedCommand], server_time: i64) -> Vec<GameEvent> {
        self.model.world.time = server_time;
        let events = self.model.tick(commands);
        for event in &events {
            match event {
                GameEvent::UnitSpawned { id, owner } => {
                    debug!("Spawned {} for {}", id, owner)
                }
                GameEvent::UnitKilled { id } => debug!("Killed {}", id),
                GameEvent::UnitArrived { id, .. } => debug!("{} arrived", id),
            }
        }
        events
    }

    /// Diffs the world against the previous broadcast and remembers the result
    /// as the new baseline.
    pub fn take_delta(&mut self) -> EntityDelta {
        let mut delta = EntityDelta::default();

        for (id, entity) in &self.model.world.entities {
            let wire = wire_view(entity);
            if self.last_sent.get(id) != Some(&wire) {
                delta.changed.insert(id.clone(), wire.clone());
                self.last_sent.insert(id.clone(), wire);
            }
        }

        let entities = &self.model.world.entities;
        self.last_sent.retain(|id, _| {
            let alive = entities.contains_key(id);
            if !alive {
                delta.removed.push(id.clone());
            }
            alive
        });

        delta
    }

    /// Snapshot with every entity, for clients that just joined.
    pub fn full_snapshot(&self, last_acknowledged_sequence: u32) -> Snapshot {
        Snapshot {
            server_time: self.model.world.time,
            last_acknowledged_sequence,
            full: true,
            players: self.model.world.players.clone(),
            entities: self
                .model
                .world
                .entities
                .iter()
                .map(|(id, entity)| (id.clone(), wire_view(entity)))
                .collect(),
            removed: Vec::new(),
        }
    }

    pub fn delta_snapshot(&self, delta: &EntityDelta, last_acknowledged_sequence: u32) -> Snapshot {
        Snapshot {
            server_time: self.model.world.time,
            last_acknowledged_sequence,
            full: false,
            players: self.model.world.players.clone(),
            entities: delta.changed.clone(),
            removed: delta.removed.clone(),
        }
    }
}

fn wire_view(entity: &Entity) -> Entity {
    let mut wire = entity.clone();
    wire.previous_position = None;
    wire.resync_order = None;
    wire
}
