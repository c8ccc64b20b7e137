//! Ordered simulation systems.
//!
//! A tick runs [`lifecycle`], then [`orders`], then [`movement`]. Commands
//! that name an entity which does not exist are skipped without an event.

use log::debug;
use std::sync::Arc;

use crate::command::{Command, MoveMode, QueuedCommand};
use crate::entity::{EntityId, EntitySpec, Order, Owner, PlayerId, ResyncOrder, Vec2};
use crate::events::{EventBus, GameEvent};
use crate::world::World;

/// Source of authoritative entity ids.
pub trait EntityIdSource: Send + Sync {
    fn next_entity_id(&self) -> EntityId;
}

/// How spawned entities get their ids.
#[derive(Clone)]
pub enum Spawner {
    /// Ignore requested ids and allocate from the shared counter.
    Authoritative(Arc<dyn EntityIdSource>),
    /// Use the requested id, falling back to `local-N`.
    Provisional { next_local: u64 },
}

impl Spawner {
    pub fn provisional() -> Self {
        Spawner::Provisional { next_local: 1 }
    }

    fn assign_id(&mut self, requested: Option<EntityId>) -> EntityId {
        match self {
            Spawner::Authoritative(ids) => ids.next_entity_id(),
            Spawner::Provisional { next_local } => requested.unwrap_or_else(|| {
                let id = format!("local-{}", next_local);
                *next_local += 1;
                id
            }),
        }
    }
}

impl std::fmt::Debug for Spawner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Spawner::Authoritative(_) => f.write_str("Authoritative"),
            Spawner::Provisional { next_local } => {
                write!(f, "Provisional {{ next_local: {} }}", next_local)
            }
        }
    }
}

/// Applies spawns, kills and damage, then hands orphaned entities to neutral.
pub fn lifecycle(
    world: &mut World,
    commands: &[QueuedCommand],
    spawner: &mut Spawner,
    events: &mut EventBus,
) {
    for queued in commands {
        match &queued.command {
            Command::SpawnUnit { unit } => spawn(world, queued.issuer, unit, spawner, events),
            Command::KillUnit { id } => {
                if world.remove_entity(id).is_some() {
                    events.emit(GameEvent::UnitKilled { id: id.clone() });
                }
            }
            Command::DealDamage { id, damage } => {
                let killed = world
                    .entity_mut(id)
                    .map(|entity| entity.apply_damage(*damage))
                    .unwrap_or(false);
                if killed {
                    world.remove_entity(id);
                    events.emit(GameEvent::UnitKilled { id: id.clone() });
                }
            }
            _ => {}
        }
    }

    neutralize_orphans(world);
}

fn spawn(
    world: &mut World,
    issuer: Option<PlayerId>,
    unit: &EntitySpec,
    spawner: &mut Spawner,
    events: &mut EventBus,
) {
    if unit.hp == 0 {
        debug!("Ignoring spawn of {} with zero hp", unit.kind.as_str());
        return;
    }

    let owner = match issuer {
        Some(player) => Owner::Player(player),
        None => match unit.owner {
            Owner::Player(id) if world.players.contains_key(&id) => unit.owner,
            _ => Owner::Neutral,
        },
    };

    let id = spawner.assign_id(unit.id.clone());
    if world.entity(&id).is_some() {
        debug!("Ignoring spawn of {}: id already present", id);
        return;
    }

    world.upsert_entity(unit.clone().into_entity(id.clone(), owner));
    events.emit(GameEvent::UnitSpawned { id, owner });
}

/// Every entity must be owned by an existing player or be neutral.
pub fn neutralize_orphans(world: &mut World) {
    let World {
        players, entities, ..
    } = world;
    for entity in entities.values_mut() {
        if let Owner::Player(id) = entity.owner {
            if !players.contains_key(&id) {
                entity.owner = Owner::Neutral;
            }
        }
    }
}

/// Sets or clears move orders and installs positional resyncs.
pub fn orders(world: &mut World, commands: &[QueuedCommand]) {
    for queued in commands {
        match &queued.command {
            Command::Move { ids, target, mode } => set_move(world, ids, *target, *mode),
            Command::MoveLine { ids, target } => set_move(world, ids, *target, MoveMode::Line),
            Command::Stop { ids } => {
                for id in ids {
                    if let Some(entity) = world.entity_mut(id) {
                        entity.order = None;
                    }
                }
            }
            Command::Attack { ids, target } => {
                if let Some(position) = world.entity(target).map(|e| e.position()) {
                    set_move(world, ids, position, MoveMode::Attack);
                }
            }
            Command::Harvest { ids, resource } => {
                if let Some(position) = world.entity(resource).map(|e| e.position()) {
                    set_move(world, ids, position, MoveMode::Default);
                }
            }
            Command::Build { ids, target, .. } => {
                set_move(world, ids, *target, MoveMode::Default)
            }
            Command::Sync { id, target, steps } => {
                if let Some(entity) = world.entity_mut(id) {
                    if *steps == 0 {
                        entity.set_position(*target);
                        entity.resync_order = None;
                    } else {
                        entity.resync_order = Some(ResyncOrder {
                            target: *target,
                            remaining_steps: *steps,
                        });
                    }
                }
            }
            _ => {}
        }
    }
}

fn set_move(world: &mut World, ids: &[EntityId], target: Vec2, mode: MoveMode) {
    for id in ids {
        if let Some(entity) = world.entity_mut(id) {
            entity.order = Some(Order {
                target,
                speed: entity.speed,
                tolerance: entity.arrival_tolerance(),
                mode,
            });
        }
    }
}

/// Advances every entity by one tick of `dt` seconds.
///
/// A pending resync takes the whole tick: the entity closes `1/remaining` of
/// its gap to the resync target and lands on it exactly on the last step.
pub fn movement(world: &mut World, dt: f32, events: &mut EventBus) {
    for entity in world.entities.values_mut() {
        let position = entity.position();
        entity.previous_position = Some(position);

        if let Some(mut resync) = entity.resync_order {
            if resync.remaining_steps <= 1 {
                entity.set_position(resync.target);
                entity.resync_order = None;
            } else {
                let step = resync
                    .target
                    .sub(&position)
                    .scale(1.0 / resync.remaining_steps as f32);
                entity.set_position(position.add(&step));
                resync.remaining_steps -= 1;
                entity.resync_order = Some(resync);
            }
            continue;
        }

        let Some(order) = entity.order else {
            continue;
        };

        let distance = position.distance(&order.target);
        let next = if distance > order.tolerance {
            position.move_towards(&order.target, distance.min(order.speed * dt))
        } else {
            position
        };

        if next.distance(&order.target) <= order.tolerance {
            entity.set_position(order.target);
            entity.order = None;
            events.emit(GameEvent::UnitArrived {
                id: entity.id.clone(),
                position: order.target,
            });
        } else {
            entity.set_position(next);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::{Player, UnitKind};
    use assert_approx_eq::assert_approx_eq;
    use std::sync::atomic::{AtomicU64, Ordering};

    struct Counter(AtomicU64);

    impl EntityIdSource for Counter {
        fn next_entity_id(&self) -> EntityId {
            format!("u{}", self.0.fetch_add(1, Ordering::SeqCst) + 1)
        }
    }

    fn spec(id: Option<&str>, owner: Owner) -> EntitySpec {
        EntitySpec {
            id: id.map(str::to_string),
            kind: UnitKind::UnitSoldier,
            x: 0.0,
            y: 0.0,
            w: 20.0,
            h: 20.0,
            hp: 100,
            owner,
            speed: 100.0,
            color: "blue".to_string(),
        }
    }

    fn world_with_player(id: u64) -> World {
        let mut world = World::new();
        world.upsert_player(Player::new(id, "Ann", "#ff0000"));
        world
    }

    fn system(command: Command) -> QueuedCommand {
        QueuedCommand::system(command)
    }

    #[test]
    fn test_authoritative_spawn_ignores_requested_id() {
        let mut world = world_with_player(1);
        let mut spawner = Spawner::Authoritative(Arc::new(Counter(AtomicU64::new(0))));
        let mut events = EventBus::new();
        let command = QueuedCommand {
            issuer: Some(1),
            sequence: 1,
            command: Command::SpawnUnit {
                unit: spec(Some("local-7"), Owner::Neutral),
            },
        };

        lifecycle(&mut world, &[command], &mut spawner, &mut events);

        let unit = world.entity("u1").unwrap();
        assert_eq!(unit.owner, Owner::Player(1));
        assert!(world.entity("local-7").is_none());
        assert_eq!(
            events.flush(),
            vec![GameEvent::UnitSpawned {
                id: "u1".to_string(),
                owner: Owner::Player(1),
            }]
        );
    }

    #[test]
    fn test_system_spawn_for_missing_player_is_neutral() {
        let mut world = world_with_player(1);
        let mut spawner = Spawner::provisional();
        let mut events = EventBus::new();
        let commands = vec![
            system(Command::SpawnUnit {
                unit: spec(Some("a"), Owner::Player(1)),
            }),
            system(Command::SpawnUnit {
                unit: spec(Some("b"), Owner::Player(9)),
            }),
            system(Command::SpawnUnit {
                unit: spec(None, Owner::Neutral),
            }),
        ];

        lifecycle(&mut world, &commands, &mut spawner, &mut events);

        assert_eq!(world.entity("a").unwrap().owner, Owner::Player(1));
        assert_eq!(world.entity("b").unwrap().owner, Owner::Neutral);
        assert!(world.entity("local-1").is_some());
    }

    #[test]
    fn test_kill_nonexistent_is_noop() {
        let mut world = World::new();
        let mut spawner = Spawner::provisional();
        let mut events = EventBus::new();
        let kill = system(Command::KillUnit {
            id: "ghost".to_string(),
        });

        lifecycle(&mut world, &[kill], &mut spawner, &mut events);

        assert!(events.flush().is_empty());
        assert!(world.entities.is_empty());
    }

    #[test]
    fn test_damage_kills_at_zero_hp() {
        let mut world = World::new();
        let mut spawner = Spawner::provisional();
        let mut events = EventBus::new();
        let commands = vec![
            system(Command::SpawnUnit {
                unit: spec(Some("a"), Owner::Neutral),
            }),
            system(Command::DealDamage {
                id: "a".to_string(),
                damage: 60,
            }),
        ];
        lifecycle(&mut world, &commands, &mut spawner, &mut events);
        assert_eq!(world.entity("a").unwrap().hp, 40);
        events.flush();

        let finish = system(Command::DealDamage {
            id: "a".to_string(),
            damage: 60,
        });
        lifecycle(&mut world, &[finish], &mut spawner, &mut events);
        assert!(world.entity("a").is_none());
        assert_eq!(
            events.flush(),
            vec![GameEvent::UnitKilled {
                id: "a".to_string()
            }]
        );
    }

    #[test]
    fn test_orphans_become_neutral() {
        let mut world = world_with_player(1);
        world.upsert_entity(spec(None, Owner::Neutral).into_entity("a".to_string(), Owner::Player(1)));
        world.remove_player(1);

        neutralize_orphans(&mut world);
        assert_eq!(world.entity("a").unwrap().owner, Owner::Neutral);
    }

    #[test]
    fn test_move_line_arrives_exactly_once() {
        let mut world = World::new();
        world.upsert_entity(spec(None, Owner::Neutral).into_entity("a".to_string(), Owner::Neutral));
        let target = Vec2::new(103.3, 47.9);
        let command = system(Command::MoveLine {
            ids: vec!["a".to_string()],
            target,
        });
        orders(&mut world, &[command]);

        let order = world.entity("a").unwrap().order.unwrap();
        assert_eq!(order.mode, MoveMode::Line);
        assert_eq!(order.tolerance, 2.0);

        let dt = 0.05;
        let distance = target.magnitude();
        let ticks = (distance / (100.0 * dt)).ceil() as usize + 3;
        let mut events = EventBus::new();
        let mut arrivals = 0;
        for _ in 0..ticks {
            movement(&mut world, dt, &mut events);
            arrivals += events
                .flush()
                .iter()
                .filter(|e| matches!(e, GameEvent::UnitArrived { .. }))
                .count();
        }

        let unit = world.entity("a").unwrap();
        assert_eq!(unit.position(), target);
        assert!(unit.order.is_none());
        assert_eq!(arrivals, 1);
    }

    #[test]
    fn test_stop_clears_order() {
        let mut world = World::new();
        world.upsert_entity(spec(None, Owner::Neutral).into_entity("a".to_string(), Owner::Neutral));
        let ids = vec!["a".to_string(), "missing".to_string()];
        orders(
            &mut world,
            &[
                system(Command::Move {
                    ids: ids.clone(),
                    target: Vec2::new(50.0, 0.0),
                    mode: MoveMode::Default,
                }),
                system(Command::Stop { ids }),
            ],
        );
        assert!(world.entity("a").unwrap().order.is_none());
    }

    #[test]
    fn test_attack_approaches_target_position() {
        let mut world = World::new();
        world.upsert_entity(spec(None, Owner::Neutral).into_entity("a".to_string(), Owner::Neutral));
        let mut enemy = spec(None, Owner::Neutral).into_entity("e".to_string(), Owner::Neutral);
        enemy.set_position(Vec2::new(30.0, 40.0));
        world.upsert_entity(enemy);

        orders(
            &mut world,
            &[
                system(Command::Attack {
                    ids: vec!["a".to_string()],
                    target: "e".to_string(),
                }),
                system(Command::Harvest {
                    ids: vec!["e".to_string()],
                    resource: "nowhere".to_string(),
                }),
            ],
        );

        let order = world.entity("a").unwrap().order.unwrap();
        assert_eq!(order.target, Vec2::new(30.0, 40.0));
        assert_eq!(order.mode, MoveMode::Attack);
        assert!(world.entity("e").unwrap().order.is_none());
    }

    #[test]
    fn test_resync_lands_exactly_after_k_ticks() {
        let mut world = World::new();
        let mut unit = spec(None, Owner::Neutral).into_entity("a".to_string(), Owner::Neutral);
        unit.set_position(Vec2::new(10.0, -3.0));
        world.upsert_entity(unit);

        let target = Vec2::new(17.3, 4.1);
        orders(
            &mut world,
            &[system(Command::Sync {
                id: "a".to_string(),
                target,
                steps: 5,
            })],
        );

        let mut events = EventBus::new();
        let mut last_gap = world.entity("a").unwrap().position().distance(&target);
        for step in 1..=5 {
            movement(&mut world, 0.05, &mut events);
            let gap = world.entity("a").unwrap().position().distance(&target);
            assert!(gap < last_gap || gap == 0.0, "step {} did not close in", step);
            last_gap = gap;
        }

        let unit = world.entity("a").unwrap();
        assert_eq!(unit.position(), target);
        assert!(unit.resync_order.is_none());
        assert_approx_eq!(unit.previous_position.unwrap().x, 17.3 - (17.3 - 10.0) / 5.0, 1e-4);
    }

    #[test]
    fn test_sync_with_zero_steps_snaps() {
        let mut world = World::new();
        world.upsert_entity(spec(None, Owner::Neutral).into_entity("a".to_string(), Owner::Neutral));
        orders(
            &mut world,
            &[system(Command::Sync {
                id: "a".to_string(),
                target: Vec2::new(5.0, 5.0),
                steps: 0,
            })],
        );
        assert_eq!(world.entity("a").unwrap().position(), Vec2::new(5.0, 5.0));
    }
}
