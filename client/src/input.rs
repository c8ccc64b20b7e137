//! Scripted command source for headless clients
//!
//! Stands in for mouse and keyboard: it spawns a handful of units for the
//! local player, then keeps ordering them to random points on the map.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{Command, EntitySpec, MoveMode, Owner, UnitKind, Vec2, World};

pub const MAP_WIDTH: f32 = 800.0;
pub const MAP_HEIGHT: f32 = 600.0;

/// Produces one command per step
pub struct InputScript {
    rng: StdRng,
    units_to_spawn: u32,
    color: String,
}

impl InputScript {
    pub fn new(units_to_spawn: u32, color: impl Into<String>) -> Self {
        Self::with_rng(StdRng::from_entropy(), units_to_spawn, color)
    }

    /// Deterministic script, for tests and reproducible runs.
    pub fn seeded(seed: u64, units_to_spawn: u32, color: impl Into<String>) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed), units_to_spawn, color)
    }

    fn with_rng(rng: StdRng, units_to_spawn: u32, color: impl Into<String>) -> Self {
        Self {
            rng,
            units_to_spawn,
            color: color.into(),
        }
    }

    /// Next command given the current local view, or `None` before the
    /// player has an identity.
    pub fn next_command(&mut self, world: &World) -> Option<Command> {
        let me = world.my_id?;

        if self.units_to_spawn > 0 {
            self.units_to_spawn -= 1;
            return Some(Command::SpawnUnit {
                unit: EntitySpec {
                    id: None,
                    kind: UnitKind::UnitPeasant,
                    x: self.rng.gen_range(50.0..MAP_WIDTH - 50.0),
                    y: self.rng.gen_range(50.0..MAP_HEIGHT - 50.0),
                    w: 24.0,
                    h: 24.0,
                    hp: 50,
                    owner: Owner::Player(me),
                    speed: 80.0,
                    color: self.color.clone(),
                },
            });
        }

        let mine: Vec<String> = world
            .entities_by_owner(Owner::Player(me))
            .filter(|e| e.selectable)
            .map(|e| e.id.clone())
            .collect();
        if mine.is_empty() {
            return None;
        }

        let count = self.rng.gen_range(1..=mine.len());
        let ids = mine[..count].to_vec();
        let target = Vec2::new(
            self.rng.gen_range(0.0..MAP_WIDTH),
            self.rng.gen_range(0.0..MAP_HEIGHT),
        );

        Some(match self.rng.gen_range(0..10) {
            0 => Command::Stop { ids },
            1..=3 => Command::Move {
                ids,
                target,
                mode: MoveMode::Default,
            },
            _ => Command::MoveLine { ids, target },
        })
    }
}
