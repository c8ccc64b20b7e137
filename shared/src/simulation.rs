//! Fixed-step simulation model shared by the authoritative server and the
//! client's prediction.

use std::sync::Arc;
use std::time::Duration;

use crate::command::QueuedCommand;
use crate::events::{EventBus, GameEvent};
use crate::systems::{self, EntityIdSource, Spawner};
use crate::world::World;

/// Tick period for a rate in ticks per second. A rate of 0 is treated as 1.
pub fn tick_period(tick_rate: u32) -> Duration {
    Duration::from_secs_f64(1.0 / tick_rate.max(1) as f64)
}

/// A [`World`] plus the systems that advance it.
#[derive(Debug)]
pub struct Model {
    pub world: World,
    events: EventBus,
    spawner: Spawner,
    fixed_dt: f32,
    tick: u64,
}

impl Model {
    /// Server model: every spawn gets an id from `ids`.
    pub fn authoritative(tick_rate: u32, ids: Arc<dyn EntityIdSource>) -> Self {
        Self::with_spawner(tick_rate, Spawner::Authoritative(ids))
    }

    /// Client prediction model: spawns keep the id they were issued with.
    pub fn predictive(tick_rate: u32) -> Self {
        Self::with_spawner(tick_rate, Spawner::provisional())
    }

    fn with_spawner(tick_rate: u32, spawner: Spawner) -> Self {
        Self {
            world: World::new(),
            events: EventBus::new(),
            spawner,
            fixed_dt: tick_period(tick_rate).as_secs_f32(),
            tick: 0,
        }
    }

    pub fn with_world(mut self, world: World) -> Self {
        self.world = world;
        self
    }

    pub fn fixed_dt(&self) -> f32 {
        self.fixed_dt
    }

    pub fn tick_count(&self) -> u64 {
        self.tick
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&GameEvent) + Send + 'static) {
        self.events.subscribe(subscriber);
    }

    /// Runs one tick: lifecycle, orders, movement, then publishes this tick's
    /// events.
    pub fn tick(&mut self, commands: &[QueuedCommand]) -> Vec<GameEvent> {
        self.apply_commands(commands);
        systems::movement(&mut self.world, self.fixed_dt, &mut self.events);
        self.tick += 1;
        self.events.flush()
    }

    /// Applies commands without advancing time. Events stay queued until the
    /// next [`Model::tick`].
    pub fn apply_commands(&mut self, commands: &[QueuedCommand]) {
        systems::lifecycle(&mut self.world, commands, &mut self.spawner, &mut self.events);
        systems::orders(&mut self.world, commands);
    }

    /// Replaces the world in one step and returns the old one.
    pub fn replace_world(&mut self, world: World) -> World {
        std::mem::replace(&mut self.world, world)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TickStats {
    pub tick: u64,
    pub last_tick: Duration,
    pub overruns: u64,
}

/// Schedules the next tick from the duration of the last one.
#[derive(Debug, Clone)]
pub struct TickPacer {
    period: Duration,
    stats: TickStats,
}

impl TickPacer {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            stats: TickStats::default(),
        }
    }

    pub fn from_rate(tick_rate: u32) -> Self {
        Self::new(tick_period(tick_rate))
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn stats(&self) -> TickStats {
        self.stats
    }

    /// Records a finished tick. Returns true if it overran the period.
    pub fn record(&mut self, elapsed: Duration) -> bool {
        self.stats.tick += 1;
        self.stats.last_tick = elapsed;
        let overran = elapsed > self.period;
        if overran {
            self.stats.overruns += 1;
        }
        overran
    }

    /// `max(0, period - last tick duration)`.
    pub fn next_delay(&self) -> Duration {
        self.period.saturating_sub(self.stats.last_tick)
    }
}
