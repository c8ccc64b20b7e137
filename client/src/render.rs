//! Boundary to whatever draws the world.
//!
//! The renderer gets a read-only view once per frame and never writes back
//! into the simulation.

use log::debug;
use shared::{Entity, EntityId, Player, PlayerId, Vec2};
use std::collections::BTreeMap;
use std::time::Duration;

/// What a renderer sees for one frame.
#[derive(Debug, Clone, Copy)]
pub struct FrameView<'a> {
    pub my_id: Option<PlayerId>,
    pub players: &'a BTreeMap<PlayerId, Player>,
    pub entities: &'a BTreeMap<EntityId, Entity>,
    /// Progress since the last prediction tick, in [0, 1]
    pub alpha: f32,
    /// Last measured round trip, if any
    pub ping_ms: Option<i64>,
}

impl<'a> FrameView<'a> {
    /// Interpolated draw position of every entity.
    pub fn positions(&self) -> impl Iterator<Item = (&'a EntityId, Vec2)> + '_ {
        let alpha = self.alpha;
        self.entities
            .iter()
            .map(move |(id, entity)| (id, entity.render_position(alpha)))
    }
}

pub trait FrameSink {
    fn render(&mut self, frame: &FrameView<'_>);
}

/// Fraction of the tick period that has elapsed since the last tick.
pub fn interpolation_alpha(since_tick: Duration, period: Duration) -> f32 {
    if period.is_zero() {
        return 1.0;
    }
    (since_tick.as_secs_f32() / period.as_secs_f32()).clamp(0.0, 1.0)
}

/// Headless sink that logs a one-line summary every `every` frames.
#[derive(Debug)]
pub struct LogSink {
    every: u64,
    frames: u64,
}

impl LogSink {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
            frames: 0,
        }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new(120)
    }
}

impl FrameSink for LogSink {
    fn render(&mut self, frame: &FrameView<'_>) {
        self.frames += 1;
        if self.frames % self.every != 0 {
            return;
        }

        let mine = frame
            .entities
            .values()
            .filter(|e| e.owner.player().is_some() && e.owner.player() == frame.my_id)
            .count();
        debug!(
            "Frame {}: {} players, {} entities ({} mine), ping {}",
            self.frames,
            frame.players.len(),
            frame.entities.len(),
            mine,
            frame
                .ping_ms
                .map(|ms| format!("{}ms", ms))
                .unwrap_or_else(|| "-".to_string())
        );
    }
}
