//! Client-side prediction and reconciliation
//!
//! Commands the player issues are applied to a local prediction model on the
//! next local tick, well before the server has seen them. When a snapshot
//! arrives the local world is corrected in one of two ways:
//!
//! - **Blending** (the usual case): entities the server knows and we do not are
//!   spawned, non-positional state is taken from the server, and any entity
//!   whose predicted position is off by more than [`RECONCILE_EPSILON`] gets a
//!   `Sync` command that walks it onto the authoritative position over
//!   [`RESYNC_STEPS`] ticks instead of teleporting it.
//! - **Resimulation**: with more than [`RESIMULATE_THRESHOLD`] commands still
//!   unacknowledged, a shadow world is seeded from the snapshot, the pending
//!   commands are replayed on it, and it replaces the local world in one step.

use crate::commands::PendingCommands;
use log::debug;
use shared::{
    Command, CommandBuffer, CommandFrame, EntityId, GameEvent, Init, Model, Priority,
    QueuedCommand, Snapshot, World, RECONCILE_EPSILON, RESIMULATE_THRESHOLD, RESYNC_STEPS,
};
use std::collections::HashSet;

/// Outcome of applying one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    Blended { spawned: usize, resynced: usize },
    Resimulated { replayed: usize },
}

#[derive(Debug)]
pub struct Synchronizer {
    model: Model,
    queue: CommandBuffer<QueuedCommand>,
    pending: PendingCommands,
    /// Highest sequence the server has applied
    acknowledged: u32,
    tick_rate: u32,
    epsilon: f32,
    resync_steps: u32,
    resimulate_threshold: usize,
}

impl Synchronizer {
    pub fn new(tick_rate: u32, client_id: impl Into<String>) -> Self {
        Self {
            model: Model::predictive(tick_rate),
            queue: CommandBuffer::new(),
            pending: PendingCommands::new(client_id),
            acknowledged: 0,
            tick_rate,
            epsilon: RECONCILE_EPSILON,
            resync_steps: RESYNC_STEPS,
            resimulate_threshold: RESIMULATE_THRESHOLD,
        }
    }

    pub fn with_resimulate_threshold(mut self, threshold: usize) -> Self {
        self.resimulate_threshold = threshold;
        self
    }

    pub fn world(&self) -> &World {
        &self.model.world
    }

    pub fn pending(&self) -> &PendingCommands {
        &self.pending
    }

    pub fn fixed_dt(&self) -> f32 {
        self.model.fixed_dt()
    }

    pub fn subscribe(&mut self, subscriber: impl FnMut(&GameEvent) + Send + 'static) {
        self.model.subscribe(subscriber);
    }

    /// Sequences a player command and queues it for prediction. The returned
    /// frame is what goes on the wire.
    ///
    /// Spawns without an id get a provisional one derived from the sequence,
    /// so replays create the same entity.
    pub fn issue(&mut self, mut command: Command) -> CommandFrame {
        if let Command::SpawnUnit { unit } = &mut command {
            if unit.id.is_none() {
                unit.id = Some(format!("provisional-{}", self.pending.next_sequence()));
            }
        }

        let frame = self.pending.issue(command);
        self.queue.enqueue(self.predicted(&frame), Priority::Low);
        frame
    }

    /// Advances the prediction model by one tick.
    ///
    /// Player commands the server acknowledged before they were predicted
    /// are skipped; the snapshot already carries their effect.
    pub fn tick(&mut self) -> Vec<GameEvent> {
        let acknowledged = self.acknowledged;
        let mut commands = self.queue.drain();
        commands.retain(|c| c.sequence == 0 || c.sequence > acknowledged);
        self.model.tick(&commands)
    }

    /// New identity: the local world restarts from the server's player list.
    pub fn on_init(&mut self, init: &Init) {
        let world = World {
            time: init.server_time,
            my_id: Some(init.my_id),
            players: init.players.clone(),
            ..Default::default()
        };
        self.model.replace_world(world);
        self.pending.clear();
        self.queue.clear();
    }

    pub fn on_snapshot(&mut self, snapshot: &Snapshot) -> Reconciliation {
        self.acknowledged = self.acknowledged.max(snapshot.last_acknowledged_sequence);
        let acked = self.pending.acknowledge(snapshot.last_acknowledged_sequence);
        for frame in &acked {
            if let Command::SpawnUnit { unit } = &frame.command {
                if let Some(id) = &unit.id {
                    if !snapshot.entities.contains_key(id) {
                        self.model.world.remove_entity(id);
                    }
                }
            }
        }

        if self.pending.len() > self.resimulate_threshold {
            self.resimulate(snapshot)
        } else {
            self.blend(snapshot)
        }
    }

    fn blend(&mut self, snapshot: &Snapshot) -> Reconciliation {
        let commanded: HashSet<EntityId> = self
            .pending
            .pending()
            .iter()
            .flat_map(|frame| frame.command.subject_ids())
            .cloned()
            .collect();
        let provisional = self.provisional_ids();

        let world = &mut self.model.world;
        world.time = snapshot.server_time;
        world.players = snapshot.players.clone();

        let mut spawned = 0;
        let mut resynced = 0;
        for (id, authoritative) in &snapshot.entities {
            let Some(local) = world.entity_mut(id) else {
                world.upsert_entity(authoritative.clone());
                spawned += 1;
                continue;
            };

            let predicted = local.position();
            let order = local.order;
            let resync = local.resync_order;
            let previous = local.previous_position;

            *local = authoritative.clone();
            local.selectable = local.kind.is_selectable();
            local.set_position(predicted);
            local.previous_position = previous;
            local.resync_order = resync;
            if commanded.contains(id) {
                local.order = order;
            }

            let target = authoritative.position();
            if predicted.distance(&target) > self.epsilon {
                self.queue.enqueue(
                    QueuedCommand::system(Command::Sync {
                        id: id.clone(),
                        target,
                        steps: self.resync_steps,
                    }),
                    Priority::High,
                );
                resynced += 1;
            }
        }

        for id in &snapshot.removed {
            world.remove_entity(id);
        }
        if snapshot.full {
            world.entities.retain(|id, _| {
                snapshot.entities.contains_key(id) || provisional.contains(id)
            });
        }

        if resynced > 0 {
            debug!("Blending {} entities back onto the server", resynced);
        }
        Reconciliation::Blended { spawned, resynced }
    }

    fn resimulate(&mut self, snapshot: &Snapshot) -> Reconciliation {
        let mut seed = self.model.world.clone();
        for id in self.provisional_ids() {
            seed.remove_entity(&id);
        }
        seed.apply_snapshot(snapshot);

        let replay: Vec<QueuedCommand> = self
            .pending
            .pending()
            .iter()
            .map(|frame| self.predicted(frame))
            .collect();

        let mut shadow = Model::predictive(self.tick_rate).with_world(seed);
        shadow.apply_commands(&replay);

        self.model.replace_world(shadow.world);
        self.queue.clear();

        debug!("Resimulated {} pending commands", replay.len());
        Reconciliation::Resimulated {
            replayed: replay.len(),
        }
    }

    fn predicted(&self, frame: &CommandFrame) -> QueuedCommand {
        QueuedCommand {
            issuer: self.model.world.my_id,
            sequence: frame.sequence,
            command: frame.command.clone(),
        }
    }

    /// Ids of locally spawned entities the server has not acknowledged yet.
    fn provisional_ids(&self) -> HashSet<EntityId> {
        self.pending
            .pending()
            .iter()
            .filter_map(|frame| match &frame.command {
                Command::SpawnUnit { unit } => unit.id.clone(),
                _ => None,
            })
            .collect()
    }
}
