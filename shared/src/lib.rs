pub mod command;
pub mod entity;
pub mod events;
pub mod protocol;
pub mod queue;
pub mod simulation;
pub mod systems;
pub mod time;
pub mod world;

pub use command::{Command, CommandFrame, MoveMode, QueuedCommand};
pub use entity::{Entity, EntityId, EntitySpec, Order, Owner, Player, PlayerId, UnitKind, Vec2};
pub use events::{EventBus, GameEvent};
pub use protocol::{CodecError, Init, Join, Message, Ping, Pong, Snapshot};
pub use queue::{CommandBuffer, Priority};
pub use simulation::{tick_period, Model, TickPacer, TickStats};
pub use systems::EntityIdSource;
pub use time::{unix_ms, Clock, ManualClock, SystemClock};
pub use world::World;

pub const DEFAULT_TICK_RATE: u32 = 20;
pub const PING_PERIOD_MS: u64 = 2500;
/// Ticks over which a positional correction is blended in.
pub const RESYNC_STEPS: u32 = 5;
/// Largest predicted-vs-authoritative distance left uncorrected.
pub const RECONCILE_EPSILON: f32 = 0.5;
/// More pending commands than this triggers a full resimulation.
pub const RESIMULATE_THRESHOLD: usize = 16;
/// WebSocket endpoint path.
pub const WS_PATH: &str = "/ws";
