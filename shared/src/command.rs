use serde::{Deserialize, Serialize};

use crate::entity::{EntityId, EntitySpec, PlayerId, UnitKind, Vec2};

pub const COMMAND_TAG_PREFIX: &str = "cmd:";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveMode {
    #[default]
    Default,
    Line,
    Attack,
}

/// Player and system commands. The serde tag is the full wire tag (`cmd:<kind>`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Command {
    #[serde(rename = "cmd:spawn_unit")]
    SpawnUnit { unit: EntitySpec },
    #[serde(rename = "cmd:kill_unit")]
    KillUnit { id: EntityId },
    #[serde(rename = "cmd:deal_damage")]
    DealDamage { id: EntityId, damage: u32 },
    #[serde(rename = "cmd:move")]
    Move {
        ids: Vec<EntityId>,
        target: Vec2,
        #[serde(default)]
        mode: MoveMode,
    },
    #[serde(rename = "cmd:move_line")]
    MoveLine { ids: Vec<EntityId>, target: Vec2 },
    #[serde(rename = "cmd:stop")]
    Stop { ids: Vec<EntityId> },
    #[serde(rename = "cmd:attack")]
    Attack { ids: Vec<EntityId>, target: EntityId },
    #[serde(rename = "cmd:harvest")]
    Harvest {
        ids: Vec<EntityId>,
        resource: EntityId,
    },
    #[serde(rename = "cmd:build")]
    Build {
        ids: Vec<EntityId>,
        target: Vec2,
        building: UnitKind,
    },
    #[serde(rename = "cmd:sync")]
    Sync {
        id: EntityId,
        target: Vec2,
        steps: u32,
    },
}

impl Command {
    pub const TAGS: [&'static str; 10] = [
        "cmd:spawn_unit",
        "cmd:kill_unit",
        "cmd:deal_damage",
        "cmd:move",
        "cmd:move_line",
        "cmd:stop",
        "cmd:attack",
        "cmd:harvest",
        "cmd:build",
        "cmd:sync",
    ];

    pub fn is_command_tag(tag: &str) -> bool {
        Self::TAGS.contains(&tag)
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Command::SpawnUnit { .. } => Self::TAGS[0],
            Command::KillUnit { .. } => Self::TAGS[1],
            Command::DealDamage { .. } => Self::TAGS[2],
            Command::Move { .. } => Self::TAGS[3],
            Command::MoveLine { .. } => Self::TAGS[4],
            Command::Stop { .. } => Self::TAGS[5],
            Command::Attack { .. } => Self::TAGS[6],
            Command::Harvest { .. } => Self::TAGS[7],
            Command::Build { .. } => Self::TAGS[8],
            Command::Sync { .. } => Self::TAGS[9],
        }
    }

    /// Entities this command acts on (not including attack/harvest targets).
    pub fn subject_ids(&self) -> Vec<&EntityId> {
        match self {
            Command::SpawnUnit { unit } => unit.id.iter().collect(),
            Command::KillUnit { id } | Command::DealDamage { id, .. } | Command::Sync { id, .. } => {
                vec![id]
            }
            Command::Move { ids, .. }
            | Command::MoveLine { ids, .. }
            | Command::Stop { ids }
            | Command::Attack { ids, .. }
            | Command::Harvest { ids, .. }
            | Command::Build { ids, .. } => ids.iter().collect(),
        }
    }
}

/// A command as it travels on the wire: per-connection sequence plus sender tag.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandFrame {
    pub sequence: u32,
    pub client_id: String,
    pub command: Command,
}

/// A command waiting for the next tick, tagged with who issued it.
///
/// `issuer` is `None` for system-issued (authoritative) commands.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommand {
    pub issuer: Option<PlayerId>,
    pub sequence: u32,
    pub command: Command,
}

impl QueuedCommand {
    pub fn system(command: Command) -> Self {
        Self {
            issuer: None,
            sequence: 0,
            command,
        }
    }

    pub fn from_player(player: PlayerId, frame: CommandFrame) -> Self {
        Self {
            issuer: Some(player),
            sequence: frame.sequence,
            command: frame.command,
        }
    }
}
