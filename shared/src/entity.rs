use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::ParseIntError;

use crate::command::MoveMode;

pub type PlayerId = u64;
pub type EntityId = String;

pub const NEUTRAL: &str = "neutral";
pub const DEFAULT_COLOR: &str = "red";

/// Represents a point or direction in 2D world space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Returns the magnitude of the vector.
    pub fn magnitude(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    /// Returns the normalized vector, or zero for a zero-length vector.
    pub fn normalize(&self) -> Vec2 {
        let mag = self.magnitude();
        if mag == 0.0 {
            Vec2::default()
        } else {
            Vec2::new(self.x / mag, self.y / mag)
        }
    }

    /// Returns the scaled vector.
    pub fn scale(&self, scalar: f32) -> Vec2 {
        Vec2::new(self.x * scalar, self.y * scalar)
    }

    /// Returns the sum of two vectors.
    pub fn add(&self, other: &Vec2) -> Vec2 {
        Vec2::new(self.x + other.x, self.y + other.y)
    }

    /// Returns `self - other`.
    pub fn sub(&self, other: &Vec2) -> Vec2 {
        Vec2::new(self.x - other.x, self.y - other.y)
    }

    pub fn distance(&self, other: &Vec2) -> f32 {
        self.sub(other).magnitude()
    }

    /// Moves `step` units along the straight line toward `target`.
    pub fn move_towards(&self, target: &Vec2, step: f32) -> Vec2 {
        let direction = target.sub(self).normalize();
        self.add(&direction.scale(step))
    }

    pub fn lerp(&self, other: &Vec2, t: f32) -> Vec2 {
        self.add(&other.sub(self).scale(t))
    }
}

/// Enumerated unit kinds. The wire name doubles as the selection class prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    UnitPeasant,
    UnitSoldier,
    UnitShip,
    BuildingTownHall,
    BuildingBarracks,
    ResourceGold,
    ResourceTree,
    Doodad,
}

impl UnitKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UnitKind::UnitPeasant => "unit_peasant",
            UnitKind::UnitSoldier => "unit_soldier",
            UnitKind::UnitShip => "unit_ship",
            UnitKind::BuildingTownHall => "building_town_hall",
            UnitKind::BuildingBarracks => "building_barracks",
            UnitKind::ResourceGold => "resource_gold",
            UnitKind::ResourceTree => "resource_tree",
            UnitKind::Doodad => "doodad",
        }
    }

    pub fn is_selectable(&self) -> bool {
        let name = self.as_str();
        name.starts_with("unit") || name.starts_with("building") || name.starts_with("resource")
    }
}

/// Entity owner: a connected player or the reserved neutral side.
///
/// On the wire this is the player id as a decimal string, or `"neutral"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Owner {
    #[default]
    Neutral,
    Player(PlayerId),
}

impl Owner {
    pub fn player(&self) -> Option<PlayerId> {
        match self {
            Owner::Player(id) => Some(*id),
            Owner::Neutral => None,
        }
    }
}

impl fmt::Display for Owner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Owner::Neutral => f.write_str(NEUTRAL),
            Owner::Player(id) => write!(f, "{}", id),
        }
    }
}

impl From<Owner> for String {
    fn from(owner: Owner) -> Self {
        owner.to_string()
    }
}

impl TryFrom<String> for Owner {
    type Error = ParseIntError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value == NEUTRAL {
            Ok(Owner::Neutral)
        } else {
            value.parse().map(Owner::Player)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    #[serde(default)]
    pub gold: u32,
    #[serde(default)]
    pub wood: u32,
}

impl Player {
    pub fn new(id: PlayerId, name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            color: color.into(),
            gold: 0,
            wood: 0,
        }
    }
}

/// Active move directive of an entity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub target: Vec2,
    pub speed: f32,
    pub tolerance: f32,
    #[serde(default)]
    pub mode: MoveMode,
}

/// Positional correction blended in over `remaining_steps` ticks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResyncOrder {
    pub target: Vec2,
    pub remaining_steps: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entity {
    pub id: EntityId,
    #[serde(rename = "type")]
    pub kind: UnitKind,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub hp: u32,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub speed: f32,
    #[serde(default = "default_color")]
    pub color: String,
    #[serde(default)]
    pub selectable: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(skip)]
    pub previous_position: Option<Vec2>,
    #[serde(skip)]
    pub resync_order: Option<ResyncOrder>,
}

fn default_color() -> String {
    DEFAULT_COLOR.to_string()
}

impl Entity {
    pub fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    pub fn set_position(&mut self, position: Vec2) {
        self.x = position.x;
        self.y = position.y;
    }

    pub fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Reduces hp, saturating at zero. Returns true if this killed the entity.
    pub fn apply_damage(&mut self, damage: u32) -> bool {
        let was_alive = self.is_alive();
        self.hp = self.hp.saturating_sub(damage);
        was_alive && !self.is_alive()
    }

    /// Distance at which a move order counts as arrived: `max(1, 0.1 * min(w, h))`.
    pub fn arrival_tolerance(&self) -> f32 {
        (0.1 * self.w.min(self.h)).max(1.0)
    }

    /// Position to draw at, `alpha` in [0,1] being progress since the last tick.
    pub fn render_position(&self, alpha: f32) -> Vec2 {
        let current = self.position();
        match self.previous_position {
            Some(previous) => previous.lerp(&current, alpha.clamp(0.0, 1.0)),
            None => current,
        }
    }
}

/// Spawn parameters carried by a `SpawnUnit` command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<EntityId>,
    #[serde(rename = "type")]
    pub kind: UnitKind,
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
    pub hp: u32,
    #[serde(default)]
    pub owner: Owner,
    #[serde(default)]
    pub speed: f32,
    #[serde(default = "default_color")]
    pub color: String,
}

impl EntitySpec {
    pub fn into_entity(self, id: EntityId, owner: Owner) -> Entity {
        Entity {
            id,
            kind: self.kind,
            x: self.x,
            y: self.y,
            w: self.w,
            h: self.h,
            hp: self.hp,
            owner,
            speed: self.speed,
            color: self.color,
            selectable: self.kind.is_selectable(),
            order: None,
            previous_position: None,
            resync_order: None,
        }
    }
}
