//! Wire schema and the text-frame codec.
//!
//! Every frame is a JSON object discriminated by its `"type"` field. Decoding
//! reads the tag first and then parses the payload for that tag, so frames with
//! tags this build does not know decode to [`Message::Unknown`] instead of
//! failing. Object keys are emitted in sorted order, which keeps encoding
//! byte-stable for identical input.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use thiserror::Error;

use crate::command::{Command, CommandFrame};
use crate::entity::{Entity, EntityId, Player, PlayerId};

pub const TAG_PING: &str = "ping";
pub const TAG_PONG: &str = "pong";
pub const TAG_JOIN: &str = "join";
pub const TAG_INIT: &str = "init";
pub const TAG_SNAPSHOT: &str = "snapshot";

const TAG_FIELD: &str = "type";

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frame has no string \"type\" tag")]
    MissingTag,
    #[error("payload did not serialize to a JSON object")]
    NotAnObject,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ping {
    pub client_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pong {
    pub server_time: i64,
    pub client_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Join {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Init {
    pub my_id: PlayerId,
    pub server_time: i64,
    pub players: BTreeMap<PlayerId, Player>,
}

/// Authoritative state broadcast.
///
/// A partial snapshot (`full == false`) only updates the supplied entities and
/// removes the ids in `removed`; everything else is left as it is.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub server_time: i64,
    pub last_acknowledged_sequence: u32,
    #[serde(default)]
    pub full: bool,
    #[serde(default)]
    pub players: BTreeMap<PlayerId, Player>,
    #[serde(default)]
    pub entities: BTreeMap<EntityId, Entity>,
    #[serde(default)]
    pub removed: Vec<EntityId>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    Ping(Ping),
    Pong(Pong),
    Join(Join),
    Init(Init),
    Snapshot(Snapshot),
    Command(CommandFrame),
    /// A well-formed frame with a tag this build does not handle.
    Unknown(String),
}

impl Message {
    pub fn tag(&self) -> &str {
        match self {
            Message::Ping(_) => TAG_PING,
            Message::Pong(_) => TAG_PONG,
            Message::Join(_) => TAG_JOIN,
            Message::Init(_) => TAG_INIT,
            Message::Snapshot(_) => TAG_SNAPSHOT,
            Message::Command(frame) => frame.command.tag(),
            Message::Unknown(tag) => tag,
        }
    }

    pub fn encode(&self) -> Result<String, CodecError> {
        encode(self)
    }

    pub fn decode(raw: &str) -> Result<Self, CodecError> {
        decode(raw)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CommandHeader {
    sequence: u32,
    #[serde(default)]
    client_id: String,
}

pub fn encode(message: &Message) -> Result<String, CodecError> {
    let value = match message {
        Message::Ping(ping) => tagged(TAG_PING, ping)?,
        Message::Pong(pong) => tagged(TAG_PONG, pong)?,
        Message::Join(join) => tagged(TAG_JOIN, join)?,
        Message::Init(init) => tagged(TAG_INIT, init)?,
        Message::Snapshot(snapshot) => tagged(TAG_SNAPSHOT, snapshot)?,
        Message::Command(frame) => {
            let mut map = into_object(serde_json::to_value(&frame.command)?)?;
            map.insert("sequence".to_string(), Value::from(frame.sequence));
            map.insert("clientId".to_string(), Value::from(frame.client_id.clone()));
            Value::Object(map)
        }
        Message::Unknown(tag) => {
            let mut map = Map::new();
            map.insert(TAG_FIELD.to_string(), Value::from(tag.clone()));
            Value::Object(map)
        }
    };

    Ok(serde_json::to_string(&value)?)
}

pub fn decode(raw: &str) -> Result<Message, CodecError> {
    let value: Value = serde_json::from_str(raw)?;
    let tag = match value.get(TAG_FIELD) {
        Some(Value::String(tag)) => tag.clone(),
        _ => return Err(CodecError::MissingTag),
    };

    let message = match tag.as_str() {
        TAG_PING => Message::Ping(serde_json::from_value(value)?),
        TAG_PONG => Message::Pong(serde_json::from_value(value)?),
        TAG_JOIN => Message::Join(serde_json::from_value(value)?),
        TAG_INIT => Message::Init(serde_json::from_value(value)?),
        TAG_SNAPSHOT => Message::Snapshot(serde_json::from_value(value)?),
        command_tag if Command::is_command_tag(command_tag) => {
            let header: CommandHeader = serde_json::from_value(value.clone())?;
            Message::Command(CommandFrame {
                sequence: header.sequence,
                client_id: header.client_id,
                command: serde_json::from_value(value)?,
            })
        }
        _ => Message::Unknown(tag),
    };

    Ok(message)
}

fn tagged<T: Serialize>(tag: &str, payload: &T) -> Result<Value, CodecError> {
    let mut map = into_object(serde_json::to_value(payload)?)?;
    map.insert(TAG_FIELD.to_string(), Value::from(tag));
    Ok(Value::Object(map))
}

fn into_object(value: Value) -> Result<Map<String, Value>, CodecError> {
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(CodecError::NotAnObject),
    }
}
