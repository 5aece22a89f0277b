//! Wire messages from the event feed and their typed form.
//!
//! The feed sends `{"type": "<entity>_<kind>", "payload": ...}` text frames,
//! e.g. `bid_updated` or `customer_deleted`, plus `ping`/`pong` heartbeats.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::model::{Bid, Customer, Entity, EntityId, EntityKind};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedEvent {
    #[error("message is not valid JSON: {0}")]
    InvalidJson(String),

    #[error("unknown message type: {0}")]
    UnknownType(String),

    #[error("{message_type} payload has no id")]
    MissingId { message_type: String },

    #[error("{message_type} payload could not be decoded: {reason}")]
    InvalidPayload {
        message_type: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WireMessage {
    #[serde(rename = "type")]
    pub message_type: String,
    #[serde(default)]
    pub payload: Value,
}

impl WireMessage {
    pub fn new(message_type: impl Into<String>, payload: Value) -> Self {
        Self {
            message_type: message_type.into(),
            payload,
        }
    }

    pub fn ping() -> Self {
        Self::new("ping", Value::Null)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Created,
    Updated,
    Deleted,
}

impl EventKind {
    fn from_suffix(suffix: &str) -> Option<Self> {
        match suffix {
            "created" => Some(EventKind::Created),
            "updated" => Some(EventKind::Updated),
            "deleted" => Some(EventKind::Deleted),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Created => "created",
            EventKind::Updated => "updated",
            EventKind::Deleted => "deleted",
        }
    }
}

/// One mutation of one record.
#[derive(Debug, Clone, PartialEq)]
pub enum Change<E> {
    Created(E),
    Updated(E),
    Deleted(EntityId),
}

impl<E: Entity> Change<E> {
    pub fn kind(&self) -> EventKind {
        match self {
            Change::Created(_) => EventKind::Created,
            Change::Updated(_) => EventKind::Updated,
            Change::Deleted(_) => EventKind::Deleted,
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            Change::Created(record) | Change::Updated(record) => record.id(),
            Change::Deleted(id) => id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum StoreEvent {
    Bid(Change<Bid>),
    Customer(Change<Customer>),
}

impl StoreEvent {
    pub fn entity_kind(&self) -> EntityKind {
        match self {
            StoreEvent::Bid(_) => EntityKind::Bid,
            StoreEvent::Customer(_) => EntityKind::Customer,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            StoreEvent::Bid(change) => change.kind(),
            StoreEvent::Customer(change) => change.kind(),
        }
    }

    pub fn id(&self) -> &EntityId {
        match self {
            StoreEvent::Bid(change) => change.id(),
            StoreEvent::Customer(change) => change.id(),
        }
    }

    /// Decode a wire message into a typed event.
    pub fn from_wire(message: WireMessage) -> Result<Self, MalformedEvent> {
        let unknown = || MalformedEvent::UnknownType(message.message_type.clone());

        let (prefix, suffix) = message.message_type.rsplit_once('_').ok_or_else(unknown)?;
        let kind = EventKind::from_suffix(suffix).ok_or_else(unknown)?;
        let entity: EntityKind = prefix.parse().map_err(|_| unknown())?;

        match entity {
            EntityKind::Bid => decode_change(kind, &message).map(StoreEvent::Bid),
            EntityKind::Customer => decode_change(kind, &message).map(StoreEvent::Customer),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Heartbeat {
    Ping,
    Pong,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    Event(StoreEvent),
    Heartbeat(Heartbeat),
}

/// Parse one text frame from the feed.
pub fn parse_message(text: &str) -> Result<Inbound, MalformedEvent> {
    let message: WireMessage =
        serde_json::from_str(text).map_err(|e| MalformedEvent::InvalidJson(e.to_string()))?;

    match message.message_type.as_str() {
        "ping" => Ok(Inbound::Heartbeat(Heartbeat::Ping)),
        "pong" => Ok(Inbound::Heartbeat(Heartbeat::Pong)),
        _ => StoreEvent::from_wire(message).map(Inbound::Event),
    }
}

fn decode_change<E: Entity>(
    kind: EventKind,
    message: &WireMessage,
) -> Result<Change<E>, MalformedEvent> {
    let missing_id = || MalformedEvent::MissingId {
        message_type: message.message_type.clone(),
    };

    if kind == EventKind::Deleted {
        // deletes carry either the record, `{ "id": .. }`, or the bare id
        let raw_id = match &message.payload {
            Value::Object(fields) => fields.get("id").cloned().ok_or_else(missing_id)?,
            Value::Null => return Err(missing_id()),
            other => other.clone(),
        };
        let id: EntityId = serde_json::from_value(raw_id).map_err(|_| missing_id())?;
        return Ok(Change::Deleted(id));
    }

    match message.payload.get("id") {
        None | Some(Value::Null) => return Err(missing_id()),
        Some(_) => {}
    }

    let record: E = serde_json::from_value(message.payload.clone()).map_err(|e| {
        MalformedEvent::InvalidPayload {
            message_type: message.message_type.clone(),
            reason: e.to_string(),
        }
    })?;

    Ok(match kind {
        EventKind::Created => Change::Created(record),
        _ => Change::Updated(record),
    })
}
