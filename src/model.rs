// Records the dashboard tracks: bids and customers.
//
// Only the identity and, for bids, the status are interpreted here. Every
// other field is carried through untouched in `payload`.

use chrono::{DateTime, Utc};
use serde::de::{DeserializeOwned, Error as DeError};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::workflow::BidStatus;

/// Opaque record identifier.
///
/// The API sends UUID strings, but numeric ids are accepted too and
/// normalised to their decimal text, so `1` and `"1"` name the same record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntityId(String);

impl EntityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for EntityId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EntityId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for EntityId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Number(serde_json::Number),
        }

        match RawId::deserialize(deserializer)? {
            RawId::Text(text) if text.trim().is_empty() => {
                Err(D::Error::custom("entity id must not be empty"))
            }
            RawId::Text(text) => Ok(EntityId(text)),
            RawId::Number(number) => integral_id(&number).map(EntityId).ok_or_else(|| {
                D::Error::custom(format!("entity id must be an integer, got {number}"))
            }),
        }
    }
}

/// Decimal text of an integral JSON number. `1.0` and `1e3` are accepted
/// when exact; fractional ids are not.
fn integral_id(number: &serde_json::Number) -> Option<String> {
    if let Some(id) = number.as_u64() {
        return Some(id.to_string());
    }
    if let Some(id) = number.as_i64() {
        return Some(id.to_string());
    }
    // every integer up to 2^53 has an exact f64 form
    let value = number.as_f64()?;
    (value.fract() == 0.0 && value.abs() <= 9_007_199_254_740_992.0)
        .then(|| (value as i64).to_string())
}

/// The entity kinds carried by the event feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Bid,
    Customer,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Bid => "bid",
            EntityKind::Customer => "customer",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "bid" => Ok(EntityKind::Bid),
            "customer" => Ok(EntityKind::Customer),
            other => Err(format!("unknown entity kind: {other}")),
        }
    }
}

/// A record that can live in a realtime collection.
pub trait Entity: Clone + fmt::Debug + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    fn id(&self) -> &EntityId;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bid {
    pub id: EntityId,
    pub status: BidStatus,
    #[serde(default, alias = "lastUpdated", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default, alias = "updatedBy", skip_serializing_if = "Option::is_none")]
    pub updated_by: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Bid {
    pub fn new(id: impl Into<EntityId>, status: BidStatus) -> Self {
        Self {
            id: id.into(),
            status,
            updated_at: None,
            updated_by: None,
            payload: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.payload.insert(key.to_string(), value.into());
        self
    }

    fn text_field(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }

    pub fn code(&self) -> Option<&str> {
        self.text_field("code")
    }

    pub fn title(&self) -> Option<&str> {
        self.text_field("title")
    }

    pub fn priority(&self) -> Option<&str> {
        self.text_field("priority")
    }

    pub fn is_urgent(&self) -> bool {
        self.payload
            .get("is_urgent")
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    /// Short label for logs and CLI output: the bid code if present.
    pub fn label(&self) -> String {
        match (self.code(), self.title()) {
            (Some(code), Some(title)) => format!("{code}: {title}"),
            (Some(code), None) => code.to_string(),
            _ => self.id.to_string(),
        }
    }
}

impl Entity for Bid {
    const KIND: EntityKind = EntityKind::Bid;

    fn id(&self) -> &EntityId {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub id: EntityId,
    #[serde(default)]
    pub name: String,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Customer {
    pub fn new(id: impl Into<EntityId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            payload: Map::new(),
        }
    }
}

impl Entity for Customer {
    const KIND: EntityKind = EntityKind::Customer;

    fn id(&self) -> &EntityId {
        &self.id
    }
}
