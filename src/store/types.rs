use chrono::DateTime;
use chrono::Utc;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;
use serde_json::value::RawValue;

/// A sequence of notifications for a given generation ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsResponse {
    #[serde(rename = "generationID")]
    pub generation_id: String,
    pub notifications: Vec<Notification>,
}

/// One immutable record in a topic's log. The index is assigned by the store
/// at append time and is only meaningful within a given generation ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub index: u64,
    pub timestamp: DateTime<Utc>,
    pub data: Payload,
}

/// An opaque payload. The store sometimes holds JSON text it already
/// serialized (read path) and sometimes a structured value still to be
/// serialized (write path); the two cases stay explicit.
#[derive(Debug, Clone)]
pub enum Payload {
    /// JSON text loaded from storage, emitted verbatim.
    Raw(Box<RawValue>),
    /// A structured value that has not been serialized yet.
    Value(serde_json::Value),
}

impl Payload {
    /// Structural view of the payload, independent of which variant holds it.
    pub fn to_value(&self) -> serde_json::Result<serde_json::Value> {
        match self {
            Payload::Raw(raw) => serde_json::from_str(raw.get()),
            Payload::Value(value) => Ok(value.clone()),
        }
    }
}

impl From<serde_json::Value> for Payload {
    fn from(value: serde_json::Value) -> Self {
        Payload::Value(value)
    }
}

impl Serialize for Payload {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Payload::Raw(raw) => raw.serialize(serializer),
            Payload::Value(value) => value.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Payload {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        // Reading captures the stored text verbatim.
        Box::<RawValue>::deserialize(deserializer).map(Payload::Raw)
    }
}
