use chrono::{DateTime, Local, TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

/// Prefix carried by every locally generated id. Durable ids never start with it.
pub const TRANSIENT_PREFIX: &str = "tmp-";

static TRANSIENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Milliseconds since the Unix epoch, as stored in `Entry::timestamp`.
pub fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

/// Identifier of an entry: either a transient placeholder or a durable server id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Wraps an id handed out by the remote store.
    pub fn durable(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a process-unique transient id derived from the call time.
    ///
    /// Two calls within the same millisecond still differ by the sequence suffix.
    pub fn transient(now_ms: i64) -> Self {
        let seq = TRANSIENT_SEQ.fetch_add(1, Ordering::Relaxed);
        Self(format!("{}{}-{}", TRANSIENT_PREFIX, now_ms, seq))
    }

    pub fn is_transient(&self) -> bool {
        self.0.starts_with(TRANSIENT_PREFIX)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Identity that owns a collection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The closed set of tracked record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecordType {
    BathroomEvent,
    WaterIntake,
    FoodEntry,
    TherapySession,
}

impl RecordType {
    pub const ALL: [RecordType; 4] = [
        RecordType::BathroomEvent,
        RecordType::WaterIntake,
        RecordType::FoodEntry,
        RecordType::TherapySession,
    ];

    /// Path segment used by the HTTP binding.
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::BathroomEvent => "bathroom-event",
            RecordType::WaterIntake => "water-intake",
            RecordType::FoodEntry => "food-entry",
            RecordType::TherapySession => "therapy-session",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "bathroom-event" | "bathroom" => Ok(RecordType::BathroomEvent),
            "water-intake" | "water" => Ok(RecordType::WaterIntake),
            "food-entry" | "food" => Ok(RecordType::FoodEntry),
            "therapy-session" | "therapy" => Ok(RecordType::TherapySession),
            _ => Err(format!(
                "Invalid record type '{}'. Valid options: bathroom, water, food, therapy",
                s
            )),
        }
    }
}

/// Type-specific data carried by an entry.
pub trait Payload:
    Clone + fmt::Debug + fmt::Display + Serialize + DeserializeOwned + Send + Sync + 'static
{
    const RECORD_TYPE: RecordType;

    fn notes(&self) -> Option<&str>;
}

/// Lifecycle state of an entry that is still part of a collection.
///
/// `Removed` is terminal and never observed on a stored entry; it exists so the
/// lifecycle can be reported for entries that dropped out of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    /// Optimistically inserted, waiting for the remote store.
    Pending,
    /// Acknowledged by the remote store.
    Confirmed,
    Removed,
}

/// One tracked record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry<P> {
    pub id: EntryId,
    pub owner_id: OwnerId,
    pub timestamp: i64,
    pub record_type: RecordType,
    pub payload: P,
}

impl<P: Payload> Entry<P> {
    /// Builds a pending entry for an optimistic insert.
    pub fn pending(id: EntryId, owner_id: OwnerId, timestamp: i64, payload: P) -> Self {
        Self {
            id,
            owner_id,
            timestamp,
            record_type: P::RECORD_TYPE,
            payload,
        }
    }

    pub fn state(&self) -> EntryState {
        if self.id.is_transient() {
            EntryState::Pending
        } else {
            EntryState::Confirmed
        }
    }

    pub fn recorded_at(&self) -> Option<DateTime<Local>> {
        Local.timestamp_millis_opt(self.timestamp).single()
    }
}

impl<P: Payload> fmt::Display for Entry<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let when = self
            .recorded_at()
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| self.timestamp.to_string());
        write!(f, "{}  {}  {}", when, self.payload, self.id)?;
        if self.state() == EntryState::Pending {
            write!(f, " (pending)")?;
        }
        Ok(())
    }
}

/// Input of a create: what the UI asks for.
#[derive(Debug, Clone)]
pub struct Draft<P> {
    pub payload: P,
    /// Explicit (possibly backdated) timestamp; defaults to call time.
    pub timestamp: Option<i64>,
}

impl<P> Draft<P> {
    pub fn new(payload: P) -> Self {
        Self {
            payload,
            timestamp: None,
        }
    }

    pub fn at(mut self, timestamp: i64) -> Self {
        self.timestamp = Some(timestamp);
        self
    }
}

/// Create request sent to the remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewEntry<P> {
    pub owner_id: OwnerId,
    pub timestamp: i64,
    pub payload: P,
}
