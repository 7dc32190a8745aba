//! Rows of the append-only logs and the filters used to read them back.

use crate::stats::StatName;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One applied stat change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmotionEvent {
    pub agent_id: Uuid,
    pub trigger_type: String,
    pub trigger_source_id: Option<String>,
    pub stat_name: StatName,
    pub delta: i32,
    pub before: i32,
    pub after: i32,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Event about to be appended to the log.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub agent_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub salience_score: i32,
    pub created_at: DateTime<Utc>,
}

impl NewEvent {
    pub fn new(agent_id: Uuid, event_type: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            agent_id,
            event_type: event_type.into(),
            payload,
            salience_score: 1,
            created_at: Utc::now(),
        }
    }

    pub fn with_salience(mut self, salience_score: i32) -> Self {
        self.salience_score = salience_score;
        self
    }

    pub fn at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }
}

/// Event as read back from the log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggedEvent {
    pub id: i64,
    pub agent_id: Uuid,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub salience_score: i32,
    pub created_at: DateTime<Utc>,
}

impl LoggedEvent {
    /// String value of a top-level payload field, if present and textual.
    pub fn payload_str(&self, field: &str) -> Option<&str> {
        self.payload.get(field).and_then(|v| v.as_str())
    }
}

/// How a later event may point back at an intervention target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventReference {
    /// Owned by the agent, or naming it in payload `target` / `agent_id`.
    /// `raw` is the target text as written, which payloads are matched against.
    Agent { id: Uuid, raw: String },
    /// Free-form target: payload `target` / `agent_id` only.
    Payload(String),
}

impl EventReference {
    pub fn agent(id: Uuid) -> Self {
        EventReference::Agent {
            id,
            raw: id.to_string(),
        }
    }

    /// The string compared against payload fields.
    pub fn needle(&self) -> &str {
        match self {
            EventReference::Agent { raw, .. } => raw,
            EventReference::Payload(s) => s,
        }
    }

    /// Owning agent, when the reference names one.
    pub fn owner(&self) -> Option<Uuid> {
        match self {
            EventReference::Agent { id, .. } => Some(*id),
            EventReference::Payload(_) => None,
        }
    }
}

/// Half-open time window `(after, until]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub after: DateTime<Utc>,
    pub until: DateTime<Utc>,
}

impl TimeWindow {
    /// The window of length `span` that opens right after `start`.
    pub fn following(start: DateTime<Utc>, span: Duration) -> Self {
        Self {
            after: start,
            until: start + span,
        }
    }

    pub fn contains(&self, ts: DateTime<Utc>) -> bool {
        ts > self.after && ts <= self.until
    }
}
