pub mod config;
pub mod day;
pub mod event;
pub mod relationship;
pub mod stats;

pub use config::{PlazaConfig, StoreConfig, TraceConfig};
pub use day::{DayError, WorldDay};
pub use event::{EmotionEvent, EventReference, LoggedEvent, NewEvent, TimeWindow};
pub use relationship::{RelationshipScores, RelationshipStat};
pub use stats::{AgentPair, AgentStats, StatName};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Agent id under which world-level facts (current day etc.) are stored.
pub const WORLD_AGENT_ID: Uuid = Uuid::nil();

/// Key of a row in the idempotency store.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClaimKey {
    pub agent_id: Uuid,
    pub kind: String,
    pub key: String,
}

impl ClaimKey {
    pub fn new(agent_id: Uuid, kind: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            agent_id,
            kind: kind.into(),
            key: key.into(),
        }
    }
}

/// Per-agent mutable stat rows.
///
/// Implementations are expected to run inside a caller-owned transaction:
/// rows returned by [`StatStore::lock_stats`] stay locked until it ends.
#[async_trait]
pub trait StatStore: Send {
    /// Fetch and exclusively lock both rows of the pair in a single call.
    /// Missing agents are simply absent from the result.
    async fn lock_stats(&mut self, pair: &AgentPair) -> anyhow::Result<Vec<(Uuid, AgentStats)>>;

    /// Overwrite mood/stress/curiosity of an existing row.
    async fn write_stats(&mut self, agent_id: Uuid, stats: &AgentStats) -> anyhow::Result<()>;
}

/// Append-only event log, plus the emotion log kept beside it.
#[async_trait]
pub trait EventLog: Send {
    async fn append_emotion(&mut self, event: &EmotionEvent) -> anyhow::Result<()>;

    /// Append a narrative event and return its row id.
    async fn append_event(&mut self, event: &NewEvent) -> anyhow::Result<i64>;

    /// Events of `agent_id` whose type is in `event_types`, created at or
    /// after `since`, newest first.
    async fn recent_by_types(
        &mut self,
        agent_id: Uuid,
        event_types: &[&str],
        since: DateTime<Utc>,
        limit: i64,
    ) -> anyhow::Result<Vec<LoggedEvent>>;

    /// Events matching `reference` inside `window`, oldest first.
    async fn referencing(
        &mut self,
        reference: &EventReference,
        window: &TimeWindow,
        limit: i64,
    ) -> anyhow::Result<Vec<LoggedEvent>>;
}

/// Insert-if-absent store used for at-most-once side effects.
#[async_trait]
pub trait ClaimStore: Send {
    /// Returns `true` only when this call created the row.
    async fn claim(&mut self, key: &ClaimKey, value: &serde_json::Value) -> anyhow::Result<bool>;
}

/// Source of the current simulation day.
#[async_trait]
pub trait WorldClock: Send {
    async fn current_day(&mut self) -> anyhow::Result<Option<WorldDay>>;
}
