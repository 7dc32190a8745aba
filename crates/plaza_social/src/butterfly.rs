//! "Butterfly" report: what happened after a player nudged the world.
//!
//! For each recent intervention by an agent, look for later events that point
//! at the same target inside a fixed window. The link is temporal
//! co-occurrence plus a shared reference, nothing more. It will report
//! coincidences and miss indirect effects.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use plaza_core::{EventLog, EventReference, LoggedEvent, TimeWindow, TraceConfig, WorldClock, WorldDay};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Event types that count as a player-triggered intervention.
pub static INTERVENTION_TYPES: [&str; 5] = [
    "RUMOR_PLANTED",
    "ELECTION_INFLUENCE",
    "ARENA_CHEER",
    "ARENA_PREDICT",
    "ARENA_INTERVENE",
];

/// Payload fields that may name an intervention's target, in lookup order.
pub static TARGET_FIELDS: [&str; 7] = [
    "target_agent_id",
    "target",
    "candidate_agent_id",
    "target_candidate_agent_id",
    "target_candidate_id",
    "candidate_id",
    "match_id",
];

const TARGET_MAX_CHARS: usize = 64;
const TYPE_MAX_CHARS: usize = 64;
const SUMMARY_MAX_CHARS: usize = 220;

static CANONICAL_UUID: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^[0-9a-f]{8}-[0-9a-f]{4}-[1-5][0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
        .expect("valid uuid pattern")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Consequence {
    #[serde(rename = "type")]
    pub kind: String,
    pub at: DateTime<Utc>,
    pub summary: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalEffect {
    pub action: String,
    pub action_at: DateTime<Utc>,
    pub target: String,
    pub consequences: Vec<Consequence>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CausalEffectReport {
    pub agent_id: Uuid,
    pub day: WorldDay,
    /// Newest intervention first.
    pub effects: Vec<CausalEffect>,
    pub count: usize,
}

/// Trimmed, length-capped text form of a scalar JSON value.
fn safe_text(v: Option<&Value>, max_chars: usize) -> Option<String> {
    let raw = match v? {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    let s: String = raw.chars().take(max_chars).collect();
    (!s.is_empty()).then_some(s)
}

/// First non-empty target reference in `payload`.
pub fn extract_target(payload: &Value) -> Option<String> {
    TARGET_FIELDS
        .iter()
        .find_map(|field| safe_text(payload.get(field), TARGET_MAX_CHARS))
}

/// Whether `s` looks like a canonical RFC 4122 id (versions 1 through 5).
pub fn is_canonical_uuid(s: &str) -> bool {
    CANONICAL_UUID.is_match(s.trim())
}

/// One-line description of a consequence event.
pub fn consequence_summary(event: &LoggedEvent) -> String {
    safe_text(event.payload.get("summary"), SUMMARY_MAX_CHARS)
        .or_else(|| safe_text(event.payload.get("title"), SUMMARY_MAX_CHARS))
        .or_else(|| type_label(&event.event_type))
        .unwrap_or_else(|| "EVENT".to_string())
}

fn type_label(event_type: &str) -> Option<String> {
    let s: String = event_type.trim().chars().take(TYPE_MAX_CHARS).collect();
    (!s.is_empty()).then_some(s)
}

fn reference_for(target: &str) -> EventReference {
    match Uuid::parse_str(target) {
        Ok(id) if is_canonical_uuid(target) => EventReference::Agent {
            id,
            raw: target.to_string(),
        },
        _ => EventReference::Payload(target.to_string()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct CausalTraceBuilder {
    config: TraceConfig,
}

impl CausalTraceBuilder {
    pub fn new(config: TraceConfig) -> Self {
        Self {
            config: config.bounded(),
        }
    }

    pub async fn build_report<S>(&self, store: &mut S, agent_id: Uuid, day: Option<&str>) -> Result<CausalEffectReport>
    where
        S: EventLog + WorldClock + ?Sized,
    {
        self.build_report_at(store, agent_id, day, Utc::now()).await
    }

    /// Same as [`Self::build_report`] with an explicit "now" for the lookback.
    ///
    /// Failing to list interventions is an error. Failing to look up one
    /// intervention's consequences only empties that entry.
    pub async fn build_report_at<S>(
        &self,
        store: &mut S,
        agent_id: Uuid,
        day: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<CausalEffectReport>
    where
        S: EventLog + WorldClock + ?Sized,
    {
        let explicit = day.and_then(|d| WorldDay::parse(d).ok());
        if agent_id.is_nil() {
            return Ok(CausalEffectReport {
                agent_id,
                day: explicit.unwrap_or_else(WorldDay::today),
                effects: Vec::new(),
                count: 0,
            });
        }

        let day = match explicit {
            Some(d) => d,
            None => resolve_world_day(store).await,
        };

        let since = now - Duration::hours(self.config.lookback_hours);
        let interventions = store
            .recent_by_types(agent_id, &INTERVENTION_TYPES, since, self.config.max_interventions)
            .await?;

        let mut effects = Vec::new();
        for intervention in interventions {
            let Some(target) = extract_target(&intervention.payload) else {
                continue;
            };

            let window = TimeWindow::following(intervention.created_at, Duration::hours(self.config.window_hours));
            let found = match store
                .referencing(&reference_for(&target), &window, self.config.max_consequences)
                .await
            {
                Ok(found) => found,
                Err(e) => {
                    tracing::warn!(
                        "Consequence lookup failed for {} event {}: {:#}",
                        intervention.event_type,
                        intervention.id,
                        e
                    );
                    Vec::new()
                }
            };

            effects.push(CausalEffect {
                action: type_label(&intervention.event_type).unwrap_or_else(|| "UNKNOWN".to_string()),
                action_at: intervention.created_at,
                target,
                consequences: found
                    .iter()
                    .filter(|c| window.contains(c.created_at))
                    .map(|c| Consequence {
                        kind: type_label(&c.event_type).unwrap_or_else(|| "UNKNOWN".to_string()),
                        at: c.created_at,
                        summary: consequence_summary(c),
                    })
                    .collect(),
            });
        }

        tracing::debug!("Butterfly report for {} on {}: {} effect(s)", agent_id, day, effects.len());
        let count = effects.len();
        Ok(CausalEffectReport {
            agent_id,
            day,
            effects,
            count,
        })
    }
}

/// Current world day, falling back to the host calendar when the clock has
/// nothing or cannot be read.
async fn resolve_world_day<S>(store: &mut S) -> WorldDay
where
    S: WorldClock + ?Sized,
{
    match store.current_day().await {
        Ok(Some(day)) => day,
        Ok(None) => WorldDay::today(),
        Err(e) => {
            tracing::warn!("World clock unavailable, using calendar date: {:#}", e);
            WorldDay::today()
        }
    }
}
