//! Emotion contagion between two agents after a social interaction.
//!
//! Both directions read the same pre-interaction snapshot, so the result does
//! not depend on which agent is passed first.

use crate::personality::{affinity_coefficient, personality_coefficient};
use anyhow::Result;
use chrono::{DateTime, Utc};
use plaza_core::stats::clamp_delta;
use plaza_core::{AgentPair, AgentStats, EmotionEvent, EventLog, StatName, StatStore};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const TRIGGER_CONVERSATION: &str = "conversation";

/// Optional inputs to [`StatPropagationEngine::apply_interaction`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionContext {
    pub mbti_a: Option<String>,
    pub mbti_b: Option<String>,
    /// How A feels about B.
    pub affinity_ab: i32,
    /// How B feels about A.
    pub affinity_ba: i32,
    pub trigger_source_id: Option<String>,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InteractionOutcome {
    pub a: AgentStats,
    pub b: AgentStats,
    /// Emotion log rows written, A→B direction first.
    pub events: Vec<EmotionEvent>,
}

/// One scaled change aimed at the target of a direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatShift {
    pub stat: StatName,
    pub delta: i32,
}

/// Unscaled shifts `source` induces on `target`.
pub fn base_deltas(source: &AgentStats, target: &AgentStats) -> [(StatName, i32); 3] {
    let mut mood = 0;
    if source.mood >= 70 && target.mood < 50 {
        mood += 6;
    }
    if source.mood <= 30 && target.mood > 50 {
        mood -= 5;
    }

    let mut stress = 0;
    if source.stress >= 60 {
        stress += 3;
    }
    if source.stress <= 20 && target.stress > 40 {
        stress -= 2;
    }

    let mut curiosity = 0;
    if source.curiosity >= 70 {
        curiosity += 2;
    }

    [
        (StatName::Mood, mood),
        (StatName::Stress, stress),
        (StatName::Curiosity, curiosity),
    ]
}

/// Base deltas scaled by the target's personality and the affinity, rounded
/// and bounded to one step. Zero shifts are dropped.
pub fn scaled_shifts(
    source: &AgentStats,
    target: &AgentStats,
    target_code: Option<&str>,
    affinity: i32,
) -> Vec<StatShift> {
    let aff = affinity_coefficient(affinity);
    base_deltas(source, target)
        .into_iter()
        .filter(|(_, base)| *base != 0)
        .filter_map(|(stat, base)| {
            let delta = clamp_delta(base as f64 * personality_coefficient(target_code, stat) * aff);
            (delta != 0).then_some(StatShift { stat, delta })
        })
        .collect()
}

struct Direction<'a> {
    target_id: Uuid,
    source: AgentStats,
    target: AgentStats,
    target_code: Option<&'a str>,
    affinity: i32,
}

#[derive(Debug, Clone, Default)]
pub struct StatPropagationEngine;

impl StatPropagationEngine {
    pub fn new() -> Self {
        Self
    }

    /// Shift both agents' stats after they interacted.
    ///
    /// Returns `Ok(None)` without touching the store when either agent has no
    /// stat row (or both ids are the same agent). Store errors abort the call;
    /// the caller's transaction must then be rolled back.
    pub async fn apply_interaction<S>(
        &self,
        store: &mut S,
        a: Uuid,
        b: Uuid,
        ctx: &InteractionContext,
    ) -> Result<Option<InteractionOutcome>>
    where
        S: StatStore + EventLog + ?Sized,
    {
        if a.is_nil() || b.is_nil() || a == b {
            tracing::debug!("Contagion skipped: invalid pair {} / {}", a, b);
            return Ok(None);
        }

        let rows = store.lock_stats(&AgentPair::new(a, b)).await?;
        let snapshot = |id: Uuid| rows.iter().find(|(rid, _)| *rid == id).map(|(_, s)| s.clamped());
        let (Some(a_before), Some(b_before)) = (snapshot(a), snapshot(b)) else {
            tracing::debug!("Contagion skipped: stats missing for {} or {}", a, b);
            return Ok(None);
        };

        let now = Utc::now();
        let mut events = Vec::new();

        let b_after = self
            .apply_direction(
                store,
                Direction {
                    target_id: b,
                    source: a_before,
                    target: b_before,
                    target_code: ctx.mbti_b.as_deref(),
                    affinity: ctx.affinity_ab,
                },
                ctx,
                now,
                &mut events,
            )
            .await?;

        let a_after = self
            .apply_direction(
                store,
                Direction {
                    target_id: a,
                    source: b_before,
                    target: a_before,
                    target_code: ctx.mbti_a.as_deref(),
                    affinity: ctx.affinity_ba,
                },
                ctx,
                now,
                &mut events,
            )
            .await?;

        if !events.is_empty() {
            tracing::info!(
                "Contagion {} <-> {}: {} stat shift(s) applied",
                a,
                b,
                events.len()
            );
        }

        Ok(Some(InteractionOutcome {
            a: a_after,
            b: b_after,
            events,
        }))
    }

    async fn apply_direction<S>(
        &self,
        store: &mut S,
        dir: Direction<'_>,
        ctx: &InteractionContext,
        now: DateTime<Utc>,
        events: &mut Vec<EmotionEvent>,
    ) -> Result<AgentStats>
    where
        S: StatStore + EventLog + ?Sized,
    {
        let mut out = dir.target;

        for shift in scaled_shifts(&dir.source, &dir.target, dir.target_code, dir.affinity) {
            let before = out.get(shift.stat);
            out.set(shift.stat, before + shift.delta);
            let after = out.get(shift.stat);
            if after == before {
                // already pinned at a bound
                continue;
            }

            let event = EmotionEvent {
                agent_id: dir.target_id,
                trigger_type: TRIGGER_CONVERSATION.to_string(),
                trigger_source_id: ctx.trigger_source_id.clone(),
                stat_name: shift.stat,
                delta: after - before,
                before,
                after,
                reason: ctx.reason.clone(),
                created_at: now,
            };
            store.append_emotion(&event).await?;
            tracing::debug!(
                "{} {} {} -> {} ({:+})",
                dir.target_id,
                shift.stat,
                before,
                after,
                after - before
            );
            events.push(event);
        }

        if out.differs_from(&dir.target) {
            store.write_stats(dir.target_id, &out).await?;
        }
        Ok(out)
    }
}
