//! Relationship milestones.
//!
//! A milestone fires when a directed relationship score crosses one of a fixed
//! set of thresholds. Emission is guarded only by a claim on
//! `(from, to, code)` in the claim store: whoever inserts the claim first
//! writes the narrative event, every later or concurrent evaluator sees the
//! claim and writes nothing.

use anyhow::Result;
use plaza_core::{
    ClaimKey, ClaimStore, EventLog, NewEvent, RelationshipScores, RelationshipStat, WorldDay,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

pub const MILESTONE_EVENT_TYPE: &str = "RELATIONSHIP_MILESTONE";
pub const MILESTONE_SALIENCE: i32 = 4;
pub const CLAIM_KIND: &str = "relationship";
const DEFAULT_OTHER_NAME: &str = "그 애";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crossing {
    /// before < threshold <= after
    Rising,
    /// before > threshold >= after
    Falling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MilestoneRule {
    pub code: &'static str,
    pub stat: RelationshipStat,
    pub threshold: i32,
    pub crossing: Crossing,
    /// Summary with `{name}` standing for the other agent.
    pub template: &'static str,
}

impl MilestoneRule {
    pub fn fired(&self, before: &RelationshipScores, after: &RelationshipScores) -> bool {
        let b = before.get(self.stat);
        let a = after.get(self.stat);
        match self.crossing {
            Crossing::Rising => b < self.threshold && a >= self.threshold,
            Crossing::Falling => b > self.threshold && a <= self.threshold,
        }
    }

    pub fn summary(&self, other_name: &str) -> String {
        self.template.replace("{name}", other_name)
    }
}

pub static MILESTONE_RULES: [MilestoneRule; 8] = [
    MilestoneRule {
        code: "friend_30",
        stat: RelationshipStat::Affinity,
        threshold: 30,
        crossing: Crossing::Rising,
        template: "{name}랑(과) 꽤 친해졌다.",
    },
    MilestoneRule {
        code: "friend_60",
        stat: RelationshipStat::Affinity,
        threshold: 60,
        crossing: Crossing::Rising,
        template: "{name}랑(과) 거의 베프가 됐다.",
    },
    MilestoneRule {
        code: "enemy_30",
        stat: RelationshipStat::Affinity,
        threshold: -30,
        crossing: Crossing::Falling,
        template: "{name}랑(과) 사이가 크게 틀어졌다.",
    },
    MilestoneRule {
        code: "enemy_60",
        stat: RelationshipStat::Affinity,
        threshold: -60,
        crossing: Crossing::Falling,
        template: "{name}랑(과) 완전히 원수가 된 것 같다.",
    },
    MilestoneRule {
        code: "jealousy_25",
        stat: RelationshipStat::Jealousy,
        threshold: 25,
        crossing: Crossing::Rising,
        template: "{name} 생각만 하면 질투가 올라왔다.",
    },
    MilestoneRule {
        code: "jealousy_40",
        stat: RelationshipStat::Jealousy,
        threshold: 40,
        crossing: Crossing::Rising,
        template: "{name} 생각만 하면 질투가 치밀었다.",
    },
    MilestoneRule {
        code: "rivalry_25",
        stat: RelationshipStat::Rivalry,
        threshold: 25,
        crossing: Crossing::Rising,
        template: "{name}에게 경쟁심이 생겼다.",
    },
    MilestoneRule {
        code: "rivalry_40",
        stat: RelationshipStat::Rivalry,
        threshold: 40,
        crossing: Crossing::Rising,
        template: "{name}에게 강한 경쟁심을 느꼈다.",
    },
];

/// Payload of a `RELATIONSHIP_MILESTONE` event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneEvent {
    pub agent_id: Uuid,
    pub day: WorldDay,
    pub code: String,
    pub stat: RelationshipStat,
    pub threshold: i32,
    pub other_agent_id: Uuid,
    pub other_name: String,
    pub summary: String,
    pub before: RelationshipScores,
    pub after: RelationshipScores,
}

impl MilestoneEvent {
    fn payload(&self) -> serde_json::Value {
        json!({
            "day": self.day,
            "code": self.code,
            "stat": self.stat,
            "threshold": self.threshold,
            "other_agent_id": self.other_agent_id,
            "other_name": self.other_name,
            "summary": self.summary,
            "before": self.before,
            "after": self.after,
        })
    }

    fn claim_value(&self) -> serde_json::Value {
        json!({
            "day": self.day,
            "code": self.code,
            "stat": self.stat,
            "threshold": self.threshold,
            "other": { "id": self.other_agent_id, "name": self.other_name },
            "before": self.before,
            "after": self.after,
        })
    }
}

/// Claim key guarding one milestone of one directed pair.
pub fn milestone_claim_key(from: Uuid, to: Uuid, code: &str) -> ClaimKey {
    ClaimKey::new(from, CLAIM_KIND, format!("milestone:{}:{}", to, code))
}

#[derive(Debug, Clone, Default)]
pub struct MilestoneDetector;

impl MilestoneDetector {
    pub fn new() -> Self {
        Self
    }

    /// Rules crossed between the two (re-clamped) snapshots.
    pub fn crossed(before: &RelationshipScores, after: &RelationshipScores) -> Vec<&'static MilestoneRule> {
        let before = before.clamped();
        let after = after.clamped();
        MILESTONE_RULES.iter().filter(|r| r.fired(&before, &after)).collect()
    }

    /// Record every milestone `from` reached toward `to`.
    ///
    /// A malformed `day` or nil agent id makes this a silent no-op. Returns
    /// only the events this call emitted; milestones already claimed earlier
    /// are skipped.
    #[allow(clippy::too_many_arguments)]
    pub async fn evaluate<S>(
        &self,
        store: &mut S,
        day: &str,
        from: Uuid,
        to: Uuid,
        other_name: &str,
        before: RelationshipScores,
        after: RelationshipScores,
    ) -> Result<Vec<MilestoneEvent>>
    where
        S: ClaimStore + EventLog + ?Sized,
    {
        let Ok(day) = WorldDay::parse(day) else {
            tracing::debug!("Milestone check skipped: bad day {:?}", day);
            return Ok(Vec::new());
        };
        if from.is_nil() || to.is_nil() {
            return Ok(Vec::new());
        }

        let other_name = match other_name.trim() {
            "" => DEFAULT_OTHER_NAME,
            name => name,
        };
        let before = before.clamped();
        let after = after.clamped();

        let mut emitted = Vec::new();
        for rule in Self::crossed(&before, &after) {
            let event = MilestoneEvent {
                agent_id: from,
                day,
                code: rule.code.to_string(),
                stat: rule.stat,
                threshold: rule.threshold,
                other_agent_id: to,
                other_name: other_name.to_string(),
                summary: rule.summary(other_name),
                before,
                after,
            };

            let key = milestone_claim_key(from, to, rule.code);
            if !store.claim(&key, &event.claim_value()).await? {
                tracing::debug!("Milestone {} {} -> {} already claimed", rule.code, from, to);
                continue;
            }

            store
                .append_event(
                    &NewEvent::new(from, MILESTONE_EVENT_TYPE, event.payload()).with_salience(MILESTONE_SALIENCE),
                )
                .await?;
            tracing::info!("Milestone {} reached: {} -> {}", rule.code, from, to);
            emitted.push(event);
        }

        Ok(emitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(before: RelationshipScores, after: RelationshipScores) -> Vec<&'static str> {
        MilestoneDetector::crossed(&before, &after).iter().map(|r| r.code).collect()
    }

    #[test]
    fn test_friend_thresholds() {
        let s = |a| RelationshipScores::new(a, 0, 0);
        assert_eq!(codes(s(29), s(30)), vec!["friend_30"]);
        assert!(codes(s(30), s(30)).is_empty());
        assert_eq!(codes(s(0), s(75)), vec!["friend_30", "friend_60"]);
        // moving away from a threshold never fires
        assert!(codes(s(70), s(10)).is_empty());
    }

    #[test]
    fn test_enemy_thresholds() {
        let s = |a| RelationshipScores::new(a, 0, 0);
        assert_eq!(codes(s(-29), s(-30)), vec!["enemy_30"]);
        assert!(codes(s(-30), s(-45)).is_empty());
        assert_eq!(codes(s(10), s(-60)), vec!["enemy_30", "enemy_60"]);
    }

    #[test]
    fn test_tension_thresholds() {
        assert_eq!(
            codes(RelationshipScores::new(0, 24, 39), RelationshipScores::new(0, 40, 40)),
            vec!["jealousy_25", "jealousy_40", "rivalry_40"]
        );
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped() {
        // before jealousy -50 clamps to 0, after 500 clamps to 100
        assert_eq!(
            codes(RelationshipScores::new(0, -50, 0), RelationshipScores::new(0, 500, 0)),
            vec!["jealousy_25", "jealousy_40"]
        );
        // affinity -300 clamps to -100: still crosses both enemy lines
        assert_eq!(
            codes(RelationshipScores::new(0, 0, 0), RelationshipScores::new(-300, 0, 0)),
            vec!["enemy_30", "enemy_60"]
        );
    }

    #[test]
    fn test_summary_template() {
        let rule = MILESTONE_RULES.iter().find(|r| r.code == "rivalry_25").unwrap();
        assert_eq!(rule.summary("모모"), "모모에게 경쟁심이 생겼다.");
    }

    #[test]
    fn test_claim_key_shape() {
        let from = Uuid::new_v4();
        let to = Uuid::new_v4();
        let key = milestone_claim_key(from, to, "friend_30");
        assert_eq!(key.agent_id, from);
        assert_eq!(key.kind, "relationship");
        assert_eq!(key.key, format!("milestone:{}:friend_30", to));
    }
}
