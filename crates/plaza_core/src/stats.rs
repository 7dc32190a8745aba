//! Agent stat snapshot and the numeric bounds every writer must respect.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub const STAT_MIN: i32 = 0;
pub const STAT_MAX: i32 = 100;

/// Largest magnitude a single propagation step may move one stat.
pub const MAX_STEP_DELTA: i32 = 10;

/// Per-agent emotional stats, each in [0, 100].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AgentStats {
    pub mood: i32,
    pub stress: i32,
    pub curiosity: i32,
    /// Read-only here; owned by the bond/care systems.
    pub bond: i32,
}

impl AgentStats {
    pub fn new(mood: i32, stress: i32, curiosity: i32, bond: i32) -> Self {
        Self {
            mood,
            stress,
            curiosity,
            bond,
        }
        .clamped()
    }

    /// Copy with every stat forced into range.
    pub fn clamped(self) -> Self {
        Self {
            mood: clamp_stat(self.mood as i64),
            stress: clamp_stat(self.stress as i64),
            curiosity: clamp_stat(self.curiosity as i64),
            bond: clamp_stat(self.bond as i64),
        }
    }

    pub fn get(&self, stat: StatName) -> i32 {
        match stat {
            StatName::Mood => self.mood,
            StatName::Stress => self.stress,
            StatName::Curiosity => self.curiosity,
        }
    }

    pub fn set(&mut self, stat: StatName, value: i32) {
        let value = clamp_stat(value as i64);
        match stat {
            StatName::Mood => self.mood = value,
            StatName::Stress => self.stress = value,
            StatName::Curiosity => self.curiosity = value,
        }
    }

    /// True when mood, stress or curiosity differ. Bond is ignored.
    pub fn differs_from(&self, other: &AgentStats) -> bool {
        StatName::ALL.iter().any(|s| self.get(*s) != other.get(*s))
    }
}

/// The stats emotional propagation can move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatName {
    Mood,
    Stress,
    Curiosity,
}

impl StatName {
    pub const ALL: [StatName; 3] = [StatName::Mood, StatName::Stress, StatName::Curiosity];

    pub fn as_str(&self) -> &'static str {
        match self {
            StatName::Mood => "mood",
            StatName::Stress => "stress",
            StatName::Curiosity => "curiosity",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "mood" => Some(StatName::Mood),
            "stress" => Some(StatName::Stress),
            "curiosity" => Some(StatName::Curiosity),
            _ => None,
        }
    }
}

impl fmt::Display for StatName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An unordered pair of agents, stored sorted so that every caller locks
/// rows in the same order regardless of argument order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentPair {
    low: Uuid,
    high: Uuid,
}

impl AgentPair {
    pub fn new(a: Uuid, b: Uuid) -> Self {
        if a <= b {
            Self { low: a, high: b }
        } else {
            Self { low: b, high: a }
        }
    }

    pub fn ids(&self) -> [Uuid; 2] {
        [self.low, self.high]
    }
}

pub fn clamp_stat(v: i64) -> i32 {
    v.clamp(STAT_MIN as i64, STAT_MAX as i64) as i32
}

/// Round a scaled delta (half-up) and bound it to one step.
pub fn clamp_delta(v: f64) -> i32 {
    if !v.is_finite() {
        return 0;
    }
    let rounded = round_half_up(v);
    rounded.clamp(-(MAX_STEP_DELTA as f64), MAX_STEP_DELTA as f64) as i32
}

/// Rounds .5 toward positive infinity (-2.5 -> -2, 2.5 -> 3).
pub fn round_half_up(v: f64) -> f64 {
    (v + 0.5).floor()
}
