use serde::{Deserialize, Serialize};
use std::fmt;

/// Directed relationship scores from one agent toward another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RelationshipScores {
    /// -100 (hostile) to 100 (close)
    pub affinity: i32,
    /// 0 to 100
    pub jealousy: i32,
    /// 0 to 100
    pub rivalry: i32,
}

impl RelationshipScores {
    pub fn new(affinity: i32, jealousy: i32, rivalry: i32) -> Self {
        Self {
            affinity,
            jealousy,
            rivalry,
        }
    }

    /// Copy forced into the canonical ranges.
    pub fn clamped(self) -> Self {
        Self {
            affinity: self.affinity.clamp(-100, 100),
            jealousy: self.jealousy.clamp(0, 100),
            rivalry: self.rivalry.clamp(0, 100),
        }
    }

    pub fn get(&self, stat: RelationshipStat) -> i32 {
        match stat {
            RelationshipStat::Affinity => self.affinity,
            RelationshipStat::Jealousy => self.jealousy,
            RelationshipStat::Rivalry => self.rivalry,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipStat {
    Affinity,
    Jealousy,
    Rivalry,
}

impl RelationshipStat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipStat::Affinity => "affinity",
            RelationshipStat::Jealousy => "jealousy",
            RelationshipStat::Rivalry => "rivalry",
        }
    }
}

impl fmt::Display for RelationshipStat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
