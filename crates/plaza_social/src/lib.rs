//! # Plaza social dynamics
//!
//! Three independent pieces an orchestrator runs after agents meet:
//!
//! - [`StatPropagationEngine`]: small mood/stress/curiosity shifts between two
//!   agents, weighted by personality code and affinity.
//! - [`MilestoneDetector`]: narrative beats when a directed relationship
//!   crosses a threshold, emitted at most once per pair and milestone.
//! - [`CausalTraceBuilder`]: a best-effort "butterfly" report linking a
//!   player's interventions to what happened to the target afterwards.
//!
//! None of them commit. They all run inside the caller's transaction.

pub mod butterfly;
pub mod contagion;
pub mod milestone;
mod personality;

pub use butterfly::{CausalEffect, CausalEffectReport, CausalTraceBuilder, Consequence};
pub use contagion::{InteractionContext, InteractionOutcome, StatPropagationEngine};
pub use milestone::{MilestoneDetector, MilestoneEvent, MilestoneRule, MILESTONE_RULES};
pub use personality::{affinity_coefficient, personality_coefficient};
