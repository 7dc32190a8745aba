//! Property-based tests for plaza_core.
//!
//! Stat arithmetic must stay inside its bounds for every input, and day
//! parsing must accept exactly the canonical form of real dates.

use chrono::{Duration, NaiveDate};
use plaza_core::stats::{clamp_delta, clamp_stat, round_half_up, MAX_STEP_DELTA};
use plaza_core::{AgentPair, AgentStats, RelationshipScores, StatName, WorldDay};
use proptest::prelude::*;
use uuid::Uuid;

// ============================================================================
// Strategies
// ============================================================================

fn arb_uuid() -> impl Strategy<Value = Uuid> {
    any::<u128>().prop_map(Uuid::from_u128)
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..3_200_000).prop_map(|d| NaiveDate::from_ymd_opt(1000, 1, 1).unwrap() + Duration::days(d))
}

// ============================================================================
// Stat arithmetic
// ============================================================================

proptest! {
    #[test]
    fn clamp_delta_stays_within_one_step(v in proptest::num::f64::ANY) {
        let d = clamp_delta(v);
        prop_assert!(d.abs() <= MAX_STEP_DELTA);
    }

    #[test]
    fn clamp_delta_is_nearest_integer_inside_step(v in -10.0f64..=10.0) {
        let d = clamp_delta(v) as f64;
        prop_assert!((d - v).abs() <= 0.5);
    }

    #[test]
    fn round_half_up_ties_go_up(n in -1000i64..1000) {
        let tie = n as f64 + 0.5;
        prop_assert_eq!(round_half_up(tie), (n + 1) as f64);
    }

    #[test]
    fn stats_always_in_range(m in any::<i32>(), s in any::<i32>(), c in any::<i32>(), extra in any::<i32>()) {
        let mut stats = AgentStats::new(m, s, c, 0);
        for stat in StatName::ALL {
            stats.set(stat, stats.get(stat).saturating_add(extra));
            prop_assert!((0..=100).contains(&stats.get(stat)));
        }
        prop_assert!((0..=100).contains(&clamp_stat(extra as i64 * 3)));
    }

    #[test]
    fn relationship_clamp_is_idempotent(a in any::<i32>(), j in any::<i32>(), r in any::<i32>()) {
        let once = RelationshipScores::new(a, j, r).clamped();
        prop_assert_eq!(once, once.clamped());
    }

    #[test]
    fn pair_order_is_canonical(a in arb_uuid(), b in arb_uuid()) {
        let ab = AgentPair::new(a, b);
        prop_assert_eq!(ab, AgentPair::new(b, a));
        let [low, high] = ab.ids();
        prop_assert!(low <= high);
        prop_assert!((low == a && high == b) || (low == b && high == a));
    }
}

// ============================================================================
// World days
// ============================================================================

proptest! {
    #[test]
    fn canonical_days_parse(date in arb_date()) {
        let text = date.format("%Y-%m-%d").to_string();
        let day = WorldDay::parse(&text).unwrap();
        prop_assert_eq!(day.date(), date);
        prop_assert_eq!(day.to_string(), text);
    }

    #[test]
    fn non_canonical_days_rejected(s in "[0-9/ .a-z]{0,12}") {
        // No dash anywhere means the YYYY-MM-DD shape cannot match
        prop_assert!(WorldDay::parse(&s).is_err());
    }
}
