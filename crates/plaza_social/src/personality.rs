//! Sensitivity coefficients for emotional propagation.
//!
//! The personality code is a 4-letter MBTI-style string used purely as a
//! lookup key. It is not validated against the 16 canonical types: every
//! letter present contributes its factor, so synthetic codes such as "EIFT"
//! stack both sides of an axis.

use plaza_core::StatName;

/// How strongly a target with `code` reacts to a shift in `stat`.
/// Absent codes, or codes that are not exactly four characters, are neutral.
pub fn personality_coefficient(code: Option<&str>, stat: StatName) -> f64 {
    let Some(code) = code else {
        return 1.0;
    };
    let t = code.trim().to_uppercase();
    if t.chars().count() != 4 {
        return 1.0;
    }

    let mut c = 1.0;
    if t.contains('E') {
        c *= 1.3;
    }
    if t.contains('I') {
        c *= 0.7;
    }

    match stat {
        StatName::Mood | StatName::Stress => {
            if t.contains('F') {
                c *= 1.25;
            }
            if t.contains('T') {
                c *= 0.8;
            }
        }
        StatName::Curiosity => {
            if t.contains('N') {
                c *= 1.35;
            }
            if t.contains('S') {
                c *= 0.85;
            }
        }
    }

    if t.contains('J') {
        c *= 0.95;
    }
    if t.contains('P') {
        c *= 1.05;
    }
    c
}

/// Closer relationships amplify contagion; hostile ones damp it.
pub fn affinity_coefficient(affinity: i32) -> f64 {
    if affinity >= 60 {
        1.25
    } else if affinity >= 30 {
        1.1
    } else if affinity <= -40 {
        0.85
    } else {
        1.0
    }
}
