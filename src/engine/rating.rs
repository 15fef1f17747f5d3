//! Passer-efficiency composite rating.
//!
//! ```text
//! rating = ( max((C/A*100 - 30) * 0.05, 0)
//!          + max((Y/A - 3) * 0.25, 0)
//!          + max(T/A*100 * 0.2, 0)
//!          + max(2.375 - I/A*100 * 0.25, 0) ) / 6 * 100
//! ```
//!
//! Each component is floored at zero before the sum and none is capped above.
//! Inputs are always the *prior* cumulative sums, never a single game's line.

use std::collections::BTreeMap;

pub const PASS_COMPLETIONS: &str = "pass_completions";
pub const PASS_ATTEMPTS: &str = "pass_attempts";
pub const PASS_YARDS: &str = "pass_yards";
pub const PASS_TOUCHDOWNS: &str = "pass_touchdowns";
pub const PASS_INTERCEPTIONS: &str = "pass_interceptions";

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PassingTotals {
    pub completions: f64,
    pub attempts: f64,
    pub yards: f64,
    pub touchdowns: f64,
    pub interceptions: f64,
}

impl PassingTotals {
    /// Pull the passing sums out of a stat map; missing names read as 0.
    pub fn from_sums(sums: &BTreeMap<String, f64>) -> Self {
        let get = |name: &str| sums.get(name).copied().unwrap_or(0.0);
        Self {
            completions: get(PASS_COMPLETIONS),
            attempts: get(PASS_ATTEMPTS),
            yards: get(PASS_YARDS),
            touchdowns: get(PASS_TOUCHDOWNS),
            interceptions: get(PASS_INTERCEPTIONS),
        }
    }
}

/// Composite rating rounded to 2 decimals. Exactly 0 with no attempts.
pub fn composite_rating(t: &PassingTotals) -> f64 {
    if t.attempts <= 0.0 {
        return 0.0;
    }
    let a = t.attempts;
    let completion = ((t.completions / a * 100.0 - 30.0) * 0.05).max(0.0);
    let yards = ((t.yards / a - 3.0) * 0.25).max(0.0);
    let touchdowns = (t.touchdowns / a * 100.0 * 0.2).max(0.0);
    let interceptions = (2.375 - (t.interceptions / a * 100.0 * 0.25)).max(0.0);

    let raw = (completion + yards + touchdowns + interceptions) / 6.0 * 100.0;
    (raw * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_attempts_is_zero() {
        let t = PassingTotals {
            completions: 20.0,
            attempts: 0.0,
            yards: 300.0,
            touchdowns: 3.0,
            interceptions: 0.0,
        };
        assert_eq!(composite_rating(&t), 0.0);
        assert_eq!(composite_rating(&PassingTotals::default()), 0.0);
    }

    #[test]
    fn test_typical_line() {
        // 20/30, 250 yds, 2 TD, 1 INT
        let t = PassingTotals {
            completions: 20.0,
            attempts: 30.0,
            yards: 250.0,
            touchdowns: 2.0,
            interceptions: 1.0,
        };
        // a=1.8333, b=1.3333, c=1.3333, d=1.5417 → 6.0417/6*100
        assert!((composite_rating(&t) - 100.69).abs() < 1e-9);
    }

    #[test]
    fn test_components_floored_before_sum() {
        // 5/30 completion% and 1.67 yds/att both go negative and must clamp to 0
        // rather than drag the touchdown/interception components down.
        let t = PassingTotals {
            completions: 5.0,
            attempts: 30.0,
            yards: 50.0,
            touchdowns: 0.0,
            interceptions: 0.0,
        };
        // only the interception component survives: 2.375/6*100
        assert!((composite_rating(&t) - 39.58).abs() < 1e-9);
    }

    #[test]
    fn test_interception_component_floors_at_zero() {
        let t = PassingTotals {
            completions: 0.0,
            attempts: 10.0,
            yards: 0.0,
            touchdowns: 0.0,
            interceptions: 5.0,
        };
        assert_eq!(composite_rating(&t), 0.0);
    }

    #[test]
    fn test_from_sums_reads_named_fields() {
        let sums: BTreeMap<String, f64> = [
            (PASS_ATTEMPTS.to_string(), 30.0),
            (PASS_COMPLETIONS.to_string(), 20.0),
            ("rushing_yards".to_string(), 99.0),
        ]
        .into_iter()
        .collect();
        let t = PassingTotals::from_sums(&sums);
        assert_eq!(t.attempts, 30.0);
        assert_eq!(t.completions, 20.0);
        assert_eq!(t.yards, 0.0);
    }
}
