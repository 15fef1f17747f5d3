//! Roll player-level accumulated rows up into team-level feature rows.

use super::types::AccumulatedRow;
use std::collections::BTreeMap;

/// An accumulated player row tagged with the team the player suited up for
/// that week and the player's roster position.
#[derive(Debug, Clone)]
pub struct PlayerWeek {
    pub team: String,
    pub position: Option<String>,
    pub row: AccumulatedRow,
}

#[derive(Debug, Clone)]
pub struct RollupSpec {
    /// Only players at these positions contribute.
    pub positions: Vec<String>,
    /// Prior sums carried into the team row (summed over contributors).
    pub summed_priors: Vec<String>,
}

impl Default for RollupSpec {
    fn default() -> Self {
        Self {
            positions: vec!["QB".to_string()],
            summed_priors: vec!["rushing_yards".to_string(), "fumbles".to_string()],
        }
    }
}

/// One team row per (team, season, week), sorted by that key.
///
/// The team row sums contributors' ratings and the selected prior sums; its
/// streak is the longest contributor streak. Game context is taken from the
/// first contributor.
pub fn team_rollup(players: &[PlayerWeek], spec: &RollupSpec) -> Vec<AccumulatedRow> {
    let mut teams: BTreeMap<(String, u16, u32), AccumulatedRow> = BTreeMap::new();

    let eligible = players.iter().filter(|p| {
        p.position
            .as_deref()
            .is_some_and(|pos| spec.positions.iter().any(|want| want == pos))
    });

    for p in eligible {
        let key = (p.team.clone(), p.row.season, p.row.week);
        let team_row = teams.entry(key).or_insert_with(|| AccumulatedRow {
            entity: p.team.clone(),
            season: p.row.season,
            week: p.row.week,
            opponent: p.row.opponent.clone(),
            home: p.row.home,
            outcome: p.row.outcome,
            prior: spec.summed_priors.iter().map(|n| (n.clone(), 0.0)).collect(),
            rating: 0.0,
            win_streak: 0,
        });

        for name in &spec.summed_priors {
            let v = p.row.prior.get(name).copied().unwrap_or(0.0);
            if let Some(total) = team_row.prior.get_mut(name) {
                *total += v;
            }
        }
        team_row.rating += p.row.rating;
        team_row.win_streak = team_row.win_streak.max(p.row.win_streak);
    }

    teams.into_values().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Outcome;

    fn player(name: &str, team: &str, pos: Option<&str>, week: u32, rating: f64, rush: f64) -> PlayerWeek {
        PlayerWeek {
            team: team.into(),
            position: pos.map(str::to_string),
            row: AccumulatedRow {
                entity: name.into(),
                season: 2021,
                week,
                opponent: "det".into(),
                home: true,
                outcome: Outcome::Win,
                prior: [
                    ("rushing_yards".to_string(), rush),
                    ("fumbles".to_string(), 1.0),
                    ("pass_yards".to_string(), 900.0),
                ]
                .into_iter()
                .collect(),
                rating,
                win_streak: week - 1,
            },
        }
    }

    #[test]
    fn test_sums_qbs_per_team_week() {
        let players = vec![
            player("Starter", "kan", Some("QB"), 3, 80.0, 40.0),
            player("Backup", "kan", Some("QB"), 3, 10.0, 5.0),
            player("Back", "kan", Some("RB"), 3, 0.0, 300.0),
        ];
        let teams = team_rollup(&players, &RollupSpec::default());
        assert_eq!(teams.len(), 1);
        let t = &teams[0];
        assert_eq!(t.entity, "kan");
        assert_eq!(t.rating, 90.0);
        assert_eq!(t.prior["rushing_yards"], 45.0);
        assert_eq!(t.prior["fumbles"], 2.0);
        assert!(!t.prior.contains_key("pass_yards"));
        assert_eq!(t.win_streak, 2);
    }

    #[test]
    fn test_unknown_position_excluded() {
        let players = vec![player("Mystery", "kan", None, 1, 50.0, 0.0)];
        assert!(team_rollup(&players, &RollupSpec::default()).is_empty());
    }

    #[test]
    fn test_rows_sorted_by_team_then_week() {
        let players = vec![
            player("A", "was", Some("QB"), 2, 1.0, 0.0),
            player("B", "kan", Some("QB"), 2, 1.0, 0.0),
            player("B", "kan", Some("QB"), 1, 1.0, 0.0),
        ];
        let keys: Vec<(String, u32)> = team_rollup(&players, &RollupSpec::default())
            .into_iter()
            .map(|r| (r.entity, r.week))
            .collect();
        assert_eq!(keys, vec![("kan".into(), 1), ("kan".into(), 2), ("was".into(), 2)]);
    }
}
