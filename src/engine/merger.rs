//! Joins per-entity accumulated features into one wide row per matchup.
//!
//! The join key is (season, week, entity), never a game id: an entity's
//! accumulated features for a week do not depend on which matchup asks.

use super::types::AccumulatedRow;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// What to do with a match whose home or away side has no accumulated row.
/// One policy applies to a whole merge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GapPolicy {
    /// Leave the match out of the dataset.
    #[default]
    Drop,
    /// Keep the match with the missing side's features set to null.
    Null,
}

/// A scheduled, finished match. `label` is 1 for a home win, 0 for a home
/// loss and 0.5 for a tie.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchOutcome {
    pub season: u16,
    pub week: u32,
    pub home: String,
    pub away: String,
    pub label: f64,
}

type FeatureKey = (u16, u32, String);

/// Feature lookup by (season, week, entity).
#[derive(Debug, Default)]
pub struct FeatureIndex {
    rows: HashMap<FeatureKey, BTreeMap<String, f64>>,
}

impl FeatureIndex {
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a AccumulatedRow>) -> Self {
        let rows = rows
            .into_iter()
            .map(|r| ((r.season, r.week, r.entity.clone()), r.features()))
            .collect();
        Self { rows }
    }

    pub fn get(&self, season: u16, week: u32, entity: &str) -> Option<&BTreeMap<String, f64>> {
        self.rows.get(&(season, week, entity.to_string()))
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One finished matchup with both sides' prior-only features.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRow {
    pub season: u16,
    pub week: u32,
    pub home: String,
    pub away: String,
    pub label: f64,
    pub home_features: Option<BTreeMap<String, f64>>,
    pub away_features: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Default)]
pub struct MergeOutput {
    pub rows: Vec<TrainingRow>,
    /// Matches with at least one side missing (dropped or nulled per policy).
    pub gaps: usize,
}

pub fn merge(matches: &[MatchOutcome], index: &FeatureIndex, policy: GapPolicy) -> MergeOutput {
    let mut out = MergeOutput::default();

    for m in matches {
        let home = index.get(m.season, m.week, &m.home);
        let away = index.get(m.season, m.week, &m.away);

        if home.is_none() || away.is_none() {
            out.gaps += 1;
            tracing::debug!(
                season = m.season,
                week = m.week,
                home = %m.home,
                away = %m.away,
                home_missing = home.is_none(),
                away_missing = away.is_none(),
                ?policy,
                "merge gap"
            );
            if policy == GapPolicy::Drop {
                continue;
            }
        }

        out.rows.push(TrainingRow {
            season: m.season,
            week: m.week,
            home: m.home.clone(),
            away: m.away.clone(),
            label: m.label,
            home_features: home.cloned(),
            away_features: away.cloned(),
        });
    }

    if out.gaps > 0 {
        tracing::warn!(gaps = out.gaps, ?policy, "matches missing accumulated features");
    }
    out
}

/// Sorted union of feature names over all rows and both sides.
pub fn feature_columns(rows: &[TrainingRow]) -> Vec<String> {
    let names: BTreeSet<&String> = rows
        .iter()
        .flat_map(|r| r.home_features.iter().chain(r.away_features.iter()))
        .flat_map(|f| f.keys())
        .collect();
    names.into_iter().cloned().collect()
}

/// `season, week, home_team, away_team, home_<f>.., away_<f>.., label`.
pub fn header(columns: &[String]) -> Vec<String> {
    let mut h = vec![
        "season".to_string(),
        "week".to_string(),
        "home_team".to_string(),
        "away_team".to_string(),
    ];
    h.extend(columns.iter().map(|c| format!("home_{}", c)));
    h.extend(columns.iter().map(|c| format!("away_{}", c)));
    h.push("label".to_string());
    h
}

impl TrainingRow {
    /// Cells in `header(columns)` order. Null features are empty cells.
    pub fn record(&self, columns: &[String]) -> Vec<String> {
        let side = |features: &Option<BTreeMap<String, f64>>, name: &String| {
            features
                .as_ref()
                .and_then(|f| f.get(name))
                .map(|v| format_value(*v))
                .unwrap_or_default()
        };

        let mut r = vec![
            self.season.to_string(),
            self.week.to_string(),
            self.home.clone(),
            self.away.clone(),
        ];
        r.extend(columns.iter().map(|c| side(&self.home_features, c)));
        r.extend(columns.iter().map(|c| side(&self.away_features, c)));
        r.push(format_value(self.label));
        r
    }
}

/// Integers print without a fraction, everything else rounded to 2 decimals.
pub fn format_value(v: f64) -> String {
    if v.fract() == 0.0 {
        format!("{}", v as i64)
    } else {
        let rounded = format!("{:.2}", v);
        match rounded.trim_end_matches('0').trim_end_matches('.') {
            "-0" => "0".to_string(),
            s => s.to_string(),
        }
    }
}

/// Derive the schedule from accumulated team rows. Each game appears in both
/// teams' tables; the home side's row wins, and a game only seen from the
/// road side gets its label inverted.
pub fn schedule_from_games(rows: &[AccumulatedRow]) -> Vec<MatchOutcome> {
    let mut games: BTreeMap<(u16, u32, String, String), MatchOutcome> = BTreeMap::new();

    let pair_key = |r: &AccumulatedRow| {
        let (a, b) = if r.entity <= r.opponent {
            (r.entity.clone(), r.opponent.clone())
        } else {
            (r.opponent.clone(), r.entity.clone())
        };
        (r.season, r.week, a, b)
    };

    for r in rows.iter().filter(|r| r.home) {
        games.entry(pair_key(r)).or_insert_with(|| MatchOutcome {
            season: r.season,
            week: r.week,
            home: r.entity.clone(),
            away: r.opponent.clone(),
            label: r.outcome.label(),
        });
    }
    for r in rows.iter().filter(|r| !r.home) {
        games.entry(pair_key(r)).or_insert_with(|| MatchOutcome {
            season: r.season,
            week: r.week,
            home: r.opponent.clone(),
            away: r.entity.clone(),
            label: r.outcome.inverted().label(),
        });
    }

    games.into_values().collect()
}
