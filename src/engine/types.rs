use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// A stat cell as read from the source. Absent cells count as zero
/// ("did not occur") but stay distinguishable from a reported zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StatValue {
    Reported(f64),
    Absent,
}

impl StatValue {
    pub fn value(self) -> f64 {
        match self {
            StatValue::Reported(v) => v,
            StatValue::Absent => 0.0,
        }
    }

    pub fn is_reported(self) -> bool {
        matches!(self, StatValue::Reported(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Win,
    Loss,
    Tie,
}

impl Outcome {
    /// Ties are not wins: they end a streak like a loss does.
    pub fn is_win(self) -> bool {
        self == Outcome::Win
    }

    /// 1 for a win, 0 for a loss, 0.5 for a tie.
    pub fn label(self) -> f64 {
        match self {
            Outcome::Win => 1.0,
            Outcome::Loss => 0.0,
            Outcome::Tie => 0.5,
        }
    }

    /// Inverse of [`Outcome::label`]; anything between 0 and 1 reads as a tie.
    pub fn from_label(label: f64) -> Self {
        if label > 0.5 {
            Outcome::Win
        } else if label < 0.5 {
            Outcome::Loss
        } else {
            Outcome::Tie
        }
    }

    /// The same game seen from the other side.
    pub fn inverted(self) -> Self {
        match self {
            Outcome::Win => Outcome::Loss,
            Outcome::Loss => Outcome::Win,
            Outcome::Tie => Outcome::Tie,
        }
    }
}

/// One game for one entity. Immutable once extracted.
#[derive(Debug, Clone, PartialEq)]
pub struct GameRow {
    pub week: u32,
    pub opponent: String,
    pub home: bool,
    pub outcome: Outcome,
    pub stats: BTreeMap<String, StatValue>,
}

impl GameRow {
    /// Stat value with the zero-fill policy applied (missing key or absent cell → 0).
    pub fn stat(&self, name: &str) -> f64 {
        self.stats.get(name).map_or(0.0, |v| v.value())
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum SeasonError {
    #[error("{entity} {season}: week {week} appears more than once")]
    DuplicateWeek { entity: String, season: u16, week: u32 },
}

/// All games of one entity in one season, weeks strictly increasing.
#[derive(Debug, Clone, PartialEq)]
pub struct EntitySeason {
    entity: String,
    season: u16,
    games: Vec<GameRow>,
}

impl EntitySeason {
    /// Sort by week and reject duplicate weeks.
    pub fn new(entity: &str, season: u16, mut games: Vec<GameRow>) -> Result<Self, SeasonError> {
        games.sort_by_key(|g| g.week);
        if let Some(pair) = games.windows(2).find(|w| w[0].week == w[1].week) {
            return Err(SeasonError::DuplicateWeek {
                entity: entity.to_string(),
                season,
                week: pair[0].week,
            });
        }
        Ok(Self {
            entity: entity.to_string(),
            season,
            games,
        })
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn season(&self) -> u16 {
        self.season
    }

    pub fn games(&self) -> &[GameRow] {
        &self.games
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Every stat name that appears in any game of the season.
    pub fn stat_names(&self) -> BTreeSet<String> {
        self.games
            .iter()
            .flat_map(|g| g.stats.keys().cloned())
            .collect()
    }

    /// Inner join with another table of the same entity-season on week.
    /// Game context comes from `self`; on a stat-name collision `self` wins.
    pub fn join(&self, other: &EntitySeason) -> EntitySeason {
        let by_week: BTreeMap<u32, &GameRow> = other.games.iter().map(|g| (g.week, g)).collect();
        let games = self
            .games
            .iter()
            .filter_map(|game| {
                let extra = by_week.get(&game.week)?;
                let mut merged = game.clone();
                for (name, value) in &extra.stats {
                    merged.stats.entry(name.clone()).or_insert(*value);
                }
                Some(merged)
            })
            .collect();
        EntitySeason {
            entity: self.entity.clone(),
            season: self.season,
            games,
        }
    }
}

/// Features for one (entity, season, week) computed only from earlier games.
///
/// `opponent`, `home` and `outcome` describe the game itself; they are kept
/// for season files and schedule derivation and never become features.
#[derive(Debug, Clone, PartialEq)]
pub struct AccumulatedRow {
    pub entity: String,
    pub season: u16,
    pub week: u32,
    pub opponent: String,
    pub home: bool,
    pub outcome: Outcome,
    /// Sum of each stat over strictly earlier weeks.
    pub prior: BTreeMap<String, f64>,
    pub rating: f64,
    /// Consecutive wins ending at the previous game.
    pub win_streak: u32,
}

impl AccumulatedRow {
    /// Feature columns: `<stat>_accum` for every prior sum, then `rating` and `win_streak`.
    pub fn features(&self) -> BTreeMap<String, f64> {
        let mut out: BTreeMap<String, f64> = self
            .prior
            .iter()
            .map(|(name, v)| (format!("{}_accum", name), *v))
            .collect();
        out.insert("rating".to_string(), self.rating);
        out.insert("win_streak".to_string(), self.win_streak as f64);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(week: u32, stats: &[(&str, StatValue)]) -> GameRow {
        GameRow {
            week,
            opponent: "opp".into(),
            home: true,
            outcome: Outcome::Win,
            stats: stats.iter().map(|(k, v)| (k.to_string(), *v)).collect(),
        }
    }

    #[test]
    fn test_absent_reads_zero_but_is_not_reported() {
        assert_eq!(StatValue::Absent.value(), 0.0);
        assert!(!StatValue::Absent.is_reported());
        assert!(StatValue::Reported(0.0).is_reported());
        let g = game(1, &[("pass_attempts", StatValue::Absent)]);
        assert_eq!(g.stat("pass_attempts"), 0.0);
        assert_eq!(g.stat("not_a_column"), 0.0);
    }

    #[test]
    fn test_tie_is_half_and_symmetric() {
        assert!(!Outcome::Tie.is_win());
        assert_eq!(Outcome::Tie.label(), 0.5);
        assert_eq!(Outcome::Tie.inverted(), Outcome::Tie);
        assert_eq!(Outcome::Win.inverted(), Outcome::Loss);
        for o in [Outcome::Win, Outcome::Loss, Outcome::Tie] {
            assert_eq!(Outcome::from_label(o.label()), o);
        }
    }

    #[test]
    fn test_season_sorts_by_week() {
        let s = EntitySeason::new("kan", 2023, vec![game(3, &[]), game(1, &[]), game(2, &[])]).unwrap();
        let weeks: Vec<u32> = s.games().iter().map(|g| g.week).collect();
        assert_eq!(weeks, vec![1, 2, 3]);
    }

    #[test]
    fn test_season_rejects_duplicate_week() {
        let err = EntitySeason::new("kan", 2023, vec![game(1, &[]), game(1, &[])]).unwrap_err();
        assert_eq!(
            err,
            SeasonError::DuplicateWeek { entity: "kan".into(), season: 2023, week: 1 }
        );
    }

    #[test]
    fn test_join_is_inner_on_week() {
        let general = EntitySeason::new(
            "kan",
            2023,
            vec![
                game(1, &[("pass_attempts", StatValue::Reported(30.0))]),
                game(2, &[("pass_attempts", StatValue::Reported(25.0))]),
            ],
        )
        .unwrap();
        let defense = EntitySeason::new(
            "kan",
            2023,
            vec![game(2, &[("defense_turnovers", StatValue::Reported(3.0))])],
        )
        .unwrap();

        let joined = general.join(&defense);
        assert_eq!(joined.games().len(), 1);
        assert_eq!(joined.games()[0].week, 2);
        assert_eq!(joined.games()[0].stat("pass_attempts"), 25.0);
        assert_eq!(joined.games()[0].stat("defense_turnovers"), 3.0);
    }

    #[test]
    fn test_features_are_namespaced() {
        let row = AccumulatedRow {
            entity: "kan".into(),
            season: 2023,
            week: 2,
            opponent: "det".into(),
            home: true,
            outcome: Outcome::Win,
            prior: [("pass_yards".to_string(), 250.0)].into_iter().collect(),
            rating: 88.5,
            win_streak: 1,
        };
        let f = row.features();
        assert_eq!(f["pass_yards_accum"], 250.0);
        assert_eq!(f["rating"], 88.5);
        assert_eq!(f["win_streak"], 1.0);
        assert!(!f.contains_key("pass_yards"));
    }
}
