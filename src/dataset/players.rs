//! Per-player weekly box scores and roster positions.
//!
//! The player file has no opponent or result columns, so those come from the
//! match outcomes for the player's team in that week.

use crate::engine::accumulator::accumulate;
use crate::engine::aggregate::PlayerWeek;
use crate::engine::merger::MatchOutcome;
use crate::engine::types::{EntitySeason, GameRow, Outcome, SeasonError, StatValue};
use crate::feed::teams::TeamDirectory;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::io::Read;
use std::ops::RangeInclusive;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawPlayerGame {
    season: u16,
    week: u32,
    player: String,
    tm_market: String,
    tm_name: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pass_att: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pass_cmp: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pass_yds: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pass_tds: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    pass_int: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    rush_yds: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    rec_yds: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    tackles_combined: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    sacks: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    fumbles: Option<f64>,
}

impl RawPlayerGame {
    fn stats(&self) -> BTreeMap<String, StatValue> {
        let cell = |v: Option<f64>| v.map_or(StatValue::Absent, StatValue::Reported);
        [
            ("pass_attempts", self.pass_att),
            ("pass_completions", self.pass_cmp),
            ("pass_yards", self.pass_yds),
            ("pass_touchdowns", self.pass_tds),
            ("pass_interceptions", self.pass_int),
            ("rushing_yards", self.rush_yds),
            ("receiving_yards", self.rec_yds),
            ("combined_tackles", self.tackles_combined),
            ("sacks", self.sacks),
            ("fumbles", self.fumbles),
        ]
        .into_iter()
        .map(|(name, v)| (name.to_string(), cell(v)))
        .collect()
    }
}

/// One player's game, before opponent/result resolution.
#[derive(Debug, Clone)]
pub struct PlayerGame {
    pub season: u16,
    pub week: u32,
    pub player: String,
    pub team: String,
    pub stats: BTreeMap<String, StatValue>,
}

pub fn parse_player_games<R: Read>(
    reader: R,
    seasons: &RangeInclusive<u16>,
    teams: &TeamDirectory,
) -> Result<Vec<PlayerGame>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    for (line, record) in rdr.deserialize::<RawPlayerGame>().enumerate() {
        let raw = record.with_context(|| format!("invalid player stats record {}", line + 1))?;
        if !seasons.contains(&raw.season) {
            continue;
        }
        let team = teams.canonical(&format!("{} {}", raw.tm_market.trim(), raw.tm_name.trim()));
        out.push(PlayerGame {
            season: raw.season,
            week: raw.week,
            stats: raw.stats(),
            player: raw.player,
            team,
        });
    }
    tracing::info!(rows = out.len(), "loaded player games");
    Ok(out)
}

pub fn load_player_games(
    path: &Path,
    seasons: &RangeInclusive<u16>,
    teams: &TeamDirectory,
) -> Result<Vec<PlayerGame>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open player stats: {}", path.display()))?;
    parse_player_games(file, seasons, teams)
}

/// Player → position, first listing wins.
#[derive(Debug, Default)]
pub struct Roster {
    positions: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
struct RawRosterEntry {
    player: String,
    position: String,
}

impl Roster {
    pub fn parse<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::Reader::from_reader(reader);
        let mut positions = HashMap::new();
        for record in rdr.deserialize::<RawRosterEntry>() {
            let entry = record.context("invalid roster record")?;
            positions.entry(entry.player).or_insert(entry.position);
        }
        Ok(Self { positions })
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open roster: {}", path.display()))?;
        Self::parse(file)
    }

    pub fn position(&self, player: &str) -> Option<&str> {
        self.positions.get(player).map(String::as_str)
    }
}

/// (season, week, team) → (opponent, home, outcome).
struct ScheduleLookup(HashMap<(u16, u32, String), (String, bool, Outcome)>);

impl ScheduleLookup {
    fn new(schedule: &[MatchOutcome]) -> Self {
        let mut map = HashMap::new();
        for m in schedule {
            let home_outcome = Outcome::from_label(m.label);
            map.insert((m.season, m.week, m.home.clone()), (m.away.clone(), true, home_outcome));
            map.insert((m.season, m.week, m.away.clone()), (m.home.clone(), false, home_outcome.inverted()));
        }
        Self(map)
    }

    fn get(&self, season: u16, week: u32, team: &str) -> Option<&(String, bool, Outcome)> {
        self.0.get(&(season, week, team.to_string()))
    }
}

/// Accumulated player rows, plus the player-seasons that could not be built.
#[derive(Debug, Default)]
pub struct PlayerWeeks {
    pub weeks: Vec<PlayerWeek>,
    pub skipped: Vec<SeasonError>,
}

/// Group player games into seasons, resolve each game's context from the
/// schedule, accumulate, and tag every row with team and position.
///
/// Games with no scheduled match for the player's team that week are
/// dropped: without a result they cannot feed a win streak. A player-season
/// that lists the same week twice (two players sharing a name) is skipped
/// and reported; the rest of the dataset is unaffected.
pub fn player_weeks(games: Vec<PlayerGame>, schedule: &[MatchOutcome], roster: &Roster) -> PlayerWeeks {
    let lookup = ScheduleLookup::new(schedule);
    let mut grouped: BTreeMap<(String, u16), Vec<(GameRow, String)>> = BTreeMap::new();
    let mut unscheduled = 0usize;

    for g in games {
        let Some((opponent, home, outcome)) = lookup.get(g.season, g.week, &g.team) else {
            unscheduled += 1;
            continue;
        };
        let row = GameRow {
            week: g.week,
            opponent: opponent.clone(),
            home: *home,
            outcome: *outcome,
            stats: g.stats,
        };
        grouped.entry((g.player, g.season)).or_default().push((row, g.team));
    }
    if unscheduled > 0 {
        tracing::warn!(unscheduled, "player games without a scheduled match were skipped");
    }

    let mut out = PlayerWeeks::default();
    for ((player, season), entries) in grouped {
        let team_by_week: HashMap<u32, String> =
            entries.iter().map(|(row, team)| (row.week, team.clone())).collect();
        let rows: Vec<GameRow> = entries.into_iter().map(|(row, _)| row).collect();
        let entity_season = match EntitySeason::new(&player, season, rows) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(player = %player, season, error = %e, "skipping player season");
                out.skipped.push(e);
                continue;
            }
        };
        let position = roster.position(&player).map(str::to_string);

        for row in accumulate(&entity_season) {
            let team = team_by_week.get(&row.week).cloned().unwrap_or_default();
            out.weeks.push(PlayerWeek {
                team,
                position: position.clone(),
                row,
            });
        }
    }
    out
}
