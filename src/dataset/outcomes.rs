//! Historical match results (one row per game, final scores).

use crate::engine::merger::MatchOutcome;
use crate::feed::teams::TeamDirectory;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::io::Read;
use std::ops::RangeInclusive;
use std::path::Path;

#[derive(Debug, Deserialize)]
struct RawOutcome {
    schedule_season: u16,
    schedule_week: String,
    team_home: String,
    team_away: String,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    score_home: Option<f64>,
    #[serde(default, deserialize_with = "csv::invalid_option")]
    score_away: Option<f64>,
}

/// 1 home win, 0 home loss, 0.5 tie.
pub fn winner_label(score_home: f64, score_away: f64) -> f64 {
    if score_home > score_away {
        1.0
    } else if score_home < score_away {
        0.0
    } else {
        0.5
    }
}

/// Regular-season outcomes within `seasons`. Playoff rounds carry a named
/// week ("Wildcard", "Superbowl", ...) and are skipped along with games that
/// have no final score.
pub fn parse_match_outcomes<R: Read>(
    reader: R,
    seasons: &RangeInclusive<u16>,
    teams: &TeamDirectory,
) -> Result<Vec<MatchOutcome>> {
    let mut rdr = csv::Reader::from_reader(reader);
    let mut out = Vec::new();
    let mut skipped = 0usize;

    for (line, record) in rdr.deserialize::<RawOutcome>().enumerate() {
        let raw = record.with_context(|| format!("invalid match outcome record {}", line + 1))?;
        if !seasons.contains(&raw.schedule_season) {
            continue;
        }
        let Ok(week) = raw.schedule_week.trim().parse::<u32>() else {
            skipped += 1;
            continue;
        };
        let (Some(home_score), Some(away_score)) = (raw.score_home, raw.score_away) else {
            skipped += 1;
            continue;
        };
        out.push(MatchOutcome {
            season: raw.schedule_season,
            week,
            home: teams.canonical(&raw.team_home),
            away: teams.canonical(&raw.team_away),
            label: winner_label(home_score, away_score),
        });
    }

    tracing::info!(matches = out.len(), skipped, "loaded match outcomes");
    Ok(out)
}

pub fn load_match_outcomes(
    path: &Path,
    seasons: &RangeInclusive<u16>,
    teams: &TeamDirectory,
) -> Result<Vec<MatchOutcome>> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open match outcomes: {}", path.display()))?;
    parse_match_outcomes(file, seasons, teams)
}
