//! Prior-only cumulative features for one entity-season.
//!
//! Row i carries, for every stat, the sum over rows 0..i-1 (a shift-by-one
//! prefix sum), so a row's features are known before its game is played.
//! The composite rating and the win streak follow the same rule.

use super::rating::{composite_rating, PassingTotals};
use super::types::{AccumulatedRow, EntitySeason, Outcome};
use std::collections::BTreeMap;

/// Running count of consecutive wins.
#[derive(Debug, Default)]
struct WinStreak {
    current: u32,
}

impl WinStreak {
    /// Emit the streak ending at the previous game, then record this one.
    fn advance(&mut self, outcome: Outcome) -> u32 {
        let emitted = self.current;
        self.current = if outcome.is_win() { self.current + 1 } else { 0 };
        emitted
    }
}

/// One `AccumulatedRow` per game, same order. Row 0 is all zeros.
pub fn accumulate(season: &EntitySeason) -> Vec<AccumulatedRow> {
    let mut running: BTreeMap<String, f64> = season
        .stat_names()
        .into_iter()
        .map(|name| (name, 0.0))
        .collect();
    let mut streak = WinStreak::default();

    season
        .games()
        .iter()
        .map(|game| {
            let prior = running.clone();
            let rating = composite_rating(&PassingTotals::from_sums(&prior));
            let win_streak = streak.advance(game.outcome);

            for (name, total) in running.iter_mut() {
                *total += game.stat(name);
            }

            AccumulatedRow {
                entity: season.entity().to_string(),
                season: season.season(),
                week: game.week,
                opponent: game.opponent.clone(),
                home: game.home,
                outcome: game.outcome,
                prior,
                rating,
                win_streak,
            }
        })
        .collect()
}

/// Drop the first `weeks` weeks of a season after accumulation, so their
/// games still count toward the history of later rows.
pub fn trim_opening_weeks(rows: Vec<AccumulatedRow>, weeks: u32) -> Vec<AccumulatedRow> {
    if weeks == 0 {
        return rows;
    }
    rows.into_iter().filter(|r| r.week > weeks).collect()
}
