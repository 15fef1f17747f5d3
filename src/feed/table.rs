//! Game-table extraction from stats-site pages.
//!
//! Cells are addressed by their `data-stat` attribute. Which columns hold the
//! week, opponent, result and stats, and which literal markers flag playoff,
//! bye and canceled rows, is all data in a [`TableLayout`] so another sport or
//! page only needs a different layout.

use super::teams::TeamDirectory;
use super::types::Document;
use crate::engine::types::{GameRow, Outcome, StatValue};
use scraper::{ElementRef, Selector};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ExtractError {
    #[error("table '{table}' not found in {url}")]
    TableNotFound { table: String, url: String },

    #[error("table '{table}' column '{column}' has invalid value '{value}'")]
    InvalidField {
        table: String,
        column: String,
        value: String,
    },

    #[error("invalid selector '{0}'")]
    Selector(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Integer,
    Fractional,
}

/// Maps one source column to a canonical stat name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StatColumn {
    pub column: String,
    pub name: String,
    #[serde(default = "default_kind")]
    pub kind: FieldKind,
}

fn default_kind() -> FieldKind {
    FieldKind::Integer
}

impl StatColumn {
    fn new(column: &str, name: &str, kind: FieldKind) -> Self {
        Self {
            column: column.to_string(),
            name: name.to_string(),
            kind,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TableLayout {
    pub week_column: String,
    pub date_column: String,
    pub opponent_column: String,
    pub location_column: String,
    pub result_column: String,
    pub status_column: String,
    pub playoffs_marker: String,
    pub bye_marker: String,
    pub canceled_marker: String,
    /// Location cell value for road games.
    pub away_marker: String,
    pub win_marker: String,
    pub tie_marker: String,
    pub stats: Vec<StatColumn>,
}

impl Default for TableLayout {
    fn default() -> Self {
        Self {
            week_column: "week_num".to_string(),
            date_column: "game_date".to_string(),
            opponent_column: "opp".to_string(),
            location_column: "game_location".to_string(),
            result_column: "game_outcome".to_string(),
            status_column: "boxscore_word".to_string(),
            playoffs_marker: "Playoffs".to_string(),
            bye_marker: "Bye Week".to_string(),
            canceled_marker: "canceled".to_string(),
            away_marker: "@".to_string(),
            win_marker: "W".to_string(),
            tie_marker: "T".to_string(),
            stats: Vec::new(),
        }
    }
}

impl TableLayout {
    /// Team game log: offensive passing and rushing columns.
    pub fn gamelog() -> Self {
        use FieldKind::*;
        Self {
            stats: vec![
                StatColumn::new("pass_cmp", "pass_completions", Integer),
                StatColumn::new("pass_att", "pass_attempts", Integer),
                StatColumn::new("pass_yds", "pass_yards", Integer),
                StatColumn::new("pass_td", "pass_touchdowns", Integer),
                StatColumn::new("pass_int", "pass_interceptions", Integer),
                StatColumn::new("pass_rating", "passer_rating", Fractional),
                StatColumn::new("rush_yds_per_att", "rush_yards_per_attempt", Fractional),
            ],
            ..Self::default()
        }
    }

    /// Team season schedule: yardage allowed and turnovers forced.
    pub fn schedule() -> Self {
        use FieldKind::*;
        Self {
            stats: vec![
                StatColumn::new("pass_yds_def", "defense_pass_yards", Integer),
                StatColumn::new("rush_yds_def", "defense_rush_yards", Integer),
                StatColumn::new("to_def", "defense_turnovers", Integer),
            ],
            ..Self::default()
        }
    }
}

/// `data-stat` → trimmed cell text for one table row.
struct RowCells(HashMap<String, String>);

impl RowCells {
    fn read(row: &ElementRef<'_>) -> Self {
        let cells = row
            .children()
            .filter_map(ElementRef::wrap)
            .filter_map(|cell| {
                let stat = cell.value().attr("data-stat")?;
                let text = cell.text().collect::<String>().trim().to_string();
                Some((stat.to_string(), text))
            })
            .collect();
        Self(cells)
    }

    fn get(&self, column: &str) -> Option<&str> {
        self.0.get(column).map(String::as_str)
    }

    fn text(&self, column: &str) -> &str {
        self.get(column).unwrap_or("")
    }
}

fn selector(css: &str) -> Result<Selector, ExtractError> {
    Selector::parse(css).map_err(|_| ExtractError::Selector(css.to_string()))
}

/// Parse a stat cell. Missing or empty cells are `Absent`; thousands
/// separators are tolerated. `None` means the cell holds a non-number.
fn parse_stat(raw: Option<&str>, kind: FieldKind) -> Option<StatValue> {
    let raw = match raw.map(str::trim) {
        None | Some("") => return Some(StatValue::Absent),
        Some(s) => s.replace(',', ""),
    };
    let value = match kind {
        FieldKind::Integer => raw.parse::<i64>().ok()? as f64,
        FieldKind::Fractional => raw.parse::<f64>().ok()?,
    };
    Some(StatValue::Reported(value))
}

/// Return the regular-season, played rows of table `table_id`, in document order.
///
/// Rows at or after the first playoffs marker are discarded, as are bye weeks,
/// canceled games and repeated header rows.
pub fn extract_rows(
    document: &Document,
    table_id: &str,
    layout: &TableLayout,
    teams: &TeamDirectory,
) -> Result<Vec<GameRow>, ExtractError> {
    let table_sel = selector(&format!("table[id=\"{}\"]", table_id))?;
    let row_sel = selector("tbody > tr")?;

    let table = document
        .html()
        .select(&table_sel)
        .next()
        .ok_or_else(|| ExtractError::TableNotFound {
            table: table_id.to_string(),
            url: document.url().to_string(),
        })?;

    let mut rows = Vec::new();
    for tr in table.select(&row_sel) {
        if tr.value().classes().any(|c| c == "thead") {
            continue;
        }
        let cells = RowCells::read(&tr);
        if cells.text(&layout.date_column) == layout.playoffs_marker {
            break;
        }
        if cells.text(&layout.opponent_column) == layout.bye_marker
            || cells.text(&layout.status_column) == layout.canceled_marker
        {
            continue;
        }
        rows.push(parse_row(&cells, table_id, layout, teams)?);
    }

    tracing::debug!(table = table_id, url = document.url(), rows = rows.len(), "extracted rows");
    Ok(rows)
}

fn parse_row(
    cells: &RowCells,
    table_id: &str,
    layout: &TableLayout,
    teams: &TeamDirectory,
) -> Result<GameRow, ExtractError> {
    let invalid = |column: &str, value: &str| ExtractError::InvalidField {
        table: table_id.to_string(),
        column: column.to_string(),
        value: value.to_string(),
    };

    let week_text = cells.text(&layout.week_column);
    let week = week_text
        .parse::<u32>()
        .ok()
        .filter(|w| *w > 0)
        .ok_or_else(|| invalid(&layout.week_column, week_text))?;

    let mut stats = BTreeMap::new();
    for col in &layout.stats {
        let raw = cells.get(&col.column);
        let value = parse_stat(raw, col.kind).ok_or_else(|| invalid(&col.column, raw.unwrap_or("")))?;
        stats.insert(col.name.clone(), value);
    }

    let result = cells.text(&layout.result_column);
    let outcome = if result == layout.win_marker {
        Outcome::Win
    } else if result == layout.tie_marker {
        Outcome::Tie
    } else {
        Outcome::Loss
    };

    Ok(GameRow {
        week,
        opponent: teams.canonical(cells.text(&layout.opponent_column)),
        home: cells.text(&layout.location_column) != layout.away_marker,
        outcome,
        stats,
    })
}
