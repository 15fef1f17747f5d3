use crate::engine::merger::{feature_columns, format_value, header, TrainingRow};
use crate::engine::types::AccumulatedRow;
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// `<dir>/<stem>.csv`, or `<stem>_1.csv`, `<stem>_2.csv`, ... if taken.
/// Creates `dir` if needed.
pub fn unique_path(dir: &Path, stem: &str) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output dir: {}", dir.display()))?;
    let first = dir.join(format!("{}.csv", stem));
    if !first.exists() {
        return Ok(first);
    }
    let mut n = 1u32;
    loop {
        let candidate = dir.join(format!("{}_{}.csv", stem, n));
        if !candidate.exists() {
            return Ok(candidate);
        }
        n += 1;
    }
}

/// Accumulated rows, one per (entity, week). Columns: `season, week, team,
/// opponent, is_home`, sorted `<stat>_accum`, `rating, win_streak, is_win`.
pub fn write_accumulated(path: &Path, rows: &[AccumulatedRow]) -> Result<()> {
    let stats: BTreeSet<&String> = rows.iter().flat_map(|r| r.prior.keys()).collect();

    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut head: Vec<String> = ["season", "week", "team", "opponent", "is_home"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    head.extend(stats.iter().map(|s| format!("{}_accum", s)));
    head.extend(["rating", "win_streak", "is_win"].iter().map(|s| s.to_string()));
    wtr.write_record(&head)?;

    for r in rows {
        let mut rec = vec![
            r.season.to_string(),
            r.week.to_string(),
            r.entity.clone(),
            r.opponent.clone(),
            u8::from(r.home).to_string(),
        ];
        rec.extend(
            stats
                .iter()
                .map(|s| r.prior.get(*s).map(|v| format_value(*v)).unwrap_or_default()),
        );
        rec.push(format_value(r.rating));
        rec.push(r.win_streak.to_string());
        rec.push(u8::from(r.outcome.is_win()).to_string());
        wtr.write_record(&rec)?;
    }
    wtr.flush()?;
    tracing::info!(path = %path.display(), rows = rows.len(), "wrote accumulated rows");
    Ok(())
}

pub fn write_training(path: &Path, rows: &[TrainingRow]) -> Result<()> {
    let columns = feature_columns(rows);
    let mut wtr = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create {}", path.display()))?;
    wtr.write_record(header(&columns))?;
    for row in rows {
        wtr.write_record(row.record(&columns))?;
    }
    wtr.flush()?;
    tracing::info!(path = %path.display(), rows = rows.len(), "wrote training rows");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::types::Outcome;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("gridiron-writer-{}-{}", name, std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_unique_path_never_overwrites() {
        let dir = scratch_dir("unique");
        let first = unique_path(&dir, "nfl_2021").unwrap();
        assert_eq!(first.file_name().unwrap(), "nfl_2021.csv");
        std::fs::write(&first, "x").unwrap();

        let second = unique_path(&dir, "nfl_2021").unwrap();
        assert_eq!(second.file_name().unwrap(), "nfl_2021_1.csv");
        std::fs::write(&second, "y").unwrap();

        let third = unique_path(&dir, "nfl_2021").unwrap();
        assert_eq!(third.file_name().unwrap(), "nfl_2021_2.csv");
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "x");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_accumulated_layout() {
        let dir = scratch_dir("acc");
        let path = unique_path(&dir, "acc").unwrap();
        let row = AccumulatedRow {
            entity: "kan".into(),
            season: 2023,
            week: 2,
            opponent: "det".into(),
            home: false,
            outcome: Outcome::Win,
            prior: [("pass_yards".to_string(), 226.0), ("defense_turnovers".to_string(), 1.0)]
                .into_iter()
                .collect(),
            rating: 84.126,
            win_streak: 0,
        };
        write_accumulated(&path, &[row]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "season,week,team,opponent,is_home,defense_turnovers_accum,pass_yards_accum,rating,win_streak,is_win"
        );
        assert_eq!(lines.next().unwrap(), "2023,2,kan,det,0,1,226,84.13,0,1");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_write_training_header_first() {
        let dir = scratch_dir("train");
        let path = unique_path(&dir, "train").unwrap();
        let row = TrainingRow {
            season: 2023,
            week: 3,
            home: "kan".into(),
            away: "det".into(),
            label: 0.5,
            home_features: Some([("rating".to_string(), 70.0)].into_iter().collect()),
            away_features: None,
        };
        write_training(&path, &[row]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "season,week,home_team,away_team,home_rating,away_rating,label");
        assert_eq!(lines[1], "2023,3,kan,det,70,,0.5");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
