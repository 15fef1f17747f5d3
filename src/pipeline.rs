//! Orchestration: team-season scrape jobs, dataset assembly and persistence.

use crate::config::{Config, DatasetConfig, SourceConfig};
use crate::dataset::{
    load_match_outcomes, load_player_games, player_weeks, unique_path, write_accumulated,
    write_training, PlayerWeeks, Roster,
};
use crate::engine::accumulator::{accumulate, trim_opening_weeks};
use crate::engine::aggregate::{team_rollup, RollupSpec};
use crate::engine::merger::{merge, schedule_from_games, FeatureIndex, GapPolicy, MergeOutput};
use crate::engine::types::{AccumulatedRow, EntitySeason, SeasonError};
use crate::feed::fetcher::Fetcher;
use crate::feed::pacing::Pacer;
use crate::feed::proxy::{HttpProbe, ProxyPool};
use crate::feed::table::{extract_rows, TableLayout};
use crate::feed::teams::TeamDirectory;
use crate::feed::PageSource;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

// ── Jobs ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TeamSeasonJob {
    pub team: String,
    pub season: u16,
}

/// Every (team, season) pair, team-major.
pub fn jobs(teams: &[String], seasons: RangeInclusive<u16>) -> Vec<TeamSeasonJob> {
    teams
        .iter()
        .flat_map(|team| {
            seasons.clone().map(move |season| TeamSeasonJob {
                team: team.clone(),
                season,
            })
        })
        .collect()
}

/// Substitute `{team}` and `{season}` in a URL or table-id template.
pub fn render(template: &str, job: &TeamSeasonJob) -> String {
    template
        .replace("{team}", &job.team)
        .replace("{season}", &job.season.to_string())
}

#[derive(Debug, Clone)]
pub struct JobFailure {
    pub team: String,
    pub season: u16,
    pub reason: String,
}

#[derive(Debug)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Accumulated rows of every successful job, sorted by (season, team, week).
    pub rows: Vec<AccumulatedRow>,
    pub failures: Vec<JobFailure>,
}

// ── Scraper ───────────────────────────────────────────────────────────

/// Builds accumulated team-season tables from two pages per team-season:
/// the game log (offense) and the season page (defense), joined on week.
pub struct SeasonScraper<S: PageSource> {
    source: S,
    gamelog_url: String,
    gamelog_table: String,
    gamelog_layout: TableLayout,
    season_url: String,
    season_table: String,
    season_layout: TableLayout,
    teams: TeamDirectory,
    skip_opening_weeks: u32,
}

impl<S: PageSource> SeasonScraper<S> {
    pub fn new(source: S, config: &SourceConfig, teams: TeamDirectory, skip_opening_weeks: u32) -> Self {
        Self {
            source,
            gamelog_url: config.gamelog_url.clone(),
            gamelog_table: config.gamelog_table.clone(),
            gamelog_layout: config.gamelog_layout(),
            season_url: config.season_url.clone(),
            season_table: config.season_table.clone(),
            season_layout: config.season_layout(),
            teams,
            skip_opening_weeks,
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub async fn team_season(&self, job: &TeamSeasonJob) -> Result<Vec<AccumulatedRow>> {
        // Parsed pages are dropped inside each block, before the next await.
        let offense = {
            let doc = self.source.fetch_page(&render(&self.gamelog_url, job)).await?;
            extract_rows(&doc, &render(&self.gamelog_table, job), &self.gamelog_layout, &self.teams)?
        };
        let defense = {
            let doc = self.source.fetch_page(&render(&self.season_url, job)).await?;
            extract_rows(&doc, &render(&self.season_table, job), &self.season_layout, &self.teams)?
        };

        let offense = EntitySeason::new(&job.team, job.season, offense)?;
        let defense = EntitySeason::new(&job.team, job.season, defense)?;
        let joined = offense.join(&defense);
        if joined.games().len() < offense.games().len() {
            tracing::warn!(
                team = %job.team,
                season = job.season,
                offense = offense.games().len(),
                joined = joined.games().len(),
                "weeks missing from season page were dropped"
            );
        }

        let rows = trim_opening_weeks(accumulate(&joined), self.skip_opening_weeks);
        tracing::debug!(team = %job.team, season = job.season, rows = rows.len(), "accumulated team-season");
        Ok(rows)
    }

    /// Run all jobs with at most `concurrency` in flight. A failed job is
    /// recorded in the report and never stops the others.
    pub async fn run(&self, jobs: Vec<TeamSeasonJob>, concurrency: usize) -> RunReport {
        let started_at = Utc::now();
        let total = jobs.len();
        tracing::info!(jobs = total, concurrency, "starting team-season scrape");

        let results: Vec<(TeamSeasonJob, Result<Vec<AccumulatedRow>>)> = stream::iter(jobs)
            .map(|job| async move {
                let result = self.team_season(&job).await;
                (job, result)
            })
            .buffer_unordered(concurrency.max(1))
            .collect()
            .await;

        let mut rows = Vec::new();
        let mut failures = Vec::new();
        for (job, result) in results {
            match result {
                Ok(mut r) => rows.append(&mut r),
                Err(e) => {
                    let reason = format!("{:#}", e);
                    tracing::error!(team = %job.team, season = job.season, error = %reason, "team-season failed");
                    failures.push(JobFailure {
                        team: job.team,
                        season: job.season,
                        reason,
                    });
                }
            }
        }
        rows.sort_by(|a, b| {
            (a.season, &a.entity, a.week).cmp(&(b.season, &b.entity, b.week))
        });
        failures.sort_by(|a, b| (a.season, &a.team).cmp(&(b.season, &b.team)));

        let finished_at = Utc::now();
        tracing::info!(
            jobs = total,
            failed = failures.len(),
            rows = rows.len(),
            elapsed_s = (finished_at - started_at).num_seconds(),
            "team-season scrape finished"
        );
        RunReport {
            started_at,
            finished_at,
            rows,
            failures,
        }
    }
}

// ── Assembly ──────────────────────────────────────────────────────────

pub fn build_fetcher(config: &Config) -> Result<Fetcher> {
    let pacer = Arc::new(Pacer::new(
        Duration::from_millis(config.pacing.step_ms),
        config.pacing.max_steps,
    ));
    let proxies = if config.proxy.enabled {
        let probe = Arc::new(HttpProbe::new(&config.proxy.probe_url, config.proxy.probe_timeout_ms));
        Some(Arc::new(ProxyPool::from_file(&config.proxy.list_path, probe)?))
    } else {
        None
    };
    Fetcher::new(&config.fetch, pacer, proxies)
}

pub fn team_directory(config: &DatasetConfig) -> Result<TeamDirectory> {
    match &config.team_aliases_path {
        Some(path) => TeamDirectory::load(path),
        None => Ok(TeamDirectory::new()),
    }
}

/// Training rows for scraped team data; the schedule comes from the rows.
pub fn build_team_dataset(rows: &[AccumulatedRow], policy: GapPolicy) -> MergeOutput {
    let schedule = schedule_from_games(rows);
    let index = FeatureIndex::from_rows(rows);
    merge(&schedule, &index, policy)
}

pub struct PlayerDataset {
    /// Team rows rolled up from players at the configured positions.
    pub team_rows: Vec<AccumulatedRow>,
    pub training: MergeOutput,
    /// Player-seasons left out because their games could not form a season.
    pub skipped: Vec<SeasonError>,
}

/// Player box scores → accumulated player rows → team roll-up → merge
/// against the match outcome file.
pub fn build_player_dataset(config: &Config) -> Result<PlayerDataset> {
    let players = config
        .players
        .as_ref()
        .context("config has no [players] section")?;
    let seasons = config.dataset.seasons();
    let teams = team_directory(&config.dataset)?;

    let outcomes = load_match_outcomes(&players.outcomes_csv, &seasons, &teams)?;
    let games = load_player_games(&players.stats_csv, &seasons, &teams)?;
    let roster = Roster::load(&players.roster_csv)?;

    let PlayerWeeks { weeks, skipped } = player_weeks(games, &outcomes, &roster);
    let spec = RollupSpec {
        positions: players.positions.clone(),
        summed_priors: players.summed_features.clone(),
    };
    let team_rows = trim_opening_weeks(team_rollup(&weeks, &spec), config.dataset.skip_opening_weeks);

    let index = FeatureIndex::from_rows(&team_rows);
    let training = merge(&outcomes, &index, config.dataset.gap_policy);
    tracing::info!(
        player_rows = weeks.len(),
        team_rows = team_rows.len(),
        training_rows = training.rows.len(),
        gaps = training.gaps,
        skipped = skipped.len(),
        "player dataset built"
    );
    Ok(PlayerDataset {
        team_rows,
        training,
        skipped,
    })
}

// ── Persistence ───────────────────────────────────────────────────────

/// Write per-season files (plus per-team-season files when enabled), the
/// combined accumulated file and the training file. Returns every path
/// written, in write order.
pub fn persist_team_run(
    config: &DatasetConfig,
    rows: &[AccumulatedRow],
    training: &MergeOutput,
) -> Result<Vec<PathBuf>> {
    let dir = &config.output_dir;
    let mut written = Vec::new();

    if config.write_team_files {
        let mut by_team: BTreeMap<(u16, &str), Vec<AccumulatedRow>> = BTreeMap::new();
        for r in rows {
            by_team.entry((r.season, r.entity.as_str())).or_default().push(r.clone());
        }
        let team_dir = dir.join("teams");
        for ((season, team), team_rows) in by_team {
            let path = unique_path(&team_dir, &format!("{}_{}", team, season))?;
            write_accumulated(&path, &team_rows)?;
            written.push(path);
        }
    }

    let mut by_season: BTreeMap<u16, Vec<AccumulatedRow>> = BTreeMap::new();
    for r in rows {
        by_season.entry(r.season).or_default().push(r.clone());
    }
    for (season, season_rows) in &by_season {
        let path = unique_path(dir, &format!("nfl_{}", season))?;
        write_accumulated(&path, season_rows)?;
        written.push(path);
    }

    let range = format!("{}_{}", config.first_season, config.last_season);
    let path = unique_path(dir, &format!("nfl_{}_accumulated", range))?;
    write_accumulated(&path, rows)?;
    written.push(path);

    let path = unique_path(dir, &format!("nfl_{}_training", range))?;
    write_training(&path, &training.rows)?;
    written.push(path);

    Ok(written)
}

pub fn persist_player_run(config: &DatasetConfig, dataset: &PlayerDataset) -> Result<Vec<PathBuf>> {
    let range = format!("{}_{}", config.first_season, config.last_season);
    let accumulated = unique_path(&config.output_dir, &format!("nfl_players_{}_accumulated", range))?;
    write_accumulated(&accumulated, &dataset.team_rows)?;
    let training = unique_path(&config.output_dir, &format!("nfl_players_{}_training", range))?;
    write_training(&training, &dataset.training.rows)?;
    Ok(vec![accumulated, training])
}

// ── Entry points ──────────────────────────────────────────────────────

/// Scrape every configured team-season, then build and persist the datasets.
pub async fn run_scrape(config: &Config) -> Result<RunReport> {
    let fetcher = build_fetcher(config)?;
    let teams = team_directory(&config.dataset)?;
    let scraper = SeasonScraper::new(fetcher, &config.source, teams, config.dataset.skip_opening_weeks);

    let report = scraper
        .run(jobs(&config.source.teams, config.dataset.seasons()), config.fetch.concurrency)
        .await;

    let training = build_team_dataset(&report.rows, config.dataset.gap_policy);
    let written = persist_team_run(&config.dataset, &report.rows, &training)?;
    for path in &written {
        tracing::debug!(path = %path.display(), "dataset file");
    }
    tracing::info!(
        files = written.len(),
        training_rows = training.rows.len(),
        gaps = training.gaps,
        failures = report.failures.len(),
        "datasets written"
    );
    Ok(report)
}

pub fn run_players(config: &Config) -> Result<PlayerDataset> {
    let dataset = build_player_dataset(config)?;
    persist_player_run(&config.dataset, &dataset)?;
    Ok(dataset)
}
