use crate::engine::merger::GapPolicy;
use crate::feed::table::TableLayout;
use crate::feed::teams::CURRENT_TEAM_KEYS;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub source: SourceConfig,
    pub dataset: DatasetConfig,
    pub players: Option<PlayerDataConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    /// Linear backoff: attempt n waits `n * retry_backoff_ms` first.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
    /// Team-season jobs in flight at once.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_max_retries() -> u32 { 3 }
fn default_request_timeout() -> u64 { 15000 }
fn default_retry_backoff() -> u64 { 500 }
fn default_concurrency() -> usize { 1 }

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            request_timeout_ms: 15000,
            retry_backoff_ms: 500,
            concurrency: 1,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PacingConfig {
    #[serde(default = "default_step_ms")]
    pub step_ms: u64,
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
}

fn default_step_ms() -> u64 { 1000 }
fn default_max_steps() -> u32 { 4 }

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            step_ms: 1000,
            max_steps: 4,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProxyConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_proxy_list")]
    pub list_path: PathBuf,
    #[serde(default = "default_probe_url")]
    pub probe_url: String,
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_ms: u64,
}

fn default_proxy_list() -> PathBuf { PathBuf::from("proxies.txt") }
fn default_probe_url() -> String { "http://httpbin.org/ip".to_string() }
fn default_probe_timeout() -> u64 { 5000 }

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            list_path: default_proxy_list(),
            probe_url: default_probe_url(),
            probe_timeout_ms: 5000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    /// Game log page; `{team}` and `{season}` are substituted.
    #[serde(default = "default_gamelog_url")]
    pub gamelog_url: String,
    /// Season page carrying the schedule/defense table.
    #[serde(default = "default_season_url")]
    pub season_url: String,
    /// Table id on the game log page; `{season}` is substituted.
    #[serde(default = "default_gamelog_table")]
    pub gamelog_table: String,
    #[serde(default = "default_season_table")]
    pub season_table: String,
    #[serde(default = "default_teams")]
    pub teams: Vec<String>,
    pub gamelog_layout: Option<TableLayout>,
    pub season_layout: Option<TableLayout>,
}

fn default_gamelog_url() -> String {
    "https://www.pro-football-reference.com/teams/{team}/{season}/gamelog.htm".to_string()
}
fn default_season_url() -> String {
    "https://www.pro-football-reference.com/teams/{team}/{season}.htm".to_string()
}
fn default_gamelog_table() -> String { "gamelog{season}".to_string() }
fn default_season_table() -> String { "games".to_string() }
fn default_teams() -> Vec<String> {
    CURRENT_TEAM_KEYS.iter().map(|k| k.to_string()).collect()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            gamelog_url: default_gamelog_url(),
            season_url: default_season_url(),
            gamelog_table: default_gamelog_table(),
            season_table: default_season_table(),
            teams: default_teams(),
            gamelog_layout: None,
            season_layout: None,
        }
    }
}

impl SourceConfig {
    pub fn gamelog_layout(&self) -> TableLayout {
        self.gamelog_layout.clone().unwrap_or_else(TableLayout::gamelog)
    }

    pub fn season_layout(&self) -> TableLayout {
        self.season_layout.clone().unwrap_or_else(TableLayout::schedule)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatasetConfig {
    pub first_season: u16,
    pub last_season: u16,
    /// Weeks at the start of each season left out of the output (still
    /// counted in later rows' history).
    #[serde(default)]
    pub skip_opening_weeks: u32,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default)]
    pub gap_policy: GapPolicy,
    pub team_aliases_path: Option<PathBuf>,
    /// Also write one file per team-season.
    #[serde(default)]
    pub write_team_files: bool,
}

fn default_output_dir() -> PathBuf { PathBuf::from("data") }

impl DatasetConfig {
    pub fn seasons(&self) -> RangeInclusive<u16> {
        self.first_season..=self.last_season
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlayerDataConfig {
    pub stats_csv: PathBuf,
    pub roster_csv: PathBuf,
    pub outcomes_csv: PathBuf,
    #[serde(default = "default_positions")]
    pub positions: Vec<String>,
    #[serde(default = "default_summed_features")]
    pub summed_features: Vec<String>,
}

fn default_positions() -> Vec<String> { vec!["QB".to_string()] }
fn default_summed_features() -> Vec<String> {
    vec!["rushing_yards".to_string(), "fumbles".to_string()]
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| "Failed to parse config TOML")?;
        if config.dataset.first_season > config.dataset.last_season {
            anyhow::bail!(
                "dataset.first_season ({}) is after dataset.last_season ({})",
                config.dataset.first_season,
                config.dataset.last_season
            );
        }
        Ok(config)
    }
}
