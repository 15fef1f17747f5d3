use anyhow::Result;
use gridiron_data::config::Config;
use gridiron_data::pipeline;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

enum Command {
    /// Scrape team pages and build the team dataset.
    Scrape,
    /// Build the dataset from player box-score CSVs.
    Players,
}

fn parse_args() -> Result<(Command, PathBuf)> {
    let mut command = Command::Scrape;
    let mut config_path = PathBuf::from("config.toml");

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "scrape" => command = Command::Scrape,
            "players" => command = Command::Players,
            "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config needs a path"))?;
                config_path = PathBuf::from(path);
            }
            other => anyhow::bail!("unknown argument '{}' (usage: gridiron-data [scrape|players] [--config PATH])", other),
        }
    }
    Ok((command, config_path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("gridiron_data=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (command, config_path) = parse_args()?;
    let config = Config::load(&config_path)?;

    match command {
        Command::Scrape => {
            let report = pipeline::run_scrape(&config).await?;
            for f in &report.failures {
                tracing::error!(team = %f.team, season = f.season, reason = %f.reason, "not in dataset");
            }
            println!(
                "scraped {} rows ({} team-seasons failed) in {}s",
                report.rows.len(),
                report.failures.len(),
                (report.finished_at - report.started_at).num_seconds()
            );
        }
        Command::Players => {
            let dataset = pipeline::run_players(&config)?;
            println!(
                "built {} team rows, {} training rows ({} gaps)",
                dataset.team_rows.len(),
                dataset.training.rows.len(),
                dataset.training.gaps
            );
        }
    }
    Ok(())
}
