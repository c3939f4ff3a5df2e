//! CLI argument parsing and subcommand dispatch.

use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{Parser, Subcommand};
use intel_core::Config;
use intel_ingest::{AppSettings, RunOutcome};

use crate::startup;

#[derive(Parser)]
#[command(name = "intel-server", version, about = "Feed ingestion and analysis server")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Start the HTTP API and the ingestion scheduler (default).
    Serve,
    /// Run one manual ingestion and print its report.
    Ingest {
        /// Pull limit for this run, instead of the settings file's.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Validate a settings file. Defaults to SETTINGS_PATH.
    CheckConfig {
        path: Option<PathBuf>,
    },
}

pub async fn dispatch(config: &Config, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Serve => startup::serve(config).await,
        Command::Ingest { limit } => {
            match startup::ingest_once(config, limit).await? {
                RunOutcome::Completed(report) => {
                    println!("{}", serde_json::to_string_pretty(&report)?);
                }
                RunOutcome::Busy => println!("ingestion already in progress"),
            }
            Ok(())
        }
        Command::CheckConfig { path } => {
            let path = path.unwrap_or_else(|| config.ingest.settings_path.clone());
            let settings = check_config(&path)?;
            println!("{}: ok", path.display());
            println!("  feeds:      {}", settings.feeds.len());
            println!("  topics:     {}", settings.analysis.topics.len());
            if settings.scheduling.enabled {
                println!(
                    "  scheduling: every {}h",
                    settings.scheduling.interval_hours
                );
            } else {
                println!("  scheduling: disabled");
            }
            Ok(())
        }
    }
}

fn check_config(path: &Path) -> anyhow::Result<AppSettings> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    AppSettings::parse(&raw).with_context(|| format!("{} is not valid", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serve_is_the_default() {
        let cli = Cli::try_parse_from(["intel-server"]).unwrap();
        assert!(cli.command.is_none());

        let cli = Cli::try_parse_from(["intel-server", "check-config", "alt.yaml"]).unwrap();
        assert_eq!(
            cli.command,
            Some(Command::CheckConfig {
                path: Some(PathBuf::from("alt.yaml"))
            })
        );
        assert!(Cli::try_parse_from(["intel-server", "import"]).is_err());

        let cli = Cli::try_parse_from(["intel-server", "ingest", "--limit", "3"]).unwrap();
        assert_eq!(cli.command, Some(Command::Ingest { limit: Some(3) }));
        let cli = Cli::try_parse_from(["intel-server", "ingest"]).unwrap();
        assert_eq!(cli.command, Some(Command::Ingest { limit: None }));
    }

    #[test]
    fn check_config_reports_problems() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        assert!(check_config(&path).is_err(), "missing file");

        std::fs::write(&path, "scheduling:\n  enabled: true\n  interval_hours: -1\n").unwrap();
        assert!(check_config(&path).is_err());

        std::fs::write(&path, "feeds:\n  - name: wire\n    url: https://example.com/rss\n").unwrap();
        assert_eq!(check_config(&path).unwrap().feeds.len(), 1);
    }
}
