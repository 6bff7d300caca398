// Scoreline command-line entry point.
//
// Startup sequence:
// 1. Parse arguments
// 2. Load config (copying defaults on first run)
// 3. Initialize tracing to stderr, so stdout carries only job output
// 4. Open database
// 5. Run the requested job and print its report as JSON

mod scheduler;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use scoreline_core::config::{self, Config};
use scoreline_core::db::Database;
use scoreline_core::jobs;
use scoreline_core::model::MatchResult;

#[derive(Parser)]
#[command(name = "scoreline")]
#[command(about = "Prediction scoring and leaderboard ranking engine", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory containing `config/` and `defaults/`.
    #[arg(long, env = "SCORELINE_HOME", default_value = ".")]
    base_dir: PathBuf,

    #[arg(short, long)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Score pending predictions of one match, or of every finished match.
    Evaluate {
        #[arg(long = "match")]
        match_id: Option<i64>,

        /// Revert before evaluating, rescoring every prediction.
        #[arg(long)]
        force: bool,
    },
    /// Take a match's scored predictions back out of the standings.
    Revert { match_id: i64 },
    /// Replace a match's final result and rescore it.
    Correct {
        match_id: i64,
        home: u32,
        away: u32,
    },
    /// Scheduled ranking pass with snapshots.
    Rank {
        #[arg(long)]
        competition: Option<i64>,

        /// Ignore the configured hour and the recent-finish check.
        #[arg(long)]
        force: bool,
    },
    /// Rank competitions with matches that finished today.
    Realtime {
        #[arg(long)]
        competition: Option<i64>,
    },
    /// Print a competition's current standings.
    Standings { competition: i64 },
    /// Keep running jobs on the configured interval until Ctrl+C.
    Run,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(&cli.base_dir).context("failed to load configuration")?;
    init_tracing(&config, cli.verbose)?;

    let db_path = database_path(&cli.base_dir, &config);
    let db = Database::open(&db_path).context("failed to open database")?;
    info!("Database opened at {}", db_path);

    let now = Utc::now();
    match cli.command {
        Commands::Evaluate { match_id, force } => {
            print_json(&jobs::evaluate_matches(&db, &config, match_id, force)?)?;
        }
        Commands::Revert { match_id } => {
            print_json(&jobs::revert_match(&db, &config, match_id)?)?;
        }
        Commands::Correct {
            match_id,
            home,
            away,
        } => {
            let report =
                jobs::correct_match(&db, &config, match_id, MatchResult::new(home, away), now)?;
            print_json(&report)?;
        }
        Commands::Rank { competition, force } => {
            print_json(&jobs::recalculate_rankings(&db, &config, competition, force, now)?)?;
        }
        Commands::Realtime { competition } => {
            print_json(&jobs::realtime_rankings(&db, &config, competition, now)?)?;
        }
        Commands::Standings { competition } => {
            print_json(&jobs::load_standings(&db, &config, competition)?)?;
        }
        Commands::Run => {
            let shutdown = async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    tracing::error!("Failed to listen for Ctrl+C: {}", e);
                }
            };
            scheduler::run(Arc::new(db), Arc::new(config), shutdown).await?;
        }
    }

    Ok(())
}

/// Relative database paths resolve against the base directory.
fn database_path(base_dir: &Path, config: &Config) -> String {
    if config.db_path == ":memory:" || Path::new(&config.db_path).is_absolute() {
        config.db_path.clone()
    } else {
        base_dir.join(&config.db_path).to_string_lossy().into_owned()
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialize report")?;
    println!("{json}");
    Ok(())
}

/// Log to stderr. `RUST_LOG` wins over the configured filter; `--verbose`
/// raises the engine crates to debug.
fn init_tracing(config: &Config, verbose: bool) -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let fallback = if verbose {
        "scoreline_core=debug,scoreline=debug,warn".to_string()
    } else {
        config.logging.filter.clone()
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback)),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_line_number(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("failed to set tracing subscriber")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_parses_subcommands() {
        let cli = Cli::try_parse_from(["scoreline", "evaluate", "--match", "7", "--force"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Evaluate {
                match_id: Some(7),
                force: true
            }
        ));

        let cli = Cli::try_parse_from(["scoreline", "correct", "3", "2", "1"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Correct {
                match_id: 3,
                home: 2,
                away: 1
            }
        ));

        let cli = Cli::try_parse_from(["scoreline", "--base-dir", "/srv/scoreline", "run"]).unwrap();
        assert_eq!(cli.base_dir, PathBuf::from("/srv/scoreline"));
        assert!(matches!(cli.command, Commands::Run));
    }

    #[test]
    fn relative_database_paths_follow_base_dir() {
        let mut config = Config::default();
        assert_eq!(
            database_path(Path::new("/srv/scoreline"), &config),
            Path::new("/srv/scoreline")
                .join("scoreline.db")
                .to_string_lossy()
        );

        config.db_path = ":memory:".to_string();
        assert_eq!(database_path(Path::new("/srv"), &config), ":memory:");
    }
}
