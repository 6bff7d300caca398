// Configuration loading and parsing (engine.toml).

use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::scoring::PointTable;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Assembled Config
// ---------------------------------------------------------------------------

/// Name of the single config file under `config/` and `defaults/`.
pub const ENGINE_FILE: &str = "engine.toml";

#[derive(Debug, Clone)]
pub struct Config {
    pub db_path: String,
    /// Fallback point values for competitions that leave their scoring rules
    /// unset.
    pub scoring: PointTable,
    pub ranking: RankingConfig,
    pub schedule: ScheduleConfig,
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// engine.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire engine.toml file.
#[derive(Debug, Clone, Deserialize)]
struct EngineFile {
    database: DatabaseSection,
    scoring: PointTable,
    ranking: RankingConfig,
    schedule: ScheduleConfig,
    #[serde(default)]
    logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct DatabaseSection {
    path: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    /// How many entries a ranking pass reads per store round-trip.
    pub page_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleConfig {
    /// A scheduled pass only runs when a match finished within this window.
    pub recent_window_hours: i64,
    /// Interval between ticks of the `run` loop.
    pub tick_seconds: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "scoreline_core=info,scoreline=info,warn".to_string(),
        }
    }
}

/// Mirrors `defaults/engine.toml`.
impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: "scoreline.db".to_string(),
            scoring: PointTable {
                exact_score: 3,
                winner_only: 1,
            },
            ranking: RankingConfig { page_size: 500 },
            schedule: ScheduleConfig {
                recent_window_hours: 24,
                tick_seconds: 300,
            },
            logging: LoggingConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/engine.toml` relative to
/// `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let engine_path = base_dir.join("config").join(ENGINE_FILE);
    let engine_text = read_file(&engine_path)?;
    let engine_file: EngineFile =
        toml::from_str(&engine_text).map_err(|e| ConfigError::ParseError {
            path: engine_path.clone(),
            source: e,
        })?;

    let config = Config {
        db_path: engine_file.database.path,
        scoring: engine_file.scoring,
        ranking: engine_file.ranking,
        schedule: engine_file.schedule,
        logging: engine_file.logging,
    };

    validate(&config)?;

    Ok(config)
}

/// Files the engine reads from `config/`, shipped under `defaults/`.
const SHIPPED_FILES: &[&str] = &[ENGINE_FILE];

/// Copy each shipped file that `config/` lacks from `defaults/` and return
/// the copies made. An existing `config/` file is never touched, so local
/// edits survive upgrades. Without `defaults/`, an existing `config/` is
/// taken as is.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.is_dir() {
        if config_dir.is_dir() {
            return Ok(Vec::new());
        }
        return Err(ConfigError::DefaultsCopyError {
            message: format!(
                "{} has neither defaults/ nor config/; pass the install directory as the base dir",
                base_dir.display()
            ),
        });
    }

    fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("cannot create {}: {e}", config_dir.display()),
    })?;

    let mut copied = Vec::new();
    for name in SHIPPED_FILES {
        let source = defaults_dir.join(name);
        let target = config_dir.join(name);
        if target.exists() || !source.is_file() {
            continue;
        }
        fs::copy(&source, &target).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("cannot copy {} to {}: {e}", source.display(), target.display()),
        })?;
        info!("Created {} from shipped defaults", target.display());
        copied.push(target);
    }

    Ok(copied)
}

/// Convenience wrapper: loads config relative to `base_dir` after copying any
/// missing defaults into place.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    ensure_config_files(base_dir)?;
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.db_path.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "database.path".into(),
            message: "must not be empty".into(),
        });
    }

    let scoring = &config.scoring;
    if scoring.exact_score < scoring.winner_only {
        return Err(ConfigError::ValidationError {
            field: "scoring.exact_score".into(),
            message: format!(
                "must be >= scoring.winner_only ({}), got {}",
                scoring.winner_only, scoring.exact_score
            ),
        });
    }

    if config.ranking.page_size == 0 {
        return Err(ConfigError::ValidationError {
            field: "ranking.page_size".into(),
            message: "must be > 0".into(),
        });
    }

    if config.schedule.recent_window_hours <= 0 {
        return Err(ConfigError::ValidationError {
            field: "schedule.recent_window_hours".into(),
            message: format!("must be > 0, got {}", config.schedule.recent_window_hours),
        });
    }

    if config.schedule.tick_seconds == 0 {
        return Err(ConfigError::ValidationError {
            field: "schedule.tick_seconds".into(),
            message: "must be > 0".into(),
        });
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    /// Helper: returns the repository root holding `defaults/` (works whether
    /// `cargo test` runs from the crate directory or the workspace root).
    fn project_root() -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        if cwd.join("defaults").exists() {
            cwd
        } else if cwd.join("../../defaults").exists() {
            cwd.join("../..")
        } else {
            panic!("Cannot locate defaults/ directory from CWD {:?}", cwd);
        }
    }

    /// Helper: a scratch directory with `config/engine.toml` holding `body`.
    fn scratch_config(name: &str, body: &str) -> PathBuf {
        let tmp = std::env::temp_dir().join(name);
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("config").join(ENGINE_FILE), body).unwrap();
        tmp
    }

    const VALID: &str = r#"
[database]
path = "scoreline.db"

[scoring]
exact_score = 3
winner_only = 1

[ranking]
page_size = 500

[schedule]
recent_window_hours = 24
tick_seconds = 60
"#;

    #[test]
    fn load_default_engine_file() {
        let root = project_root();
        let tmp = std::env::temp_dir().join("scoreline_config_defaults");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::copy(
            root.join("defaults").join(ENGINE_FILE),
            tmp.join("defaults").join(ENGINE_FILE),
        )
        .unwrap();

        let config = load_config(&tmp).expect("defaults should load");
        assert!(tmp.join("config").join(ENGINE_FILE).exists());

        assert_eq!(config.db_path, "scoreline.db");
        assert_eq!(config.scoring.exact_score, 3);
        assert_eq!(config.scoring.winner_only, 1);
        assert_eq!(config.ranking.page_size, 500);
        assert_eq!(config.schedule.recent_window_hours, 24);
        assert!(config.schedule.tick_seconds > 0);

        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn logging_section_is_optional() {
        let tmp = scratch_config("scoreline_config_no_logging", VALID);
        let config = load_config_from(&tmp).unwrap();
        assert_eq!(config.logging.filter, LoggingConfig::default().filter);
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn missing_engine_file_is_reported() {
        let tmp = std::env::temp_dir().join("scoreline_config_missing");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("config")).unwrap();

        match load_config_from(&tmp).unwrap_err() {
            ConfigError::FileNotFound { path } => assert!(path.ends_with(ENGINE_FILE)),
            other => panic!("expected FileNotFound, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_keeps_local_edits() {
        let tmp = std::env::temp_dir().join("scoreline_config_keep_local");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::create_dir_all(tmp.join("config")).unwrap();
        fs::write(tmp.join("defaults").join(ENGINE_FILE), "default").unwrap();
        fs::write(tmp.join("defaults").join("notes.toml.example"), "x").unwrap();
        fs::write(tmp.join("config").join(ENGINE_FILE), "local").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert!(copied.is_empty());
        assert_eq!(
            fs::read_to_string(tmp.join("config").join(ENGINE_FILE)).unwrap(),
            "local"
        );
        assert!(!tmp.join("config").join("notes.toml.example").exists());
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_copies_missing_engine_file_only() {
        let tmp = std::env::temp_dir().join("scoreline_config_first_run");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(tmp.join("defaults")).unwrap();
        fs::write(tmp.join("defaults").join(ENGINE_FILE), "default").unwrap();
        fs::write(tmp.join("defaults").join("unrelated.toml"), "x").unwrap();

        let copied = ensure_config_files(&tmp).unwrap();
        assert_eq!(copied, vec![tmp.join("config").join(ENGINE_FILE)]);
        assert_eq!(
            fs::read_to_string(tmp.join("config").join(ENGINE_FILE)).unwrap(),
            "default"
        );
        assert!(!tmp.join("config").join("unrelated.toml").exists());

        // A second run has nothing left to copy.
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_accepts_config_without_defaults() {
        let tmp = scratch_config("scoreline_config_no_defaults", "local");
        assert!(ensure_config_files(&tmp).unwrap().is_empty());
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn ensure_config_files_without_any_directory_fails() {
        let tmp = std::env::temp_dir().join("scoreline_config_empty");
        let _ = fs::remove_dir_all(&tmp);
        fs::create_dir_all(&tmp).unwrap();

        assert!(matches!(
            ensure_config_files(&tmp),
            Err(ConfigError::DefaultsCopyError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn malformed_toml_is_a_parse_error() {
        let tmp = scratch_config("scoreline_config_malformed", "[database\npath = 1");
        assert!(matches!(
            load_config_from(&tmp),
            Err(ConfigError::ParseError { .. })
        ));
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_zero_page_size() {
        let body = VALID.replace("page_size = 500", "page_size = 0");
        let tmp = scratch_config("scoreline_config_page_size", &body);
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => assert_eq!(field, "ranking.page_size"),
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_exact_below_winner_only() {
        let body = VALID.replace("exact_score = 3", "exact_score = 0");
        let tmp = scratch_config("scoreline_config_exact_low", &body);
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "scoring.exact_score")
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }

    #[test]
    fn rejects_non_positive_window() {
        let body = VALID.replace("recent_window_hours = 24", "recent_window_hours = 0");
        let tmp = scratch_config("scoreline_config_window", &body);
        match load_config_from(&tmp).unwrap_err() {
            ConfigError::ValidationError { field, .. } => {
                assert_eq!(field, "schedule.recent_window_hours")
            }
            other => panic!("expected ValidationError, got: {other}"),
        }
        let _ = fs::remove_dir_all(&tmp);
    }
}
