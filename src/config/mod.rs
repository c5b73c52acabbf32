mod engine;

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::engine::quality::QualityPolicyError;
use crate::engine::NoteWriteMode;

pub use engine::EngineConfig;

/// Upper bound on configured look-back windows.
pub const MAX_WINDOW_DAYS: i64 = 3650;

/// Distinguishes runtime behavior for different stages of the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub telemetry: TelemetryConfig,
    /// Default snapshot file the CLI reads and saves.
    pub snapshot: Option<PathBuf>,
    pub engine: EngineConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with(None)
    }

    /// Like [`AppConfig::load`], with an engine file that takes precedence
    /// over `TRACKER_CONFIG`.
    pub fn load_with(engine_file: Option<&Path>) -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let snapshot = env::var("TRACKER_SNAPSHOT").ok().map(PathBuf::from);

        let engine_file = engine_file
            .map(Path::to_path_buf)
            .or_else(|| env::var("TRACKER_CONFIG").ok().map(PathBuf::from));
        let mut engine = match engine_file {
            Some(path) => EngineConfig::from_path(&path)?,
            None => EngineConfig::default(),
        };

        if let Some(score) = parsed::<f64>("TRACKER_MATCH_THRESHOLD")? {
            engine.supersedes.min_match_score = score;
        }
        if let Some(years) = parsed::<i64>("TRACKER_MAX_YEAR_DIFF")? {
            engine.supersedes.max_year_diff = years;
        }
        if let Some(size) = parsed::<usize>("TRACKER_CHUNK_SIZE")? {
            engine.write.chunk_size = size;
        }
        if let Ok(mode) = env::var("TRACKER_NOTE_MODE") {
            engine.supersedes.note_mode = match mode.trim().to_ascii_lowercase().as_str() {
                "replace" => NoteWriteMode::Replace,
                "append" => NoteWriteMode::append(),
                _ => return Err(ConfigError::InvalidNoteMode(mode)),
            };
        }
        engine.validate()?;

        Ok(Self {
            environment,
            telemetry: TelemetryConfig { log_level },
            snapshot,
            engine,
        })
    }
}

fn parsed<T: FromStr>(var: &'static str) -> Result<Option<T>, ConfigError> {
    match env::var(var) {
        Ok(value) => value
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
        Err(_) => Ok(None),
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidNumber { var: &'static str, value: String },
    InvalidNoteMode(String),
    ReadFile { path: PathBuf, source: std::io::Error },
    ParseFile { path: PathBuf, source: serde_json::Error },
    Quality(QualityPolicyError),
    ChunkSize(usize),
    Threshold { name: &'static str, value: f64 },
    TierOrder { high: f64, medium: f64 },
    WindowDays { name: &'static str, value: i64 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var} must be a valid number (found '{value}')")
            }
            ConfigError::InvalidNoteMode(value) => {
                write!(f, "TRACKER_NOTE_MODE must be 'replace' or 'append' (found '{value}')")
            }
            ConfigError::ReadFile { path, .. } => {
                write!(f, "unable to read engine config {}", path.display())
            }
            ConfigError::ParseFile { path, .. } => {
                write!(f, "engine config {} is not valid JSON", path.display())
            }
            ConfigError::Quality(err) => write!(f, "invalid quality policy: {err}"),
            ConfigError::ChunkSize(size) => write!(
                f,
                "write chunk size must be between 1 and 50 (found {size})"
            ),
            ConfigError::Threshold { name, value } => {
                write!(f, "{name} must lie in [0, 1] (found {value})")
            }
            ConfigError::TierOrder { high, medium } => write!(
                f,
                "high confidence threshold {high} is below medium threshold {medium}"
            ),
            ConfigError::WindowDays { name, value } => write!(
                f,
                "{name} must be between 0 and {MAX_WINDOW_DAYS} days (found {value})"
            ),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::ReadFile { source, .. } => Some(source),
            ConfigError::ParseFile { source, .. } => Some(source),
            ConfigError::Quality(err) => Some(err),
            ConfigError::InvalidNumber { .. }
            | ConfigError::InvalidNoteMode(_)
            | ConfigError::ChunkSize(_)
            | ConfigError::Threshold { .. }
            | ConfigError::TierOrder { .. }
            | ConfigError::WindowDays { .. } => None,
        }
    }
}
