use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::{ConfigError, MAX_WINDOW_DAYS};
use crate::engine::{QualityPolicy, WriteConfig};
use crate::store::MAX_RECORDS_PER_WRITE;
use crate::workflows::digest::DigestConfig;
use crate::workflows::export::ExportConfig;
use crate::workflows::health::HealthConfig;
use crate::workflows::status::StatusConfig;
use crate::workflows::supersedes::SupersedesConfig;

/// Every workflow's settings. Built once at startup and passed down by value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub supersedes: SupersedesConfig,
    pub export: ExportConfig,
    pub health: HealthConfig,
    pub status: StatusConfig,
    pub digest: DigestConfig,
    pub quality: QualityPolicy,
    pub write: WriteConfig,
}

impl EngineConfig {
    /// Reads a JSON file; missing keys keep their defaults.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.quality.validate().map_err(ConfigError::Quality)?;

        let chunk_size = self.write.chunk_size;
        if chunk_size == 0 || chunk_size > MAX_RECORDS_PER_WRITE {
            return Err(ConfigError::ChunkSize(chunk_size));
        }

        let supersedes = &self.supersedes;
        for (name, value) in [
            ("min_match_score", supersedes.min_match_score),
            ("thresholds.high", supersedes.thresholds.high),
            ("thresholds.medium", supersedes.thresholds.medium),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::Threshold { name, value });
            }
        }
        if supersedes.thresholds.high < supersedes.thresholds.medium {
            return Err(ConfigError::TierOrder {
                high: supersedes.thresholds.high,
                medium: supersedes.thresholds.medium,
            });
        }
        if supersedes.max_year_diff < 0 {
            return Err(ConfigError::InvalidNumber {
                var: "max_year_diff",
                value: supersedes.max_year_diff.to_string(),
            });
        }
        for (name, value) in [
            ("health.default_window_days", self.health.default_window_days),
            ("digest.window_days", self.digest.window_days),
        ] {
            if !(0..=MAX_WINDOW_DAYS).contains(&value) {
                return Err(ConfigError::WindowDays { name, value });
            }
        }
        Ok(())
    }
}
