//! rmgrid.toml configuration parser.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RmConfig {
    #[serde(default)]
    pub selection: SelectionConfig,
}

/// How a batch of predicate evaluators is driven.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchMode {
    /// One task per candidate, bounded by the worker pool.
    #[default]
    Pooled,
    /// One candidate at a time, in ranked order.
    Sequential,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionConfig {
    /// Deadline for a whole batch of evaluations ("30s", "500ms", "1m").
    pub script_timeout: String,
    /// Maximum number of evaluators running at once.
    pub max_workers: usize,
    pub dispatch: DispatchMode,
    /// Maximum number of distinct scripts remembered. 0 means unbounded.
    pub knowledge_capacity: usize,
    /// Directory of script bodies allowed to run. Unset accepts any script.
    pub authorized_scripts_dir: Option<PathBuf>,
    /// How long a loaded authorized scripts directory is trusted before
    /// the next request re-reads it.
    pub authorized_scripts_refresh: String,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            script_timeout: "30s".to_string(),
            max_workers: 50,
            dispatch: DispatchMode::Pooled,
            knowledge_capacity: 10_000,
            authorized_scripts_dir: None,
            authorized_scripts_refresh: "60s".to_string(),
        }
    }
}

impl SelectionConfig {
    pub fn script_timeout(&self) -> Result<Duration, ConfigError> {
        parse_duration("selection.script_timeout", &self.script_timeout)
    }

    pub fn authorized_scripts_refresh(&self) -> Result<Duration, ConfigError> {
        parse_duration(
            "selection.authorized_scripts_refresh",
            &self.authorized_scripts_refresh,
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.script_timeout()?;
        self.authorized_scripts_refresh()?;
        if self.max_workers == 0 {
            return Err(ConfigError::Invalid {
                field: "selection.max_workers",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }
}

impl RmConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let config: RmConfig = toml::from_str(content)?;
        config.selection.validate()?;
        Ok(config)
    }
}

/// Parse a duration such as "5s", "500ms", "1m", or bare seconds.
///
/// `field` names the setting in the returned error.
pub fn parse_duration(field: &'static str, value: &str) -> Result<Duration, ConfigError> {
    let invalid = || ConfigError::InvalidDuration {
        field,
        value: value.to_string(),
    };
    let trimmed = value.trim();
    let digits = trimmed
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(trimmed.len());
    let (amount, unit) = trimmed.split_at(digits);
    let amount: u64 = amount.parse().map_err(|_| invalid())?;
    match unit {
        "" | "s" => Ok(Duration::from_secs(amount)),
        "ms" => Ok(Duration::from_millis(amount)),
        "m" => amount
            .checked_mul(60)
            .map(Duration::from_secs)
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}
