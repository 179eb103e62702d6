//! Driver configuration.
//!
//! Settings live in `~/.config/pimcal/config.toml` by default. Every
//! section is optional; command-line flags override file values.

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use pimcal_core::{TracingOutputFormat, WalkPolicy, Zone};
use pimcal_core::walk::{DEFAULT_MAX_ITERATIONS, DEFAULT_PROBE_YEARS};
use serde::{Deserialize, Serialize};

use crate::error::{CliError, CliResult};

const FALLBACK_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Configuration for the pimcal driver.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PimcalConfig {
    pub walk: WalkSettings,
    pub view: ViewSettings,
    pub logging: LoggingSettings,
}

/// Bounds of the backward occurrence walk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkSettings {
    /// Occurrences listed per incidence at most.
    pub max_iterations: usize,

    /// Years past the recurrence end the walk starts from.
    pub probe_years: i32,

    /// Wall-clock start for recurrences that never end, as
    /// `YYYY-MM-DDTHH:MM:SS` in the view zone.
    pub fallback: String,
}

impl Default for WalkSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            probe_years: DEFAULT_PROBE_YEARS,
            fallback: "2011-01-01T00:00:01".to_string(),
        }
    }
}

/// How occurrences are displayed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewSettings {
    /// Zone used when neither the command line nor the calendar names one.
    pub zone: Option<String>,
}

/// Log output settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// `compact`, `pretty` or `json`.
    pub format: String,

    pub timestamps: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            format: "compact".to_string(),
            timestamps: false,
        }
    }
}

impl LoggingSettings {
    pub fn output_format(&self) -> CliResult<TracingOutputFormat> {
        TracingOutputFormat::from_name(&self.format)
            .ok_or_else(|| CliError::Config(format!("unknown log format {:?}", self.format)))
    }
}

impl PimcalConfig {
    /// Loads configuration from the default path, or defaults when the file
    /// does not exist.
    pub fn load() -> CliResult<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> CliResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            CliError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content).map_err(|e| {
            CliError::Config(format!("failed to parse {}: {}", path.display(), e))
        })
    }

    pub fn default_path() -> PathBuf {
        Self::default_config_dir().join("config.toml")
    }

    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("pimcal")
    }

    /// Builds the walk policy, with `max_iterations` from the command line
    /// taking precedence.
    pub fn walk_policy(&self, max_iterations: Option<usize>) -> CliResult<WalkPolicy> {
        let fallback = NaiveDateTime::parse_from_str(&self.walk.fallback, FALLBACK_FORMAT)
            .map_err(|e| {
                CliError::Config(format!(
                    "invalid walk fallback {:?}: {}",
                    self.walk.fallback, e
                ))
            })?;
        Ok(WalkPolicy::default()
            .with_max_iterations(max_iterations.unwrap_or(self.walk.max_iterations))
            .with_probe_years(self.walk.probe_years)
            .with_fallback(fallback))
    }

    /// Returns the configured view zone, if any.
    pub fn view_zone(&self) -> CliResult<Option<Zone>> {
        self.view
            .zone
            .as_deref()
            .map(Zone::parse)
            .transpose()
            .map_err(CliError::from)
    }
}
