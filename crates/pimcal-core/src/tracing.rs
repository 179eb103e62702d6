//! Tracing setup shared by the pimcal crates.
//!
//! Log output goes to stderr, next to the occurrence dump when the driver
//! runs without an output file.
//!
//! # Usage
//!
//! ```ignore
//! use pimcal_core::tracing::{init_tracing, TracingConfig};
//!
//! init_tracing(TracingConfig::for_verbosity(1)).expect("failed to initialize tracing");
//! ```

use thiserror::Error;
use tracing::Level;
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    prelude::*,
};

/// Errors that can occur during tracing initialization
#[derive(Debug, Error)]
pub enum TracingError {
    /// A global subscriber was already installed.
    #[error("failed to set global tracing subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing::subscriber::SetGlobalDefaultError),

    /// The filter directive could not be parsed.
    #[error("failed to parse env filter: {0}")]
    EnvFilter(#[from] tracing_subscriber::filter::ParseError),
}

/// Output format for log lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TracingOutputFormat {
    /// Multi-line human-readable format
    Pretty,
    /// Single-line format (default)
    #[default]
    Compact,
    /// One JSON object per line
    Json,
}

impl TracingOutputFormat {
    /// Parses a format name as written in the configuration file.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "pretty" => Some(Self::Pretty),
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Configuration for tracing initialization
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for the pimcal crates when `RUST_LOG` is not set
    pub default_level: Level,
    /// Line format of the log output
    pub output_format: TracingOutputFormat,
    /// Include file and line of the call site
    pub include_location: bool,
    /// Include the module path of the emitting code
    pub include_target: bool,
    /// Prefix each line with the current time
    pub include_timestamp: bool,
    /// Log span creation and close
    pub include_span_events: bool,
    /// Explicit filter directive; wins over `RUST_LOG` and `default_level`
    pub env_filter: Option<String>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            default_level: Level::WARN,
            output_format: TracingOutputFormat::Compact,
            include_location: false,
            include_target: true,
            include_timestamp: false,
            include_span_events: false,
            env_filter: None,
        }
    }
}

impl TracingConfig {
    /// Preset for the command-line driver, by number of `-v` flags.
    ///
    /// No flag logs warnings only, one flag adds info, two add debug with
    /// call sites, three or more log everything.
    #[must_use]
    pub fn for_verbosity(verbosity: u8) -> Self {
        let base = Self::default();
        match verbosity {
            0 => base,
            1 => base.with_level(Level::INFO),
            2 => Self {
                include_location: true,
                ..base.with_level(Level::DEBUG)
            },
            _ => Self {
                include_location: true,
                include_span_events: true,
                ..base.with_level(Level::TRACE)
            },
        }
    }

    #[must_use]
    pub fn with_level(mut self, level: Level) -> Self {
        self.default_level = level;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingOutputFormat) -> Self {
        self.output_format = format;
        self
    }

    #[must_use]
    pub fn with_timestamp(mut self, include: bool) -> Self {
        self.include_timestamp = include;
        self
    }

    #[must_use]
    pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Directive used when neither `env_filter` nor `RUST_LOG` is set.
    pub fn default_directive(&self) -> String {
        format!("pimcal={}", self.default_level)
    }
}

/// Initialize tracing with the given configuration.
///
/// Call once at startup. `RUST_LOG` overrides the default level.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set or if
/// the env filter directive is invalid.
pub fn init_tracing(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter = if let Some(ref filter) = config.env_filter {
        EnvFilter::try_new(filter)?
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.default_directive()))
    };

    let span_events = if config.include_span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };

    match config.output_format {
        TracingOutputFormat::Pretty => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .pretty()
                    .with_writer(std::io::stderr)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_target(config.include_target)
                    .with_span_events(span_events),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
        TracingOutputFormat::Compact => {
            let layer = fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
                .with_file(config.include_location)
                .with_line_number(config.include_location)
                .with_target(config.include_target)
                .with_span_events(span_events);

            let layer = if config.include_timestamp {
                layer.boxed()
            } else {
                layer.without_time().boxed()
            };

            let subscriber = tracing_subscriber::registry().with(env_filter).with(layer);
            tracing::subscriber::set_global_default(subscriber)?;
        }
        TracingOutputFormat::Json => {
            let subscriber = tracing_subscriber::registry().with(env_filter).with(
                fmt::layer()
                    .json()
                    .with_writer(std::io::stderr)
                    .with_file(config.include_location)
                    .with_line_number(config.include_location)
                    .with_target(config.include_target)
                    .with_span_events(span_events),
            );
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_quiet_compact() {
        let config = TracingConfig::default();
        assert_eq!(config.default_level, Level::WARN);
        assert_eq!(config.output_format, TracingOutputFormat::Compact);
        assert!(!config.include_timestamp);
        assert!(config.env_filter.is_none());
        assert_eq!(config.default_directive(), "pimcal=WARN");
    }

    #[test]
    fn verbosity_presets() {
        assert_eq!(TracingConfig::for_verbosity(0).default_level, Level::WARN);
        assert_eq!(TracingConfig::for_verbosity(1).default_level, Level::INFO);

        let debug = TracingConfig::for_verbosity(2);
        assert_eq!(debug.default_level, Level::DEBUG);
        assert!(debug.include_location);
        assert!(!debug.include_span_events);

        let trace = TracingConfig::for_verbosity(7);
        assert_eq!(trace.default_level, Level::TRACE);
        assert!(trace.include_span_events);
    }

    #[test]
    fn format_names() {
        assert_eq!(
            TracingOutputFormat::from_name("JSON"),
            Some(TracingOutputFormat::Json)
        );
        assert_eq!(
            TracingOutputFormat::from_name("pretty"),
            Some(TracingOutputFormat::Pretty)
        );
        assert_eq!(TracingOutputFormat::from_name("xml"), None);
    }

    #[test]
    fn builder_methods() {
        let config = TracingConfig::default()
            .with_level(Level::ERROR)
            .with_format(TracingOutputFormat::Json)
            .with_timestamp(true)
            .with_env_filter("pimcal_core=trace");

        assert_eq!(config.default_level, Level::ERROR);
        assert_eq!(config.output_format, TracingOutputFormat::Json);
        assert!(config.include_timestamp);
        assert_eq!(config.env_filter.as_deref(), Some("pimcal_core=trace"));
    }
}
