//! Logging setup shared by the SocialSync binaries
//!
//! Supports text, JSON and pretty-printed output on stderr, filtered with
//! `RUST_LOG` when set and otherwise by the configured level.
//!
//! # Examples
//!
//! ```no_run
//! use libsocialsync::logging::{LogFormat, LoggingConfig};
//!
//! LoggingConfig::new(LogFormat::Json, "info".to_string(), false).init();
//!
//! // Or honour SOCIALSYNC_LOG_FORMAT / SOCIALSYNC_LOG_LEVEL
//! libsocialsync::logging::init_default();
//! ```

use std::str::FromStr;

use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Plain text without target names
    Text,
    /// One JSON object per line
    Json,
    /// Multi-line, colored output for development
    Pretty,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            "pretty" => Ok(LogFormat::Pretty),
            _ => Err(format!(
                "Invalid log format: '{}'. Valid options: text, json, pretty",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
            LogFormat::Pretty => write!(f, "pretty"),
        }
    }
}

pub struct LoggingConfig {
    pub format: LogFormat,
    pub level: String,
    pub verbose: bool,
}

impl LoggingConfig {
    /// `verbose` forces the `debug` level unless `RUST_LOG` is set.
    pub fn new(format: LogFormat, level: String, verbose: bool) -> Self {
        Self {
            format,
            level,
            verbose,
        }
    }

    fn filter(&self) -> EnvFilter {
        let level = if self.verbose { "debug" } else { &self.level };
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
    }

    /// Install the global subscriber.
    ///
    /// # Panics
    ///
    /// Panics if a global subscriber has already been installed.
    pub fn init(&self) {
        let filter = self.filter();

        match self.format {
            LogFormat::Json => {
                tracing_subscriber::fmt()
                    .json()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_current_span(true)
                    .flatten_event(true)
                    .with_target(true)
                    .init();
            }
            LogFormat::Pretty => {
                tracing_subscriber::fmt()
                    .pretty()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .init();
            }
            LogFormat::Text => {
                tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(false)
                    .with_level(true)
                    .init();
            }
        }
    }
}

/// Initialize logging from `SOCIALSYNC_LOG_FORMAT` and `SOCIALSYNC_LOG_LEVEL`.
///
/// Falls back to text format at `warn` level so that progress output on
/// stderr stays readable.
pub fn init_default() {
    from_env(false).init();
}

/// Build a logging config from the environment, optionally forcing debug level.
pub fn from_env(verbose: bool) -> LoggingConfig {
    let format = std::env::var("SOCIALSYNC_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);

    let level = std::env::var("SOCIALSYNC_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string());

    LoggingConfig::new(format, level, verbose)
}
