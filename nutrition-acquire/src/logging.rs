//! Logging utilities and configuration for the acquisition pipeline.
//!
//! The crate logs through `tracing`. [`LogConfig`] gates the chattier
//! per-page and per-source events, and [`setup`] installs a
//! `tracing-subscriber` registry for binaries.

/// Logging configuration for the acquisition pipeline.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Whether to log every page fetched by the paginator
    pub log_page_details: bool,
    /// Whether to log each attempt of the fallback chain
    pub log_source_attempts: bool,
    /// Maximum length for logged field values (URLs, response snippets)
    pub max_field_length: usize,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            log_page_details: false,
            log_source_attempts: true,
            max_field_length: 256,
        }
    }
}

impl LogConfig {
    /// Creates a verbose configuration suitable for debugging.
    pub fn verbose() -> Self {
        Self {
            log_page_details: true,
            log_source_attempts: true,
            max_field_length: 1024,
        }
    }

    /// Creates a minimal configuration for production with lowest overhead.
    pub fn production() -> Self {
        Self {
            log_page_details: false,
            log_source_attempts: false,
            max_field_length: 128,
        }
    }

    /// Creates a balanced configuration suitable for most use cases.
    pub fn balanced() -> Self {
        Self::default()
    }
}

/// Macro for per-page paginator logging.
#[macro_export]
macro_rules! log_page {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_page_details {
            tracing::debug!($($arg)*);
        }
    };
}

/// Macro for fallback-chain attempt logging.
#[macro_export]
macro_rules! log_source {
    ($config:expr, $($arg:tt)*) => {
        if $config.log_source_attempts {
            tracing::info!($($arg)*);
        }
    };
}

/// Truncates a string to at most `max_length` bytes, on a character boundary.
pub fn truncate_field(value: &str, max_length: usize) -> String {
    if value.len() <= max_length {
        return value.to_string();
    }
    let mut end = max_length;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...(truncated)", &value[..end])
}

/// Utilities for installing a subscriber in binaries.
pub mod setup {
    use tracing::Level;

    /// Configuration for the logging setup.
    #[derive(Debug, Clone)]
    pub struct LoggingConfig {
        /// Log level for the application
        pub level: Level,
        /// Log level for this crate specifically
        pub crate_level: Level,
        /// Whether to use JSON output format
        pub json_format: bool,
        /// Environment filter override
        pub env_filter: Option<String>,
    }

    impl Default for LoggingConfig {
        fn default() -> Self {
            Self {
                level: Level::WARN,
                crate_level: Level::INFO,
                json_format: false,
                env_filter: None,
            }
        }
    }

    impl LoggingConfig {
        /// Creates a configuration for production use.
        pub fn production() -> Self {
            Self {
                level: Level::WARN,
                crate_level: Level::INFO,
                json_format: true,
                env_filter: None,
            }
        }

        /// Creates a configuration for development use.
        pub fn development() -> Self {
            Self {
                level: Level::DEBUG,
                crate_level: Level::DEBUG,
                json_format: false,
                env_filter: None,
            }
        }

        /// Sets the log level for the application.
        pub fn with_level(mut self, level: Level) -> Self {
            self.level = level;
            self
        }

        /// Sets the log level for this crate.
        pub fn with_crate_level(mut self, level: Level) -> Self {
            self.crate_level = level;
            self
        }

        /// Sets whether to use JSON output format.
        pub fn with_json_format(mut self, enabled: bool) -> Self {
            self.json_format = enabled;
            self
        }

        /// Sets a custom environment filter.
        pub fn with_env_filter(mut self, filter: impl Into<String>) -> Self {
            self.env_filter = Some(filter.into());
            self
        }

        /// Builds the environment filter string.
        pub fn env_filter(&self) -> String {
            if let Some(ref filter) = self.env_filter {
                filter.clone()
            } else {
                format!(
                    "{},nutrition_acquire={},acquire={}",
                    self.level.as_str().to_lowercase(),
                    self.crate_level.as_str().to_lowercase(),
                    self.crate_level.as_str().to_lowercase()
                )
            }
        }
    }

    /// Initializes logging. `RUST_LOG` takes precedence over the configured filter.
    ///
    /// # Examples
    ///
    /// ```rust,no_run
    /// use nutrition_acquire::logging::setup::{init_logging, LoggingConfig};
    ///
    /// init_logging(LoggingConfig::development().with_json_format(true)).unwrap();
    /// ```
    pub fn init_logging(config: LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
        use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(config.env_filter()));

        let fmt_layer = if config.json_format {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
                .boxed()
        } else {
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .boxed()
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt_layer)
            .try_init()?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::setup::LoggingConfig;
    use super::*;

    #[test]
    fn test_log_config_defaults() {
        let config = LogConfig::default();
        assert!(!config.log_page_details);
        assert!(config.log_source_attempts);
        assert_eq!(config.max_field_length, 256);
    }

    #[test]
    fn test_log_config_presets() {
        let verbose = LogConfig::verbose();
        assert!(verbose.log_page_details);

        let production = LogConfig::production();
        assert!(!production.log_source_attempts);
        assert_eq!(production.max_field_length, 128);
    }

    #[test]
    fn test_truncate_field() {
        assert_eq!(truncate_field("hello", 10), "hello");
        assert_eq!(
            truncate_field("this is a very long text that should be truncated", 10),
            "this is a ...(truncated)"
        );
    }

    #[test]
    fn test_truncate_field_respects_char_boundaries() {
        // 'Ñ' spans bytes 1..3, so a cut at byte 2 backs off to 1
        assert_eq!(truncate_field("AÑOS", 2), "A...(truncated)");
    }

    #[test]
    fn test_env_filter() {
        let config = LoggingConfig::default();
        assert_eq!(
            config.env_filter(),
            "warn,nutrition_acquire=info,acquire=info"
        );
        let custom = LoggingConfig::default().with_env_filter("debug");
        assert_eq!(custom.env_filter(), "debug");
    }
}
