//! # Controller Configuration
//!
//! Process-level settings loaded from environment variables.

use crate::constants::{
    API_URL_ENV, DEFAULT_API_URL, DEFAULT_BACKOFF_MAX_MINUTES, DEFAULT_BACKOFF_MIN_MINUTES,
    DEFAULT_METRICS_PORT, DEFAULT_REQUEST_TIMEOUT_SECS, DEFAULT_VERSION_SETTLE_DELAY_SECS,
    DEFAULT_WATCH_INTERVAL_SECS, MIN_WATCH_INTERVAL_SECS,
};
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

/// Controller-level configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Fastly API endpoint
    pub api_url: String,
    /// Per-request timeout (seconds)
    pub request_timeout_secs: u64,
    /// Wait after cloning a version before writing to it (seconds)
    pub version_settle_delay_secs: u64,
    /// Port for `/metrics`, `/healthz` and `/readyz` in watch mode
    pub metrics_port: u16,
    /// Drift check interval in watch mode (seconds)
    /// Clamped to `MIN_WATCH_INTERVAL_SECS`
    pub watch_interval_secs: u64,
    /// Fibonacci backoff floor (minutes)
    pub backoff_min_minutes: u64,
    /// Fibonacci backoff ceiling (minutes)
    pub backoff_max_minutes: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
    /// Enable metrics collection and the metrics server
    pub enable_metrics: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            version_settle_delay_secs: DEFAULT_VERSION_SETTLE_DELAY_SECS,
            metrics_port: DEFAULT_METRICS_PORT,
            watch_interval_secs: DEFAULT_WATCH_INTERVAL_SECS,
            backoff_min_minutes: DEFAULT_BACKOFF_MIN_MINUTES,
            backoff_max_minutes: DEFAULT_BACKOFF_MAX_MINUTES,
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
            log_enable_color: true,
            enable_metrics: true,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            api_url: env_var_or_default_str(API_URL_ENV, DEFAULT_API_URL),
            request_timeout_secs: env_var_or_default(
                "REQUEST_TIMEOUT_SECS",
                DEFAULT_REQUEST_TIMEOUT_SECS,
            ),
            version_settle_delay_secs: env_var_or_default(
                "VERSION_SETTLE_DELAY_SECS",
                DEFAULT_VERSION_SETTLE_DELAY_SECS,
            ),
            metrics_port: env_var_or_default("METRICS_PORT", DEFAULT_METRICS_PORT),
            watch_interval_secs: env_var_or_default(
                "WATCH_INTERVAL_SECS",
                DEFAULT_WATCH_INTERVAL_SECS,
            )
            .max(MIN_WATCH_INTERVAL_SECS),
            backoff_min_minutes: env_var_or_default(
                "BACKOFF_MIN_MINUTES",
                DEFAULT_BACKOFF_MIN_MINUTES,
            ),
            backoff_max_minutes: env_var_or_default(
                "BACKOFF_MAX_MINUTES",
                DEFAULT_BACKOFF_MAX_MINUTES,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            log_enable_color: env_var_or_default_bool("LOG_ENABLE_COLOR", true),
            enable_metrics: env_var_or_default_bool("ENABLE_METRICS", true),
        }
    }

    /// Only the logging settings from the environment, everything else at
    /// its default. Used to set up tracing before [`Self::from_env`] runs so
    /// its warnings are not lost.
    #[must_use]
    pub fn logging_from_env() -> Self {
        Self {
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            log_enable_color: env_var_or_default_bool("LOG_ENABLE_COLOR", true),
            ..Self::default()
        }
    }

    /// Get per-request timeout duration
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Get version settle delay duration
    #[must_use]
    pub fn version_settle_delay(&self) -> Duration {
        Duration::from_secs(self.version_settle_delay_secs)
    }

    /// Get watch interval duration
    #[must_use]
    pub fn watch_interval(&self) -> Duration {
        Duration::from_secs(self.watch_interval_secs)
    }

    /// Whether logs should be emitted as JSON lines
    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Read environment variable or return default value. A value that does not
/// parse is logged and ignored.
fn env_var_or_default<T: FromStr + Display>(key: &str, default: T) -> T {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        warn!("Ignoring {}={:?}: not a valid value, using {}", key, raw, default);
        default
    })
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    let Ok(raw) = std::env::var(key) else {
        return default;
    };
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => true,
        "false" | "0" | "no" | "off" => false,
        _ => {
            warn!("Ignoring {}={:?}: not a boolean, using {}", key, raw, default);
            default
        }
    }
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_constants() {
        let config = ControllerConfig::default();
        assert_eq!(config.api_url, "https://api.fastly.com");
        assert_eq!(config.version_settle_delay(), Duration::from_secs(7));
        assert_eq!(config.metrics_port, 5000);
        assert!(!config.json_logs());
    }

    #[test]
    fn test_bool_parsing_accepts_common_spellings() {
        for (value, expected) in [("true", true), ("YES", true), ("on", true), ("0", false), ("Off", false)] {
            let key = format!("FSC_TEST_BOOL_{}", value.to_uppercase());
            std::env::set_var(&key, value);
            assert_eq!(env_var_or_default_bool(&key, !expected), expected, "{value}");
            std::env::remove_var(&key);
        }
    }

    #[test]
    fn test_unknown_bool_keeps_default() {
        std::env::set_var("FSC_TEST_BOOL_UNKNOWN", "nope");
        assert!(env_var_or_default_bool("FSC_TEST_BOOL_UNKNOWN", true));
        assert!(!env_var_or_default_bool("FSC_TEST_BOOL_UNKNOWN", false));
        std::env::remove_var("FSC_TEST_BOOL_UNKNOWN");
    }

    #[test]
    fn test_unparseable_number_falls_back() {
        std::env::set_var("FSC_TEST_NUMBER", "seven");
        assert_eq!(env_var_or_default("FSC_TEST_NUMBER", 7_u64), 7);
        std::env::set_var("FSC_TEST_NUMBER", " 12 ");
        assert_eq!(env_var_or_default("FSC_TEST_NUMBER", 7_u64), 12);
        std::env::remove_var("FSC_TEST_NUMBER");
    }

    #[test]
    fn test_logging_settings_load_without_the_rest() {
        std::env::set_var("LOG_FORMAT", "json");
        std::env::set_var("LOG_LEVEL", "DEBUG");
        let config = ControllerConfig::logging_from_env();
        std::env::remove_var("LOG_FORMAT");
        std::env::remove_var("LOG_LEVEL");

        assert!(config.json_logs());
        assert_eq!(config.log_level, "DEBUG");
        assert_eq!(config.api_url, ControllerConfig::default().api_url);
        assert_eq!(config.metrics_port, 5000);
    }
}
