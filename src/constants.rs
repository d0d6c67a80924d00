//! # Constants
//!
//! Shared constants used throughout the controller.
//!
//! These values represent reasonable defaults and can be overridden via
//! configuration or environment variables where applicable.

/// Default Fastly API endpoint
pub const DEFAULT_API_URL: &str = "https://api.fastly.com";

/// Environment variable holding the Fastly API token
pub const API_KEY_ENV: &str = "FASTLY_API_KEY";

/// Environment variable overriding the Fastly API endpoint
pub const API_URL_ENV: &str = "FASTLY_API_URL";

/// Header carrying the API token on every request
pub const API_KEY_HEADER: &str = "Fastly-Key";

/// Default per-request timeout (seconds)
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Delay after cloning a version before mutating the clone (seconds)
/// The API occasionally rejects writes against a version cloned moments earlier
pub const DEFAULT_VERSION_SETTLE_DELAY_SECS: u64 = 7;

/// Default HTTP server port for metrics and health checks
pub const DEFAULT_METRICS_PORT: u16 = 5000;

/// Default interval between drift checks in watch mode (seconds)
pub const DEFAULT_WATCH_INTERVAL_SECS: u64 = 300;

/// Minimum watch interval (seconds)
/// Shorter intervals risk API rate limiting
pub const MIN_WATCH_INTERVAL_SECS: u64 = 60;

/// Fibonacci backoff floor after a failed reconciliation (minutes)
pub const DEFAULT_BACKOFF_MIN_MINUTES: u64 = 1;

/// Fibonacci backoff ceiling after repeated failures (minutes)
pub const DEFAULT_BACKOFF_MAX_MINUTES: u64 = 10;

/// Comment applied to services that do not set one
pub const DEFAULT_SERVICE_COMMENT: &str = "Managed by fastly-service-controller";

/// Default TTL for a service version (seconds)
pub const DEFAULT_TTL_SECS: u32 = 3600;

/// Console URL for a staged (inactive) version
pub const CONSOLE_VERSION_URL: &str = "https://manage.fastly.com/configure/services";
