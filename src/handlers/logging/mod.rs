//! # Logging Endpoints
//!
//! One handler per streaming logging provider. They share the log format
//! defaults and the message type enumeration below; credentials that are
//! usually kept out of configuration files fall back to environment
//! variables.

pub mod bigquery;
pub mod blobstorage;
pub mod gcs;
pub mod heroku;
pub mod logentries;
pub mod papertrail;
pub mod s3;
pub mod splunk;
pub mod sumologic;
pub mod syslog;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Apache-style format used by version 1 endpoints
pub(crate) const COMMON_FORMAT: &str = "%h %l %u %t %r %>s";
/// Format used by endpoints that default to format version 2
pub(crate) const COMBINED_FORMAT: &str = "%h %l %u %t \"%r\" %>s %b";
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S.000";

/// How log lines are framed before being sent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    #[default]
    Classic,
    Loggly,
    Logplex,
    Blank,
}

pub(crate) fn common_format() -> String {
    COMMON_FORMAT.to_string()
}

pub(crate) fn combined_format() -> String {
    COMBINED_FORMAT.to_string()
}

pub(crate) fn timestamp_format() -> String {
    TIMESTAMP_FORMAT.to_string()
}

pub(crate) fn format_version_1() -> u32 {
    1
}

pub(crate) fn format_version_2() -> u32 {
    2
}

pub(crate) fn period() -> u32 {
    3600
}

/// Value of `key`, empty when unset
pub(crate) fn from_env(key: &str) -> String {
    std::env::var(key).unwrap_or_default()
}
