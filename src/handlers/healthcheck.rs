//! Origin health checks. Backends reference them by name, so they are
//! processed before backends.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Healthcheck {
    pub name: String,
    /// Host header to send with the check
    pub host: String,
    /// Path to request
    pub path: String,
    /// How often to run the check (milliseconds)
    #[serde(default = "default_check_interval")]
    pub check_interval: u32,
    #[serde(default = "default_expected_response")]
    pub expected_response: u32,
    #[serde(default = "default_http_version")]
    pub http_version: String,
    /// Passing checks assumed when the service starts
    #[serde(default = "default_initial")]
    pub initial: u32,
    #[serde(default = "default_method")]
    pub method: String,
    /// Passing checks out of `window` required to be healthy
    #[serde(default = "default_threshold")]
    pub threshold: u32,
    /// Timeout of a single check (milliseconds)
    #[serde(default = "default_timeout")]
    pub timeout: u32,
    #[serde(default = "default_window")]
    pub window: u32,
}

fn default_check_interval() -> u32 {
    5000
}

fn default_expected_response() -> u32 {
    200
}

fn default_http_version() -> String {
    "1.1".to_string()
}

fn default_initial() -> u32 {
    2
}

fn default_method() -> String {
    "HEAD".to_string()
}

fn default_threshold() -> u32 {
    3
}

fn default_timeout() -> u32 {
    500
}

fn default_window() -> u32 {
    5
}

impl Healthcheck {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("host", &self.host)
            .field("path", &self.path)
            .number("check_interval", self.check_interval)
            .number("expected_response", self.expected_response)
            .field("http_version", &self.http_version)
            .number("initial", self.initial)
            .field("method", &self.method)
            .number("threshold", self.threshold)
            .number("timeout", self.timeout)
            .number("window", self.window)
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            host: record.string("host"),
            path: record.string("path"),
            check_interval: record.uint("check_interval"),
            expected_response: record.uint("expected_response"),
            http_version: record.string("http_version"),
            initial: record.uint("initial"),
            method: record.string("method"),
            threshold: record.uint("threshold"),
            timeout: record.uint("timeout"),
            window: record.uint("window"),
        }
    }
}

impl Block for Healthcheck {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct HealthcheckHandler;

#[async_trait]
impl AttributeHandler for HealthcheckHandler {
    fn key(&self) -> &'static str {
        "healthcheck"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.healthcheck, &new.healthcheck)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for check in difference(&old.healthcheck, &new.healthcheck) {
            delete_block(api, version, Collection::Healthcheck, &check.name).await?;
        }
        for check in difference(&new.healthcheck, &old.healthcheck) {
            create_block(api, version, Collection::Healthcheck, &check.name, &check.to_form())
                .await?;
        }
        Ok(())
    }

    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()> {
        let records = list_blocks(api, version, Collection::Healthcheck).await?;
        config.healthcheck = records.iter().map(Healthcheck::from_record).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_yaml_defaults() {
        let check: Healthcheck =
            serde_yaml::from_str("name: hc\nhost: example.com\npath: /status\n").expect("yaml");
        assert_eq!(check.check_interval, 5000);
        assert_eq!(check.expected_response, 200);
        assert_eq!(check.http_version, "1.1");
        assert_eq!(check.method, "HEAD");
        assert_eq!(check.threshold, 3);
        assert_eq!(check.timeout, 500);
        assert_eq!(check.window, 5);
    }

    #[test]
    fn test_read_back_matches_defaults() {
        let check: Healthcheck =
            serde_yaml::from_str("name: hc\nhost: example.com\npath: /status\n").expect("yaml");
        let record: Record = serde_json::from_value(json!({
            "name": "hc", "host": "example.com", "path": "/status",
            "check_interval": 5000, "expected_response": "200", "http_version": "1.1",
            "initial": 2, "method": "HEAD", "threshold": 3, "timeout": 500, "window": 5
        }))
        .expect("record");
        assert_eq!(Healthcheck::from_record(&record), check);
    }
}
