//! Splunk HTTP Event Collector delivery.

use super::{combined_format, format_version_2, from_env};
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::handlers::{
    create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges,
};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Splunk {
    pub name: String,
    /// Collector URL
    pub url: String,
    /// HEC token; defaults to `FASTLY_SPLUNK_TOKEN`
    #[serde(default = "token_from_env")]
    pub token: String,
    #[serde(default = "combined_format")]
    pub format: String,
    #[serde(default = "format_version_2")]
    pub format_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<String>,
}

fn token_from_env() -> String {
    from_env("FASTLY_SPLUNK_TOKEN")
}

impl Splunk {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("url", &self.url)
            .secret("token", &self.token)
            .field("format", &self.format)
            .number("format_version", self.format_version)
            .opt("response_condition", self.response_condition.as_deref())
            .opt("placement", self.placement.as_deref())
            .opt("tls_hostname", self.tls_hostname.as_deref())
            .opt("tls_ca_cert", self.tls_ca_cert.as_deref())
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            url: record.string("url"),
            token: record.string("token"),
            format: record.string("format"),
            format_version: record.uint("format_version"),
            response_condition: record.opt_string("response_condition"),
            placement: record.opt_string("placement"),
            tls_hostname: record.opt_string("tls_hostname"),
            tls_ca_cert: record.opt_string("tls_ca_cert"),
        }
    }
}

impl Block for Splunk {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct SplunkHandler;

#[async_trait]
impl AttributeHandler for SplunkHandler {
    fn key(&self) -> &'static str {
        "splunk"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.splunk, &new.splunk)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for endpoint in difference(&old.splunk, &new.splunk) {
            delete_block(api, version, Collection::Splunk, &endpoint.name).await?;
        }
        for endpoint in difference(&new.splunk, &old.splunk) {
            create_block(api, version, Collection::Splunk, &endpoint.name, &endpoint.to_form())
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
        let records = list_blocks(api, version, Collection::Splunk).await?;
        config.splunk = records.iter().map(Splunk::from_record).collect();
        Ok(())
    }
}
