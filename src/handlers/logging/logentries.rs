//! Logentries delivery.

use super::{common_format, format_version_1};
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
pub struct Logentries {
    pub name: String,
    /// Token of the Logentries log set
    pub token: String,
    #[serde(default = "default_port")]
    pub port: u32,
    #[serde(default = "default_true")]
    pub use_tls: bool,
    #[serde(default = "common_format")]
    pub format: String,
    #[serde(default = "format_version_1")]
    pub format_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
}

fn default_port() -> u32 {
    20000
}

fn default_true() -> bool {
    true
}

impl Logentries {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .secret("token", &self.token)
            .number("port", self.port)
            .flag("use_tls", self.use_tls)
            .field("format", &self.format)
            .number("format_version", self.format_version)
            .opt("response_condition", self.response_condition.as_deref())
            .opt("placement", self.placement.as_deref())
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            token: record.string("token"),
            port: record.uint("port"),
            use_tls: record.boolean("use_tls"),
            format: record.string("format"),
            format_version: record.uint("format_version"),
            response_condition: record.opt_string("response_condition"),
            placement: record.opt_string("placement"),
        }
    }
}

impl Block for Logentries {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct LogentriesHandler;

#[async_trait]
impl AttributeHandler for LogentriesHandler {
    fn key(&self) -> &'static str {
        "logentries"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.logentries, &new.logentries)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for endpoint in difference(&old.logentries, &new.logentries) {
            delete_block(api, version, Collection::Logentries, &endpoint.name).await?;
        }
        for endpoint in difference(&new.logentries, &old.logentries) {
            create_block(
                api,
                version,
                Collection::Logentries,
                &endpoint.name,
                &endpoint.to_form(),
            )
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
        let records = list_blocks(api, version, Collection::Logentries).await?;
        config.logentries = records.iter().map(Logentries::from_record).collect();
        Ok(())
    }
}
