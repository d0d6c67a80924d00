//! Heroku log drain delivery.

use super::{combined_format, format_version_2};
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
pub struct HerokuLogging {
    pub name: String,
    pub token: String,
    /// Drain URL
    pub url: String,
    #[serde(default = "combined_format")]
    pub format: String,
    #[serde(default = "format_version_2")]
    pub format_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
}

impl HerokuLogging {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .secret("token", &self.token)
            .field("url", &self.url)
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
            url: record.string("url"),
            format: record.string("format"),
            format_version: record.uint("format_version"),
            response_condition: record.opt_string("response_condition"),
            placement: record.opt_string("placement"),
        }
    }
}

impl Block for HerokuLogging {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct HerokuLoggingHandler;

#[async_trait]
impl AttributeHandler for HerokuLoggingHandler {
    fn key(&self) -> &'static str {
        "logging_heroku"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.logging_heroku, &new.logging_heroku)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for endpoint in difference(&old.logging_heroku, &new.logging_heroku) {
            delete_block(api, version, Collection::Heroku, &endpoint.name).await?;
        }
        for endpoint in difference(&new.logging_heroku, &old.logging_heroku) {
            create_block(api, version, Collection::Heroku, &endpoint.name, &endpoint.to_form())
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
        let records = list_blocks(api, version, Collection::Heroku).await?;
        config.logging_heroku = records.iter().map(HerokuLogging::from_record).collect();
        Ok(())
    }
}
