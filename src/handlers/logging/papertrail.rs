//! Papertrail log delivery.

use super::common_format;
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
pub struct Papertrail {
    pub name: String,
    pub address: String,
    pub port: u32,
    #[serde(default = "common_format")]
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
}

impl Papertrail {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("address", &self.address)
            .number("port", self.port)
            .field("format", &self.format)
            .opt("response_condition", self.response_condition.as_deref())
            .opt("placement", self.placement.as_deref())
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            address: record.string("address"),
            port: record.uint("port"),
            format: record.string("format"),
            response_condition: record.opt_string("response_condition"),
            placement: record.opt_string("placement"),
        }
    }
}

impl Block for Papertrail {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct PapertrailHandler;

#[async_trait]
impl AttributeHandler for PapertrailHandler {
    fn key(&self) -> &'static str {
        "papertrail"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.papertrail, &new.papertrail)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for endpoint in difference(&old.papertrail, &new.papertrail) {
            delete_block(api, version, Collection::Papertrail, &endpoint.name).await?;
        }
        for endpoint in difference(&new.papertrail, &old.papertrail) {
            create_block(
                api,
                version,
                Collection::Papertrail,
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
        let records = list_blocks(api, version, Collection::Papertrail).await?;
        config.papertrail = records.iter().map(Papertrail::from_record).collect();
        Ok(())
    }
}
