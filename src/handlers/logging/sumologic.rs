//! Sumo Logic log delivery.

use super::{common_format, format_version_1, MessageType};
use crate::api::lenient::enum_name;
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
pub struct Sumologic {
    pub name: String,
    /// Collector URL
    pub url: String,
    #[serde(default = "common_format")]
    pub format: String,
    #[serde(default = "format_version_1")]
    pub format_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
}

impl Sumologic {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("url", &self.url)
            .field("format", &self.format)
            .number("format_version", self.format_version)
            .opt("response_condition", self.response_condition.as_deref())
            .field("message_type", enum_name(&self.message_type))
            .opt("placement", self.placement.as_deref())
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            url: record.string("url"),
            format: record.string("format"),
            format_version: record.uint("format_version"),
            response_condition: record.opt_string("response_condition"),
            message_type: record.enumeration("message_type")?.unwrap_or_default(),
            placement: record.opt_string("placement"),
        })
    }
}

impl Block for Sumologic {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct SumologicHandler;

#[async_trait]
impl AttributeHandler for SumologicHandler {
    fn key(&self) -> &'static str {
        "sumologic"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.sumologic, &new.sumologic)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for endpoint in difference(&old.sumologic, &new.sumologic) {
            delete_block(api, version, Collection::Sumologic, &endpoint.name).await?;
        }
        for endpoint in difference(&new.sumologic, &old.sumologic) {
            create_block(
                api,
                version,
                Collection::Sumologic,
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
        let records = list_blocks(api, version, Collection::Sumologic).await?;
        config.sumologic = records
            .iter()
            .map(Sumologic::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}
