//! Azure Blob Storage log delivery.

use super::{combined_format, format_version_2, period, timestamp_format, MessageType};
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
pub struct BlobStorageLogging {
    pub name: String,
    pub account_name: String,
    pub container: String,
    /// Shared access signature with write permission on the container
    pub sas_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default = "period")]
    pub period: u32,
    #[serde(default = "timestamp_format")]
    pub timestamp_format: String,
    #[serde(default)]
    pub gzip_level: u32,
    /// PGP public key used to encrypt log files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<String>,
    #[serde(default = "combined_format")]
    pub format: String,
    #[serde(default = "format_version_2")]
    pub format_version: u32,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
}

impl BlobStorageLogging {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("account_name", &self.account_name)
            .field("container", &self.container)
            .secret("sas_token", &self.sas_token)
            .opt("path", self.path.as_deref())
            .number("period", self.period)
            .field("timestamp_format", &self.timestamp_format)
            .number("gzip_level", self.gzip_level)
            .opt("public_key", self.public_key.as_deref())
            .field("format", &self.format)
            .number("format_version", self.format_version)
            .field("message_type", enum_name(&self.message_type))
            .opt("placement", self.placement.as_deref())
            .opt("response_condition", self.response_condition.as_deref())
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            account_name: record.string("account_name"),
            container: record.string("container"),
            sas_token: record.string("sas_token"),
            path: record.opt_string("path"),
            period: record.uint("period"),
            timestamp_format: record.string("timestamp_format"),
            gzip_level: record.uint("gzip_level"),
            public_key: record.opt_string("public_key"),
            format: record.string("format"),
            format_version: record.uint("format_version"),
            message_type: record.enumeration("message_type")?.unwrap_or_default(),
            placement: record.opt_string("placement"),
            response_condition: record.opt_string("response_condition"),
        })
    }
}

impl Block for BlobStorageLogging {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct BlobStorageLoggingHandler;

#[async_trait]
impl AttributeHandler for BlobStorageLoggingHandler {
    fn key(&self) -> &'static str {
        "blobstoragelogging"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.blobstoragelogging, &new.blobstoragelogging)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for endpoint in difference(&old.blobstoragelogging, &new.blobstoragelogging) {
            delete_block(api, version, Collection::BlobStorageLogging, &endpoint.name).await?;
        }
        for endpoint in difference(&new.blobstoragelogging, &old.blobstoragelogging) {
            create_block(
                api,
                version,
                Collection::BlobStorageLogging,
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
        let records = list_blocks(api, version, Collection::BlobStorageLogging).await?;
        config.blobstoragelogging = records
            .iter()
            .map(BlobStorageLogging::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}
