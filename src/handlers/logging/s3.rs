//! Amazon S3 log delivery.
//!
//! Access and secret keys default to `FASTLY_S3_ACCESS_KEY` and
//! `FASTLY_S3_SECRET_KEY`; creation is refused while either is empty.

use super::{common_format, format_version_1, from_env, period, timestamp_format, MessageType};
use crate::api::lenient::enum_name;
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::handlers::{
    create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges,
};
use crate::model::ServiceConfig;
use anyhow::{bail, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Redundancy {
    Standard,
    ReducedRedundancy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct S3Logging {
    pub name: String,
    pub bucket_name: String,
    #[serde(default = "access_key_from_env")]
    pub s3_access_key: String,
    #[serde(default = "secret_key_from_env")]
    pub s3_secret_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default = "default_domain")]
    pub domain: String,
    /// Seconds between log file rotations
    #[serde(default = "period")]
    pub period: u32,
    #[serde(default)]
    pub gzip_level: u32,
    #[serde(default = "common_format")]
    pub format: String,
    #[serde(default = "format_version_1")]
    pub format_version: u32,
    #[serde(default = "timestamp_format")]
    pub timestamp_format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redundancy: Option<Redundancy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_side_encryption: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_side_encryption_kms_key_id: Option<String>,
}

fn access_key_from_env() -> String {
    from_env("FASTLY_S3_ACCESS_KEY")
}

fn secret_key_from_env() -> String {
    from_env("FASTLY_S3_SECRET_KEY")
}

fn default_domain() -> String {
    "s3.amazonaws.com".to_string()
}

impl S3Logging {
    /// # Errors
    /// Returns an error when either credential is empty
    pub fn to_form(&self) -> Result<Form> {
        if self.s3_access_key.is_empty() || self.s3_secret_key.is_empty() {
            bail!(
                "No S3 Access Key or Secret Key configured for S3 logging {}",
                self.name
            );
        }
        Ok(Form::new()
            .field("name", &self.name)
            .field("bucket_name", &self.bucket_name)
            .secret("access_key", &self.s3_access_key)
            .secret("secret_key", &self.s3_secret_key)
            .opt("path", self.path.as_deref())
            .field("domain", &self.domain)
            .number("period", self.period)
            .number("gzip_level", self.gzip_level)
            .field("format", &self.format)
            .number("format_version", self.format_version)
            .field("timestamp_format", &self.timestamp_format)
            .opt("redundancy", self.redundancy.map(|r| enum_name(&r)).as_deref())
            .opt("response_condition", self.response_condition.as_deref())
            .field("message_type", enum_name(&self.message_type))
            .opt("placement", self.placement.as_deref())
            .opt("server_side_encryption", self.server_side_encryption.as_deref())
            .opt_secret(
                "server_side_encryption_kms_key_id",
                self.server_side_encryption_kms_key_id.as_deref(),
            ))
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            bucket_name: record.string("bucket_name"),
            s3_access_key: record.string("access_key"),
            s3_secret_key: record.string("secret_key"),
            path: record.opt_string("path"),
            domain: record.string("domain"),
            period: record.uint("period"),
            gzip_level: record.uint("gzip_level"),
            format: record.string("format"),
            format_version: record.uint("format_version"),
            timestamp_format: record.string("timestamp_format"),
            redundancy: record.enumeration("redundancy")?,
            response_condition: record.opt_string("response_condition"),
            message_type: record.enumeration("message_type")?.unwrap_or_default(),
            placement: record.opt_string("placement"),
            server_side_encryption: record.opt_string("server_side_encryption"),
            server_side_encryption_kms_key_id: record
                .opt_string("server_side_encryption_kms_key_id"),
        })
    }
}

impl Block for S3Logging {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct S3LoggingHandler;

#[async_trait]
impl AttributeHandler for S3LoggingHandler {
    fn key(&self) -> &'static str {
        "s3logging"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.s3logging, &new.s3logging)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for endpoint in difference(&old.s3logging, &new.s3logging) {
            delete_block(api, version, Collection::S3Logging, &endpoint.name).await?;
        }
        for endpoint in difference(&new.s3logging, &old.s3logging) {
            let form = endpoint.to_form()?;
            create_block(api, version, Collection::S3Logging, &endpoint.name, &form).await?;
        }
        Ok(())
    }

    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()> {
        let records = list_blocks(api, version, Collection::S3Logging).await?;
        config.s3logging = records
            .iter()
            .map(S3Logging::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}
