//! Google Cloud Storage log delivery. The service account email is sent as
//! the API's `user` field.

use super::{common_format, from_env, period, timestamp_format, MessageType};
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
pub struct GcsLogging {
    pub name: String,
    /// Service account email; defaults to `FASTLY_GCS_EMAIL`
    #[serde(default = "email_from_env")]
    pub email: String,
    pub bucket_name: String,
    /// Service account private key; defaults to `FASTLY_GCS_SECRET_KEY`
    #[serde(default = "secret_key_from_env")]
    pub secret_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default)]
    pub gzip_level: u32,
    #[serde(default = "period")]
    pub period: u32,
    #[serde(default = "common_format")]
    pub format: String,
    #[serde(default = "timestamp_format")]
    pub timestamp_format: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
}

fn email_from_env() -> String {
    from_env("FASTLY_GCS_EMAIL")
}

fn secret_key_from_env() -> String {
    from_env("FASTLY_GCS_SECRET_KEY")
}

impl GcsLogging {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("user", &self.email)
            .field("bucket_name", &self.bucket_name)
            .secret("secret_key", &self.secret_key)
            .opt("path", self.path.as_deref())
            .number("gzip_level", self.gzip_level)
            .number("period", self.period)
            .field("format", &self.format)
            .field("timestamp_format", &self.timestamp_format)
            .field("message_type", enum_name(&self.message_type))
            .opt("response_condition", self.response_condition.as_deref())
            .opt("placement", self.placement.as_deref())
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            email: record.string("user"),
            bucket_name: record.string("bucket_name"),
            secret_key: record.string("secret_key"),
            path: record.opt_string("path"),
            gzip_level: record.uint("gzip_level"),
            period: record.uint("period"),
            format: record.string("format"),
            timestamp_format: record.string("timestamp_format"),
            message_type: record.enumeration("message_type")?.unwrap_or_default(),
            response_condition: record.opt_string("response_condition"),
            placement: record.opt_string("placement"),
        })
    }
}

impl Block for GcsLogging {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct GcsLoggingHandler;

#[async_trait]
impl AttributeHandler for GcsLoggingHandler {
    fn key(&self) -> &'static str {
        "gcslogging"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.gcslogging, &new.gcslogging)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for endpoint in difference(&old.gcslogging, &new.gcslogging) {
            delete_block(api, version, Collection::GcsLogging, &endpoint.name).await?;
        }
        for endpoint in difference(&new.gcslogging, &old.gcslogging) {
            create_block(
                api,
                version,
                Collection::GcsLogging,
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
        let records = list_blocks(api, version, Collection::GcsLogging).await?;
        config.gcslogging = records
            .iter()
            .map(GcsLogging::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}
