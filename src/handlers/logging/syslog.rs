//! Remote syslog delivery, optionally over TLS.

use super::{combined_format, format_version_1, MessageType};
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
pub struct Syslog {
    pub name: String,
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u32,
    #[serde(default = "combined_format")]
    pub format: String,
    #[serde(default = "format_version_1")]
    pub format_version: u32,
    #[serde(default)]
    pub message_type: MessageType,
    /// Prefixed to every log line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(default)]
    pub use_tls: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_ca_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tls_client_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub placement: Option<String>,
}

fn default_port() -> u32 {
    514
}

impl Syslog {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("address", &self.address)
            .number("port", self.port)
            .field("format", &self.format)
            .number("format_version", self.format_version)
            .field("message_type", enum_name(&self.message_type))
            .opt_secret("token", self.token.as_deref())
            .flag("use_tls", self.use_tls)
            .opt("tls_hostname", self.tls_hostname.as_deref())
            .opt("tls_ca_cert", self.tls_ca_cert.as_deref())
            .opt("tls_client_cert", self.tls_client_cert.as_deref())
            .opt_secret("tls_client_key", self.tls_client_key.as_deref())
            .opt("response_condition", self.response_condition.as_deref())
            .opt("placement", self.placement.as_deref())
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            address: record.string("address"),
            port: record.uint("port"),
            format: record.string("format"),
            format_version: record.uint("format_version"),
            message_type: record.enumeration("message_type")?.unwrap_or_default(),
            token: record.opt_string("token"),
            use_tls: record.boolean("use_tls"),
            tls_hostname: record.opt_string("tls_hostname"),
            tls_ca_cert: record.opt_string("tls_ca_cert"),
            tls_client_cert: record.opt_string("tls_client_cert"),
            tls_client_key: record.opt_string("tls_client_key"),
            response_condition: record.opt_string("response_condition"),
            placement: record.opt_string("placement"),
        })
    }
}

impl Block for Syslog {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct SyslogHandler;

#[async_trait]
impl AttributeHandler for SyslogHandler {
    fn key(&self) -> &'static str {
        "syslog"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.syslog, &new.syslog)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for endpoint in difference(&old.syslog, &new.syslog) {
            delete_block(api, version, Collection::Syslog, &endpoint.name).await?;
        }
        for endpoint in difference(&new.syslog, &old.syslog) {
            create_block(api, version, Collection::Syslog, &endpoint.name, &endpoint.to_form())
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
        let records = list_blocks(api, version, Collection::Syslog).await?;
        config.syslog = records
            .iter()
            .map(Syslog::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}
