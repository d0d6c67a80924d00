//! Origin backends.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Backend {
    pub name: String,
    /// Hostname or IP address of the origin
    pub address: String,
    #[serde(default = "default_port")]
    pub port: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub override_host: Option<String>,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u32,
    #[serde(default = "default_max_conn")]
    pub max_conn: u32,
    #[serde(default)]
    pub error_threshold: u32,
    #[serde(default = "default_first_byte_timeout")]
    pub first_byte_timeout: u32,
    #[serde(default = "default_between_bytes_timeout")]
    pub between_bytes_timeout: u32,
    #[serde(default = "default_true")]
    pub auto_loadbalance: bool,
    #[serde(default = "default_weight")]
    pub weight: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_condition: Option<String>,
    /// Name of a healthcheck in the same service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthcheck: Option<String>,
    /// POP to use as a shield
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shield: Option<String>,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default = "default_true")]
    pub ssl_check_cert: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_ca_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_cert_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_sni_hostname: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_client_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_client_cert: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tls_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_tls_version: Option<String>,
    /// Comma separated OpenSSL cipher list
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssl_ciphers: Option<String>,
}

fn default_port() -> u32 {
    80
}

fn default_connect_timeout() -> u32 {
    1000
}

fn default_max_conn() -> u32 {
    200
}

fn default_first_byte_timeout() -> u32 {
    15000
}

fn default_between_bytes_timeout() -> u32 {
    10000
}

fn default_weight() -> u32 {
    100
}

fn default_true() -> bool {
    true
}

impl Backend {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("address", &self.address)
            .number("port", self.port)
            .opt("override_host", self.override_host.as_deref())
            .number("connect_timeout", self.connect_timeout)
            .number("max_conn", self.max_conn)
            .number("error_threshold", self.error_threshold)
            .number("first_byte_timeout", self.first_byte_timeout)
            .number("between_bytes_timeout", self.between_bytes_timeout)
            .flag("auto_loadbalance", self.auto_loadbalance)
            .number("weight", self.weight)
            .opt("request_condition", self.request_condition.as_deref())
            .opt("healthcheck", self.healthcheck.as_deref())
            .opt("shield", self.shield.as_deref())
            .flag("use_ssl", self.use_ssl)
            .flag("ssl_check_cert", self.ssl_check_cert)
            .opt("ssl_hostname", self.ssl_hostname.as_deref())
            .opt("ssl_ca_cert", self.ssl_ca_cert.as_deref())
            .opt("ssl_cert_hostname", self.ssl_cert_hostname.as_deref())
            .opt("ssl_sni_hostname", self.ssl_sni_hostname.as_deref())
            .opt_secret("ssl_client_key", self.ssl_client_key.as_deref())
            .opt("ssl_client_cert", self.ssl_client_cert.as_deref())
            .opt("max_tls_version", self.max_tls_version.as_deref())
            .opt("min_tls_version", self.min_tls_version.as_deref())
            .opt("ssl_ciphers", self.ssl_ciphers.as_deref())
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            address: record.string("address"),
            port: record.uint("port"),
            override_host: record.opt_string("override_host"),
            connect_timeout: record.uint("connect_timeout"),
            max_conn: record.uint("max_conn"),
            error_threshold: record.uint("error_threshold"),
            first_byte_timeout: record.uint("first_byte_timeout"),
            between_bytes_timeout: record.uint("between_bytes_timeout"),
            auto_loadbalance: record.boolean("auto_loadbalance"),
            weight: record.uint("weight"),
            request_condition: record.opt_string("request_condition"),
            healthcheck: record.opt_string("healthcheck"),
            shield: record.opt_string("shield"),
            use_ssl: record.boolean("use_ssl"),
            ssl_check_cert: record.boolean("ssl_check_cert"),
            ssl_hostname: record.opt_string("ssl_hostname"),
            ssl_ca_cert: record.opt_string("ssl_ca_cert"),
            ssl_cert_hostname: record.opt_string("ssl_cert_hostname"),
            ssl_sni_hostname: record.opt_string("ssl_sni_hostname"),
            ssl_client_key: record.opt_string("ssl_client_key"),
            ssl_client_cert: record.opt_string("ssl_client_cert"),
            max_tls_version: record.opt_string("max_tls_version"),
            min_tls_version: record.opt_string("min_tls_version"),
            ssl_ciphers: record.opt_string("ssl_ciphers"),
        }
    }
}

impl Block for Backend {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct BackendHandler;

#[async_trait]
impl AttributeHandler for BackendHandler {
    fn key(&self) -> &'static str {
        "backend"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.backend, &new.backend)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for backend in difference(&old.backend, &new.backend) {
            delete_block(api, version, Collection::Backend, &backend.name).await?;
        }
        for backend in difference(&new.backend, &old.backend) {
            create_block(api, version, Collection::Backend, &backend.name, &backend.to_form())
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
        let records = list_blocks(api, version, Collection::Backend).await?;
        config.backend = records.iter().map(Backend::from_record).collect();
        Ok(())
    }
}
