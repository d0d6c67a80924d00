//! Request settings: per-request overrides applied in `vcl_recv`.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::lenient::enum_name;
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RequestAction {
    Lookup,
    Pass,
}

/// X-Forwarded-For handling
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Xff {
    Clear,
    Leave,
    #[default]
    Append,
    AppendAll,
    Overwrite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct RequestSetting {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_condition: Option<String>,
    /// How old an object is allowed to be (seconds)
    #[serde(default = "default_max_stale_age")]
    pub max_stale_age: u32,
    #[serde(default)]
    pub force_miss: bool,
    #[serde(default)]
    pub force_ssl: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<RequestAction>,
    /// Disable collapsed forwarding
    #[serde(default)]
    pub bypass_busy_wait: bool,
    /// Comma separated request fields that make up the hash key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_keys: Option<String>,
    #[serde(default)]
    pub xff: Xff,
    #[serde(default)]
    pub timer_support: bool,
    #[serde(default)]
    pub geo_headers: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_host: Option<String>,
}

fn default_max_stale_age() -> u32 {
    60
}

impl RequestSetting {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .opt("request_condition", self.request_condition.as_deref())
            .number("max_stale_age", self.max_stale_age)
            .flag("force_miss", self.force_miss)
            .flag("force_ssl", self.force_ssl)
            .opt("action", self.action.map(|a| enum_name(&a)).as_deref())
            .flag("bypass_busy_wait", self.bypass_busy_wait)
            .opt("hash_keys", self.hash_keys.as_deref())
            .field("xff", enum_name(&self.xff))
            .flag("timer_support", self.timer_support)
            .flag("geo_headers", self.geo_headers)
            .opt("default_host", self.default_host.as_deref())
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            request_condition: record.opt_string("request_condition"),
            max_stale_age: record.uint("max_stale_age"),
            force_miss: record.boolean("force_miss"),
            force_ssl: record.boolean("force_ssl"),
            action: record.enumeration("action")?,
            bypass_busy_wait: record.boolean("bypass_busy_wait"),
            hash_keys: record.opt_string("hash_keys"),
            xff: record.enumeration("xff")?.unwrap_or_default(),
            timer_support: record.boolean("timer_support"),
            geo_headers: record.boolean("geo_headers"),
            default_host: record.opt_string("default_host"),
        })
    }
}

impl Block for RequestSetting {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct RequestSettingHandler;

#[async_trait]
impl AttributeHandler for RequestSettingHandler {
    fn key(&self) -> &'static str {
        "request_setting"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.request_setting, &new.request_setting)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for setting in difference(&old.request_setting, &new.request_setting) {
            delete_block(api, version, Collection::RequestSetting, &setting.name).await?;
        }
        for setting in difference(&new.request_setting, &old.request_setting) {
            create_block(
                api,
                version,
                Collection::RequestSetting,
                &setting.name,
                &setting.to_form(),
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
        let records = list_blocks(api, version, Collection::RequestSetting).await?;
        config.request_setting = records
            .iter()
            .map(RequestSetting::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}
