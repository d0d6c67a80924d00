//! Cache settings: TTL overrides applied in `vcl_fetch`.

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
pub enum CacheAction {
    Cache,
    Pass,
    Restart,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CacheSetting {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<CacheAction>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_condition: Option<String>,
    /// Maximum time to serve stale content (seconds)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stale_ttl: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}

impl CacheSetting {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .opt("action", self.action.map(|a| enum_name(&a)).as_deref())
            .opt("cache_condition", self.cache_condition.as_deref())
            .opt_number("stale_ttl", self.stale_ttl)
            .opt_number("ttl", self.ttl)
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            action: record.enumeration("action")?,
            cache_condition: record.opt_string("cache_condition"),
            stale_ttl: record.opt_uint("stale_ttl"),
            ttl: record.opt_uint("ttl"),
        })
    }
}

impl Block for CacheSetting {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct CacheSettingHandler;

#[async_trait]
impl AttributeHandler for CacheSettingHandler {
    fn key(&self) -> &'static str {
        "cache_setting"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.cache_setting, &new.cache_setting)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for setting in difference(&old.cache_setting, &new.cache_setting) {
            delete_block(api, version, Collection::CacheSetting, &setting.name).await?;
        }
        for setting in difference(&new.cache_setting, &old.cache_setting) {
            create_block(
                api,
                version,
                Collection::CacheSetting,
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
        let records = list_blocks(api, version, Collection::CacheSetting).await?;
        config.cache_setting = records
            .iter()
            .map(CacheSetting::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}
