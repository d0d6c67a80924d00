//! VCL conditions referenced by name from headers, backends, logging
//! endpoints and cache settings.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::lenient::enum_name;
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConditionType {
    #[default]
    Request,
    /// Evaluated before the firewall runs; referenced by `waf.prefetch_condition`
    Prefetch,
    Response,
    Cache,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Condition {
    pub name: String,
    /// The statement used to determine if the condition is met
    pub statement: String,
    #[serde(rename = "type")]
    pub kind: ConditionType,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    10
}

impl Condition {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("type", enum_name(&self.kind))
            .field("statement", self.statement.trim())
            .number("priority", self.priority)
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            statement: record.string("statement"),
            kind: record.enumeration("type")?.unwrap_or_default(),
            priority: record.uint("priority"),
        })
    }
}

impl Block for Condition {
    fn name(&self) -> &str {
        &self.name
    }

    fn normalized(&self) -> Self {
        Self {
            statement: self.statement.trim().to_string(),
            ..self.clone()
        }
    }
}

#[derive(Debug)]
pub struct ConditionHandler;

#[async_trait]
impl AttributeHandler for ConditionHandler {
    fn key(&self) -> &'static str {
        "condition"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.condition, &new.condition)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for condition in difference(&old.condition, &new.condition) {
            delete_block(api, version, Collection::Condition, &condition.name).await?;
        }
        for condition in difference(&new.condition, &old.condition) {
            create_block(
                api,
                version,
                Collection::Condition,
                &condition.name,
                &condition.to_form(),
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
        let records = list_blocks(api, version, Collection::Condition).await?;
        config.condition = records
            .iter()
            .map(Condition::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}
