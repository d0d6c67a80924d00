//! Custom VCL files. When a service carries custom VCL, exactly one file is
//! the main VCL; after uploading it is marked main with its own call.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Vcl {
    pub name: String,
    pub content: String,
    #[serde(default)]
    pub main: bool,
}

impl Vcl {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("content", &self.content)
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            content: record.string("content"),
            main: record.boolean("main"),
        }
    }
}

impl Block for Vcl {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Exactly one main VCL, unless there is no custom VCL at all
///
/// # Errors
/// Returns a message describing the violation
pub fn validate_vcls(vcls: &[Vcl]) -> Result<(), String> {
    if vcls.is_empty() {
        return Ok(());
    }
    match vcls.iter().filter(|v| v.main).count() {
        0 => Err("if you include VCL configurations, one of them should have main = true".to_string()),
        1 => Ok(()),
        n => Err(format!("you cannot have more than one VCL with main = true, found {n}")),
    }
}

#[derive(Debug)]
pub struct VclHandler;

#[async_trait]
impl AttributeHandler for VclHandler {
    fn key(&self) -> &'static str {
        "vcl"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.vcl, &new.vcl)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        validate_vcls(&new.vcl).map_err(anyhow::Error::msg)?;

        for vcl in difference(&old.vcl, &new.vcl) {
            delete_block(api, version, Collection::Vcl, &vcl.name).await?;
        }
        for vcl in difference(&new.vcl, &old.vcl) {
            create_block(api, version, Collection::Vcl, &vcl.name, &vcl.to_form()).await?;
            if vcl.main {
                debug!("Fastly VCL activation: {} on {}", vcl.name, version);
                api.set_main_vcl(version, &vcl.name)
                    .await
                    .with_context(|| format!("Failed to set main VCL {} on {version}", vcl.name))?;
            }
        }
        Ok(())
    }

    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()> {
        let records = list_blocks(api, version, Collection::Vcl).await?;
        config.vcl = records.iter().map(Vcl::from_record).collect();
        Ok(())
    }
}
