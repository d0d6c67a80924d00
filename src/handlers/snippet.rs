//! VCL snippets, regular and dynamic.
//!
//! Both kinds live in the same `snippet` collection and are told apart by
//! the `dynamic` flag. A regular snippet carries its content in the version;
//! a dynamic snippet only reserves its slot and its content is edited
//! outside the version lifecycle, so the content never takes part here.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::lenient::enum_name;
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// VCL subroutine a snippet is rendered into
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SnippetType {
    Init,
    #[default]
    Recv,
    Hash,
    Hit,
    Miss,
    Pass,
    Fetch,
    Error,
    Deliver,
    Log,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Snippet {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SnippetType,
    /// Lower priorities execute first
    #[serde(default = "default_priority")]
    pub priority: u32,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DynamicSnippet {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: SnippetType,
    #[serde(default = "default_priority")]
    pub priority: u32,
    /// Assigned by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet_id: Option<String>,
}

fn default_priority() -> u32 {
    100
}

impl Snippet {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("type", enum_name(&self.kind))
            .number("priority", self.priority)
            .field("content", &self.content)
            .flag("dynamic", false)
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            kind: record.enumeration("type")?.unwrap_or_default(),
            priority: record.uint("priority"),
            content: record.string("content"),
        })
    }
}

impl Block for Snippet {
    fn name(&self) -> &str {
        &self.name
    }
}

impl DynamicSnippet {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("type", enum_name(&self.kind))
            .number("priority", self.priority)
            .flag("dynamic", true)
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            kind: record.enumeration("type")?.unwrap_or_default(),
            priority: record.uint("priority"),
            snippet_id: record.opt_string("id"),
        })
    }
}

impl Block for DynamicSnippet {
    fn name(&self) -> &str {
        &self.name
    }

    fn normalized(&self) -> Self {
        Self {
            snippet_id: None,
            ..self.clone()
        }
    }
}

fn is_dynamic(record: &Record) -> bool {
    record.boolean("dynamic")
}

#[derive(Debug)]
pub struct SnippetHandler;

#[async_trait]
impl AttributeHandler for SnippetHandler {
    fn key(&self) -> &'static str {
        "snippet"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.snippet, &new.snippet)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for snippet in difference(&old.snippet, &new.snippet) {
            delete_block(api, version, Collection::Snippet, &snippet.name).await?;
        }
        for snippet in difference(&new.snippet, &old.snippet) {
            create_block(api, version, Collection::Snippet, &snippet.name, &snippet.to_form())
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
        let records = list_blocks(api, version, Collection::Snippet).await?;
        config.snippet = records
            .iter()
            .filter(|r| !is_dynamic(r))
            .map(Snippet::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}

#[derive(Debug)]
pub struct DynamicSnippetHandler;

#[async_trait]
impl AttributeHandler for DynamicSnippetHandler {
    fn key(&self) -> &'static str {
        "dynamicsnippet"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.dynamicsnippet, &new.dynamicsnippet)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for snippet in difference(&old.dynamicsnippet, &new.dynamicsnippet) {
            delete_block(api, version, Collection::Snippet, &snippet.name).await?;
        }
        for snippet in difference(&new.dynamicsnippet, &old.dynamicsnippet) {
            create_block(api, version, Collection::Snippet, &snippet.name, &snippet.to_form())
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
        let records = list_blocks(api, version, Collection::Snippet).await?;
        config.dynamicsnippet = records
            .iter()
            .filter(|r| is_dynamic(r))
            .map(DynamicSnippet::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}
