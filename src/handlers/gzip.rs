//! Automatic gzip rules. Content types and extensions travel as
//! space-separated strings.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Gzip {
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub content_types: BTreeSet<String>,
    /// File extensions without the leading dot
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub extensions: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_condition: Option<String>,
}

fn joined(set: &BTreeSet<String>) -> Option<String> {
    if set.is_empty() {
        None
    } else {
        Some(set.iter().map(String::as_str).collect::<Vec<_>>().join(" "))
    }
}

impl Gzip {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .opt("content_types", joined(&self.content_types).as_deref())
            .opt("extensions", joined(&self.extensions).as_deref())
            .opt("cache_condition", self.cache_condition.as_deref())
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            content_types: record.words("content_types").into_iter().collect(),
            extensions: record.words("extensions").into_iter().collect(),
            cache_condition: record.opt_string("cache_condition"),
        }
    }
}

impl Block for Gzip {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct GzipHandler;

#[async_trait]
impl AttributeHandler for GzipHandler {
    fn key(&self) -> &'static str {
        "gzip"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.gzip, &new.gzip)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for gzip in difference(&old.gzip, &new.gzip) {
            delete_block(api, version, Collection::Gzip, &gzip.name).await?;
        }
        for gzip in difference(&new.gzip, &old.gzip) {
            create_block(api, version, Collection::Gzip, &gzip.name, &gzip.to_form()).await?;
        }
        Ok(())
    }

    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()> {
        let records = list_blocks(api, version, Collection::Gzip).await?;
        config.gzip = records.iter().map(Gzip::from_record).collect();
        Ok(())
    }
}
