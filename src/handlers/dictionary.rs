//! Edge dictionaries. As with ACLs, only the container is versioned.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Dictionary {
    pub name: String,
    /// Hide the items from the API and the web console
    #[serde(default)]
    pub write_only: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dictionary_id: Option<String>,
}

impl Dictionary {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .flag("write_only", self.write_only)
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            write_only: record.boolean("write_only"),
            dictionary_id: record.opt_string("id"),
        }
    }
}

impl Block for Dictionary {
    fn name(&self) -> &str {
        &self.name
    }

    fn normalized(&self) -> Self {
        Self {
            dictionary_id: None,
            ..self.clone()
        }
    }
}

#[derive(Debug)]
pub struct DictionaryHandler;

#[async_trait]
impl AttributeHandler for DictionaryHandler {
    fn key(&self) -> &'static str {
        "dictionary"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.dictionary, &new.dictionary)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for dictionary in difference(&old.dictionary, &new.dictionary) {
            delete_block(api, version, Collection::Dictionary, &dictionary.name).await?;
        }
        for dictionary in difference(&new.dictionary, &old.dictionary) {
            create_block(
                api,
                version,
                Collection::Dictionary,
                &dictionary.name,
                &dictionary.to_form(),
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
        let records = list_blocks(api, version, Collection::Dictionary).await?;
        config.dictionary = records.iter().map(Dictionary::from_record).collect();
        Ok(())
    }
}
