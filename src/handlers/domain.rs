//! Domains served by the service.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Domain {
    /// The domain that this service will respond to
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Domain {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .opt("comment", self.comment.as_deref())
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            comment: record.opt_string("comment"),
        }
    }
}

impl Block for Domain {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct DomainHandler;

#[async_trait]
impl AttributeHandler for DomainHandler {
    fn key(&self) -> &'static str {
        "domain"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.domain, &new.domain)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for domain in difference(&old.domain, &new.domain) {
            delete_block(api, version, Collection::Domain, &domain.name).await?;
        }
        for domain in difference(&new.domain, &old.domain) {
            create_block(api, version, Collection::Domain, &domain.name, &domain.to_form()).await?;
        }
        Ok(())
    }

    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()> {
        let records = list_blocks(api, version, Collection::Domain).await?;
        config.domain = records.iter().map(Domain::from_record).collect();
        Ok(())
    }
}
