//! Access control lists. Only the container is versioned; entries are
//! managed separately.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Acl {
    pub name: String,
    /// Assigned by the API
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acl_id: Option<String>,
}

impl Acl {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new().field("name", &self.name)
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            acl_id: record.opt_string("id"),
        }
    }
}

impl Block for Acl {
    fn name(&self) -> &str {
        &self.name
    }

    fn normalized(&self) -> Self {
        Self {
            acl_id: None,
            ..self.clone()
        }
    }
}

#[derive(Debug)]
pub struct AclHandler;

#[async_trait]
impl AttributeHandler for AclHandler {
    fn key(&self) -> &'static str {
        "acl"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.acl, &new.acl)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for acl in difference(&old.acl, &new.acl) {
            delete_block(api, version, Collection::Acl, &acl.name).await?;
        }
        for acl in difference(&new.acl, &old.acl) {
            create_block(api, version, Collection::Acl, &acl.name, &acl.to_form()).await?;
        }
        Ok(())
    }

    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()> {
        let records = list_blocks(api, version, Collection::Acl).await?;
        config.acl = records.iter().map(Acl::from_record).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_is_recorded_but_not_compared() {
        let record = Record::default()
            .with("id", "6pN6i7Yxm1e4U3EH0AoNbd")
            .with("name", "blocklist");
        let recorded = Acl::from_record(&record);
        assert_eq!(recorded.acl_id.as_deref(), Some("6pN6i7Yxm1e4U3EH0AoNbd"));

        let desired: Acl = serde_yaml::from_str("name: blocklist\n").expect("yaml");
        assert!(BlockChanges::between(&[recorded], &[desired]).is_empty());
    }
}
