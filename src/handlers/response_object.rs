//! Synthetic responses served without contacting an origin.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ResponseObject {
    pub name: String,
    /// HTTP status code
    #[serde(default = "default_status")]
    pub status: u32,
    /// HTTP reason phrase
    #[serde(default = "default_response")]
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_condition: Option<String>,
}

fn default_status() -> u32 {
    200
}

fn default_response() -> String {
    "OK".to_string()
}

impl ResponseObject {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .number("status", self.status)
            .field("response", &self.response)
            .opt("content", self.content.as_deref())
            .opt("content_type", self.content_type.as_deref())
            .opt("request_condition", self.request_condition.as_deref())
            .opt("cache_condition", self.cache_condition.as_deref())
    }

    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            status: record.uint("status"),
            response: record.string("response"),
            content: record.opt_string("content"),
            content_type: record.opt_string("content_type"),
            request_condition: record.opt_string("request_condition"),
            cache_condition: record.opt_string("cache_condition"),
        }
    }
}

impl Block for ResponseObject {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct ResponseObjectHandler;

#[async_trait]
impl AttributeHandler for ResponseObjectHandler {
    fn key(&self) -> &'static str {
        "response_object"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.response_object, &new.response_object)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for object in difference(&old.response_object, &new.response_object) {
            delete_block(api, version, Collection::ResponseObject, &object.name).await?;
        }
        for object in difference(&new.response_object, &old.response_object) {
            create_block(
                api,
                version,
                Collection::ResponseObject,
                &object.name,
                &object.to_form(),
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
        let records = list_blocks(api, version, Collection::ResponseObject).await?;
        config.response_object = records.iter().map(ResponseObject::from_record).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let object: ResponseObject = serde_yaml::from_str("name: ok\n").expect("yaml");
        assert_eq!(object.status, 200);
        assert_eq!(object.response, "OK");
        let form = object.to_form();
        assert_eq!(form.get("status"), Some("200"));
        assert_eq!(form.get("content"), None);
    }
}
