//! Header manipulation rules.
//!
//! `source`, `regex` and `substitution` are filled in by the API when left
//! out (the API derives them from the action). A desired header that leaves
//! them unset inherits the recorded values of the header with the same name,
//! so the computed values never show up as a difference.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::lenient::enum_name;
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use anyhow::Result;
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HeaderAction {
    #[default]
    Set,
    Append,
    Delete,
    Regex,
    RegexRepeat,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum HeaderType {
    #[default]
    Request,
    Fetch,
    Cache,
    Response,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Header {
    pub name: String,
    pub action: HeaderAction,
    #[serde(rename = "type")]
    pub kind: HeaderType,
    /// Header this affects
    pub destination: String,
    /// Don't add the header if it is already set (`set` only)
    #[serde(default)]
    pub ignore_if_set: bool,
    #[serde(default = "default_priority")]
    pub priority: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub substitution: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_condition: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_condition: Option<String>,
}

fn default_priority() -> u32 {
    100
}

impl Header {
    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .field("action", enum_name(&self.action))
            .field("type", enum_name(&self.kind))
            .field("dst", &self.destination)
            .flag("ignore_if_set", self.ignore_if_set)
            .number("priority", self.priority)
            .opt("src", self.source.as_deref())
            .opt("regex", self.regex.as_deref())
            .opt("substitution", self.substitution.as_deref())
            .opt("request_condition", self.request_condition.as_deref())
            .opt("cache_condition", self.cache_condition.as_deref())
            .opt("response_condition", self.response_condition.as_deref())
    }

    /// # Errors
    /// Returns an error if an enumerated field holds an unknown value
    pub fn from_record(record: &Record) -> Result<Self> {
        Ok(Self {
            name: record.string("name"),
            action: record.enumeration("action")?.unwrap_or_default(),
            kind: record.enumeration("type")?.unwrap_or_default(),
            destination: record.string("dst"),
            ignore_if_set: record.boolean("ignore_if_set"),
            priority: record.uint("priority"),
            source: record.opt_string("src"),
            regex: record.opt_string("regex"),
            substitution: record.opt_string("substitution"),
            request_condition: record.opt_string("request_condition"),
            cache_condition: record.opt_string("cache_condition"),
            response_condition: record.opt_string("response_condition"),
        })
    }

    fn inherit_computed(&mut self, recorded: &Self) {
        if self.source.is_none() {
            self.source.clone_from(&recorded.source);
        }
        if self.regex.is_none() {
            self.regex.clone_from(&recorded.regex);
        }
        if self.substitution.is_none() {
            self.substitution.clone_from(&recorded.substitution);
        }
    }
}

impl Block for Header {
    fn name(&self) -> &str {
        &self.name
    }
}

/// Desired headers with unset computed fields taken from `recorded`
#[must_use]
pub fn with_inherited(recorded: &[Header], desired: &[Header]) -> Vec<Header> {
    desired
        .iter()
        .map(|header| {
            let mut header = header.clone();
            if let Some(previous) = recorded.iter().find(|h| h.name == header.name) {
                header.inherit_computed(previous);
            }
            header
        })
        .collect()
}

#[derive(Debug)]
pub struct HeaderHandler;

#[async_trait]
impl AttributeHandler for HeaderHandler {
    fn key(&self) -> &'static str {
        "header"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.header, &with_inherited(&old.header, &new.header))
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        let desired = with_inherited(&old.header, &new.header);
        for header in difference(&old.header, &desired) {
            delete_block(api, version, Collection::Header, &header.name).await?;
        }
        for header in difference(&desired, &old.header) {
            create_block(api, version, Collection::Header, &header.name, &header.to_form())
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
        let records = list_blocks(api, version, Collection::Header).await?;
        config.header = records
            .iter()
            .map(Header::from_record)
            .collect::<Result<_>>()?;
        Ok(())
    }
}
