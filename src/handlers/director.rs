//! Directors group backends behind a load balancing policy.
//!
//! The backend membership is not part of the director object itself: each
//! link is its own `director/{d}/backend/{b}` resource. Create links every
//! listed backend after creating the director, and read looks up each
//! (director, backend) pair and keeps the ones that exist. A lookup that
//! fails with anything but 404 fails the read.

use super::{create_block, delete_block, difference, list_blocks, AttributeHandler, Block, BlockChanges};
use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::{ConfigError, ServiceConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::future::join_all;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Director {
    pub name: String,
    /// Names of the backends this director balances across
    #[serde(default)]
    pub backends: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shield: Option<String>,
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    /// Percentage of capacity that must be healthy
    #[serde(default = "default_quorum")]
    pub quorum: u32,
    /// 1 random, 2 round robin, 3 hash, 4 client
    #[serde(rename = "type", default = "default_type")]
    pub kind: u32,
    #[serde(default = "default_retries")]
    pub retries: u32,
}

fn default_capacity() -> u32 {
    100
}

fn default_quorum() -> u32 {
    75
}

fn default_type() -> u32 {
    1
}

fn default_retries() -> u32 {
    5
}

impl Director {
    /// # Errors
    /// Returns an error when the director type is outside 1..=4
    pub fn validate(&self) -> Result<(), ConfigError> {
        if (1..=4).contains(&self.kind) {
            Ok(())
        } else {
            Err(ConfigError::InvalidField {
                block: "director",
                name: self.name.clone(),
                message: format!("type must be between 1 and 4, got {}", self.kind),
            })
        }
    }

    #[must_use]
    pub fn to_form(&self) -> Form {
        Form::new()
            .field("name", &self.name)
            .opt("comment", self.comment.as_deref())
            .opt("shield", self.shield.as_deref())
            .number("capacity", self.capacity)
            .number("quorum", self.quorum)
            .number("type", self.kind)
            .number("retries", self.retries)
    }

    /// Director without its backend links; read fills those in separately
    #[must_use]
    pub fn from_record(record: &Record) -> Self {
        Self {
            name: record.string("name"),
            backends: BTreeSet::new(),
            comment: record.opt_string("comment"),
            shield: record.opt_string("shield"),
            capacity: record.uint("capacity"),
            quorum: record.uint("quorum"),
            kind: record.uint("type"),
            retries: record.uint("retries"),
        }
    }
}

impl Block for Director {
    fn name(&self) -> &str {
        &self.name
    }
}

#[derive(Debug)]
pub struct DirectorHandler;

#[async_trait]
impl AttributeHandler for DirectorHandler {
    fn key(&self) -> &'static str {
        "director"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        BlockChanges::between(&old.director, &new.director)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        for director in difference(&old.director, &new.director) {
            delete_block(api, version, Collection::Director, &director.name).await?;
        }
        for director in difference(&new.director, &old.director) {
            create_block(api, version, Collection::Director, &director.name, &director.to_form())
                .await?;
            for backend in &director.backends {
                debug!("Fastly director backend link: {} -> {}", director.name, backend);
                api.create_director_backend(version, &director.name, backend)
                    .await
                    .with_context(|| {
                        format!(
                            "Failed to link backend {backend} to director {} on {version}",
                            director.name
                        )
                    })?;
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
        let records = list_blocks(api, version, Collection::Director).await?;
        let backend_names: Vec<&str> = config.backend.iter().map(|b| b.name.as_str()).collect();

        let mut directors = Vec::with_capacity(records.len());
        for record in &records {
            let mut director = Director::from_record(record);
            let name = director.name.as_str();
            let lookups = backend_names.iter().map(|backend| async move {
                match api.get_director_backend(version, name, backend).await {
                    Ok(()) => Ok(Some((*backend).to_string())),
                    Err(e) if e.is_not_found() => Ok(None),
                    Err(e) => Err(e).with_context(|| {
                        format!("Error looking up backend {backend} of director {name} on {version}")
                    }),
                }
            });
            director.backends = join_all(lookups)
                .await
                .into_iter()
                .collect::<Result<Vec<_>>>()?
                .into_iter()
                .flatten()
                .collect();
            directors.push(director);
        }
        config.director = directors;
        Ok(())
    }
}
