//! Dry-run view of what an apply would change.

use crate::handlers::{AttributeHandler, BlockChanges};
use crate::model::{ServiceConfig, ServiceState};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanAction {
    /// No service is recorded; apply creates one
    Create,
    /// The recorded service differs from the configuration
    Update,
    NoOp,
}

/// Changes to one sub-resource list
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockPlan {
    pub key: &'static str,
    #[serde(flatten)]
    pub changes: BlockChanges,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    pub service: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    pub action: PlanAction,
    /// Service-level attributes that change (`name`, `comment`, `version_comment`)
    pub attributes: Vec<&'static str>,
    pub blocks: Vec<BlockPlan>,
    /// Whether apply would clone (or, for a new service, fill) a version
    pub new_version: bool,
    pub activate: bool,
    /// Inactive draft that already carries this configuration
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staged_version: Option<u32>,
}

impl Plan {
    pub(crate) fn compute(
        state: &ServiceState,
        config: &ServiceConfig,
        handlers: &[Box<dyn AttributeHandler>],
    ) -> Self {
        let initial = !state.exists_remotely();
        if let Some(staged) = state.staged_for(config).filter(|_| !initial) {
            return Self {
                service: config.name.clone(),
                service_id: state.id.clone(),
                action: PlanAction::NoOp,
                attributes: Vec::new(),
                blocks: Vec::new(),
                new_version: false,
                activate: config.activate,
                staged_version: Some(staged.number),
            };
        }

        let prior = if initial {
            ServiceConfig::seed(config)
        } else {
            state.config.clone()
        };

        let mut attributes = Vec::new();
        if prior.name != config.name {
            attributes.push("name");
        }
        if prior.comment != config.comment {
            attributes.push("comment");
        }
        if prior.version_comment != config.version_comment {
            attributes.push("version_comment");
        }

        let blocks: Vec<BlockPlan> = handlers
            .iter()
            .filter(|h| h.must_process(&prior, config, initial))
            .map(|h| BlockPlan {
                key: h.key(),
                changes: h.changes(&prior, config),
            })
            .collect();

        // A service whose first version never went live
        let first_activation = !initial && config.activate && state.active_version == 0;
        let new_version = !blocks.is_empty() || first_activation;
        let action = if initial {
            PlanAction::Create
        } else if new_version || !attributes.is_empty() {
            PlanAction::Update
        } else {
            PlanAction::NoOp
        };

        Self {
            service: config.name.clone(),
            service_id: state.id.clone(),
            action,
            attributes,
            blocks,
            new_version,
            activate: config.activate,
            staged_version: None,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.action == PlanAction::NoOp
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let id = self.service_id.as_deref().unwrap_or("new");
        match self.action {
            PlanAction::NoOp => {
                return match self.staged_version {
                    Some(number) => writeln!(
                        f,
                        "Service {} ({}) is up to date; version {} is staged and awaiting activation",
                        self.service, id, number
                    ),
                    None => writeln!(f, "Service {} ({}) is up to date", self.service, id),
                };
            }
            PlanAction::Create => writeln!(f, "Service {} will be created", self.service)?,
            PlanAction::Update => writeln!(f, "Service {} ({}) will be updated", self.service, id)?,
        }
        for attribute in &self.attributes {
            writeln!(f, "  ~ {attribute}")?;
        }
        for block in &self.blocks {
            if block.changes.is_empty() {
                writeln!(f, "  ~ {}", block.key)?;
                continue;
            }
            for name in &block.changes.removed {
                writeln!(f, "  - {}.{}", block.key, name)?;
            }
            for name in &block.changes.added {
                writeln!(f, "  + {}.{}", block.key, name)?;
            }
        }
        if self.new_version {
            if self.blocks.is_empty() {
                writeln!(f, "The inactive version will be validated and activated")?;
            } else if self.activate {
                writeln!(f, "A new version will be validated and activated")?;
            } else {
                writeln!(f, "A new version will be validated but left inactive")?;
            }
        }
        Ok(())
    }
}
