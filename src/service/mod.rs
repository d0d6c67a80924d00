//! # Service Reconciler
//!
//! Drives one Fastly service through its lifecycle: create, update, read
//! (refresh), delete and import.
//!
//! ## Version protocol
//!
//! Active versions are immutable, so every configuration change goes through
//! a draft:
//!
//! 1. Clone the active version (or use version 1 of a service that has never
//!    been activated)
//! 2. Wait for the clone to settle, then stamp it with `version_comment`
//! 3. Run every handler whose block list changed, in registration order
//! 4. Validate the draft
//! 5. Activate it, unless `activate` is off
//!
//! A change that only touches `version_comment` is written onto the active
//! version directly without cloning.
//!
//! A draft left inactive is recorded in the state together with the
//! configuration it was built from. Later passes leave it alone until that
//! configuration changes.

mod plan;

pub use plan::{BlockPlan, Plan, PlanAction};

use crate::api::{ServiceApi, ServiceSummary, ServiceVersion};
use crate::constants::CONSOLE_VERSION_URL;
use crate::handlers::{handlers_for, AttributeHandler};
use crate::model::{ServiceConfig, ServiceState, StagedVersion};
use crate::observability::metrics;
use anyhow::{anyhow, Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, info_span, warn, Instrument};

pub struct ServiceReconciler {
    api: Arc<dyn ServiceApi>,
    settle_delay: Duration,
}

impl std::fmt::Debug for ServiceReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceReconciler")
            .field("settle_delay", &self.settle_delay)
            .finish_non_exhaustive()
    }
}

impl ServiceReconciler {
    /// `settle_delay` is the pause between cloning a version and writing to it
    #[must_use]
    pub fn new(api: Arc<dyn ServiceApi>, settle_delay: Duration) -> Self {
        Self { api, settle_delay }
    }

    /// Refresh `state`, then bring the remote service in line with `config`.
    /// A service that is not recorded, or no longer exists, is created.
    ///
    /// # Errors
    /// Returns an error if any API call fails or the new version is invalid
    pub async fn apply(&self, state: &mut ServiceState, config: &ServiceConfig) -> Result<()> {
        let plan = self.plan(state, config).await?;
        self.execute(state, config, &plan).await
    }

    /// Carry out a plan computed by [`Self::plan`] against the same `state`
    ///
    /// # Errors
    /// Returns an error if any API call fails or the new version is invalid
    pub async fn execute(
        &self,
        state: &mut ServiceState,
        config: &ServiceConfig,
        plan: &Plan,
    ) -> Result<()> {
        match plan.action {
            PlanAction::Create => self.create(state, config).await,
            PlanAction::Update => self.update(state, config, false).await,
            PlanAction::NoOp => {
                state.config.adopt_local_settings(config);
                Ok(())
            }
        }
    }

    /// Refresh `state` and compute the changes an apply would make
    ///
    /// # Errors
    /// Returns an error if the refresh fails
    pub async fn plan(&self, state: &mut ServiceState, config: &ServiceConfig) -> Result<Plan> {
        if state.exists_remotely() {
            self.read(state).await?;
        }
        Ok(Plan::compute(state, config, &handlers_for(config.kind)))
    }

    /// Create the service, then fill and activate its first version.
    ///
    /// The new id is written to `state` as soon as the service exists, so a
    /// failure while filling version 1 still leaves it recorded.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid or any API call fails
    pub async fn create(&self, state: &mut ServiceState, config: &ServiceConfig) -> Result<()> {
        config.validate()?;

        let span = info_span!(
            "service.create",
            service.name = %config.name,
            service.kind = config.kind.as_str()
        );
        async {
            let created = self
                .api
                .create_service(&config.name, &config.comment, config.kind)
                .await
                .with_context(|| format!("Failed to create service {}", config.name))?;
            info!("Created Fastly service {} ({})", config.name, created.id);

            *state = ServiceState {
                id: Some(created.id),
                config: ServiceConfig::seed(config),
                ..ServiceState::default()
            };
            state.touch();
            self.update(state, config, true).await
        }
        .instrument(span)
        .await
    }

    /// Apply `config` on top of the recorded state.
    ///
    /// `initial` marks the first update of a freshly created service: the
    /// name and comment were already sent with the create call and version 1
    /// is edited in place.
    ///
    /// # Errors
    /// Returns an error if any API call fails or the new version is invalid
    pub async fn update(
        &self,
        state: &mut ServiceState,
        config: &ServiceConfig,
        initial: bool,
    ) -> Result<()> {
        config.validate()?;
        let service_id = state
            .id
            .clone()
            .ok_or_else(|| anyhow!("Service {} has no recorded id", config.name))?;

        let span = info_span!(
            "service.update",
            service.id = %service_id,
            service.name = %config.name,
            initial = initial
        );
        async {
            let old = state.config.clone();

            if !initial && (old.name != config.name || old.comment != config.comment) {
                debug!("Updating service {} name/comment", service_id);
                self.api
                    .update_service(&service_id, &config.name, &config.comment)
                    .await
                    .with_context(|| format!("Failed to update service {service_id}"))?;
            }

            let handlers = handlers_for(config.kind);
            let pending: Vec<&dyn AttributeHandler> = handlers
                .iter()
                .map(AsRef::as_ref)
                .filter(|h| h.must_process(&old, config, initial))
                .collect();

            let first_activation = config.activate && state.active_version == 0;
            if pending.is_empty() && !first_activation {
                if old.version_comment != config.version_comment {
                    let number = if state.active_version == 0 { 1 } else { state.active_version };
                    let version = ServiceVersion::new(service_id.as_str(), number);
                    self.api
                        .update_version_comment(&version, &config.version_comment)
                        .await
                        .with_context(|| {
                            format!("Failed to update version comment on {version}")
                        })?;
                }
            } else {
                let version = self.draft_version(state, config, &service_id).await?;
                for handler in &pending {
                    debug!("Processing {} on {}", handler.key(), version);
                    handler
                        .process(self.api.as_ref(), &version, &old, config)
                        .await?;
                }
                self.validate_version(&version).await?;

                if config.activate {
                    debug!("Activating version {}", version);
                    self.api.activate_version(&version).await.with_context(|| {
                        format!("Error activating version ({})", version.number)
                    })?;
                    state.active_version = version.number;
                    state.staged = None;
                    metrics::increment_versions_activated();
                    info!("Activated {}", version);
                } else {
                    state.staged = Some(StagedVersion {
                        number: version.number,
                        config: config.clone(),
                    });
                    info!(
                        "Skipping activation of {}; visit {}/{}/versions/{} and activate it manually",
                        version, CONSOLE_VERSION_URL, service_id, version.number
                    );
                }
            }

            // Fields the API does not echo back come from the configuration
            state.config = config.clone();
            self.read(state).await
        }
        .instrument(span)
        .await
    }

    /// Version the pending changes are written to
    async fn draft_version(
        &self,
        state: &ServiceState,
        config: &ServiceConfig,
        service_id: &str,
    ) -> Result<ServiceVersion> {
        if state.active_version == 0 {
            let first = ServiceVersion::new(service_id, 1);
            if state.config.version_comment != config.version_comment {
                self.api
                    .update_version_comment(&first, &config.version_comment)
                    .await
                    .with_context(|| format!("Failed to update version comment on {first}"))?;
            }
            return Ok(first);
        }

        let active = ServiceVersion::new(service_id, state.active_version);
        let draft = self
            .api
            .clone_version(&active)
            .await
            .with_context(|| format!("Error cloning version {active}"))?;
        debug!("Cloned {} into {}", active, draft);

        if !self.settle_delay.is_zero() {
            debug!(
                "Sleeping {:?} to allow version {} to be available",
                self.settle_delay, draft.number
            );
            tokio::time::sleep(self.settle_delay).await;
        }

        if !config.version_comment.is_empty() {
            self.api
                .update_version_comment(&draft, &config.version_comment)
                .await
                .with_context(|| format!("Failed to update version comment on {draft}"))?;
        }
        Ok(draft)
    }

    async fn validate_version(&self, version: &ServiceVersion) -> Result<()> {
        let validation = self
            .api
            .validate_version(version)
            .await
            .context("Error checking validation")?;
        if !validation.is_valid() {
            return Err(anyhow!(
                "Invalid configuration for Fastly Service ({}): {}",
                version.service_id,
                validation.message()
            ));
        }
        Ok(())
    }

    /// Refresh `state` from the remote service. A service that no longer
    /// exists clears the recorded id.
    ///
    /// # Errors
    /// Returns an error if any API call fails
    pub async fn read(&self, state: &mut ServiceState) -> Result<()> {
        let Some(service_id) = state.id.clone() else {
            return Ok(());
        };

        let span = info_span!("service.read", service.id = %service_id);
        async {
            if self.find_service(&service_id).await?.is_none() {
                warn!("Service ({}) not found", service_id);
                state.id = None;
                state.active_version = 0;
                state.staged = None;
                return Ok(());
            }

            let details = self
                .api
                .service_details(&service_id)
                .await
                .with_context(|| format!("Error looking up service details for ({service_id})"))?;

            let mut config = state.config.clone();
            config.name = details.name.clone();
            config.comment = details.comment.clone();
            config.version_comment = details.version.comment.clone();
            config.kind = details.service_kind();
            state.active_version = details.active_number();

            if state
                .staged
                .as_ref()
                .is_some_and(|staged| staged.number <= state.active_version)
            {
                debug!("Staged version was activated outside the controller");
                state.staged = None;
            }

            // Until something goes live, version 1 is the one being filled
            let number = state.active_version.max(1);
            let version = ServiceVersion::new(service_id.as_str(), number);
            for handler in handlers_for(config.kind) {
                handler.read(self.api.as_ref(), &version, &mut config).await?;
            }

            state.config = config;
            state.touch();
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Delete the service. With `force_destroy` the active version is
    /// deactivated first, otherwise the API refuses to delete a live service.
    ///
    /// # Errors
    /// Returns an error if any API call fails or the service survives deletion
    pub async fn delete(&self, state: &mut ServiceState) -> Result<()> {
        let Some(service_id) = state.id.clone() else {
            return Ok(());
        };

        let span = info_span!("service.delete", service.id = %service_id);
        async {
            if state.config.force_destroy {
                let details = self.api.service_details(&service_id).await.with_context(|| {
                    format!("Error looking up service details for ({service_id})")
                })?;
                let active = details.active_number();
                if active != 0 {
                    let version = ServiceVersion::new(service_id.as_str(), active);
                    self.api
                        .deactivate_version(&version)
                        .await
                        .with_context(|| format!("Error deactivating {version}"))?;
                    info!("Deactivated {}", version);
                }
            }

            self.api
                .delete_service(&service_id)
                .await
                .with_context(|| format!("Error deleting service ({service_id})"))?;

            if self.find_service(&service_id).await?.is_some() {
                return Err(anyhow!(
                    "Tried deleting Service ({service_id}), but was still found"
                ));
            }
            info!("Deleted Fastly service {}", service_id);
            state.id = None;
            state.active_version = 0;
            state.staged = None;
            state.touch();
            Ok(())
        }
        .instrument(span)
        .await
    }

    /// Adopt an existing service by id
    ///
    /// # Errors
    /// Returns an error if the service does not exist or cannot be read
    pub async fn import(&self, service_id: &str) -> Result<ServiceState> {
        let mut state = ServiceState {
            id: Some(service_id.to_string()),
            ..ServiceState::default()
        };
        self.read(&mut state).await?;
        if !state.exists_remotely() {
            return Err(anyhow!("Service ({service_id}) not found"));
        }
        info!("Imported Fastly service {} ({})", state.config.name, service_id);
        Ok(state)
    }

    async fn find_service(&self, service_id: &str) -> Result<Option<ServiceSummary>> {
        let services = self
            .api
            .list_services()
            .await
            .with_context(|| format!("Error listing services ({service_id})"))?;
        Ok(services.into_iter().find(|s| s.id == service_id))
    }
}
