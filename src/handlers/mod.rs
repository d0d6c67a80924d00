//! # Sub-resource Handlers
//!
//! One handler per configuration block type. Every handler has the same
//! shape:
//!
//! 1. **changes** - set-difference between the recorded and desired lists
//! 2. **process** - delete the removed blocks, then create the added ones,
//!    against an editable version
//! 3. **read** - list the blocks on a version and flatten them back into
//!    the configuration tree
//!
//! No handler updates a block in place (the firewall is the one exception):
//! a changed block is deleted and recreated. Handlers run in registration
//! order, which encodes the dependencies between block types (conditions
//! before anything that references them, healthchecks before backends,
//! backends before directors).

pub mod acl;
pub mod backend;
pub mod cache_setting;
pub mod condition;
pub mod dictionary;
mod diff;
pub mod director;
pub mod domain;
pub mod gzip;
pub mod header;
pub mod healthcheck;
pub mod logging;
pub mod package;
pub mod request_setting;
pub mod response_object;
pub mod settings;
pub mod snippet;
pub mod vcl;
pub mod waf;

pub use diff::{difference, Block, BlockChanges};

use crate::api::{Collection, Form, Record, ServiceApi, ServiceVersion};
use crate::model::{ServiceConfig, ServiceKind};
use crate::observability::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Reconciles one block type of a service
#[async_trait]
pub trait AttributeHandler: Send + Sync + std::fmt::Debug {
    /// Configuration key this handler owns
    fn key(&self) -> &'static str;

    /// Names removed and added between `old` and `new`
    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges;

    fn has_change(&self, old: &ServiceConfig, new: &ServiceConfig) -> bool {
        !self.changes(old, new).is_empty()
    }

    /// Whether this handler needs a new version. `initial_version` is true
    /// while populating version 1 of a freshly created service.
    fn must_process(&self, old: &ServiceConfig, new: &ServiceConfig, initial_version: bool) -> bool {
        let _ = initial_version;
        self.has_change(old, new)
    }

    /// Apply the difference between `old` and `new` to `version`
    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()>;

    /// Refresh this handler's blocks in `config` from `version`
    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()>;
}

/// Handlers for `kind`, in processing order
#[must_use]
pub fn handlers_for(kind: ServiceKind) -> Vec<Box<dyn AttributeHandler>> {
    match kind {
        ServiceKind::Vcl => vec![
            Box::new(settings::SettingsHandler),
            Box::new(condition::ConditionHandler),
            Box::new(domain::DomainHandler),
            Box::new(healthcheck::HealthcheckHandler),
            Box::new(backend::BackendHandler),
            Box::new(director::DirectorHandler),
            Box::new(header::HeaderHandler),
            Box::new(gzip::GzipHandler),
            Box::new(logging::s3::S3LoggingHandler),
            Box::new(logging::papertrail::PapertrailHandler),
            Box::new(logging::sumologic::SumologicHandler),
            Box::new(logging::gcs::GcsLoggingHandler),
            Box::new(logging::bigquery::BigQueryLoggingHandler),
            Box::new(logging::syslog::SyslogHandler),
            Box::new(logging::logentries::LogentriesHandler),
            Box::new(logging::splunk::SplunkHandler),
            Box::new(logging::blobstorage::BlobStorageLoggingHandler),
            Box::new(logging::heroku::HerokuLoggingHandler),
            Box::new(response_object::ResponseObjectHandler),
            Box::new(request_setting::RequestSettingHandler),
            Box::new(vcl::VclHandler),
            Box::new(snippet::SnippetHandler),
            Box::new(snippet::DynamicSnippetHandler),
            Box::new(cache_setting::CacheSettingHandler),
            Box::new(acl::AclHandler),
            Box::new(dictionary::DictionaryHandler),
            Box::new(waf::WafHandler),
        ],
        ServiceKind::Wasm => vec![
            Box::new(domain::DomainHandler),
            Box::new(healthcheck::HealthcheckHandler),
            Box::new(backend::BackendHandler),
            Box::new(package::PackageHandler),
        ],
    }
}

// ============================================================================
// Shared create/delete/list calls
// ============================================================================

/// Delete one block by name. A 404 means it is already gone.
pub(crate) async fn delete_block(
    api: &dyn ServiceApi,
    version: &ServiceVersion,
    collection: Collection,
    name: &str,
) -> Result<()> {
    debug!("Fastly {} removal: {} on {}", collection, name, version);
    match api.delete(version, collection, name).await {
        Ok(()) => {
            metrics::increment_blocks_deleted(collection.label());
            Ok(())
        }
        Err(e) if e.is_not_found() => {
            debug!("Fastly {} {} already absent on {}", collection, name, version);
            Ok(())
        }
        Err(e) => Err(e).with_context(|| {
            format!("Failed to delete {collection} {name} on {version}")
        }),
    }
}

/// Create one block from its build-for-create form
pub(crate) async fn create_block(
    api: &dyn ServiceApi,
    version: &ServiceVersion,
    collection: Collection,
    name: &str,
    form: &Form,
) -> Result<Record> {
    debug!("Fastly {} addition opts: {:?}", collection, form);
    let record = api
        .create(version, collection, form)
        .await
        .with_context(|| format!("Failed to create {collection} {name} on {version}"))?;
    metrics::increment_blocks_created(collection.label());
    Ok(record)
}

/// List every block of `collection` on `version`
pub(crate) async fn list_blocks(
    api: &dyn ServiceApi,
    version: &ServiceVersion,
    collection: Collection,
) -> Result<Vec<Record>> {
    debug!("Refreshing {} for {}", collection, version);
    api.list(version, collection).await.with_context(|| {
        format!(
            "Error looking up {} for ({}), version ({})",
            collection, version.service_id, version.number
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vcl_registration_order() {
        let keys: Vec<_> = handlers_for(ServiceKind::Vcl)
            .iter()
            .map(|h| h.key())
            .collect();
        let position = |key: &str| keys.iter().position(|k| *k == key).expect(key);

        assert_eq!(keys.first(), Some(&"settings"));
        assert!(position("condition") < position("header"));
        assert!(position("condition") < position("backend"));
        assert!(position("healthcheck") < position("backend"));
        assert!(position("backend") < position("director"));
        assert_eq!(keys.len(), 27);
    }

    #[test]
    fn test_wasm_registration() {
        let keys: Vec<_> = handlers_for(ServiceKind::Wasm)
            .iter()
            .map(|h| h.key())
            .collect();
        assert_eq!(keys, vec!["domain", "healthcheck", "backend", "package"]);
    }
}
