//! Compute package of a wasm service.
//!
//! The package is uploaded whenever its filename or the SHA-512 of the local
//! file differs from what was recorded. The remote API has no way to remove
//! a package from a version, so dropping the block only logs a warning.

use super::{AttributeHandler, BlockChanges};
use crate::api::{PackageMetadata, ServiceApi, ServiceVersion};
use crate::model::ServiceConfig;
use crate::observability::metrics;
use anyhow::{Context, Result};
use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha512};
use std::path::Path;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Package {
    /// Path of the package archive (`.tar.gz`)
    pub filename: String,
    /// SHA-512 of the uploaded package, hex encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_code_size: Option<u64>,
}

/// Hex encoded SHA-512 of `contents`
#[must_use]
pub fn sha512_hex(contents: &[u8]) -> String {
    format!("{:x}", Sha512::digest(contents))
}

impl Package {
    /// Hash of the file on disk, `None` when it cannot be read
    #[must_use]
    pub fn local_hash(&self) -> Option<String> {
        std::fs::read(&self.filename).ok().map(|bytes| sha512_hex(&bytes))
    }

    fn needs_upload(&self, recorded: Option<&Self>) -> bool {
        let Some(recorded) = recorded else {
            return true;
        };
        if recorded.filename != self.filename {
            return true;
        }
        match (self.local_hash(), recorded.source_code_hash.as_deref()) {
            (Some(local), Some(remote)) => local != remote,
            _ => true,
        }
    }

    fn with_metadata(filename: String, metadata: &PackageMetadata) -> Self {
        Self {
            filename,
            source_code_hash: Some(metadata.hashsum.clone()).filter(|h| !h.is_empty()),
            source_code_size: Some(metadata.size).filter(|s| *s > 0),
        }
    }
}

#[derive(Debug)]
pub struct PackageHandler;

#[async_trait]
impl AttributeHandler for PackageHandler {
    fn key(&self) -> &'static str {
        "package"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        match &new.package {
            Some(package) if package.needs_upload(old.package.as_ref()) => BlockChanges {
                removed: Vec::new(),
                added: vec![package.filename.clone()],
            },
            _ => BlockChanges::default(),
        }
    }

    fn must_process(&self, old: &ServiceConfig, new: &ServiceConfig, initial_version: bool) -> bool {
        let _ = initial_version;
        if new.package.is_none() && old.package.is_some() {
            warn!("Package removal is not supported, the service keeps its current package");
        }
        self.has_change(old, new)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        let Some(package) = &new.package else {
            return Ok(());
        };
        if !package.needs_upload(old.package.as_ref()) {
            return Ok(());
        }

        let contents = tokio::fs::read(&package.filename)
            .await
            .with_context(|| format!("Failed to read package {}", package.filename))?;
        let filename = Path::new(&package.filename)
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or(package.filename.as_str())
            .to_string();

        debug!(
            "Fastly package upload: {} ({} bytes, sha512 {}) on {}",
            filename,
            contents.len(),
            sha512_hex(&contents),
            version
        );
        api.upload_package(version, &filename, contents)
            .await
            .with_context(|| format!("Failed to upload package {} to {version}", package.filename))?;
        metrics::increment_blocks_created("package");
        Ok(())
    }

    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()> {
        let metadata = match api.get_package(version).await {
            Ok(metadata) => metadata,
            Err(e) if e.is_not_found() => {
                config.package = None;
                return Ok(());
            }
            Err(e) => {
                return Err(e).with_context(|| {
                    format!(
                        "Error looking up package for ({}), version ({})",
                        version.service_id, version.number
                    )
                })
            }
        };
        if metadata.hashsum.is_empty() {
            config.package = None;
            return Ok(());
        }
        let filename = config
            .package
            .as_ref()
            .map(|p| p.filename.clone())
            .unwrap_or_default();
        config.package = Some(Package::with_metadata(filename, &metadata));
        Ok(())
    }
}
