//! Version-level settings (`default_host`, `default_ttl`).
//!
//! Unlike the list handlers this one also runs on the very first version of a
//! new service, so the configured TTL replaces the API default.

use super::{AttributeHandler, BlockChanges};
use crate::api::{ServiceApi, ServiceVersion, Settings};
use crate::model::ServiceConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::debug;

/// Settings to send for `new`; an unset default host keeps the recorded one
fn desired_settings(old: &ServiceConfig, new: &ServiceConfig) -> Settings {
    let default_host = if new.default_host.is_empty() {
        old.default_host.clone()
    } else {
        new.default_host.clone()
    };
    Settings {
        default_host,
        default_ttl: new.default_ttl,
    }
}

#[derive(Debug)]
pub struct SettingsHandler;

#[async_trait]
impl AttributeHandler for SettingsHandler {
    fn key(&self) -> &'static str {
        "settings"
    }

    fn changes(&self, old: &ServiceConfig, new: &ServiceConfig) -> BlockChanges {
        let desired = desired_settings(old, new);
        let mut changes = BlockChanges::default();
        if desired.default_host != old.default_host {
            changes.removed.push("default_host".to_string());
            changes.added.push("default_host".to_string());
        }
        if desired.default_ttl != old.default_ttl {
            changes.removed.push("default_ttl".to_string());
            changes.added.push("default_ttl".to_string());
        }
        changes
    }

    fn must_process(&self, old: &ServiceConfig, new: &ServiceConfig, initial_version: bool) -> bool {
        initial_version || self.has_change(old, new)
    }

    async fn process(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        old: &ServiceConfig,
        new: &ServiceConfig,
    ) -> Result<()> {
        let settings = desired_settings(old, new);
        debug!("Update Settings opts: {:?} on {}", settings, version);
        api.update_settings(version, &settings)
            .await
            .with_context(|| format!("Failed to update settings on {version}"))
    }

    async fn read(
        &self,
        api: &dyn ServiceApi,
        version: &ServiceVersion,
        config: &mut ServiceConfig,
    ) -> Result<()> {
        let settings = api.get_settings(version).await.with_context(|| {
            format!(
                "Error looking up Version settings for ({}), version ({})",
                version.service_id, version.number
            )
        })?;
        config.default_host = settings.default_host;
        config.default_ttl = settings.default_ttl;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: &str, ttl: u32) -> ServiceConfig {
        ServiceConfig {
            name: "demo".to_string(),
            default_host: host.to_string(),
            default_ttl: ttl,
            ..ServiceConfig::default()
        }
    }

    #[test]
    fn test_unset_host_is_not_a_change() {
        let recorded = config("origin.example.com", 3600);
        let desired = config("", 3600);
        assert!(!SettingsHandler.has_change(&recorded, &desired));
        assert_eq!(
            desired_settings(&recorded, &desired).default_host,
            "origin.example.com"
        );
    }

    #[test]
    fn test_ttl_change() {
        let changes = SettingsHandler.changes(&config("", 3600), &config("", 60));
        assert_eq!(changes.added, vec!["default_ttl"]);
    }

    #[test]
    fn test_initial_version_always_processes() {
        let same = config("", 3600);
        assert!(!SettingsHandler.must_process(&same, &same, false));
        assert!(SettingsHandler.must_process(&same, &same, true));
    }
}
