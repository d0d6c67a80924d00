//! Recorded state of one managed service, persisted as JSON between runs.

use super::ServiceConfig;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceState {
    /// Remote service id; `None` until created, or after the service vanished
    #[serde(default)]
    pub id: Option<String>,
    /// Currently active version, zero when nothing has been activated
    #[serde(default)]
    pub active_version: u32,
    /// Configuration as last observed on the active version, or on version 1
    /// while nothing has been activated
    #[serde(default)]
    pub config: ServiceConfig,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    /// Draft left inactive by the last apply
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub staged: Option<StagedVersion>,
}

/// A validated version waiting to be activated by hand, with the
/// configuration it was built from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedVersion {
    pub number: u32,
    pub config: ServiceConfig,
}

impl ServiceState {
    /// Load state from `path`; a missing file is an empty state
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse state file {}", path.display()))
    }

    /// Write state atomically (temp file + rename) next to `path`
    ///
    /// # Errors
    /// Returns an error if the file cannot be written
    pub fn save(&self, path: &Path) -> Result<()> {
        let raw = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, raw)
            .with_context(|| format!("Failed to write state file {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("Failed to replace state file {}", path.display()))?;
        Ok(())
    }

    /// Remove the state file, if any
    ///
    /// # Errors
    /// Returns an error if the file exists and cannot be removed
    pub fn remove(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove state file {}", path.display()))?;
        }
        Ok(())
    }

    #[must_use]
    pub fn exists_remotely(&self) -> bool {
        self.id.is_some()
    }

    pub fn touch(&mut self) {
        self.updated_at = Some(Utc::now());
    }

    /// The staged draft, if it was built from exactly `config`
    #[must_use]
    pub fn staged_for(&self, config: &ServiceConfig) -> Option<&StagedVersion> {
        self.staged.as_ref().filter(|staged| staged.config == *config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_state() {
        let dir = tempfile::tempdir().expect("tempdir");
        let state = ServiceState::load(&dir.path().join("absent.json")).expect("load");
        assert_eq!(state, ServiceState::default());
        assert!(!state.exists_remotely());
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        let mut state = ServiceState {
            id: Some("SU1Z0isxPaozGVKXdv0eY".to_string()),
            active_version: 4,
            ..ServiceState::default()
        };
        state.config.name = "demo".to_string();
        state.touch();
        state.save(&path).expect("save");

        let loaded = ServiceState::load(&path).expect("load");
        assert_eq!(loaded, state);

        ServiceState::remove(&path).expect("remove");
        assert!(!path.exists());
    }

    #[test]
    fn test_staged_draft_matches_only_its_own_config() {
        let mut config = ServiceConfig::default();
        config.name = "demo".to_string();
        let state = ServiceState {
            staged: Some(StagedVersion {
                number: 3,
                config: config.clone(),
            }),
            ..ServiceState::default()
        };
        assert_eq!(state.staged_for(&config).map(|s| s.number), Some(3));

        config.default_ttl = 60;
        assert!(state.staged_for(&config).is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("state.json");
        std::fs::write(&path, "{not json").expect("write");
        let err = ServiceState::load(&path).unwrap_err();
        assert!(err.to_string().contains("Failed to parse state file"));
    }
}
