//! # Service Model
//!
//! The desired configuration of one Fastly service, as loaded from YAML.
//!
//! Each list field holds the blocks of one sub-resource type; the block
//! structs live next to the handler that reconciles them in
//! [`crate::handlers`]. The same tree doubles as recorded state: after a
//! refresh every list reflects what the active remote version contains.
//!
//! ```yaml
//! name: www.example.com
//! domain:
//!   - name: www.example.com
//! backend:
//!   - name: origin
//!     address: origin.example.com
//!     port: 443
//!     use_ssl: true
//! ```

mod state;

pub use state::{ServiceState, StagedVersion};

use crate::constants::{DEFAULT_SERVICE_COMMENT, DEFAULT_TTL_SECS};
use crate::handlers::{
    acl::Acl,
    backend::Backend,
    cache_setting::CacheSetting,
    condition::Condition,
    dictionary::Dictionary,
    director::Director,
    domain::Domain,
    gzip::Gzip,
    header::Header,
    healthcheck::Healthcheck,
    logging::{
        bigquery::BigQueryLogging, blobstorage::BlobStorageLogging, gcs::GcsLogging,
        heroku::HerokuLogging, logentries::Logentries, papertrail::Papertrail,
        s3::S3Logging, splunk::Splunk, sumologic::Sumologic, syslog::Syslog,
    },
    package::Package,
    request_setting::RequestSetting,
    response_object::ResponseObject,
    snippet::{DynamicSnippet, Snippet},
    vcl::Vcl,
    waf::Waf,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Problems with a service configuration file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read configuration file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse configuration file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Service name must not be empty")]
    EmptyName,

    #[error("Duplicate {block} name: {name}")]
    DuplicateName { block: &'static str, name: String },

    #[error("{0}")]
    Vcl(String),

    #[error("Invalid {block} {name}: {message}")]
    InvalidField {
        block: &'static str,
        name: String,
        message: String,
    },

    #[error("Block {block} is not supported by {kind} services")]
    UnsupportedBlock {
        block: &'static str,
        kind: &'static str,
    },
}

/// Service flavour; selects which handlers are registered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ServiceKind {
    /// Varnish-configured delivery service
    #[default]
    Vcl,
    /// Compute service running a WebAssembly package
    Wasm,
}

impl ServiceKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Vcl => "vcl",
            Self::Wasm => "wasm",
        }
    }
}

/// Desired configuration of one service
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Unique name for this service
    pub name: String,
    /// A personal freeform descriptive note
    #[serde(default = "default_comment")]
    pub comment: String,
    /// Comment recorded on every version this controller creates
    #[serde(default)]
    pub version_comment: String,
    /// Activate the new version once it validates
    #[serde(default = "default_true")]
    pub activate: bool,
    /// Deactivate the active version so the service can be deleted
    #[serde(default)]
    pub force_destroy: bool,
    #[serde(default)]
    pub kind: ServiceKind,

    /// Default hostname for the version; taken from the remote when unset
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_host: String,
    /// Default time-to-live for the version (seconds)
    #[serde(default = "default_ttl")]
    pub default_ttl: u32,

    #[serde(default)]
    pub domain: Vec<Domain>,
    #[serde(default)]
    pub condition: Vec<Condition>,
    #[serde(default)]
    pub healthcheck: Vec<Healthcheck>,
    #[serde(default)]
    pub backend: Vec<Backend>,
    #[serde(default)]
    pub director: Vec<Director>,
    #[serde(default)]
    pub header: Vec<Header>,
    #[serde(default)]
    pub gzip: Vec<Gzip>,
    #[serde(default)]
    pub s3logging: Vec<S3Logging>,
    #[serde(default)]
    pub papertrail: Vec<Papertrail>,
    #[serde(default)]
    pub sumologic: Vec<Sumologic>,
    #[serde(default)]
    pub gcslogging: Vec<GcsLogging>,
    #[serde(default)]
    pub bigquerylogging: Vec<BigQueryLogging>,
    #[serde(default)]
    pub syslog: Vec<Syslog>,
    #[serde(default)]
    pub logentries: Vec<Logentries>,
    #[serde(default)]
    pub splunk: Vec<Splunk>,
    #[serde(default)]
    pub blobstoragelogging: Vec<BlobStorageLogging>,
    #[serde(default)]
    pub logging_heroku: Vec<HerokuLogging>,
    #[serde(default)]
    pub response_object: Vec<ResponseObject>,
    #[serde(default)]
    pub request_setting: Vec<RequestSetting>,
    #[serde(default)]
    pub vcl: Vec<Vcl>,
    #[serde(default)]
    pub snippet: Vec<Snippet>,
    #[serde(default)]
    pub dynamicsnippet: Vec<DynamicSnippet>,
    #[serde(default)]
    pub cache_setting: Vec<CacheSetting>,
    #[serde(default)]
    pub acl: Vec<Acl>,
    #[serde(default)]
    pub dictionary: Vec<Dictionary>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub waf: Option<Waf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package: Option<Package>,
}

fn default_comment() -> String {
    DEFAULT_SERVICE_COMMENT.to_string()
}

fn default_true() -> bool {
    true
}

fn default_ttl() -> u32 {
    DEFAULT_TTL_SECS
}

impl ServiceConfig {
    /// What a freshly created service looks like: only the attributes sent
    /// with the create call, no blocks and no settings
    #[must_use]
    pub fn seed(config: &Self) -> Self {
        Self {
            name: config.name.clone(),
            comment: config.comment.clone(),
            kind: config.kind,
            ..Self::default()
        }
    }

    /// Take the settings the API never echoes back (`activate`,
    /// `force_destroy` and the package filename) from `desired`
    pub fn adopt_local_settings(&mut self, desired: &Self) {
        self.activate = desired.activate;
        self.force_destroy = desired.force_destroy;
        if let (Some(package), Some(wanted)) = (self.package.as_mut(), desired.package.as_ref()) {
            package.filename.clone_from(&wanted.filename);
        }
    }

    /// Load and validate a YAML configuration file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: display.clone(),
            source,
        })?;
        Self::from_yaml(&raw, &display)
    }

    /// Parse and validate YAML text; `origin` names the source in errors
    ///
    /// # Errors
    /// Returns an error if the text is not a valid configuration
    pub fn from_yaml(raw: &str, origin: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks that need the whole tree rather than one field
    ///
    /// # Errors
    /// Returns the first problem found
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }

        unique_names("domain", self.domain.iter().map(|b| b.name.as_str()))?;
        unique_names("condition", self.condition.iter().map(|b| b.name.as_str()))?;
        unique_names("healthcheck", self.healthcheck.iter().map(|b| b.name.as_str()))?;
        unique_names("backend", self.backend.iter().map(|b| b.name.as_str()))?;
        unique_names("director", self.director.iter().map(|b| b.name.as_str()))?;
        unique_names("header", self.header.iter().map(|b| b.name.as_str()))?;
        unique_names("vcl", self.vcl.iter().map(|b| b.name.as_str()))?;
        unique_names(
            "snippet",
            self.snippet
                .iter()
                .map(|b| b.name.as_str())
                .chain(self.dynamicsnippet.iter().map(|b| b.name.as_str())),
        )?;
        unique_names("acl", self.acl.iter().map(|b| b.name.as_str()))?;
        unique_names("dictionary", self.dictionary.iter().map(|b| b.name.as_str()))?;

        crate::handlers::vcl::validate_vcls(&self.vcl).map_err(ConfigError::Vcl)?;

        for director in &self.director {
            director.validate()?;
        }

        match self.kind {
            ServiceKind::Vcl => {
                if self.package.is_some() {
                    return Err(ConfigError::UnsupportedBlock {
                        block: "package",
                        kind: "vcl",
                    });
                }
            }
            ServiceKind::Wasm => {
                if let Some(block) = self.first_vcl_only_block() {
                    return Err(ConfigError::UnsupportedBlock {
                        block,
                        kind: "wasm",
                    });
                }
            }
        }

        Ok(())
    }

    fn first_vcl_only_block(&self) -> Option<&'static str> {
        let populated = [
            ("condition", self.condition.is_empty()),
            ("director", self.director.is_empty()),
            ("header", self.header.is_empty()),
            ("gzip", self.gzip.is_empty()),
            ("s3logging", self.s3logging.is_empty()),
            ("papertrail", self.papertrail.is_empty()),
            ("sumologic", self.sumologic.is_empty()),
            ("gcslogging", self.gcslogging.is_empty()),
            ("bigquerylogging", self.bigquerylogging.is_empty()),
            ("syslog", self.syslog.is_empty()),
            ("logentries", self.logentries.is_empty()),
            ("splunk", self.splunk.is_empty()),
            ("blobstoragelogging", self.blobstoragelogging.is_empty()),
            ("logging_heroku", self.logging_heroku.is_empty()),
            ("response_object", self.response_object.is_empty()),
            ("request_setting", self.request_setting.is_empty()),
            ("vcl", self.vcl.is_empty()),
            ("snippet", self.snippet.is_empty()),
            ("dynamicsnippet", self.dynamicsnippet.is_empty()),
            ("cache_setting", self.cache_setting.is_empty()),
            ("acl", self.acl.is_empty()),
            ("dictionary", self.dictionary.is_empty()),
            ("waf", self.waf.is_none()),
        ];
        populated
            .into_iter()
            .find(|(_, empty)| !empty)
            .map(|(block, _)| block)
    }
}

fn unique_names<'a>(
    block: &'static str,
    names: impl Iterator<Item = &'a str>,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(ConfigError::DuplicateName {
                block,
                name: name.to_string(),
            });
        }
    }
    Ok(())
}
