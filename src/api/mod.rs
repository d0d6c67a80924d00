//! # Fastly API
//!
//! The remote surface the controller drives. [`ServiceApi`] is the seam
//! between the reconciler and the network: [`FastlyClient`] implements it
//! over HTTPS and the integration tests implement it in memory.
//!
//! Versioned collections (domains, backends, logging endpoints, ...) all share
//! the same list/create/delete shape and are addressed through [`Collection`].
//! Endpoints that do not fit that shape (settings, director links, VCL main,
//! WAF, compute packages) have dedicated methods.

mod client;
mod common;
mod error;
mod form;
pub mod lenient;

pub use client::FastlyClient;
pub use common::OperationTracker;
pub use error::ApiError;
pub use form::Form;
pub use lenient::Record;

use crate::model::ServiceKind;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A specific version of a specific service
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceVersion {
    pub service_id: String,
    pub number: u32,
}

impl ServiceVersion {
    #[must_use]
    pub fn new(service_id: impl Into<String>, number: u32) -> Self {
        Self {
            service_id: service_id.into(),
            number,
        }
    }
}

impl fmt::Display for ServiceVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} v{}", self.service_id, self.number)
    }
}

/// Entry from `GET /service`
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceSummary {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub comment: String,
}

/// Version metadata embedded in service details
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VersionInfo {
    #[serde(default, deserialize_with = "lenient::uint")]
    pub number: u32,
    #[serde(default, deserialize_with = "lenient::string")]
    pub comment: String,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub active: bool,
}

/// `GET /service/{id}/details`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct ServiceDetail {
    pub id: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub comment: String,
    /// `vcl` or `wasm`
    #[serde(rename = "type", default, deserialize_with = "lenient::string")]
    pub kind: String,
    /// Latest version (the one most recently cloned or edited)
    #[serde(default)]
    pub version: VersionInfo,
    /// Currently active version, absent until the first activation
    #[serde(default)]
    pub active_version: Option<VersionInfo>,
}

impl ServiceDetail {
    /// Active version number, zero when nothing has been activated
    #[must_use]
    pub fn active_number(&self) -> u32 {
        self.active_version.as_ref().map_or(0, |v| v.number)
    }

    #[must_use]
    pub fn service_kind(&self) -> ServiceKind {
        if self.kind == ServiceKind::Wasm.as_str() {
            ServiceKind::Wasm
        } else {
            ServiceKind::Vcl
        }
    }
}

/// `GET /service/{id}/version/{v}/validate`
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Validation {
    #[serde(default, deserialize_with = "lenient::string")]
    pub status: String,
    #[serde(default, deserialize_with = "lenient::string")]
    pub msg: String,
    #[serde(default)]
    pub errors: Vec<String>,
}

impl Validation {
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.status == "ok"
    }

    /// Human readable reason for an invalid version
    #[must_use]
    pub fn message(&self) -> String {
        if self.errors.is_empty() {
            self.msg.clone()
        } else if self.msg.is_empty() {
            self.errors.join("; ")
        } else {
            format!("{}: {}", self.msg, self.errors.join("; "))
        }
    }
}

/// Version-level settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(
        rename = "general.default_host",
        default,
        deserialize_with = "lenient::string"
    )]
    pub default_host: String,
    #[serde(
        rename = "general.default_ttl",
        default,
        deserialize_with = "lenient::uint"
    )]
    pub default_ttl: u32,
}

/// Web application firewall attached to a version
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WafRecord {
    pub id: String,
    pub response_object: String,
    pub prefetch_condition: Option<String>,
}

/// Attributes sent when creating or updating a firewall
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WafInput {
    pub response_object: String,
    pub prefetch_condition: Option<String>,
}

/// Compute package metadata
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PackageMetadata {
    #[serde(default, deserialize_with = "lenient::string")]
    pub hashsum: String,
    #[serde(default, deserialize_with = "lenient::ulong")]
    pub size: u64,
}

/// Versioned collections that share the list/create/delete endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    Domain,
    Condition,
    Healthcheck,
    Backend,
    Director,
    Header,
    Gzip,
    S3Logging,
    Papertrail,
    Sumologic,
    GcsLogging,
    BigQueryLogging,
    Syslog,
    Logentries,
    Splunk,
    BlobStorageLogging,
    Heroku,
    ResponseObject,
    RequestSetting,
    Vcl,
    Snippet,
    CacheSetting,
    Acl,
    Dictionary,
}

impl Collection {
    /// Path segments below `/service/{id}/version/{v}`
    #[must_use]
    pub fn path(self) -> &'static [&'static str] {
        match self {
            Self::Domain => &["domain"],
            Self::Condition => &["condition"],
            Self::Healthcheck => &["healthcheck"],
            Self::Backend => &["backend"],
            Self::Director => &["director"],
            Self::Header => &["header"],
            Self::Gzip => &["gzip"],
            Self::S3Logging => &["logging", "s3"],
            Self::Papertrail => &["logging", "papertrail"],
            Self::Sumologic => &["logging", "sumologic"],
            Self::GcsLogging => &["logging", "gcs"],
            Self::BigQueryLogging => &["logging", "bigquery"],
            Self::Syslog => &["logging", "syslog"],
            Self::Logentries => &["logging", "logentries"],
            Self::Splunk => &["logging", "splunk"],
            Self::BlobStorageLogging => &["logging", "azureblob"],
            Self::Heroku => &["logging", "heroku"],
            Self::ResponseObject => &["response_object"],
            Self::RequestSetting => &["request_settings"],
            Self::Vcl => &["vcl"],
            Self::Snippet => &["snippet"],
            Self::CacheSetting => &["cache_settings"],
            Self::Acl => &["acl"],
            Self::Dictionary => &["dictionary"],
        }
    }

    /// Short label for logs, spans and metrics
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Domain => "domain",
            Self::Condition => "condition",
            Self::Healthcheck => "healthcheck",
            Self::Backend => "backend",
            Self::Director => "director",
            Self::Header => "header",
            Self::Gzip => "gzip",
            Self::S3Logging => "s3logging",
            Self::Papertrail => "papertrail",
            Self::Sumologic => "sumologic",
            Self::GcsLogging => "gcslogging",
            Self::BigQueryLogging => "bigquerylogging",
            Self::Syslog => "syslog",
            Self::Logentries => "logentries",
            Self::Splunk => "splunk",
            Self::BlobStorageLogging => "blobstoragelogging",
            Self::Heroku => "logging_heroku",
            Self::ResponseObject => "response_object",
            Self::RequestSetting => "request_setting",
            Self::Vcl => "vcl",
            Self::Snippet => "snippet",
            Self::CacheSetting => "cache_setting",
            Self::Acl => "acl",
            Self::Dictionary => "dictionary",
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Remote operations needed to reconcile one service
#[async_trait]
pub trait ServiceApi: Send + Sync {
    async fn list_services(&self) -> Result<Vec<ServiceSummary>, ApiError>;

    async fn create_service(
        &self,
        name: &str,
        comment: &str,
        kind: ServiceKind,
    ) -> Result<ServiceSummary, ApiError>;

    async fn update_service(&self, service_id: &str, name: &str, comment: &str)
        -> Result<(), ApiError>;

    async fn delete_service(&self, service_id: &str) -> Result<(), ApiError>;

    async fn service_details(&self, service_id: &str) -> Result<ServiceDetail, ApiError>;

    /// Clone `version` into a new editable version
    async fn clone_version(&self, version: &ServiceVersion) -> Result<ServiceVersion, ApiError>;

    async fn update_version_comment(
        &self,
        version: &ServiceVersion,
        comment: &str,
    ) -> Result<(), ApiError>;

    async fn validate_version(&self, version: &ServiceVersion) -> Result<Validation, ApiError>;

    async fn activate_version(&self, version: &ServiceVersion) -> Result<(), ApiError>;

    async fn deactivate_version(&self, version: &ServiceVersion) -> Result<(), ApiError>;

    async fn get_settings(&self, version: &ServiceVersion) -> Result<Settings, ApiError>;

    async fn update_settings(
        &self,
        version: &ServiceVersion,
        settings: &Settings,
    ) -> Result<(), ApiError>;

    async fn list(
        &self,
        version: &ServiceVersion,
        collection: Collection,
    ) -> Result<Vec<Record>, ApiError>;

    async fn create(
        &self,
        version: &ServiceVersion,
        collection: Collection,
        form: &Form,
    ) -> Result<Record, ApiError>;

    async fn delete(
        &self,
        version: &ServiceVersion,
        collection: Collection,
        name: &str,
    ) -> Result<(), ApiError>;

    /// Mark an uploaded VCL as the main VCL of the version
    async fn set_main_vcl(&self, version: &ServiceVersion, name: &str) -> Result<(), ApiError>;

    async fn create_director_backend(
        &self,
        version: &ServiceVersion,
        director: &str,
        backend: &str,
    ) -> Result<(), ApiError>;

    /// Succeeds when the backend is linked to the director
    async fn get_director_backend(
        &self,
        version: &ServiceVersion,
        director: &str,
        backend: &str,
    ) -> Result<(), ApiError>;

    async fn list_wafs(&self, version: &ServiceVersion) -> Result<Vec<WafRecord>, ApiError>;

    async fn get_waf(&self, version: &ServiceVersion, waf_id: &str)
        -> Result<WafRecord, ApiError>;

    async fn create_waf(
        &self,
        version: &ServiceVersion,
        waf: &WafInput,
    ) -> Result<WafRecord, ApiError>;

    async fn update_waf(
        &self,
        version: &ServiceVersion,
        waf_id: &str,
        waf: &WafInput,
    ) -> Result<WafRecord, ApiError>;

    async fn delete_waf(&self, version: &ServiceVersion, waf_id: &str) -> Result<(), ApiError>;

    async fn get_package(&self, version: &ServiceVersion) -> Result<PackageMetadata, ApiError>;

    async fn upload_package(
        &self,
        version: &ServiceVersion,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<PackageMetadata, ApiError>;
}
