//! Fastly REST Client
//!
//! Native REST implementation of [`ServiceApi`] over `reqwest` with rustls.
//!
//! - Authenticates with the `Fastly-Key` header
//! - Sends mutations form-encoded, except the JSON:API firewall endpoints
//!   and the multipart package upload
//! - Wraps every call in a `fastly.api` span and records the outcome in
//!   the API metrics
//!
//! References:
//! - [Fastly API reference](https://developer.fastly.com/reference/api/)

use super::common::OperationTracker;
use super::lenient::{self, enum_name};
use super::{
    ApiError, Collection, Form, PackageMetadata, Record, ServiceApi, ServiceDetail,
    ServiceSummary, ServiceVersion, Settings, Validation, VersionInfo, WafInput, WafRecord,
};
use crate::config::ControllerConfig;
use crate::constants::{API_KEY_ENV, API_KEY_HEADER};
use crate::model::ServiceKind;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::{multipart, Client, Method, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, field, info, info_span, warn, Instrument};
use zeroize::Zeroizing;

const JSON_API: &str = "application/vnd.api+json";

/// Fastly API client
pub struct FastlyClient {
    http_client: Client,
    base_url: Url,
    api_key: Zeroizing<String>,
}

impl std::fmt::Debug for FastlyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FastlyClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

/// Request payload variants
enum Body<'a> {
    Empty,
    Form(&'a Form),
    JsonApi(Value),
    Multipart(multipart::Form),
}

// ============================================================================
// JSON:API firewall documents
// ============================================================================

#[derive(Debug, Deserialize)]
struct Document<T> {
    data: T,
}

#[derive(Debug, Deserialize)]
struct WafResource {
    id: String,
    #[serde(default)]
    attributes: WafAttributes,
}

#[derive(Debug, Default, Deserialize)]
struct WafAttributes {
    #[serde(default, deserialize_with = "lenient::string")]
    response: String,
    #[serde(default)]
    prefetch_condition: Option<String>,
}

impl From<WafResource> for WafRecord {
    fn from(resource: WafResource) -> Self {
        Self {
            id: resource.id,
            response_object: resource.attributes.response,
            prefetch_condition: resource
                .attributes
                .prefetch_condition
                .filter(|c| !c.is_empty()),
        }
    }
}

fn waf_document(waf: &WafInput, id: Option<&str>) -> Value {
    let mut data = json!({
        "type": "waf",
        "attributes": {
            "response": waf.response_object,
            "prefetch_condition": waf.prefetch_condition.clone().unwrap_or_default(),
        }
    });
    if let Some(id) = id {
        data["id"] = Value::String(id.to_string());
    }
    json!({ "data": data })
}

#[derive(Debug, Deserialize)]
struct PackageResponse {
    #[serde(default)]
    metadata: PackageMetadata,
}

impl FastlyClient {
    /// Create a client for `base_url` authenticating with `api_key`
    ///
    /// # Errors
    /// Returns an error if the URL is invalid or the HTTP client cannot be built
    pub fn new(base_url: &str, api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_url)
            .with_context(|| format!("Invalid Fastly API URL: {base_url}"))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Fastly API URL cannot be used as a base: {base_url}");
        }

        let http_client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("fastly-service-controller/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url,
            api_key: Zeroizing::new(api_key.into()),
        })
    }

    /// Create a client from `FASTLY_API_KEY` and the controller configuration
    ///
    /// # Errors
    /// Returns an error if `FASTLY_API_KEY` is unset or empty
    pub fn from_env(config: &ControllerConfig) -> Result<Self> {
        let api_key = Zeroizing::new(
            std::env::var(API_KEY_ENV)
                .with_context(|| format!("{API_KEY_ENV} must be set to talk to the Fastly API"))?,
        );
        if api_key.trim().is_empty() {
            anyhow::bail!("{API_KEY_ENV} is empty");
        }
        info!("Initializing Fastly API client for {}", config.api_url);
        Self::new(&config.api_url, api_key.as_str(), config.request_timeout())
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn version_url(&self, version: &ServiceVersion, rest: &[&str]) -> Url {
        let number = version.number.to_string();
        let mut segments = vec!["service", version.service_id.as_str(), "version", number.as_str()];
        segments.extend_from_slice(rest);
        self.url(&segments)
    }

    /// Send one request and return the raw body of a successful response
    async fn execute(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: Body<'_>,
    ) -> Result<String, ApiError> {
        let span = info_span!(
            "fastly.api",
            operation.type = operation,
            http.method = %method,
            http.path = url.path(),
            operation.success = field::Empty,
            operation.duration_ms = field::Empty,
            error.message = field::Empty,
        );
        let tracker = OperationTracker::new(operation, span.clone());

        let accept = if matches!(body, Body::JsonApi(_)) {
            JSON_API
        } else {
            "application/json"
        };
        let mut request = self
            .http_client
            .request(method, url)
            .header(API_KEY_HEADER, self.api_key.as_str())
            .header(ACCEPT, accept);
        request = match body {
            Body::Empty => request,
            Body::Form(form) => {
                debug!(form = ?form, "Request form");
                request.form(form.pairs())
            }
            Body::JsonApi(document) => request
                .header(CONTENT_TYPE, JSON_API)
                .body(document.to_string()),
            Body::Multipart(parts) => request.multipart(parts),
        };

        async move {
            let response = match request.send().await {
                Ok(response) => response,
                Err(e) => {
                    tracker.record_error(None, &e.to_string());
                    return Err(ApiError::Transport(e));
                }
            };

            let status = response.status();
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    tracker.record_error(Some(status.as_u16()), &e.to_string());
                    return Err(ApiError::Transport(e));
                }
            };

            if !status.is_success() {
                let error = ApiError::from_response(status.as_u16(), &text);
                if error.is_not_found() {
                    debug!("Fastly API returned 404: {}", error);
                } else {
                    warn!("Fastly API call failed: {}", error);
                }
                tracker.record_error(Some(status.as_u16()), &error.to_string());
                return Err(error);
            }

            tracker.record_success();
            Ok(text)
        }
        .instrument(span)
        .await
    }

    async fn execute_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        method: Method,
        url: Url,
        body: Body<'_>,
    ) -> Result<T, ApiError> {
        let text = self.execute(operation, method, url, body).await?;
        serde_json::from_str(&text).map_err(|source| ApiError::Decode { operation, source })
    }
}

#[async_trait]
impl ServiceApi for FastlyClient {
    async fn list_services(&self) -> Result<Vec<ServiceSummary>, ApiError> {
        self.execute_json("list_services", Method::GET, self.url(&["service"]), Body::Empty)
            .await
    }

    async fn create_service(
        &self,
        name: &str,
        comment: &str,
        kind: ServiceKind,
    ) -> Result<ServiceSummary, ApiError> {
        let form = Form::new()
            .field("name", name)
            .field("comment", comment)
            .field("type", enum_name(&kind));
        self.execute_json(
            "create_service",
            Method::POST,
            self.url(&["service"]),
            Body::Form(&form),
        )
        .await
    }

    async fn update_service(
        &self,
        service_id: &str,
        name: &str,
        comment: &str,
    ) -> Result<(), ApiError> {
        let form = Form::new().field("name", name).field("comment", comment);
        self.execute(
            "update_service",
            Method::PUT,
            self.url(&["service", service_id]),
            Body::Form(&form),
        )
        .await
        .map(drop)
    }

    async fn delete_service(&self, service_id: &str) -> Result<(), ApiError> {
        self.execute(
            "delete_service",
            Method::DELETE,
            self.url(&["service", service_id]),
            Body::Empty,
        )
        .await
        .map(drop)
    }

    async fn service_details(&self, service_id: &str) -> Result<ServiceDetail, ApiError> {
        self.execute_json(
            "service_details",
            Method::GET,
            self.url(&["service", service_id, "details"]),
            Body::Empty,
        )
        .await
    }

    async fn clone_version(&self, version: &ServiceVersion) -> Result<ServiceVersion, ApiError> {
        let cloned: VersionInfo = self
            .execute_json(
                "clone_version",
                Method::PUT,
                self.version_url(version, &["clone"]),
                Body::Empty,
            )
            .await?;
        Ok(ServiceVersion::new(version.service_id.clone(), cloned.number))
    }

    async fn update_version_comment(
        &self,
        version: &ServiceVersion,
        comment: &str,
    ) -> Result<(), ApiError> {
        let form = Form::new().field("comment", comment);
        self.execute(
            "update_version",
            Method::PUT,
            self.version_url(version, &[]),
            Body::Form(&form),
        )
        .await
        .map(drop)
    }

    async fn validate_version(&self, version: &ServiceVersion) -> Result<Validation, ApiError> {
        self.execute_json(
            "validate_version",
            Method::GET,
            self.version_url(version, &["validate"]),
            Body::Empty,
        )
        .await
    }

    async fn activate_version(&self, version: &ServiceVersion) -> Result<(), ApiError> {
        self.execute(
            "activate_version",
            Method::PUT,
            self.version_url(version, &["activate"]),
            Body::Empty,
        )
        .await
        .map(drop)
    }

    async fn deactivate_version(&self, version: &ServiceVersion) -> Result<(), ApiError> {
        self.execute(
            "deactivate_version",
            Method::PUT,
            self.version_url(version, &["deactivate"]),
            Body::Empty,
        )
        .await
        .map(drop)
    }

    async fn get_settings(&self, version: &ServiceVersion) -> Result<Settings, ApiError> {
        self.execute_json(
            "get_settings",
            Method::GET,
            self.version_url(version, &["settings"]),
            Body::Empty,
        )
        .await
    }

    async fn update_settings(
        &self,
        version: &ServiceVersion,
        settings: &Settings,
    ) -> Result<(), ApiError> {
        let form = Form::new()
            .opt(
                "general.default_host",
                Some(settings.default_host.as_str()).filter(|h| !h.is_empty()),
            )
            .number("general.default_ttl", settings.default_ttl);
        self.execute(
            "update_settings",
            Method::PUT,
            self.version_url(version, &["settings"]),
            Body::Form(&form),
        )
        .await
        .map(drop)
    }

    async fn list(
        &self,
        version: &ServiceVersion,
        collection: Collection,
    ) -> Result<Vec<Record>, ApiError> {
        self.execute_json(
            "list",
            Method::GET,
            self.version_url(version, collection.path()),
            Body::Empty,
        )
        .await
    }

    async fn create(
        &self,
        version: &ServiceVersion,
        collection: Collection,
        form: &Form,
    ) -> Result<Record, ApiError> {
        self.execute_json(
            "create",
            Method::POST,
            self.version_url(version, collection.path()),
            Body::Form(form),
        )
        .await
    }

    async fn delete(
        &self,
        version: &ServiceVersion,
        collection: Collection,
        name: &str,
    ) -> Result<(), ApiError> {
        let mut segments = collection.path().to_vec();
        segments.push(name);
        self.execute(
            "delete",
            Method::DELETE,
            self.version_url(version, &segments),
            Body::Empty,
        )
        .await
        .map(drop)
    }

    async fn set_main_vcl(&self, version: &ServiceVersion, name: &str) -> Result<(), ApiError> {
        self.execute(
            "set_main_vcl",
            Method::PUT,
            self.version_url(version, &["vcl", name, "main"]),
            Body::Empty,
        )
        .await
        .map(drop)
    }

    async fn create_director_backend(
        &self,
        version: &ServiceVersion,
        director: &str,
        backend: &str,
    ) -> Result<(), ApiError> {
        self.execute(
            "create_director_backend",
            Method::POST,
            self.version_url(version, &["director", director, "backend", backend]),
            Body::Empty,
        )
        .await
        .map(drop)
    }

    async fn get_director_backend(
        &self,
        version: &ServiceVersion,
        director: &str,
        backend: &str,
    ) -> Result<(), ApiError> {
        self.execute(
            "get_director_backend",
            Method::GET,
            self.version_url(version, &["director", director, "backend", backend]),
            Body::Empty,
        )
        .await
        .map(drop)
    }

    async fn list_wafs(&self, version: &ServiceVersion) -> Result<Vec<WafRecord>, ApiError> {
        let document: Document<Vec<WafResource>> = self
            .execute_json(
                "list_wafs",
                Method::GET,
                self.version_url(version, &["wafs"]),
                Body::Empty,
            )
            .await?;
        Ok(document.data.into_iter().map(WafRecord::from).collect())
    }

    async fn get_waf(
        &self,
        version: &ServiceVersion,
        waf_id: &str,
    ) -> Result<WafRecord, ApiError> {
        let document: Document<WafResource> = self
            .execute_json(
                "get_waf",
                Method::GET,
                self.version_url(version, &["wafs", waf_id]),
                Body::Empty,
            )
            .await?;
        Ok(document.data.into())
    }

    async fn create_waf(
        &self,
        version: &ServiceVersion,
        waf: &WafInput,
    ) -> Result<WafRecord, ApiError> {
        let document: Document<WafResource> = self
            .execute_json(
                "create_waf",
                Method::POST,
                self.version_url(version, &["wafs"]),
                Body::JsonApi(waf_document(waf, None)),
            )
            .await?;
        Ok(document.data.into())
    }

    async fn update_waf(
        &self,
        version: &ServiceVersion,
        waf_id: &str,
        waf: &WafInput,
    ) -> Result<WafRecord, ApiError> {
        let document: Document<WafResource> = self
            .execute_json(
                "update_waf",
                Method::PATCH,
                self.version_url(version, &["wafs", waf_id]),
                Body::JsonApi(waf_document(waf, Some(waf_id))),
            )
            .await?;
        Ok(document.data.into())
    }

    async fn delete_waf(&self, version: &ServiceVersion, waf_id: &str) -> Result<(), ApiError> {
        self.execute(
            "delete_waf",
            Method::DELETE,
            self.version_url(version, &["wafs", waf_id]),
            Body::Empty,
        )
        .await
        .map(drop)
    }

    async fn get_package(&self, version: &ServiceVersion) -> Result<PackageMetadata, ApiError> {
        let response: PackageResponse = self
            .execute_json(
                "get_package",
                Method::GET,
                self.version_url(version, &["package"]),
                Body::Empty,
            )
            .await?;
        Ok(response.metadata)
    }

    async fn upload_package(
        &self,
        version: &ServiceVersion,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<PackageMetadata, ApiError> {
        let part = multipart::Part::bytes(contents).file_name(filename.to_string());
        let parts = multipart::Form::new().part("package", part);
        let response: PackageResponse = self
            .execute_json(
                "upload_package",
                Method::PUT,
                self.version_url(version, &["package"]),
                Body::Multipart(parts),
            )
            .await?;
        Ok(response.metadata)
    }
}
