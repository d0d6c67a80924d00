//! Common test utilities
//!
//! Provides the rustls setup shared by the Pact tests and an in-memory
//! Fastly account used by the lifecycle tests.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use async_trait::async_trait;
use fastly_service_controller::api::{
    ApiError, Collection, Form, PackageMetadata, Record, ServiceApi, ServiceDetail,
    ServiceSummary, ServiceVersion, Settings, Validation, VersionInfo, WafInput, WafRecord,
};
use fastly_service_controller::handlers::package::sha512_hex;
use fastly_service_controller::model::ServiceKind;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, Once};

static RUSTLS_INIT: Once = Once::new();

/// Initialize rustls crypto provider for tests
///
/// Uses a `Once` to ensure it's only called once across all tests.
pub fn init_rustls() {
    RUSTLS_INIT.call_once(|| {
        rustls::crypto::ring::default_provider()
            .install_default()
            .expect("Failed to install rustls crypto provider");
    });
}

// ============================================================================
// In-memory Fastly
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FakeVersion {
    pub comment: String,
    pub settings: Settings,
    pub collections: HashMap<Collection, Vec<Record>>,
    pub director_backends: BTreeSet<(String, String)>,
    pub wafs: Vec<WafRecord>,
    pub package: Option<PackageMetadata>,
}

#[derive(Debug, Clone, Default)]
pub struct FakeService {
    pub name: String,
    pub comment: String,
    pub kind: String,
    pub versions: BTreeMap<u32, FakeVersion>,
    pub active: u32,
}

impl FakeService {
    fn latest(&self) -> u32 {
        self.versions.keys().next_back().copied().unwrap_or(1)
    }
}

#[derive(Debug, Default)]
pub struct FakeState {
    pub services: BTreeMap<String, FakeService>,
    /// Every mutating call, in order, e.g. `create backend origin`
    pub calls: Vec<String>,
    /// When set, version validation fails with this message
    pub invalid_message: Option<String>,
    /// When set, deleted services stay listed
    pub undeletable: bool,
    /// When set, director backend lookups fail with this HTTP status
    pub director_backend_status: Option<u16>,
    next_id: u32,
}

/// Fastly account held in memory. Enforces the rules the reconciler relies
/// on: 404 for unknown names and ids, no deleting an active service.
#[derive(Debug, Default)]
pub struct FakeApi {
    state: Mutex<FakeState>,
}

fn not_found(what: impl Into<String>) -> ApiError {
    ApiError::Http {
        status: 404,
        message: what.into(),
    }
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut state = self.state.lock().expect("fake state lock");
        f(&mut state)
    }

    pub fn calls(&self) -> Vec<String> {
        self.with_state(|s| s.calls.clone())
    }

    pub fn clear_calls(&self) {
        self.with_state(|s| s.calls.clear());
    }

    pub fn service(&self, id: &str) -> Option<FakeService> {
        self.with_state(|s| s.services.get(id).cloned())
    }

    /// Records of `collection` on `version`
    pub fn records(&self, version: &ServiceVersion, collection: Collection) -> Vec<Record> {
        self.with_state(|s| {
            s.services
                .get(&version.service_id)
                .and_then(|svc| svc.versions.get(&version.number))
                .and_then(|v| v.collections.get(&collection).cloned())
                .unwrap_or_default()
        })
    }

    fn record_call(&self, call: String) {
        self.with_state(|s| s.calls.push(call));
    }

    fn on_version<R>(
        &self,
        version: &ServiceVersion,
        f: impl FnOnce(&mut FakeVersion) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        self.with_state(|s| {
            let service = s
                .services
                .get_mut(&version.service_id)
                .ok_or_else(|| not_found(format!("service {}", version.service_id)))?;
            let v = service
                .versions
                .get_mut(&version.number)
                .ok_or_else(|| not_found(format!("version {version}")))?;
            f(v)
        })
    }

    fn on_service<R>(
        &self,
        service_id: &str,
        f: impl FnOnce(&mut FakeService) -> Result<R, ApiError>,
    ) -> Result<R, ApiError> {
        self.with_state(|s| {
            let service = s
                .services
                .get_mut(service_id)
                .ok_or_else(|| not_found(format!("service {service_id}")))?;
            f(service)
        })
    }

    fn next_id(&self, prefix: &str) -> String {
        self.with_state(|s| {
            s.next_id += 1;
            format!("{prefix}{:04}", s.next_id)
        })
    }
}

#[async_trait]
impl ServiceApi for FakeApi {
    async fn list_services(&self) -> Result<Vec<ServiceSummary>, ApiError> {
        Ok(self.with_state(|s| {
            s.services
                .iter()
                .map(|(id, svc)| ServiceSummary {
                    id: id.clone(),
                    name: svc.name.clone(),
                    comment: svc.comment.clone(),
                })
                .collect()
        }))
    }

    async fn create_service(
        &self,
        name: &str,
        comment: &str,
        kind: ServiceKind,
    ) -> Result<ServiceSummary, ApiError> {
        self.record_call(format!("create_service {name}"));
        let id = self.next_id("SVC");
        let mut first = FakeVersion::default();
        first.settings.default_ttl = 3600;
        let service = FakeService {
            name: name.to_string(),
            comment: comment.to_string(),
            kind: kind.as_str().to_string(),
            versions: BTreeMap::from([(1, first)]),
            active: 0,
        };
        self.with_state(|s| s.services.insert(id.clone(), service));
        Ok(ServiceSummary {
            id,
            name: name.to_string(),
            comment: comment.to_string(),
        })
    }

    async fn update_service(
        &self,
        service_id: &str,
        name: &str,
        comment: &str,
    ) -> Result<(), ApiError> {
        self.record_call(format!("update_service {name}"));
        self.on_service(service_id, |svc| {
            svc.name = name.to_string();
            svc.comment = comment.to_string();
            Ok(())
        })
    }

    async fn delete_service(&self, service_id: &str) -> Result<(), ApiError> {
        self.record_call("delete_service".to_string());
        self.with_state(|s| {
            let service = s
                .services
                .get(service_id)
                .ok_or_else(|| not_found(format!("service {service_id}")))?;
            if service.active != 0 {
                return Err(ApiError::Http {
                    status: 400,
                    message: "Cannot delete an active service".to_string(),
                });
            }
            if !s.undeletable {
                s.services.remove(service_id);
            }
            Ok(())
        })
    }

    async fn service_details(&self, service_id: &str) -> Result<ServiceDetail, ApiError> {
        self.on_service(service_id, |svc| {
            let latest = svc.latest();
            let info = |number: u32| VersionInfo {
                number,
                comment: svc
                    .versions
                    .get(&number)
                    .map(|v| v.comment.clone())
                    .unwrap_or_default(),
                active: number == svc.active,
            };
            Ok(ServiceDetail {
                id: service_id.to_string(),
                name: svc.name.clone(),
                comment: svc.comment.clone(),
                kind: svc.kind.clone(),
                version: info(latest),
                active_version: (svc.active != 0).then(|| info(svc.active)),
            })
        })
    }

    async fn clone_version(&self, version: &ServiceVersion) -> Result<ServiceVersion, ApiError> {
        self.record_call(format!("clone_version {}", version.number));
        self.on_service(&version.service_id, |svc| {
            let source = svc
                .versions
                .get(&version.number)
                .cloned()
                .ok_or_else(|| not_found(format!("version {version}")))?;
            let number = svc.latest() + 1;
            svc.versions.insert(number, source);
            Ok(ServiceVersion::new(version.service_id.as_str(), number))
        })
    }

    async fn update_version_comment(
        &self,
        version: &ServiceVersion,
        comment: &str,
    ) -> Result<(), ApiError> {
        self.record_call(format!("update_version_comment {}", version.number));
        self.on_version(version, |v| {
            v.comment = comment.to_string();
            Ok(())
        })
    }

    async fn validate_version(&self, version: &ServiceVersion) -> Result<Validation, ApiError> {
        self.record_call(format!("validate_version {}", version.number));
        let invalid = self.with_state(|s| s.invalid_message.clone());
        Ok(match invalid {
            Some(msg) => Validation {
                status: "error".to_string(),
                msg,
                errors: Vec::new(),
            },
            None => Validation {
                status: "ok".to_string(),
                ..Validation::default()
            },
        })
    }

    async fn activate_version(&self, version: &ServiceVersion) -> Result<(), ApiError> {
        self.record_call(format!("activate_version {}", version.number));
        self.on_service(&version.service_id, |svc| {
            if !svc.versions.contains_key(&version.number) {
                return Err(not_found(format!("version {version}")));
            }
            svc.active = version.number;
            Ok(())
        })
    }

    async fn deactivate_version(&self, version: &ServiceVersion) -> Result<(), ApiError> {
        self.record_call(format!("deactivate_version {}", version.number));
        self.on_service(&version.service_id, |svc| {
            svc.active = 0;
            Ok(())
        })
    }

    async fn get_settings(&self, version: &ServiceVersion) -> Result<Settings, ApiError> {
        self.on_version(version, |v| Ok(v.settings.clone()))
    }

    async fn update_settings(
        &self,
        version: &ServiceVersion,
        settings: &Settings,
    ) -> Result<(), ApiError> {
        self.record_call(format!("update_settings {}", version.number));
        self.on_version(version, |v| {
            if !settings.default_host.is_empty() {
                v.settings.default_host.clone_from(&settings.default_host);
            }
            v.settings.default_ttl = settings.default_ttl;
            Ok(())
        })
    }

    async fn list(
        &self,
        version: &ServiceVersion,
        collection: Collection,
    ) -> Result<Vec<Record>, ApiError> {
        self.on_version(version, |v| {
            Ok(v.collections.get(&collection).cloned().unwrap_or_default())
        })
    }

    async fn create(
        &self,
        version: &ServiceVersion,
        collection: Collection,
        form: &Form,
    ) -> Result<Record, ApiError> {
        let name = form.get("name").unwrap_or_default().to_string();
        self.record_call(format!("create {} {}", collection.label(), name));
        let id = self.next_id("ID");
        self.on_version(version, |v| {
            let records = v.collections.entry(collection).or_default();
            if records.iter().any(|r| r.string("name") == name) {
                return Err(ApiError::Http {
                    status: 409,
                    message: format!("Duplicate {} {}", collection.label(), name),
                });
            }
            let record = form
                .pairs()
                .iter()
                .fold(Record::default(), |record, (key, value)| {
                    record.with(key, value.as_str())
                })
                .with("id", id.as_str());
            records.push(record.clone());
            Ok(record)
        })
    }

    async fn delete(
        &self,
        version: &ServiceVersion,
        collection: Collection,
        name: &str,
    ) -> Result<(), ApiError> {
        self.record_call(format!("delete {} {}", collection.label(), name));
        self.on_version(version, |v| {
            let records = v.collections.entry(collection).or_default();
            let before = records.len();
            records.retain(|r| r.string("name") != name);
            if records.len() == before {
                return Err(not_found(format!("{} {}", collection.label(), name)));
            }
            Ok(())
        })
    }

    async fn set_main_vcl(&self, version: &ServiceVersion, name: &str) -> Result<(), ApiError> {
        self.record_call(format!("set_main_vcl {name}"));
        self.on_version(version, |v| {
            let records = v.collections.entry(Collection::Vcl).or_default();
            let mut found = false;
            for record in records.iter_mut() {
                let is_main = record.string("name") == name;
                found |= is_main;
                *record = record.clone().with("main", is_main);
            }
            if found {
                Ok(())
            } else {
                Err(not_found(format!("vcl {name}")))
            }
        })
    }

    async fn create_director_backend(
        &self,
        version: &ServiceVersion,
        director: &str,
        backend: &str,
    ) -> Result<(), ApiError> {
        self.record_call(format!("create_director_backend {director} {backend}"));
        self.on_version(version, |v| {
            v.director_backends
                .insert((director.to_string(), backend.to_string()));
            Ok(())
        })
    }

    async fn get_director_backend(
        &self,
        version: &ServiceVersion,
        director: &str,
        backend: &str,
    ) -> Result<(), ApiError> {
        if let Some(status) = self.with_state(|s| s.director_backend_status) {
            return Err(ApiError::Http {
                status,
                message: "Service Unavailable".to_string(),
            });
        }
        self.on_version(version, |v| {
            if v.director_backends
                .contains(&(director.to_string(), backend.to_string()))
            {
                Ok(())
            } else {
                Err(not_found(format!("director backend {director}/{backend}")))
            }
        })
    }

    async fn list_wafs(&self, version: &ServiceVersion) -> Result<Vec<WafRecord>, ApiError> {
        self.on_version(version, |v| Ok(v.wafs.clone()))
    }

    async fn get_waf(
        &self,
        version: &ServiceVersion,
        waf_id: &str,
    ) -> Result<WafRecord, ApiError> {
        self.on_version(version, |v| {
            v.wafs
                .iter()
                .find(|w| w.id == waf_id)
                .cloned()
                .ok_or_else(|| not_found(format!("waf {waf_id}")))
        })
    }

    async fn create_waf(
        &self,
        version: &ServiceVersion,
        waf: &WafInput,
    ) -> Result<WafRecord, ApiError> {
        self.record_call("create_waf".to_string());
        let id = self.next_id("WAF");
        self.on_version(version, |v| {
            let record = WafRecord {
                id,
                response_object: waf.response_object.clone(),
                prefetch_condition: waf.prefetch_condition.clone(),
            };
            v.wafs.push(record.clone());
            Ok(record)
        })
    }

    async fn update_waf(
        &self,
        version: &ServiceVersion,
        waf_id: &str,
        waf: &WafInput,
    ) -> Result<WafRecord, ApiError> {
        self.record_call(format!("update_waf {waf_id}"));
        self.on_version(version, |v| {
            let record = v
                .wafs
                .iter_mut()
                .find(|w| w.id == waf_id)
                .ok_or_else(|| not_found(format!("waf {waf_id}")))?;
            record.response_object.clone_from(&waf.response_object);
            record.prefetch_condition.clone_from(&waf.prefetch_condition);
            Ok(record.clone())
        })
    }

    async fn delete_waf(&self, version: &ServiceVersion, waf_id: &str) -> Result<(), ApiError> {
        self.record_call(format!("delete_waf {waf_id}"));
        self.on_version(version, |v| {
            let before = v.wafs.len();
            v.wafs.retain(|w| w.id != waf_id);
            if v.wafs.len() == before {
                return Err(not_found(format!("waf {waf_id}")));
            }
            Ok(())
        })
    }

    async fn get_package(&self, version: &ServiceVersion) -> Result<PackageMetadata, ApiError> {
        self.on_version(version, |v| {
            v.package
                .clone()
                .ok_or_else(|| not_found(format!("package on {version}")))
        })
    }

    async fn upload_package(
        &self,
        version: &ServiceVersion,
        filename: &str,
        contents: Vec<u8>,
    ) -> Result<PackageMetadata, ApiError> {
        self.record_call(format!("upload_package {filename}"));
        let metadata = PackageMetadata {
            hashsum: sha512_hex(&contents),
            size: contents.len() as u64,
        };
        self.on_version(version, |v| {
            v.package = Some(metadata.clone());
            Ok(metadata)
        })
    }
}
