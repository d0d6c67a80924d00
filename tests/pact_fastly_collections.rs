//! Pact contract tests for Fastly versioned collections
//!
//! Covers the list/create/delete endpoints shared by every sub-resource,
//! plus the endpoints with their own shape: settings, firewalls and
//! compute packages.

mod common;

use common::init_rustls;
use fastly_service_controller::api::{
    Collection, FastlyClient, Form, ServiceApi, ServiceVersion, Settings,
};
use fastly_service_controller::handlers::backend::Backend;
use fastly_service_controller::handlers::logging::s3::S3Logging;
use pact_consumer::prelude::*;
use serde_json::json;
use std::time::Duration;

const CONSUMER: &str = "Fastly-Service-Controller";
const PROVIDER: &str = "Fastly-API";
const SERVICE_ID: &str = "SU1Z0isxPaozGVKXdv0eY";

fn client_for(base_url: &str) -> FastlyClient {
    FastlyClient::new(base_url, "test-token", Duration::from_secs(5))
        .expect("Failed to create client")
}

fn version() -> ServiceVersion {
    ServiceVersion::new(SERVICE_ID, 3)
}

#[tokio::test]
async fn test_fastly_list_backends_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("list backends of a version", "", |mut i| {
        i.given("version 3 of service SU1Z0isxPaozGVKXdv0eY has one backend");
        i.request
            .method("GET")
            .path(format!("/service/{SERVICE_ID}/version/3/backend"))
            .header("Fastly-Key", "test-token");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!([{
                "name": "origin",
                "address": "origin.example.com",
                "port": 443,
                "use_ssl": true,
                "ssl_check_cert": "1",
                "weight": "100",
                "auto_loadbalance": false,
                "healthcheck": null,
                "connect_timeout": 1000,
                "first_byte_timeout": 15000,
                "between_bytes_timeout": 10000,
                "max_conn": 200,
                "error_threshold": 0
            }]));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let records = client
        .list(&version(), Collection::Backend)
        .await
        .expect("Failed to list backends");
    let backends: Vec<Backend> = records.iter().map(Backend::from_record).collect();
    assert_eq!(backends.len(), 1);
    assert_eq!(backends[0].name, "origin");
    assert_eq!(backends[0].port, 443);
    assert!(backends[0].use_ssl);
    assert!(backends[0].ssl_check_cert);
    assert_eq!(backends[0].weight, 100);
    assert_eq!(backends[0].healthcheck, None);
}

#[tokio::test]
async fn test_fastly_create_domain_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("create a domain on a draft version", "", |mut i| {
        i.given("version 3 of service SU1Z0isxPaozGVKXdv0eY is a draft");
        i.request
            .method("POST")
            .path(format!("/service/{SERVICE_ID}/version/3/domain"))
            .header("Fastly-Key", "test-token")
            .header("content-type", "application/x-www-form-urlencoded");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "service_id": SERVICE_ID,
                "version": 3,
                "name": "www.example.com",
                "comment": ""
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let created = client
        .create(
            &version(),
            Collection::Domain,
            &Form::new().field("name", "www.example.com"),
        )
        .await
        .expect("Failed to create domain");
    assert_eq!(created.string("name"), "www.example.com");
    assert_eq!(created.opt_string("comment"), None);
}

#[tokio::test]
async fn test_fastly_delete_logging_endpoint_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder
        .interaction("delete an S3 logging endpoint", "", |mut i| {
            i.given("version 3 of service SU1Z0isxPaozGVKXdv0eY logs to S3 as access-logs");
            i.request
                .method("DELETE")
                .path(format!(
                    "/service/{SERVICE_ID}/version/3/logging/s3/access-logs"
                ))
                .header("Fastly-Key", "test-token");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(json!({ "status": "ok" }));
            i
        })
        .interaction("list S3 logging endpoints of a version", "", |mut i| {
            i.given("version 3 of service SU1Z0isxPaozGVKXdv0eY has no S3 logging");
            i.request
                .method("GET")
                .path(format!("/service/{SERVICE_ID}/version/3/logging/s3"))
                .header("Fastly-Key", "test-token");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(json!([]));
            i
        });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    client
        .delete(&version(), Collection::S3Logging, "access-logs")
        .await
        .expect("Failed to delete S3 logging");
    let remaining: Vec<S3Logging> = client
        .list(&version(), Collection::S3Logging)
        .await
        .expect("Failed to list S3 logging")
        .iter()
        .map(S3Logging::from_record)
        .collect::<anyhow::Result<_>>()
        .expect("Failed to decode S3 logging");
    assert!(remaining.is_empty());
}

#[tokio::test]
async fn test_fastly_settings_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder
        .interaction("get version settings", "", |mut i| {
            i.given("version 3 of service SU1Z0isxPaozGVKXdv0eY has a default host");
            i.request
                .method("GET")
                .path(format!("/service/{SERVICE_ID}/version/3/settings"))
                .header("Fastly-Key", "test-token");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "service_id": SERVICE_ID,
                    "version": 3,
                    "general.default_host": "origin.example.com",
                    "general.default_ttl": 3600
                }));
            i
        })
        .interaction("update version settings", "", |mut i| {
            i.given("version 3 of service SU1Z0isxPaozGVKXdv0eY is a draft");
            i.request
                .method("PUT")
                .path(format!("/service/{SERVICE_ID}/version/3/settings"))
                .header("Fastly-Key", "test-token");
            i.response
                .status(200)
                .header("content-type", "application/json")
                .json_body(json!({
                    "general.default_host": "origin.example.com",
                    "general.default_ttl": 60
                }));
            i
        });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let settings = client
        .get_settings(&version())
        .await
        .expect("Failed to get settings");
    assert_eq!(settings.default_host, "origin.example.com");
    assert_eq!(settings.default_ttl, 3600);

    client
        .update_settings(
            &version(),
            &Settings {
                default_ttl: 60,
                ..settings
            },
        )
        .await
        .expect("Failed to update settings");
}

#[tokio::test]
async fn test_fastly_list_wafs_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("list firewalls of a version", "", |mut i| {
        i.given("version 3 of service SU1Z0isxPaozGVKXdv0eY has a firewall");
        i.request
            .method("GET")
            .path(format!("/service/{SERVICE_ID}/version/3/wafs"))
            .header("Fastly-Key", "test-token");
        i.response
            .status(200)
            .header("content-type", "application/vnd.api+json")
            .json_body(json!({
                "data": [{
                    "id": "3Nbm0PTFc0Ip5LxqFdTNBZ",
                    "type": "waf",
                    "attributes": {
                        "response": "WAF_Response",
                        "prefetch_condition": ""
                    }
                }]
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let wafs = client
        .list_wafs(&version())
        .await
        .expect("Failed to list firewalls");
    assert_eq!(wafs.len(), 1);
    assert_eq!(wafs[0].id, "3Nbm0PTFc0Ip5LxqFdTNBZ");
    assert_eq!(wafs[0].response_object, "WAF_Response");
    assert_eq!(wafs[0].prefetch_condition, None);
}

#[tokio::test]
async fn test_fastly_package_contract() {
    init_rustls();
    let mut pact_builder = PactBuilder::new(CONSUMER, PROVIDER);

    pact_builder.interaction("get the compute package of a version", "", |mut i| {
        i.given("version 3 of service SU1Z0isxPaozGVKXdv0eY has a package");
        i.request
            .method("GET")
            .path(format!("/service/{SERVICE_ID}/version/3/package"))
            .header("Fastly-Key", "test-token");
        i.response
            .status(200)
            .header("content-type", "application/json")
            .json_body(json!({
                "service_id": SERVICE_ID,
                "version": 3,
                "metadata": {
                    "name": "edge-app",
                    "hashsum": "f2a1c3",
                    "size": "2048"
                }
            }));
        i
    });

    let mock_server = pact_builder.start_mock_server(None, None);
    let client = client_for(mock_server.url().as_str());

    let metadata = client
        .get_package(&version())
        .await
        .expect("Failed to get package");
    assert_eq!(metadata.hashsum, "f2a1c3");
    assert_eq!(metadata.size, 2048);
}
