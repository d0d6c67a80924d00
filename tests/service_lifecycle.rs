//! End-to-end lifecycle of one service against the in-memory Fastly:
//! create, update through cloned versions, refresh, import and delete,
//! plus the sub-resources with their own call sequences (directors, WAF,
//! main VCL, snippets).

mod common;

use common::FakeApi;
use fastly_service_controller::api::{Collection, ServiceVersion};
use fastly_service_controller::model::{ServiceConfig, ServiceState};
use fastly_service_controller::service::{PlanAction, ServiceReconciler};
use std::sync::Arc;
use std::time::Duration;

const CONFIG: &str = "\
name: demo
domain:
  - name: www.example.com
condition:
  - name: is_api
    statement: req.url ~ \"^/api\"
backend:
  - name: origin
    address: origin.example.com
    port: 443
    use_ssl: true
    request_condition: is_api
dictionary:
  - name: flags
";

fn config() -> ServiceConfig {
    ServiceConfig::from_yaml(CONFIG, "inline").expect("config")
}

fn setup() -> (Arc<FakeApi>, ServiceReconciler) {
    let api = Arc::new(FakeApi::new());
    let reconciler = ServiceReconciler::new(api.clone(), Duration::ZERO);
    (api, reconciler)
}

async fn created(api: &FakeApi, reconciler: &ServiceReconciler) -> ServiceState {
    let mut state = ServiceState::default();
    reconciler
        .apply(&mut state, &config())
        .await
        .expect("create");
    api.clear_calls();
    state
}

fn position(calls: &[String], call: &str) -> usize {
    calls
        .iter()
        .position(|c| c == call)
        .unwrap_or_else(|| panic!("missing call {call:?} in {calls:#?}"))
}

#[tokio::test]
async fn test_create_fills_and_activates_first_version() {
    let (api, reconciler) = setup();
    let mut state = ServiceState::default();

    reconciler
        .apply(&mut state, &config())
        .await
        .expect("apply");

    let id = state.id.clone().expect("service id");
    assert_eq!(state.active_version, 1);
    assert!(state.updated_at.is_some());

    let calls = api.calls();
    assert_eq!(calls[0], "create_service demo");
    assert!(!calls.iter().any(|c| c.starts_with("clone_version")));
    assert!(!calls.iter().any(|c| c.starts_with("update_service")));
    assert!(position(&calls, "update_settings 1") < position(&calls, "create condition is_api"));
    assert!(position(&calls, "create condition is_api") < position(&calls, "create backend origin"));
    assert!(position(&calls, "create backend origin") < position(&calls, "validate_version 1"));
    assert!(position(&calls, "validate_version 1") < position(&calls, "activate_version 1"));

    let backends = api.records(&ServiceVersion::new(id.as_str(), 1), Collection::Backend);
    assert_eq!(backends.len(), 1);
    assert_eq!(backends[0].string("port"), "443");
    assert_eq!(backends[0].string("use_ssl"), "1");
}

#[tokio::test]
async fn test_second_plan_after_apply_is_empty() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;

    let plan = reconciler.plan(&mut state, &config()).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");
    assert!(api.calls().is_empty());
}

#[tokio::test]
async fn test_change_goes_through_cloned_version() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;

    let mut desired = config();
    desired.backend[0].port = 8443;
    desired.version_comment = "move to 8443".to_string();
    reconciler
        .apply(&mut state, &desired)
        .await
        .expect("update");

    let calls = api.calls();
    assert_eq!(calls[0], "clone_version 1");
    assert_eq!(calls[1], "update_version_comment 2");
    assert!(position(&calls, "delete backend origin") < position(&calls, "create backend origin"));
    assert!(!calls.iter().any(|c| c.starts_with("create domain")));
    assert!(!calls.iter().any(|c| c.starts_with("update_settings")));
    assert_eq!(calls.last().map(String::as_str), Some("activate_version 2"));

    assert_eq!(state.active_version, 2);
    assert_eq!(state.config.backend[0].port, 8443);
    assert_eq!(state.config.version_comment, "move to 8443");

    // The previously active version is untouched
    let id = state.id.clone().expect("id");
    let old = api.records(&ServiceVersion::new(id.as_str(), 1), Collection::Backend);
    assert_eq!(old[0].string("port"), "443");
}

#[tokio::test]
async fn test_name_change_updates_service_without_new_version() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;

    let mut desired = config();
    desired.name = "demo-renamed".to_string();
    reconciler
        .apply(&mut state, &desired)
        .await
        .expect("update");

    assert_eq!(api.calls(), vec!["update_service demo-renamed"]);
    assert_eq!(state.config.name, "demo-renamed");
    assert_eq!(state.active_version, 1);
}

#[tokio::test]
async fn test_version_comment_only_edits_active_version() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;

    let mut desired = config();
    desired.version_comment = "annotated".to_string();
    reconciler
        .apply(&mut state, &desired)
        .await
        .expect("update");

    assert_eq!(api.calls(), vec!["update_version_comment 1"]);
    assert_eq!(state.config.version_comment, "annotated");
}

#[tokio::test]
async fn test_inactive_draft_leaves_active_version() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;

    let mut desired = config();
    desired.activate = false;
    desired.domain[0].name = "api.example.com".to_string();
    reconciler
        .apply(&mut state, &desired)
        .await
        .expect("update");

    let calls = api.calls();
    assert!(calls.contains(&"validate_version 2".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("activate_version")));
    assert_eq!(state.active_version, 1);

    let staged = state.staged.clone().expect("staged draft");
    assert_eq!(staged.number, 2);
    let plan = reconciler.plan(&mut state, &desired).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");
    assert_eq!(plan.staged_version, Some(2));
}

#[tokio::test]
async fn test_invalid_version_is_not_activated() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;
    api.with_state(|s| s.invalid_message = Some("Backend origin has no address".to_string()));

    let mut desired = config();
    desired.backend[0].address = String::new();
    let err = reconciler
        .apply(&mut state, &desired)
        .await
        .expect_err("invalid version");

    let id = state.id.clone().expect("id");
    assert_eq!(
        err.to_string(),
        format!("Invalid configuration for Fastly Service ({id}): Backend origin has no address")
    );
    assert!(!api.calls().iter().any(|c| c.starts_with("activate_version")));
    assert_eq!(state.active_version, 1);
}

#[tokio::test]
async fn test_block_missing_remotely_is_deleted_quietly() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;
    let id = state.id.clone().expect("id");

    // Someone removed the dictionary by hand; the recorded state still has it
    api.with_state(|s| {
        let service = s.services.get_mut(&id).expect("service");
        service
            .versions
            .get_mut(&1)
            .expect("version")
            .collections
            .remove(&Collection::Dictionary);
    });

    let mut desired = config();
    desired.dictionary.clear();
    reconciler
        .update(&mut state, &desired, false)
        .await
        .expect("404 on delete is tolerated");
    assert!(api.calls().contains(&"delete dictionary flags".to_string()));
    assert!(state.config.dictionary.is_empty());
}

#[tokio::test]
async fn test_refresh_of_vanished_service_clears_id() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;
    api.with_state(|s| s.services.clear());

    reconciler.read(&mut state).await.expect("read");
    assert_eq!(state.id, None);
    assert_eq!(state.active_version, 0);

    let plan = reconciler.plan(&mut state, &config()).await.expect("plan");
    assert_eq!(plan.action, PlanAction::Create);
}

#[tokio::test]
async fn test_refresh_picks_up_remote_drift() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;
    let id = state.id.clone().expect("id");

    api.with_state(|s| {
        let version = s
            .services
            .get_mut(&id)
            .and_then(|svc| svc.versions.get_mut(&1))
            .expect("version");
        version.settings.default_ttl = 60;
        version.collections.insert(Collection::Domain, Vec::new());
    });

    let plan = reconciler.plan(&mut state, &config()).await.expect("plan");
    let keys: Vec<_> = plan.blocks.iter().map(|b| b.key).collect();
    assert_eq!(keys, vec!["settings", "domain"]);
    assert_eq!(state.config.default_ttl, 60);
    assert!(state.config.domain.is_empty());
}

#[tokio::test]
async fn test_delete_requires_force_for_active_service() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;

    let err = reconciler.delete(&mut state).await.expect_err("active");
    assert!(format!("{err:#}").contains("Cannot delete an active service"));
    assert!(state.id.is_some());

    state.config.force_destroy = true;
    api.clear_calls();
    reconciler.delete(&mut state).await.expect("delete");
    assert_eq!(api.calls(), vec!["deactivate_version 1", "delete_service"]);
    assert_eq!(state.id, None);
}

#[tokio::test]
async fn test_delete_reports_surviving_service() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;
    state.config.force_destroy = true;
    api.with_state(|s| s.undeletable = true);

    let err = reconciler.delete(&mut state).await.expect_err("still found");
    let id = state.id.clone().expect("id");
    assert_eq!(
        err.to_string(),
        format!("Tried deleting Service ({id}), but was still found")
    );
}

#[tokio::test]
async fn test_import_reads_existing_service() {
    let (api, reconciler) = setup();
    let original = created(&api, &reconciler).await;
    let id = original.id.clone().expect("id");

    let imported = reconciler.import(&id).await.expect("import");
    assert_eq!(imported.active_version, 1);
    assert_eq!(imported.config.name, "demo");
    assert_eq!(imported.config.backend, original.config.backend);
    assert_eq!(imported.config.domain, original.config.domain);

    let err = reconciler.import("missing").await.expect_err("unknown id");
    assert_eq!(err.to_string(), "Service (missing) not found");
}

#[tokio::test]
async fn test_wasm_service_uploads_package_once() {
    let (api, reconciler) = setup();
    let dir = tempfile::tempdir().expect("tempdir");
    let package = dir.path().join("app.tar.gz");
    std::fs::write(&package, b"compiled wasm").expect("write package");

    let yaml = format!(
        "\
name: edge-app
kind: wasm
domain:
  - name: app.example.com
backend:
  - name: origin
    address: origin.example.com
package:
  filename: {}
",
        package.display()
    );
    let desired = ServiceConfig::from_yaml(&yaml, "inline").expect("config");

    let mut state = ServiceState::default();
    reconciler.apply(&mut state, &desired).await.expect("create");
    let calls = api.calls();
    assert!(calls.contains(&"upload_package app.tar.gz".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("update_settings")));

    let recorded = state.config.package.clone().expect("package");
    assert_eq!(recorded.source_code_size, Some(13));

    api.clear_calls();
    let plan = reconciler.plan(&mut state, &desired).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");

    std::fs::write(&package, b"rebuilt wasm!").expect("rewrite package");
    let plan = reconciler.plan(&mut state, &desired).await.expect("plan");
    assert_eq!(plan.blocks.len(), 1);
    assert_eq!(plan.blocks[0].key, "package");
}

fn with_blocks(extra: &str) -> ServiceConfig {
    ServiceConfig::from_yaml(&format!("{CONFIG}{extra}"), "inline").expect("config")
}

#[tokio::test]
async fn test_failed_create_keeps_service_id_for_retry() {
    let (api, reconciler) = setup();
    api.with_state(|s| s.invalid_message = Some("bad".to_string()));

    let mut state = ServiceState::default();
    let err = reconciler
        .apply(&mut state, &config())
        .await
        .expect_err("invalid first version");
    let id = state.id.clone().expect("id recorded before the failure");
    assert_eq!(
        err.to_string(),
        format!("Invalid configuration for Fastly Service ({id}): bad")
    );
    assert_eq!(state.active_version, 0);

    api.with_state(|s| s.invalid_message = None);
    api.clear_calls();
    reconciler
        .apply(&mut state, &config())
        .await
        .expect("retry");

    // Version 1 was already filled, it only needs to go live
    assert_eq!(api.calls(), vec!["validate_version 1", "activate_version 1"]);
    assert_eq!(state.id.as_deref(), Some(id.as_str()));
    assert_eq!(state.active_version, 1);
    assert_eq!(api.with_state(|s| s.services.len()), 1);

    let plan = reconciler.plan(&mut state, &config()).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");
}

#[tokio::test]
async fn test_apply_corrects_remote_drift() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;
    let id = state.id.clone().expect("id");

    api.with_state(|s| {
        s.services
            .get_mut(&id)
            .and_then(|svc| svc.versions.get_mut(&1))
            .expect("version")
            .collections
            .remove(&Collection::Domain);
    });

    reconciler
        .apply(&mut state, &config())
        .await
        .expect("apply");

    let calls = api.calls();
    assert_eq!(calls[0], "clone_version 1");
    assert!(calls.contains(&"create domain www.example.com".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("create backend")));
    assert_eq!(calls.last().map(String::as_str), Some("activate_version 2"));
    assert_eq!(
        api.records(&ServiceVersion::new(id.as_str(), 2), Collection::Domain)
            .len(),
        1
    );

    let plan = reconciler.plan(&mut state, &config()).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");
}

#[tokio::test]
async fn test_apply_recreates_vanished_service() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;
    let old_id = state.id.clone().expect("id");
    api.with_state(|s| s.services.clear());

    reconciler
        .apply(&mut state, &config())
        .await
        .expect("recreate");

    let new_id = state.id.clone().expect("new id");
    assert_ne!(new_id, old_id);
    assert_eq!(api.calls()[0], "create_service demo");
    assert_eq!(state.active_version, 1);
}

#[tokio::test]
async fn test_staged_draft_is_not_cloned_again() {
    let (api, reconciler) = setup();
    let mut state = created(&api, &reconciler).await;

    let mut desired = config();
    desired.activate = false;
    desired.domain[0].name = "api.example.com".to_string();
    for _ in 0..3 {
        reconciler
            .apply(&mut state, &desired)
            .await
            .expect("apply");
    }

    let clones: Vec<_> = api
        .calls()
        .into_iter()
        .filter(|c| c.starts_with("clone_version"))
        .collect();
    assert_eq!(clones, vec!["clone_version 1"]);
    assert_eq!(state.staged.as_ref().map(|s| s.number), Some(2));

    // Someone activates the draft in the console
    let id = state.id.clone().expect("id");
    api.with_state(|s| s.services.get_mut(&id).expect("service").active = 2);

    let plan = reconciler.plan(&mut state, &desired).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");
    assert_eq!(plan.staged_version, None);
    assert_eq!(state.staged, None);
    assert_eq!(state.active_version, 2);
    assert_eq!(state.config.domain[0].name, "api.example.com");
}

#[tokio::test]
async fn test_director_links_backends_after_create() {
    let (api, reconciler) = setup();
    let desired = with_blocks("director:\n  - name: pool\n    backends: [origin]\n");

    let mut state = ServiceState::default();
    reconciler.apply(&mut state, &desired).await.expect("create");

    let calls = api.calls();
    assert!(position(&calls, "create backend origin") < position(&calls, "create director pool"));
    assert!(
        position(&calls, "create director pool")
            < position(&calls, "create_director_backend pool origin")
    );
    assert_eq!(
        state.config.director[0].backends.iter().collect::<Vec<_>>(),
        vec!["origin"]
    );

    api.clear_calls();
    let plan = reconciler.plan(&mut state, &desired).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");
}

#[tokio::test]
async fn test_director_lookup_failure_fails_refresh() {
    let (api, reconciler) = setup();
    let desired = with_blocks("director:\n  - name: pool\n    backends: [origin]\n");
    let mut state = ServiceState::default();
    reconciler.apply(&mut state, &desired).await.expect("create");

    api.with_state(|s| s.director_backend_status = Some(503));
    let err = reconciler.read(&mut state).await.expect_err("503");
    assert!(
        format!("{err:#}").contains("Error looking up backend origin of director pool"),
        "{err:#}"
    );
    // The failed refresh leaves the recorded links alone
    assert_eq!(state.config.director[0].backends.len(), 1);
}

const WAF_BLOCKS: &str = "\
response_object:
  - name: blocked
    status: 403
    response: Forbidden
  - name: blocked-v2
    status: 403
    response: Forbidden
condition:
  - name: is_api
    statement: req.url ~ \"^/api\"
  - name: waf_prefetch
    statement: req.backend.is_origin
    type: PREFETCH
waf:
  response_object: blocked
  prefetch_condition: waf_prefetch
";

fn waf_config() -> ServiceConfig {
    let mut yaml = CONFIG.replace(
        "condition:\n  - name: is_api\n    statement: req.url ~ \"^/api\"\n",
        "",
    );
    yaml.push_str(WAF_BLOCKS);
    ServiceConfig::from_yaml(&yaml, "inline").expect("config")
}

fn recorded_waf_id(state: &ServiceState) -> String {
    state
        .config
        .waf
        .as_ref()
        .and_then(|w| w.waf_id.clone())
        .expect("recorded waf id")
}

#[tokio::test]
async fn test_waf_is_patched_in_place() {
    let (api, reconciler) = setup();
    let mut state = ServiceState::default();
    let desired = waf_config();
    reconciler.apply(&mut state, &desired).await.expect("create");

    let calls = api.calls();
    assert!(position(&calls, "create condition waf_prefetch") < position(&calls, "create_waf"));
    assert!(position(&calls, "create response_object blocked") < position(&calls, "create_waf"));
    let waf_id = recorded_waf_id(&state);

    let plan = reconciler.plan(&mut state, &desired).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");

    let mut changed = desired.clone();
    if let Some(waf) = changed.waf.as_mut() {
        waf.response_object = "blocked-v2".to_string();
    }
    api.clear_calls();
    reconciler.apply(&mut state, &changed).await.expect("update");

    let calls = api.calls();
    assert!(calls.contains(&format!("update_waf {waf_id}")));
    assert!(!calls.contains(&"create_waf".to_string()));
    assert_eq!(recorded_waf_id(&state), waf_id);
    let plan = reconciler.plan(&mut state, &changed).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");
}

#[tokio::test]
async fn test_waf_missing_from_draft_is_recreated() {
    let (api, reconciler) = setup();
    let mut state = ServiceState::default();
    let desired = waf_config();
    reconciler.apply(&mut state, &desired).await.expect("create");
    let id = state.id.clone().expect("id");
    let old_waf_id = recorded_waf_id(&state);

    // Gone from the active version, while the recorded state still has it
    api.with_state(|s| {
        s.services
            .get_mut(&id)
            .and_then(|svc| svc.versions.get_mut(&1))
            .expect("version")
            .wafs
            .clear();
    });

    let mut changed = desired.clone();
    if let Some(waf) = changed.waf.as_mut() {
        waf.response_object = "blocked-v2".to_string();
    }
    api.clear_calls();
    reconciler
        .update(&mut state, &changed, false)
        .await
        .expect("update");

    let calls = api.calls();
    assert!(calls.contains(&"create_waf".to_string()));
    assert!(!calls.iter().any(|c| c.starts_with("update_waf")));
    assert_ne!(recorded_waf_id(&state), old_waf_id);
}

#[tokio::test]
async fn test_removed_waf_is_deleted() {
    let (api, reconciler) = setup();
    let mut state = ServiceState::default();
    let desired = waf_config();
    reconciler.apply(&mut state, &desired).await.expect("create");
    let waf_id = recorded_waf_id(&state);

    let mut changed = desired.clone();
    changed.waf = None;
    api.clear_calls();
    reconciler.apply(&mut state, &changed).await.expect("update");

    assert!(api.calls().contains(&format!("delete_waf {waf_id}")));
    assert_eq!(state.config.waf, None);
    let plan = reconciler.plan(&mut state, &changed).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");
}

#[tokio::test]
async fn test_main_vcl_is_set_after_upload() {
    let (api, reconciler) = setup();
    let desired = with_blocks(
        "\
vcl:
  - name: main
    content: \"sub vcl_recv { #FASTLY recv }\"
    main: true
  - name: helpers
    content: \"sub helper { }\"
",
    );
    let mut state = ServiceState::default();
    reconciler.apply(&mut state, &desired).await.expect("create");

    let calls = api.calls();
    assert!(position(&calls, "create vcl main") < position(&calls, "set_main_vcl main"));
    assert!(position(&calls, "set_main_vcl main") < position(&calls, "validate_version 1"));
    assert!(!calls.contains(&"set_main_vcl helpers".to_string()));

    let main: Vec<_> = state
        .config
        .vcl
        .iter()
        .filter(|v| v.main)
        .map(|v| v.name.as_str())
        .collect();
    assert_eq!(main, vec!["main"]);

    let plan = reconciler.plan(&mut state, &desired).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");
}

#[tokio::test]
async fn test_snippets_and_dynamic_snippets_read_back_separately() {
    let (api, reconciler) = setup();
    let desired = with_blocks(
        "\
snippet:
  - name: recv-static
    type: recv
    priority: 100
    content: \"set req.http.X-Static = \\\"1\\\";\"
dynamicsnippet:
  - name: deny-list
    type: recv
    priority: 10
",
    );
    let mut state = ServiceState::default();
    reconciler.apply(&mut state, &desired).await.expect("create");

    let calls = api.calls();
    assert!(calls.contains(&"create snippet recv-static".to_string()));
    assert!(calls.contains(&"create snippet deny-list".to_string()));

    let static_names: Vec<_> = state.config.snippet.iter().map(|s| s.name.as_str()).collect();
    let dynamic_names: Vec<_> = state
        .config
        .dynamicsnippet
        .iter()
        .map(|s| s.name.as_str())
        .collect();
    assert_eq!(static_names, vec!["recv-static"]);
    assert_eq!(dynamic_names, vec!["deny-list"]);
    assert!(state.config.dynamicsnippet[0].snippet_id.is_some());

    api.clear_calls();
    let plan = reconciler.plan(&mut state, &desired).await.expect("plan");
    assert_eq!(plan.action, PlanAction::NoOp, "unexpected plan:\n{plan}");
}
