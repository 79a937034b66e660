//! Contract tests for the runtime HTTP client.
//!
//! ## Endpoints Tested
//!
//! | Method | Path | Test |
//! |--------|------|------|
//! | GET  | `/modforge/api/v1/entities` | `list_entities_*`, `load_context_*` |
//! | GET  | `/modforge/api/v1/entities/{entity}/fields` | `list_fields_*` |
//! | GET  | `/erp/modforge/api/v1/entities/...` | `list_fields_under_a_mounted_base_path` |
//! | GET  | `/modforge/api/v1/entities/{entity}/states` | `list_states_*` |
//! | POST | `/modforge/api/v1/modules/install` | `install_*` |

use modforge_client::{
    load_context, HttpRuntime, InstallError, InstallOutcome, Installer, InventoryError,
    InventoryProvider, RuntimeConnectionConfig,
};
use modforge_spec::ModuleSpecification;
use wiremock::matchers::{body_bytes, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config(server: &MockServer) -> RuntimeConnectionConfig {
    let mut cfg = RuntimeConnectionConfig::new(server.uri().parse().unwrap(), "test-token");
    cfg.retry.base_delay = std::time::Duration::from_millis(1);
    cfg
}

fn runtime(server: &MockServer) -> HttpRuntime {
    HttpRuntime::new(&config(server)).unwrap()
}

// ── GET /entities ─────────────────────────────────────────────────────

#[tokio::test]
async fn list_entities_sends_namespace_and_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities"))
        .and(query_param("namespace", "sales"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "res.partner", "label": "Contact", "module": "base"},
            {"name": "sale.order", "label": "Sales Order"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let entities = runtime(&server).list_entities("sales").await.unwrap();
    assert_eq!(entities.len(), 2);
    assert_eq!(entities[0].module.as_deref(), Some("base"));
    assert_eq!(entities[1].module, None);
}

#[tokio::test]
async fn list_entities_retries_gateway_errors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "res.partner"}
        ])))
        .mount(&server)
        .await;

    let entities = runtime(&server).list_entities("default").await.unwrap();
    assert_eq!(entities[0].name, "res.partner");
}

#[tokio::test]
async fn list_entities_persistent_gateway_error_is_unavailable() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities"))
        .respond_with(ResponseTemplate::new(502))
        .expect(4)
        .mount(&server)
        .await;

    let err = runtime(&server).list_entities("default").await.unwrap_err();
    assert!(matches!(err, InventoryError::SourceUnavailable { .. }));
}

#[tokio::test]
async fn list_entities_unauthorized_is_api_error_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad token"))
        .expect(1)
        .mount(&server)
        .await;

    let err = runtime(&server).list_entities("default").await.unwrap_err();
    match err {
        InventoryError::Api { status, body, .. } => {
            assert_eq!(status, 401);
            assert_eq!(body, "bad token");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn list_entities_unreachable_is_source_unavailable() {
    let mut cfg = RuntimeConnectionConfig::local(1, "t").unwrap();
    cfg.retry.max_retries = 1;
    let err = HttpRuntime::new(&cfg)
        .unwrap()
        .list_entities("default")
        .await
        .unwrap_err();
    assert!(matches!(err, InventoryError::SourceUnavailable { .. }));
}

// ── GET /entities/{entity}/fields and /states ─────────────────────────

#[tokio::test]
async fn list_fields_decodes_descriptors() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities/res.partner/fields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "name", "type": "char", "required": true},
            {"name": "category_id", "type": "many2many", "relation": "res.partner.category"}
        ])))
        .mount(&server)
        .await;

    let fields = runtime(&server).list_fields("res.partner").await.unwrap();
    assert_eq!(fields.len(), 2);
    assert!(fields[0].required);
    assert_eq!(fields[1].relation.as_deref(), Some("res.partner.category"));
}

#[tokio::test]
async fn list_fields_under_a_mounted_base_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/erp/modforge/api/v1/entities/res.partner/fields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "name", "type": "char"}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/erp/modforge/api/v1/entities/x%2Fy/states"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "draft"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = config(&server);
    cfg.base_url = format!("{}/erp", server.uri()).parse().unwrap();
    let runtime = HttpRuntime::new(&cfg).unwrap();
    let fields = runtime.list_fields("res.partner").await.unwrap();
    assert_eq!(fields[0].name, "name");
    let states = runtime.list_workflow_states("x/y").await.unwrap();
    assert_eq!(states[0].name, "draft");
}

#[tokio::test]
async fn list_fields_not_found_is_unknown_entity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities/res.ghost/fields"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let err = runtime(&server).list_fields("res.ghost").await.unwrap_err();
    assert!(matches!(err, InventoryError::UnknownEntity { entity } if entity == "res.ghost"));
}

#[tokio::test]
async fn list_states_not_found_is_empty() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities/res.partner/states"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    assert!(runtime(&server)
        .list_workflow_states("res.partner")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn load_context_reads_referenced_entities_only() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "res.partner"}, {"name": "res.users"}
        ])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities/res.partner/fields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            {"name": "name", "type": "char"}
        ])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities/res.partner/states"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/modforge/api/v1/entities/res.users/fields"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .expect(0)
        .mount(&server)
        .await;

    let spec: ModuleSpecification = serde_json::from_value(serde_json::json!({
        "name": "partners", "models": [{"name": "Partner", "extends": "res.partner"}]
    }))
    .unwrap();
    let ctx = load_context(&runtime(&server), &spec).await;
    assert!(ctx.is_available());
    assert!(ctx.entity("res.partner").unwrap().has_field("name"));
    assert!(ctx.contains("res.users"));
}

// ── POST /modules/install ─────────────────────────────────────────────

#[tokio::test]
async fn install_success_reports_created_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/modforge/api/v1/modules/install"))
        .and(header("x-modforge-module", "contracts"))
        .and(body_bytes(b"archive-bytes".to_vec()))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true, "createdIds": [41, 42]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let installer = Installer::new(&config(&server)).unwrap();
    let result = installer.install_package("contracts", b"archive-bytes").await.unwrap();
    assert_eq!(result.outcome, InstallOutcome::Success);
    assert_eq!(result.created_ids, vec!["41", "42"]);
    assert!(result.reason.is_none());
}

#[tokio::test]
async fn install_permission_failure_is_rejected_without_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/modforge/api/v1/modules/install"))
        .respond_with(ResponseTemplate::new(403).set_body_json(serde_json::json!({
            "success": false, "error": "access denied for module installation"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = Installer::new(&config(&server))
        .unwrap()
        .install_package("contracts", b"x")
        .await
        .unwrap_err();
    match err {
        InstallError::Rejected { reason } => assert_eq!(reason, "access denied for module installation"),
        other => panic!("expected Rejected, got {other:?}"),
    }
}

#[tokio::test]
async fn install_validation_failure_is_rejected_verbatim() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/modforge/api/v1/modules/install"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false, "createdIds": [], "error": "field `value` conflicts with an existing column"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = Installer::new(&config(&server))
        .unwrap()
        .install_package("contracts", b"x")
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Rejected { reason } if reason.contains("conflicts")));
}

#[tokio::test]
async fn install_partial_success_is_reported_not_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/modforge/api/v1/modules/install"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": false, "createdIds": [7], "error": "view install failed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = Installer::new(&config(&server))
        .unwrap()
        .install_package("contracts", b"x")
        .await
        .unwrap();
    assert_eq!(result.outcome, InstallOutcome::Failure);
    assert_eq!(result.created_ids, vec!["7"]);
    assert_eq!(result.reason.as_deref(), Some("view install failed"));
}

#[tokio::test]
async fn install_transient_failures_are_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/modforge/api/v1/modules/install"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/modforge/api/v1/modules/install"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "success": true, "createdIds": ["c1"]
        })))
        .mount(&server)
        .await;

    let result = Installer::new(&config(&server))
        .unwrap()
        .install_package("contracts", b"x")
        .await
        .unwrap();
    assert!(result.is_success());
}

#[tokio::test]
async fn install_exhausted_transients_surface_as_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/modforge/api/v1/modules/install"))
        .respond_with(ResponseTemplate::new(504))
        .expect(4)
        .mount(&server)
        .await;

    let err = Installer::new(&config(&server))
        .unwrap()
        .install_package("contracts", b"x")
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::Rejected { reason } if reason.contains("4 attempt")));
}

#[tokio::test]
async fn install_timeout_is_outcome_unknown_and_not_resent() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/modforge/api/v1/modules/install"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(std::time::Duration::from_millis(500))
                .set_body_json(serde_json::json!({"success": true})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut cfg = config(&server);
    cfg.timeout = std::time::Duration::from_millis(100);
    let err = Installer::new(&cfg)
        .unwrap()
        .install_package("contracts", b"x")
        .await
        .unwrap_err();
    assert!(matches!(err, InstallError::OutcomeUnknown { .. }));
}
