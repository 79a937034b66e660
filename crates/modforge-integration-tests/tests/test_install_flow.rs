//! # Install Flow
//!
//! Generated packages sent through the installer against a mock runtime:
//! transient failures are retried, partial installs are reported with the
//! ids the runtime created, and rejections carry the runtime's reason.

use std::time::Duration;

use modforge_client::{InstallError, InstallOutcome, Installer, RuntimeConnectionConfig};
use modforge_core::CancellationFlag;
use modforge_pack::{install_module, GeneratedModule, GenerationError, Generator, GeneratorConfig, ModuleRegistry};
use modforge_spec::{InventoryContext, ModuleSpecification};
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const INSTALL_PATH: &str = "/modforge/api/v1/modules/install";

fn module() -> std::sync::Arc<GeneratedModule> {
    let spec: ModuleSpecification = serde_json::from_value(json!({
        "name": "contracts",
        "models": [{"name": "Contract", "fields": [{"name": "value", "kind": "decimal", "required": true}]}]
    }))
    .unwrap();
    let registry = ModuleRegistry::new();
    Generator::with_registry(GeneratorConfig::default(), &registry)
        .generate(&spec, &InventoryContext::empty("default"), &CancellationFlag::new())
        .unwrap()
        .module
}

fn installer(server: &MockServer) -> Installer {
    let mut config = RuntimeConnectionConfig::new(server.uri().parse().unwrap(), "test-token");
    config.retry.base_delay = Duration::from_millis(1);
    Installer::new(&config).unwrap()
}

#[tokio::test]
async fn transient_unavailability_is_retried() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSTALL_PATH))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(INSTALL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "createdIds": [1, 2]})))
        .mount(&server)
        .await;

    let result = install_module(&installer(&server), &module()).await.unwrap();
    assert_eq!(result.outcome, InstallOutcome::Success);
    assert_eq!(result.created_ids, vec!["1", "2"]);
    assert_eq!(server.received_requests().await.unwrap().len(), 3);
}

#[tokio::test]
async fn exhausted_retries_surface_as_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSTALL_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(4)
        .mount(&server)
        .await;

    let err = install_module(&installer(&server), &module()).await.unwrap_err();
    assert!(matches!(err, GenerationError::Install(InstallError::Rejected { .. })));
}

#[tokio::test]
async fn partial_install_lists_created_ids() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSTALL_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false, "createdIds": [17], "error": "view contract_form failed to load"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let result = install_module(&installer(&server), &module()).await.unwrap();
    assert_eq!(result.outcome, InstallOutcome::Failure);
    assert_eq!(result.created_ids, vec!["17"]);
    assert_eq!(result.reason.as_deref(), Some("view contract_form failed to load"));
}

#[tokio::test]
async fn rejection_carries_the_runtime_reason() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(INSTALL_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "success": false, "error": "module contracts already installed"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = install_module(&installer(&server), &module()).await.unwrap_err();
    match err {
        GenerationError::Install(InstallError::Rejected { reason }) => {
            assert!(reason.contains("module contracts already installed"), "{reason}");
        }
        other => panic!("expected Rejected, got {other:?}"),
    }
}
