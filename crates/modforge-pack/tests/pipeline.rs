//! The generation pipeline end to end: validation, parallel compilation,
//! assembly, the registry cache, archives and installation.

use modforge_client::{InstallOutcome, Installer, RuntimeConnectionConfig, StaticInventory};
use modforge_compile::CompileError;
use modforge_core::CancellationFlag;
use modforge_pack::{
    archive, extend_all, install_module, Archive, AssemblyError, ExtensionTemplate, GenerationError,
    Generator, GeneratorConfig, ModuleRegistry,
};
use modforge_spec::{EntityDescriptor, EntitySnapshot, FieldDescriptor, InventoryContext, IssueCode, ModuleSpecification};
use modforge_state::WorkflowError;
use proptest::prelude::*;
use serde_json::{json, Value};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn spec(value: Value) -> ModuleSpecification {
    serde_json::from_value(value).unwrap()
}

fn contract_spec() -> ModuleSpecification {
    spec(json!({
        "name": "contracts",
        "models": [{"name": "Contract", "fields": [{"name": "value", "kind": "decimal", "required": true}]}],
        "workflow": {
            "model": "Contract",
            "states": ["draft", "approved"],
            "transitions": [{"from": "draft", "to": "approved"}]
        }
    }))
}

fn empty() -> InventoryContext {
    InventoryContext::empty("default")
}

fn partner() -> EntitySnapshot {
    EntitySnapshot {
        descriptor: EntityDescriptor {
            name: "res.partner".into(),
            label: "Contact".into(),
            module: Some("contacts".into()),
        },
        fields: vec![FieldDescriptor {
            name: "name".into(),
            field_type: "char".into(),
            required: true,
            relation: None,
        }],
        states: vec![],
    }
}

#[test]
fn contract_generates_a_complete_package() {
    let registry = ModuleRegistry::new();
    let generator = Generator::with_registry(GeneratorConfig::default(), &registry);
    let outcome = generator
        .generate(&contract_spec(), &empty(), &CancellationFlag::new())
        .unwrap();
    let module = &outcome.module;

    assert!(!outcome.cached);
    assert!(outcome.report.has_warning(IssueCode::ImplicitReadOnlyRule));
    assert_eq!(module.implicit_rules, vec!["Contract"]);
    assert!(module.verify().unwrap());

    let paths: Vec<&str> = module.paths().collect();
    assert_eq!(
        paths,
        vec![
            "__init__.py",
            "manifest.json",
            "models/__init__.py",
            "models/contract.py",
            "security/contracts_rules.xml",
            "security/ir.model.access.csv",
            "views/contract_views.xml",
            "workflows/contract_workflow.json",
        ]
    );
    assert_eq!(
        module.manifest.data,
        vec![
            "security/ir.model.access.csv",
            "security/contracts_rules.xml",
            "views/contract_views.xml"
        ]
    );
    assert_eq!(module.manifest.depends, vec!["base"]);

    let source = module.file("models/contract.py").unwrap();
    assert!(source.contains("status = fields.Selection([('draft', 'Draft'), ('approved', 'Approved')]"));
    assert!(source.contains("def action_approved(self):"));

    let workflow: Value = serde_json::from_str(module.file("workflows/contract_workflow.json").unwrap()).unwrap();
    assert_eq!(workflow["initial"], "draft");
}

#[test]
fn regenerating_the_same_specification_is_served_from_cache() {
    let registry = ModuleRegistry::new();
    let generator = Generator::with_registry(GeneratorConfig::default(), &registry);
    let first = generator.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap();
    let second = generator.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap();

    assert!(second.cached);
    assert!(std::sync::Arc::ptr_eq(&first.module, &second.module));

    let elsewhere = ModuleRegistry::new();
    let third = Generator::with_registry(GeneratorConfig::default(), &elsewhere)
        .generate(&contract_spec(), &empty(), &CancellationFlag::new())
        .unwrap();
    assert!(!third.cached);
    assert_eq!(third.module.digest, first.module.digest);
    assert_eq!(third.module.files, first.module.files);
}

#[test]
fn a_different_specification_under_a_taken_name_collides() {
    let registry = ModuleRegistry::new();
    let generator = Generator::with_registry(GeneratorConfig::default(), &registry);
    generator.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap();

    let mut changed = contract_spec();
    changed.description = "Signed agreements".into();
    let err = generator.generate(&changed, &empty(), &CancellationFlag::new()).unwrap_err();
    assert!(matches!(err, GenerationError::Assembly(AssemblyError::NameCollision { .. })));

    registry.release("default", "contracts");
    assert!(generator.generate(&changed, &empty(), &CancellationFlag::new()).is_ok());
}

#[test]
fn generator_settings_are_part_of_the_cache_key() {
    let registry = ModuleRegistry::new();
    let plain = Generator::with_registry(GeneratorConfig::default(), &registry);
    let with_mail = Generator::with_registry(
        GeneratorConfig {
            depends: vec!["base".into(), "mail".into()],
            ..GeneratorConfig::default()
        },
        &registry,
    );
    let sequential = Generator::with_registry(
        GeneratorConfig {
            parallel: false,
            ..GeneratorConfig::default()
        },
        &registry,
    );
    let first = plain.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap();
    assert_eq!(first.module.manifest.depends, vec!["base"]);

    let err = with_mail.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap_err();
    assert!(matches!(err, GenerationError::Assembly(AssemblyError::NameCollision { .. })));

    // Scheduling does not change the output.
    assert!(sequential.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap().cached);

    registry.release("default", "contracts");
    let second = with_mail.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap();
    assert!(!second.cached);
    assert_eq!(second.module.manifest.depends, vec!["base", "mail"]);
}

#[test]
fn default_role_and_inventory_are_part_of_the_cache_key() {
    let registry = ModuleRegistry::new();
    let generator = Generator::with_registry(GeneratorConfig::default(), &registry);
    let managers = Generator::with_registry(
        GeneratorConfig {
            default_role: "base.group_system".into(),
            ..GeneratorConfig::default()
        },
        &registry,
    );
    generator.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap();

    let err = managers.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap_err();
    assert!(matches!(err, GenerationError::Assembly(AssemblyError::NameCollision { .. })));

    let populated = InventoryContext::available("default", [partner()]);
    let err = generator.generate(&contract_spec(), &populated, &CancellationFlag::new()).unwrap_err();
    assert!(matches!(err, GenerationError::Assembly(AssemblyError::NameCollision { .. })));

    assert!(generator.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap().cached);
}

#[test]
fn namespace_override_separates_registrations() {
    let registry = ModuleRegistry::new();
    let default = Generator::with_registry(GeneratorConfig::default(), &registry);
    let staging = Generator::with_registry(
        GeneratorConfig {
            namespace: Some("staging".into()),
            ..GeneratorConfig::default()
        },
        &registry,
    );
    default.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap();

    let mut changed = contract_spec();
    changed.version = "2.0".into();
    let outcome = staging.generate(&changed, &empty(), &CancellationFlag::new()).unwrap();
    assert_eq!(outcome.module.namespace, "staging");
    assert_eq!(registry.len(), 2);
}

#[test]
fn invalid_specification_yields_the_report_and_nothing_else() {
    let registry = ModuleRegistry::new();
    let generator = Generator::with_registry(GeneratorConfig::default(), &registry);
    let duplicate = spec(json!({
        "name": "contracts",
        "models": [{"name": "Contract"}, {"name": "Contract"}]
    }));
    let err = generator.generate(&duplicate, &empty(), &CancellationFlag::new()).unwrap_err();
    let report = err.report().unwrap();
    assert!(report.has_error(IssueCode::DuplicateModel));
    assert!(registry.is_empty());
}

#[test]
fn ambiguous_transitions_stop_generation() {
    let registry = ModuleRegistry::new();
    let generator = Generator::with_registry(GeneratorConfig::default(), &registry);
    let ambiguous = spec(json!({
        "name": "contracts",
        "models": [{"name": "Contract"}],
        "workflow": {
            "model": "Contract",
            "states": ["draft", "approved", "rejected"],
            "transitions": [{"from": "draft", "to": "approved"}, {"from": "draft", "to": "rejected"}]
        }
    }));
    let err = generator.generate(&ambiguous, &empty(), &CancellationFlag::new()).unwrap_err();
    assert!(matches!(err, GenerationError::Workflow(WorkflowError::AmbiguousTransition { .. })));
    assert!(registry.is_empty(), "a failed generation must not hold the name");
}

#[test]
fn incomplete_choice_set_stops_generation() {
    let registry = ModuleRegistry::new();
    let generator = Generator::with_registry(GeneratorConfig::default(), &registry);
    let incomplete = spec(json!({
        "name": "contracts",
        "models": [{"name": "Party", "fields": [{"name": "role", "kind": "single-choice", "required": true}]}]
    }));
    let err = generator.generate(&incomplete, &empty(), &CancellationFlag::new()).unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Compile(CompileError::IncompleteChoiceSet { ref model, ref field })
            if model == "Party" && field == "role"
    ));
}

#[test]
fn cancelled_request_produces_no_module() {
    let registry = ModuleRegistry::new();
    let generator = Generator::with_registry(GeneratorConfig::default(), &registry);
    let cancel = CancellationFlag::new();
    cancel.cancel();
    let err = generator.generate(&contract_spec(), &empty(), &cancel).unwrap_err();
    assert!(matches!(
        err,
        GenerationError::Cancelled(_) | GenerationError::Compile(CompileError::Cancelled(_))
    ));
    assert!(registry.get("default", "contracts").is_none());

    let retry = generator.generate(&contract_spec(), &empty(), &CancellationFlag::new()).unwrap();
    assert!(!retry.cached);
}

#[tokio::test]
async fn extension_of_a_runtime_entity_depends_on_its_owner() {
    let registry = ModuleRegistry::new();
    let generator = Generator::with_registry(GeneratorConfig::default(), &registry);
    let provider = StaticInventory::new([partner()]);
    let extension = spec(json!({
        "name": "partner_tiers",
        "models": [
            {"name": "Tier", "fields": [{"name": "code", "kind": "text", "required": true}]},
            {"name": "Partner", "extends": "res.partner", "fields": [{"name": "x_tier", "kind": "text"}]}
        ],
        "security": {"rules": [{"model": "Tier", "role": "base.group_user", "permissions": ["read", "write", "create", "delete"]}]}
    }));
    let outcome = generator
        .generate_with(&provider, &extension, &CancellationFlag::new())
        .await
        .unwrap();
    let manifest = &outcome.module.manifest;

    assert_eq!(manifest.depends, vec!["base", "contacts"]);
    assert_eq!(manifest.extends.len(), 1);
    assert_eq!(manifest.extends[0].entity, "res.partner");
    assert_eq!(manifest.extends[0].owner.as_deref(), Some("contacts"));
    let partner = &manifest.models[manifest.load_position("Partner").unwrap()];
    assert!(partner.additive);
    assert!(outcome.module.implicit_rules.is_empty());

    let source = outcome.module.file("models/partner.py").unwrap();
    assert!(source.contains("_inherit = 'res.partner'"));
}

#[tokio::test]
async fn extension_with_unreachable_inventory_is_source_unavailable() {
    let registry = ModuleRegistry::new();
    let generator = Generator::with_registry(GeneratorConfig::default(), &registry);
    let provider = StaticInventory::unreachable("connection refused");
    let extension = spec(json!({
        "name": "partner_tiers",
        "models": [{"name": "Partner", "extends": "res.partner", "fields": [{"name": "x_tier", "kind": "text"}]}]
    }));
    let err = generator
        .generate_with(&provider, &extension, &CancellationFlag::new())
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::SourceUnavailable(_)));
}

#[tokio::test]
async fn discovered_specification_generates() {
    let provider = StaticInventory::new([partner()]);
    let discovered = extend_all(&provider, "default", &ExtensionTemplate::default()).await.unwrap();
    let registry = ModuleRegistry::new();
    let outcome = Generator::with_registry(GeneratorConfig::default(), &registry)
        .generate_with(&provider, &discovered, &CancellationFlag::new())
        .await
        .unwrap();
    assert_eq!(outcome.module.manifest.models[0].model, "ResPartnerExt");
    assert!(outcome.module.manifest.models[0].additive);
    assert!(outcome.module.manifest.depends.contains(&"contacts".to_string()));
}

#[test]
fn archives_round_trip_through_disk() {
    let registry = ModuleRegistry::new();
    let outcome = Generator::with_registry(GeneratorConfig::default(), &registry)
        .generate(&contract_spec(), &empty(), &CancellationFlag::new())
        .unwrap();
    let dir = tempfile::tempdir().unwrap();
    let file = dir.path().join("contracts.mfpkg");
    std::fs::write(&file, archive::encode(&outcome.module).unwrap()).unwrap();

    let decoded = archive::read(&file).unwrap();
    assert_eq!(decoded, Archive::from_module(&outcome.module));

    let root = decoded.unpack(&dir.path().join("out")).unwrap();
    let manifest = std::fs::read_to_string(root.join("manifest.json")).unwrap();
    assert_eq!(manifest, outcome.module.file("manifest.json").unwrap());
}

#[tokio::test]
async fn generated_module_installs() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/modforge/api/v1/modules/install"))
        .and(header("x-modforge-module", "contracts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true, "createdIds": [7]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let registry = ModuleRegistry::new();
    let outcome = Generator::with_registry(GeneratorConfig::default(), &registry)
        .generate(&contract_spec(), &empty(), &CancellationFlag::new())
        .unwrap();
    let mut config = RuntimeConnectionConfig::new(server.uri().parse().unwrap(), "test-token");
    config.retry.base_delay = std::time::Duration::from_millis(1);
    let installer = Installer::new(&config).unwrap();

    let result = install_module(&installer, &outcome.module).await.unwrap();
    assert_eq!(result.outcome, InstallOutcome::Success);
    assert_eq!(result.created_ids, vec!["7"]);
}

#[tokio::test]
async fn tampered_module_is_never_sent() {
    let server = MockServer::start().await;
    Mock::given(method("POST")).respond_with(ResponseTemplate::new(200)).expect(0).mount(&server).await;

    let registry = ModuleRegistry::new();
    let outcome = Generator::with_registry(GeneratorConfig::default(), &registry)
        .generate(&contract_spec(), &empty(), &CancellationFlag::new())
        .unwrap();
    let mut tampered = (*outcome.module).clone();
    tampered.files.insert("models/contract.py".into(), "# edited\n".into());

    let config = RuntimeConnectionConfig::new(server.uri().parse().unwrap(), "test-token");
    let err = install_module(&Installer::new(&config).unwrap(), &tampered).await.unwrap_err();
    assert!(matches!(err, GenerationError::Archive(_)));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn parallel_and_sequential_pipelines_agree(
        names in prop::collection::btree_set("f_[a-z0-9]{1,8}", 1..6),
    ) {
        let fields: Vec<Value> = names.iter().map(|n| json!({"name": n, "kind": "text"})).collect();
        let s = spec(json!({
            "name": "contracts",
            "models": [{"name": "Contract", "fields": fields}, {"name": "Line", "extends": "Contract"}]
        }));
        let sequential = GeneratorConfig { parallel: false, ..GeneratorConfig::default() };

        let (a, b) = (ModuleRegistry::new(), ModuleRegistry::new());
        let parallel = Generator::with_registry(GeneratorConfig::default(), &a)
            .generate(&s, &empty(), &CancellationFlag::new())
            .unwrap();
        let serial = Generator::with_registry(sequential, &b)
            .generate(&s, &empty(), &CancellationFlag::new())
            .unwrap();
        prop_assert_eq!(&parallel.module.digest, &serial.module.digest);
        prop_assert_eq!(&parallel.module.files, &serial.module.files);
    }
}
