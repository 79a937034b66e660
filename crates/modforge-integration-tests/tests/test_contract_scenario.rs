//! # Contract Scenario
//!
//! A single Contract model with a decimal value and a two-state workflow,
//! taken through every stage: validation, schema compilation, workflow
//! synthesis with status injection, view and security synthesis, assembly.

use modforge_compile::{FieldType, SchemaCompiler};
use modforge_core::{CancellationFlag, ModuleName};
use modforge_pack::{Generator, GeneratorConfig, ModuleRegistry};
use modforge_spec::{validate, InventoryContext, IssueCode, ModuleSpecification};
use serde_json::json;

fn contract() -> ModuleSpecification {
    serde_json::from_value(json!({
        "name": "contracts",
        "models": [{"name": "Contract", "fields": [{"name": "value", "kind": "decimal", "required": true}]}],
        "workflow": {
            "model": "Contract",
            "states": ["draft", "approved"],
            "transitions": [{"from": "draft", "to": "approved"}]
        }
    }))
    .unwrap()
}

#[test]
fn status_field_is_injected_with_the_declared_states() {
    let spec = contract();
    let module = ModuleName::parse(&spec.name).unwrap();
    let inventory = InventoryContext::empty("default");
    let schema = SchemaCompiler::new(&spec, &module, &inventory)
        .compile(&spec.models[0])
        .unwrap();
    assert!(!schema.has_status());

    let machine = modforge_state::synthesize(&spec.workflows[0]).unwrap();
    let schema = schema.with_status(&machine.status_field()).unwrap();
    let status = schema.field("status").unwrap();
    match &status.field_type {
        FieldType::Selection { choices } => {
            let values: Vec<&str> = choices.iter().map(|c| c.value.as_str()).collect();
            assert_eq!(values, vec!["draft", "approved"]);
        }
        other => panic!("status should be a selection, got {other:?}"),
    }
    assert!(status.required);
}

#[test]
fn generated_module_holds_the_contract_schema() {
    let registry = ModuleRegistry::new();
    let outcome = Generator::with_registry(GeneratorConfig::default(), &registry)
        .generate(&contract(), &InventoryContext::empty("default"), &CancellationFlag::new())
        .unwrap();
    let module = &outcome.module;

    assert_eq!(module.manifest.models.len(), 1);
    assert_eq!(module.manifest.models[0].technical, "contracts.contract");

    let source = module.file("models/contract.py").unwrap();
    assert!(source.contains("class Contract(models.Model):"));
    assert!(source.contains("    _name = 'contracts.contract'"));
    assert!(source.contains("    value = fields.Float(string='Value'"));
    assert!(source.contains("    status = fields.Selection([('draft', 'Draft'), ('approved', 'Approved')], string='Status', required=True, default='draft')"));

    let views = module.file("views/contract_views.xml").unwrap();
    assert!(views.contains("statusbar"));
    assert!(views.contains("action_approved"));
}

#[test]
fn two_models_named_contract_are_rejected() {
    let spec: ModuleSpecification = serde_json::from_value(json!({
        "name": "contracts",
        "models": [{"name": "Contract"}, {"name": "Contract"}]
    }))
    .unwrap();
    let report = validate(&spec, &InventoryContext::empty("default")).unwrap();
    assert!(!report.is_valid());
    assert!(report.has_error(IssueCode::DuplicateModel));
    assert!(report.errors.iter().any(|e| e.path.contains("Contract")));

    let registry = ModuleRegistry::new();
    let err = Generator::with_registry(GeneratorConfig::default(), &registry)
        .generate(&spec, &InventoryContext::empty("default"), &CancellationFlag::new())
        .unwrap_err();
    assert!(err.report().is_some());
    assert!(registry.is_empty());
}
