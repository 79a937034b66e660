//! # Idempotent Generation
//!
//! The same specification always yields the same artifact tree and digest,
//! whether generated fresh, served from the registry, or generated from many
//! threads at once.

use std::sync::Arc;

use modforge_core::CancellationFlag;
use modforge_pack::{archive, Archive, GenerationError, Generator, GeneratorConfig, ModuleRegistry};
use modforge_spec::{InventoryContext, ModuleSpecification};
use proptest::prelude::*;
use serde_json::{json, Value};

fn spec(value: Value) -> ModuleSpecification {
    serde_json::from_value(value).unwrap()
}

fn generate(s: &ModuleSpecification) -> Arc<modforge_pack::GeneratedModule> {
    let registry = ModuleRegistry::new();
    Generator::with_registry(GeneratorConfig::default(), &registry)
        .generate(s, &InventoryContext::empty("default"), &CancellationFlag::new())
        .unwrap()
        .module
}

fn kind_strategy() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["text", "long-text", "integer", "decimal", "boolean", "date", "datetime", "binary"])
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn repeated_generation_yields_identical_digests(
        fields in prop::collection::btree_map("f_[a-z]{1,8}", kind_strategy(), 1..6),
        with_workflow in any::<bool>(),
    ) {
        let fields: Vec<Value> = fields.iter().map(|(name, kind)| json!({"name": name, "kind": kind})).collect();
        let mut doc = json!({"name": "ledger", "models": [{"name": "Entry", "fields": fields}]});
        if with_workflow {
            doc["workflow"] = json!({
                "model": "Entry",
                "states": ["open", "posted"],
                "transitions": [{"from": "open", "to": "posted", "trigger": "post"}]
            });
        }
        let s = spec(doc);

        let first = generate(&s);
        let second = generate(&s);
        prop_assert_eq!(&first.digest, &second.digest);
        prop_assert_eq!(archive::encode(&first).unwrap(), archive::encode(&second).unwrap());
        prop_assert!(first.verify().unwrap());
    }
}

#[test]
fn archive_bytes_decode_to_the_same_digest() {
    let s = spec(json!({"name": "ledger", "models": [{"name": "Entry"}]}));
    let module = generate(&s);
    let decoded = Archive::decode(&archive::encode(&module).unwrap()).unwrap();
    assert_eq!(decoded.digest, module.digest);
    assert_eq!(decoded.files, module.files);
}

#[test]
fn concurrent_requests_for_one_specification_agree() {
    let registry = Arc::new(ModuleRegistry::new());
    let s = Arc::new(spec(json!({"name": "ledger", "models": [{"name": "Entry"}]})));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let registry = Arc::clone(&registry);
            let s = Arc::clone(&s);
            std::thread::spawn(move || {
                Generator::with_registry(GeneratorConfig::default(), &registry)
                    .generate(&s, &InventoryContext::empty("default"), &CancellationFlag::new())
                    .map(|o| o.module.digest.clone())
            })
        })
        .collect();
    let digests: Vec<_> = handles.into_iter().map(|h| h.join().unwrap().unwrap()).collect();
    assert!(digests.windows(2).all(|w| w[0] == w[1]));
    assert_eq!(registry.len(), 1);
}

#[test]
fn concurrent_requests_for_different_specifications_under_one_name() {
    let registry = Arc::new(ModuleRegistry::new());
    let handles: Vec<_> = (0..6)
        .map(|i| {
            let registry = Arc::clone(&registry);
            std::thread::spawn(move || {
                let s = spec(json!({
                    "name": "ledger",
                    "description": format!("variant {}", i % 2),
                    "models": [{"name": "Entry"}]
                }));
                Generator::with_registry(GeneratorConfig::default(), &registry)
                    .generate(&s, &InventoryContext::empty("default"), &CancellationFlag::new())
                    .map(|o| o.module.manifest.summary.clone())
            })
        })
        .collect();
    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    let winners: Vec<&String> = results.iter().filter_map(|r| r.as_ref().ok()).collect();
    assert!(!winners.is_empty());
    assert!(winners.windows(2).all(|w| w[0] == w[1]), "only one variant may own the name");
    for err in results.iter().filter_map(|r| r.as_ref().err()) {
        assert!(matches!(err, GenerationError::Assembly(modforge_pack::AssemblyError::NameCollision { .. })));
    }
}
