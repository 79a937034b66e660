//! Subcommand handlers run against specification files on disk.

use std::path::{Path, PathBuf};

use modforge_cli::generate::{run_generate, GenerateArgs};
use modforge_cli::validate::{run_validate, ValidateArgs};
use modforge_pack::{archive, GeneratorConfig};

const CONTRACTS: &str = r#"
name: cli_contracts
models:
  - name: Contract
    fields:
      - name: value
        kind: decimal
        required: true
workflow:
  model: Contract
  states: [draft, approved]
  transitions:
    - from: draft
      to: approved
"#;

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

fn validate(spec: PathBuf) -> u8 {
    let args = ValidateArgs {
        spec,
        target: None,
        json: false,
    };
    run_validate(&args, &GeneratorConfig::default()).unwrap()
}

#[test]
fn validate_accepts_a_valid_specification() {
    let dir = tempfile::tempdir().unwrap();
    assert_eq!(validate(write(dir.path(), "contracts.yaml", CONTRACTS)), 0);
}

#[test]
fn validate_rejects_duplicate_models() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write(
        dir.path(),
        "dup.json",
        r#"{"name": "dup", "models": [{"name": "Contract"}, {"name": "Contract"}]}"#,
    );
    assert_eq!(validate(spec), 1);
}

#[test]
fn validate_rejects_unknown_field_kinds() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write(
        dir.path(),
        "bad.json",
        r#"{"name": "bad", "models": [{"name": "A", "fields": [{"name": "x", "kind": "money"}]}]}"#,
    );
    assert_eq!(validate(spec), 1);
}

#[test]
fn validate_extension_without_runtime_fails() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write(
        dir.path(),
        "ext.json",
        r#"{"name": "ext", "models": [{"name": "Partner", "extends": "res.partner"}]}"#,
    );
    assert_eq!(validate(spec), 1);
}

#[test]
fn validate_missing_file_is_an_error() {
    let args = ValidateArgs {
        spec: PathBuf::from("/definitely/missing.yaml"),
        target: None,
        json: false,
    };
    assert!(run_validate(&args, &GeneratorConfig::default()).is_err());
}

#[test]
fn generate_offline_writes_and_unpacks_the_archive() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write(dir.path(), "contracts.yaml", CONTRACTS);
    let out = dir.path().join("dist/cli_contracts.mfpkg");
    let tree = dir.path().join("build");
    let args = GenerateArgs {
        spec,
        out: Some(out.clone()),
        unpack: Some(tree.clone()),
        offline: true,
        target: None,
    };
    assert_eq!(run_generate(&args, &GeneratorConfig::default()).unwrap(), 0);

    let package = archive::read(&out).unwrap();
    assert_eq!(package.module, "cli_contracts");
    assert!(package.files.contains_key("models/contract.py"));
    assert!(tree.join("cli_contracts/manifest.json").is_file());
    assert!(tree.join("cli_contracts/security/ir.model.access.csv").is_file());
}

#[test]
fn generate_offline_extension_is_source_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let spec = write(
        dir.path(),
        "ext.json",
        r#"{"name": "cli_ext", "models": [{"name": "Partner", "extends": "res.partner"}]}"#,
    );
    let args = GenerateArgs {
        spec,
        out: Some(dir.path().join("cli_ext.mfpkg")),
        unpack: None,
        offline: true,
        target: None,
    };
    assert_eq!(run_generate(&args, &GeneratorConfig::default()).unwrap(), 1);
    assert!(!dir.path().join("cli_ext.mfpkg").exists());
}
