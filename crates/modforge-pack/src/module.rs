//! # Module Assembler
//!
//! Composes compiled schemas, view sets, state machines and security
//! artifacts into one immutable [`GeneratedModule`]: a map from package-
//! relative path to file content, plus the manifest and a content digest.
//!
//! ## Content addressing
//!
//! The digest is SHA-256 over the RFC 8785 canonical JSON of the path to
//! content map. It covers exactly what would be installed, so two
//! specifications that produce identical files produce the same digest.

use std::collections::BTreeMap;

use modforge_compile::{python, CompiledSchema, SchemaMode, SecurityArtifacts, ViewSet};
use modforge_core::{sha256_digest, CanonicalBytes, CanonicalizationError, ContentDigest, ModuleName};
use modforge_spec::{InventoryContext, ModuleSpecification};
use modforge_state::StateMachineDefinition;
use serde::Serialize;

use crate::error::AssemblyError;
use crate::graph::ModelGraph;
use crate::manifest::{push_unique, ExternalExtension, Manifest, ManifestModel};

pub const MANIFEST_PATH: &str = "manifest.json";
pub const ACCESS_CSV_PATH: &str = "security/ir.model.access.csv";

/// Everything the compilers produced for one specification.
#[derive(Debug, Clone, Default)]
pub struct ArtifactSet {
    /// Status fields already injected for workflow-controlled models.
    pub schemas: Vec<CompiledSchema>,
    pub views: Vec<ViewSet>,
    pub machines: Vec<StateMachineDefinition>,
    pub security: SecurityArtifacts,
}

/// A generated package. Never mutated after assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GeneratedModule {
    pub name: ModuleName,
    pub namespace: String,
    pub version: String,
    pub manifest: Manifest,
    /// Package-relative path to file content.
    pub files: BTreeMap<String, String>,
    pub digest: ContentDigest,
    /// Models that received the implicit read-only access rule.
    pub implicit_rules: Vec<String>,
}

impl GeneratedModule {
    pub fn file(&self, path: &str) -> Option<&str> {
        self.files.get(path).map(String::as_str)
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    /// Recompute the digest and compare it with the recorded one.
    pub fn verify(&self) -> Result<bool, CanonicalizationError> {
        Ok(tree_digest(&self.files)? == self.digest)
    }
}

/// Digest of a file tree.
pub fn tree_digest(files: &BTreeMap<String, String>) -> Result<ContentDigest, CanonicalizationError> {
    Ok(sha256_digest(&CanonicalBytes::new(files)?))
}

pub fn model_source_path(stem: &str) -> String {
    format!("models/{stem}.py")
}

pub fn view_path(stem: &str) -> String {
    format!("views/{stem}_views.xml")
}

pub fn workflow_path(stem: &str) -> String {
    format!("workflows/{stem}_workflow.json")
}

pub fn rules_path(module: &ModuleName) -> String {
    format!("security/{module}_rules.xml")
}

/// Assemble `artifacts` into a package.
///
/// `default_depends` are written to the manifest ahead of the
/// specification's own `depends` and the owners of extended entities.
pub fn assemble(
    spec: &ModuleSpecification,
    module: &ModuleName,
    namespace: &str,
    artifacts: &ArtifactSet,
    inventory: &InventoryContext,
    default_depends: &[String],
) -> Result<GeneratedModule, AssemblyError> {
    let ordered = ModelGraph::new(&spec.models).sorted()?;

    let mut files: BTreeMap<String, String> = BTreeMap::new();
    let mut insert = |path: String, content: String| -> Result<(), AssemblyError> {
        if files.insert(path.clone(), content).is_some() {
            return Err(AssemblyError::DuplicatePath { path });
        }
        Ok(())
    };

    let mut models = Vec::with_capacity(ordered.len());
    let mut extends = Vec::new();
    let mut view_files = Vec::new();
    let mut workflow_files = Vec::new();
    let mut depends: Vec<String> = Vec::new();
    push_unique(&mut depends, default_depends.iter().cloned());
    push_unique(&mut depends, spec.depends.iter().cloned());

    for model in &ordered {
        let schema = artifacts
            .schemas
            .iter()
            .find(|s| s.model == model.name)
            .ok_or_else(|| AssemblyError::MissingArtifact {
                model: model.name.clone(),
                artifact: "compiled schema",
            })?;
        let views = artifacts
            .views
            .iter()
            .find(|v| v.model == model.name)
            .ok_or_else(|| AssemblyError::MissingArtifact {
                model: model.name.clone(),
                artifact: "view set",
            })?;
        let machine = artifacts.machines.iter().find(|m| m.model == model.name);
        if machine.is_some() && !schema.has_status() {
            return Err(AssemblyError::MissingArtifact {
                model: model.name.clone(),
                artifact: "status field",
            });
        }

        let source = model_source_path(&schema.file_stem);
        insert(source.clone(), python::render_model(schema, machine))?;
        let view_file = view_path(&schema.file_stem);
        insert(view_file.clone(), views.render_xml())?;
        view_files.push(view_file);
        if let Some(machine) = machine {
            let mut json = serde_json::to_string_pretty(machine).map_err(CanonicalizationError::from)?;
            json.push('\n');
            let path = workflow_path(&schema.file_stem);
            insert(path.clone(), json)?;
            workflow_files.push(path);
        }

        if let SchemaMode::Extension { base } = &schema.mode {
            if spec.model(base_logical(model)).is_none() {
                let owner = inventory
                    .entity(base.as_str())
                    .and_then(|e| e.descriptor.module.clone())
                    .filter(|owner| owner != module.as_str());
                push_unique(&mut depends, owner.iter().cloned());
                extends.push(ExternalExtension {
                    model: model.name.clone(),
                    entity: base.to_string(),
                    owner,
                });
            }
        }

        models.push(ManifestModel {
            model: model.name.clone(),
            technical: schema.technical.to_string(),
            source,
            additive: schema.is_extension(),
        });
    }

    let mut data = Vec::new();
    if !artifacts.security.access.is_empty() {
        insert(ACCESS_CSV_PATH.to_string(), artifacts.security.render_access_csv())?;
        data.push(ACCESS_CSV_PATH.to_string());
    }
    if artifacts.security.has_rules() {
        let path = rules_path(module);
        insert(path.clone(), artifacts.security.render_rules_xml())?;
        data.push(path);
    }
    data.extend(view_files);

    let stems: Vec<&str> = ordered
        .iter()
        .filter_map(|m| artifacts.schemas.iter().find(|s| s.model == m.name))
        .map(|s| s.file_stem.as_str())
        .collect();
    insert("models/__init__.py".to_string(), python::render_models_init(stems))?;
    insert("__init__.py".to_string(), python::render_package_init())?;

    let manifest = Manifest {
        name: module.to_string(),
        version: spec.version.clone(),
        summary: spec.description.clone(),
        namespace: namespace.to_string(),
        depends,
        models,
        extends,
        data,
        workflows: workflow_files,
        installable: true,
    };
    insert(
        MANIFEST_PATH.to_string(),
        manifest.render().map_err(CanonicalizationError::from)?,
    )?;

    let digest = tree_digest(&files)?;
    tracing::info!(
        module = %module,
        files = files.len(),
        digest = %digest.short(),
        "module assembled"
    );

    Ok(GeneratedModule {
        name: module.clone(),
        namespace: namespace.to_string(),
        version: spec.version.clone(),
        manifest,
        files,
        digest,
        implicit_rules: artifacts.security.implicit.clone(),
    })
}

fn base_logical(model: &modforge_spec::ModelSpec) -> &str {
    model.extends.as_deref().unwrap_or_default()
}
