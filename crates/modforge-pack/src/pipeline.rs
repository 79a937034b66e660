//! # Generation Pipeline
//!
//! ```text
//!   specification ──▶ validate ──▶ ┌ schemas   ┐ ──▶ inject status ──▶ ┌ views    ┐ ──▶ assemble
//!                                  └ workflows ┘                      └ security ┘
//! ```
//!
//! Validation runs once per request and stops everything on error. Schema
//! compilation and workflow synthesis are independent and run in parallel,
//! as do view synthesis and security compilation once the workflow status
//! fields have been injected. Every stage checks the [`CancellationFlag`]
//! between models; a cancelled or failed request yields no module at all.
//!
//! The module-name registry is consulted before any compilation. The claim
//! digest covers everything the output depends on: the specification, the
//! target namespace, the default role, the runtime dependencies and the
//! inventory snapshot. A repeated request is served from cache; a request
//! that differs in any of these under a taken name is rejected.

use std::path::Path;
use std::sync::Arc;

use modforge_client::{load_context, InventoryProvider};
use modforge_compile::{security, views, CompiledSchema, SchemaCompiler, DEFAULT_ROLE};
use modforge_core::{sha256_digest, CancellationFlag, CanonicalBytes, ContentDigest, ModuleName};
use modforge_spec::{EntitySnapshot, InventoryContext, ModuleSpecification, ValidationReport, Validator};
use modforge_state::{synthesize, StateMachineDefinition};
use serde::{Deserialize, Serialize};

use crate::error::{AssemblyError, GenerationError};
use crate::module::{assemble, ArtifactSet, GeneratedModule};
use crate::registry::{Claim, ModuleRegistry};

/// Generator settings, optionally loaded from YAML.
///
/// ```yaml
/// namespace: default
/// default_role: base.group_user
/// parallel: true
/// depends: [base]
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// Target namespace; overrides the specification's own when set.
    pub namespace: Option<String>,
    /// Role given implicit read-only access to uncovered models.
    pub default_role: String,
    /// Run independent compilation stages on the rayon pool.
    pub parallel: bool,
    /// Runtime modules every generated package depends on.
    pub depends: Vec<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            default_role: DEFAULT_ROLE.to_string(),
            parallel: true,
            depends: vec!["base".to_string()],
        }
    }
}

impl GeneratorConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(text)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, GenerationError> {
        let config_error = |reason: String| GenerationError::Config {
            path: path.display().to_string(),
            reason,
        };
        let text = std::fs::read_to_string(path).map_err(|e| config_error(e.to_string()))?;
        Self::from_yaml_str(&text).map_err(|e| config_error(e.to_string()))
    }

    /// The namespace a specification is generated into.
    pub fn namespace_for<'a>(&'a self, spec: &'a ModuleSpecification) -> &'a str {
        self.namespace.as_deref().unwrap_or(&spec.namespace)
    }
}

#[derive(Serialize)]
struct GenerationRequest<'a> {
    specification: ContentDigest,
    namespace: &'a str,
    default_role: &'a str,
    depends: &'a [String],
    inventory_available: bool,
    entities: Vec<&'a EntitySnapshot>,
}

/// A successful generation.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub module: Arc<GeneratedModule>,
    /// Warnings only; a report with errors never gets this far.
    pub report: ValidationReport,
    /// Served from the registry instead of being regenerated.
    pub cached: bool,
}

/// Runs the pipeline against one registry.
#[derive(Debug, Clone)]
pub struct Generator<'r> {
    config: GeneratorConfig,
    registry: &'r ModuleRegistry,
}

impl Generator<'static> {
    /// A generator using the process-wide registry.
    pub fn new(config: GeneratorConfig) -> Self {
        Self::with_registry(config, ModuleRegistry::global())
    }
}

impl<'r> Generator<'r> {
    pub fn with_registry(config: GeneratorConfig, registry: &'r ModuleRegistry) -> Self {
        Self { config, registry }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn registry(&self) -> &'r ModuleRegistry {
        self.registry
    }

    /// Load the inventory snapshot `spec` needs from `provider`, then generate.
    pub async fn generate_with<P>(
        &self,
        provider: &P,
        spec: &ModuleSpecification,
        cancel: &CancellationFlag,
    ) -> Result<GenerationOutcome, GenerationError>
    where
        P: InventoryProvider + ?Sized,
    {
        let mut scoped = spec.clone();
        scoped.namespace = self.config.namespace_for(spec).to_string();
        let inventory = load_context(provider, &scoped).await;
        self.generate(spec, &inventory, cancel)
    }

    /// Validate a specification against `inventory` and produce its module.
    pub fn generate(
        &self,
        spec: &ModuleSpecification,
        inventory: &InventoryContext,
        cancel: &CancellationFlag,
    ) -> Result<GenerationOutcome, GenerationError> {
        let report = Validator::new(inventory).validate(spec)?;
        if !report.is_valid() {
            tracing::warn!(module = %spec.name, errors = report.errors.len(), "specification rejected");
            return Err(GenerationError::Invalid(report));
        }
        for warning in &report.warnings {
            tracing::warn!(module = %spec.name, "{warning}");
        }
        tracing::info!(module = %spec.name, "specification validated");

        let module = ModuleName::parse(&spec.name).map_err(AssemblyError::from)?;
        let namespace = self.config.namespace_for(spec);
        let request_digest = self.request_digest(spec, namespace, inventory)?;

        if let Claim::Cached(module) = self.registry.claim(namespace, module.as_str(), &request_digest)? {
            tracing::info!(module = %module.name, digest = %module.digest.short(), "serving cached module");
            return Ok(GenerationOutcome {
                module,
                report,
                cached: true,
            });
        }

        let generated = match self.build(spec, &module, namespace, inventory, cancel) {
            Ok(generated) => Arc::new(generated),
            Err(err) => {
                self.registry.release(namespace, module.as_str());
                return Err(err);
            }
        };
        self.registry.store(namespace, &request_digest, Arc::clone(&generated));
        Ok(GenerationOutcome {
            module: generated,
            report,
            cached: false,
        })
    }

    /// Digest of every input that shapes the generated module. `parallel`
    /// only changes scheduling and is left out.
    fn request_digest(
        &self,
        spec: &ModuleSpecification,
        namespace: &str,
        inventory: &InventoryContext,
    ) -> Result<ContentDigest, AssemblyError> {
        let request = GenerationRequest {
            specification: spec.digest()?,
            namespace,
            default_role: &self.config.default_role,
            depends: &self.config.depends,
            inventory_available: inventory.is_available(),
            entities: inventory.entities().collect(),
        };
        Ok(sha256_digest(&CanonicalBytes::new(&request)?))
    }

    fn build(
        &self,
        spec: &ModuleSpecification,
        module: &ModuleName,
        namespace: &str,
        inventory: &InventoryContext,
        cancel: &CancellationFlag,
    ) -> Result<GeneratedModule, GenerationError> {
        let compiler = SchemaCompiler::new(spec, module, inventory);
        let compile_schemas = || compiler.compile_all(cancel);
        let synthesize_workflows = || synthesize_all(spec, cancel);

        let (schemas, machines) = if self.config.parallel {
            rayon::join(compile_schemas, synthesize_workflows)
        } else {
            (compile_schemas(), synthesize_workflows())
        };
        let (schemas, machines) = (schemas?, machines?);
        tracing::info!(module = %module, models = schemas.len(), workflows = machines.len(), "models compiled");

        let schemas = inject_status(schemas, &machines)?;
        cancel.check("view synthesis")?;

        let synthesize_views = || {
            schemas
                .iter()
                .map(|schema| {
                    cancel.check("view synthesis")?;
                    let machine = machines.iter().find(|m| m.model == schema.model);
                    Ok(views::synthesize(schema, machine))
                })
                .collect::<Result<Vec<_>, GenerationError>>()
        };
        let compile_security = || {
            security::compile(&spec.security, &schemas, inventory, &self.config.default_role)
                .map_err(GenerationError::from)
        };
        let (view_sets, security) = if self.config.parallel {
            rayon::join(synthesize_views, compile_security)
        } else {
            (synthesize_views(), compile_security())
        };
        let (view_sets, security) = (view_sets?, security?);

        cancel.check("assembly")?;
        let artifacts = ArtifactSet {
            schemas,
            views: view_sets,
            machines,
            security,
        };
        Ok(assemble(spec, module, namespace, &artifacts, inventory, &self.config.depends)?)
    }
}

fn synthesize_all(
    spec: &ModuleSpecification,
    cancel: &CancellationFlag,
) -> Result<Vec<StateMachineDefinition>, GenerationError> {
    spec.workflows
        .iter()
        .map(|workflow| {
            cancel.check("workflow synthesis")?;
            synthesize(workflow).map_err(GenerationError::from)
        })
        .collect()
}

fn inject_status(
    schemas: Vec<CompiledSchema>,
    machines: &[StateMachineDefinition],
) -> Result<Vec<CompiledSchema>, GenerationError> {
    schemas
        .into_iter()
        .map(|schema| match machines.iter().find(|m| m.model == schema.model) {
            Some(machine) => Ok(schema.with_status(&machine.status_field())?),
            None => Ok(schema),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = GeneratorConfig::default();
        assert_eq!(config.default_role, "base.group_user");
        assert!(config.parallel);
        assert_eq!(config.depends, vec!["base"]);
        assert!(config.namespace.is_none());
    }

    #[test]
    fn config_from_partial_yaml() {
        let config = GeneratorConfig::from_yaml_str("namespace: staging\nparallel: false\n").unwrap();
        assert_eq!(config.namespace.as_deref(), Some("staging"));
        assert!(!config.parallel);
        assert_eq!(config.default_role, DEFAULT_ROLE);
    }

    #[test]
    fn config_rejects_unknown_keys() {
        assert!(GeneratorConfig::from_yaml_str("namspace: typo\n").is_err());
    }

    #[test]
    fn config_file_errors_name_the_path() {
        let err = GeneratorConfig::from_yaml_file(Path::new("/definitely/missing.yaml")).unwrap_err();
        assert!(err.to_string().contains("/definitely/missing.yaml"));
    }
}
