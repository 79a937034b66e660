//! Discovery-driven specifications: extend every entity the runtime reports
//! with a template set of fields.

use modforge_client::{InventoryError, InventoryProvider};
use modforge_compile::text::class_name;
use modforge_spec::{FieldKind, FieldSpec, ModelSpec, ModuleSpecification, SecuritySpec};
use serde::{Deserialize, Serialize};

/// Fields added to each discovered entity, and the identity of the module
/// that adds them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtensionTemplate {
    pub module: String,
    pub version: String,
    pub description: String,
    pub fields: Vec<FieldSpec>,
}

impl Default for ExtensionTemplate {
    fn default() -> Self {
        let mut reference = FieldSpec::new("x_modforge_ref", FieldKind::Text);
        reference.label = Some("External Reference".to_string());
        let mut notes = FieldSpec::new("x_modforge_notes", FieldKind::LongText);
        notes.label = Some("Notes".to_string());
        Self {
            module: "modforge_extensions".to_string(),
            version: "1.0".to_string(),
            description: "Standard fields on every discovered entity".to_string(),
            fields: vec![reference, notes],
        }
    }
}

/// Name of the extension model generated for `entity`.
pub fn extension_model_name(entity: &str) -> String {
    format!("{}Ext", class_name(entity))
}

/// Build a specification extending every entity in `namespace`.
///
/// Template fields an entity already has are skipped; an entity that already
/// has all of them gets no extension model.
pub async fn extend_all<P>(
    provider: &P,
    namespace: &str,
    template: &ExtensionTemplate,
) -> Result<ModuleSpecification, InventoryError>
where
    P: InventoryProvider + ?Sized,
{
    let mut entities = provider.list_entities(namespace).await?;
    entities.sort_by(|a, b| a.name.cmp(&b.name));

    let mut models = Vec::new();
    for entity in &entities {
        let existing = provider.list_fields(&entity.name).await?;
        let fields: Vec<FieldSpec> = template
            .fields
            .iter()
            .filter(|f| !existing.iter().any(|e| e.name == f.name))
            .cloned()
            .collect();
        if fields.is_empty() {
            tracing::debug!(entity = %entity.name, "entity already carries every template field");
            continue;
        }
        let label = if entity.label.is_empty() { &entity.name } else { &entity.label };
        models.push(ModelSpec {
            name: extension_model_name(&entity.name),
            extends: Some(entity.name.clone()),
            description: format!("{label} extension"),
            fields,
            methods: Vec::new(),
        });
    }
    tracing::info!(namespace, entities = entities.len(), extended = models.len(), "discovery complete");

    Ok(ModuleSpecification {
        name: template.module.clone(),
        version: template.version.clone(),
        description: template.description.clone(),
        namespace: namespace.to_string(),
        depends: Vec::new(),
        models,
        workflows: Vec::new(),
        security: SecuritySpec::default(),
    })
}
