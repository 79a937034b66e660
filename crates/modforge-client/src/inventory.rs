//! # Model Inventory
//!
//! Read-only introspection of the entities the external runtime already has.
//!
//! [`InventoryProvider`] is the seam: [`crate::HttpRuntime`] talks to a live
//! runtime, [`StaticInventory`] serves a fixed catalogue, and
//! [`CachedInventory`] memoises either for one generation session.
//! [`load_context`] turns a provider into the synchronous
//! [`InventoryContext`] snapshot the validator and compilers read.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use modforge_spec::{
    EntityDescriptor, EntitySnapshot, FieldDescriptor, FieldKind, InventoryContext,
    ModuleSpecification, StateDescriptor,
};
use parking_lot::Mutex;

use crate::error::InventoryError;

/// Introspection of an external runtime's object model.
#[async_trait]
pub trait InventoryProvider: Send + Sync {
    /// Every entity visible in `namespace`.
    async fn list_entities(&self, namespace: &str) -> Result<Vec<EntityDescriptor>, InventoryError>;

    /// Fields of one entity.
    async fn list_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>, InventoryError>;

    /// Workflow states of one entity. Entities without a workflow have none.
    async fn list_workflow_states(&self, entity: &str) -> Result<Vec<StateDescriptor>, InventoryError>;
}

/// A fixed, in-memory catalogue.
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    entities: BTreeMap<String, EntitySnapshot>,
    unreachable: Option<String>,
}

impl StaticInventory {
    pub fn new(entities: impl IntoIterator<Item = EntitySnapshot>) -> Self {
        Self {
            entities: entities
                .into_iter()
                .map(|e| (e.descriptor.name.clone(), e))
                .collect(),
            unreachable: None,
        }
    }

    /// A provider whose every call fails with `SourceUnavailable`.
    pub fn unreachable(reason: impl Into<String>) -> Self {
        Self {
            entities: BTreeMap::new(),
            unreachable: Some(reason.into()),
        }
    }

    fn check_reachable(&self, endpoint: &str) -> Result<(), InventoryError> {
        match &self.unreachable {
            Some(reason) => Err(InventoryError::SourceUnavailable {
                endpoint: endpoint.to_string(),
                reason: reason.clone(),
            }),
            None => Ok(()),
        }
    }

    fn snapshot(&self, entity: &str) -> Result<&EntitySnapshot, InventoryError> {
        self.entities
            .get(entity)
            .ok_or_else(|| InventoryError::UnknownEntity {
                entity: entity.to_string(),
            })
    }
}

#[async_trait]
impl InventoryProvider for StaticInventory {
    async fn list_entities(&self, _namespace: &str) -> Result<Vec<EntityDescriptor>, InventoryError> {
        self.check_reachable("list_entities")?;
        Ok(self.entities.values().map(|e| e.descriptor.clone()).collect())
    }

    async fn list_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>, InventoryError> {
        self.check_reachable("list_fields")?;
        Ok(self.snapshot(entity)?.fields.clone())
    }

    async fn list_workflow_states(&self, entity: &str) -> Result<Vec<StateDescriptor>, InventoryError> {
        self.check_reachable("list_workflow_states")?;
        Ok(self.snapshot(entity)?.states.clone())
    }
}

/// Memoises a provider's successful answers for one generation session.
/// Failures are not cached.
pub struct CachedInventory<P> {
    inner: P,
    entities: Mutex<HashMap<String, Vec<EntityDescriptor>>>,
    fields: Mutex<HashMap<String, Vec<FieldDescriptor>>>,
    states: Mutex<HashMap<String, Vec<StateDescriptor>>>,
}

impl<P> CachedInventory<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            entities: Mutex::new(HashMap::new()),
            fields: Mutex::new(HashMap::new()),
            states: Mutex::new(HashMap::new()),
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

#[async_trait]
impl<P: InventoryProvider> InventoryProvider for CachedInventory<P> {
    async fn list_entities(&self, namespace: &str) -> Result<Vec<EntityDescriptor>, InventoryError> {
        let cached = self.entities.lock().get(namespace).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        let fresh = self.inner.list_entities(namespace).await?;
        self.entities.lock().insert(namespace.to_string(), fresh.clone());
        Ok(fresh)
    }

    async fn list_fields(&self, entity: &str) -> Result<Vec<FieldDescriptor>, InventoryError> {
        let cached = self.fields.lock().get(entity).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        let fresh = self.inner.list_fields(entity).await?;
        self.fields.lock().insert(entity.to_string(), fresh.clone());
        Ok(fresh)
    }

    async fn list_workflow_states(&self, entity: &str) -> Result<Vec<StateDescriptor>, InventoryError> {
        let cached = self.states.lock().get(entity).cloned();
        if let Some(hit) = cached {
            return Ok(hit);
        }
        let fresh = self.inner.list_workflow_states(entity).await?;
        self.states.lock().insert(entity.to_string(), fresh.clone());
        Ok(fresh)
    }
}

/// Entities a specification refers to without declaring them.
pub fn referenced_entities(spec: &ModuleSpecification) -> BTreeSet<String> {
    let mut out = BTreeSet::new();
    let mut note = |name: &str| {
        if spec.model(name).is_none() {
            out.insert(name.to_string());
        }
    };
    for model in &spec.models {
        if let Some(base) = &model.extends {
            note(base);
        }
        for field in model.fields.iter().filter(|f| f.kind == FieldKind::MultiReference) {
            if let Some(target) = &field.reference {
                note(target);
            }
        }
    }
    for rule in &spec.security.rules {
        note(&rule.model);
    }
    out
}

/// Snapshot the inventory for one generation session.
///
/// Lists the specification's namespace, then fetches fields and workflow
/// states for every existing entity the specification refers to. Any
/// provider failure yields an unavailable context rather than an error; the
/// validator decides whether that is fatal.
pub async fn load_context<P: InventoryProvider + ?Sized>(
    provider: &P,
    spec: &ModuleSpecification,
) -> InventoryContext {
    let namespace = spec.namespace.as_str();
    match snapshot_referenced(provider, spec).await {
        Ok(entities) => {
            tracing::debug!(namespace, entities = entities.len(), "inventory snapshot loaded");
            InventoryContext::available(namespace, entities)
        }
        Err(e) => {
            tracing::warn!(namespace, "model inventory unavailable: {e}");
            InventoryContext::unavailable(namespace, e.to_string())
        }
    }
}

async fn snapshot_referenced<P: InventoryProvider + ?Sized>(
    provider: &P,
    spec: &ModuleSpecification,
) -> Result<Vec<EntitySnapshot>, InventoryError> {
    let wanted = referenced_entities(spec);
    let mut out = Vec::new();
    for descriptor in provider.list_entities(&spec.namespace).await? {
        let (fields, states) = if wanted.contains(&descriptor.name) {
            (
                provider.list_fields(&descriptor.name).await?,
                provider.list_workflow_states(&descriptor.name).await?,
            )
        } else {
            (Vec::new(), Vec::new())
        };
        out.push(EntitySnapshot {
            descriptor,
            fields,
            states,
        });
    }
    Ok(out)
}
