//! # Inventory Snapshot
//!
//! Descriptors of entities already present in the external runtime, and the
//! [`InventoryContext`] snapshot the validator and schema compiler read from.
//!
//! The snapshot is taken once per generation session (see
//! `modforge_client::inventory::load_context`) so the compilation stages stay
//! synchronous and never perform I/O.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// An entity known to the external runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescriptor {
    /// Technical name, e.g. `res.partner`.
    pub name: String,
    #[serde(default)]
    pub label: String,
    /// Runtime module that declares the entity.
    #[serde(default)]
    pub module: Option<String>,
}

/// A field of an existing entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    pub name: String,
    /// Runtime type name (`char`, `many2many`, ...), passed through verbatim.
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub relation: Option<String>,
}

/// A workflow state of an existing entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDescriptor {
    pub name: String,
    #[serde(default)]
    pub label: String,
}

/// Everything known about one existing entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    pub descriptor: EntityDescriptor,
    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
    #[serde(default)]
    pub states: Vec<StateDescriptor>,
}

impl EntitySnapshot {
    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|f| f.name == name)
    }
}

/// Whether the inventory could be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Availability {
    Available,
    Unavailable { reason: String },
}

/// Read-only catalogue of existing entities for one generation session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryContext {
    namespace: String,
    availability: Availability,
    entities: BTreeMap<String, EntitySnapshot>,
}

impl InventoryContext {
    /// A reachable inventory holding `entities`.
    pub fn available(namespace: &str, entities: impl IntoIterator<Item = EntitySnapshot>) -> Self {
        Self {
            namespace: namespace.to_string(),
            availability: Availability::Available,
            entities: entities
                .into_iter()
                .map(|e| (e.descriptor.name.clone(), e))
                .collect(),
        }
    }

    /// An empty catalogue for a runtime that could not be reached.
    pub fn unavailable(namespace: &str, reason: impl Into<String>) -> Self {
        Self {
            namespace: namespace.to_string(),
            availability: Availability::Unavailable {
                reason: reason.into(),
            },
            entities: BTreeMap::new(),
        }
    }

    /// An empty, reachable catalogue. Used for offline generation of
    /// specifications that only declare new entities, and in tests.
    pub fn empty(namespace: &str) -> Self {
        Self::available(namespace, [])
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn availability(&self) -> &Availability {
        &self.availability
    }

    pub fn is_available(&self) -> bool {
        matches!(self.availability, Availability::Available)
    }

    /// The reason the runtime was unreachable, if it was.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.availability {
            Availability::Available => None,
            Availability::Unavailable { reason } => Some(reason),
        }
    }

    pub fn entity(&self, name: &str) -> Option<&EntitySnapshot> {
        self.entities.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entities.contains_key(name)
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntitySnapshot> {
        self.entities.values()
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
