//! # modforge-spec: Module Specifications
//!
//! The declarative input of the generator and everything needed to trust it:
//!
//! - [`model`]: the typed [`ModuleSpecification`] tree.
//! - [`load`]: JSON/YAML loading with a bundled structural schema.
//! - [`inventory`]: descriptors of existing runtime entities and the
//!   per-session [`InventoryContext`] snapshot.
//! - [`validate`]: the [`Validator`], producing an ordered
//!   [`ValidationReport`].
//!
//! A specification is never mutated once validation starts; later stages only
//! borrow it.

pub mod error;
pub mod inventory;
pub mod load;
pub mod model;
pub mod report;
pub mod validate;

pub use error::{SourceUnavailable, SpecError};
pub use inventory::{
    Availability, EntityDescriptor, EntitySnapshot, FieldDescriptor, InventoryContext,
    StateDescriptor,
};
pub use load::{decode_specification, load_specification, parse_document, DocumentFormat};
pub use model::{
    Choice, Digits, FieldKind, FieldSpec, MethodStub, ModelSpec, ModuleSpecification, Permission,
    RuleSpec, SecuritySpec, StateSpec, TransitionSpec, ViewKind, WorkflowSpec, STATUS_FIELD,
};
pub use report::{IssueCode, ValidationIssue, ValidationReport};
pub use validate::{validate, Validator};
