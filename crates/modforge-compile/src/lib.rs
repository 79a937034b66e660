//! # modforge-compile: Artifact Compilers
//!
//! The three compilers that run between validation and assembly:
//!
//! - [`schema`]: [`SchemaCompiler`] maps model specifications to typed
//!   [`CompiledSchema`]s, and [`python`] renders them as model sources.
//! - [`views`]: derives a [`ViewSet`] (form, list, search) per schema.
//! - [`security`]: compiles access rows and row-level rules into
//!   [`SecurityArtifacts`], filling coverage gaps with implicit read-only
//!   access.
//!
//! All compilers are pure functions of their inputs. Given the same
//! specification and inventory snapshot they produce the same bytes.

pub mod error;
pub mod python;
pub mod schema;
pub mod security;
pub mod text;
pub mod views;

pub use error::CompileError;
pub use schema::{
    CompiledSchema, DefaultValue, FieldDeclaration, FieldType, SchemaCompiler, SchemaMode,
};
pub use security::{AccessRow, RowRule, SecurityArtifacts, DEFAULT_ROLE};
pub use views::{ViewSet, EXTENSION_VIEW_PRIORITY};
