//! # modforge-pack: Module Assembly and Generation
//!
//! Turns a validated specification into an installable package and owns the
//! state shared across generation requests.
//!
//! - [`graph`]: load order of models, by `extends`, via Kahn's algorithm.
//! - [`module`]: [`assemble`] composes compiled artifacts into an immutable
//!   [`GeneratedModule`] with a content digest.
//! - [`manifest`]: the package manifest.
//! - [`archive`]: the single-file, digest-verified package encoding.
//! - [`registry`]: the module-name registry and generation cache.
//! - [`pipeline`]: [`Generator`] runs validation, compilation and assembly,
//!   with parallel stages and cooperative cancellation.
//! - [`discover`]: builds specifications from the runtime inventory.
//! - [`install`]: sends a generated module to the runtime.

pub mod archive;
pub mod discover;
pub mod error;
pub mod graph;
pub mod install;
pub mod manifest;
pub mod module;
pub mod pipeline;
pub mod registry;

pub use archive::{Archive, ARCHIVE_EXTENSION, ARCHIVE_FORMAT};
pub use discover::{extend_all, ExtensionTemplate};
pub use error::{ArchiveError, AssemblyError, GenerationError};
pub use graph::ModelGraph;
pub use install::{install_archive, install_module};
pub use manifest::{ExternalExtension, Manifest, ManifestModel};
pub use module::{assemble, ArtifactSet, GeneratedModule};
pub use pipeline::{GenerationOutcome, Generator, GeneratorConfig};
pub use registry::{Claim, ModuleRegistry};
