//! Assembly, archive and pipeline errors.

use modforge_client::{InstallError, InventoryError};
use modforge_compile::CompileError;
use modforge_core::{Cancelled, CanonicalizationError, IdentifierError};
use modforge_spec::{SourceUnavailable, ValidationReport};
use modforge_state::WorkflowError;
use thiserror::Error;

/// Failures while composing the artifact tree.
#[derive(Error, Debug)]
pub enum AssemblyError {
    /// The `extends` relation among the specification's models has a cycle.
    #[error("cyclic extends dependency among models: {}", models.join(" -> "))]
    CyclicDependency { models: Vec<String> },

    /// Another specification already owns this module name.
    #[error("module `{module}` in namespace `{namespace}` is already registered for a different specification ({existing})")]
    NameCollision {
        namespace: String,
        module: String,
        existing: String,
    },

    #[error("no {artifact} was produced for model `{model}`")]
    MissingArtifact { model: String, artifact: &'static str },

    #[error("two artifacts map to the same path `{path}`")]
    DuplicatePath { path: String },

    #[error("invalid module name: {0}")]
    ModuleName(#[from] IdentifierError),

    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}

/// Failures reading or unpacking an archive.
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("archive is not valid JSON: {0}")]
    Decode(String),

    #[error("unsupported archive format `{0}`")]
    UnsupportedFormat(String),

    #[error("archive digest mismatch: declared {declared}, computed {computed}")]
    DigestMismatch { declared: String, computed: String },

    #[error("archive entry `{0}` escapes the module directory")]
    UnsafePath(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Canonicalization(#[from] CanonicalizationError),
}

/// Why a generation request produced no module.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// Validation found errors; nothing was compiled.
    #[error("specification is invalid ({} error(s))", .0.errors.len())]
    Invalid(ValidationReport),

    /// The inventory was needed to resolve an extension but could not be read.
    #[error("inventory unavailable: {0}")]
    SourceUnavailable(#[from] SourceUnavailable),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Install(#[from] InstallError),

    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    #[error("failed to read generator config {path}: {reason}")]
    Config { path: String, reason: String },
}

impl GenerationError {
    /// The validation report, when generation stopped at validation.
    pub fn report(&self) -> Option<&ValidationReport> {
        match self {
            Self::Invalid(report) => Some(report),
            _ => None,
        }
    }
}
