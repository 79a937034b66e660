//! Error types for loading and validating specifications.

use std::path::PathBuf;

use thiserror::Error;

use crate::report::ValidationIssue;

/// Failure to turn a document into a [`crate::ModuleSpecification`].
#[derive(Error, Debug)]
pub enum SpecError {
    #[error("cannot read specification {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document is not syntactically valid JSON or YAML.
    #[error("cannot parse specification {origin}: {reason}")]
    Parse { origin: String, reason: String },

    /// The document parsed but does not have the shape of a specification.
    /// Carries one issue per structural violation or unknown field kind.
    #[error("specification is malformed ({} issue(s))", issues.len())]
    Malformed { issues: Vec<ValidationIssue> },

    /// The bundled structural schema failed to compile.
    #[error("bundled specification schema is invalid: {0}")]
    Schema(String),
}

/// The inventory could not be read but the specification needs it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{path}: model inventory unavailable ({reason}); extending existing entities requires it")]
pub struct SourceUnavailable {
    pub path: String,
    pub reason: String,
}
