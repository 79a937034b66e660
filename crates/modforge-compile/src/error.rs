//! Compilation errors.

use modforge_core::Cancelled;
use thiserror::Error;

/// Why a model, view set or security group could not be compiled.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    /// A required single-choice field has no choices and no default, so no
    /// record could ever be saved.
    #[error("models.{model}.fields.{field}: required single-choice field has an empty choice set and no default")]
    IncompleteChoiceSet { model: String, field: String },

    #[error("models.{model}.fields.{field}: {reason}")]
    InvalidDefault {
        model: String,
        field: String,
        reason: String,
    },

    #[error("models.{model}.fields.{field}: multi-reference field has no target model")]
    MissingReference { model: String, field: String },

    #[error("models.{model}.fields.status: declared explicitly on a workflow-controlled model")]
    StatusConflict { model: String },

    #[error("{path}: `{model}` is neither declared in the specification nor known to the runtime")]
    UnknownModel { path: String, model: String },

    /// Two access rows fold to the same runtime record id.
    #[error("{path}: `{second}` produces record id `{id}` already used by `{first}`")]
    DuplicateRecordId {
        path: String,
        id: String,
        first: String,
        second: String,
    },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl CompileError {
    /// The dotted specification path the error refers to, if any.
    pub fn path(&self) -> Option<String> {
        match self {
            Self::IncompleteChoiceSet { model, field }
            | Self::InvalidDefault { model, field, .. }
            | Self::MissingReference { model, field } => {
                Some(format!("models.{model}.fields.{field}"))
            }
            Self::StatusConflict { model } => Some(format!("models.{model}.fields.status")),
            Self::UnknownModel { path, .. } | Self::DuplicateRecordId { path, .. } => Some(path.clone()),
            Self::Cancelled(_) => None,
        }
    }
}
