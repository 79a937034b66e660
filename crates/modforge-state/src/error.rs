//! Workflow synthesis errors.

use thiserror::Error;

/// Why a workflow could not be turned into a state machine.
///
/// Every variant names the model, so the error locates itself in the
/// specification without further context.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("workflows.{model}: no initial state")]
    NoInitialState { model: String },

    #[error("workflows.{model}: more than one initial state ({states})")]
    MultipleInitialStates { model: String, states: String },

    #[error("workflows.{model}.states.{state}: declared more than once")]
    DuplicateState { model: String, state: String },

    #[error("workflows.{model}.transitions[{index}]: undeclared state `{state}`")]
    UnknownState {
        model: String,
        index: usize,
        state: String,
    },

    /// Two transitions leave the same state under the same trigger or action
    /// method and the same guard.
    #[error("workflows.{model}.states.{from}: ambiguous transition on {discriminator} (to `{first}` and `{second}`)")]
    AmbiguousTransition {
        model: String,
        from: String,
        discriminator: String,
        first: String,
        second: String,
    },

    #[error("workflows.{model}.states.{state}: unreachable from the initial state")]
    UnreachableState { model: String, state: String },

    #[error("workflows.{model}.states.{state}: not terminal but has no outgoing transition")]
    DeadEndState { model: String, state: String },
}

impl WorkflowError {
    /// The dotted specification path the error refers to.
    pub fn path(&self) -> String {
        match self {
            Self::NoInitialState { model } | Self::MultipleInitialStates { model, .. } => {
                format!("workflows.{model}.states")
            }
            Self::DuplicateState { model, state }
            | Self::UnreachableState { model, state }
            | Self::DeadEndState { model, state } => format!("workflows.{model}.states.{state}"),
            Self::UnknownState { model, index, .. } => format!("workflows.{model}.transitions[{index}]"),
            Self::AmbiguousTransition { model, from, .. } => format!("workflows.{model}.states.{from}"),
        }
    }
}
