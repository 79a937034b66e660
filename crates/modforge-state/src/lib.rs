//! # modforge-state: Workflow Synthesis
//!
//! Compiles the declarative workflows of a module specification into
//! explicit state machines:
//!
//! - **Reachability**: every declared state is reachable from the single
//!   initial state.
//! - **Liveness**: every non-terminal state has an outgoing transition.
//! - **Determinism**: no two transitions leave a state under the same
//!   trigger and guard.
//!
//! The resulting [`StateMachineDefinition`] drives three downstream
//! artifacts: the injected `status` field, the transition methods of the
//! generated model, and the status bar of its form view.

pub mod error;
pub mod machine;

pub use error::WorkflowError;
pub use machine::{
    synthesize, StateMachineDefinition, Transition, TransitionKey, WORKFLOW_FORMAT,
};
