//! # Workflow State Machines
//!
//! Turns a declarative [`WorkflowSpec`] into a [`StateMachineDefinition`]:
//! an ordered state list, one initial state, the terminal set, and an
//! explicit transition table.
//!
//! ```text
//!              approve               sign
//!   ┌───────┐ ───────▶ ┌──────────┐ ─────▶ ┌────────┐
//!   │ DRAFT │          │ APPROVED │        │ SIGNED │ (terminal)
//!   └───────┘ ◀─────── └──────────┘        └────────┘
//!              reopen [guard: record.amount < 1000]
//! ```
//!
//! ## Transition table
//!
//! Each transition is keyed by `(from, trigger, guard)`. Two transitions with
//! the same key leave the same state under indistinguishable conditions and
//! synthesis fails with [`WorkflowError::AmbiguousTransition`]. The same
//! holds for `(from, action, guard)`: the generated model dispatches on the
//! action method name, so an explicit trigger that spells another
//! transition's implicit `action_<to>` is just as ambiguous. No transition
//! is ever picked arbitrarily.
//!
//! ## Status field
//!
//! Every workflow-controlled model gets a `status` selection field whose
//! choices are exactly the declared states, in declaration order, defaulting
//! to the initial state. [`StateMachineDefinition::status_field`] produces it
//! as an ordinary [`FieldSpec`] so the schema compiler can inject it like any
//! other declaration.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use modforge_spec::{Choice, FieldKind, FieldSpec, StateSpec, WorkflowSpec, STATUS_FIELD};
use serde::{Deserialize, Serialize};

use crate::error::WorkflowError;

/// Version tag written into every serialized definition.
pub const WORKFLOW_FORMAT: &str = "modforge-workflow/1";

/// What distinguishes one transition from its siblings leaving the same state.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TransitionKey {
    pub from: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
}

impl TransitionKey {
    /// Human description of the discriminator, used in error messages.
    pub fn discriminator(&self) -> String {
        match (&self.trigger, &self.guard) {
            (None, None) => "no trigger or guard".to_string(),
            (Some(t), None) => format!("trigger `{t}`"),
            (None, Some(g)) => format!("guard `{g}`"),
            (Some(t), Some(g)) => format!("trigger `{t}` with guard `{g}`"),
        }
    }
}

/// One row of the transition table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    #[serde(flatten)]
    pub key: TransitionKey,
    pub to: String,
    /// Name of the model method that fires this transition.
    pub action: String,
    pub label: String,
}

/// A validated, unambiguous state machine for one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMachineDefinition {
    pub format: String,
    pub model: String,
    pub states: Vec<StateSpec>,
    pub initial: String,
    pub terminal: Vec<String>,
    /// Ordered by key; at most one row per key.
    pub transitions: Vec<Transition>,
}

impl StateMachineDefinition {
    pub fn state_names(&self) -> impl Iterator<Item = &str> {
        self.states.iter().map(|s| s.name.as_str())
    }

    pub fn is_terminal(&self, state: &str) -> bool {
        self.terminal.iter().any(|t| t == state)
    }

    /// The target state for `key`, if the table has a row for it.
    pub fn target(&self, key: &TransitionKey) -> Option<&str> {
        self.transitions
            .iter()
            .find(|t| &t.key == key)
            .map(|t| t.to.as_str())
    }

    /// Transitions leaving `state`, in table order.
    pub fn outgoing<'a>(&'a self, state: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.key.from == state)
    }

    /// Distinct action names, in first-appearance order of the table.
    pub fn actions(&self) -> Vec<&str> {
        let mut seen = BTreeSet::new();
        self.transitions
            .iter()
            .map(|t| t.action.as_str())
            .filter(|a| seen.insert(*a))
            .collect()
    }

    /// The implicit `status` field for the controlled model.
    pub fn status_field(&self) -> FieldSpec {
        let mut field = FieldSpec::new(STATUS_FIELD, FieldKind::SingleChoice);
        field.required = true;
        field.label = Some("Status".to_string());
        field.default = Some(serde_json::Value::String(self.initial.clone()));
        field.choices = self
            .states
            .iter()
            .map(|s| Choice {
                value: s.name.clone(),
                label: s.label.clone(),
            })
            .collect();
        field
    }
}

/// Build the state machine for `workflow`, failing on the first violated
/// invariant.
///
/// Checks run in a fixed order (states, initial state, transition endpoints,
/// ambiguity, reachability, dead ends) so the same input always reports the
/// same error.
pub fn synthesize(workflow: &WorkflowSpec) -> Result<StateMachineDefinition, WorkflowError> {
    let model = workflow.model.as_str();

    let mut declared: BTreeSet<&str> = BTreeSet::new();
    for state in &workflow.states {
        if !declared.insert(&state.name) {
            return Err(WorkflowError::DuplicateState {
                model: model.to_string(),
                state: state.name.clone(),
            });
        }
    }

    let initial = match workflow.initial_states().as_slice() {
        [] => {
            return Err(WorkflowError::NoInitialState {
                model: model.to_string(),
            })
        }
        [one] => one.to_string(),
        many => {
            return Err(WorkflowError::MultipleInitialStates {
                model: model.to_string(),
                states: many.join(", "),
            })
        }
    };

    for (index, t) in workflow.transitions.iter().enumerate() {
        for endpoint in [&t.from, &t.to] {
            if !declared.contains(endpoint.as_str()) {
                return Err(WorkflowError::UnknownState {
                    model: model.to_string(),
                    index,
                    state: endpoint.clone(),
                });
            }
        }
    }

    let mut table: BTreeMap<TransitionKey, Transition> = BTreeMap::new();
    let mut dispatch: BTreeMap<(&str, String, Option<&str>), &str> = BTreeMap::new();
    for t in &workflow.transitions {
        let key = TransitionKey {
            from: t.from.clone(),
            trigger: t.trigger.clone(),
            guard: t.guard.clone(),
        };
        if let Some(existing) = table.get(&key) {
            return Err(WorkflowError::AmbiguousTransition {
                model: model.to_string(),
                from: t.from.clone(),
                discriminator: key.discriminator(),
                first: existing.to.clone(),
                second: t.to.clone(),
            });
        }
        let action = t.action();
        let slot = (t.from.as_str(), action.clone(), t.guard.as_deref());
        if let Some(first) = dispatch.insert(slot, t.to.as_str()) {
            let discriminator = match &t.guard {
                Some(guard) => format!("action `{action}` with guard `{guard}`"),
                None => format!("action `{action}`"),
            };
            return Err(WorkflowError::AmbiguousTransition {
                model: model.to_string(),
                from: t.from.clone(),
                discriminator,
                first: first.to_string(),
                second: t.to.clone(),
            });
        }
        let label = t.label.clone().unwrap_or_else(|| {
            workflow
                .state(&t.to)
                .map(|s| s.label.clone())
                .unwrap_or_else(|| t.to.clone())
        });
        table.insert(
            key.clone(),
            Transition {
                key,
                to: t.to.clone(),
                action,
                label,
            },
        );
    }

    let reachable = reachable_from(&initial, table.values());
    if let Some(orphan) = workflow
        .states
        .iter()
        .find(|s| !reachable.contains(s.name.as_str()))
    {
        return Err(WorkflowError::UnreachableState {
            model: model.to_string(),
            state: orphan.name.clone(),
        });
    }

    let terminal: Vec<String> = workflow
        .states
        .iter()
        .filter(|s| workflow.is_terminal(&s.name))
        .map(|s| s.name.clone())
        .collect();
    if let Some(dead) = workflow.states.iter().find(|s| {
        !terminal.contains(&s.name) && !workflow.transitions.iter().any(|t| t.from == s.name)
    }) {
        return Err(WorkflowError::DeadEndState {
            model: model.to_string(),
            state: dead.name.clone(),
        });
    }

    tracing::debug!(
        model,
        states = workflow.states.len(),
        transitions = table.len(),
        "workflow synthesized"
    );

    Ok(StateMachineDefinition {
        format: WORKFLOW_FORMAT.to_string(),
        model: model.to_string(),
        states: workflow.states.clone(),
        initial,
        terminal,
        transitions: table.into_values().collect(),
    })
}

fn reachable_from<'a>(
    initial: &'a str,
    transitions: impl Iterator<Item = &'a Transition> + Clone,
) -> BTreeSet<&'a str> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::from([initial]);
    while let Some(state) = queue.pop_front() {
        if !seen.insert(state) {
            continue;
        }
        queue.extend(
            transitions
                .clone()
                .filter(|t| t.key.from == state)
                .map(|t| t.to.as_str()),
        );
    }
    seen
}
