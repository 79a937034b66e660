//! # Specification Data Model
//!
//! The typed form of a module specification document. Everything here is a
//! plain serde structure; structural checks beyond "does it decode" live in
//! [`crate::validate`].
//!
//! Field kinds are a closed enum so the schema compiler can match them
//! exhaustively. Decoding an unknown kind fails and is reported by the loader
//! as `UnknownFieldKind` with the offending field path.

use std::collections::{BTreeSet, VecDeque};

use modforge_core::identity::to_snake_case;
use modforge_core::{
    sha256_digest, CanonicalBytes, CanonicalizationError, ContentDigest, ModuleName, TechnicalName,
};
use serde::{Deserialize, Deserializer, Serialize};

/// Namespace used when a specification does not declare one.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Version used when a specification does not declare one.
pub const DEFAULT_VERSION: &str = "1.0";

/// Name of the field injected into every workflow-controlled model.
pub const STATUS_FIELD: &str = "status";

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_string()
}

fn default_version() -> String {
    DEFAULT_VERSION.to_string()
}

/// A complete module specification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModuleSpecification {
    /// Package slug. Unique within `namespace` at assembly time.
    pub name: String,
    #[serde(default = "default_version")]
    pub version: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    /// Runtime modules the generated package requires, in addition to the
    /// generator's configured defaults.
    #[serde(default)]
    pub depends: Vec<String>,
    #[serde(default)]
    pub models: Vec<ModelSpec>,
    #[serde(default, alias = "workflow", deserialize_with = "one_or_many")]
    pub workflows: Vec<WorkflowSpec>,
    #[serde(default)]
    pub security: SecuritySpec,
}

impl ModuleSpecification {
    /// Content digest of the specification's canonical JSON form.
    ///
    /// Used as the cache key for idempotent re-generation.
    pub fn digest(&self) -> Result<ContentDigest, CanonicalizationError> {
        let canonical = CanonicalBytes::new(self)?;
        Ok(sha256_digest(&canonical))
    }

    /// Look up a model declared in this specification by logical name.
    pub fn model(&self, name: &str) -> Option<&ModelSpec> {
        self.models.iter().find(|m| m.name == name)
    }

    /// The workflow controlling `model`, if any.
    pub fn workflow_for(&self, model: &str) -> Option<&WorkflowSpec> {
        self.workflows.iter().find(|w| w.model == model)
    }

    /// Runtime name of a declared model, following `extends` chains.
    ///
    /// A new model is named `<module>.<snake_name>`; an extension takes the
    /// name of the entity it extends. Returns `None` for undeclared models and
    /// for chains that loop back on themselves.
    pub fn technical_name_of(&self, module: &ModuleName, model: &str) -> Option<TechnicalName> {
        let mut current = self.model(model)?;
        let mut seen = BTreeSet::new();
        loop {
            if !seen.insert(current.name.as_str()) {
                return None;
            }
            match current.extends.as_deref() {
                None => return Some(TechnicalName::for_new_model(module, &current.name)),
                Some(base) => match self.model(base) {
                    Some(next) => current = next,
                    None => return Some(TechnicalName::existing(base)),
                },
            }
        }
    }

    /// Whether any model extends an entity not declared in this specification.
    pub fn extends_existing_entities(&self) -> bool {
        self.models.iter().any(|m| {
            m.extends
                .as_deref()
                .is_some_and(|base| self.model(base).is_none())
        })
    }
}

/// A model: either a new entity or an extension of an existing one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelSpec {
    /// Logical name, e.g. `Contract`, or a runtime name such as `res.partner`.
    pub name: String,
    /// Entity this model extends rather than creates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub methods: Vec<MethodStub>,
}

impl ModelSpec {
    pub fn field(&self, name: &str) -> Option<&FieldSpec> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Stem of this model's generated files: `ContractLine` → `contract_line`,
    /// `res.partner` → `res_partner`.
    pub fn file_stem(&self) -> String {
        to_snake_case(&self.name.replace('.', "_"))
    }
}

/// A method declared on a model. The behavior text is opaque and is carried
/// into the generated source as documentation only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodStub {
    pub name: String,
    #[serde(default)]
    pub behavior: String,
}

/// The closed set of field kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FieldKind {
    Text,
    #[serde(alias = "long_text")]
    LongText,
    Integer,
    Decimal,
    Boolean,
    Date,
    Datetime,
    #[serde(alias = "single_choice")]
    SingleChoice,
    #[serde(alias = "multi_reference")]
    MultiReference,
    Binary,
}

impl FieldKind {
    pub const ALL: [FieldKind; 10] = [
        FieldKind::Text,
        FieldKind::LongText,
        FieldKind::Integer,
        FieldKind::Decimal,
        FieldKind::Boolean,
        FieldKind::Date,
        FieldKind::Datetime,
        FieldKind::SingleChoice,
        FieldKind::MultiReference,
        FieldKind::Binary,
    ];

    /// The document spelling of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::LongText => "long-text",
            Self::Integer => "integer",
            Self::Decimal => "decimal",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::Datetime => "datetime",
            Self::SingleChoice => "single-choice",
            Self::MultiReference => "multi-reference",
            Self::Binary => "binary",
        }
    }

    /// Parse a document spelling, accepting `_` in place of `-`.
    pub fn parse(s: &str) -> Option<Self> {
        let normalized = s.replace('_', "-");
        Self::ALL.into_iter().find(|k| k.as_str() == normalized)
    }
}

impl std::fmt::Display for FieldKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Precision and scale of a decimal column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Digits {
    pub precision: u32,
    pub scale: u32,
}

impl Default for Digits {
    fn default() -> Self {
        Self {
            precision: 16,
            scale: 2,
        }
    }
}

/// Views a field may be shown in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Form,
    List,
    Search,
}

/// One option of a single-choice field.
///
/// Written either as a bare string (`"draft"`) or as `{value, label}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

impl Choice {
    /// A choice whose label is derived from its value.
    pub fn from_value(value: &str) -> Self {
        Self {
            value: value.to_string(),
            label: humanize(value),
        }
    }
}

impl<'de> Deserialize<'de> for Choice {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bare(String),
            Full {
                value: String,
                #[serde(default)]
                label: Option<String>,
            },
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bare(value) => Choice::from_value(&value),
            Raw::Full { value, label } => match label {
                Some(label) => Choice { value, label },
                None => Choice::from_value(&value),
            },
        })
    }
}

/// A field declaration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<serde_json::Value>,
    #[serde(default, alias = "choice_set", skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub help: Option<String>,
    /// Target model of a multi-reference field.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digits: Option<Digits>,
    /// Explicit view placement, overriding the derived defaults.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visible_in: Option<BTreeSet<ViewKind>>,
}

impl FieldSpec {
    /// A field with only a name and kind set.
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            required: false,
            default: None,
            choices: Vec::new(),
            label: None,
            help: None,
            reference: None,
            digits: None,
            visible_in: None,
        }
    }

    /// The human label: explicit, or derived from the field name.
    pub fn display_label(&self) -> String {
        self.label.clone().unwrap_or_else(|| humanize(&self.name))
    }

    /// The column digits a decimal field is generated with: declared, or
    /// the runtime default of `(16, 2)`.
    pub fn effective_digits(&self) -> Digits {
        self.digits.unwrap_or_default()
    }
}

/// A workflow attached to one model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkflowSpec {
    pub model: String,
    #[serde(default)]
    pub states: Vec<StateSpec>,
    #[serde(default)]
    pub transitions: Vec<TransitionSpec>,
}

impl WorkflowSpec {
    /// Names of the states flagged initial, or the first state when none is.
    pub fn initial_states(&self) -> Vec<&str> {
        let flagged: Vec<&str> = self
            .states
            .iter()
            .filter(|s| s.initial)
            .map(|s| s.name.as_str())
            .collect();
        if flagged.is_empty() {
            self.states.first().map(|s| s.name.as_str()).into_iter().collect()
        } else {
            flagged
        }
    }

    /// Whether `state` is terminal: flagged so, or (when nothing is flagged)
    /// without outgoing transitions.
    pub fn is_terminal(&self, state: &str) -> bool {
        if self.states.iter().any(|s| s.terminal) {
            self.states.iter().any(|s| s.terminal && s.name == state)
        } else {
            !self.transitions.iter().any(|t| t.from == state)
        }
    }

    pub fn state(&self, name: &str) -> Option<&StateSpec> {
        self.states.iter().find(|s| s.name == name)
    }

    /// States reachable from the initial state(s) by following transitions.
    pub fn reachable_states(&self) -> BTreeSet<&str> {
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        let mut queue: VecDeque<&str> = self.initial_states().into_iter().collect();
        while let Some(state) = queue.pop_front() {
            if !seen.insert(state) {
                continue;
            }
            for t in self.transitions.iter().filter(|t| t.from == state) {
                if !seen.contains(t.to.as_str()) {
                    queue.push_back(&t.to);
                }
            }
        }
        seen
    }
}

/// A named workflow state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSpec {
    pub name: String,
    pub label: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub initial: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub terminal: bool,
}

impl StateSpec {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            label: humanize(name),
            initial: false,
            terminal: false,
        }
    }
}

impl<'de> Deserialize<'de> for StateSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bare(String),
            Full(Full),
        }
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct Full {
            name: String,
            #[serde(default)]
            label: Option<String>,
            #[serde(default)]
            initial: bool,
            #[serde(default)]
            terminal: bool,
        }
        Ok(match Raw::deserialize(deserializer)? {
            Raw::Bare(name) => StateSpec::named(&name),
            Raw::Full(full) => StateSpec {
                label: full.label.unwrap_or_else(|| humanize(&full.name)),
                name: full.name,
                initial: full.initial,
                terminal: full.terminal,
            },
        })
    }
}

/// A transition between two states.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransitionSpec {
    pub from: String,
    pub to: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guard: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trigger: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl TransitionSpec {
    pub fn new(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            guard: None,
            trigger: None,
            label: None,
        }
    }

    /// Name of the model method that fires this transition: the trigger, or
    /// `action_<to>` when none is given.
    pub fn action(&self) -> String {
        match &self.trigger {
            Some(trigger) => trigger.clone(),
            None => format!("action_{}", self.to),
        }
    }
}

/// Access-control declarations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SecuritySpec {
    #[serde(default)]
    pub rules: Vec<RuleSpec>,
}

impl SecuritySpec {
    pub fn covers(&self, model: &str) -> bool {
        self.rules.iter().any(|r| r.model == model)
    }
}

/// One permission grant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RuleSpec {
    pub model: String,
    /// Role identifier, passed through to the runtime verbatim.
    pub role: String,
    pub permissions: BTreeSet<Permission>,
    /// Row filter applied by the restriction rule. Defaults to all rows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

/// A CRUD permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    Create,
    Delete,
}

impl Permission {
    pub const ALL: [Permission; 4] = [
        Permission::Read,
        Permission::Write,
        Permission::Create,
        Permission::Delete,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Create => "create",
            Self::Delete => "delete",
        }
    }
}

fn one_or_many<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany<T> {
        Many(Vec<T>),
        One(T),
    }
    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::Many(v) => v,
        OneOrMany::One(t) => vec![t],
    })
}

/// `in_review` → `In Review`.
pub fn humanize(name: &str) -> String {
    name.split(['_', '-', ' '])
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(c) => c.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
