//! # Specification Validator
//!
//! Checks a decoded [`ModuleSpecification`] against the naming, uniqueness,
//! referential-integrity, and workflow invariants, in this order:
//!
//! 1. Module name, version, and dependency names are well-formed.
//! 2. Model names are well-formed and unique; field names are well-formed,
//!    unique per model, and not reserved.
//! 3. `extends` resolves to an earlier model of the same specification or to
//!    an inventory entity. Forward and self references are rejected with
//!    `CyclicDependency`.
//! 4. Field kinds agree with choice sets, reference targets, digits, and
//!    default values.
//! 5. Each workflow has one initial state, every state is reachable from it,
//!    and every non-terminal state has an outgoing transition.
//! 6. Every new model is covered by a security rule. Uncovered models get an
//!    implicit read-only rule, recorded as a warning.
//!
//! All findings are collected; the report is sorted so identical input always
//! yields an identical report. The only early exit is a specification that
//! extends existing entities while the inventory is unreachable.

use std::collections::{BTreeMap, BTreeSet};

use modforge_core::{identity, parse_date, DecimalLiteral, ModuleName, TechnicalName, Timestamp};
use serde_json::Value;

use crate::error::SourceUnavailable;
use crate::inventory::InventoryContext;
use crate::model::{FieldKind, FieldSpec, ModelSpec, ModuleSpecification, WorkflowSpec, STATUS_FIELD};
use crate::report::{IssueCode, ValidationIssue, ValidationReport};

/// Column names the runtime manages on every entity.
pub const RESERVED_FIELD_NAMES: [&str; 6] = [
    "id",
    "create_uid",
    "create_date",
    "write_uid",
    "write_date",
    "display_name",
];

/// Lowercase Python keywords. Generated sources use field, method and trigger
/// names as bare identifiers, so none of these may appear.
pub const PYTHON_KEYWORDS: &[&str] = &[
    "and", "as", "assert", "async", "await", "break", "class", "continue", "def", "del", "elif",
    "else", "except", "finally", "for", "from", "global", "if", "import", "in", "is", "lambda",
    "nonlocal", "not", "or", "pass", "raise", "return", "try", "while", "with", "yield",
];

/// Names bound by the generated model source itself.
pub const GENERATED_NAMES: &[&str] = &[
    "fields",
    "models",
    "safe_eval",
    "_apply_transition",
    "_workflow_transitions",
];

/// Methods every runtime model inherits; a declaration with one of these
/// names would replace it.
pub const RUNTIME_METHODS: &[&str] = &[
    "browse",
    "copy",
    "create",
    "default_get",
    "ensure_one",
    "exists",
    "name_get",
    "name_search",
    "read",
    "search",
    "search_count",
    "unlink",
    "write",
];

/// Why `name` cannot be a generated attribute or method, if it cannot.
pub fn identifier_problem(name: &str) -> Option<String> {
    if !identity::is_snake_identifier(name) {
        Some(format!("`{name}` must match ^[a-z][a-z0-9_]*$"))
    } else if PYTHON_KEYWORDS.contains(&name) {
        Some(format!("`{name}` is a Python keyword"))
    } else if GENERATED_NAMES.contains(&name) || RUNTIME_METHODS.contains(&name) {
        Some(format!("`{name}` is reserved by the generated model"))
    } else {
        None
    }
}

/// Validates specifications against one inventory snapshot.
#[derive(Debug, Clone, Copy)]
pub struct Validator<'a> {
    inventory: &'a InventoryContext,
}

impl<'a> Validator<'a> {
    pub fn new(inventory: &'a InventoryContext) -> Self {
        Self { inventory }
    }

    /// Validate `spec`.
    ///
    /// Returns `Err` only when an `extends` target is not declared in the
    /// specification and the inventory could not be read.
    pub fn validate(&self, spec: &ModuleSpecification) -> Result<ValidationReport, SourceUnavailable> {
        let mut issues = Vec::new();
        check_header(spec, &mut issues);
        check_models(spec, &mut issues);
        self.check_extends(spec, &mut issues)?;
        for model in &spec.models {
            for field in &model.fields {
                self.check_field(spec, model, field, &mut issues);
            }
        }
        check_workflows(spec, &mut issues);
        self.check_security(spec, &mut issues);

        let report = ValidationReport::from_issues(issues);
        tracing::debug!(
            module = %spec.name,
            errors = report.errors.len(),
            warnings = report.warnings.len(),
            "specification validated"
        );
        Ok(report)
    }

    fn check_extends(
        &self,
        spec: &ModuleSpecification,
        issues: &mut Vec<ValidationIssue>,
    ) -> Result<(), SourceUnavailable> {
        let positions: BTreeMap<&str, usize> = spec
            .models
            .iter()
            .enumerate()
            .rev()
            .map(|(i, m)| (m.name.as_str(), i))
            .collect();

        for (index, model) in spec.models.iter().enumerate() {
            let Some(base) = model.extends.as_deref() else {
                continue;
            };
            let path = model_path(model, "extends");
            match positions.get(base) {
                Some(&pos) if pos < index => {}
                Some(_) => issues.push(ValidationIssue::new(
                    path,
                    IssueCode::CyclicDependency,
                    if base == model.name {
                        format!("`{}` extends itself", model.name)
                    } else {
                        format!(
                            "`{}` extends `{base}`, which is declared later; a model may only extend models declared before it",
                            model.name
                        )
                    },
                )),
                None if self.inventory.contains(base) => {}
                None => match self.inventory.unavailable_reason() {
                    Some(reason) => {
                        return Err(SourceUnavailable {
                            path,
                            reason: reason.to_string(),
                        })
                    }
                    None => issues.push(ValidationIssue::new(
                        path,
                        IssueCode::UnknownEntity,
                        format!(
                            "`{base}` is neither declared earlier in this specification nor present in namespace `{}`",
                            self.inventory.namespace()
                        ),
                    )),
                },
            }
        }
        Ok(())
    }

    fn check_field(
        &self,
        spec: &ModuleSpecification,
        model: &ModelSpec,
        field: &FieldSpec,
        issues: &mut Vec<ValidationIssue>,
    ) {
        let path = field_path(model, field);

        if !field.choices.is_empty() && field.kind != FieldKind::SingleChoice {
            issues.push(ValidationIssue::new(
                &path,
                IssueCode::ChoiceSetMismatch,
                format!("choices are only allowed on single-choice fields, not {}", field.kind),
            ));
        }
        let mut seen = BTreeSet::new();
        for choice in &field.choices {
            if !seen.insert(choice.value.as_str()) {
                issues.push(ValidationIssue::new(
                    &path,
                    IssueCode::DuplicateChoice,
                    format!("choice `{}` is listed more than once", choice.value),
                ));
            }
        }

        match (&field.kind, &field.reference) {
            (FieldKind::MultiReference, None) => issues.push(ValidationIssue::new(
                &path,
                IssueCode::MissingReferenceTarget,
                "multi-reference fields must name a target model in `reference`",
            )),
            (FieldKind::MultiReference, Some(target)) => {
                if spec.model(target).is_none() && !self.inventory.contains(target) {
                    if self.inventory.is_available() {
                        issues.push(ValidationIssue::new(
                            &path,
                            IssueCode::UnknownEntity,
                            format!("reference target `{target}` does not exist"),
                        ));
                    } else {
                        issues.push(ValidationIssue::new(
                            &path,
                            IssueCode::UnverifiedReference,
                            format!("reference target `{target}` could not be checked; inventory unavailable"),
                        ));
                    }
                }
            }
            (kind, Some(_)) => issues.push(ValidationIssue::new(
                &path,
                IssueCode::Malformed,
                format!("`reference` only applies to multi-reference fields, not {kind}"),
            )),
            (_, None) => {}
        }

        if let Some(digits) = field.digits {
            if field.kind != FieldKind::Decimal {
                issues.push(ValidationIssue::new(
                    &path,
                    IssueCode::Malformed,
                    format!("`digits` only applies to decimal fields, not {}", field.kind),
                ));
            } else if digits.scale > digits.precision {
                issues.push(ValidationIssue::new(
                    &path,
                    IssueCode::Malformed,
                    format!("scale {} exceeds precision {}", digits.scale, digits.precision),
                ));
            }
        }

        if let Some(default) = field.default.as_ref().filter(|v| !v.is_null()) {
            if let Err(reason) = check_default(field, default) {
                issues.push(ValidationIssue::new(&path, IssueCode::InvalidDefault, reason));
            }
        }
    }

    fn check_security(&self, spec: &ModuleSpecification, issues: &mut Vec<ValidationIssue>) {
        for (i, rule) in spec.security.rules.iter().enumerate() {
            let path = format!("security.rules[{i}]");
            if rule.permissions.is_empty() {
                issues.push(ValidationIssue::new(
                    &path,
                    IssueCode::EmptyPermissionSet,
                    format!("rule for `{}` / `{}` grants no permissions", rule.model, rule.role),
                ));
            }
            if spec.model(&rule.model).is_none() && !self.inventory.contains(&rule.model) {
                let (code, message) = if self.inventory.is_available() {
                    (IssueCode::UnknownSecurityModel, format!("rule targets unknown model `{}`", rule.model))
                } else {
                    (
                        IssueCode::UnverifiedReference,
                        format!("rule target `{}` could not be checked; inventory unavailable", rule.model),
                    )
                };
                issues.push(ValidationIssue::new(path, code, message));
            }
        }

        for model in spec.models.iter().filter(|m| m.extends.is_none()) {
            if !spec.security.covers(&model.name) {
                issues.push(ValidationIssue::new(
                    format!("models.{}", model.name),
                    IssueCode::ImplicitReadOnlyRule,
                    format!("no security rule covers `{}`; a read-only rule will be generated", model.name),
                ));
            }
        }
    }
}

/// Validate `spec` against `inventory`.
pub fn validate(
    spec: &ModuleSpecification,
    inventory: &InventoryContext,
) -> Result<ValidationReport, SourceUnavailable> {
    Validator::new(inventory).validate(spec)
}

fn check_header(spec: &ModuleSpecification, issues: &mut Vec<ValidationIssue>) {
    if let Err(e) = ModuleName::parse(&spec.name) {
        issues.push(ValidationIssue::new("name", IssueCode::InvalidModuleName, e.to_string()));
    }
    if !identity::is_version(&spec.version) {
        issues.push(ValidationIssue::new(
            "version",
            IssueCode::InvalidVersion,
            format!("`{}` is not a dotted numeric version such as 1.0 or 17.0.1.0.0", spec.version),
        ));
    }
    if !identity::is_snake_identifier(&spec.namespace) {
        issues.push(ValidationIssue::new(
            "namespace",
            IssueCode::InvalidModuleName,
            format!("namespace `{}` must match ^[a-z][a-z0-9_]*$", spec.namespace),
        ));
    }
    for (i, dep) in spec.depends.iter().enumerate() {
        if !identity::is_snake_identifier(dep) {
            issues.push(ValidationIssue::new(
                format!("depends[{i}]"),
                IssueCode::InvalidModuleName,
                format!("dependency `{dep}` is not a valid module name"),
            ));
        }
    }
}

fn check_models(spec: &ModuleSpecification, issues: &mut Vec<ValidationIssue>) {
    let module = ModuleName::parse(&spec.name).ok();
    let mut names = BTreeSet::new();
    let mut technical: BTreeMap<String, &str> = BTreeMap::new();
    let mut stems: BTreeMap<String, &str> = BTreeMap::new();

    for model in &spec.models {
        let path = format!("models.{}", model.name);
        if !identity::is_model_name(&model.name) {
            issues.push(ValidationIssue::new(
                &path,
                IssueCode::InvalidModelName,
                format!("`{}` is not a valid model name", model.name),
            ));
        }
        if !names.insert(model.name.as_str()) {
            issues.push(ValidationIssue::new(
                &path,
                IssueCode::DuplicateModel,
                format!("model `{}` is declared more than once", model.name),
            ));
        } else if let Some(other) = stems.insert(model.file_stem(), model.name.as_str()) {
            issues.push(ValidationIssue::new(
                &path,
                IssueCode::DuplicateModel,
                format!("`{}` and `{other}` would generate the same files", model.name),
            ));
        } else if let Some(tech) = module
            .as_ref()
            .filter(|_| model.extends.is_none())
            .map(|m| TechnicalName::for_new_model(m, &model.name))
        {
            if let Some(other) = technical.insert(tech.as_str().to_string(), model.name.as_str()) {
                issues.push(ValidationIssue::new(
                    &path,
                    IssueCode::DuplicateModel,
                    format!("`{}` and `{other}` both map to runtime model `{tech}`", model.name),
                ));
            }
        }

        let workflow_controlled = spec.workflow_for(&model.name).is_some();
        let mut fields = BTreeSet::new();
        for field in &model.fields {
            let path = field_path(model, field);
            if let Some(problem) = identifier_problem(&field.name) {
                issues.push(ValidationIssue::new(&path, IssueCode::InvalidFieldName, problem));
            }
            if !fields.insert(field.name.as_str()) {
                issues.push(ValidationIssue::new(
                    &path,
                    IssueCode::DuplicateField,
                    format!("field `{}` is declared more than once on `{}`", field.name, model.name),
                ));
            }
            if RESERVED_FIELD_NAMES.contains(&field.name.as_str()) {
                issues.push(ValidationIssue::new(
                    &path,
                    IssueCode::ReservedField,
                    format!("`{}` is managed by the runtime", field.name),
                ));
            } else if workflow_controlled && field.name == STATUS_FIELD {
                issues.push(ValidationIssue::new(
                    &path,
                    IssueCode::ReservedField,
                    format!("`{STATUS_FIELD}` is generated for workflow-controlled models"),
                ));
            }
        }
        check_methods(spec, model, issues);
    }
}

/// Method stubs become `def <name>(self)` on the generated class, next to
/// the field attributes and the workflow action methods.
fn check_methods(spec: &ModuleSpecification, model: &ModelSpec, issues: &mut Vec<ValidationIssue>) {
    let workflow = spec.workflow_for(&model.name);
    let actions: BTreeSet<String> = workflow
        .map(|w| w.transitions.iter().map(|t| t.action()).collect())
        .unwrap_or_default();

    let mut seen = BTreeSet::new();
    for method in &model.methods {
        let path = format!("models.{}.methods.{}", model.name, method.name);
        let clash = if let Some(problem) = identifier_problem(&method.name) {
            Some(problem)
        } else if !seen.insert(method.name.as_str()) {
            Some(format!("method `{}` is declared more than once", method.name))
        } else if model.field(&method.name).is_some()
            || (workflow.is_some() && method.name == STATUS_FIELD)
        {
            Some(format!("method `{}` has the same name as a field of `{}`", method.name, model.name))
        } else if actions.contains(&method.name) {
            Some(format!("method `{}` is generated for a workflow transition", method.name))
        } else {
            None
        };
        if let Some(message) = clash {
            issues.push(ValidationIssue::new(path, IssueCode::InvalidIdentifier, message));
        }
    }
}

fn check_default(field: &FieldSpec, default: &Value) -> Result<(), String> {
    let expected = |what: &str| -> Result<(), String> {
        Err(format!("default for a {} field must be {what}", field.kind))
    };
    match field.kind {
        FieldKind::Text | FieldKind::LongText => match default {
            Value::String(_) => Ok(()),
            _ => expected("a string"),
        },
        FieldKind::Integer => match default {
            Value::Number(n) if n.is_i64() => Ok(()),
            _ => expected("an integer"),
        },
        FieldKind::Decimal => {
            let literal = match default {
                Value::String(s) => DecimalLiteral::parse(s).map_err(|e| e.to_string())?,
                Value::Number(n) => match n.as_i64() {
                    Some(i) => DecimalLiteral::from_integer(i),
                    None => {
                        return Err(format!(
                            "decimal default {n} must be written as a string to keep its exact value"
                        ))
                    }
                },
                _ => return expected("a decimal string"),
            };
            let digits = field.effective_digits();
            literal.check_fits(digits.precision, digits.scale).map_err(|e| match field.digits {
                Some(_) => e.to_string(),
                None => format!("{e}; declare `digits` to widen the column"),
            })
        }
        FieldKind::Boolean => match default {
            Value::Bool(_) => Ok(()),
            _ => expected("true or false"),
        },
        FieldKind::Date => match default.as_str().and_then(parse_date) {
            Some(_) => Ok(()),
            None => expected("a YYYY-MM-DD date"),
        },
        FieldKind::Datetime => match default.as_str().and_then(Timestamp::parse) {
            Some(_) => Ok(()),
            None => expected("an RFC 3339 UTC timestamp ending in Z"),
        },
        FieldKind::SingleChoice => match default.as_str() {
            Some(v) if field.choices.is_empty() || field.choices.iter().any(|c| c.value == v) => Ok(()),
            Some(v) => Err(format!("default `{v}` is not one of the declared choices")),
            None => expected("one of the choice values"),
        },
        FieldKind::MultiReference | FieldKind::Binary => {
            Err(format!("{} fields cannot declare a default", field.kind))
        }
    }
}

fn check_workflows(spec: &ModuleSpecification, issues: &mut Vec<ValidationIssue>) {
    let mut seen_models = BTreeSet::new();
    for workflow in &spec.workflows {
        let base = format!("workflows.{}", workflow.model);
        if spec.model(&workflow.model).is_none() {
            issues.push(ValidationIssue::new(
                &base,
                IssueCode::UnknownWorkflowModel,
                format!("workflow targets `{}`, which is not declared in this specification", workflow.model),
            ));
        }
        if !seen_models.insert(workflow.model.as_str()) {
            issues.push(ValidationIssue::new(
                &base,
                IssueCode::DuplicateWorkflow,
                format!("`{}` has more than one workflow", workflow.model),
            ));
            continue;
        }
        check_workflow(workflow, &base, issues);
        check_actions(workflow, spec.model(&workflow.model), &base, issues);
    }
}

/// Each transition becomes a method named by its trigger, or `action_<to>`.
fn check_actions(
    workflow: &WorkflowSpec,
    model: Option<&ModelSpec>,
    base: &str,
    issues: &mut Vec<ValidationIssue>,
) {
    for (i, t) in workflow.transitions.iter().enumerate() {
        let path = format!("{base}.transitions[{i}]");
        let action = t.action();
        let problem = match &t.trigger {
            Some(trigger) => identifier_problem(trigger).map(|p| format!("trigger {p}")),
            None => None,
        };
        let message = problem.or_else(|| {
            let field_clash = action == STATUS_FIELD || model.is_some_and(|m| m.field(&action).is_some());
            field_clash.then(|| format!("transition method `{action}` has the same name as a field of `{}`", workflow.model))
        });
        if let Some(message) = message {
            issues.push(ValidationIssue::new(path, IssueCode::InvalidIdentifier, message));
        }
    }
}

fn check_workflow(workflow: &WorkflowSpec, base: &str, issues: &mut Vec<ValidationIssue>) {
    let state_path = |name: &str| format!("{base}.states.{name}");

    let mut declared = BTreeSet::new();
    for state in &workflow.states {
        if !identity::is_snake_identifier(&state.name) {
            issues.push(ValidationIssue::new(
                state_path(&state.name),
                IssueCode::Malformed,
                format!("state `{}` must match ^[a-z][a-z0-9_]*$", state.name),
            ));
        }
        if !declared.insert(state.name.as_str()) {
            issues.push(ValidationIssue::new(
                state_path(&state.name),
                IssueCode::DuplicateState,
                format!("state `{}` is declared more than once", state.name),
            ));
        }
    }

    let initial = workflow.initial_states();
    match initial.len() {
        0 => {
            issues.push(ValidationIssue::new(
                format!("{base}.states"),
                IssueCode::NoInitialState,
                "a workflow needs at least one state",
            ));
            return;
        }
        1 => {}
        _ => issues.push(ValidationIssue::new(
            format!("{base}.states"),
            IssueCode::MultipleInitialStates,
            format!("exactly one state may be initial; found {}", initial.join(", ")),
        )),
    }

    let mut dangling = false;
    for (i, t) in workflow.transitions.iter().enumerate() {
        for end in [&t.from, &t.to] {
            if !declared.contains(end.as_str()) {
                dangling = true;
                issues.push(ValidationIssue::new(
                    format!("{base}.transitions[{i}]"),
                    IssueCode::UnknownState,
                    format!("transition references undeclared state `{end}`"),
                ));
            }
        }
    }
    if dangling {
        return;
    }

    let reachable = workflow.reachable_states();
    for state in &workflow.states {
        if !reachable.contains(state.name.as_str()) {
            issues.push(ValidationIssue::new(
                state_path(&state.name),
                IssueCode::UnreachableState,
                format!("`{}` cannot be reached from `{}`", state.name, initial[0]),
            ));
        }
        let has_outgoing = workflow.transitions.iter().any(|t| t.from == state.name);
        if !has_outgoing && !workflow.is_terminal(&state.name) {
            issues.push(ValidationIssue::new(
                state_path(&state.name),
                IssueCode::DeadEndState,
                format!("`{}` is not terminal but has no outgoing transition", state.name),
            ));
        }
    }
}

fn model_path(model: &ModelSpec, leaf: &str) -> String {
    format!("models.{}.{leaf}", model.name)
}

fn field_path(model: &ModelSpec, field: &FieldSpec) -> String {
    format!("models.{}.fields.{}", model.name, field.name)
}
