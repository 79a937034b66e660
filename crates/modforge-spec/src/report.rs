//! Validation issues and the ordered report the validator returns.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Machine-readable issue codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum IssueCode {
    Malformed,
    UnknownFieldKind,
    InvalidModuleName,
    InvalidVersion,
    InvalidModelName,
    InvalidFieldName,
    InvalidIdentifier,
    DuplicateModel,
    DuplicateField,
    ReservedField,
    UnknownEntity,
    CyclicDependency,
    SourceUnavailable,
    ChoiceSetMismatch,
    DuplicateChoice,
    MissingReferenceTarget,
    InvalidDefault,
    UnknownWorkflowModel,
    DuplicateWorkflow,
    DuplicateState,
    NoInitialState,
    MultipleInitialStates,
    UnknownState,
    UnreachableState,
    DeadEndState,
    UnknownSecurityModel,
    EmptyPermissionSet,
    ImplicitReadOnlyRule,
    UnverifiedReference,
}

impl IssueCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Malformed => "Malformed",
            Self::UnknownFieldKind => "UnknownFieldKind",
            Self::InvalidModuleName => "InvalidModuleName",
            Self::InvalidVersion => "InvalidVersion",
            Self::InvalidModelName => "InvalidModelName",
            Self::InvalidFieldName => "InvalidFieldName",
            Self::InvalidIdentifier => "InvalidIdentifier",
            Self::DuplicateModel => "DuplicateModel",
            Self::DuplicateField => "DuplicateField",
            Self::ReservedField => "ReservedField",
            Self::UnknownEntity => "UnknownEntity",
            Self::CyclicDependency => "CyclicDependency",
            Self::SourceUnavailable => "SourceUnavailable",
            Self::ChoiceSetMismatch => "ChoiceSetMismatch",
            Self::DuplicateChoice => "DuplicateChoice",
            Self::MissingReferenceTarget => "MissingReferenceTarget",
            Self::InvalidDefault => "InvalidDefault",
            Self::UnknownWorkflowModel => "UnknownWorkflowModel",
            Self::DuplicateWorkflow => "DuplicateWorkflow",
            Self::DuplicateState => "DuplicateState",
            Self::NoInitialState => "NoInitialState",
            Self::MultipleInitialStates => "MultipleInitialStates",
            Self::UnknownState => "UnknownState",
            Self::UnreachableState => "UnreachableState",
            Self::DeadEndState => "DeadEndState",
            Self::UnknownSecurityModel => "UnknownSecurityModel",
            Self::EmptyPermissionSet => "EmptyPermissionSet",
            Self::ImplicitReadOnlyRule => "ImplicitReadOnlyRule",
            Self::UnverifiedReference => "UnverifiedReference",
        }
    }

    /// Whether an issue with this code is informational only.
    pub fn is_warning(&self) -> bool {
        matches!(self, Self::ImplicitReadOnlyRule | Self::UnverifiedReference)
    }
}

impl fmt::Display for IssueCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One finding, located by a dotted path into the specification
/// (`models.Contract.fields.value`, `workflows.Contract.states.review`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub path: String,
    pub code: IssueCode,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(path: impl Into<String>, code: IssueCode, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let path = if self.path.is_empty() { "(root)" } else { &self.path };
        write!(f, "{path}: [{}] {}", self.code, self.message)
    }
}

/// Result of validating one specification.
///
/// Errors and warnings are each sorted by path, then code, so identical input
/// always renders identically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Build a report from unordered findings, routing each by severity.
    pub fn from_issues(issues: impl IntoIterator<Item = ValidationIssue>) -> Self {
        let (mut warnings, mut errors): (Vec<_>, Vec<_>) =
            issues.into_iter().partition(|i| i.code.is_warning());
        sort_issues(&mut errors);
        sort_issues(&mut warnings);
        Self { errors, warnings }
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Whether any error carries `code`.
    pub fn has_error(&self, code: IssueCode) -> bool {
        self.errors.iter().any(|i| i.code == code)
    }

    pub fn has_warning(&self, code: IssueCode) -> bool {
        self.warnings.iter().any(|i| i.code == code)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for issue in &self.errors {
            writeln!(f, "error: {issue}")?;
        }
        for issue in &self.warnings {
            writeln!(f, "warning: {issue}")?;
        }
        Ok(())
    }
}

fn sort_issues(issues: &mut Vec<ValidationIssue>) {
    issues.sort_by(|a, b| {
        a.path
            .cmp(&b.path)
            .then(a.code.cmp(&b.code))
            .then(a.message.cmp(&b.message))
    });
    issues.dedup();
}
