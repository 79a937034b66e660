//! # Identifier Rules
//!
//! Naming rules for everything a module specification names, plus the two
//! identifier newtypes that leave the validator: [`ModuleName`] (the package
//! slug, also the registry key) and [`TechnicalName`] (the dotted model name
//! the external runtime uses, e.g. `contracts.contract` or `res.partner`).
//!
//! The predicates are plain functions so the validator can report every
//! offending name with its path instead of stopping at the first failure.

use serde::{Deserialize, Serialize};

use crate::error::IdentifierError;

/// Maximum length of a module slug.
pub const MAX_MODULE_NAME_LEN: usize = 64;

/// `^[a-z][a-z0-9_]*$`, used for module, field, and state names.
pub fn is_snake_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(b) if b.is_ascii_lowercase() => {}
        _ => return false,
    }
    bytes.all(|b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'_')
}

/// Logical model names: one or more dot-separated segments, each starting
/// with an ASCII letter followed by letters, digits, or underscores.
///
/// Accepts `Contract`, `ContractLine`, and runtime-style `res.partner`.
pub fn is_model_name(s: &str) -> bool {
    if s.is_empty() {
        return false;
    }
    s.split('.').all(|segment| {
        let mut bytes = segment.bytes();
        match bytes.next() {
            Some(b) if b.is_ascii_alphabetic() => {}
            _ => return false,
        }
        bytes.all(|b| b.is_ascii_alphanumeric() || b == b'_')
    })
}

/// Dotted numeric version with two to five components, e.g. `1.0` or `17.0.1.0.0`.
pub fn is_version(s: &str) -> bool {
    let parts: Vec<&str> = s.split('.').collect();
    (2..=5).contains(&parts.len())
        && parts
            .iter()
            .all(|p| !p.is_empty() && p.len() <= 6 && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Convert a CamelCase or mixed logical name to snake_case.
///
/// `SalesContract` → `sales_contract`, `HTTPRequest` → `http_request`,
/// `contract_line` is unchanged.
pub fn to_snake_case(s: &str) -> String {
    let chars: Vec<char> = s.chars().collect();
    let mut out = String::with_capacity(s.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_ascii_uppercase() {
            let prev = i.checked_sub(1).map(|j| chars[j]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_ascii_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_ascii_uppercase() => next.is_some_and(|n| n.is_ascii_lowercase()),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.push(c.to_ascii_lowercase());
        } else if c == '-' || c == ' ' {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    out
}

/// The slug of a generated package. Validated on construction.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ModuleName(String);

impl ModuleName {
    /// Parse a module slug: `^[a-z][a-z0-9_]*$`, at most 64 characters.
    pub fn parse(s: &str) -> Result<Self, IdentifierError> {
        if s.len() > MAX_MODULE_NAME_LEN || !is_snake_identifier(s) {
            return Err(IdentifierError {
                kind: "module name",
                value: s.to_string(),
                rule: "must match ^[a-z][a-z0-9_]*$ and be at most 64 characters",
            });
        }
        Ok(Self(s.to_string()))
    }

    /// Normalize a raw name to its registry key: trimmed, lowercased,
    /// with dashes and spaces folded to underscores.
    pub fn normalize(raw: &str) -> String {
        raw.trim()
            .chars()
            .map(|c| match c {
                '-' | ' ' => '_',
                other => other.to_ascii_lowercase(),
            })
            .collect()
    }

    /// Access the slug.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ModuleName {
    type Error = IdentifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ModuleName> for String {
    fn from(value: ModuleName) -> Self {
        value.0
    }
}

impl std::fmt::Display for ModuleName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// The dotted model name used by the external runtime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TechnicalName(String);

impl TechnicalName {
    /// Technical name for a model newly declared by `module`.
    ///
    /// Dotted logical names are already technical and are only lowercased;
    /// plain names are snake-cased and prefixed with the module slug.
    pub fn for_new_model(module: &ModuleName, logical: &str) -> Self {
        if logical.contains('.') {
            Self(logical.to_ascii_lowercase())
        } else {
            Self(format!("{}.{}", module.as_str(), to_snake_case(logical)))
        }
    }

    /// Technical name of an entity that already exists in the runtime.
    pub fn existing(name: &str) -> Self {
        Self(name.to_string())
    }

    /// Access the dotted name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File-system friendly stem: dots replaced by underscores.
    pub fn file_stem(&self) -> String {
        self.0.replace('.', "_")
    }

    /// External identifier the runtime assigns to the model record
    /// (`model_<stem>`), referenced by access rules.
    pub fn model_xml_id(&self) -> String {
        format!("model_{}", self.file_stem())
    }
}

impl std::fmt::Display for TechnicalName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
